//! Temporal depth stabilisation.
//!
//! Keeps the last `window_size` raw `(frame, depth)` pairs. For every new pair
//! the depth map is averaged with the history entries whose *image* barely
//! differs from the current image, which removes estimator flicker over static
//! scenes while leaving moving scenes untouched.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace};

use crate::depth_pipeline::common::{DepthMap, Frame, Result};
use crate::depth_pipeline::processors::Postprocessor;

#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerConfig {
    /// History capacity.
    pub window_size: usize,
    /// Which history entry's image is returned with the averaged depth,
    /// 0 being the oldest. Clamped to the newest entry.
    pub return_index: usize,
    /// Frames differing from the current one by less than this percentage
    /// count as static.
    pub motion_threshold_percent: f64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            return_index: 0,
            motion_threshold_percent: 2.0,
        }
    }
}

impl StabilizerConfig {
    pub fn builder() -> StabilizerConfigBuilder {
        StabilizerConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct StabilizerConfigBuilder {
    window_size: Option<usize>,
    return_index: Option<usize>,
    motion_threshold_percent: Option<f64>,
}

impl StabilizerConfigBuilder {
    pub fn window_size(mut self, window_size: usize) -> Self {
        self.window_size = Some(window_size);
        self
    }

    pub fn return_index(mut self, return_index: usize) -> Self {
        self.return_index = Some(return_index);
        self
    }

    pub fn motion_threshold_percent(mut self, percent: f64) -> Self {
        self.motion_threshold_percent = Some(percent);
        self
    }

    pub fn build(self) -> StabilizerConfig {
        let default = StabilizerConfig::default();
        StabilizerConfig {
            // a zero window could never hold the entry being returned
            window_size: self.window_size.unwrap_or(default.window_size).max(1),
            return_index: self.return_index.unwrap_or(default.return_index),
            motion_threshold_percent: self
                .motion_threshold_percent
                .unwrap_or(default.motion_threshold_percent),
        }
    }
}

/// Percentage of the maximum possible absolute difference between two frames:
/// `sum |a - b| / (samples * 255) * 100`. Frames of different size are 100%.
pub fn motion_percent(a: &Frame, b: &Frame) -> f64 {
    if a.width() != b.width() || a.height() != b.height() || a.data().is_empty() {
        return 100.0;
    }
    let total: u64 = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();
    total as f64 / (a.data().len() as f64 * 255.0) * 100.0
}

pub struct TemporalStabilizer {
    config: StabilizerConfig,
    history: Mutex<VecDeque<(Frame, DepthMap)>>,
}

impl TemporalStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        let capacity = config.window_size.max(1);
        Self {
            config,
            history: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn history_len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn stabilize(&self, frame: Frame, depth: DepthMap) -> Result<(Frame, DepthMap)> {
        depth.ensure_matches(&frame)?;
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);

        let mut sums: Vec<u32> = depth.data().iter().map(|&v| v as u32).collect();
        let mut count: u32 = 1;
        for (past_frame, past_depth) in history.iter() {
            if motion_percent(past_frame, &frame) >= self.config.motion_threshold_percent {
                continue;
            }
            if past_depth.width() != depth.width() || past_depth.height() != depth.height() {
                continue;
            }
            for (sum, &v) in sums.iter_mut().zip(past_depth.data()) {
                *sum += v as u32;
            }
            count += 1;
        }

        let averaged = if count == 1 {
            depth.clone()
        } else {
            let half = count / 2;
            let data: Vec<u8> = sums.iter().map(|&s| ((s + half) / count) as u8).collect();
            DepthMap::new(depth.width(), depth.height(), data)?
        };
        trace!(static_entries = count - 1, "Depth averaged");

        history.push_back((frame, depth));
        while history.len() > self.config.window_size.max(1) {
            history.pop_front();
        }

        let index = self.config.return_index.min(history.len() - 1);
        let returned = history[index].0.clone();
        Ok((returned, averaged))
    }
}

impl Postprocessor for TemporalStabilizer {
    fn name(&self) -> &str {
        "stabilizer"
    }

    fn process(&self, frame: Frame, depth: DepthMap) -> Result<(Frame, DepthMap)> {
        self.stabilize(frame, depth)
    }

    fn reset(&self) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if !history.is_empty() {
            debug!(entries = history.len(), "Clearing stabilizer history");
        }
        history.clear();
    }
}
