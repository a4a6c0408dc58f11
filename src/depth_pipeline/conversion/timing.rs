use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::info;

#[derive(Debug, Clone)]
pub struct StageTiming {
    pub name: String,
    pub duration: Duration,
    pub calls: u64,
}

/// Time spent per pipeline stage, accumulated over all frames of a run.
#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    stages: Vec<StageTiming>,
    index: HashMap<String, usize>,
}

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, duration: Duration) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => {
                self.stages[i].duration += duration;
                self.stages[i].calls += 1;
            }
            None => {
                self.index.insert(name.clone(), self.stages.len());
                self.stages.push(StageTiming {
                    name,
                    duration,
                    calls: 1,
                });
            }
        }
    }

    pub fn record(&mut self, timer: Timer) {
        let (name, duration) = timer.stop();
        self.add(name, duration);
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn get(&self, name: &str) -> Option<Duration> {
        self.index.get(name).map(|&i| self.stages[i].duration)
    }

    /// Stages in the order they were first seen.
    pub fn stages(&self) -> &[StageTiming] {
        &self.stages
    }

    pub fn log_summary(&self) {
        let total = self.total_duration();
        for stage in &self.stages {
            let percentage = if total.as_secs_f64() > 0.0 {
                (stage.duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            } else {
                0.0
            };
            let per_call = stage.duration.as_secs_f64() * 1000.0 / stage.calls.max(1) as f64;
            info!(
                "{:<12} {:>10.3}ms ({:>5.1}%) {:>8.3}ms/call",
                stage.name,
                stage.duration.as_secs_f64() * 1000.0,
                percentage,
                per_call
            );
        }
        info!("{:<12} {:>10.3}ms", "total", total.as_secs_f64() * 1000.0);
    }
}

pub struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    pub fn stop(self) -> (&'static str, Duration) {
        (self.name, self.start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_stages_accumulate_in_first_seen_order() {
        let mut timings = StageTimings::new();
        timings.add("read", Duration::from_millis(2));
        timings.add("estimate", Duration::from_millis(10));
        timings.add("read", Duration::from_millis(3));

        assert_eq!(timings.get("read"), Some(Duration::from_millis(5)));
        assert_eq!(timings.stages()[0].calls, 2);
        assert_eq!(timings.stages()[1].name, "estimate");
        assert_eq!(timings.total_duration(), Duration::from_millis(15));
        assert_eq!(timings.get("write"), None);
    }
}
