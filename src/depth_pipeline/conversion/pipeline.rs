use std::sync::Arc;

use tracing::{debug, debug_span, error, info, instrument, warn};

use crate::depth_pipeline::common::{DepthMap, Frame, Result};
use crate::depth_pipeline::conversion::control::{Control, PipelineHandle, PipelineState};
use crate::depth_pipeline::conversion::timing::{StageTimings, Timer};
use crate::depth_pipeline::estimator::DepthEstimator;
use crate::depth_pipeline::processors::{Postprocessor, Preprocessor};
use crate::depth_pipeline::sink::FrameSink;
use crate::depth_pipeline::source::FrameSource;

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The source ran out of frames.
    Completed,
    /// `stop()` was honoured at a frame boundary.
    Stopped,
    /// An external abort was honoured at a frame boundary.
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub frames_processed: u64,
    pub outcome: RunOutcome,
    pub timings: StageTimings,
}

/// Source -> preprocessors -> depth estimator -> postprocessors -> sinks.
///
/// `start` is single-shot: it runs the loop on the calling thread and the
/// pipeline ends up `Stopped` whatever the result. Control from other threads
/// goes through [`PipelineHandle`].
pub struct DepthPipeline<S: FrameSource, E: DepthEstimator> {
    source: S,
    estimator: E,
    sinks: Vec<Box<dyn FrameSink>>,
    control: Arc<Control>,
}

impl<S: FrameSource, E: DepthEstimator> DepthPipeline<S, E> {
    pub fn new(source: S, estimator: E) -> Self {
        let control = Arc::new(Control::new(source.seeker()));
        Self {
            source,
            estimator,
            sinks: Vec::new(),
            control,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn with_preprocessor(self, processor: Arc<dyn Preprocessor>) -> Self {
        self.control.preprocessors.push(processor);
        self
    }

    pub fn with_postprocessor(self, processor: Arc<dyn Postprocessor>) -> Self {
        self.control.postprocessors.push(processor);
        self
    }

    /// Sinks receive pairs in registration order.
    pub fn add_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sinks.push(sink);
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle::new(Arc::clone(&self.control))
    }

    pub fn state(&self) -> PipelineState {
        self.control.state()
    }

    pub fn stop(&self) {
        self.handle().stop();
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs the pipeline to the end of the stream or until stopped.
    ///
    /// The source and every sink are closed exactly once before this returns,
    /// including when a stage fails. A stage error takes precedence over a
    /// close error.
    #[instrument(skip(self), fields(source = self.source.name(), sinks = self.sinks.len()))]
    pub fn start(&mut self) -> Result<RunReport> {
        self.control.begin()?;
        info!(estimator = self.estimator.name(), "Pipeline started");

        let result = self.run();
        let cleanup = self.close_all();
        self.control.finish();

        match (result, cleanup) {
            (Ok(report), Ok(())) => {
                info!(
                    frames = report.frames_processed,
                    outcome = ?report.outcome,
                    "Pipeline finished in {:.3}ms",
                    report.timings.total_duration().as_secs_f64() * 1000.0
                );
                report.timings.log_summary();
                Ok(report)
            }
            (Ok(_), Err(e)) => {
                error!("Pipeline cleanup failed: {}", e);
                Err(e)
            }
            (Err(e), cleanup) => {
                if let Err(close_err) = cleanup {
                    warn!("Cleanup after failure also failed: {}", close_err);
                }
                error!("Pipeline failed: {}", e);
                Err(e)
            }
        }
    }

    fn run(&mut self) -> Result<RunReport> {
        let Self {
            source,
            estimator,
            sinks,
            control,
        } = self;

        let params = source.prepare()?;
        debug!(?params, "Source ready");
        for sink in sinks.iter_mut() {
            sink.prepare(&params)?;
        }
        for processor in control.preprocessors.snapshot().iter() {
            processor.reset();
        }
        for processor in control.postprocessors.snapshot().iter() {
            processor.reset();
        }

        let mut timings = StageTimings::new();
        let mut frames_processed = 0u64;
        let mut frames = source.frames();

        let outcome = loop {
            if control.stop_requested() {
                break if control.interrupted() {
                    RunOutcome::Interrupted
                } else {
                    RunOutcome::Stopped
                };
            }

            let timer = Timer::start("read");
            let Some(frame) = frames.next() else {
                break RunOutcome::Completed;
            };
            timings.record(timer);

            let _span = debug_span!("frame", index = frames_processed).entered();
            let (frame, depth) = process_frame(frame, estimator, control, &mut timings)?;

            let timer = Timer::start("write");
            for sink in sinks.iter_mut() {
                sink.write(&frame, &depth)?;
            }
            timings.record(timer);
            frames_processed += 1;
        };

        Ok(RunReport {
            frames_processed,
            outcome,
            timings,
        })
    }

    /// Closes the source, then every sink in registration order. All of them
    /// are closed even if one fails; the first failure is returned.
    fn close_all(&mut self) -> Result<()> {
        let mut first_err = None;
        if let Err(e) = self.source.close() {
            warn!(source = self.source.name(), "Closing source failed: {}", e);
            first_err = Some(e);
        }
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.close() {
                warn!(sink = sink.name(), "Closing sink failed: {}", e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// One frame through both chains and the estimator. Each chain is read once,
/// so a concurrent replacement applies from the next frame on.
fn process_frame<E: DepthEstimator>(
    frame: Frame,
    estimator: &mut E,
    control: &Control,
    timings: &mut StageTimings,
) -> Result<(Frame, DepthMap)> {
    let preprocessors = control.preprocessors.snapshot();
    let postprocessors = control.postprocessors.snapshot();

    let timer = Timer::start("preprocess");
    let mut frame = frame;
    for processor in preprocessors.iter() {
        frame = processor.process(frame)?;
    }
    timings.record(timer);

    let timer = Timer::start("estimate");
    let mut depth = estimator.estimate(&frame)?;
    depth.ensure_matches(&frame)?;
    timings.record(timer);

    let timer = Timer::start("postprocess");
    for processor in postprocessors.iter() {
        (frame, depth) = processor.process(frame, depth)?;
        depth.ensure_matches(&frame)?;
    }
    timings.record(timer);

    Ok((frame, depth))
}
