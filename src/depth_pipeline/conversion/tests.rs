use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::depth_pipeline::common::{DepthError, DepthMap, Frame, MediaParams, Result};
use crate::depth_pipeline::conversion::{DepthPipeline, PipelineState, RunOutcome};
use crate::depth_pipeline::estimator::DepthEstimator;
use crate::depth_pipeline::processors::{Postprocessor, Preprocessor};
use crate::depth_pipeline::sink::{CallbackSink, FrameSink};
use crate::depth_pipeline::source::FrameSource;

type Log = Arc<Mutex<Vec<String>>>;

fn log(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn count(log: &Log, entry: &str) -> usize {
    log.lock().unwrap().iter().filter(|e| *e == entry).count()
}

fn frame(value: u8) -> Frame {
    Frame::from_rgb(2, 1, vec![value; 6]).unwrap()
}

struct MockSource {
    total: u8,
    log: Log,
}

impl FrameSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn prepare(&mut self) -> Result<MediaParams> {
        log(&self.log, "source.prepare");
        Ok(MediaParams {
            fps: Some(10),
            width: Some(2),
            height: Some(1),
            frame_count: Some(self.total as u64),
        })
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Frame> + '_> {
        let log = self.log.clone();
        Box::new((0..self.total).map(move |i| {
            self::log(&log, format!("read {}", i));
            frame(i)
        }))
    }

    fn close(&mut self) -> Result<()> {
        log(&self.log, "source.close");
        Ok(())
    }
}

struct MockEstimator {
    fail_on: Option<u8>,
    calls: Arc<AtomicUsize>,
}

impl DepthEstimator for MockEstimator {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn estimate(&mut self, frame: &Frame) -> Result<DepthMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if Some(frame.data()[0]) == self.fail_on {
            return Err(DepthError::Estimation("mock failure".to_string()));
        }
        DepthMap::new(frame.width(), frame.height(), vec![frame.data()[0]; frame.pixel_count()])
    }
}

fn estimator() -> MockEstimator {
    MockEstimator {
        fail_on: None,
        calls: Arc::new(AtomicUsize::new(0)),
    }
}

struct MockSink {
    name: &'static str,
    log: Log,
    fail_close: bool,
}

impl FrameSink for MockSink {
    fn name(&self) -> &str {
        self.name
    }

    fn prepare(&mut self, _params: &MediaParams) -> Result<()> {
        log(&self.log, format!("{}.prepare", self.name));
        Ok(())
    }

    fn write(&mut self, frame: &Frame, depth: &DepthMap) -> Result<()> {
        log(
            &self.log,
            format!("{}.write {} {}", self.name, frame.data()[0], depth.data()[0]),
        );
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        log(&self.log, format!("{}.close", self.name));
        if self.fail_close {
            return Err(DepthError::Sink("mock close failure".to_string()));
        }
        Ok(())
    }
}

fn sink(name: &'static str, log: &Log) -> Box<dyn FrameSink> {
    Box::new(MockSink {
        name,
        log: log.clone(),
        fail_close: false,
    })
}

fn pipeline(total: u8, log: &Log) -> DepthPipeline<MockSource, MockEstimator> {
    DepthPipeline::new(
        MockSource {
            total,
            log: log.clone(),
        },
        estimator(),
    )
    .with_sink(sink("a", log))
    .with_sink(sink("b", log))
}

#[test]
fn test_full_run_order_and_single_cleanup() {
    let log = Log::default();
    let mut pipeline = pipeline(2, &log);
    assert_eq!(pipeline.state(), PipelineState::Idle);

    let report = pipeline.start().unwrap();

    assert_eq!(report.frames_processed, 2);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert_eq!(
        entries(&log),
        vec![
            "source.prepare",
            "a.prepare",
            "b.prepare",
            "read 0",
            "a.write 0 0",
            "b.write 0 0",
            "read 1",
            "a.write 1 1",
            "b.write 1 1",
            "source.close",
            "a.close",
            "b.close",
        ]
    );
    assert!(report.timings.get("estimate").is_some());
}

#[test]
fn test_second_start_is_rejected() {
    let log = Log::default();
    let mut pipeline = pipeline(1, &log);
    pipeline.start().unwrap();

    assert!(matches!(pipeline.start(), Err(DepthError::AlreadyStarted)));
    assert_eq!(count(&log, "source.close"), 1);
    assert_eq!(count(&log, "a.close"), 1);
}

#[test]
fn test_stop_before_start_runs_no_frames() {
    let log = Log::default();
    let mut pipeline = pipeline(3, &log);
    pipeline.handle().stop();

    let report = pipeline.start().unwrap();

    assert_eq!(report.frames_processed, 0);
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(count(&log, "source.prepare"), 1);
    assert_eq!(count(&log, "source.close"), 1);
    assert_eq!(count(&log, "b.close"), 1);
}

#[test]
fn test_stop_from_sink_finishes_current_frame() {
    let log = Log::default();
    let mut pipeline = pipeline(5, &log);
    let handle = pipeline.handle();
    pipeline.add_sink(Box::new(CallbackSink::new(move |frame, _depth| {
        if frame.data()[0] == 1 {
            handle.stop();
            handle.stop();
        }
        Ok(())
    })));
    pipeline.add_sink(sink("c", &log));

    let report = pipeline.start().unwrap();

    assert_eq!(report.frames_processed, 2);
    assert_eq!(report.outcome, RunOutcome::Stopped);
    // the frame in flight still reaches the sink registered after the callback
    assert_eq!(count(&log, "c.write 1 1"), 1);
    assert_eq!(count(&log, "read 2"), 0);
    assert_eq!(count(&log, "c.close"), 1);
}

#[test]
fn test_interrupt_is_a_clean_outcome() {
    let log = Log::default();
    let mut pipeline = pipeline(5, &log);
    let handle = pipeline.handle();
    pipeline.add_sink(Box::new(CallbackSink::new(move |_, _| {
        handle.interrupt();
        Ok(())
    })));

    let report = pipeline.start().unwrap();

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.frames_processed, 1);
    assert_eq!(count(&log, "source.close"), 1);
}

#[test]
fn test_estimator_failure_propagates_after_cleanup() {
    let log = Log::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = DepthPipeline::new(
        MockSource {
            total: 4,
            log: log.clone(),
        },
        MockEstimator {
            fail_on: Some(1),
            calls: calls.clone(),
        },
    )
    .with_sink(sink("a", &log));

    let result = pipeline.start();

    assert!(matches!(result, Err(DepthError::Estimation(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(count(&log, "a.write 0 0"), 1);
    assert_eq!(count(&log, "a.write 1 1"), 0);
    assert_eq!(count(&log, "source.close"), 1);
    assert_eq!(count(&log, "a.close"), 1);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
fn test_postprocessor_failure_propagates_after_cleanup() {
    let log = Log::default();
    let failing: Arc<dyn Postprocessor> = Arc::new(|_frame: Frame, _depth: DepthMap| {
        Err::<(Frame, DepthMap), _>(DepthError::Processing("boom".to_string()))
    });
    let mut pipeline = pipeline(2, &log).with_postprocessor(failing);

    assert!(matches!(pipeline.start(), Err(DepthError::Processing(_))));
    assert_eq!(count(&log, "source.close"), 1);
    assert_eq!(count(&log, "b.close"), 1);
}

#[test]
fn test_every_sink_closed_when_one_close_fails() {
    let log = Log::default();
    let mut pipeline = DepthPipeline::new(
        MockSource {
            total: 1,
            log: log.clone(),
        },
        estimator(),
    )
    .with_sink(Box::new(MockSink {
        name: "a",
        log: log.clone(),
        fail_close: true,
    }))
    .with_sink(sink("b", &log));

    assert!(matches!(pipeline.start(), Err(DepthError::Sink(_))));
    assert_eq!(count(&log, "a.close"), 1);
    assert_eq!(count(&log, "b.close"), 1);
}

#[test]
fn test_mismatched_depth_is_rejected() {
    let log = Log::default();
    let shrink: Arc<dyn Postprocessor> =
        Arc::new(|frame: Frame, _depth: DepthMap| -> Result<(Frame, DepthMap)> {
            Ok((frame, DepthMap::zeros(1, 1)?))
        });
    let mut pipeline = pipeline(1, &log).with_postprocessor(shrink);

    assert!(matches!(
        pipeline.start(),
        Err(DepthError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_chains_run_in_order() {
    let log = Log::default();
    let add_one: Arc<dyn Preprocessor> = Arc::new(|frame: Frame| -> Result<Frame> {
        let data = frame.data().iter().map(|v| v + 1).collect();
        Frame::from_rgb(frame.width(), frame.height(), data)
    });
    let double: Arc<dyn Preprocessor> = Arc::new(|frame: Frame| -> Result<Frame> {
        let data = frame.data().iter().map(|v| v * 2).collect();
        Frame::from_rgb(frame.width(), frame.height(), data)
    });
    let mut pipeline = pipeline(2, &log)
        .with_preprocessor(add_one)
        .with_preprocessor(double);

    pipeline.start().unwrap();

    // (0 + 1) * 2 and (1 + 1) * 2; the estimator sees the preprocessed frame
    assert_eq!(count(&log, "a.write 2 2"), 1);
    assert_eq!(count(&log, "a.write 4 4"), 1);
}

#[test]
fn test_chain_swap_applies_from_next_frame() {
    let log = Log::default();
    let mut pipeline = pipeline(3, &log);
    let swapper = pipeline.handle();
    pipeline.add_sink(Box::new(CallbackSink::new(move |frame, _| {
        if frame.data()[0] == 0 {
            let invert: Arc<dyn Postprocessor> =
                Arc::new(|frame: Frame, depth: DepthMap| -> Result<(Frame, DepthMap)> {
                    let data: Vec<u8> = depth.data().iter().map(|v| 255 - v).collect();
                    let depth = DepthMap::new(depth.width(), depth.height(), data)?;
                    Ok((frame, depth))
                });
            swapper.set_postprocessors(vec![invert]);
        }
        Ok(())
    })));

    pipeline.start().unwrap();

    assert_eq!(count(&log, "a.write 0 0"), 1);
    assert_eq!(count(&log, "a.write 1 254"), 1);
    assert_eq!(count(&log, "a.write 2 253"), 1);
}

#[test]
fn test_chain_swap_mid_frame_keeps_current_chain() {
    let log = Log::default();
    let old_log = log.clone();
    let old: Arc<dyn Postprocessor> =
        Arc::new(move |frame: Frame, depth: DepthMap| -> Result<(Frame, DepthMap)> {
            self::log(&old_log, format!("old {}", frame.data()[0]));
            Ok((frame, depth))
        });
    let mut pipeline = pipeline(2, &log).with_postprocessor(old);

    // Swaps the postprocessors after the frame has been read but before the
    // postprocess stage runs.
    let swapper = pipeline.handle();
    let swap: Arc<dyn Preprocessor> = Arc::new(move |frame: Frame| -> Result<Frame> {
        if frame.data()[0] == 0 {
            let invert: Arc<dyn Postprocessor> =
                Arc::new(|frame: Frame, depth: DepthMap| -> Result<(Frame, DepthMap)> {
                    let data: Vec<u8> = depth.data().iter().map(|v| 255 - v).collect();
                    let depth = DepthMap::new(depth.width(), depth.height(), data)?;
                    Ok((frame, depth))
                });
            swapper.set_postprocessors(vec![invert]);
        }
        Ok(frame)
    });
    pipeline = pipeline.with_preprocessor(swap);

    pipeline.start().unwrap();

    assert_eq!(count(&log, "old 0"), 1);
    assert_eq!(count(&log, "old 1"), 0);
    assert_eq!(count(&log, "a.write 0 0"), 1);
    assert_eq!(count(&log, "a.write 1 254"), 1);
}

#[test]
fn test_postprocessors_reset_on_start() {
    struct Resettable(Arc<AtomicUsize>);

    impl Postprocessor for Resettable {
        fn process(&self, frame: Frame, depth: DepthMap) -> Result<(Frame, DepthMap)> {
            Ok((frame, depth))
        }

        fn reset(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let log = Log::default();
    let resets = Arc::new(AtomicUsize::new(0));
    let mut pipeline =
        pipeline(1, &log).with_postprocessor(Arc::new(Resettable(resets.clone())));

    pipeline.start().unwrap();
    assert_eq!(resets.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_from_another_thread() {
    struct Endless;

    impl FrameSource for Endless {
        fn name(&self) -> &str {
            "endless"
        }

        fn prepare(&mut self) -> Result<MediaParams> {
            Ok(MediaParams::default())
        }

        fn frames(&mut self) -> Box<dyn Iterator<Item = Frame> + '_> {
            Box::new(std::iter::repeat_with(|| frame(7)))
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    let mut pipeline = DepthPipeline::new(Endless, estimator());
    let handle = pipeline.handle();
    let worker = std::thread::spawn(move || pipeline.start());

    while handle.state() != PipelineState::Running {
        std::thread::yield_now();
    }
    handle.stop();

    let report = worker.join().unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(handle.state(), PipelineState::Stopped);
    assert!(handle.seeker().is_none());
}
