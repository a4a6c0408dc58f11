use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};

use dmconvert_rs::depth_pipeline::{
    CallbackSink, CameraConfig, CameraSource, DepthPipeline, ImageDirSink, ImageDirSource,
    ImageSinkConfig, LumaDepthEstimator, PipelineState, RunOutcome, StabilizerConfig,
    StereoConfig, StereoSynthesizer, TemporalStabilizer,
};

fn write_gradient(dir: &Path, name: &str, shift: u32) {
    let image = RgbImage::from_fn(16, 8, |x, y| {
        let v = ((x + shift) * 16 % 256) as u8;
        Rgb([v, (y * 32) as u8, 255 - v])
    });
    image.save(dir.join(name)).unwrap();
}

fn sorted_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn image_directory_to_depth_and_concat_files() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    for i in 0..3 {
        write_gradient(input.path(), &format!("frame_{}.png", i), i);
    }

    let source = ImageDirSource::open(input.path()).unwrap();
    let sink = ImageDirSink::new(
        output.path(),
        ImageSinkConfig::builder()
            .write_depth(true)
            .write_concat(true)
            .build(),
    );
    let mut pipeline = DepthPipeline::new(source, LumaDepthEstimator::new())
        .with_postprocessor(Arc::new(TemporalStabilizer::new(StabilizerConfig::default())))
        .with_postprocessor(Arc::new(StereoSynthesizer::new(StereoConfig::default())))
        .with_sink(Box::new(sink));

    let report = pipeline.start().unwrap();

    assert_eq!(report.frames_processed, 3);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert_eq!(
        sorted_names(output.path()),
        vec!["1_concat.png", "1_dm.png", "2_concat.png", "2_dm.png", "3_concat.png", "3_dm.png"]
    );

    let depth = image::open(output.path().join("1_dm.png")).unwrap().to_luma8();
    assert_eq!(depth.dimensions(), (16, 8));
    assert_eq!(depth.pixels().map(|p| p.0[0]).max(), Some(255));

    let concat = image::open(output.path().join("2_concat.png")).unwrap().to_rgb8();
    assert_eq!(concat.dimensions(), (16, 16));
}

#[test]
fn stub_camera_runs_until_stopped() {
    let source = CameraSource::open(CameraConfig {
        device: "stub://integration".to_string(),
        fps: 30,
        width: 32,
        height: 16,
    })
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut pipeline = DepthPipeline::new(source, LumaDepthEstimator::new())
        .with_postprocessor(Arc::new(StereoSynthesizer::default()));
    let handle = pipeline.handle();
    let recorder = seen.clone();
    pipeline.add_sink(Box::new(CallbackSink::new(move |frame, depth| {
        let mut seen = recorder.lock().unwrap();
        seen.push((frame.width(), depth.height()));
        if seen.len() == 4 {
            handle.stop();
        }
        Ok(())
    })));

    let report = pipeline.start().unwrap();

    assert_eq!(report.frames_processed, 4);
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert!(seen.lock().unwrap().iter().all(|&size| size == (32, 16)));
}

#[test]
fn empty_directory_completes_without_frames() {
    let input = tempfile::tempdir().unwrap();
    let source = ImageDirSource::open(input.path()).unwrap();
    let mut pipeline = DepthPipeline::new(source, LumaDepthEstimator::new());

    let report = pipeline.start().unwrap();
    assert_eq!(report.frames_processed, 0);
    assert_eq!(report.outcome, RunOutcome::Completed);
}
