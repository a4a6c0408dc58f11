//! Seekable video file source.
//!
//! The codec side is behind [`VideoDecoder`]; this module owns the locking,
//! parameter caching and cursor bookkeeping shared by all decoders. The
//! decoder lives in a mutex held for the whole of each frame read, and seeks
//! take the same mutex, so a seek lands between two reads and never inside one.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, info, instrument};

use crate::depth_pipeline::common::{DepthError, Frame, MediaParams, Result};
use crate::depth_pipeline::source::ensure_exists;
use crate::depth_pipeline::source::reader::{FrameSource, Seekable};

pub trait VideoDecoder: Send {
    fn params(&self) -> MediaParams;

    /// Next decoded frame, `None` at end of stream or on a decode failure.
    fn read_frame(&mut self) -> Option<Frame>;

    /// Positions the decoder so the next `read_frame` returns frame `index`.
    fn seek_to_frame(&mut self, index: u64) -> Result<()>;
}

pub type DecoderOpener<D> = Box<dyn Fn(&Path) -> Result<D> + Send + Sync>;

struct VideoShared<D> {
    decoder: Mutex<Option<D>>,
    params: OnceLock<MediaParams>,
    duration: OnceLock<f64>,
    /// Index of the next frame to be read.
    cursor: AtomicU64,
}

impl<D: VideoDecoder> VideoShared<D> {
    fn read_next(&self) -> Option<Frame> {
        let mut guard = self.decoder.lock().unwrap_or_else(PoisonError::into_inner);
        let frame = guard.as_mut()?.read_frame()?;
        self.cursor.fetch_add(1, Ordering::SeqCst);
        Some(frame)
    }

    fn fps(&self) -> Option<u32> {
        self.params.get().and_then(|p| p.fps).filter(|&fps| fps > 0)
    }
}

impl<D: VideoDecoder> Seekable for VideoShared<D> {
    fn seek(&self, position_secs: f64) -> Result<()> {
        let fps = self
            .fps()
            .ok_or_else(|| DepthError::Unsupported("seek needs a known frame rate".to_string()))?;

        let mut index = (position_secs.max(0.0) * fps as f64).round() as u64;
        if let Some(count) = self.params.get().and_then(|p| p.frame_count) {
            index = index.min(count.saturating_sub(1));
        }

        let mut guard = self.decoder.lock().unwrap_or_else(PoisonError::into_inner);
        let decoder = guard
            .as_mut()
            .ok_or_else(|| DepthError::Decode("video source is not open".to_string()))?;
        decoder.seek_to_frame(index)?;
        self.cursor.store(index, Ordering::SeqCst);
        debug!(position_secs, frame = index, "Seek applied");
        Ok(())
    }

    fn duration(&self) -> f64 {
        self.duration.get().copied().unwrap_or(0.0)
    }

    fn progress(&self) -> f64 {
        match self.fps() {
            Some(fps) => self.cursor.load(Ordering::SeqCst) as f64 / fps as f64,
            None => 0.0,
        }
    }
}

pub struct SeekableVideoSource<D> {
    path: PathBuf,
    opener: DecoderOpener<D>,
    shared: Arc<VideoShared<D>>,
}

impl<D: VideoDecoder + 'static> SeekableVideoSource<D> {
    pub fn with_decoder<P: AsRef<Path>>(path: P, opener: DecoderOpener<D>) -> Result<Self> {
        let path = path.as_ref();
        ensure_exists(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            opener,
            shared: Arc::new(VideoShared {
                decoder: Mutex::new(None),
                params: OnceLock::new(),
                duration: OnceLock::new(),
                cursor: AtomicU64::new(0),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<D: VideoDecoder + 'static> FrameSource for SeekableVideoSource<D> {
    fn name(&self) -> &str {
        "video-file"
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn prepare(&mut self) -> Result<MediaParams> {
        let mut guard = self.shared.decoder.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            let decoder = (self.opener)(&self.path)?;
            let params = *self.shared.params.get_or_init(|| decoder.params());
            self.shared
                .duration
                .get_or_init(|| params.duration_secs().unwrap_or(0.0));
            self.shared.cursor.store(0, Ordering::SeqCst);
            *guard = Some(decoder);
            info!(
                fps = ?params.fps,
                width = ?params.width,
                height = ?params.height,
                frames = ?params.frame_count,
                "Video opened"
            );
        }
        Ok(self.shared.params.get().copied().unwrap_or_default())
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Frame> + '_> {
        let shared = Arc::clone(&self.shared);
        Box::new(std::iter::from_fn(move || shared.read_next()))
    }

    fn close(&mut self) -> Result<()> {
        let mut guard = self.shared.decoder.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!(path = %self.path.display(), "Video closed");
        }
        Ok(())
    }

    fn seeker(&self) -> Option<Arc<dyn Seekable>> {
        let shared: Arc<dyn Seekable> = self.shared.clone();
        Some(shared)
    }
}

#[cfg(feature = "video-ffmpeg")]
pub type VideoFileSource = SeekableVideoSource<crate::depth_pipeline::source::FfmpegDecoder>;

#[cfg(feature = "video-ffmpeg")]
impl SeekableVideoSource<crate::depth_pipeline::source::FfmpegDecoder> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        use crate::depth_pipeline::source::FfmpegDecoder;
        Self::with_decoder(path, Box::new(|p: &Path| FfmpegDecoder::open(p)))
    }
}

// Fallback when built without ffmpeg
#[cfg(not(feature = "video-ffmpeg"))]
pub struct VideoFileSource;

#[cfg(not(feature = "video-ffmpeg"))]
impl VideoFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ensure_exists(path.as_ref())?;
        Err(DepthError::Unsupported(
            "video files require the `video-ffmpeg` feature".to_string(),
        ))
    }
}

#[cfg(not(feature = "video-ffmpeg"))]
impl FrameSource for VideoFileSource {
    fn name(&self) -> &str {
        "video-file"
    }

    fn prepare(&mut self) -> Result<MediaParams> {
        Err(DepthError::Unsupported(
            "video files require the `video-ffmpeg` feature".to_string(),
        ))
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Frame> + '_> {
        Box::new(std::iter::empty())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingDecoder {
        next: u64,
        total: u64,
    }

    impl VideoDecoder for CountingDecoder {
        fn params(&self) -> MediaParams {
            MediaParams {
                fps: Some(10),
                width: Some(2),
                height: Some(1),
                frame_count: Some(self.total),
            }
        }

        fn read_frame(&mut self) -> Option<Frame> {
            if self.next >= self.total {
                return None;
            }
            let value = self.next as u8;
            self.next += 1;
            Frame::from_rgb(2, 1, vec![value; 6]).ok()
        }

        fn seek_to_frame(&mut self, index: u64) -> Result<()> {
            self.next = index;
            Ok(())
        }
    }

    fn source(opens: Arc<AtomicUsize>) -> SeekableVideoSource<CountingDecoder> {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        let source = SeekableVideoSource::with_decoder(
            &path,
            Box::new(move |_: &Path| {
                opens.fetch_add(1, Ordering::SeqCst);
                Ok(CountingDecoder { next: 0, total: 50 })
            }),
        )
        .unwrap();
        drop(file);
        source
    }

    #[test]
    fn missing_file_fails_at_construction() {
        let result = SeekableVideoSource::<CountingDecoder>::with_decoder(
            "/definitely/not/here.mp4",
            Box::new(|_: &Path| Ok(CountingDecoder { next: 0, total: 1 })),
        );
        assert!(matches!(result, Err(DepthError::SourceConstruction(_))));
    }

    #[test]
    fn prepare_opens_once_while_ready() {
        let opens = Arc::new(AtomicUsize::new(0));
        let mut source = source(opens.clone());

        let first = source.prepare().unwrap();
        let second = source.prepare().unwrap();

        assert_eq!(first, second);
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(source.seeker().unwrap().duration(), 5.0);
    }

    #[test]
    fn seek_moves_next_read_and_progress() {
        let mut source = source(Arc::new(AtomicUsize::new(0)));
        source.prepare().unwrap();
        let seeker = source.seeker().unwrap();

        let mut frames = source.frames();
        assert_eq!(frames.next().unwrap().data()[0], 0);
        assert_eq!(frames.next().unwrap().data()[0], 1);
        assert!((seeker.progress() - 0.2).abs() < 1e-9);

        seeker.seek(3.0).unwrap();
        assert!((seeker.progress() - 3.0).abs() < 1e-9);
        assert_eq!(frames.next().unwrap().data()[0], 30);
    }

    struct SlowDecoder {
        inner: CountingDecoder,
        reading: std::sync::mpsc::Sender<()>,
    }

    impl VideoDecoder for SlowDecoder {
        fn params(&self) -> MediaParams {
            self.inner.params()
        }

        fn read_frame(&mut self) -> Option<Frame> {
            let _ = self.reading.send(());
            std::thread::sleep(std::time::Duration::from_millis(50));
            self.inner.read_frame()
        }

        fn seek_to_frame(&mut self, index: u64) -> Result<()> {
            self.inner.seek_to_frame(index)
        }
    }

    #[test]
    fn concurrent_seek_waits_for_the_read_in_flight() {
        let (tx, rx) = std::sync::mpsc::channel();
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut source = SeekableVideoSource::with_decoder(
            file.path(),
            Box::new(move |_: &Path| {
                Ok(SlowDecoder {
                    inner: CountingDecoder { next: 0, total: 100 },
                    reading: tx.clone(),
                })
            }),
        )
        .unwrap();
        source.prepare().unwrap();
        let seeker = source.seeker().unwrap();

        let seeking = std::thread::spawn(move || {
            rx.recv().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
            seeker.seek(5.0).unwrap();
        });

        let mut frames = source.frames();
        let in_flight = frames.next().unwrap();
        seeking.join().unwrap();
        let next = frames.next().unwrap();

        assert_eq!(in_flight.data()[0], 0);
        assert_eq!(next.data()[0], 50);
    }

    #[test]
    fn seek_past_end_clamps_to_last_frame() {
        let mut source = source(Arc::new(AtomicUsize::new(0)));
        source.prepare().unwrap();
        let seeker = source.seeker().unwrap();

        seeker.seek(100.0).unwrap();
        let frames: Vec<Frame> = source.frames().collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data()[0], 49);
    }

    #[test]
    fn close_is_idempotent_and_ends_stream() {
        let mut source = source(Arc::new(AtomicUsize::new(0)));
        source.close().unwrap();
        source.prepare().unwrap();
        source.close().unwrap();
        source.close().unwrap();
        assert_eq!(source.frames().count(), 0);
        assert!(source.seeker().unwrap().seek(1.0).is_err());
    }
}
