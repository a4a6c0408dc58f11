//! Directory-of-images source.
//!
//! The file list is a sorted snapshot taken by `prepare`; files added later are
//! not picked up. Images are decoded lazily, one per pulled frame.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::depth_pipeline::common::{DepthError, Frame, MediaParams, Result};
use crate::depth_pipeline::source::ensure_exists;
use crate::depth_pipeline::source::raw_decode::{decode_raw, is_raw_extension};
use crate::depth_pipeline::source::reader::FrameSource;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

pub struct ImageDirSource {
    dir: PathBuf,
    files: Option<Vec<PathBuf>>,
    params: Option<MediaParams>,
}

impl ImageDirSource {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        ensure_exists(dir)?;
        if !dir.is_dir() {
            return Err(DepthError::SourceConstruction(format!(
                "{}: not a directory",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            files: None,
            params: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files captured by the last `prepare`, empty before it.
    pub fn files(&self) -> &[PathBuf] {
        self.files.as_deref().unwrap_or(&[])
    }

    fn snapshot(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && is_supported(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            is_raw_extension(ext)
                || IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

fn load_frame(path: &Path) -> Result<Frame> {
    let is_raw = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(is_raw_extension);
    let image = if is_raw {
        decode_raw(&std::fs::read(path)?)?
    } else {
        image::open(path)
            .map_err(|e| DepthError::Decode(format!("{}: {}", path.display(), e)))?
            .to_rgb8()
    };
    Frame::from_rgb_image(image)
}

impl FrameSource for ImageDirSource {
    fn name(&self) -> &str {
        "image-dir"
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    fn prepare(&mut self) -> Result<MediaParams> {
        if let Some(params) = self.params {
            return Ok(params);
        }
        let files = self.snapshot()?;
        let params = MediaParams {
            frame_count: Some(files.len() as u64),
            ..MediaParams::default()
        };
        info!(images = files.len(), "Image directory scanned");
        self.files = Some(files);
        self.params = Some(params);
        Ok(params)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Frame> + '_> {
        let files = self.files.as_deref().unwrap_or(&[]);
        let mut paths = files.iter();
        Box::new(std::iter::from_fn(move || {
            let path = paths.next()?;
            match load_frame(path) {
                Ok(frame) => {
                    debug!(path = %path.display(), "Image decoded");
                    Some(frame)
                }
                Err(e) => {
                    warn!(path = %path.display(), "Image decode failed, ending stream: {}", e);
                    None
                }
            }
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.files = None;
        self.params = None;
        Ok(())
    }
}
