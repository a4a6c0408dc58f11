//! Directory-of-images sink.
//!
//! Each pair becomes up to three files named after the frame: `<name>_dm`,
//! `<name>_img` and `<name>_concat` (depth stacked above the image). The
//! composite is always built from the two single files on disk; singles that
//! were not requested are removed afterwards.

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, RgbImage, imageops};
use tracing::{debug, info, instrument};

use crate::depth_pipeline::common::{DepthError, DepthMap, Frame, MediaParams, Result};
use crate::depth_pipeline::sink::tiff_encoder::{TiffCompression, encode_tiff};
use crate::depth_pipeline::sink::writer::FrameSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Tiff(TiffCompression),
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Tiff(_) => "tiff",
        }
    }
}

/// Maps the 1-based frame number to a base file name.
#[derive(Clone)]
pub struct NameRule(Arc<dyn Fn(u64) -> String + Send + Sync>);

impl NameRule {
    pub fn counter() -> Self {
        Self(Arc::new(|n| n.to_string()))
    }

    /// Zero-padded counter, e.g. `000042` for width 6.
    pub fn padded(width: usize) -> Self {
        Self(Arc::new(move |n| format!("{:0width$}", n, width = width)))
    }

    pub fn custom<F>(rule: F) -> Self
    where
        F: Fn(u64) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(rule))
    }

    pub fn apply(&self, number: u64) -> String {
        (self.0)(number)
    }
}

impl Default for NameRule {
    fn default() -> Self {
        Self::counter()
    }
}

impl fmt::Debug for NameRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NameRule")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageSinkConfig {
    pub write_depth: bool,
    pub write_image: bool,
    pub write_concat: bool,
    pub format: ImageFormat,
    pub name_rule: NameRule,
}

impl ImageSinkConfig {
    pub fn builder() -> ImageSinkConfigBuilder {
        ImageSinkConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct ImageSinkConfigBuilder {
    write_depth: Option<bool>,
    write_image: Option<bool>,
    write_concat: Option<bool>,
    format: Option<ImageFormat>,
    name_rule: Option<NameRule>,
}

impl ImageSinkConfigBuilder {
    pub fn write_depth(mut self, enable: bool) -> Self {
        self.write_depth = Some(enable);
        self
    }

    pub fn write_image(mut self, enable: bool) -> Self {
        self.write_image = Some(enable);
        self
    }

    pub fn write_concat(mut self, enable: bool) -> Self {
        self.write_concat = Some(enable);
        self
    }

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn name_rule(mut self, rule: NameRule) -> Self {
        self.name_rule = Some(rule);
        self
    }

    pub fn build(self) -> ImageSinkConfig {
        let default = ImageSinkConfig::default();
        ImageSinkConfig {
            write_depth: self.write_depth.unwrap_or(default.write_depth),
            write_image: self.write_image.unwrap_or(default.write_image),
            write_concat: self.write_concat.unwrap_or(default.write_concat),
            format: self.format.unwrap_or(default.format),
            name_rule: self.name_rule.unwrap_or(default.name_rule),
        }
    }
}

pub struct ImageDirSink {
    dir: PathBuf,
    config: ImageSinkConfig,
    written: u64,
}

impl ImageDirSink {
    pub fn new<P: AsRef<Path>>(dir: P, config: ImageSinkConfig) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            config,
            written: 0,
        }
    }

    pub fn config(&self) -> &ImageSinkConfig {
        &self.config
    }

    /// Number of pairs written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn path_for(&self, base: &str, suffix: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.{}", base, suffix, self.config.format.extension()))
    }

    fn save(&self, image: &DynamicImage, path: &Path) -> Result<()> {
        match self.config.format {
            ImageFormat::Png => image
                .save_with_format(path, image::ImageFormat::Png)
                .map_err(|e| DepthError::Encode(format!("{}: {}", path.display(), e))),
            ImageFormat::Tiff(compression) => {
                let mut output = BufWriter::new(File::create(path)?);
                encode_tiff(image, &mut output, compression)
            }
        }
    }

    fn write_concat(&self, depth_path: &Path, image_path: &Path, concat_path: &Path) -> Result<()> {
        let load = |path: &Path| -> Result<RgbImage> {
            Ok(image::open(path)
                .map_err(|e| DepthError::Sink(format!("{}: {}", path.display(), e)))?
                .to_rgb8())
        };
        let depth = load(depth_path)?;
        let picture = load(image_path)?;

        let width = depth.width().max(picture.width());
        let mut stacked = RgbImage::new(width, depth.height() + picture.height());
        imageops::replace(&mut stacked, &depth, 0, 0);
        imageops::replace(&mut stacked, &picture, 0, i64::from(depth.height()));
        self.save(&DynamicImage::ImageRgb8(stacked), concat_path)
    }
}

impl FrameSink for ImageDirSink {
    fn name(&self) -> &str {
        "image-dir"
    }

    #[instrument(skip(self, _params), fields(dir = %self.dir.display()))]
    fn prepare(&mut self, _params: &MediaParams) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        info!(
            depth = self.config.write_depth,
            image = self.config.write_image,
            concat = self.config.write_concat,
            format = self.config.format.extension(),
            "Image output ready"
        );
        Ok(())
    }

    fn write(&mut self, frame: &Frame, depth: &DepthMap) -> Result<()> {
        self.written += 1;
        let base = self.config.name_rule.apply(self.written);
        let concat = self.config.write_concat;

        let depth_path = self.path_for(&base, "dm");
        let image_path = self.path_for(&base, "img");

        if self.config.write_depth || concat {
            self.save(&DynamicImage::ImageLuma8(depth.to_gray_image()), &depth_path)?;
        }
        if self.config.write_image || concat {
            self.save(&DynamicImage::ImageRgb8(frame.to_rgb_image()), &image_path)?;
        }
        if concat {
            self.write_concat(&depth_path, &image_path, &self.path_for(&base, "concat"))?;
            if !self.config.write_depth {
                std::fs::remove_file(&depth_path)?;
            }
            if !self.config.write_image {
                std::fs::remove_file(&image_path)?;
            }
        }
        debug!(name = %base, "Frame written");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
