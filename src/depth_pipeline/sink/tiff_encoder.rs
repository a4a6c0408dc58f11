use std::io::{Cursor, Write};

use image::DynamicImage;
use tiff::encoder::colortype::{Gray8, RGB8};
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder};
use tracing::debug;

use crate::depth_pipeline::common::{DepthError, Result};

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    #[default]
    None,
    Lzw,
    DeflateFast,
    DeflateBalanced,
    DeflateBest,
}

impl TiffCompression {
    fn to_tiff(self) -> Compression {
        match self {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
            TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
        }
    }
}

/// Encodes an 8-bit grey or RGB image as TIFF. Other layouts are converted to RGB first.
pub fn encode_tiff(
    image: &DynamicImage,
    output: &mut dyn Write,
    compression: TiffCompression,
) -> Result<()> {
    let (width, height) = (image.width(), image.height());
    debug!(width, height, ?compression, "Encoding TIFF image");

    let mut buffer = Vec::new();
    let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
        .map_err(|e| DepthError::Encode(e.to_string()))?
        .with_compression(compression.to_tiff());

    match image {
        DynamicImage::ImageLuma8(gray) => encoder
            .write_image::<Gray8>(width, height, gray.as_raw())
            .map_err(|e| DepthError::Encode(e.to_string()))?,
        DynamicImage::ImageRgb8(rgb) => encoder
            .write_image::<RGB8>(width, height, rgb.as_raw())
            .map_err(|e| DepthError::Encode(e.to_string()))?,
        other => encoder
            .write_image::<RGB8>(width, height, other.to_rgb8().as_raw())
            .map_err(|e| DepthError::Encode(e.to_string()))?,
    }

    output.write_all(&buffer)?;
    Ok(())
}
