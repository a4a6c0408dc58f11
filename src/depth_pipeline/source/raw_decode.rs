//! Camera RAW decoding for the image directory source.
//!
//! Sensor data is decoded with rawloader, demosaiced with the bayer crate and
//! reduced to 8-bit sRGB-ish output: black level, white balance, gamma.

use std::io::Cursor;

use bayer::{BayerDepth, CFA, Demosaic, RasterDepth, RasterMut};
use image::RgbImage;
use rawloader::RawImageData as RawloaderImageData;
use tracing::debug;

use crate::depth_pipeline::common::{DepthError, Result};

const RAW_EXTENSIONS: &[&str] = &["arw", "cr2", "nef", "dng", "raf", "orf", "rw2"];

const GAMMA: f32 = 1.0 / 2.2;

pub fn is_raw_extension(ext: &str) -> bool {
    RAW_EXTENSIONS
        .iter()
        .any(|raw| raw.eq_ignore_ascii_case(ext))
}

/// Bayer pattern for a rawloader CFA name, RGGB when the name is unknown.
fn cfa_from_name(name: &str) -> CFA {
    match name.get(..4).map(str::to_ascii_uppercase).as_deref() {
        Some("BGGR") => CFA::BGGR,
        Some("GBRG") => CFA::GBRG,
        Some("GRBG") => CFA::GRBG,
        _ => CFA::RGGB,
    }
}

pub fn decode_raw(bytes: &[u8]) -> Result<RgbImage> {
    debug!("Decoding RAW image, {} bytes", bytes.len());

    let decoded = rawloader::decode(&mut Cursor::new(bytes))
        .map_err(|e| DepthError::Decode(e.to_string()))?;
    let width = decoded.width;
    let height = decoded.height;
    if decoded.cpp != 1 {
        return Err(DepthError::Unsupported(format!(
            "RAW with {} components per pixel",
            decoded.cpp
        )));
    }

    let samples: Vec<u16> = match decoded.data {
        RawloaderImageData::Integer(values) => values,
        RawloaderImageData::Float(values) => values
            .iter()
            .map(|&v| (v * u16::MAX as f32) as u16)
            .collect(),
    };
    if samples.len() != width * height {
        return Err(DepthError::InvalidDimensions(width, height, samples.len()));
    }

    let bayer_bytes: Vec<u8> = samples.iter().flat_map(|v| v.to_le_bytes()).collect();
    let mut demosaiced = vec![0u8; width * height * 3 * 2];
    let mut raster = RasterMut::new(width, height, RasterDepth::Depth16, &mut demosaiced);
    let cfa = cfa_from_name(&decoded.cfa.name);
    debug!(width, height, cfa = ?cfa, "Running linear demosaic");
    bayer::run_demosaic(
        &mut Cursor::new(&bayer_bytes[..]),
        BayerDepth::Depth16LE,
        cfa,
        Demosaic::Linear,
        &mut raster,
    )
    .map_err(|e| DepthError::Decode(format!("demosaic failed: {:?}", e)))?;

    let black = decoded.blacklevels[0] as f32;
    let white = decoded.whitelevels[0] as f32;
    let range = (white - black).max(1.0);
    let green = decoded.wb_coeffs[1];
    let wb = if green.is_finite() && green > 0.0 {
        [
            finite_or_one(decoded.wb_coeffs[0] / green),
            1.0,
            finite_or_one(decoded.wb_coeffs[2] / green),
        ]
    } else {
        [1.0, 1.0, 1.0]
    };

    let rgb: Vec<u8> = demosaiced
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| {
            let raw = u16::from_le_bytes([pair[0], pair[1]]) as f32;
            let linear = ((raw - black).max(0.0) / range * wb[i % 3]).clamp(0.0, 1.0);
            (linear.powf(GAMMA) * 255.0).round() as u8
        })
        .collect();

    RgbImage::from_raw(width as u32, height as u32, rgb)
        .ok_or(DepthError::InvalidDimensions(width, height, 0))
}

fn finite_or_one(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 { value } else { 1.0 }
}
