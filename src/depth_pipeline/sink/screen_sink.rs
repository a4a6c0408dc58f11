//! Terminal preview sink.
//!
//! Frame and depth map are drawn side by side with 24-bit ANSI colours, two
//! pixel rows per text row using the upper half block glyph. The cursor is
//! moved home before each frame so the preview redraws in place.

use std::io::{self, Write};

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

use crate::depth_pipeline::common::{DepthMap, Frame, MediaParams, Result};
use crate::depth_pipeline::sink::writer::FrameSink;

const DEFAULT_COLUMNS: u32 = 120;
const GAP: u32 = 2;

pub struct ScreenSink {
    out: Box<dyn Write + Send>,
    columns: u32,
    started: bool,
}

impl Default for ScreenSink {
    fn default() -> Self {
        Self::new(Box::new(io::stdout()), DEFAULT_COLUMNS)
    }
}

impl ScreenSink {
    /// `columns` is the total text width used by both panels.
    pub fn new(out: Box<dyn Write + Send>, columns: u32) -> Self {
        Self {
            out,
            columns: columns.max(GAP + 2),
            started: false,
        }
    }

    fn panel_size(&self, width: usize, height: usize) -> (u32, u32) {
        let panel_width = ((self.columns - GAP) / 2).min(width as u32).max(1);
        let scaled = (height as u64 * panel_width as u64 / width.max(1) as u64) as u32;
        // Even height so every text row gets two pixel rows.
        let panel_height = (scaled.max(2) + 1) & !1;
        (panel_width, panel_height)
    }

    fn render(&self, frame: &Frame, depth: &DepthMap) -> String {
        let (w, h) = self.panel_size(frame.width(), frame.height());
        let left = imageops::resize(&frame.to_rgb_image(), w, h, FilterType::Triangle);
        let right = imageops::resize(&depth.to_rgb_image(), w, h, FilterType::Triangle);

        let mut text = String::with_capacity((w as usize * 2 + 8) * h as usize * 20);
        text.push_str("\x1b[H");
        for y in (0..h).step_by(2) {
            push_row(&mut text, &left, y);
            text.push_str("\x1b[0m");
            text.push_str(&" ".repeat(GAP as usize));
            push_row(&mut text, &right, y);
            text.push_str("\x1b[0m\n");
        }
        text
    }
}

fn push_row(text: &mut String, image: &RgbImage, y: u32) {
    for x in 0..image.width() {
        let [tr, tg, tb] = image.get_pixel(x, y).0;
        let [br, bg, bb] = image.get_pixel(x, y + 1).0;
        text.push_str(&format!(
            "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m\u{2580}",
            tr, tg, tb, br, bg, bb
        ));
    }
}

impl FrameSink for ScreenSink {
    fn name(&self) -> &str {
        "screen"
    }

    fn prepare(&mut self, params: &MediaParams) -> Result<()> {
        debug!(columns = self.columns, width = ?params.width, "Screen preview ready");
        // Clear once, later frames overwrite in place.
        self.out.write_all(b"\x1b[2J")?;
        self.started = true;
        Ok(())
    }

    fn write(&mut self, frame: &Frame, depth: &DepthMap) -> Result<()> {
        let text = self.render(frame, depth);
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.started {
            self.out.write_all(b"\x1b[0m\n")?;
            self.out.flush()?;
            self.started = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn draws_both_panels_with_truecolor_cells() {
        let buffer = SharedBuffer::default();
        let mut sink = ScreenSink::new(Box::new(buffer.clone()), 10);
        let frame = Frame::from_rgb(4, 4, vec![255u8; 48]).unwrap();
        let depth = DepthMap::zeros(4, 4).unwrap();

        sink.prepare(&MediaParams::default()).unwrap();
        sink.write(&frame, &depth).unwrap();
        sink.close().unwrap();

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(text.starts_with("\x1b[2J\x1b[H"));
        assert!(text.contains("\x1b[38;2;255;255;255m"));
        assert!(text.contains("\x1b[38;2;0;0;0m"));
        // 4x4 panels, two text rows, four cells per panel row
        assert_eq!(text.matches('\u{2580}').count(), 16);
    }

    #[test]
    fn close_without_prepare_writes_nothing() {
        let buffer = SharedBuffer::default();
        let mut sink = ScreenSink::new(Box::new(buffer.clone()), 10);
        sink.close().unwrap();
        assert!(buffer.0.lock().unwrap().is_empty());
    }
}
