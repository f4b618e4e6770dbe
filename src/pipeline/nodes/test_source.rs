//! TestPatternSource - synthetic video source.
//!
//! Produces a fixed gradient (red along x, green along y, constant blue) at a
//! constant frame rate. By default every frame shares one pattern buffer, so
//! a node that writes to a frame has to copy it first.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::format::{PixelFormat, VideoInfo};
use crate::pipeline::frame::VideoFrame;
use crate::pipeline::node::FrameSource;
use crate::types::Rational;
use std::sync::Arc;

/// Test-pattern source.
#[derive(Debug, Clone)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    time_base: Rational,
    formats: Vec<PixelFormat>,
    format: PixelFormat,
    /// `None` = unbounded.
    frame_count: Option<u64>,
    next: u64,
    with_pts: bool,
    shared: bool,
    pattern: Option<Arc<Vec<u8>>>,
}

impl TestPatternSource {
    /// One frame per `time_base` tick, RGB24 only.
    pub fn new(width: u32, height: u32, time_base: Rational) -> Self {
        Self {
            width,
            height,
            time_base,
            formats: vec![PixelFormat::Rgb24],
            format: PixelFormat::Rgb24,
            frame_count: None,
            next: 0,
            with_pts: true,
            shared: true,
            pattern: None,
        }
    }

    pub fn with_frame_count(mut self, frames: u64) -> Self {
        self.frame_count = Some(frames);
        self
    }

    /// Replace the offered formats.
    pub fn with_formats(mut self, formats: &[PixelFormat]) -> Self {
        self.formats = formats.to_vec();
        if let Some(&first) = formats.first() {
            self.format = first;
        }
        self.pattern = None;
        self
    }

    /// Emit frames without timestamps.
    pub fn without_pts(mut self) -> Self {
        self.with_pts = false;
        self
    }

    /// Give every frame its own buffer instead of sharing the pattern.
    pub fn unshared(mut self) -> Self {
        self.shared = false;
        self
    }

    /// Expected pattern bytes for pixel `(x, y)` in RGB24.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        [scale(x, self.width), scale(y, self.height), 0x80]
    }

    fn render(&self) -> Vec<u8> {
        let info = self.info();
        let mut data = vec![0u8; info.plane_len()];
        let bpp = self.format.bytes_per_pixel();
        for y in 0..self.height {
            for x in 0..self.width {
                let offset = y as usize * info.stride() + x as usize * bpp;
                let [r, g, b] = self.rgb_at(x, y);
                match self.format {
                    PixelFormat::Rgb24 => data[offset..offset + 3].copy_from_slice(&[r, g, b]),
                    PixelFormat::Rgba => data[offset..offset + 4].copy_from_slice(&[r, g, b, 0xff]),
                    PixelFormat::Gray8 => data[offset] = ((r as u16 + g as u16) / 2) as u8,
                }
            }
        }
        data
    }
}

fn scale(pos: u32, extent: u32) -> u8 {
    if extent <= 1 {
        0
    } else {
        (pos as u64 * 255 / (extent as u64 - 1)) as u8
    }
}

impl FrameSource for TestPatternSource {
    fn name(&self) -> &str {
        "testsrc"
    }

    fn offered_formats(&self) -> &[PixelFormat] {
        &self.formats
    }

    fn select_format(&mut self, format: PixelFormat) -> PipelineResult<()> {
        if !self.formats.contains(&format) {
            return Err(PipelineError::Negotiation {
                offered: self.formats.clone(),
                supported: vec![format],
            });
        }
        self.format = format;
        self.pattern = None;
        Ok(())
    }

    fn info(&self) -> VideoInfo {
        VideoInfo::new(self.width, self.height, self.time_base, self.format)
    }

    fn next_frame(&mut self) -> Option<VideoFrame> {
        if self.frame_count.is_some_and(|n| self.next >= n) {
            return None;
        }

        let info = self.info();
        let data = if self.shared {
            if self.pattern.is_none() {
                self.pattern = Some(Arc::new(self.render()));
            }
            self.pattern.clone()?
        } else {
            Arc::new(self.render())
        };

        let sequence = self.next;
        self.next += 1;
        let pts = self.with_pts.then_some(sequence as i64);
        VideoFrame::from_shared(&info, data, info.stride(), pts, sequence).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_frame_count() {
        let mut src = TestPatternSource::new(2, 2, Rational::new(1, 25)).with_frame_count(3);
        let frames: Vec<_> = std::iter::from_fn(|| src.next_frame()).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].pts, Some(2));
        assert_eq!(frames[2].pts_seconds(), 0.08);
    }

    #[test]
    fn test_pattern_content_and_sharing() {
        let mut src = TestPatternSource::new(3, 2, Rational::new(1, 25));
        let a = src.next_frame().unwrap();
        let b = src.next_frame().unwrap();
        assert!(!a.is_writable());
        assert_eq!(a.data(), b.data());
        assert_eq!(&a.data()[6..9], &[255, 0, 0x80]);
        assert_eq!(&a.data()[9..12], &[0, 255, 0x80]);

        let mut src = src.unshared().without_pts();
        let c = src.next_frame().unwrap();
        assert!(c.is_writable());
        assert!(c.pts.is_none());
    }

    #[test]
    fn test_select_format() {
        let mut src = TestPatternSource::new(2, 2, Rational::new(1, 25))
            .with_formats(&[PixelFormat::Gray8, PixelFormat::Rgb24]);
        assert_eq!(src.info().format, PixelFormat::Gray8);
        src.select_format(PixelFormat::Rgb24).unwrap();
        assert_eq!(src.next_frame().unwrap().data().len(), 12);
        assert!(src.select_format(PixelFormat::Rgba).is_err());
    }
}
