//! Pixel formats and link negotiation.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::types::Rational;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Packed pixel layouts a link can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed 8-bit RGB, no alpha.
    Rgb24,
    /// Packed 8-bit RGBA.
    Rgba,
    /// Single 8-bit luma plane.
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba => 4,
            PixelFormat::Gray8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Gray8 => "gray",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Properties of a configured video link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub time_base: Rational,
    pub format: PixelFormat,
}

impl VideoInfo {
    pub fn new(width: u32, height: u32, time_base: Rational, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            time_base,
            format,
        }
    }

    /// Bytes per row of a tightly packed plane.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn plane_len(&self) -> usize {
        self.stride() * self.height as usize
    }
}

/// Pick the first format in `offered` that `supported` accepts.
pub fn negotiate(
    offered: &[PixelFormat],
    supported: &[PixelFormat],
) -> PipelineResult<PixelFormat> {
    offered
        .iter()
        .copied()
        .find(|f| supported.contains(f))
        .ok_or_else(|| PipelineError::Negotiation {
            offered: offered.to_vec(),
            supported: supported.to_vec(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate() {
        let supported = [PixelFormat::Rgb24];
        assert_eq!(
            negotiate(&[PixelFormat::Gray8, PixelFormat::Rgb24], &supported).unwrap(),
            PixelFormat::Rgb24
        );
        assert!(matches!(
            negotiate(&[PixelFormat::Rgba, PixelFormat::Gray8], &supported),
            Err(PipelineError::Negotiation { .. })
        ));
        assert!(negotiate(&[], &supported).is_err());
    }

    #[test]
    fn test_video_info_geometry() {
        let info = VideoInfo::new(640, 480, Rational::new(1, 25), PixelFormat::Rgb24);
        assert_eq!(info.stride(), 1920);
        assert_eq!(info.plane_len(), 1920 * 480);
    }
}
