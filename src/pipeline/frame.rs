//! Video frame representation.
//!
//! Frame buffers are reference counted. Cloning a frame shares its pixels;
//! [`VideoFrame::make_writable`] copies the buffer first if anyone else still
//! holds it.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::format::{PixelFormat, VideoInfo};
use crate::types::Rational;
use std::sync::Arc;

/// One decoded video frame with a single packed plane.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    data: Arc<Vec<u8>>,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    /// Presentation timestamp in `time_base` units.
    pub pts: Option<i64>,
    pub time_base: Rational,
    /// Position in the stream, assigned by the source.
    pub sequence: u64,
}

impl VideoFrame {
    /// A black, tightly packed frame.
    pub fn new(info: &VideoInfo, pts: Option<i64>, sequence: u64) -> Self {
        Self {
            data: Arc::new(vec![0; info.plane_len()]),
            width: info.width,
            height: info.height,
            stride: info.stride(),
            format: info.format,
            pts,
            time_base: info.time_base,
            sequence,
        }
    }

    /// Wrap an existing, possibly shared, buffer.
    pub fn from_shared(
        info: &VideoInfo,
        data: Arc<Vec<u8>>,
        stride: usize,
        pts: Option<i64>,
        sequence: u64,
    ) -> PipelineResult<Self> {
        if stride < info.stride() {
            return Err(PipelineError::InvalidFrame(format!(
                "stride {} is shorter than a {}-pixel {} row",
                stride, info.width, info.format
            )));
        }
        let needed = stride * info.height as usize;
        if data.len() < needed {
            return Err(PipelineError::InvalidFrame(format!(
                "buffer of {} bytes too small for {}x{} with stride {}",
                data.len(),
                info.width,
                info.height,
                stride
            )));
        }
        Ok(Self {
            data,
            width: info.width,
            height: info.height,
            stride,
            format: info.format,
            pts,
            time_base: info.time_base,
            sequence,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the buffer can be written without copying.
    pub fn is_writable(&self) -> bool {
        Arc::strong_count(&self.data) == 1 && Arc::weak_count(&self.data) == 0
    }

    /// Ensure exclusive ownership of the buffer and return it.
    pub fn make_writable(&mut self) -> &mut [u8] {
        if !self.is_writable() {
            tracing::trace!("Copying shared buffer of frame {}", self.sequence);
        }
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    /// Presentation time in seconds, NaN without a timestamp.
    pub fn pts_seconds(&self) -> f64 {
        self.time_base.to_seconds(self.pts)
    }

    /// Whether this frame matches the geometry and format of `info`.
    pub fn matches(&self, info: &VideoInfo) -> bool {
        self.width == info.width && self.height == info.height && self.format == info.format
    }
}
