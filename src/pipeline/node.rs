//! Node abstraction for the pipeline.
//!
//! - **`FrameSource`** produces frames on its own thread.
//! - **`FrameNode`** consumes one frame at a time and pushes zero or more
//!   frames into its context's output buffer.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::format::{PixelFormat, VideoInfo};
use crate::pipeline::frame::VideoFrame;
use crate::pipeline::port::PortDescriptor;
use std::time::Duration;

/// Context passed to a node for each frame.
pub struct NodeContext<'a> {
    /// Output buffer; everything pushed here is sent downstream in order.
    pub output: &'a mut Vec<VideoFrame>,
    /// Time since the pipeline started.
    pub timestamp: Duration,
    /// Number of frames this node has received before this one.
    pub tick: u64,
}

/// A frame-processing node.
pub trait FrameNode: Send {
    /// Human-readable name of this node.
    fn name(&self) -> &str;

    /// Port descriptors for this node.
    fn ports(&self) -> &[PortDescriptor];

    /// Input formats this node accepts, in order of preference.
    fn supported_formats(&self) -> &[PixelFormat];

    /// Record the properties of the negotiated input link.
    fn configure(&mut self, input: &VideoInfo) -> PipelineResult<()>;

    /// Called once before the first frame.
    fn on_activate(&mut self) -> PipelineResult<()> {
        Ok(())
    }

    /// Called for every input frame.
    fn filter_frame(&mut self, frame: VideoFrame, ctx: &mut NodeContext) -> PipelineResult<()>;

    /// Called once after the last frame, on success and on failure.
    fn on_deactivate(&mut self) {}
}

/// A producer of frames.
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    /// Formats this source can produce, in order of preference.
    fn offered_formats(&self) -> &[PixelFormat];

    /// Switch to a negotiated format.
    fn select_format(&mut self, format: PixelFormat) -> PipelineResult<()>;

    /// Properties of the output link.
    fn info(&self) -> VideoInfo;

    /// Produce the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Option<VideoFrame>;
}
