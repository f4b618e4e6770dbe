//! ScriptFilterNode - runs a script module's filter hook on every frame.
//!
//! The node owns one [`ScriptBridge`] and therefore one interpreter. Per
//! frame it:
//!
//! 1. makes the frame writable (copying a shared buffer),
//! 2. maps the plane and calls the filter hook, unless the frame's time is
//!    outside the configured timeline window,
//! 3. forwards the frame downstream, whether or not the hook faulted.
//!
//! A frame that does not match the negotiated link is forwarded without a
//! hook call and then reported as `PipelineError::InvalidFrame`.
//!
//! Hook faults are then handled according to [`FrameErrorPolicy`].

use crate::bridge::{BridgeState, ScriptBridge};
use crate::config::{BridgeConfig, FilterOptions, FrameErrorPolicy, TimelineWindow};
use crate::error::BridgeError;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::format::{PixelFormat, VideoInfo};
use crate::pipeline::frame::VideoFrame;
use crate::pipeline::node::{FrameNode, NodeContext};
use crate::pipeline::port::{PortDescriptor, PortKind};
use crate::scripting::{Interpreter, RhaiInterpreter};
use serde::Serialize;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("default", PortKind::Video),
    PortDescriptor::output("default", PortKind::Video),
];

static FORMATS: &[PixelFormat] = &[PixelFormat::Rgb24];

/// Per-node counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterStats {
    pub frames_in: u64,
    pub frames_forwarded: u64,
    pub hook_calls: u64,
    pub hook_faults: u64,
    /// Frames outside the timeline window.
    pub frames_bypassed: u64,
    pub last_error: Option<String>,
}

/// Video filter node backed by a script module.
pub struct ScriptFilterNode<I: Interpreter> {
    name: String,
    settings: I::Settings,
    timeline: TimelineWindow,
    policy: FrameErrorPolicy,
    bridge: ScriptBridge<I>,
    input: Option<VideoInfo>,
    stats: FilterStats,
}

impl ScriptFilterNode<RhaiInterpreter> {
    /// Build a Rhai-backed node from a full configuration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.filter.clone(), config.engine.clone())
            .with_timeline(config.timeline)
            .with_policy(config.engine.on_frame_error)
    }
}

impl<I: Interpreter> ScriptFilterNode<I> {
    pub fn new(options: FilterOptions, settings: I::Settings) -> Self {
        Self {
            name: format!("scriptfilter({})", options.module),
            settings,
            timeline: TimelineWindow::default(),
            policy: FrameErrorPolicy::default(),
            bridge: ScriptBridge::new(options),
            input: None,
            stats: FilterStats::default(),
        }
    }

    pub fn with_timeline(mut self, timeline: TimelineWindow) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn with_policy(mut self, policy: FrameErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    pub fn state(&self) -> BridgeState {
        self.bridge.state()
    }

    pub fn bridge(&self) -> &ScriptBridge<I> {
        &self.bridge
    }

    pub fn input_info(&self) -> Option<&VideoInfo> {
        self.input.as_ref()
    }

    /// Map the frame's plane and run the filter hook on it.
    fn call_filter(&mut self, frame: &mut VideoFrame) -> crate::error::Result<()> {
        let (pts, time_base) = (frame.pts, frame.time_base);
        let (width, height, stride) = (frame.width(), frame.height(), frame.stride());

        let plane = frame.make_writable();
        self.bridge
            .process_plane(pts, time_base, plane, stride, width, height)
    }
}

impl<I> FrameNode for ScriptFilterNode<I>
where
    I: Interpreter + Send,
    I::Settings: Send,
    I::Module: Send,
    I::Callable: Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn supported_formats(&self) -> &[PixelFormat] {
        FORMATS
    }

    fn configure(&mut self, input: &VideoInfo) -> PipelineResult<()> {
        if input.format != PixelFormat::Rgb24 {
            return Err(PipelineError::Negotiation {
                offered: vec![input.format],
                supported: FORMATS.to_vec(),
            });
        }
        self.input = Some(*input);
        Ok(())
    }

    fn on_activate(&mut self) -> PipelineResult<()> {
        if self.input.is_none() {
            return Err(PipelineError::NotConfigured(self.name.clone()));
        }
        self.bridge.startup(&self.settings)?;
        Ok(())
    }

    fn filter_frame(&mut self, mut frame: VideoFrame, ctx: &mut NodeContext) -> PipelineResult<()> {
        let info = self
            .input
            .ok_or_else(|| PipelineError::NotConfigured(self.name.clone()))?;
        if !frame.matches(&info) {
            let error = PipelineError::InvalidFrame(format!(
                "frame {} is {}x{} {}, link is {}x{} {}",
                frame.sequence,
                frame.width(),
                frame.height(),
                frame.format(),
                info.width,
                info.height,
                info.format
            ));
            // passed on untouched; the script only ever sees negotiated frames
            ctx.output.push(frame);
            self.stats.frames_forwarded += 1;
            return Err(error);
        }
        self.stats.frames_in += 1;

        let outcome = if self.timeline.contains(frame.pts_seconds()) {
            self.stats.hook_calls += 1;
            self.call_filter(&mut frame)
        } else {
            self.stats.frames_bypassed += 1;
            Ok(())
        };

        ctx.output.push(frame);
        self.stats.frames_forwarded += 1;

        match outcome {
            Ok(()) => Ok(()),
            Err(e @ BridgeError::FilterHookFailed { .. }) => {
                self.stats.hook_faults += 1;
                self.stats.last_error = Some(e.to_string());
                match self.policy {
                    FrameErrorPolicy::Log => {
                        tracing::warn!("{}", e);
                        Ok(())
                    }
                    FrameErrorPolicy::Fail => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn on_deactivate(&mut self) {
        if let Err(e) = self.bridge.shutdown() {
            self.stats.last_error = Some(e.to_string());
        }
        tracing::info!(
            "{}: {} frames in, {} hook calls, {} faults, {} bypassed",
            self.name,
            self.stats.frames_in,
            self.stats.hook_calls,
            self.stats.hook_faults,
            self.stats.frames_bypassed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::port::PortDirection;
    use crate::scripting::mock::{Event, FakeModule, MockSettings, RecordingInterpreter};
    use crate::scripting::ScriptValue;
    use crate::types::Rational;
    use std::sync::Arc;
    use std::time::Duration;

    type MockNode = ScriptFilterNode<RecordingInterpreter>;

    fn info() -> VideoInfo {
        VideoInfo::new(2, 1, Rational::new(1, 10), PixelFormat::Rgb24)
    }

    fn active_node(module: FakeModule) -> (MockNode, MockSettings) {
        let settings = MockSettings::new().with_module("m", module);
        let mut node = MockNode::new(FilterOptions::new("m", "f"), settings.clone());
        node.configure(&info()).unwrap();
        node.on_activate().unwrap();
        (node, settings)
    }

    fn push(node: &mut MockNode, frame: VideoFrame) -> (PipelineResult<()>, Vec<VideoFrame>) {
        let mut output = Vec::new();
        let mut ctx = NodeContext {
            output: &mut output,
            timestamp: Duration::ZERO,
            tick: frame.sequence,
        };
        let result = node.filter_frame(frame, &mut ctx);
        (result, output)
    }

    #[test]
    fn test_pads() {
        let node = MockNode::new(FilterOptions::new("m", "f"), MockSettings::new());
        let ports = node.ports();
        assert_eq!(ports.len(), 2);
        assert!(ports
            .iter()
            .all(|p| p.name == "default" && p.kind == PortKind::Video));
        assert_eq!(ports[0].direction, PortDirection::Input);
        assert_eq!(node.supported_formats(), &[PixelFormat::Rgb24]);
    }

    #[test]
    fn test_configure_rejects_other_formats() {
        let mut node = MockNode::new(FilterOptions::new("m", "f"), MockSettings::new());
        let gray = VideoInfo {
            format: PixelFormat::Gray8,
            ..info()
        };
        assert!(node.configure(&gray).is_err());
        assert!(matches!(
            node.on_activate(),
            Err(PipelineError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_frame_forwarded_once_with_metadata() {
        let (mut node, settings) = active_node(FakeModule::new().function("f", 4));
        let frame = VideoFrame::new(&info(), Some(15), 7);

        let (result, output) = push(&mut node, frame);
        result.unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].pts, Some(15));
        assert_eq!(output[0].sequence, 7);
        assert_eq!(output[0].time_base, Rational::new(1, 10));

        let calls = settings.journal().calls_to("f");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], ScriptValue::Float(1.5));
        assert_eq!(calls[0][1], ScriptValue::Int(2));
        assert_eq!(calls[0][2], ScriptValue::Int(1));
        assert!(calls[0][3].as_int().is_some());
    }

    #[test]
    fn test_writes_do_not_leak_into_shared_buffer() {
        let (mut node, _) = active_node(FakeModule::new().handler_function(
            "f",
            4,
            |plane, args| {
                let handle = args[3].as_int().ok_or("no handle")?;
                plane.write_pixel(handle, 1, 0, [1, 2, 3])
            },
        ));
        let shared = Arc::new(vec![0u8; 6]);
        let frame = VideoFrame::from_shared(&info(), shared.clone(), 6, Some(0), 0).unwrap();

        let (result, output) = push(&mut node, frame);
        result.unwrap();
        assert_eq!(output[0].data(), &[0, 0, 0, 1, 2, 3]);
        assert_eq!(shared.as_slice(), &[0; 6]);
    }

    #[test]
    fn test_log_policy_forwards_and_counts() {
        let (mut node, _) = active_node(FakeModule::new().failing_function("f", 4, "boom"));

        let (result, output) = push(&mut node, VideoFrame::new(&info(), Some(0), 0));
        assert!(result.is_ok());
        assert_eq!(output.len(), 1);
        assert_eq!(node.stats().hook_faults, 1);
        assert!(node.stats().last_error.as_deref().unwrap().contains("boom"));
    }

    #[test]
    fn test_fail_policy_forwards_then_errors() {
        let settings = MockSettings::new()
            .with_module("m", FakeModule::new().failing_function("f", 4, "boom"));
        let mut node = MockNode::new(FilterOptions::new("m", "f"), settings)
            .with_policy(FrameErrorPolicy::Fail);
        node.configure(&info()).unwrap();
        node.on_activate().unwrap();

        let (result, output) = push(&mut node, VideoFrame::new(&info(), Some(0), 0));
        assert_eq!(output.len(), 1);
        assert!(matches!(
            result,
            Err(PipelineError::Bridge(BridgeError::FilterHookFailed { .. }))
        ));
    }

    #[test]
    fn test_timeline_bypass() {
        let settings = MockSettings::new().with_module("m", FakeModule::new().function("f", 4));
        let journal = settings.journal();
        let mut node = MockNode::new(FilterOptions::new("m", "f"), settings).with_timeline(
            TimelineWindow {
                start: Some(1.0),
                end: Some(2.0),
            },
        );
        node.configure(&info()).unwrap();
        node.on_activate().unwrap();

        let mut forwarded = 0;
        for pts in [0, 5, 10, 15, 20, 25] {
            let (result, output) = push(&mut node, VideoFrame::new(&info(), Some(pts), 0));
            result.unwrap();
            forwarded += output.len();
        }
        assert_eq!(forwarded, 6);
        assert_eq!(journal.call_count(), 3);
        assert_eq!(node.stats().frames_bypassed, 3);
    }

    #[test]
    fn test_mismatched_frame_forwarded_then_rejected() {
        let (mut node, _) = active_node(FakeModule::new().function("f", 4));
        let other = VideoInfo::new(4, 4, Rational::new(1, 10), PixelFormat::Rgb24);
        let (result, output) = push(&mut node, VideoFrame::new(&other, None, 0));
        assert!(matches!(result, Err(PipelineError::InvalidFrame(_))));
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].width(), 4);
        assert_eq!(node.stats().frames_forwarded, 1);
        assert_eq!(node.stats().hook_calls, 0);
    }

    #[test]
    fn test_deactivate_finalizes() {
        let (mut node, settings) = active_node(FakeModule::new().function("f", 4));
        node.on_deactivate();
        assert_eq!(node.state(), BridgeState::Finalized);
        assert!(settings
            .journal()
            .events()
            .contains(&Event::Finalized { outstanding: 0 }));
    }
}
