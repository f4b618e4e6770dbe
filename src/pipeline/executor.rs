//! Pipeline executor.
//!
//! A pipeline is one source feeding one node. Each runs on a dedicated
//! thread, connected by bounded crossbeam channels; the calling thread acts
//! as the downstream sink:
//!
//! ```text
//! [source thread] ──bounded──► [node thread] ──bounded──► caller's sink
//! ```
//!
//! The node thread is the only thread that ever touches the node, so calls
//! into a node's interpreter are serialized. A node error stops the node
//! thread, which drops its input channel and in turn stops the source.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::format::{negotiate, VideoInfo};
use crate::pipeline::frame::VideoFrame;
use crate::pipeline::node::{FrameNode, FrameSource, NodeContext};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default capacity of each inter-thread channel, in frames.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Summary of a completed run.
#[derive(Debug)]
pub struct RunReport<N> {
    /// The node, handed back after deactivation.
    pub node: N,
    pub frames_sourced: u64,
    pub frames_processed: u64,
    pub frames_delivered: u64,
    pub elapsed: Duration,
    /// The error that stopped the node thread early, if any.
    pub error: Option<PipelineError>,
}

/// Builder for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    channel_capacity: usize,
    running: Arc<AtomicBool>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Share an external running flag, e.g. one cleared by a signal handler.
    pub fn running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn build<S, N>(self, source: S, node: N) -> Pipeline<S, N>
    where
        S: FrameSource + 'static,
        N: FrameNode + 'static,
    {
        Pipeline {
            source,
            node,
            channel_capacity: self.channel_capacity,
            running: self.running,
        }
    }
}

/// A source wired to a node.
pub struct Pipeline<S, N> {
    source: S,
    node: N,
    channel_capacity: usize,
    running: Arc<AtomicBool>,
}

impl<S, N> Pipeline<S, N>
where
    S: FrameSource + 'static,
    N: FrameNode + 'static,
{
    /// Flag that stops both threads when cleared.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// Negotiate the link format and configure the node's input.
    fn link(&mut self) -> PipelineResult<VideoInfo> {
        let format = negotiate(self.source.offered_formats(), self.node.supported_formats())?;
        self.source.select_format(format)?;

        let info = self.source.info();
        self.node.configure(&info)?;
        tracing::info!(
            "Linked {} -> {}: {}x{} {} time base {}",
            self.source.name(),
            self.node.name(),
            info.width,
            info.height,
            info.format,
            info.time_base
        );
        Ok(info)
    }

    /// Run until the source is exhausted, the node fails, or the running
    /// flag is cleared. `sink` receives every frame the node emits.
    ///
    /// Link and activation failures are returned as `Err`; failures while
    /// streaming are reported in [`RunReport::error`].
    pub fn run<F>(mut self, mut sink: F) -> PipelineResult<RunReport<N>>
    where
        F: FnMut(VideoFrame),
    {
        self.link()?;
        if let Err(e) = self.node.on_activate() {
            tracing::error!("Failed to activate {}: {}", self.node.name(), e);
            self.node.on_deactivate();
            return Err(e);
        }

        let started = Instant::now();
        let (in_tx, in_rx) = bounded::<VideoFrame>(self.channel_capacity);
        let (out_tx, out_rx) = bounded::<VideoFrame>(self.channel_capacity);

        let mut source = self.source;
        let source_running = self.running.clone();
        let source_thread = std::thread::spawn(move || {
            tracing::debug!("Source thread started");
            let mut sent = 0u64;
            while source_running.load(Ordering::Relaxed) {
                let Some(frame) = source.next_frame() else {
                    break;
                };
                if in_tx.send(frame).is_err() {
                    tracing::debug!("Node input closed, stopping source");
                    break;
                }
                sent += 1;
            }
            tracing::debug!("Source thread exiting after {} frames", sent);
            sent
        });

        let mut node = self.node;
        let node_running = self.running.clone();
        let node_thread = std::thread::spawn(move || {
            tracing::debug!("Node thread started");
            let mut output = Vec::new();
            let mut tick = 0u64;
            let mut error = None;

            for frame in in_rx.iter() {
                if !node_running.load(Ordering::Relaxed) {
                    break;
                }
                let mut ctx = NodeContext {
                    output: &mut output,
                    timestamp: started.elapsed(),
                    tick,
                };
                let result = node.filter_frame(frame, &mut ctx);
                tick += 1;

                for out in output.drain(..) {
                    if out_tx.send(out).is_err() {
                        error.get_or_insert(PipelineError::ChannelSend);
                        break;
                    }
                }
                if let Err(e) = result {
                    tracing::error!("{} failed on frame {}: {}", node.name(), tick - 1, e);
                    error = Some(e);
                }
                if error.is_some() {
                    node_running.store(false, Ordering::Relaxed);
                    break;
                }
            }

            drop(in_rx);
            node.on_deactivate();
            tracing::debug!("Node thread exiting after {} frames", tick);
            (node, tick, error)
        });

        let mut frames_delivered = 0u64;
        for frame in out_rx.iter() {
            sink(frame);
            frames_delivered += 1;
        }

        let frames_sourced = source_thread
            .join()
            .map_err(|_| PipelineError::WorkerPanicked("source"))?;
        let (node, frames_processed, error) = node_thread
            .join()
            .map_err(|_| PipelineError::WorkerPanicked("node"))?;

        Ok(RunReport {
            node,
            frames_sourced,
            frames_processed,
            frames_delivered,
            elapsed: started.elapsed(),
            error,
        })
    }
}
