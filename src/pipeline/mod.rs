//! Video pipeline host.
//!
//! Frames flow from a source, through one node, to a sink. Source and node
//! each run on a dedicated thread and communicate via crossbeam channels.
//!
//! # Architecture
//!
//! ```text
//! [TestPatternSource] ──► [ScriptFilterNode] ──► sink closure
//! ```
//!
//! # Design
//!
//! - **Copy-on-write frames** - `VideoFrame` shares its buffer until a node
//!   asks to write to it.
//! - **Negotiation** - the first format the source offers that the node
//!   supports wins; the script filter supports only packed RGB24.
//! - **Dedicated threads** - one per source and per node, so each node's
//!   interpreter is only ever called from one thread.

pub mod error;
pub mod executor;
pub mod format;
pub mod frame;
pub mod node;
pub mod nodes;
pub mod port;

pub use crate::types::Rational;
pub use error::{PipelineError, PipelineResult};
pub use executor::{Pipeline, PipelineBuilder, RunReport, DEFAULT_CHANNEL_CAPACITY};
pub use format::{negotiate, PixelFormat, VideoInfo};
pub use frame::VideoFrame;
pub use node::{FrameNode, FrameSource, NodeContext};
pub use nodes::{FilterStats, ScriptFilterNode, TestPatternSource};
pub use port::{PortDescriptor, PortDirection, PortKind};
