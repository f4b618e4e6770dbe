//! # scriptfilter: Script-driven video filter node
//!
//! A video filter node that hands every frame to a dynamically loaded Rhai
//! script module. The node starts one embedded interpreter, loads the
//! configured module, binds its filter hook, optionally runs an init hook,
//! calls the filter hook once per frame, and on shutdown runs an optional
//! uninit hook before finalizing the interpreter.
//!
//! ## Architecture
//!
//! - **Scripting**: the `Interpreter` seam, the Rhai implementation and the
//!   plane capability through which scripts touch pixels
//! - **Bridge**: lifecycle, module/hook resolution, frame marshaling and the
//!   uniform call-and-release protocol
//! - **Pipeline**: frames, format negotiation, the `ScriptFilterNode` and a
//!   threaded executor connected by crossbeam channels
//! - **Config**: node options, engine settings and TOML config files
//!
//! ## Example
//!
//! ```ignore
//! use scriptfilter::{
//!     config::{BridgeConfig, FilterOptions},
//!     pipeline::{PipelineBuilder, ScriptFilterNode, TestPatternSource},
//!     types::Rational,
//! };
//!
//! let options = FilterOptions::parse("module=invert:filter_function=filter")?;
//! let node = ScriptFilterNode::from_config(&BridgeConfig::new(options));
//! let source = TestPatternSource::new(320, 240, Rational::from_fps(25)).with_frame_count(100);
//!
//! let report = PipelineBuilder::new().build(source, node).run(|_frame| {})?;
//! println!("{:?}", report.node.stats());
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scripting;
pub mod types;

// Re-export commonly used types
pub use bridge::{BridgeState, FrameDescriptor, ScriptBridge};
pub use config::{BridgeConfig, EngineSettings, FilterOptions, FrameErrorPolicy, TimelineWindow};
pub use error::{BridgeError, Result};
pub use scripting::{HookKind, Interpreter, RhaiInterpreter, ScriptValue};
pub use types::Rational;
