//! Pipeline-specific error types.

use crate::error::BridgeError;
use crate::pipeline::format::PixelFormat;
use thiserror::Error;

/// Errors that can occur within the pipeline host.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Format negotiation failed: offered {offered:?}, supported {supported:?}")]
    Negotiation {
        offered: Vec<PixelFormat>,
        supported: Vec<PixelFormat>,
    },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Channel send error")]
    ChannelSend,

    #[error("Node '{0}' used before its input link was configured")]
    NotConfigured(String),

    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
