//! Interpreter lifecycle
//!
//! [`Runtime`] owns exactly one started interpreter. It is finalized at most
//! once, either explicitly or when the runtime is dropped, so an early return
//! during node startup cannot leak a running interpreter.

use crate::error::{BridgeError, Result};
use crate::scripting::Interpreter;

/// One node's embedded runtime.
pub struct Runtime<I: Interpreter> {
    interpreter: Option<I>,
}

impl<I: Interpreter> Runtime<I> {
    /// Start a new runtime.
    pub fn start(settings: &I::Settings) -> Result<Self> {
        let interpreter = I::start(settings)?;
        tracing::info!("Interpreter started");
        Ok(Self {
            interpreter: Some(interpreter),
        })
    }

    pub fn is_running(&self) -> bool {
        self.interpreter.is_some()
    }

    pub fn get(&self) -> Result<&I> {
        self.interpreter.as_ref().ok_or(BridgeError::InvalidState {
            expected: "running interpreter",
            found: "finalized",
        })
    }

    pub fn get_mut(&mut self) -> Result<&mut I> {
        self.interpreter.as_mut().ok_or(BridgeError::InvalidState {
            expected: "running interpreter",
            found: "finalized",
        })
    }

    /// Finalize the runtime. Later calls are no-ops.
    pub fn finalize(&mut self) {
        if let Some(interpreter) = self.interpreter.take() {
            interpreter.finalize();
            tracing::info!("Interpreter finalized");
        }
    }
}

impl<I: Interpreter> Drop for Runtime<I> {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl<I: Interpreter> std::fmt::Debug for Runtime<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("running", &self.is_running())
            .finish()
    }
}
