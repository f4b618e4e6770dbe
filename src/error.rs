//! Error handling for scriptfilter
//!
//! This module defines the error type shared by the bridge, the scripting
//! layer and the configuration layer, plus a Result alias.

use crate::scripting::{HookKind, ScriptFault};
use thiserror::Error;

/// Main error type for scriptfilter operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The configured module could not be found, compiled or initialized
    #[error("Module '{module}' could not be loaded: {reason}")]
    ModuleNotFound { module: String, reason: String },

    /// A configured hook name is not an attribute of the loaded module
    #[error("{hook} hook '{name}' not found in module")]
    AttributeMissing { hook: HookKind, name: String },

    /// A configured hook name exists but cannot be invoked as a hook
    #[error("{hook} hook '{name}' is not callable")]
    NotCallable { hook: HookKind, name: String },

    /// The init hook raised an error inside the script
    #[error("Init hook '{name}' failed: {fault}")]
    InitHookFailed { name: String, fault: ScriptFault },

    /// The uninit hook could not be resolved or raised an error
    #[error("Uninit hook '{name}' failed: {reason}")]
    UninitHookFailed { name: String, reason: String },

    /// The filter hook raised an error while processing a frame
    #[error("Filter hook '{name}' failed on frame {sequence}: {fault}")]
    FilterHookFailed {
        name: String,
        sequence: u64,
        fault: ScriptFault,
    },

    /// Errors related to configuration loading and validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation was attempted in the wrong lifecycle state
    #[error("Invalid state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        BridgeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error aborts node startup.
    pub fn is_fatal_at_startup(&self) -> bool {
        match self {
            BridgeError::ModuleNotFound { .. }
            | BridgeError::InitHookFailed { .. }
            | BridgeError::Config(_) => true,
            BridgeError::AttributeMissing { hook, .. } | BridgeError::NotCallable { hook, .. } => {
                *hook != HookKind::Uninit
            }
            BridgeError::WithContext { source, .. } => source.is_fatal_at_startup(),
            _ => false,
        }
    }

    /// Strip any context wrappers and return the underlying error.
    pub fn root(&self) -> &BridgeError {
        match self {
            BridgeError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for scriptfilter operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| BridgeError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| BridgeError::Io(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::AttributeMissing {
            hook: HookKind::Filter,
            name: "f".to_string(),
        };
        assert_eq!(err.to_string(), "filter hook 'f' not found in module");
    }

    #[test]
    fn test_error_with_context() {
        let err = BridgeError::Config("missing module".to_string());
        let with_ctx = err.with_context("Failed to start node");
        assert!(with_ctx.to_string().contains("Failed to start node"));
        assert!(matches!(with_ctx.root(), BridgeError::Config(_)));
    }

    #[test]
    fn test_fatal_classification() {
        let missing_uninit = BridgeError::AttributeMissing {
            hook: HookKind::Uninit,
            name: "bye".to_string(),
        };
        assert!(!missing_uninit.is_fatal_at_startup());

        let missing_filter = BridgeError::NotCallable {
            hook: HookKind::Filter,
            name: "f".to_string(),
        };
        assert!(missing_filter.is_fatal_at_startup());

        let not_found = BridgeError::ModuleNotFound {
            module: "m".to_string(),
            reason: "no such file".to_string(),
        }
        .with_context("startup");
        assert!(not_found.is_fatal_at_startup());
    }
}
