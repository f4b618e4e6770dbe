//! Node options
//!
//! The five options a script filter node is configured with, their help
//! strings, and the FFmpeg-style option string syntax
//! (`module=m:filter_function=f:init_args=cfg\=1`).

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};

/// Static descriptor for one node option.
#[derive(Debug, Clone, Copy)]
pub struct OptionDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub required: bool,
}

/// Every option the node accepts.
pub static OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor {
        name: "module",
        help: "Script module",
        required: true,
    },
    OptionDescriptor {
        name: "init_function",
        help: "Initialization function name",
        required: false,
    },
    OptionDescriptor {
        name: "init_args",
        help: "Argument string for init function",
        required: false,
    },
    OptionDescriptor {
        name: "filter_function",
        help: "Filter function name",
        required: true,
    },
    OptionDescriptor {
        name: "uninit_function",
        help: "Uninitialization function name",
        required: false,
    },
];

/// Look up an option descriptor by name.
pub fn find_option(name: &str) -> Option<&'static OptionDescriptor> {
    OPTIONS.iter().find(|o| o.name == name)
}

/// Immutable node configuration, fixed before startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterOptions {
    #[serde(default)]
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_args: Option<String>,
    #[serde(default)]
    pub filter_function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninit_function: Option<String>,
}

impl FilterOptions {
    /// Options with the two required fields set.
    pub fn new(module: impl Into<String>, filter_function: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            filter_function: filter_function.into(),
            ..Default::default()
        }
    }

    pub fn with_init(mut self, function: impl Into<String>, args: Option<&str>) -> Self {
        self.init_function = Some(function.into());
        self.init_args = args.map(str::to_string);
        self
    }

    pub fn with_uninit(mut self, function: impl Into<String>) -> Self {
        self.uninit_function = Some(function.into());
        self
    }

    /// Set a single option by name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.to_string();
        match key {
            "module" => self.module = value,
            "init_function" => self.init_function = Some(value),
            "init_args" => self.init_args = Some(value),
            "filter_function" => self.filter_function = value,
            "uninit_function" => self.uninit_function = Some(value),
            _ => {
                return Err(BridgeError::Config(format!("Unknown option '{}'", key)));
            }
        }
        Ok(())
    }

    /// Parse an option string of `key=value` pairs separated by `:`.
    ///
    /// A backslash escapes the next character, so values may contain `:` or `=`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut options = Self::default();
        for pair in split_unescaped(spec, ':') {
            if pair.is_empty() {
                continue;
            }
            let mut kv = split_unescaped(&pair, '=').into_iter();
            let key = kv.next().unwrap_or_default();
            let value = kv.next().ok_or_else(|| {
                BridgeError::Config(format!("Option '{}' has no value", unescape(&key)))
            })?;
            if kv.next().is_some() {
                return Err(BridgeError::Config(format!(
                    "Option '{}' has more than one '='",
                    unescape(&key)
                )));
            }
            options.set(unescape(&key).trim(), &unescape(&value))?;
        }
        options.validate()?;
        Ok(options)
    }

    /// Check that required options are present.
    pub fn validate(&self) -> Result<()> {
        if self.module.trim().is_empty() {
            return Err(BridgeError::Config("Option 'module' is required".to_string()));
        }
        if self.filter_function.trim().is_empty() {
            return Err(BridgeError::Config(
                "Option 'filter_function' is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Render back to option string syntax.
    pub fn to_option_string(&self) -> String {
        let mut parts = vec![
            format!("module={}", escape(&self.module)),
            format!("filter_function={}", escape(&self.filter_function)),
        ];
        if let Some(ref f) = self.init_function {
            parts.push(format!("init_function={}", escape(f)));
        }
        if let Some(ref a) = self.init_args {
            parts.push(format!("init_args={}", escape(a)));
        }
        if let Some(ref f) = self.uninit_function {
            parts.push(format!("uninit_function={}", escape(f)));
        }
        parts.join(":")
    }
}

/// Split on `sep`, keeping escapes intact for a later `unescape`.
fn split_unescaped(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == sep {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | ':' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
