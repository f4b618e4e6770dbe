//! Embedded scripting layer
//!
//! The bridge talks to the embedded runtime only through the [`Interpreter`]
//! trait. Two implementations exist:
//!
//! - [`RhaiInterpreter`] - the production engine; modules are `.rhai` files
//!   found on the module search path
//! - [`mock::RecordingInterpreter`] - an instrumented fake that journals every
//!   construct/release pair (only with `cfg(test)` or the `mock-interpreter`
//!   feature)
//!
//! Every value an interpreter hands out (`Module`, `Callable`, `Args`,
//! `Value`) is an owned handle. Dropping the handle releases the underlying
//! reference, so the bridge never pairs a construct with a manual release.
//!
//! ## Script Interface
//!
//! A module exposes plain functions:
//!
//! ```rhai
//! fn setup(args) {
//!     this.frames = 0;
//! }
//!
//! fn filter(pts, width, height, handle) {
//!     this.frames += 1;
//!     let px = pixel_get(handle, 0, 0);
//!     pixel_set(handle, 0, 0, 255 - px[0], 255 - px[1], 255 - px[2]);
//! }
//!
//! fn teardown() {
//!     print(`processed ${this.frames} frames`);
//! }
//! ```
//!
//! `this` is a per-module state map that survives between hook calls.
//! See [`plane`] for the pixel access functions.

mod engine;
#[cfg(any(test, feature = "mock-interpreter"))]
pub mod mock;
pub mod plane;

pub use engine::{
    RhaiArgs, RhaiCallable, RhaiInterpreter, RhaiModule, MODULE_EXTENSION, MODULE_PATH_ENV,
};
pub use plane::{PlaneAccess, PlaneMapping};

use crate::error::Result;
use std::fmt;

/// The three lifecycle points at which the bridge calls into a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Init,
    Filter,
    Uninit,
}

impl HookKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::Init => "init",
            HookKind::Filter => "filter",
            HookKind::Uninit => "uninit",
        }
    }

    /// Number of arguments the bridge passes to this hook.
    pub fn arity(self) -> usize {
        match self {
            HookKind::Init => 1,
            HookKind::Filter => 4,
            HookKind::Uninit => 0,
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that can cross the native/script boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Float(f64),
    Int(i64),
    Text(String),
}

impl ScriptValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ScriptValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for ScriptValue {
    fn from(v: f64) -> Self {
        ScriptValue::Float(v)
    }
}

impl From<i64> for ScriptValue {
    fn from(v: i64) -> Self {
        ScriptValue::Int(v)
    }
}

impl From<String> for ScriptValue {
    fn from(v: String) -> Self {
        ScriptValue::Text(v)
    }
}

impl From<&str> for ScriptValue {
    fn from(v: &str) -> Self {
        ScriptValue::Text(v.to_string())
    }
}

/// Ordered positional arguments for one hook call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentList(Vec<ScriptValue>);

impl ArgumentList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(arity: usize) -> Self {
        Self(Vec::with_capacity(arity))
    }

    pub fn push(&mut self, value: impl Into<ScriptValue>) {
        self.0.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ScriptValue> {
        self.0.get(index)
    }

    pub fn as_slice(&self) -> &[ScriptValue] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<ScriptValue> {
        self.0
    }
}

impl FromIterator<ScriptValue> for ArgumentList {
    fn from_iter<T: IntoIterator<Item = ScriptValue>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of looking a hook name up on a loaded module.
#[derive(Debug)]
pub enum Resolved<C> {
    /// The name refers to something the bridge can call.
    Found(C),
    /// The module has no attribute with that name.
    MissingAttribute,
    /// The attribute exists but is not invocable with the hook's arity.
    NotCallable,
}

impl<C> Resolved<C> {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolved::Found(_))
    }
}

/// An error raised inside the script during a hook call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptFault {
    message: String,
}

impl ScriptFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ScriptFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ScriptFault {}

impl From<Box<rhai::EvalAltResult>> for ScriptFault {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        ScriptFault::new(err.to_string())
    }
}

/// Embedded runtime as seen by the bridge.
///
/// An implementation value *is* the running interpreter: constructing it via
/// [`Interpreter::start`] initializes the runtime, and [`Interpreter::finalize`]
/// consumes it. Handles it returned earlier must be dropped before finalizing.
pub trait Interpreter: Sized {
    /// Per-implementation startup settings.
    type Settings;
    /// Owned reference to a loaded module.
    type Module;
    /// Owned reference to a resolved hook.
    type Callable;
    /// Owned argument container for a single call.
    type Args;
    /// Owned return value of a single call.
    type Value;

    /// Initialize the runtime.
    fn start(settings: &Self::Settings) -> Result<Self>;

    /// Load a module by name, running its top-level body once.
    ///
    /// Fails with `BridgeError::ModuleNotFound`.
    fn import(&mut self, name: &str) -> Result<Self::Module>;

    /// Look up `name` on `module` as a callable taking `arity` arguments.
    fn resolve(&mut self, module: &Self::Module, name: &str, arity: usize)
        -> Resolved<Self::Callable>;

    /// Move every argument into a fresh container sized to the list.
    fn pack(&mut self, args: ArgumentList) -> Self::Args;

    /// Call a hook. Faults raised inside the script come back as `Err`.
    fn call(
        &mut self,
        module: &mut Self::Module,
        callable: &Self::Callable,
        args: &Self::Args,
    ) -> std::result::Result<Self::Value, ScriptFault>;

    /// Capability handle through which scripts reach the mapped pixel plane.
    fn plane_access(&self) -> PlaneAccess;

    /// Shut the runtime down. Irreversible.
    fn finalize(self);
}
