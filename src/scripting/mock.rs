//! Recording Interpreter for Testing
//!
//! [`RecordingInterpreter`] stands in for the Rhai engine. Modules are
//! described in memory with [`FakeModule`], and every construct/release of a
//! module, callable, argument container or return value is appended to a
//! shared [`Journal`]. Tests use the journal to check call order, argument
//! shapes and that nothing is left unreleased when the runtime finalizes.
//!
//! # Example
//!
//! ```ignore
//! use scriptfilter::scripting::mock::{FakeModule, MockSettings, RecordingInterpreter};
//!
//! let settings = MockSettings::new()
//!     .with_module("m", FakeModule::new().function("setup", 1).function("f", 4));
//! let journal = settings.journal();
//!
//! let bridge = ScriptBridge::<RecordingInterpreter>::start(options, &settings)?;
//! assert_eq!(journal.calls_to("setup").len(), 1);
//! ```
//!
//! # Enabling
//!
//! Outside of this crate's own tests the mock requires the `mock-interpreter`
//! feature:
//!
//! ```bash
//! cargo test --features mock-interpreter
//! ```

use crate::error::{BridgeError, Result};
use crate::scripting::plane::PlaneAccess;
use crate::scripting::{ArgumentList, Interpreter, Resolved, ScriptFault, ScriptValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Native stand-in for a script function body.
pub type CallHandler =
    Arc<dyn Fn(&PlaneAccess, &[ScriptValue]) -> std::result::Result<(), String> + Send + Sync>;

/// What a fake function does when called.
#[derive(Clone)]
pub enum FakeBehavior {
    /// Return a unit value.
    Return,
    /// Raise a script fault with this message.
    Fault(String),
    /// Run native code; an `Err` becomes a script fault.
    Handler(CallHandler),
}

impl fmt::Debug for FakeBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FakeBehavior::Return => f.write_str("Return"),
            FakeBehavior::Fault(msg) => f.debug_tuple("Fault").field(msg).finish(),
            FakeBehavior::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// A module attribute.
#[derive(Debug, Clone)]
pub enum FakeAttr {
    Function { arity: usize, behavior: FakeBehavior },
    Value,
}

/// In-memory description of a loadable module.
#[derive(Debug, Clone, Default)]
pub struct FakeModule {
    attrs: HashMap<String, FakeAttr>,
    body_fault: Option<String>,
}

impl FakeModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function that returns normally.
    pub fn function(self, name: &str, arity: usize) -> Self {
        self.attr(
            name,
            FakeAttr::Function {
                arity,
                behavior: FakeBehavior::Return,
            },
        )
    }

    /// Add a function that always raises `message`.
    pub fn failing_function(self, name: &str, arity: usize, message: &str) -> Self {
        self.attr(
            name,
            FakeAttr::Function {
                arity,
                behavior: FakeBehavior::Fault(message.to_string()),
            },
        )
    }

    /// Add a function backed by native code.
    pub fn handler_function<F>(self, name: &str, arity: usize, handler: F) -> Self
    where
        F: Fn(&PlaneAccess, &[ScriptValue]) -> std::result::Result<(), String>
            + Send
            + Sync
            + 'static,
    {
        self.attr(
            name,
            FakeAttr::Function {
                arity,
                behavior: FakeBehavior::Handler(Arc::new(handler)),
            },
        )
    }

    /// Add a non-callable attribute.
    pub fn value(self, name: &str) -> Self {
        self.attr(name, FakeAttr::Value)
    }

    /// Make the module body fail when imported.
    pub fn broken(mut self, reason: &str) -> Self {
        self.body_fault = Some(reason.to_string());
        self
    }

    fn attr(mut self, name: &str, attr: FakeAttr) -> Self {
        self.attrs.insert(name.to_string(), attr);
        self
    }
}

/// One journaled interpreter event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Started,
    Imported(String),
    ImportFailed(String),
    Resolved { name: String, arity: usize },
    ArgsBuilt(usize),
    Called { name: String, args: Vec<ScriptValue> },
    CallFaulted { name: String, message: String },
    ValueReturned,
    ArgsReleased,
    ValueReleased,
    CallableReleased(String),
    ModuleReleased(String),
    /// Handles still alive when the runtime was finalized.
    Finalized { outstanding: usize },
}

/// Shared, append-only event log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, event: Event) {
        self.lock().push(event);
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.lock().iter().filter(|e| pred(e)).count()
    }

    /// Index of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.lock().iter().position(pred)
    }

    /// Index of the last event matching `pred`.
    pub fn last_position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.lock().iter().rposition(pred)
    }

    /// Argument lists of every call to `name`, in order.
    pub fn calls_to(&self, name: &str) -> Vec<Vec<ScriptValue>> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                Event::Called { name: n, args } if n == name => Some(args.clone()),
                _ => None,
            })
            .collect()
    }

    /// Total number of hook calls.
    pub fn call_count(&self) -> usize {
        self.count(|e| matches!(e, Event::Called { .. }))
    }

    /// Handles constructed but not yet released.
    pub fn outstanding(&self) -> usize {
        let events = self.lock();
        let mut live: i64 = 0;
        for event in events.iter() {
            match event {
                Event::Imported(_)
                | Event::Resolved { .. }
                | Event::ArgsBuilt(_)
                | Event::ValueReturned => live += 1,
                Event::ModuleReleased(_)
                | Event::CallableReleased(_)
                | Event::ArgsReleased
                | Event::ValueReleased => live -= 1,
                _ => {}
            }
        }
        live.max(0) as usize
    }

    pub fn is_finalized(&self) -> bool {
        self.count(|e| matches!(e, Event::Finalized { .. })) > 0
    }
}

/// Startup settings for [`RecordingInterpreter`].
#[derive(Debug, Clone, Default)]
pub struct MockSettings {
    modules: HashMap<String, FakeModule>,
    journal: Journal,
    fail_start: bool,
}

impl MockSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: &str, module: FakeModule) -> Self {
        self.modules.insert(name.to_string(), module);
        self
    }

    /// Make `Interpreter::start` fail.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Handle to the journal every interpreter started from these settings writes to.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

/// Loaded fake module.
#[derive(Debug)]
pub struct MockModule {
    name: String,
    attrs: HashMap<String, FakeAttr>,
    journal: Journal,
}

impl Drop for MockModule {
    fn drop(&mut self) {
        self.journal.record(Event::ModuleReleased(self.name.clone()));
    }
}

/// Resolved fake function.
#[derive(Debug)]
pub struct MockCallable {
    name: String,
    behavior: FakeBehavior,
    journal: Journal,
}

impl Drop for MockCallable {
    fn drop(&mut self) {
        self.journal.record(Event::CallableReleased(self.name.clone()));
    }
}

/// Packed argument container.
#[derive(Debug)]
pub struct MockArgs {
    values: Vec<ScriptValue>,
    journal: Journal,
}

impl MockArgs {
    pub fn values(&self) -> &[ScriptValue] {
        &self.values
    }
}

impl Drop for MockArgs {
    fn drop(&mut self) {
        self.journal.record(Event::ArgsReleased);
    }
}

/// Return value of a successful call.
#[derive(Debug)]
pub struct MockValue {
    journal: Journal,
}

impl Drop for MockValue {
    fn drop(&mut self) {
        self.journal.record(Event::ValueReleased);
    }
}

/// Instrumented fake interpreter.
#[derive(Debug)]
pub struct RecordingInterpreter {
    modules: HashMap<String, FakeModule>,
    journal: Journal,
    plane: PlaneAccess,
}

impl RecordingInterpreter {
    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}

impl Interpreter for RecordingInterpreter {
    type Settings = MockSettings;
    type Module = MockModule;
    type Callable = MockCallable;
    type Args = MockArgs;
    type Value = MockValue;

    fn start(settings: &MockSettings) -> Result<Self> {
        if settings.fail_start {
            return Err(BridgeError::Config("mock runtime refused to start".to_string()));
        }
        settings.journal.record(Event::Started);
        Ok(Self {
            modules: settings.modules.clone(),
            journal: settings.journal.clone(),
            plane: PlaneAccess::new(),
        })
    }

    fn import(&mut self, name: &str) -> Result<MockModule> {
        let failure = match self.modules.get(name) {
            None => Some("no such module".to_string()),
            Some(FakeModule {
                body_fault: Some(reason),
                ..
            }) => Some(format!("module body failed: {}", reason)),
            Some(module) => {
                self.journal.record(Event::Imported(name.to_string()));
                return Ok(MockModule {
                    name: name.to_string(),
                    attrs: module.attrs.clone(),
                    journal: self.journal.clone(),
                });
            }
        };

        self.journal.record(Event::ImportFailed(name.to_string()));
        Err(BridgeError::ModuleNotFound {
            module: name.to_string(),
            reason: failure.unwrap_or_default(),
        })
    }

    fn resolve(&mut self, module: &MockModule, name: &str, arity: usize) -> Resolved<MockCallable> {
        match module.attrs.get(name) {
            None => Resolved::MissingAttribute,
            Some(FakeAttr::Value) => Resolved::NotCallable,
            Some(FakeAttr::Function { arity: a, .. }) if *a != arity => Resolved::NotCallable,
            Some(FakeAttr::Function { behavior, .. }) => {
                self.journal.record(Event::Resolved {
                    name: name.to_string(),
                    arity,
                });
                Resolved::Found(MockCallable {
                    name: name.to_string(),
                    behavior: behavior.clone(),
                    journal: self.journal.clone(),
                })
            }
        }
    }

    fn pack(&mut self, args: ArgumentList) -> MockArgs {
        self.journal.record(Event::ArgsBuilt(args.len()));
        MockArgs {
            values: args.into_inner(),
            journal: self.journal.clone(),
        }
    }

    fn call(
        &mut self,
        _module: &mut MockModule,
        callable: &MockCallable,
        args: &MockArgs,
    ) -> std::result::Result<MockValue, ScriptFault> {
        self.journal.record(Event::Called {
            name: callable.name.clone(),
            args: args.values.clone(),
        });

        let outcome = match &callable.behavior {
            FakeBehavior::Return => Ok(()),
            FakeBehavior::Fault(message) => Err(message.clone()),
            FakeBehavior::Handler(handler) => handler(&self.plane, &args.values),
        };

        match outcome {
            Ok(()) => {
                self.journal.record(Event::ValueReturned);
                Ok(MockValue {
                    journal: self.journal.clone(),
                })
            }
            Err(message) => {
                self.journal.record(Event::CallFaulted {
                    name: callable.name.clone(),
                    message: message.clone(),
                });
                Err(ScriptFault::new(message))
            }
        }
    }

    fn plane_access(&self) -> PlaneAccess {
        self.plane.clone()
    }

    fn finalize(self) {
        let outstanding = self.journal.outstanding();
        self.journal.record(Event::Finalized { outstanding });
    }
}
