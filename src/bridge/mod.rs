//! Script bridge
//!
//! Composes the lifecycle, resolver, marshal and invoker pieces into the
//! per-node state machine:
//!
//! ```text
//! Uninitialized
//!   └─► InterpreterStarted
//!         └─► ModuleLoaded
//!               └─► FilterHookBound
//!                     └─► Streaming ◄─┐ one call per frame
//!                           │ └───────┘
//!                           └─► Uninitializing ─► Finalized
//! ```
//!
//! A failure before the filter hook is bound jumps straight to `Finalized`.
//!
//! Teardown always runs in the same order: uninit hook (only when the filter
//! hook was bound), release of the filter hook, release of the module, and
//! finally the interpreter itself.

pub mod invoker;
pub mod lifecycle;
pub mod marshal;
pub mod resolver;

pub use lifecycle::Runtime;

use crate::config::FilterOptions;
use crate::error::{BridgeError, Result};
use crate::scripting::{HookKind, Interpreter, PlaneAccess};
use crate::types::Rational;
use serde::Serialize;
use std::fmt;

/// Borrowed view of one native frame, as handed to the marshaler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDescriptor {
    pub pts: Option<i64>,
    pub time_base: Rational,
    pub width: u32,
    pub height: u32,
    /// Opaque handle of the primary plane.
    pub plane: i64,
}

/// Lifecycle state of a [`ScriptBridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    Uninitialized,
    InterpreterStarted,
    ModuleLoaded,
    FilterHookBound,
    Streaming,
    Uninitializing,
    Finalized,
}

impl BridgeState {
    pub fn as_str(self) -> &'static str {
        match self {
            BridgeState::Uninitialized => "uninitialized",
            BridgeState::InterpreterStarted => "interpreter started",
            BridgeState::ModuleLoaded => "module loaded",
            BridgeState::FilterHookBound => "filter hook bound",
            BridgeState::Streaming => "streaming",
            BridgeState::Uninitializing => "uninitializing",
            BridgeState::Finalized => "finalized",
        }
    }

    /// Whether frames may be processed in this state.
    pub fn accepts_frames(self) -> bool {
        matches!(self, BridgeState::FilterHookBound | BridgeState::Streaming)
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node's connection to its script module.
pub struct ScriptBridge<I: Interpreter> {
    options: FilterOptions,
    state: BridgeState,
    filter: Option<I::Callable>,
    module: Option<I::Module>,
    runtime: Option<Runtime<I>>,
    plane: PlaneAccess,
    frames: u64,
}

impl<I: Interpreter> ScriptBridge<I> {
    /// Create an unstarted bridge.
    pub fn new(options: FilterOptions) -> Self {
        Self {
            options,
            state: BridgeState::Uninitialized,
            filter: None,
            module: None,
            runtime: None,
            plane: PlaneAccess::new(),
            frames: 0,
        }
    }

    /// Create and start a bridge in one step.
    pub fn start(options: FilterOptions, settings: &I::Settings) -> Result<Self> {
        let mut bridge = Self::new(options);
        bridge.startup(settings)?;
        Ok(bridge)
    }

    /// Start the interpreter, load the module, bind the filter hook and run
    /// the init hook.
    ///
    /// On failure everything acquired so far is released and the bridge ends
    /// up `Finalized`.
    pub fn startup(&mut self, settings: &I::Settings) -> Result<()> {
        if self.state != BridgeState::Uninitialized {
            return Err(BridgeError::InvalidState {
                expected: BridgeState::Uninitialized.as_str(),
                found: self.state.as_str(),
            });
        }
        self.options.validate()?;

        let runtime = match Runtime::<I>::start(settings) {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!("Failed to start interpreter: {}", e);
                self.state = BridgeState::Finalized;
                return Err(e);
            }
        };
        self.plane = runtime.get()?.plane_access();
        self.runtime = Some(runtime);
        self.state = BridgeState::InterpreterStarted;

        if let Err(e) = self.bind() {
            tracing::error!("Script filter startup failed: {}", e);
            // uninit failures are already logged by shutdown
            let _ = self.shutdown();
            return Err(e);
        }
        Ok(())
    }

    fn interpreter(runtime: &mut Option<Runtime<I>>) -> Result<&mut I> {
        runtime
            .as_mut()
            .ok_or(BridgeError::InvalidState {
                expected: "running interpreter",
                found: BridgeState::Finalized.as_str(),
            })?
            .get_mut()
    }

    fn bind(&mut self) -> Result<()> {
        let interpreter = Self::interpreter(&mut self.runtime)?;

        let module = self
            .module
            .insert(resolver::load(interpreter, &self.options.module)?);
        self.state = BridgeState::ModuleLoaded;

        let filter = resolver::resolve(
            interpreter,
            module,
            HookKind::Filter,
            &self.options.filter_function,
        )?;
        self.filter = Some(filter);
        self.state = BridgeState::FilterHookBound;
        tracing::info!(
            "Filter hook '{}' bound in module '{}'",
            self.options.filter_function,
            self.options.module
        );

        if let Some(init) = self.options.init_function.as_deref() {
            resolver::call_init(interpreter, module, init, self.options.init_args.as_deref())?;
        }
        Ok(())
    }

    /// Call the filter hook for one frame, with `plane` mapped for the
    /// script for the duration of the call.
    pub fn process_plane(
        &mut self,
        pts: Option<i64>,
        time_base: Rational,
        plane: &mut [u8],
        stride: usize,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let access = self.plane.clone();
        access.with_plane(plane, stride, width, height, |handle| {
            self.process(&FrameDescriptor {
                pts,
                time_base,
                width,
                height,
                plane: handle,
            })
        })
    }

    /// Call the filter hook for one frame. `frame.plane` is passed through
    /// as is; scripts can only dereference it through [`Self::process_plane`].
    ///
    /// A script fault comes back as `BridgeError::FilterHookFailed`; the
    /// bridge stays usable.
    pub fn process(&mut self, frame: &FrameDescriptor) -> Result<()> {
        if !self.state.accepts_frames() {
            return Err(BridgeError::InvalidState {
                expected: BridgeState::FilterHookBound.as_str(),
                found: self.state.as_str(),
            });
        }

        let interpreter = Self::interpreter(&mut self.runtime)?;
        let (Some(module), Some(filter)) = (self.module.as_mut(), self.filter.as_ref()) else {
            return Err(BridgeError::InvalidState {
                expected: BridgeState::FilterHookBound.as_str(),
                found: "unbound",
            });
        };

        self.state = BridgeState::Streaming;
        let sequence = self.frames;
        self.frames += 1;

        let args = marshal::to_arguments(frame);
        marshal::from_result(invoker::invoke(interpreter, module, filter, args)).map_err(|fault| {
            BridgeError::FilterHookFailed {
                name: self.options.filter_function.clone(),
                sequence,
                fault,
            }
        })
    }

    /// Tear everything down. Idempotent.
    ///
    /// Returns the uninit hook's failure, if any, after teardown completed.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state == BridgeState::Finalized {
            return Ok(());
        }

        let mut outcome = Ok(());
        if self.filter.is_some() {
            self.state = BridgeState::Uninitializing;
            if let Some(name) = self.options.uninit_function.as_deref() {
                if let (Ok(interpreter), Some(module)) =
                    (Self::interpreter(&mut self.runtime), self.module.as_mut())
                {
                    if let Err(e) = resolver::call_uninit(interpreter, module, name) {
                        tracing::warn!("{}", e);
                        outcome = Err(e);
                    }
                }
            }
        }

        self.filter = None;
        self.module = None;
        if let Some(mut runtime) = self.runtime.take() {
            runtime.finalize();
        }
        self.state = BridgeState::Finalized;
        tracing::debug!("Script bridge finalized after {} frames", self.frames);
        outcome
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Number of filter hook calls made so far.
    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// The loaded module, until teardown releases it.
    pub fn module(&self) -> Option<&I::Module> {
        self.module.as_ref()
    }

    /// The running interpreter, if not yet finalized.
    pub fn interpreter_ref(&self) -> Option<&I> {
        self.runtime.as_ref().and_then(|r| r.get().ok())
    }
}

impl<I: Interpreter> Drop for ScriptBridge<I> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

impl<I: Interpreter> fmt::Debug for ScriptBridge<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptBridge")
            .field("module", &self.options.module)
            .field("state", &self.state)
            .field("frames", &self.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::mock::{Event, FakeModule, MockSettings, RecordingInterpreter};
    use crate::scripting::ScriptValue;
    use std::sync::{Arc, Mutex};

    type MockBridge = ScriptBridge<RecordingInterpreter>;

    fn frame(pts: Option<i64>) -> FrameDescriptor {
        FrameDescriptor {
            pts,
            time_base: Rational::new(1, 1000),
            width: 640,
            height: 480,
            plane: 0x1000,
        }
    }

    fn full_module() -> FakeModule {
        FakeModule::new()
            .function("setup", 1)
            .function("f", 4)
            .function("bye", 0)
    }

    fn full_options() -> FilterOptions {
        FilterOptions::new("m", "f")
            .with_init("setup", Some("cfg=1"))
            .with_uninit("bye")
    }

    #[test]
    fn test_startup_binds_filter() {
        let settings = MockSettings::new().with_module("m", FakeModule::new().function("f", 4));
        let bridge = MockBridge::start(FilterOptions::new("m", "f"), &settings).unwrap();
        assert_eq!(bridge.state(), BridgeState::FilterHookBound);
        assert_eq!(settings.journal().call_count(), 0);
    }

    #[test]
    fn test_missing_module_finalizes_without_calls() {
        let settings = MockSettings::new();
        let journal = settings.journal();
        let mut bridge = MockBridge::new(FilterOptions::new("m", "f"));

        let err = bridge.startup(&settings).unwrap_err();
        assert!(matches!(err, BridgeError::ModuleNotFound { .. }));
        assert_eq!(bridge.state(), BridgeState::Finalized);
        assert_eq!(journal.call_count(), 0);
        assert!(journal.events().contains(&Event::Finalized { outstanding: 0 }));
    }

    #[test]
    fn test_missing_filter_releases_module() {
        let settings = MockSettings::new().with_module("m", FakeModule::new().function("g", 4));
        let journal = settings.journal();

        let err = MockBridge::start(FilterOptions::new("m", "f"), &settings).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::AttributeMissing {
                hook: HookKind::Filter,
                ..
            }
        ));
        assert!(journal.events().contains(&Event::ModuleReleased("m".to_string())));
        assert!(journal.events().contains(&Event::Finalized { outstanding: 0 }));
    }

    #[test]
    fn test_non_callable_filter() {
        let settings = MockSettings::new().with_module("m", FakeModule::new().value("f"));
        let journal = settings.journal();

        let err = MockBridge::start(FilterOptions::new("m", "f"), &settings).unwrap_err();
        assert!(matches!(err, BridgeError::NotCallable { .. }));
        assert_eq!(journal.call_count(), 0);
    }

    #[test]
    fn test_init_called_once_before_first_frame() {
        let settings = MockSettings::new().with_module("m", full_module());
        let journal = settings.journal();

        let mut bridge = MockBridge::start(full_options(), &settings).unwrap();
        bridge.process(&frame(Some(0))).unwrap();

        assert_eq!(
            journal.calls_to("setup"),
            vec![vec![ScriptValue::Text("cfg=1".to_string())]]
        );
        let init_at = journal
            .position(|e| matches!(e, Event::Called { name, .. } if name == "setup"))
            .unwrap();
        let filter_at = journal
            .position(|e| matches!(e, Event::Called { name, .. } if name == "f"))
            .unwrap();
        assert!(init_at < filter_at);
    }

    #[test]
    fn test_init_failure_runs_uninit_and_finalizes() {
        let settings = MockSettings::new().with_module(
            "m",
            FakeModule::new()
                .failing_function("setup", 1, "bad")
                .function("f", 4)
                .function("bye", 0),
        );
        let journal = settings.journal();

        let err = MockBridge::start(full_options(), &settings).unwrap_err();
        assert!(matches!(err, BridgeError::InitHookFailed { .. }));
        assert_eq!(journal.calls_to("bye").len(), 1);
        assert!(journal.events().contains(&Event::Finalized { outstanding: 0 }));
    }

    #[test]
    fn test_frames_marshaled_and_released() {
        let settings = MockSettings::new().with_module("m", FakeModule::new().function("f", 4));
        let journal = settings.journal();
        let mut bridge = MockBridge::start(FilterOptions::new("m", "f"), &settings).unwrap();

        for i in 0..5 {
            bridge.process(&frame(Some(i * 40))).unwrap();
        }
        assert_eq!(bridge.state(), BridgeState::Streaming);
        assert_eq!(bridge.frames_processed(), 5);

        let calls = journal.calls_to("f");
        assert_eq!(calls.len(), 5);
        assert_eq!(
            calls[1],
            vec![
                ScriptValue::Float(0.04),
                ScriptValue::Int(640),
                ScriptValue::Int(480),
                ScriptValue::Int(0x1000),
            ]
        );
        assert_eq!(journal.count(|e| matches!(e, Event::ArgsBuilt(4))), 5);
        assert_eq!(journal.count(|e| matches!(e, Event::ArgsReleased)), 5);
        assert_eq!(journal.count(|e| matches!(e, Event::ValueReleased)), 5);
        // module + filter hook
        assert_eq!(journal.outstanding(), 2);
    }

    #[test]
    fn test_filter_fault_is_reported_and_bridge_continues() {
        let settings = MockSettings::new()
            .with_module("m", FakeModule::new().failing_function("f", 4, "boom"));
        let journal = settings.journal();
        let mut bridge = MockBridge::start(FilterOptions::new("m", "f"), &settings).unwrap();

        let err = bridge.process(&frame(Some(0))).unwrap_err();
        assert!(matches!(err, BridgeError::FilterHookFailed { sequence: 0, .. }));
        let err = bridge.process(&frame(Some(1))).unwrap_err();
        assert!(matches!(err, BridgeError::FilterHookFailed { sequence: 1, .. }));
        assert_eq!(journal.count(|e| matches!(e, Event::ArgsReleased)), 2);
    }

    #[test]
    fn test_teardown_order() {
        let settings = MockSettings::new().with_module("m", full_module());
        let journal = settings.journal();

        let mut bridge = MockBridge::start(full_options(), &settings).unwrap();
        bridge.process(&frame(Some(0))).unwrap();
        bridge.shutdown().unwrap();
        assert_eq!(bridge.state(), BridgeState::Finalized);

        let uninit_at = journal
            .position(|e| matches!(e, Event::Called { name, .. } if name == "bye"))
            .unwrap();
        let filter_released = journal
            .position(|e| *e == Event::CallableReleased("f".to_string()))
            .unwrap();
        let module_released = journal
            .position(|e| *e == Event::ModuleReleased("m".to_string()))
            .unwrap();
        let finalized = journal
            .position(|e| matches!(e, Event::Finalized { .. }))
            .unwrap();

        assert_eq!(
            journal.last_position(|e| matches!(e, Event::Called { .. })),
            Some(uninit_at)
        );
        assert!(uninit_at < filter_released);
        assert!(filter_released < module_released);
        assert!(module_released < finalized);
        assert!(journal.events().contains(&Event::Finalized { outstanding: 0 }));
    }

    #[test]
    fn test_uninit_failure_still_finalizes() {
        let settings = MockSettings::new().with_module(
            "m",
            FakeModule::new()
                .function("f", 4)
                .failing_function("bye", 0, "cleanup failed"),
        );
        let journal = settings.journal();

        let mut bridge =
            MockBridge::start(FilterOptions::new("m", "f").with_uninit("bye"), &settings).unwrap();
        let err = bridge.shutdown().unwrap_err();
        assert!(matches!(err, BridgeError::UninitHookFailed { .. }));
        assert!(journal.is_finalized());
        assert!(bridge.shutdown().is_ok());
    }

    #[test]
    fn test_drop_tears_down() {
        let settings = MockSettings::new().with_module("m", full_module());
        let journal = settings.journal();
        {
            let _bridge = MockBridge::start(full_options(), &settings).unwrap();
        }
        assert_eq!(journal.calls_to("bye").len(), 1);
        assert_eq!(journal.count(|e| matches!(e, Event::Finalized { .. })), 1);
    }

    #[test]
    fn test_process_after_shutdown_is_invalid() {
        let settings = MockSettings::new().with_module("m", FakeModule::new().function("f", 4));
        let mut bridge = MockBridge::start(FilterOptions::new("m", "f"), &settings).unwrap();
        bridge.shutdown().unwrap();
        assert!(matches!(
            bridge.process(&frame(None)),
            Err(BridgeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_script_sees_mapped_plane() {
        let settings = MockSettings::new().with_module(
            "m",
            FakeModule::new().handler_function("f", 4, |plane, args| {
                let handle = args[3].as_int().ok_or("handle is not an int")?;
                let px = plane.read_pixel(handle, 0, 0)?;
                plane.write_pixel(
                    handle,
                    0,
                    0,
                    [255 - px[0] as i64, 255 - px[1] as i64, 255 - px[2] as i64],
                )
            }),
        );
        let mut bridge = MockBridge::start(FilterOptions::new("m", "f"), &settings).unwrap();

        let mut plane = vec![10u8, 20, 30];
        bridge
            .process_plane(Some(0), Rational::new(1, 25), &mut plane, 3, 1, 1)
            .unwrap();
        assert_eq!(plane, vec![245, 235, 225]);
    }

    #[test]
    fn test_plane_unmapped_after_call() {
        let kept = Arc::new(Mutex::new(None));
        let seen = kept.clone();
        let settings = MockSettings::new().with_module(
            "m",
            FakeModule::new().handler_function("f", 4, move |plane, args| {
                let handle = args[3].as_int().ok_or("handle is not an int")?;
                let previous = seen.lock().unwrap().replace(handle);
                match previous {
                    Some(old) => plane.read_byte(old, 0).map(drop),
                    None => plane.read_byte(handle, 0).map(drop),
                }
            }),
        );
        let mut bridge = MockBridge::start(FilterOptions::new("m", "f"), &settings).unwrap();

        let mut first = vec![0u8; 3];
        let mut second = vec![0u8; 3];
        bridge
            .process_plane(Some(0), Rational::new(1, 25), &mut first, 3, 1, 1)
            .unwrap();
        assert!(bridge.plane.current().is_none());

        // the handle from the first frame no longer reaches any memory
        let err = bridge
            .process_plane(Some(1), Rational::new(1, 25), &mut second, 3, 1, 1)
            .unwrap_err();
        assert!(err.to_string().contains("not the mapped plane"));
        assert!(bridge.plane.current().is_none());
        let stale = (*kept.lock().unwrap()).unwrap();
        assert!(bridge.plane.read_byte(stale, 0).is_err());
    }
}
