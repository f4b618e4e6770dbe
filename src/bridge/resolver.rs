//! Module loading and hook resolution
//!
//! Also runs the two one-shot hooks. The init hook receives the configured
//! argument string (empty when unset) and any failure is fatal. The uninit
//! hook takes no arguments and every failure is reported as
//! `UninitHookFailed`, which callers log and continue past.

use crate::bridge::invoker::invoke;
use crate::bridge::marshal;
use crate::error::{BridgeError, Result};
use crate::scripting::{ArgumentList, HookKind, Interpreter, Resolved};

/// Load a module by name.
pub fn load<I: Interpreter>(interpreter: &mut I, name: &str) -> Result<I::Module> {
    tracing::debug!("Loading module '{}'", name);
    let module = interpreter.import(name)?;
    tracing::info!("Module '{}' loaded", name);
    Ok(module)
}

/// Resolve `name` as the given hook.
pub fn resolve<I: Interpreter>(
    interpreter: &mut I,
    module: &I::Module,
    hook: HookKind,
    name: &str,
) -> Result<I::Callable> {
    match interpreter.resolve(module, name, hook.arity()) {
        Resolved::Found(callable) => {
            tracing::debug!("Resolved {} hook '{}'", hook, name);
            Ok(callable)
        }
        Resolved::MissingAttribute => Err(BridgeError::AttributeMissing {
            hook,
            name: name.to_string(),
        }),
        Resolved::NotCallable => Err(BridgeError::NotCallable {
            hook,
            name: name.to_string(),
        }),
    }
}

/// Resolve and call the init hook once.
pub fn call_init<I: Interpreter>(
    interpreter: &mut I,
    module: &mut I::Module,
    name: &str,
    init_args: Option<&str>,
) -> Result<()> {
    let hook = resolve(interpreter, module, HookKind::Init, name)?;

    let mut args = ArgumentList::with_capacity(HookKind::Init.arity());
    args.push(init_args.unwrap_or(""));

    tracing::debug!("Calling init hook '{}'", name);
    let result = marshal::from_result(invoke(interpreter, module, &hook, args));
    drop(hook);

    result.map_err(|fault| BridgeError::InitHookFailed {
        name: name.to_string(),
        fault,
    })
}

/// Resolve and call the uninit hook once.
pub fn call_uninit<I: Interpreter>(
    interpreter: &mut I,
    module: &mut I::Module,
    name: &str,
) -> Result<()> {
    let hook = resolve(interpreter, module, HookKind::Uninit, name).map_err(|e| {
        BridgeError::UninitHookFailed {
            name: name.to_string(),
            reason: e.to_string(),
        }
    })?;

    tracing::debug!("Calling uninit hook '{}'", name);
    let result = marshal::from_result(invoke(interpreter, module, &hook, ArgumentList::new()));
    drop(hook);

    result.map_err(|fault| BridgeError::UninitHookFailed {
        name: name.to_string(),
        reason: fault.to_string(),
    })
}
