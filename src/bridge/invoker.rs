//! Hook invocation
//!
//! Every hook call follows the same protocol: pack the arguments into a
//! container sized to the list, call, release the container, and hand the
//! return value back to the caller. The container is released on the fault
//! path too.

use crate::scripting::{ArgumentList, Interpreter, ScriptFault};

/// Call `hook` on `module` with `args`.
pub fn invoke<I: Interpreter>(
    interpreter: &mut I,
    module: &mut I::Module,
    hook: &I::Callable,
    args: ArgumentList,
) -> Result<I::Value, ScriptFault> {
    let packed = interpreter.pack(args);
    let result = interpreter.call(module, hook, &packed);
    drop(packed);
    result
}
