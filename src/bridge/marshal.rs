//! Frame marshaling
//!
//! The filter hook is called as `filter(pts_secs, width, height, handle)`:
//!
//! | # | Type    | Value                                                |
//! |---|---------|------------------------------------------------------|
//! | 1 | `Float` | `pts * time_base` in seconds, NaN when pts is unset |
//! | 2 | `Int`   | frame width                                          |
//! | 3 | `Int`   | frame height                                         |
//! | 4 | `Int`   | opaque handle of the primary plane                   |

use crate::bridge::FrameDescriptor;
use crate::scripting::{ArgumentList, HookKind, ScriptFault};

/// Build the filter hook's argument list for one frame.
pub fn to_arguments(frame: &FrameDescriptor) -> ArgumentList {
    let mut args = ArgumentList::with_capacity(HookKind::Filter.arity());
    args.push(frame.time_base.to_seconds(frame.pts));
    args.push(frame.width as i64);
    args.push(frame.height as i64);
    args.push(frame.plane);
    args
}

/// Discard a hook's return value, keeping only whether it faulted.
pub fn from_result<V>(result: Result<V, ScriptFault>) -> Result<(), ScriptFault> {
    result.map(drop)
}
