//! Built-in pipeline node implementations.

pub mod script_filter;
pub mod test_source;

pub use script_filter::{FilterStats, ScriptFilterNode};
pub use test_source::TestPatternSource;
