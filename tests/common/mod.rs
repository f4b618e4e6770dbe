//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use scriptfilter::config::EngineSettings;
use std::path::PathBuf;

/// Directory holding the `.rhai` fixture modules
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("modules")
}

/// Engine settings that resolve modules from the fixtures directory
pub fn fixture_settings() -> EngineSettings {
    EngineSettings::default().with_module_path(fixtures_dir())
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
