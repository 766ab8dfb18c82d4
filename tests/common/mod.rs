#![allow(dead_code, unused_imports)]

use std::error::Error;

pub use respawn_test_utils::builders::SettingsBuilder;
pub use respawn_test_utils::init_tracing;

pub type TestResult = Result<(), Box<dyn Error>>;
