//! Common test utilities for download-gate integration tests

#[allow(dead_code)]
pub mod backend;
#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use backend::*;
pub use config::*;
#[allow(unused_imports)]
pub use fixtures::*;
