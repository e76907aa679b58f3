//! Common test utilities for analysis integration tests
//!
//! Provides playlist and track builders shared across the test files.

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
