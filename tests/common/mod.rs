//! Shared test utilities:
//! - In-memory and file-backed databases with the production migrations applied
//! - Row seeding helpers for devices, probes, tools and kubernetes tables
//! - Registration request builders

// Each test binary uses a different subset of the fixtures
#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
