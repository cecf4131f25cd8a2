//! Shared utilities for signalforge
//!
//! This crate provides common functionality used across the signalforge
//! workspace, including logging setup and environment helpers.

pub mod env;
pub mod logging;

pub use env::{env_opt, env_or};
pub use logging::init_tracing;
