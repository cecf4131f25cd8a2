//! Tool management and execution framework for signalforge
//!
//! This crate provides the framework for defining and executing tools
//! (external capabilities) the report agent can call mid-reasoning.

pub mod registry;
pub mod tool;

pub use registry::ToolRegistry;
pub use tool::Tool;
