//! Sandbox module - Low-level container wrapper
//!
//! This module provides a minimal abstraction over the container runtime.
//! It handles:
//! - Disposable workspace creation and removal
//! - Resource ceilings, network isolation and deadlines
//! - Capped capture of stdout/stderr
//!
//! The sandbox module does NOT:
//! - Interpret verdicts (that's the service's job)
//! - Know about languages or compilation
//! - Compare outputs

pub mod config;
pub mod container;

pub use config::SandboxConfig;
pub use container::{execute, ContainerLimits, ContainerSpec, Workspace, TIMEOUT_EXIT_CODE};
