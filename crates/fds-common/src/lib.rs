//! ---
//! fds_section: "01-core-functionality"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Shared primitives and utilities for the simulator runtime."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
//! Core shared primitives for the field device simulator workspace.
//! This crate exposes configuration loading and tracing bootstrap
//! utilities consumed across the workspace.

pub mod config;
pub mod logging;

pub use config::{AppConfig, LoadedAppConfig, LoggingConfig, ProvisioningConfig, SimulationConfig};
pub use logging::{init_tracing, LogFormat};
