//! Configuration module for bridge settings and YAML loading
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `BridgeConfig`, `StoreConfig`, `PipelineConfig`)
//! - YAML loading functionality (`load_config`)
//! - Environment overrides and the startup configuration dump

pub mod constants;
mod loader;
mod types;

// Re-export types
pub use types::{AppConfig, BridgeConfig, PipelineConfig, StoreConfig};

// Re-export loader functions
pub use loader::{load_config, load_config_from_str};
