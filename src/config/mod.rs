//! Configuration module
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Settings persistence (custodian endpoint, retries, key parameters)

pub mod paths;
pub mod settings;

pub use paths::VaultPaths;
pub use settings::Settings;
