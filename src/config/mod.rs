//! Configuration module for harvest runs
//!
//! This module provides the `HarvestConfig` struct and its type-safe builder
//! with validation and defaults taken from `utils::constants`.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::{HarvestConfigBuilder, WithStorageDir};
pub use types::HarvestConfig;
