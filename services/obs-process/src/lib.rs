//! Batch processing of radar composites.
//!
//! This module exposes the internal modules for testing purposes.

pub mod config;
pub mod process;

pub use config::{GridConfig, NowcastConfig, ObsProcessConfig};
pub use process::{BatchSummary, ObsProcessor, TaskOutcome};
