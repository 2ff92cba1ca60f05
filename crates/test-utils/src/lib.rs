//! Shared test utilities for the radar mosaic workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Temporary directory helpers
//! - Synthetic field and grid generators
//! - Common test fixtures
//! - Approximate equality macros
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{create_storm_field, fixtures};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

pub use radar_common;

/// Macro asserting that a cell holds a value close to the expected one.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_cell_approx_eq;
///
/// assert_cell_approx_eq!(field.get(0, 0).unwrap(), 12.0, 1e-5);
/// ```
#[macro_export]
macro_rules! assert_cell_approx_eq {
    ($cell:expr, $expected:expr, $epsilon:expr) => {{
        match $cell {
            $crate::radar_common::Cell::Value(v) => $crate::assert_approx_eq!(v, $expected, $epsilon),
            other => panic!(
                "assertion failed: expected a value close to {:?}, got {:?}",
                $expected, other
            ),
        }
    }};
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
