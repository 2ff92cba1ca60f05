//! Spatial resampling of radar fields between lat/lon grids.
//!
//! The expensive part of resampling is finding which source cells feed
//! each destination cell. [`ProjIndex`] does that once per grid pair;
//! projecting any number of fields through it afterwards is a cheap gather.
//!
//! # Architecture
//!
//! ```text
//! ResampleOptions ──validate()──► ResampleConfig
//!                                      │
//! (src grid, dest grid) ──────────────►├─► IndexCache::get_or_build
//!                                      │        │
//!                                      │        ├─► hit: Arc<ProjIndex>
//!                                      │        └─► miss: ProjIndex::build (k-d tree)
//!                                      ▼
//!                      ProjIndex::project_with_quality(data, quality)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{IndexCache, ResampleOptions};
//!
//! let config = ResampleOptions { radius_km: Some(5.0), ..Default::default() }.validate()?;
//! let cache = IndexCache::new(8);
//! let index = cache.get_or_build(&radar_grid, &model_grid, &config)?;
//! let (rate, quality) = index.project_with_quality(&rate, &quality)?;
//! ```

pub mod cache;
pub mod config;
pub mod index;
pub mod interpolation;
pub mod search;
pub mod types;

// Re-export commonly used types at crate root
pub use cache::{IndexCache, IndexKey};
pub use config::{MethodName, ResampleConfig, ResampleMethod, ResampleOptions};
pub use index::ProjIndex;
pub use interpolation::{bilinear_interpolate, Sample};
pub use search::PointIndex;
pub use types::CacheStats;
