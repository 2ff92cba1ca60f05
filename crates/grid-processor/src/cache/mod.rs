//! Cache implementations for grid processing.

mod index_cache;

pub use index_cache::{IndexCache, IndexKey};
