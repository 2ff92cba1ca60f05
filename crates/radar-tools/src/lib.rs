//! Radar composites over time.
//!
//! Builds on `grid-processor` to give:
//!
//! - Instantaneous composites for a time, with snapping to the previous
//!   available file, Z-R conversion, median speckle filtering and
//!   resampling onto a destination grid
//! - Accumulations over a window of composites
//! - Motion-compensated interpolation between composites
//!
//! ```text
//! PathTemplate ──► CompositeReader ──► RawComposite
//!                                          │
//!                     ZrRelation ◄─────────┤
//!                     MedianFilter ◄───────┤
//!                     ProjIndex ◄──────────┘
//!                          │
//!            Observation ──┴──► accumulate() ──► Accumulation
//!                 │
//!                 └──► NowcastInterpolator ──► Frame
//! ```

pub mod accumulation;
pub mod instantaneous;
pub mod median_filter;
pub mod nowcast;
pub mod reader;
pub mod zr;

pub use accumulation::{accumulate, weighted_mean, Accumulation, AccumulationRequest, DEFAULT_STEP_MINUTES};
pub use instantaneous::{Destination, FetchOptions, InstantaneousAccessor, Observation, SnapPolicy};
pub use median_filter::{MedianFilter, UndetectHandling};
pub use nowcast::{
    advect, bracket, Bracket, Frame, MotionEstimator, MotionField, NowcastInterpolator, UniformMotion,
    ZeroMotion,
};
pub use reader::{CompositeFile, CompositeReader, JsonCompositeReader, RawComposite, ReaderRegistry, FILE_SENTINELS};
pub use zr::ZrRelation;
