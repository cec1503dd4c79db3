//! Derived analytics
//!
//! Numeric transforms applied before a write (softmax, divergence,
//! entropy, projection, histograms) and after a read (trend curves,
//! confidence). Nothing here touches the store.

pub mod projection;
pub mod stats;
pub mod trend;

pub use projection::{NeighborhoodProjector, ProjectionConfig};
pub use stats::{
    argmax, confidence, entropy, histogram, kl_divergence_bits, mean_rows, row_width,
    smoothed_prior, softmax, softmax_rows, standardize, PRIOR_SMOOTHING,
};
pub use trend::{TrendFit, TREND_DEGREE};
