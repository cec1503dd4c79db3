//! Run configuration

use std::path::{Path, PathBuf};

use crate::analytics::{ProjectionConfig, TREND_DEGREE};

/// Buffered events before the Parquet log writes a segment.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1024;

/// Settings shared by the write path and the read path of one run.
///
/// # Example
///
/// ```rust
/// use drlvis::config::TelemetryConfig;
///
/// let config = TelemetryConfig::builder("runs/cartpole")
///     .flush_threshold(64)
///     .trend_degree(3)
///     .build();
///
/// assert_eq!(config.flush_threshold(), 64);
/// assert_eq!(config.trend_degree(), 3);
/// assert_eq!(config.projection().seed, 42);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    log_dir: PathBuf,
    flush_threshold: usize,
    trend_degree: usize,
    projection: ProjectionConfig,
}

impl TelemetryConfig {
    /// Create a builder for a run directory.
    #[must_use]
    pub fn builder(log_dir: impl Into<PathBuf>) -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::new(log_dir)
    }

    /// Run directory.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Events buffered per segment.
    #[must_use]
    pub const fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    /// Polynomial degree of scalar trend curves.
    #[must_use]
    pub const fn trend_degree(&self) -> usize {
        self.trend_degree
    }

    /// Projection settings for experiment snapshots.
    #[must_use]
    pub const fn projection(&self) -> &ProjectionConfig {
        &self.projection
    }
}

/// Builder for `TelemetryConfig`.
#[derive(Debug)]
pub struct TelemetryConfigBuilder {
    log_dir: PathBuf,
    flush_threshold: usize,
    trend_degree: usize,
    projection: ProjectionConfig,
}

impl TelemetryConfigBuilder {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            trend_degree: TREND_DEGREE,
            projection: ProjectionConfig::default(),
        }
    }

    /// Set the segment size in events (at least 1).
    #[must_use]
    pub fn flush_threshold(mut self, events: usize) -> Self {
        self.flush_threshold = events.max(1);
        self
    }

    /// Set the trend polynomial degree.
    #[must_use]
    pub const fn trend_degree(mut self, degree: usize) -> Self {
        self.trend_degree = degree;
        self
    }

    /// Set the projection settings.
    #[must_use]
    pub const fn projection(mut self, projection: ProjectionConfig) -> Self {
        self.projection = projection;
        self
    }

    /// Build the `TelemetryConfig`.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        TelemetryConfig {
            log_dir: self.log_dir,
            flush_threshold: self.flush_threshold,
            trend_degree: self.trend_degree,
            projection: self.projection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::builder("backend/logs").build();
        assert_eq!(config.log_dir(), Path::new("backend/logs"));
        assert_eq!(config.flush_threshold(), DEFAULT_FLUSH_THRESHOLD);
        assert_eq!(config.trend_degree(), 5);
        assert_eq!(config.projection(), &ProjectionConfig::default());
    }

    #[test]
    fn test_flush_threshold_floor() {
        let config = TelemetryConfig::builder("x").flush_threshold(0).build();
        assert_eq!(config.flush_threshold(), 1);
    }
}
