//! Configuration types for the detection pipeline.
//!
//! This module provides two configuration types:
//! - [`DetectorConfig`]: pipeline-level configuration (immutable after construction)
//! - [`DetectOptions`]: per-call options (e.g., cooperative cancellation)

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pipeline-level configuration for the detector.
///
/// These settings affect the fundamental behavior of the scan, clustering and
/// smoothing stages and are immutable after the `Detector` is constructed.
/// Use the builder pattern for ergonomic construction.
///
/// # Example
/// ```
/// use visage_core::config::DetectorConfig;
///
/// let config = DetectorConfig::builder()
///     .min_size(64)
///     .max_size(480)
///     .shift_factor(0.05)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectorConfig {
    // Scan parameters
    /// Smallest region side to scan, in pixels (default: 100).
    pub min_size: u32,
    /// Largest region side to scan, in pixels (default: 1000).
    pub max_size: u32,
    /// Multiplicative step between consecutive scales, `> 1` (default: 1.1).
    pub scale_factor: f32,
    /// Spatial step between scan positions as a fraction of the current
    /// scale, in `(0, 1]` (default: 0.1).
    pub shift_factor: f32,

    // Clustering parameters
    /// Overlap above which two detections merge into one cluster, in
    /// `(0, 1)` (default: 0.2).
    pub iou_threshold: f32,

    // Temporal smoothing
    /// Number of past frames whose detections are merged into each result.
    /// `0` disables the temporal memory (default: 0).
    pub memory_frames: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_size: 100,
            max_size: 1000,
            scale_factor: 1.1,
            shift_factor: 0.1,
            iou_threshold: 0.2,
            memory_frames: 0,
        }
    }
}

impl DetectorConfig {
    /// Create a new builder for `DetectorConfig`.
    #[must_use]
    pub fn builder() -> DetectorConfigBuilder {
        DetectorConfigBuilder::default()
    }

    /// Check every parameter against its admissible range.
    ///
    /// # Errors
    /// [`Error::InvalidParams`] naming the offending parameter. Runs before
    /// any scanning so a misconfigured detector never starts a sweep.
    pub fn validate(&self) -> Result<()> {
        if self.min_size == 0 {
            return Err(Error::InvalidParams("min_size must be positive".into()));
        }
        if self.min_size > self.max_size {
            return Err(Error::InvalidParams(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if !(self.scale_factor > 1.0) {
            return Err(Error::InvalidParams(format!(
                "scale_factor ({}) must be greater than 1",
                self.scale_factor
            )));
        }
        if !(self.shift_factor > 0.0 && self.shift_factor <= 1.0) {
            return Err(Error::InvalidParams(format!(
                "shift_factor ({}) must lie in (0, 1]",
                self.shift_factor
            )));
        }
        if !(self.iou_threshold > 0.0 && self.iou_threshold < 1.0) {
            return Err(Error::InvalidParams(format!(
                "iou_threshold ({}) must lie in (0, 1)",
                self.iou_threshold
            )));
        }
        Ok(())
    }
}

/// Builder for [`DetectorConfig`].
#[derive(Default)]
pub struct DetectorConfigBuilder {
    min_size: Option<u32>,
    max_size: Option<u32>,
    scale_factor: Option<f32>,
    shift_factor: Option<f32>,
    iou_threshold: Option<f32>,
    memory_frames: Option<usize>,
}

impl DetectorConfigBuilder {
    /// Set the smallest region side to scan.
    #[must_use]
    pub fn min_size(mut self, size: u32) -> Self {
        self.min_size = Some(size);
        self
    }

    /// Set the largest region side to scan.
    #[must_use]
    pub fn max_size(mut self, size: u32) -> Self {
        self.max_size = Some(size);
        self
    }

    /// Set the multiplicative step between scales.
    #[must_use]
    pub fn scale_factor(mut self, factor: f32) -> Self {
        self.scale_factor = Some(factor);
        self
    }

    /// Set the spatial step as a fraction of the current scale.
    #[must_use]
    pub fn shift_factor(mut self, factor: f32) -> Self {
        self.shift_factor = Some(factor);
        self
    }

    /// Set the clustering overlap threshold.
    #[must_use]
    pub fn iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = Some(threshold);
        self
    }

    /// Set the temporal memory length in frames (0 disables it).
    #[must_use]
    pub fn memory_frames(mut self, frames: usize) -> Self {
        self.memory_frames = Some(frames);
        self
    }

    /// Build the configuration, using defaults for unset fields.
    ///
    /// The result is not validated here; [`DetectorConfig::validate`] runs
    /// when a detector is constructed or a scan starts.
    #[must_use]
    pub fn build(self) -> DetectorConfig {
        let d = DetectorConfig::default();
        DetectorConfig {
            min_size: self.min_size.unwrap_or(d.min_size),
            max_size: self.max_size.unwrap_or(d.max_size),
            scale_factor: self.scale_factor.unwrap_or(d.scale_factor),
            shift_factor: self.shift_factor.unwrap_or(d.shift_factor),
            iou_threshold: self.iou_threshold.unwrap_or(d.iou_threshold),
            memory_frames: self.memory_frames.unwrap_or(d.memory_frames),
        }
    }
}

// ============================================================================
// DetectOptions: per-call detection options
// ============================================================================

/// Cooperative cancellation flag shared between a detect call and its caller.
///
/// Cloning is cheap; all clones observe the same flag. The scan checks the
/// flag between rows and the clusterer between anchors, so cancellation takes
/// effect without interrupting a single region evaluation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Irreversible for this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-call detection options.
#[derive(Clone, Debug, Default)]
pub struct DetectOptions {
    /// Cancellation flag checked between regions and between cluster anchors.
    pub cancel: Option<CancelToken>,
}

impl DetectOptions {
    /// Options carrying a cancellation token.
    #[must_use]
    pub fn with_cancel(token: CancelToken) -> Self {
        Self {
            cancel: Some(token),
        }
    }
}
