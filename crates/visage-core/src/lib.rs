//! Core detection logic for the Visage library.
//!
//! Visage is a pixel-intensity-comparison object detector: a pre-trained
//! cascade of shallow binary decision trees scores axis-aligned square
//! regions of a grayscale frame, most regions are rejected within the first
//! few stages, and the survivors are merged by non-maximum suppression and
//! optionally smoothed over a short frame history.
//!
//! # Architecture Overview
//!
//! The pipeline is a straight line with no feature extraction stage; trees
//! compare raw pixel pairs directly:
//!
//! 1. **Cascade decoding** ([`cascade`]): a flat binary blob becomes the
//!    node-test, leaf-score and stage-threshold tables. Decoded once,
//!    immutable and freely shared afterwards.
//! 2. **Scanning** ([`scan`]): a multi-scale sliding-window sweep scores
//!    every candidate region, fanned out across scales on the rayon pool.
//! 3. **Clustering** ([`cluster`]): score-ranked greedy non-maximum
//!    suppression merges overlapping detections.
//! 4. **Temporal smoothing** ([`memory`]): a circular buffer of recent
//!    frames' detections stabilizes flickering output.
//!
//! Image acquisition, cascade file I/O and any drawing of results stay with
//! the embedder; the core consumes an already-grayscale [`ImageView`].
//!
//! # Example
//!
//! ```
//! use visage_core::{Cascade, Detector, DetectorConfig};
//! use visage_core::image::ImageView;
//! use visage_core::test_utils::{encode_cascade_blob, TreeSpec};
//!
//! // A one-stage cascade whose single test ties everywhere and therefore
//! // routes every region to the +0.5 leaf.
//! let blob = encode_cascade_blob(
//!     1,
//!     &[TreeSpec {
//!         tests: vec![[0, 0, 0, 0]],
//!         leaves: vec![-0.5, 0.5],
//!         threshold: -1.0,
//!     }],
//! );
//! let cascade = Cascade::from_bytes(&blob)?;
//!
//! let pixels = vec![128u8; 64 * 64];
//! let img = ImageView::new(&pixels, 64, 64, 64)?;
//!
//! let config = DetectorConfig::builder()
//!     .min_size(24)
//!     .max_size(24)
//!     .shift_factor(0.5)
//!     .build();
//! let mut detector = Detector::with_config(cascade, config)?;
//! let detections = detector.detect(&img)?;
//! assert!(!detections.is_empty());
//! # Ok::<(), visage_core::Error>(())
//! ```

/// Cascade decoding and per-region classification.
pub mod cascade;
/// Score-ranked non-maximum suppression.
pub mod cluster;
/// Configuration types for the detection pipeline.
pub mod config;
/// Error types.
pub mod error;
/// Image buffer abstractions.
pub mod image;
/// Temporal detection memory.
pub mod memory;
/// Multi-scale sliding-window scan driver.
pub mod scan;
/// Utilities for testing and synthetic data generation.
pub mod test_utils;

pub use crate::cascade::{Cascade, REJECT};
pub use crate::cluster::{calculate_iou, cluster_detections};
pub use crate::config::{CancelToken, DetectOptions, DetectorConfig};
pub use crate::error::{Error, Result};
pub use crate::image::ImageView;
pub use crate::memory::DetectionMemory;
pub use crate::scan::scan_image;

/// One detected region: a square window and its confidence.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Detection {
    /// Center row of the region in pixels.
    pub row: f32,
    /// Center column of the region in pixels.
    pub col: f32,
    /// Side of the square region in pixels.
    pub scale: f32,
    /// Confidence: the cascade's post-threshold margin, or for a cluster the
    /// best margin of its members. Strictly positive for emitted detections.
    pub score: f32,
}

impl Detection {
    /// Construct a detection from its four components.
    #[must_use]
    pub const fn new(row: f32, col: f32, scale: f32, score: f32) -> Self {
        Self {
            row,
            col,
            scale,
            score,
        }
    }
}

/// Pipeline-wide statistics for a single detection call.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineStats {
    /// Time spent scanning in milliseconds.
    pub scan_ms: f64,
    /// Time spent clustering (including memory re-clustering) in milliseconds.
    pub cluster_ms: f64,
    /// Total pipeline time in milliseconds.
    pub total_ms: f64,
    /// Number of regions handed to the cascade.
    pub regions_evaluated: usize,
    /// Number of raw detections before clustering.
    pub raw_detections: usize,
    /// Number of final cluster representatives.
    pub clusters: usize,
}

/// The main entry point for running a decoded cascade over frames.
///
/// The detector owns the immutable [`Cascade`], a validated
/// [`DetectorConfig`] and, when temporal smoothing is enabled, the mutable
/// frame memory. One instance serves one stream of frames; it must not be
/// shared across threads without external synchronization.
pub struct Detector {
    cascade: Cascade,
    config: DetectorConfig,
    memory: Option<DetectionMemory>,
}

impl Detector {
    /// Create a detector with default configuration.
    ///
    /// # Errors
    /// [`Error::InvalidParams`] if the default configuration were ever
    /// invalid; with a custom configuration see [`Detector::with_config`].
    pub fn new(cascade: Cascade) -> Result<Self> {
        Self::with_config(cascade, DetectorConfig::default())
    }

    /// Create a detector with a custom pipeline configuration.
    ///
    /// # Errors
    /// [`Error::InvalidParams`] if any parameter is outside its admissible
    /// range; nothing is scanned with a rejected configuration.
    pub fn with_config(cascade: Cascade, config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let memory = (config.memory_frames > 0).then(|| DetectionMemory::new(config.memory_frames));
        Ok(Self {
            cascade,
            config,
            memory,
        })
    }

    /// Get the current detector configuration.
    #[must_use]
    pub fn get_config(&self) -> DetectorConfig {
        self.config
    }

    /// The decoded cascade this detector runs.
    #[must_use]
    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    /// Forget all remembered frames, e.g. on a stream seek or scene cut.
    pub fn reset_memory(&mut self) {
        if let Some(memory) = &mut self.memory {
            memory.clear();
        }
    }

    /// Primary detection entry point: scan, cluster, and when temporal
    /// smoothing is enabled merge with recent frames and re-cluster.
    ///
    /// # Errors
    /// [`Error::InvalidParams`] on configuration errors.
    pub fn detect(&mut self, img: &ImageView) -> Result<Vec<Detection>> {
        self.detect_with_options(img, &DetectOptions::default())
    }

    /// Detection with per-call options (e.g. a cancellation token).
    ///
    /// # Errors
    /// [`Error::InvalidParams`] on configuration errors, [`Error::Cancelled`]
    /// if the options' token fires mid-call.
    pub fn detect_with_options(
        &mut self,
        img: &ImageView,
        options: &DetectOptions,
    ) -> Result<Vec<Detection>> {
        self.detect_with_stats_and_options(img, options)
            .map(|(dets, _)| dets)
    }

    /// Detection with detailed timing statistics.
    ///
    /// # Errors
    /// See [`Detector::detect_with_options`].
    pub fn detect_with_stats(&mut self, img: &ImageView) -> Result<(Vec<Detection>, PipelineStats)> {
        self.detect_with_stats_and_options(img, &DetectOptions::default())
    }

    /// Detection with both per-call options and timing statistics.
    ///
    /// # Errors
    /// See [`Detector::detect_with_options`].
    pub fn detect_with_stats_and_options(
        &mut self,
        img: &ImageView,
        options: &DetectOptions,
    ) -> Result<(Vec<Detection>, PipelineStats)> {
        let mut stats = PipelineStats::default();
        let start_total = std::time::Instant::now();
        let cancel = options.cancel.as_ref();

        let start_scan = std::time::Instant::now();
        let outcome = {
            let _span = tracing::info_span!("scan").entered();
            scan::scan_all(&self.cascade, img, &self.config, cancel)?
        };
        stats.scan_ms = start_scan.elapsed().as_secs_f64() * 1000.0;
        stats.regions_evaluated = outcome.regions_evaluated;
        stats.raw_detections = outcome.detections.len();

        let start_cluster = std::time::Instant::now();
        let clusters = {
            let _span = tracing::info_span!("cluster").entered();
            let mut clusters = cluster::cluster_detections_with_cancel(
                outcome.detections,
                self.config.iou_threshold,
                cancel,
            )?;
            if let Some(memory) = &mut self.memory {
                let merged = memory.update(clusters);
                clusters = cluster::cluster_detections_with_cancel(
                    merged,
                    self.config.iou_threshold,
                    cancel,
                )?;
            }
            clusters
        };
        stats.cluster_ms = start_cluster.elapsed().as_secs_f64() * 1000.0;
        stats.clusters = clusters.len();
        stats.total_ms = start_total.elapsed().as_secs_f64() * 1000.0;

        Ok((clusters, stats))
    }
}
