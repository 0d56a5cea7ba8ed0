//! Multi-scale sliding-window scan driver.
//!
//! The driver sweeps a geometric ladder of region sides across the image and
//! hands every candidate region to the cascade. Scales are independent, so
//! they fan out across the rayon pool; per-scale results are concatenated in
//! ascending scale order, which makes the emitted sequence identical to a
//! sequential row-major sweep.

use crate::cascade::Cascade;
use crate::config::{CancelToken, DetectorConfig};
use crate::error::{Error, Result};
use crate::image::ImageView;
use crate::Detection;
use multiversion::multiversion;
use rayon::prelude::*;

/// Raw scan output with the region count for pipeline statistics.
pub(crate) struct ScanOutcome {
    pub detections: Vec<Detection>,
    pub regions_evaluated: usize,
}

/// Run the cascade over every scan position and scale of `img`.
///
/// Emits one [`Detection`] per accepted region, row-major within each scale,
/// scales ascending. The output is raw: one object typically produces many
/// overlapping detections, which [`cluster_detections`](crate::cluster::cluster_detections)
/// reduces afterwards.
///
/// # Errors
/// [`Error::InvalidParams`] if the scan parameters fail validation.
pub fn scan_image(
    cascade: &Cascade,
    img: &ImageView,
    config: &DetectorConfig,
) -> Result<Vec<Detection>> {
    scan_all(cascade, img, config, None).map(|outcome| outcome.detections)
}

pub(crate) fn scan_all(
    cascade: &Cascade,
    img: &ImageView,
    config: &DetectorConfig,
    cancel: Option<&CancelToken>,
) -> Result<ScanOutcome> {
    config.validate()?;

    let per_scale: Vec<(Vec<Detection>, usize)> = scale_schedule(config)
        .into_par_iter()
        .map(|scale| sweep_scale(cascade, img, scale, config.shift_factor, cancel))
        .collect();

    if cancel.is_some_and(CancelToken::is_cancelled) {
        return Err(Error::Cancelled);
    }

    let mut detections = Vec::with_capacity(per_scale.iter().map(|(d, _)| d.len()).sum());
    let mut regions_evaluated = 0;
    for (dets, regions) in per_scale {
        detections.extend(dets);
        regions_evaluated += regions;
    }
    Ok(ScanOutcome {
        detections,
        regions_evaluated,
    })
}

/// The geometric ladder of scales for one scan.
fn scale_schedule(config: &DetectorConfig) -> Vec<f32> {
    let mut scales = Vec::new();
    let mut scale = config.min_size as f32;
    while scale <= config.max_size as f32 {
        scales.push(scale);
        scale *= config.scale_factor;
    }
    scales
}

/// Row-major sweep of one scale.
///
/// The `scale/2 + 1` margin keeps every pixel the classifier samples inside
/// the view: node offsets span at most half the region side in each
/// direction, and the extra pixel absorbs the truncation of odd sides. This
/// margin is the sole bounds defense of the hot loop.
#[multiversion(targets(
    "x86_64+avx2+bmi1+bmi2+popcnt+lzcnt",
    "x86_64+avx512f+avx512bw+avx512dq+avx512vl",
    "aarch64+neon"
))]
fn sweep_scale(
    cascade: &Cascade,
    img: &ImageView,
    scale: f32,
    shift_factor: f32,
    cancel: Option<&CancelToken>,
) -> (Vec<Detection>, usize) {
    let rows = img.height as i32;
    let cols = img.width as i32;

    let step = ((shift_factor * scale) as i32).max(1);
    let offset = (scale / 2.0) as i32 + 1;
    let side = scale as i32;

    let mut detections = Vec::new();
    let mut regions = 0usize;

    let mut r = offset;
    while r <= rows - offset {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            break;
        }
        let mut c = offset;
        while c <= cols - offset {
            regions += 1;
            let q = cascade.classify(r, c, side, img);
            if q > 0.0 {
                detections.push(Detection {
                    row: r as f32,
                    col: c as f32,
                    scale,
                    score: q,
                });
            }
            c += step;
        }
        r += step;
    }

    (detections, regions)
}
