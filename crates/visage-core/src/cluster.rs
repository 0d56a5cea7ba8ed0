//! Score-ranked non-maximum suppression.
//!
//! The scan emits one detection per accepted region, so a single object is
//! typically covered by a pile of overlapping regions across neighboring
//! positions and scales. Clustering reduces each pile to one representative:
//! detections are ranked by score, and each unassigned detection greedily
//! absorbs every later unassigned detection it sufficiently overlaps.

use crate::config::CancelToken;
use crate::error::{Error, Result};
use crate::Detection;
use std::cmp::Ordering;

/// Overlap of two centered square regions.
///
/// The intersection area is divided by the sum of the squared sides minus the
/// intersection, not by the true union area. This is the detector's defined
/// metric; the self-overlap of a region is exactly 1.
#[must_use]
pub fn calculate_iou(a: &Detection, b: &Detection) -> f32 {
    let over_r = 0.0f32.max(
        (a.row + a.scale / 2.0).min(b.row + b.scale / 2.0)
            - (a.row - a.scale / 2.0).max(b.row - b.scale / 2.0),
    );
    let over_c = 0.0f32.max(
        (a.col + a.scale / 2.0).min(b.col + b.scale / 2.0)
            - (a.col - a.scale / 2.0).max(b.col - b.scale / 2.0),
    );
    let inter = over_r * over_c;
    inter / (a.scale * a.scale + b.scale * b.scale - inter)
}

/// Cluster raw detections, checking `cancel` between anchors.
///
/// Representatives average the position and scale of their members and keep
/// the anchor's score, which is the maximum of the group since anchors are
/// visited in descending score order. Clusters are emitted in that same
/// order. A detection joins exactly one cluster.
///
/// # Errors
/// [`Error::Cancelled`] if the token fires mid-sweep.
pub fn cluster_detections_with_cancel(
    mut dets: Vec<Detection>,
    iou_threshold: f32,
    cancel: Option<&CancelToken>,
) -> Result<Vec<Detection>> {
    // Stable sort: equal scores keep their emission order.
    dets.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut assigned = vec![false; dets.len()];
    let mut clusters = Vec::new();

    for i in 0..dets.len() {
        if assigned[i] {
            continue;
        }
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }

        let mut sum_row = 0.0f32;
        let mut sum_col = 0.0f32;
        let mut sum_scale = 0.0f32;
        let mut members = 0u32;

        // Starting at i includes the anchor itself, so members >= 1.
        for j in i..dets.len() {
            if assigned[j] {
                continue;
            }
            if calculate_iou(&dets[i], &dets[j]) > iou_threshold {
                assigned[j] = true;
                sum_row += dets[j].row;
                sum_col += dets[j].col;
                sum_scale += dets[j].scale;
                members += 1;
            }
        }

        let n = members as f32;
        clusters.push(Detection {
            row: sum_row / n,
            col: sum_col / n,
            scale: sum_scale / n,
            score: dets[i].score,
        });
    }

    Ok(clusters)
}

/// Cluster raw detections into representatives.
#[must_use]
#[allow(clippy::missing_panics_doc)]
pub fn cluster_detections(dets: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    cluster_detections_with_cancel(dets, iou_threshold, None)
        .expect("clustering without a token cannot be cancelled")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn det(row: f32, col: f32, scale: f32, score: f32) -> Detection {
        Detection {
            row,
            col,
            scale,
            score,
        }
    }

    #[test]
    fn test_two_overlapping_one_far() {
        let dets = vec![
            det(10.0, 10.0, 20.0, 0.9),
            det(12.0, 12.0, 20.0, 0.8),
            det(100.0, 100.0, 20.0, 0.7),
        ];
        let clusters = cluster_detections(dets, 0.3);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], det(11.0, 11.0, 20.0, 0.9));
        assert_eq!(clusters[1], det(100.0, 100.0, 20.0, 0.7));
    }

    #[test]
    fn test_iou_shifted_squares() {
        let a = det(0.0, 0.0, 10.0, 0.0);
        let b = det(0.0, 5.0, 10.0, 0.0);
        // Intersection 10x5 = 50, denominator 100 + 100 - 50.
        let iou = calculate_iou(&a, &b);
        assert!((iou - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_of_region_with_itself() {
        let a = det(7.0, 3.0, 12.0, 0.5);
        assert_eq!(calculate_iou(&a, &a), 1.0);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = det(0.0, 0.0, 10.0, 0.0);
        let b = det(0.0, 50.0, 10.0, 0.0);
        assert_eq!(calculate_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_singleton_cluster_is_identity() {
        let dets = vec![det(5.0, 6.0, 30.0, 1.25)];
        let clusters = cluster_detections(dets.clone(), 0.2);
        assert_eq!(clusters, dets);
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_detections(Vec::new(), 0.2).is_empty());
    }

    #[test]
    fn test_assigned_detection_never_rejoins() {
        // The middle detection overlaps both ends, the ends do not overlap
        // each other. The best-scoring end claims the middle; the far end
        // must not claim it again.
        let dets = vec![
            det(0.0, 0.0, 10.0, 0.9),
            det(0.0, 6.0, 10.0, 0.8),
            det(0.0, 12.0, 10.0, 0.7),
        ];
        let clusters = cluster_detections(dets, 0.2);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], det(0.0, 3.0, 10.0, 0.9));
        assert_eq!(clusters[1], det(0.0, 12.0, 10.0, 0.7));
    }

    #[test]
    fn test_cluster_count_monotone_in_threshold() {
        let dets = vec![
            det(0.0, 0.0, 10.0, 0.9),
            det(0.0, 4.0, 10.0, 0.8),
            det(0.0, 8.0, 10.0, 0.7),
            det(0.0, 30.0, 10.0, 0.6),
        ];
        let mut previous = usize::MAX;
        for threshold in [0.6, 0.45, 0.3, 0.15, 0.05] {
            let count = cluster_detections(dets.clone(), threshold).len();
            assert!(
                count <= previous,
                "count {count} at threshold {threshold} exceeds {previous}"
            );
            previous = count;
        }
    }

    #[test]
    fn test_cancelled_token_aborts() {
        let token = CancelToken::new();
        token.cancel();
        let dets = vec![det(0.0, 0.0, 10.0, 0.9)];
        let result = cluster_detections_with_cancel(dets, 0.2, Some(&token));
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    proptest! {
        #[test]
        fn test_iou_symmetry(
            r1 in -50.0f32..50.0, c1 in -50.0f32..50.0, s1 in 1.0f32..60.0,
            r2 in -50.0f32..50.0, c2 in -50.0f32..50.0, s2 in 1.0f32..60.0,
        ) {
            let a = det(r1, c1, s1, 0.0);
            let b = det(r2, c2, s2, 0.0);
            prop_assert_eq!(calculate_iou(&a, &b), calculate_iou(&b, &a));
        }

        #[test]
        fn test_iou_range(
            r1 in -50.0f32..50.0, c1 in -50.0f32..50.0, s1 in 1.0f32..60.0,
            r2 in -50.0f32..50.0, c2 in -50.0f32..50.0, s2 in 1.0f32..60.0,
        ) {
            let iou = calculate_iou(&det(r1, c1, s1, 0.0), &det(r2, c2, s2, 0.0));
            prop_assert!((0.0..=1.0).contains(&iou));
        }
    }
}
