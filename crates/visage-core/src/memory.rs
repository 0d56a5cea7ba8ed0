//! Temporal detection memory.
//!
//! Per-frame detections flicker: a borderline region clears the cascade in
//! one frame and misses it in the next. Merging the detections of the last
//! few frames before clustering stabilizes the output at the cost of a short
//! trail when the object moves.

use crate::Detection;

/// Fixed-capacity circular buffer of per-frame detection lists.
///
/// Owned by one detector instance; share only behind external
/// synchronization.
#[derive(Clone, Debug)]
pub struct DetectionMemory {
    slots: Vec<Vec<Detection>>,
    cursor: usize,
}

impl DetectionMemory {
    /// Create a memory spanning `capacity` frames. A capacity of zero is
    /// clamped to one (a one-frame memory just echoes its input).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Vec::new(); capacity.max(1)],
            cursor: 0,
        }
    }

    /// Number of frames the memory spans.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store the current frame's detections, evicting the oldest slot, and
    /// return the union of all remembered frames. Within a slot the insertion
    /// order is preserved.
    pub fn update(&mut self, dets: Vec<Detection>) -> Vec<Detection> {
        self.slots[self.cursor] = dets;
        self.cursor = (self.cursor + 1) % self.slots.len();

        let mut merged = Vec::with_capacity(self.slots.iter().map(Vec::len).sum());
        for slot in &self.slots {
            merged.extend_from_slice(slot);
        }
        merged
    }

    /// Drop all remembered frames.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(score: f32) -> Detection {
        Detection {
            row: 0.0,
            col: 0.0,
            scale: 10.0,
            score,
        }
    }

    fn scores(dets: &[Detection]) -> Vec<f32> {
        let mut s: Vec<f32> = dets.iter().map(|d| d.score).collect();
        s.sort_by(f32::total_cmp);
        s
    }

    #[test]
    fn test_union_grows_then_evicts() {
        let mut memory = DetectionMemory::new(3);
        assert_eq!(scores(&memory.update(vec![tagged(1.0)])), vec![1.0]);
        assert_eq!(scores(&memory.update(vec![tagged(2.0)])), vec![1.0, 2.0]);
        assert_eq!(
            scores(&memory.update(vec![tagged(3.0)])),
            vec![1.0, 2.0, 3.0]
        );
        // Fourth frame evicts the first.
        assert_eq!(
            scores(&memory.update(vec![tagged(4.0)])),
            vec![2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_empty_frames_age_out_detections() {
        let mut memory = DetectionMemory::new(2);
        assert_eq!(memory.update(vec![tagged(1.0)]).len(), 1);
        assert_eq!(memory.update(Vec::new()).len(), 1);
        assert_eq!(memory.update(Vec::new()).len(), 0);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut memory = DetectionMemory::new(0);
        assert_eq!(memory.capacity(), 1);
        assert_eq!(memory.update(vec![tagged(1.0)]).len(), 1);
        assert_eq!(memory.update(vec![tagged(2.0)]).len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut memory = DetectionMemory::new(4);
        memory.update(vec![tagged(1.0), tagged(2.0)]);
        memory.clear();
        assert_eq!(memory.update(Vec::new()).len(), 0);
    }

    #[test]
    fn test_slot_preserves_insertion_order() {
        let mut memory = DetectionMemory::new(1);
        let merged = memory.update(vec![tagged(5.0), tagged(1.0), tagged(3.0)]);
        let raw: Vec<f32> = merged.iter().map(|d| d.score).collect();
        assert_eq!(raw, vec![5.0, 1.0, 3.0]);
    }
}
