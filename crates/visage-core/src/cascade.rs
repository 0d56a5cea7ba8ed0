//! Cascade decoding and per-region classification.
//!
//! A cascade is an ordered ensemble of complete binary decision trees with
//! per-stage rejection thresholds. Each internal tree node holds a pixel
//! intensity comparison: two offsets in a normalized signed-byte coordinate
//! range, scaled by the region side at evaluation time. Walking a tree routes
//! a region to one leaf per stage; leaf scores accumulate and a region is
//! rejected as soon as the running sum drops to a stage threshold or below.
//!
//! # Blob format
//!
//! All multi-byte fields are little-endian, independent of host endianness:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 8 | opaque header (version + training metadata) |
//! | 8 | 4 | tree depth `D` (`i32`) |
//! | 12 | 4 | tree count `T` (`i32`) |
//! | 16 | — | per tree: `4*(2^D - 1)` test bytes, `2^D` `f32` leaves, 1 `f32` threshold |
//!
//! Total length is `16 + T * 8 * 2^D` bytes. The decoder stores the test
//! table with `2^D` four-byte slots per tree and zero-fills slot 0 (heap
//! index 0 is unused), which keeps node addressing branchless.

use crate::error::{Error, Result};
use crate::image::ImageView;

/// Score returned by [`Cascade::classify`] when a stage rejects the region.
///
/// An accepted region always scores strictly above zero (its margin over the
/// final stage threshold), so `score > 0.0` is the acceptance test.
pub const REJECT: f32 = -1.0;

#[inline]
fn read_i32_le(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[inline]
fn read_f32_le(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// A decoded detection cascade. Immutable after decoding; one instance can be
/// shared freely across threads.
#[derive(Clone, Debug)]
pub struct Cascade {
    /// Opaque header bytes, retained for re-serialization.
    header: [u8; 8],
    /// Depth of every tree; each tree has `2^depth` leaves.
    depth: u32,
    /// Number of trees (stages).
    ntrees: usize,
    /// Node tests, 4 signed bytes per node, `4 * 2^depth` bytes per tree.
    /// Slot 0 of each tree is zero padding.
    tcodes: Vec<i8>,
    /// Leaf scores, `2^depth` per tree.
    tpreds: Vec<f32>,
    /// Per-stage rejection thresholds.
    thresh: Vec<f32>,
}

impl Cascade {
    /// Decode a cascade from its binary blob.
    ///
    /// # Errors
    /// [`Error::InvalidGeometry`] if the declared depth or tree count is
    /// non-positive or the depth exceeds 16; [`Error::TruncatedBlob`] if the
    /// input is shorter than the length implied by the header. No partial
    /// cascade is ever produced.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 16 {
            return Err(Error::TruncatedBlob {
                expected: 16,
                actual: bytes.len(),
            });
        }

        let depth = read_i32_le(bytes, 8);
        let ntrees = read_i32_le(bytes, 12);
        if depth <= 0 || depth > 16 || ntrees <= 0 {
            return Err(Error::InvalidGeometry {
                depth,
                trees: ntrees,
            });
        }

        let depth = depth as u32;
        let ntrees = ntrees as usize;
        let pow2 = 1usize << depth;

        // Per tree: 4*(2^D - 1) test bytes + 4*2^D leaf bytes + 4 threshold
        // bytes, which collapses to 8*2^D.
        let expected = 16 + ntrees * 8 * pow2;
        if bytes.len() < expected {
            return Err(Error::TruncatedBlob {
                expected,
                actual: bytes.len(),
            });
        }

        let mut header = [0u8; 8];
        header.copy_from_slice(&bytes[..8]);

        let mut tcodes = Vec::with_capacity(ntrees * 4 * pow2);
        let mut tpreds = Vec::with_capacity(ntrees * pow2);
        let mut thresh = Vec::with_capacity(ntrees);

        let mut p = 16;
        for _ in 0..ntrees {
            // Zero slot for the unused heap index 0, then the real node tests
            // for heap indices 1..2^D - 1.
            tcodes.extend_from_slice(&[0i8; 4]);
            for _ in 0..4 * (pow2 - 1) {
                tcodes.push(bytes[p] as i8);
                p += 1;
            }
            for _ in 0..pow2 {
                tpreds.push(read_f32_le(bytes, p));
                p += 4;
            }
            thresh.push(read_f32_le(bytes, p));
            p += 4;
        }

        Ok(Self {
            header,
            depth,
            ntrees,
            tcodes,
            tpreds,
            thresh,
        })
    }

    /// Re-serialize into the binary blob format accepted by
    /// [`Cascade::from_bytes`]. The opaque header bytes are emitted verbatim;
    /// the zero padding slots of the test table are not.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let pow2 = 1usize << self.depth;
        let mut out = Vec::with_capacity(16 + self.ntrees * 8 * pow2);
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&(self.depth as i32).to_le_bytes());
        out.extend_from_slice(&(self.ntrees as i32).to_le_bytes());
        for t in 0..self.ntrees {
            let tree = t * 4 * pow2;
            for &code in &self.tcodes[tree + 4..tree + 4 * pow2] {
                out.push(code as u8);
            }
            for &pred in &self.tpreds[t * pow2..(t + 1) * pow2] {
                out.extend_from_slice(&pred.to_le_bytes());
            }
            out.extend_from_slice(&self.thresh[t].to_le_bytes());
        }
        out
    }

    /// Depth of every tree in the cascade.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of stages (trees).
    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.ntrees
    }

    /// Score one square region centered at `(row, col)` with side `scale`.
    ///
    /// Returns [`REJECT`] as soon as a stage threshold rejects the region,
    /// otherwise the (strictly positive) margin of the accumulated score over
    /// the final stage threshold.
    ///
    /// Row and column are upshifted by 8 so the per-node offset arithmetic is
    /// a single multiply and truncating arithmetic right shift; this exactly
    /// reproduces the trained quantization and must not be replaced by a
    /// floating division.
    ///
    /// The caller must keep every sample in bounds: with the scan driver's
    /// `scale/2 + 1` margin all sampled addresses fall inside the view. No
    /// explicit bounds handling happens here beyond safe slice indexing.
    #[must_use]
    pub fn classify(&self, row: i32, col: i32, scale: i32, img: &ImageView) -> f32 {
        let pixels = img.data;
        let ldim = img.stride;

        let r = row * 256;
        let c = col * 256;
        let pow2 = 1usize << self.depth;

        let mut root = 0usize;
        let mut o = 0.0f32;

        for i in 0..self.ntrees {
            let mut idx = 1usize;
            for _ in 0..self.depth {
                let node = root + 4 * idx;
                let y1 = ((r + i32::from(self.tcodes[node]) * scale) >> 8) as usize;
                let x1 = ((c + i32::from(self.tcodes[node + 1]) * scale) >> 8) as usize;
                let y2 = ((r + i32::from(self.tcodes[node + 2]) * scale) >> 8) as usize;
                let x2 = ((c + i32::from(self.tcodes[node + 3]) * scale) >> 8) as usize;
                // Ties route to the high branch.
                idx = 2 * idx + usize::from(pixels[y1 * ldim + x1] <= pixels[y2 * ldim + x2]);
            }
            o += self.tpreds[pow2 * i + idx - pow2];

            if o <= self.thresh[i] {
                return REJECT;
            }
            root += 4 * pow2;
        }

        o - self.thresh[self.ntrees - 1]
    }
}
