//! Stride-aware image view for zero-copy ingestion.

use crate::error::{Error, Result};

/// A borrowed view into a grayscale buffer with explicit stride support.
///
/// Camera drivers and host frameworks frequently hand over buffers whose rows
/// are padded for alignment; the view keeps `stride` separate from `width` so
/// such buffers are consumed without copying. Pixel values are unsigned 8-bit
/// intensities.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    /// Flat pixel bytes, row-major, `stride` bytes per row.
    pub data: &'a [u8],
    /// Number of valid columns per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Bytes per row; `stride >= width`.
    pub stride: usize,
}

impl<'a> ImageView<'a> {
    /// Create a new view after validating that the buffer covers the declared
    /// dimensions and stride.
    pub fn new(data: &'a [u8], width: usize, height: usize, stride: usize) -> Result<Self> {
        if stride < width {
            return Err(Error::InvalidImage(format!(
                "stride ({stride}) cannot be less than width ({width})"
            )));
        }
        let required = if height > 0 {
            (height - 1) * stride + width
        } else {
            0
        };
        if data.len() < required {
            return Err(Error::InvalidImage(format!(
                "buffer of {} bytes too small for {width}x{height} image with stride {stride} (required: {required})",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Safe accessor for a specific row.
    #[inline(always)]
    #[must_use]
    pub fn get_row(&self, y: usize) -> &[u8] {
        assert!(y < self.height, "row index {y} out of bounds");
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// Safe accessor for a specific pixel.
    #[inline(always)]
    #[must_use]
    pub fn get_pixel(&self, x: usize, y: usize) -> u8 {
        assert!(x < self.width, "column index {x} out of bounds");
        self.get_row(y)[x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_view_stride() {
        let data = vec![
            1, 2, 3, 0, // row 0 + padding
            4, 5, 6, 0, // row 1 + padding
        ];
        let view = ImageView::new(&data, 3, 2, 4).unwrap();
        assert_eq!(view.get_row(0), &[1, 2, 3]);
        assert_eq!(view.get_row(1), &[4, 5, 6]);
        assert_eq!(view.get_pixel(1, 1), 5);
    }

    #[test]
    fn test_invalid_buffer_size() {
        let data = vec![1, 2, 3];
        let result = ImageView::new(&data, 2, 2, 2);
        assert!(matches!(result, Err(Error::InvalidImage(_))));
    }

    #[test]
    fn test_stride_below_width_rejected() {
        let data = vec![0u8; 16];
        assert!(ImageView::new(&data, 4, 2, 3).is_err());
    }
}
