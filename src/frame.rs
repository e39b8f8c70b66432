//! Staging frame storage and pixel-format conversion.
//!
//! A [`RawFrame`] holds the most recent capture in packed YUYV: each 4-byte
//! macropixel `(Y0, U, Y1, V)` covers two horizontal pixels sharing one
//! chroma pair. The buffer is overwritten in place on every capture, so
//! callers must convert (or copy) before capturing again.

use crate::tables;

/// Raw packed-pixel staging buffer plus its geometry.
///
/// The backing allocation is `width * height * 4` bytes; one full YUYV
/// frame occupies the first `width * height * 2`, the rest is slack for
/// drivers that report a larger per-buffer size. Conversions read exactly
/// the frame portion.
pub struct RawFrame {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl RawFrame {
    /// Allocates a zeroed staging buffer for `width x height` pixels.
    /// Width must be even (pixels come in macropixel pairs).
    pub(crate) fn new(width: usize, height: usize) -> Self {
        debug_assert!(width % 2 == 0, "YUYV width must be even");
        Self {
            data: vec![0; width * height * 4],
            width,
            height,
        }
    }

    /// Overwrites the staging bytes with `src`, truncating whichever side
    /// is longer.
    pub(crate) fn fill_from(&mut self, src: &[u8]) {
        let len = src.len().min(self.data.len());
        self.data[..len].copy_from_slice(&src[..len]);
    }

    /// Frame width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Converts the frame to interleaved RGB.
    ///
    /// Rows are written `dst_stride` bytes apart so the frame can be
    /// embedded into a larger row-major image; bytes between `width * 3`
    /// and the stride are left untouched. `dst` must hold at least
    /// `(height - 1) * dst_stride + width * 3` bytes and `dst_stride` must
    /// be at least `width * 3`; destination sizing is the caller's
    /// responsibility, checked only by debug assertions.
    pub fn to_rgb(&self, dst: &mut [u8], dst_stride: usize) {
        let row_bytes = self.width * 3;
        debug_assert!(dst_stride >= row_bytes, "stride smaller than a row");
        debug_assert!(
            self.height == 0 || dst.len() >= (self.height - 1) * dst_stride + row_bytes,
            "destination too small for {}x{} RGB at stride {dst_stride}",
            self.width,
            self.height,
        );

        let tables = tables::tables();
        let macro_row = self.width * 2;
        for (row, src_row) in self
            .data
            .chunks_exact(macro_row)
            .take(self.height)
            .enumerate()
        {
            let base = row * dst_stride;
            let dst_row = &mut dst[base..base + row_bytes];
            for (src, out) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(6)) {
                let (y0, u, y1, v) = (src[0], src[1], src[2], src[3]);
                out[..3].copy_from_slice(&tables.rgb(y0, u, v));
                out[3..].copy_from_slice(&tables.rgb(y1, u, v));
            }
        }
    }

    /// Converts the frame to 8-bit grayscale by emitting the luma samples
    /// unchanged.
    ///
    /// Same stride contract as [`Self::to_rgb`] with one byte per pixel:
    /// `dst` must hold `(height - 1) * dst_stride + width` bytes and
    /// `dst_stride` must be at least `width`.
    pub fn to_gray(&self, dst: &mut [u8], dst_stride: usize) {
        debug_assert!(dst_stride >= self.width, "stride smaller than a row");
        debug_assert!(
            self.height == 0 || dst.len() >= (self.height - 1) * dst_stride + self.width,
            "destination too small for {}x{} grayscale at stride {dst_stride}",
            self.width,
            self.height,
        );

        let macro_row = self.width * 2;
        for (row, src_row) in self
            .data
            .chunks_exact(macro_row)
            .take(self.height)
            .enumerate()
        {
            let base = row * dst_stride;
            let dst_row = &mut dst[base..base + self.width];
            for (src, out) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(2)) {
                out[0] = src[0];
                out[1] = src[2];
            }
        }
    }
}
