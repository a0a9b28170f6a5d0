//! Fitting captured BGRA frames to the encoder's input size.
//!
//! The target size is fixed by the encoder (the region rounded down to even
//! values). Each source frame is copied row by row with its own stride into
//! a strided destination, so a frame one pixel wider than the target (odd
//! region widths) is cropped rather than sheared. Frames smaller than the
//! target repeat their last row/column. Colour conversion happens after
//! this step, in the codec backend.

use crate::errors::EncodeError;
use crate::frame::{Frame, BYTES_PER_PIXEL};

/// Copies `src` into a `width` x `height` BGRA picture whose rows are
/// `dst_stride` bytes apart.
pub fn fit_bgra(
    index: usize,
    src: &Frame,
    dst: &mut [u8],
    dst_stride: usize,
    width: u32,
    height: u32,
) -> Result<(), EncodeError> {
    let fail = |reason: String| EncodeError::FrameConversionFailed { index, reason };

    if src.width() == 0 || src.height() == 0 {
        return Err(fail(format!("empty source frame {}x{}", src.width(), src.height())));
    }

    let row_bytes = width as usize * BYTES_PER_PIXEL;
    if dst_stride < row_bytes || dst.len() < dst_stride * height.saturating_sub(1) as usize + row_bytes {
        return Err(fail(format!(
            "destination too small for {}x{} (stride {}, {} bytes)",
            width,
            height,
            dst_stride,
            dst.len()
        )));
    }

    if (src.width(), src.height()) != (width, height) {
        tracing::trace!(target: "encoder", "[CONVERT] Frame {} is {}x{}, fitting into {}x{}",
            index, src.width(), src.height(), width, height);
    }

    let copy_w = width.min(src.width()) as usize * BYTES_PER_PIXEL;
    let last_px = (src.width() as usize - 1) * BYTES_PER_PIXEL;

    for y in 0..height {
        let row = src.row(y.min(src.height() - 1));
        let out = &mut dst[y as usize * dst_stride..y as usize * dst_stride + row_bytes];

        out[..copy_w].copy_from_slice(&row[..copy_w]);
        if copy_w < row_bytes {
            let edge = &row[last_px..last_px + BYTES_PER_PIXEL];
            for px in out[copy_w..].chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(edge);
            }
        }
    }

    Ok(())
}
