//! Partitioning an image into horizontal bands.
//!
//! # Layout
//!
//! An image of `height` rows split into `n` bands gives every band
//! `height / n` rows except the last, which absorbs the remainder:
//!
//! ```text
//! rows:   | h/n | h/n | ... | h - (n-1)*(h/n) |
//! offset: 0     r*s   2*r*s ...                  (s = width * components)
//! ```
//!
//! Offsets are computed from the cumulative row count of the preceding bands,
//! so bands of unequal height still land at the right place in the flat buffer.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StripeError};
use crate::format::{CodecFlags, PixelFormat};

/// Options for a striped encode.
///
/// Only tightly packed, top-down sources can be striped: a non-zero `pitch`
/// or `flags.bottom_up` is rejected as an unsupported configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripeOptions {
    /// Flags forwarded to every band's codec.
    pub flags: CodecFlags,
    /// Source row stride in bytes; 0 means `width * components`.
    pub pitch: usize,
}

impl StripeOptions {
    pub fn new(flags: CodecFlags) -> Self {
        Self { flags, pitch: 0 }
    }

    /// Fail unless the options describe a layout bands can be cut from.
    pub(crate) fn check_stripable(&self) -> Result<()> {
        if self.pitch != 0 {
            return Err(StripeError::unsupported(format!(
                "row pitch {} (only packed rows can be striped)",
                self.pitch
            )));
        }
        check_top_down(self.flags)
    }
}

/// Fail on bottom-up row order, which bands cannot be stacked in.
pub(crate) fn check_top_down(flags: CodecFlags) -> Result<()> {
    if flags.bottom_up {
        return Err(StripeError::unsupported(
            "bottom-up rows cannot be striped",
        ));
    }
    Ok(())
}

/// A contiguous run of rows within a larger image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    /// Position of the band, top to bottom.
    pub index: usize,
    /// First image row covered by the band.
    pub first_row: usize,
    /// Number of rows in the band.
    pub rows: usize,
    /// Byte offset of the band's first pixel in the flat image buffer.
    pub offset: usize,
    /// Byte length of the band in the flat image buffer.
    pub len: usize,
}

impl Band {
    /// Byte range of the band in the flat image buffer.
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Row counts of `stack_count` bands covering `height` rows.
///
/// Fails with `UnsupportedConfiguration` unless `1 <= stack_count <= height`.
pub fn band_rows(height: usize, stack_count: usize) -> Result<Vec<usize>> {
    if stack_count == 0 {
        return Err(StripeError::unsupported("stack count must be at least 1"));
    }
    if stack_count > height {
        return Err(StripeError::unsupported(format!(
            "cannot split {height} rows into {stack_count} bands"
        )));
    }
    let rows = height / stack_count;
    let last = height - (stack_count - 1) * rows;
    let mut counts = vec![rows; stack_count];
    counts[stack_count - 1] = last;
    Ok(counts)
}

/// Lay out bands of the given row counts over a `width`-pixel-wide image.
pub fn bands_from_rows(rows: &[usize], width: usize, format: PixelFormat) -> Vec<Band> {
    let row_bytes = width * format.components();
    let mut first_row = 0;
    rows.iter()
        .enumerate()
        .map(|(index, &count)| {
            let band = Band {
                index,
                first_row,
                rows: count,
                offset: first_row * row_bytes,
                len: count * row_bytes,
            };
            first_row += count;
            band
        })
        .collect()
}

/// Split a `width` x `height` image into `stack_count` bands.
pub fn partition(
    width: usize,
    height: usize,
    format: PixelFormat,
    stack_count: usize,
) -> Result<Vec<Band>> {
    let rows = band_rows(height, stack_count)?;
    Ok(bands_from_rows(&rows, width, format))
}

/// Carve `buffer` into one mutable slice per band.
///
/// `bands` must be contiguous and start at offset zero, as produced by
/// [`bands_from_rows`]. The slices are disjoint by construction, so each can
/// be handed to a different thread.
pub fn split_bands_mut<'a>(buffer: &'a mut [u8], bands: &[Band]) -> Result<Vec<&'a mut [u8]>> {
    let total: usize = bands.iter().map(|b| b.len).sum();
    if buffer.len() < total {
        return Err(StripeError::SizeMismatch {
            what: "band output buffer",
            expected: total,
            actual: buffer.len(),
        });
    }
    let mut rest: &'a mut [u8] = &mut buffer[..total];
    let mut slices = Vec::with_capacity(bands.len());
    for band in bands {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(band.len);
        slices.push(head);
        rest = tail;
    }
    Ok(slices)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
