//! The single-shot JPEG primitive every band codec is built on.
//!
//! A [`JpegCodec`] value is a codec context: stateful, usable from one thread
//! at a time, and never shared between concurrently running bands. The trait
//! only requires `Send` so a context can be moved into (or lent exclusively
//! to) a band's worker thread.
//!
//! # Backends
//!
//! - [`TurboCodec`]: libjpeg-turbo through the `turbojpeg` crate. Honors
//!   every subsampling mode and decodes straight into any [`PixelFormat`].

mod turbo;

pub use turbo::TurboCodec;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::format::{worst_case_compressed_size, CodecFlags, EncodeRequest, PixelFormat, Subsampling};

/// Image properties stored in a JPEG stream's frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JpegHeader {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Chroma subsampling of the stream.
    pub subsampling: Subsampling,
    /// Layout the stream decodes to without conversion.
    pub format: PixelFormat,
}

/// One-shot JPEG encode/decode operations.
pub trait JpegCodec: Send {
    /// Compress `pixels` (exactly `request.uncompressed_size()` bytes) into
    /// `out`. On return `out.len()` is the compressed size.
    ///
    /// `out` arrives cleared, with capacity for at least
    /// [`worst_case_size`](Self::worst_case_size) bytes.
    fn encode(
        &mut self,
        pixels: &[u8],
        request: &EncodeRequest,
        flags: CodecFlags,
        out: &mut Vec<u8>,
    ) -> Result<()>;

    /// Read the frame header without decoding any pixels.
    fn decode_header(&mut self, jpeg: &[u8]) -> Result<JpegHeader>;

    /// Decompress `jpeg` into `out`, which is exactly
    /// `width * height * format.components()` bytes.
    fn decode(
        &mut self,
        jpeg: &[u8],
        out: &mut [u8],
        width: usize,
        height: usize,
        format: PixelFormat,
        flags: CodecFlags,
    ) -> Result<()>;

    /// Upper bound on the bytes [`encode`](Self::encode) can produce.
    fn worst_case_size(&self, width: usize, height: usize, subsampling: Subsampling) -> usize {
        worst_case_compressed_size(width, height, subsampling)
    }
}
