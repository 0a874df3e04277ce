//! Compressing one band (or a whole image) with a retained output buffer.

use crate::buffer::CompressedBuffer;
use crate::codec::{JpegCodec, TurboCodec};
use crate::error::{Result, StripeError};
use crate::format::{CodecFlags, EncodeRequest, MAX_QUALITY};

/// Encode `request` from `pixels[offset..]` into `buffer`.
///
/// Returns true if the buffer had to grow to the codec's worst-case bound.
pub(crate) fn encode_into<C: JpegCodec>(
    codec: &mut C,
    buffer: &mut CompressedBuffer,
    pixels: &[u8],
    request: &EncodeRequest,
    offset: usize,
    flags: CodecFlags,
) -> Result<bool> {
    if request.width == 0 || request.height == 0 {
        return Err(StripeError::unsupported(format!(
            "cannot encode a {}x{} image",
            request.width, request.height
        )));
    }
    if request.quality > MAX_QUALITY {
        return Err(StripeError::unsupported(format!(
            "quality {} is outside 0..={MAX_QUALITY}",
            request.quality
        )));
    }

    let size = request.uncompressed_size();
    let source = offset
        .checked_add(size)
        .and_then(|end| pixels.get(offset..end))
        .ok_or(StripeError::SizeMismatch {
            what: "source pixels",
            expected: offset.saturating_add(size),
            actual: pixels.len(),
        })?;

    let required = codec.worst_case_size(request.width, request.height, request.subsampling);
    let grew = buffer.reset(*request, required);
    codec.encode(source, request, flags, buffer.output_mut())?;
    Ok(grew)
}

/// Single-shot JPEG compressor.
///
/// Keeps one output buffer between calls. Each successful `compress` moves
/// that buffer out to the caller; hand it back with [`recycle`](Self::recycle)
/// (or use [`compress_recycled`](Self::compress_recycled)) to avoid a fresh
/// allocation next time.
#[derive(Debug)]
pub struct BandCompressor<C = TurboCodec> {
    codec: C,
    buffer: CompressedBuffer,
}

impl<C: JpegCodec + Default> Default for BandCompressor<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C: JpegCodec> BandCompressor<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            buffer: CompressedBuffer::new(),
        }
    }

    /// Compress `request.uncompressed_size()` bytes of `pixels` starting at
    /// `offset`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedConfiguration` for a zero-sized request
    /// - `SizeMismatch` if `pixels` ends before the image does
    /// - `Codec` if the encoder fails
    pub fn compress(
        &mut self,
        pixels: &[u8],
        request: &EncodeRequest,
        offset: usize,
        flags: CodecFlags,
    ) -> Result<CompressedBuffer> {
        let mut buffer = std::mem::take(&mut self.buffer);
        match encode_into(&mut self.codec, &mut buffer, pixels, request, offset, flags) {
            Ok(_) => Ok(buffer),
            Err(e) => {
                self.buffer = buffer;
                Err(e)
            }
        }
    }

    /// Take `buffer` back, then compress into it.
    pub fn compress_recycled(
        &mut self,
        buffer: CompressedBuffer,
        pixels: &[u8],
        request: &EncodeRequest,
        offset: usize,
        flags: CodecFlags,
    ) -> Result<CompressedBuffer> {
        self.recycle(buffer);
        self.compress(pixels, request, offset, flags)
    }

    /// Take a previously returned buffer back for reuse.
    ///
    /// The larger of the held and the offered allocation is kept.
    pub fn recycle(&mut self, buffer: CompressedBuffer) {
        if buffer.capacity() >= self.buffer.capacity() {
            self.buffer = buffer;
        }
    }

    /// Capacity of the buffer the next call will write into.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}
