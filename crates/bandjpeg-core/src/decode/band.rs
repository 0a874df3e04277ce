//! Decompressing one JPEG with a retained pixel buffer.

use crate::buffer::PixelBuffer;
use crate::codec::{JpegCodec, TurboCodec};
use crate::error::Result;
use crate::format::{CodecFlags, PixelFormat};

/// Single-shot JPEG decompressor.
///
/// The pixel buffer survives between calls and only grows, so decoding a
/// series of same-sized images allocates once as long as the caller hands
/// each result back with [`recycle`](Self::recycle).
#[derive(Debug)]
pub struct BandDecompressor<C = TurboCodec> {
    codec: C,
    buffer: PixelBuffer,
}

impl<C: JpegCodec + Default> Default for BandDecompressor<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C: JpegCodec> BandDecompressor<C> {
    pub fn new(codec: C) -> Self {
        Self::with_capacity(codec, 0)
    }

    /// Create a decompressor with `capacity` pixel bytes allocated up front.
    pub fn with_capacity(codec: C, capacity: usize) -> Self {
        Self {
            codec,
            buffer: PixelBuffer::with_capacity(capacity),
        }
    }

    /// Decode `jpeg` into the layout its header describes.
    pub fn decompress(&mut self, jpeg: &[u8], flags: CodecFlags) -> Result<PixelBuffer> {
        let header = self.codec.decode_header(jpeg)?;
        self.decode(jpeg, header.width, header.height, header.format, flags)
    }

    /// Decode `jpeg` into `format`.
    pub fn decompress_as(
        &mut self,
        jpeg: &[u8],
        format: PixelFormat,
        flags: CodecFlags,
    ) -> Result<PixelBuffer> {
        let header = self.codec.decode_header(jpeg)?;
        self.decode(jpeg, header.width, header.height, format, flags)
    }

    fn decode(
        &mut self,
        jpeg: &[u8],
        width: usize,
        height: usize,
        format: PixelFormat,
        flags: CodecFlags,
    ) -> Result<PixelBuffer> {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.set_parameters(width, height, format);
        match self
            .codec
            .decode(jpeg, buffer.data_mut(), width, height, format, flags)
        {
            Ok(()) => Ok(buffer),
            Err(e) => {
                self.buffer = buffer;
                Err(e)
            }
        }
    }

    /// Take a previously returned buffer back for reuse.
    ///
    /// The larger of the held and the offered allocation is kept.
    pub fn recycle(&mut self, buffer: PixelBuffer) {
        if buffer.capacity() >= self.buffer.capacity() {
            self.buffer = buffer;
        }
    }

    /// Pixel bytes available to the next call without growing.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}
