//! bandjpeg core - striped, concurrent JPEG encoding and decoding
//!
//! An image is cut into horizontal bands, each band becomes an independent
//! JPEG compressed on its own thread, and a banded image is reassembled by
//! decoding every band concurrently into its slice of one output buffer.
//! Single-image compressors and decompressors with retained buffers, and a
//! pool of reusable output buffers, are built on the same codec contexts.

pub mod buffer;
pub mod codec;
pub mod decode;
pub mod encode;
pub mod error;
pub mod format;
pub mod queue;
pub mod stripe;

#[cfg(test)]
mod testing;

pub use buffer::{CompressedBuffer, PixelBuffer};
pub use codec::{JpegCodec, JpegHeader, TurboCodec};
pub use decode::{BandDecompressor, ParallelDecompressor};
pub use encode::{BandCompressor, BufferPool, ParallelCompressor, PoolConfig, PooledBuffer, PooledCompressor};
pub use error::{Result, StripeError};
pub use format::{CodecFlags, EncodeRequest, PixelFormat, Subsampling, MAX_QUALITY};
pub use queue::WorkQueue;
pub use stripe::{Band, StripeOptions};
