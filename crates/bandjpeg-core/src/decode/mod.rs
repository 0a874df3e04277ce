//! Image decoding pipeline.
//!
//! This module provides:
//! - [`BandDecompressor`]: one JPEG per call into a retained pixel buffer
//! - [`ParallelDecompressor`]: a stack of band JPEGs decoded concurrently
//!   into one image
//!
//! # Examples
//!
//! ```ignore
//! use bandjpeg_core::decode::ParallelDecompressor;
//! use bandjpeg_core::CodecFlags;
//!
//! // `bands` came from `ParallelCompressor::compress` with 4 bands
//! let mut decompressor: ParallelDecompressor = ParallelDecompressor::new(4);
//! let image = decompressor.decompress(&bands, CodecFlags::default())?;
//! println!("Decoded {}x{} image", image.width(), image.height());
//! ```

mod band;
mod striped;

pub use band::BandDecompressor;
pub use striped::ParallelDecompressor;
