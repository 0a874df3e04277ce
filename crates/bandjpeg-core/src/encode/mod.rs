//! Image encoding pipeline.
//!
//! This module provides:
//! - [`BandCompressor`]: one JPEG per call, with a retained output buffer
//! - [`ParallelCompressor`]: an image split into horizontal bands, each band
//!   compressed to its own JPEG on its own thread
//! - [`PooledCompressor`]: one JPEG per call, written into buffers borrowed
//!   from a [`BufferPool`]
//!
//! # Examples
//!
//! ```ignore
//! use bandjpeg_core::encode::ParallelCompressor;
//! use bandjpeg_core::{EncodeRequest, PixelFormat, StripeOptions, Subsampling};
//!
//! let pixels = vec![128u8; 640 * 480 * 3];
//! let request = EncodeRequest::new(640, 480, PixelFormat::Rgb, Subsampling::S420, 90);
//! let mut compressor: ParallelCompressor = ParallelCompressor::new(4);
//! let bands = compressor.compress(&pixels, 4, &request, StripeOptions::default())?;
//! assert_eq!(bands.len(), 4);
//! ```

mod band;
mod pool;
mod striped;

pub use band::BandCompressor;
pub use pool::{BufferPool, PoolConfig, PooledBuffer, PooledCompressor};
pub use striped::ParallelCompressor;
