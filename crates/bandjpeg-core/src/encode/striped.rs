//! Parallel compression of an image as a stack of independent JPEG bands.
//!
//! # Algorithm
//!
//! 1. Check the options (packed, top-down rows only) and the source length
//! 2. Partition the rows into `stack_count` bands
//! 3. Spawn one scoped thread per band, each with exclusive use of one
//!    [`BandCompressor`]
//! 4. Join every thread, then report the first failing band or return the
//!    buffers in band order
//!
//! Decoding the returned buffers one after another and concatenating the
//! rows reproduces the full image.

use std::thread;

use super::band::BandCompressor;
use crate::buffer::CompressedBuffer;
use crate::codec::{JpegCodec, TurboCodec};
use crate::error::{Result, StripeError};
use crate::format::EncodeRequest;
use crate::stripe::{partition, StripeOptions};

/// A fixed set of band compressors driven in parallel.
///
/// Each compressor owns its codec context, so no two bands ever share one.
#[derive(Debug)]
pub struct ParallelCompressor<C = TurboCodec> {
    compressors: Vec<BandCompressor<C>>,
}

impl<C: JpegCodec + Default> ParallelCompressor<C> {
    /// Create `count` compressors with default codec contexts.
    pub fn new(count: usize) -> Self {
        Self::with_codecs((0..count).map(|_| C::default()).collect())
    }
}

impl<C: JpegCodec> ParallelCompressor<C> {
    /// Create one compressor per codec context.
    pub fn with_codecs(codecs: Vec<C>) -> Self {
        Self {
            compressors: codecs.into_iter().map(BandCompressor::new).collect(),
        }
    }

    /// Number of bands that can be compressed at once.
    pub fn len(&self) -> usize {
        self.compressors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compressors.is_empty()
    }

    /// Compress `pixels` as `stack_count` horizontal bands.
    ///
    /// `request` describes the whole image; each returned buffer carries the
    /// band's own height. Buffers come back in top-to-bottom order.
    ///
    /// # Errors
    ///
    /// - `UnsupportedConfiguration` if `stack_count` is 0, exceeds the number
    ///   of compressors or the image height, or the options are not stripable
    /// - `SizeMismatch` if `pixels` is shorter than the image
    /// - The error of the lowest failing band, after all bands have finished
    pub fn compress(
        &mut self,
        pixels: &[u8],
        stack_count: usize,
        request: &EncodeRequest,
        options: StripeOptions,
    ) -> Result<Vec<CompressedBuffer>> {
        options.check_stripable()?;
        if stack_count > self.compressors.len() {
            return Err(StripeError::unsupported(format!(
                "{stack_count} bands requested but only {} compressors available",
                self.compressors.len()
            )));
        }
        if request.width == 0 {
            return Err(StripeError::unsupported("cannot stripe a zero-width image"));
        }
        let bands = partition(request.width, request.height, request.format, stack_count)?;

        let expected = request.uncompressed_size();
        if pixels.len() < expected {
            return Err(StripeError::SizeMismatch {
                what: "source pixels",
                expected,
                actual: pixels.len(),
            });
        }

        let flags = options.flags;
        let results: Vec<Result<CompressedBuffer>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .compressors
                .iter_mut()
                .zip(&bands)
                .map(|(compressor, band)| {
                    let band_request = request.with_height(band.rows);
                    let offset = band.offset;
                    log::debug!(
                        "compressing band {} ({} rows at byte {})",
                        band.index,
                        band.rows,
                        offset
                    );
                    scope.spawn(move || compressor.compress(pixels, &band_request, offset, flags))
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(index, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(StripeError::codec(format!("band {index} panicked")))
                    })
                })
                .collect()
        });

        self.settle(results)
    }

    /// Hand previously returned buffers back to the per-band compressors,
    /// then compress.
    pub fn compress_recycled(
        &mut self,
        buffers: Vec<CompressedBuffer>,
        pixels: &[u8],
        stack_count: usize,
        request: &EncodeRequest,
        options: StripeOptions,
    ) -> Result<Vec<CompressedBuffer>> {
        self.recycle(buffers);
        self.compress(pixels, stack_count, request, options)
    }

    /// Hand previously returned buffers back, one per compressor in order.
    pub fn recycle(&mut self, buffers: Vec<CompressedBuffer>) {
        for (compressor, buffer) in self.compressors.iter_mut().zip(buffers) {
            compressor.recycle(buffer);
        }
    }

    /// Turn per-band results into the call's result.
    ///
    /// On failure the buffers of the bands that did succeed go back to their
    /// compressors.
    fn settle(&mut self, results: Vec<Result<CompressedBuffer>>) -> Result<Vec<CompressedBuffer>> {
        let failed = results.iter().position(|r| r.is_err());
        let Some(first) = failed else {
            return results.into_iter().collect();
        };

        let mut error = None;
        for (index, (compressor, result)) in self.compressors.iter_mut().zip(results).enumerate() {
            match result {
                Ok(buffer) => compressor.recycle(buffer),
                Err(e) => {
                    log::warn!("band {index} failed: {e}");
                    if index == first {
                        error = Some(e);
                    }
                }
            }
        }
        Err(error.unwrap_or_else(|| StripeError::codec(format!("band {first} failed"))))
    }
}
