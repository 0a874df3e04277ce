//! Parallel reassembly of a banded image.
//!
//! Every band is an independent JPEG holding a run of full-width rows. The
//! bands are validated against their own headers, the output buffer is cut
//! into one disjoint slice per band, and each band decodes straight into its
//! slice on its own scoped thread.

use std::thread;

use crate::buffer::{CompressedBuffer, PixelBuffer};
use crate::codec::{JpegCodec, TurboCodec};
use crate::error::{Result, StripeError};
use crate::format::{CodecFlags, PixelFormat};
use crate::stripe::{bands_from_rows, check_top_down, split_bands_mut, Band};

/// A fixed set of codec contexts that decode bands in parallel.
#[derive(Debug)]
pub struct ParallelDecompressor<C = TurboCodec> {
    codecs: Vec<C>,
    buffer: PixelBuffer,
}

impl<C: JpegCodec + Default> ParallelDecompressor<C> {
    /// Create `count` default codec contexts.
    pub fn new(count: usize) -> Self {
        Self::with_capacity(count, 0)
    }

    /// Create `count` default codec contexts and `capacity` bytes of output.
    pub fn with_capacity(count: usize, capacity: usize) -> Self {
        let mut decompressor = Self::with_codecs((0..count).map(|_| C::default()).collect());
        decompressor.buffer = PixelBuffer::with_capacity(capacity);
        decompressor
    }
}

impl<C: JpegCodec> ParallelDecompressor<C> {
    pub fn with_codecs(codecs: Vec<C>) -> Self {
        Self {
            codecs,
            buffer: PixelBuffer::new(),
        }
    }

    /// Number of bands a call must supply.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Decode `bands` (top to bottom) into one image.
    ///
    /// The image is `bands[0].width()` wide, as tall as the bands together
    /// and laid out as `bands[0].format()`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedConfiguration` for no bands, a band count different from
    ///   the number of codecs, bands that disagree on width or format, or
    ///   bottom-up rows
    /// - `SizeMismatch` if a band's header disagrees with its declared size
    /// - The error of the lowest failing band, after all bands have finished
    pub fn decompress(&mut self, bands: &[CompressedBuffer], flags: CodecFlags) -> Result<PixelBuffer> {
        check_top_down(flags)?;
        let (width, format) = self.check_bands(bands)?;
        let rows: Vec<usize> = bands.iter().map(CompressedBuffer::height).collect();
        let layout = bands_from_rows(&rows, width, format);

        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.set_parameters(width, rows.iter().sum(), format);
        match self.decode_bands(bands, &layout, &mut buffer, width, format, flags) {
            Ok(()) => Ok(buffer),
            Err(e) => {
                self.buffer = buffer;
                Err(e)
            }
        }
    }

    /// Take a previously returned image back for reuse.
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

    /// Validate the band set and every band header, returning the shared
    /// width and format.
    fn check_bands(&mut self, bands: &[CompressedBuffer]) -> Result<(usize, PixelFormat)> {
        let Some(first) = bands.first() else {
            return Err(StripeError::unsupported("no bands to decode"));
        };
        if bands.len() != self.codecs.len() {
            return Err(StripeError::unsupported(format!(
                "{} bands supplied for {} codecs",
                bands.len(),
                self.codecs.len()
            )));
        }

        let (width, format) = (first.width(), first.format());
        for (index, (codec, band)) in self.codecs.iter_mut().zip(bands).enumerate() {
            if band.width() != width || band.format() != format {
                return Err(StripeError::unsupported(format!(
                    "band {index} is {}px {:?}, band 0 is {width}px {format:?}",
                    band.width(),
                    band.format()
                )));
            }
            let header = codec.decode_header(band.jpeg_bytes())?;
            if header.width != width {
                return Err(StripeError::SizeMismatch {
                    what: "band header width",
                    expected: width,
                    actual: header.width,
                });
            }
            if header.height != band.height() {
                return Err(StripeError::SizeMismatch {
                    what: "band header height",
                    expected: band.height(),
                    actual: header.height,
                });
            }
            if header.subsampling != band.subsampling() {
                return Err(StripeError::InvalidFormat(format!(
                    "band {index} declares {:?} but its stream is {:?}",
                    band.subsampling(),
                    header.subsampling
                )));
            }
        }
        Ok((width, format))
    }

    fn decode_bands(
        &mut self,
        bands: &[CompressedBuffer],
        layout: &[Band],
        buffer: &mut PixelBuffer,
        width: usize,
        format: PixelFormat,
        flags: CodecFlags,
    ) -> Result<()> {
        let slices = split_bands_mut(buffer.data_mut(), layout)?;

        let results: Vec<Result<()>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .codecs
                .iter_mut()
                .zip(bands)
                .zip(layout)
                .zip(slices)
                .map(|(((codec, band), place), out)| {
                    let rows = place.rows;
                    log::debug!(
                        "decompressing band {} ({} rows at byte {})",
                        place.index,
                        rows,
                        place.offset
                    );
                    scope.spawn(move || {
                        codec.decode(band.jpeg_bytes(), out, width, rows, format, flags)
                    })
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

        let mut first_error = None;
        for (index, result) in results.into_iter().enumerate() {
            if let Err(e) = result {
                log::warn!("band {index} failed: {e}");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::ParallelCompressor;
    use crate::format::{EncodeRequest, Subsampling};
    use crate::stripe::StripeOptions;
    use crate::testing::{codecs, pattern, FakeCodec};
    use std::sync::atomic::Ordering;

    fn compress_fake(
        pixels: &[u8],
        stack_count: usize,
        request: &EncodeRequest,
    ) -> Vec<CompressedBuffer> {
        let (fakes, _) = codecs(stack_count, None);
        ParallelCompressor::with_codecs(fakes)
            .compress(pixels, stack_count, request, StripeOptions::default())
            .unwrap()
    }

    #[test]
    fn test_exact_round_trip() {
        for format in [PixelFormat::Gray, PixelFormat::Rgb, PixelFormat::Bgra] {
            for stacks in [1, 2, 4] {
                for (width, height) in [(64, 64), (101, 37)] {
                    let pixels = pattern(width * height * format.components());
                    let request = EncodeRequest::new(width, height, format, Subsampling::S444, 90);
                    let bands = compress_fake(&pixels, stacks, &request);

                    let (fakes, _) = codecs(stacks, None);
                    let image = ParallelDecompressor::with_codecs(fakes)
                        .decompress(&bands, CodecFlags::default())
                        .unwrap();
                    assert_eq!(image.width(), width);
                    assert_eq!(image.height(), height);
                    assert_eq!(image.format(), format);
                    assert_eq!(image.data(), &pixels[..], "{format:?} {stacks} {width}x{height}");
                }
            }
        }
    }

    #[test]
    fn test_gray_three_band_layout() {
        let pixels = pattern(256 * 100);
        let request = EncodeRequest::new(256, 100, PixelFormat::Gray, Subsampling::Gray, 90);
        let bands = compress_fake(&pixels, 3, &request);

        let (fakes, _) = codecs(3, None);
        let image = ParallelDecompressor::with_codecs(fakes)
            .decompress(&bands, CodecFlags::default())
            .unwrap();
        assert_eq!(image.logical_size(), 25600);
        assert_eq!(&image.data()[16896..16896 + 256], &pixels[16896..16896 + 256]);
    }

    #[test]
    fn test_failing_band_waits_for_siblings() {
        let pixels = pattern(16 * 16 * 3);
        let request = EncodeRequest::new(16, 16, PixelFormat::Rgb, Subsampling::S444, 90);
        let bands = compress_fake(&pixels, 4, &request);

        let (fakes, calls) = codecs(4, Some(2));
        let mut decompressor = ParallelDecompressor::with_codecs(fakes);
        let result = decompressor.decompress(&bands, CodecFlags::default());
        assert!(matches!(result, Err(StripeError::Codec(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // The output buffer is kept for the next call
        assert_eq!(decompressor.capacity(), 16 * 16 * 3);
    }

    #[test]
    fn test_rejects_band_count_mismatch() {
        let pixels = pattern(8 * 8);
        let request = EncodeRequest::new(8, 8, PixelFormat::Gray, Subsampling::Gray, 90);
        let bands = compress_fake(&pixels, 2, &request);

        let mut decompressor = ParallelDecompressor::<FakeCodec>::new(3);
        let result = decompressor.decompress(&bands, CodecFlags::default());
        assert!(matches!(
            result,
            Err(StripeError::UnsupportedConfiguration(_))
        ));

        let result = decompressor.decompress(&[], CodecFlags::default());
        assert!(matches!(
            result,
            Err(StripeError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_mixed_bands() {
        let gray = EncodeRequest::new(8, 4, PixelFormat::Gray, Subsampling::Gray, 90);
        let mut bands = compress_fake(&pattern(32), 1, &gray);
        let rgb = EncodeRequest::new(8, 4, PixelFormat::Rgb, Subsampling::S444, 90);
        bands.extend(compress_fake(&pattern(96), 1, &rgb));

        let mut decompressor = ParallelDecompressor::<FakeCodec>::new(2);
        let result = decompressor.decompress(&bands, CodecFlags::default());
        assert!(matches!(
            result,
            Err(StripeError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_header_height_mismatch() {
        let request = EncodeRequest::new(8, 8, PixelFormat::Gray, Subsampling::Gray, 90);
        let mut bands = compress_fake(&pattern(64), 2, &request);
        // Declare more rows than the stream holds
        let mut declared = *bands[1].request();
        declared.height = 5;
        bands[1].set_params(declared);

        let mut decompressor = ParallelDecompressor::<FakeCodec>::new(2);
        let result = decompressor.decompress(&bands, CodecFlags::default());
        assert!(matches!(
            result,
            Err(StripeError::SizeMismatch {
                expected: 5,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_header_subsampling_mismatch() {
        let request = EncodeRequest::new(8, 8, PixelFormat::Gray, Subsampling::Gray, 90);
        let mut bands = compress_fake(&pattern(64), 2, &request);
        let mut declared = *bands[1].request();
        declared.subsampling = Subsampling::S420;
        bands[1].set_params(declared);

        let (fakes, calls) = codecs(2, None);
        let result = ParallelDecompressor::with_codecs(fakes).decompress(&bands, CodecFlags::default());
        assert!(matches!(result, Err(StripeError::InvalidFormat(_))));
        // Rejected before any band is decoded
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejects_bottom_up() {
        let request = EncodeRequest::new(8, 8, PixelFormat::Gray, Subsampling::Gray, 90);
        let bands = compress_fake(&pattern(64), 2, &request);
        let flags = CodecFlags {
            bottom_up: true,
            ..CodecFlags::default()
        };
        let result = ParallelDecompressor::<FakeCodec>::new(2).decompress(&bands, flags);
        assert!(matches!(
            result,
            Err(StripeError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_output_buffer_grows_only_when_needed() {
        let request = EncodeRequest::new(8, 8, PixelFormat::Rgb, Subsampling::S444, 90);
        let bands = compress_fake(&pattern(192), 2, &request);

        let mut decompressor = ParallelDecompressor::<FakeCodec>::with_capacity(2, 1024);
        let image = decompressor.decompress(&bands, CodecFlags::default()).unwrap();
        assert_eq!(image.capacity(), 1024);
        decompressor.recycle(image);
        assert_eq!(decompressor.capacity(), 1024);
    }

    /// Smooth gradient that survives lossy compression within a small error.
    fn gradient(width: usize, height: usize, format: PixelFormat) -> Vec<u8> {
        let nc = format.components();
        let mut pixels = Vec::with_capacity(width * height * nc);
        for y in 0..height {
            for x in 0..width {
                let base = 40 + (x * 120) / width + (y * 60) / height;
                for c in 0..nc {
                    pixels.push((base + c * 10) as u8);
                }
            }
        }
        pixels
    }

    #[test]
    fn test_turbo_codec_round_trip() {
        for stacks in [1, 2, 4] {
            for (width, height) in [(64, 64), (101, 37)] {
                let pixels = gradient(width, height, PixelFormat::Gray);
                let request = EncodeRequest::new(width, height, PixelFormat::Gray, Subsampling::Gray, 95);
                let bands = ParallelCompressor::<TurboCodec>::new(stacks)
                    .compress(&pixels, stacks, &request, StripeOptions::default())
                    .unwrap();

                let image = ParallelDecompressor::<TurboCodec>::new(stacks)
                    .decompress(&bands, CodecFlags::default())
                    .unwrap();
                assert_eq!(image.width(), width);
                assert_eq!(image.height(), height);

                let worst = image
                    .data()
                    .iter()
                    .zip(&pixels)
                    .map(|(a, b)| (*a as i32 - *b as i32).abs())
                    .max()
                    .unwrap_or(0);
                assert!(worst <= 8, "{stacks} bands {width}x{height}: error {worst}");
            }
        }
    }

    #[test]
    fn test_turbo_codec_round_trip_color() {
        let (width, height) = (64, 64);
        let pixels = gradient(width, height, PixelFormat::Rgb);
        let request = EncodeRequest::new(width, height, PixelFormat::Rgb, Subsampling::S444, 95);
        let bands = ParallelCompressor::<TurboCodec>::new(4)
            .compress(&pixels, 4, &request, StripeOptions::default())
            .unwrap();
        let image = ParallelDecompressor::<TurboCodec>::new(4)
            .decompress(&bands, CodecFlags::default())
            .unwrap();

        let mean_error = image
            .data()
            .iter()
            .zip(&pixels)
            .map(|(a, b)| (*a as i32 - *b as i32).unsigned_abs() as u64)
            .sum::<u64>()
            / pixels.len() as u64;
        assert!(mean_error <= 4, "mean error {mean_error}");
    }

    #[test]
    fn test_turbo_codec_subsampled_bands() {
        let (width, height) = (64, 48);
        let pixels = gradient(width, height, PixelFormat::Bgrx);
        let request = EncodeRequest::new(width, height, PixelFormat::Bgrx, Subsampling::S420, 90);
        let bands = ParallelCompressor::<TurboCodec>::new(3)
            .compress(&pixels, 3, &request, StripeOptions::default())
            .unwrap();

        let mut codec = TurboCodec::new();
        for band in &bands {
            let header = codec.decode_header(band.jpeg_bytes()).unwrap();
            assert_eq!(header.subsampling, Subsampling::S420);
        }

        let image = ParallelDecompressor::<TurboCodec>::new(3)
            .decompress(&bands, CodecFlags::default())
            .unwrap();
        assert_eq!(image.format(), PixelFormat::Bgrx);
        assert_eq!(image.logical_size(), pixels.len());
    }
}
