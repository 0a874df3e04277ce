//! JPEG backend built on libjpeg-turbo through the `turbojpeg` crate.
//!
//! Every pixel layout maps directly onto a TurboJPEG pixel format, so no
//! repacking happens here. The compressor and decompressor handles are
//! created on first use and then kept for the life of the codec.

use std::fmt;

use turbojpeg::{Colorspace, Compressor, Decompressor, Subsamp};

use super::{JpegCodec, JpegHeader};
use crate::error::{Result, StripeError};
use crate::format::{
    worst_case_compressed_size, CodecFlags, EncodeRequest, PixelFormat, Subsampling,
};

/// Codec context backed by libjpeg-turbo.
///
/// Holds one compressor and one decompressor handle plus a scratch buffer
/// used to reorder rows of bottom-up images.
#[derive(Default)]
pub struct TurboCodec {
    compressor: Option<Compressor>,
    decompressor: Option<Decompressor>,
    scratch: Vec<u8>,
}

impl fmt::Debug for TurboCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurboCodec")
            .field("compressor", &self.compressor.is_some())
            .field("decompressor", &self.decompressor.is_some())
            .finish()
    }
}

impl TurboCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn compressor(&mut self) -> Result<&mut Compressor> {
        if self.compressor.is_none() {
            self.compressor = Some(Compressor::new().map_err(StripeError::codec)?);
        }
        self.compressor
            .as_mut()
            .ok_or_else(|| StripeError::codec("compressor unavailable"))
    }

    fn decompressor(&mut self) -> Result<&mut Decompressor> {
        if self.decompressor.is_none() {
            self.decompressor = Some(Decompressor::new().map_err(StripeError::codec)?);
        }
        self.decompressor
            .as_mut()
            .ok_or_else(|| StripeError::codec("decompressor unavailable"))
    }
}

pub(crate) fn turbo_format(format: PixelFormat) -> turbojpeg::PixelFormat {
    match format {
        PixelFormat::Rgb => turbojpeg::PixelFormat::RGB,
        PixelFormat::Bgr => turbojpeg::PixelFormat::BGR,
        PixelFormat::Rgbx => turbojpeg::PixelFormat::RGBX,
        PixelFormat::Bgrx => turbojpeg::PixelFormat::BGRX,
        PixelFormat::Xbgr => turbojpeg::PixelFormat::XBGR,
        PixelFormat::Xrgb => turbojpeg::PixelFormat::XRGB,
        PixelFormat::Gray => turbojpeg::PixelFormat::GRAY,
        PixelFormat::Rgba => turbojpeg::PixelFormat::RGBA,
        PixelFormat::Bgra => turbojpeg::PixelFormat::BGRA,
        PixelFormat::Abgr => turbojpeg::PixelFormat::ABGR,
        PixelFormat::Argb => turbojpeg::PixelFormat::ARGB,
        PixelFormat::Cmyk => turbojpeg::PixelFormat::CMYK,
    }
}

pub(crate) fn turbo_subsamp(subsampling: Subsampling) -> Subsamp {
    match subsampling {
        Subsampling::S444 => Subsamp::None,
        Subsampling::S422 => Subsamp::Sub2x1,
        Subsampling::S420 => Subsamp::Sub2x2,
        Subsampling::Gray => Subsamp::Gray,
        Subsampling::S440 => Subsamp::Sub1x2,
        Subsampling::S411 => Subsamp::Sub4x1,
    }
}

fn from_turbo_subsamp(subsamp: Subsamp) -> Result<Subsampling> {
    match subsamp {
        Subsamp::None => Ok(Subsampling::S444),
        Subsamp::Sub2x1 => Ok(Subsampling::S422),
        Subsamp::Sub2x2 => Ok(Subsampling::S420),
        Subsamp::Gray => Ok(Subsampling::Gray),
        Subsamp::Sub1x2 => Ok(Subsampling::S440),
        Subsamp::Sub4x1 => Ok(Subsampling::S411),
        #[allow(unreachable_patterns)]
        other => Err(StripeError::InvalidFormat(format!(
            "JPEG subsampling {other:?}"
        ))),
    }
}

/// Layout a stream decodes to without color conversion.
fn native_format(colorspace: Colorspace) -> PixelFormat {
    match colorspace {
        Colorspace::Gray => PixelFormat::Gray,
        Colorspace::CMYK | Colorspace::YCCK => PixelFormat::Cmyk,
        _ => PixelFormat::Rgb,
    }
}

/// Copy `src` into `dst` with the row order reversed.
fn flip_rows_into(src: &[u8], stride: usize, dst: &mut Vec<u8>) {
    dst.clear();
    dst.reserve(src.len());
    for row in src.chunks_exact(stride).rev() {
        dst.extend_from_slice(row);
    }
}

/// Reverse the row order of `buf` in place.
fn flip_rows(buf: &mut [u8], stride: usize) {
    let rows = buf.len() / stride;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (head, tail) = buf.split_at_mut(bottom * stride);
        head[top * stride..(top + 1) * stride].swap_with_slice(&mut tail[..stride]);
    }
}

impl JpegCodec for TurboCodec {
    fn encode(
        &mut self,
        pixels: &[u8],
        request: &EncodeRequest,
        flags: CodecFlags,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let pitch = request.width * request.format.components();
        let bound = self.worst_case_size(request.width, request.height, request.subsampling);
        // Four-component frames can exceed the three-component bound
        let bound = match request.format {
            PixelFormat::Cmyk => {
                let full = worst_case_compressed_size(request.width, request.height, Subsampling::S444);
                bound.max(full / 3 * 4)
            }
            _ => bound,
        };

        let mut scratch = std::mem::take(&mut self.scratch);
        let source: &[u8] = if flags.bottom_up {
            flip_rows_into(pixels, pitch, &mut scratch);
            &scratch
        } else {
            pixels
        };
        let image = turbojpeg::Image {
            pixels: source,
            width: request.width,
            pitch,
            height: request.height,
            format: turbo_format(request.format),
        };

        out.clear();
        out.resize(bound.max(out.capacity()), 0);
        let result = self.compressor().and_then(|compressor| {
            compressor
                .set_quality(i32::from(request.quality.max(1)))
                .map_err(StripeError::codec)?;
            compressor
                .set_subsamp(turbo_subsamp(request.subsampling))
                .map_err(StripeError::codec)?;
            compressor
                .compress_to_slice(image, out.as_mut_slice())
                .map_err(StripeError::codec)
        });
        self.scratch = scratch;

        match result {
            Ok(len) => {
                out.truncate(len);
                Ok(())
            }
            Err(e) => {
                out.clear();
                Err(e)
            }
        }
    }

    fn decode_header(&mut self, jpeg: &[u8]) -> Result<JpegHeader> {
        let header = self
            .decompressor()?
            .read_header(jpeg)
            .map_err(StripeError::codec)?;
        Ok(JpegHeader {
            width: header.width,
            height: header.height,
            subsampling: from_turbo_subsamp(header.subsamp)?,
            format: native_format(header.colorspace),
        })
    }

    fn decode(
        &mut self,
        jpeg: &[u8],
        out: &mut [u8],
        width: usize,
        height: usize,
        format: PixelFormat,
        flags: CodecFlags,
    ) -> Result<()> {
        let pitch = width * format.components();
        if out.len() != pitch * height {
            return Err(StripeError::SizeMismatch {
                what: "output pixels",
                expected: pitch * height,
                actual: out.len(),
            });
        }

        let decompressor = self.decompressor()?;
        let header = decompressor.read_header(jpeg).map_err(StripeError::codec)?;
        if header.width != width {
            return Err(StripeError::SizeMismatch {
                what: "decoded width",
                expected: width,
                actual: header.width,
            });
        }
        if header.height != height {
            return Err(StripeError::SizeMismatch {
                what: "decoded height",
                expected: height,
                actual: header.height,
            });
        }

        let image = turbojpeg::Image {
            pixels: &mut *out,
            width,
            pitch,
            height,
            format: turbo_format(format),
        };
        decompressor
            .decompress(jpeg, image)
            .map_err(StripeError::codec)?;

        if flags.bottom_up {
            flip_rows(out, pitch);
        }
        Ok(())
    }
}
