//! Pixel layouts, chroma subsampling modes and the size arithmetic built on them.
//!
//! Raw numeric codes follow libjpeg-turbo's `TJPF`/`TJSAMP` numbering so that
//! values coming from foreign code or serialized settings map one-to-one.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StripeError};

/// Channel layout of an uncompressed pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PixelFormat {
    /// Packed red, green, blue.
    #[default]
    Rgb = 0,
    /// Packed blue, green, red.
    Bgr = 1,
    /// Red, green, blue, padding byte.
    Rgbx = 2,
    /// Blue, green, red, padding byte.
    Bgrx = 3,
    /// Padding byte, blue, green, red.
    Xbgr = 4,
    /// Padding byte, red, green, blue.
    Xrgb = 5,
    /// Single luminance channel.
    Gray = 6,
    /// Red, green, blue, alpha.
    Rgba = 7,
    /// Blue, green, red, alpha.
    Bgra = 8,
    /// Alpha, blue, green, red.
    Abgr = 9,
    /// Alpha, red, green, blue.
    Argb = 10,
    /// Cyan, magenta, yellow, key (print color).
    Cmyk = 11,
}

impl PixelFormat {
    /// Every supported layout, in code order.
    pub const ALL: [PixelFormat; 12] = [
        PixelFormat::Rgb,
        PixelFormat::Bgr,
        PixelFormat::Rgbx,
        PixelFormat::Bgrx,
        PixelFormat::Xbgr,
        PixelFormat::Xrgb,
        PixelFormat::Gray,
        PixelFormat::Rgba,
        PixelFormat::Bgra,
        PixelFormat::Abgr,
        PixelFormat::Argb,
        PixelFormat::Cmyk,
    ];

    /// Number of bytes per pixel.
    #[inline]
    pub fn components(self) -> usize {
        match self {
            PixelFormat::Rgb | PixelFormat::Bgr => 3,
            PixelFormat::Gray => 1,
            PixelFormat::Rgbx
            | PixelFormat::Bgrx
            | PixelFormat::Xbgr
            | PixelFormat::Xrgb
            | PixelFormat::Rgba
            | PixelFormat::Bgra
            | PixelFormat::Abgr
            | PixelFormat::Argb
            | PixelFormat::Cmyk => 4,
        }
    }
}

impl TryFrom<u32> for PixelFormat {
    type Error = StripeError;

    fn try_from(value: u32) -> Result<Self> {
        PixelFormat::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| StripeError::InvalidFormat(format!("pixel format code {value}")))
    }
}

/// Component count for a raw pixel format code.
///
/// Fails with [`StripeError::InvalidFormat`] for codes outside the table.
pub fn components_for(code: u32) -> Result<usize> {
    PixelFormat::try_from(code).map(PixelFormat::components)
}

/// Chroma subsampling mode used by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Subsampling {
    /// No chroma subsampling.
    S444 = 0,
    /// Half horizontal chroma resolution.
    S422 = 1,
    /// Half horizontal and vertical chroma resolution.
    #[default]
    S420 = 2,
    /// Luminance only.
    Gray = 3,
    /// Half vertical chroma resolution.
    S440 = 4,
    /// Quarter horizontal chroma resolution.
    S411 = 5,
}

impl Subsampling {
    /// MCU block width in pixels.
    #[inline]
    pub fn mcu_width(self) -> usize {
        match self {
            Subsampling::S444 | Subsampling::Gray | Subsampling::S440 => 8,
            Subsampling::S422 | Subsampling::S420 => 16,
            Subsampling::S411 => 32,
        }
    }

    /// MCU block height in pixels.
    #[inline]
    pub fn mcu_height(self) -> usize {
        match self {
            Subsampling::S420 | Subsampling::S440 => 16,
            _ => 8,
        }
    }
}

impl TryFrom<u32> for Subsampling {
    type Error = StripeError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Subsampling::S444),
            1 => Ok(Subsampling::S422),
            2 => Ok(Subsampling::S420),
            3 => Ok(Subsampling::Gray),
            4 => Ok(Subsampling::S440),
            5 => Ok(Subsampling::S411),
            _ => Err(StripeError::InvalidFormat(format!(
                "subsampling code {value}"
            ))),
        }
    }
}

/// Behavior flags forwarded to the JPEG primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecFlags {
    /// Prefer the fast, less accurate DCT when the backend offers one.
    pub fast_dct: bool,
    /// Rows are stored bottom-up in the uncompressed buffer.
    pub bottom_up: bool,
}

impl Default for CodecFlags {
    fn default() -> Self {
        Self {
            fast_dct: true,
            bottom_up: false,
        }
    }
}

/// Highest JPEG quality setting.
pub const MAX_QUALITY: u8 = 100;

/// Parameters of a single encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeRequest {
    /// Image (or band) width in pixels.
    pub width: usize,
    /// Image (or band) height in pixels.
    pub height: usize,
    /// Layout of the source pixels.
    pub format: PixelFormat,
    /// Chroma subsampling of the produced JPEG.
    pub subsampling: Subsampling,
    /// JPEG quality, at most [`MAX_QUALITY`]. Encoders reject anything higher.
    pub quality: u8,
}

impl Default for EncodeRequest {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            format: PixelFormat::Rgb,
            subsampling: Subsampling::S420,
            quality: 75,
        }
    }
}

impl EncodeRequest {
    pub fn new(
        width: usize,
        height: usize,
        format: PixelFormat,
        subsampling: Subsampling,
        quality: u8,
    ) -> Self {
        Self {
            width,
            height,
            format,
            subsampling,
            quality,
        }
    }

    /// The same request restricted to `height` rows.
    pub fn with_height(self, height: usize) -> Self {
        Self { height, ..self }
    }

    /// Byte count of the uncompressed source this request describes.
    pub fn uncompressed_size(&self) -> usize {
        uncompressed_size(self.width, self.height, self.format)
    }
}

/// Byte count of a tightly packed image.
#[inline]
pub fn uncompressed_size(width: usize, height: usize, format: PixelFormat) -> usize {
    width * height * format.components()
}

#[inline]
fn pad(value: usize, multiple: usize) -> usize {
    value.div_ceil(multiple) * multiple
}

/// Upper bound on the compressed size of a `width` x `height` image.
///
/// Matches libjpeg-turbo's `tjBufSize`: every MCU is charged two bytes per
/// luma sample plus its share of chroma samples, and 2048 bytes cover headers
/// and tables.
pub fn worst_case_compressed_size(width: usize, height: usize, subsampling: Subsampling) -> usize {
    let mcu_w = subsampling.mcu_width();
    let mcu_h = subsampling.mcu_height();
    let chroma_factor = match subsampling {
        Subsampling::Gray => 0,
        _ => 4 * 64 / (mcu_w * mcu_h),
    };
    pad(width, mcu_w) * pad(height, mcu_h) * (2 + chroma_factor) + 2048
}
