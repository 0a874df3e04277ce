//! Growable pixel and JPEG buffers with retained capacity.
//!
//! Both buffer types only ever grow. A decoder or encoder that is handed the
//! same buffer across a session of similarly sized images reallocates at most
//! once.

use crate::error::{Result, StripeError};
use crate::format::{
    uncompressed_size, worst_case_compressed_size, EncodeRequest, PixelFormat, Subsampling,
};

/// Uncompressed pixels plus the metadata needed to interpret them.
///
/// The storage may be larger than the logical image: `capacity()` is what has
/// been allocated, `logical_size()` is `width * height * components`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Create an empty buffer with no storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty image with `capacity` bytes already allocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            ..Self::default()
        }
    }

    /// Wrap existing pixel data.
    ///
    /// Fails with `SizeMismatch` when `data` is shorter than the image.
    pub fn from_raw(data: Vec<u8>, width: usize, height: usize, format: PixelFormat) -> Result<Self> {
        let expected = uncompressed_size(width, height, format);
        if data.len() < expected {
            return Err(StripeError::SizeMismatch {
                what: "pixel data",
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes occupied by the image itself.
    pub fn logical_size(&self) -> usize {
        uncompressed_size(self.width, self.height, self.format)
    }

    /// Bytes allocated for pixel storage.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Grow the storage to at least `size` bytes. Returns true if it grew.
    pub fn ensure_capacity(&mut self, size: usize) -> bool {
        if self.data.len() >= size {
            return false;
        }
        log::debug!(
            "growing pixel buffer from {} to {} bytes",
            self.data.len(),
            size
        );
        self.data.resize(size, 0);
        true
    }

    /// Change the image metadata, growing the storage if the new image needs it.
    pub fn set_parameters(&mut self, width: usize, height: usize, format: PixelFormat) {
        self.width = width;
        self.height = height;
        self.format = format;
        self.ensure_capacity(self.logical_size());
    }

    /// The pixels of the image (the logical prefix of the storage).
    pub fn data(&self) -> &[u8] {
        &self.data[..self.logical_size()]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        let size = self.logical_size();
        &mut self.data[..size]
    }

    /// The whole allocation, including bytes past the logical image.
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning exactly the image bytes.
    pub fn into_pixels(mut self) -> Vec<u8> {
        let size = self.logical_size();
        self.data.truncate(size);
        self.data
    }

    /// Check if this buffer holds no image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// JPEG output of one encode call.
///
/// The storage is sized by the codec's worst-case bound, not by the raw image
/// size, since tiny or noisy images can compress larger than they started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedBuffer {
    request: EncodeRequest,
    data: Vec<u8>,
}

impl Default for CompressedBuffer {
    fn default() -> Self {
        Self {
            request: EncodeRequest::default(),
            data: Vec::new(),
        }
    }
}

impl CompressedBuffer {
    /// Create a buffer with no storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer pre-sized for `request`.
    ///
    /// Allocates the larger of the worst-case JPEG size and the raw image size.
    pub fn with_params(request: EncodeRequest) -> Self {
        let size = worst_case_compressed_size(request.width, request.height, request.subsampling)
            .max(request.uncompressed_size());
        Self::with_capacity(request, size)
    }

    /// Create a buffer for `request` with exactly `capacity` bytes reserved.
    pub fn with_capacity(request: EncodeRequest, capacity: usize) -> Self {
        Self {
            request,
            data: Vec::with_capacity(capacity),
        }
    }

    /// Wrap JPEG bytes produced elsewhere.
    pub fn from_jpeg(jpeg: Vec<u8>, request: EncodeRequest) -> Self {
        Self {
            request,
            data: jpeg,
        }
    }

    /// Prepare for a new encode: record `request` and make sure at least
    /// `required` bytes are allocated. Returns true if the storage grew.
    ///
    /// Any previous JPEG content is discarded.
    pub fn reset(&mut self, request: EncodeRequest, required: usize) -> bool {
        self.request = request;
        self.data.clear();
        if self.data.capacity() >= required {
            return false;
        }
        log::debug!(
            "growing jpeg buffer from {} to {} bytes",
            self.data.capacity(),
            required
        );
        self.data = Vec::with_capacity(required);
        true
    }

    /// Overwrite the recorded parameters without touching the storage.
    pub fn set_params(&mut self, request: EncodeRequest) {
        self.request = request;
    }

    pub fn request(&self) -> &EncodeRequest {
        &self.request
    }

    pub fn width(&self) -> usize {
        self.request.width
    }

    pub fn height(&self) -> usize {
        self.request.height
    }

    pub fn format(&self) -> PixelFormat {
        self.request.format
    }

    pub fn subsampling(&self) -> Subsampling {
        self.request.subsampling
    }

    pub fn quality(&self) -> u8 {
        self.request.quality
    }

    /// The compressed bytes.
    pub fn jpeg_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of meaningful compressed bytes.
    pub fn jpeg_size(&self) -> usize {
        self.data.len()
    }

    /// Bytes allocated for compressed output.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Raw size of the image this buffer describes.
    pub fn uncompressed_size(&self) -> usize {
        self.request.uncompressed_size()
    }

    /// Check if no JPEG data has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the buffer, returning the JPEG bytes.
    pub fn into_jpeg(self) -> Vec<u8> {
        self.data
    }

    pub(crate) fn output_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}
