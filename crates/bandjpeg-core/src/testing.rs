//! Test doubles for the band codecs.
//!
//! [`FakeCodec`] frames raw pixels behind a tiny header instead of running a
//! real JPEG encoder, so round trips are exact and failures can be injected
//! per codec instance.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::codec::{JpegCodec, JpegHeader};
use crate::error::{Result, StripeError};
use crate::format::{CodecFlags, EncodeRequest, PixelFormat, Subsampling};

const MAGIC: &[u8; 4] = b"FAKE";
const HEADER_LEN: usize = 4 + 4 + 4 + 1 + 1;

/// Deterministic codec: `MAGIC | width | height | format | subsampling | pixels`.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeCodec {
    calls: Arc<AtomicUsize>,
    failure: Option<&'static str>,
}

impl FakeCodec {
    /// A codec that counts its encode/decode calls in `calls`.
    pub(crate) fn counting(calls: Arc<AtomicUsize>) -> Self {
        Self {
            calls,
            failure: None,
        }
    }

    /// A codec that counts its calls and then fails every one of them.
    pub(crate) fn failing(calls: Arc<AtomicUsize>) -> Self {
        Self::failing_with(calls, "injected failure")
    }

    /// Like [`failing`](Self::failing), reporting `message`.
    pub(crate) fn failing_with(calls: Arc<AtomicUsize>, message: &'static str) -> Self {
        Self {
            calls,
            failure: Some(message),
        }
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(message) => Err(StripeError::codec(message)),
            None => Ok(()),
        }
    }
}

/// `count` codecs sharing one call counter, the one at `fail_at` failing.
pub(crate) fn codecs(count: usize, fail_at: Option<usize>) -> (Vec<FakeCodec>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let codecs = (0..count)
        .map(|i| {
            if Some(i) == fail_at {
                FakeCodec::failing(Arc::clone(&calls))
            } else {
                FakeCodec::counting(Arc::clone(&calls))
            }
        })
        .collect();
    (codecs, calls)
}

/// Deterministic test pattern, distinct per byte position.
pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

fn read_u32(bytes: &[u8], at: usize) -> usize {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word) as usize
}

impl JpegCodec for FakeCodec {
    fn encode(
        &mut self,
        pixels: &[u8],
        request: &EncodeRequest,
        _flags: CodecFlags,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        self.enter()?;
        out.clear();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(request.width as u32).to_le_bytes());
        out.extend_from_slice(&(request.height as u32).to_le_bytes());
        out.push(request.format as u8);
        out.push(request.subsampling as u8);
        out.extend_from_slice(pixels);
        Ok(())
    }

    fn decode_header(&mut self, jpeg: &[u8]) -> Result<JpegHeader> {
        if jpeg.len() < HEADER_LEN || &jpeg[..4] != MAGIC {
            return Err(StripeError::codec("not a fake stream"));
        }
        Ok(JpegHeader {
            width: read_u32(jpeg, 4),
            height: read_u32(jpeg, 8),
            format: PixelFormat::try_from(u32::from(jpeg[12]))?,
            subsampling: Subsampling::try_from(u32::from(jpeg[13]))?,
        })
    }

    fn decode(
        &mut self,
        jpeg: &[u8],
        out: &mut [u8],
        width: usize,
        height: usize,
        format: PixelFormat,
        _flags: CodecFlags,
    ) -> Result<()> {
        self.enter()?;
        let header = self.decode_header(jpeg)?;
        if header.width != width || header.height != height || header.format != format {
            return Err(StripeError::codec("fake stream does not match request"));
        }
        let body = &jpeg[HEADER_LEN..];
        if body.len() != out.len() {
            return Err(StripeError::SizeMismatch {
                what: "fake stream body",
                expected: out.len(),
                actual: body.len(),
            });
        }
        out.copy_from_slice(body);
        Ok(())
    }

    fn worst_case_size(&self, width: usize, height: usize, _subsampling: Subsampling) -> usize {
        HEADER_LEN + width * height * 4
    }
}
