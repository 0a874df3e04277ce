//! Pooled JPEG output buffers.
//!
//! A [`BufferPool`] keeps idle [`CompressedBuffer`]s in a shared
//! [`WorkQueue`]. Buffers leave the pool wrapped in a [`PooledBuffer`] guard
//! that puts them back when it goes out of scope, so a steady stream of
//! similarly sized encodes settles on a fixed set of allocations.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::band::encode_into;
use crate::buffer::CompressedBuffer;
use crate::codec::{JpegCodec, TurboCodec};
use crate::error::Result;
use crate::format::{CodecFlags, EncodeRequest};
use crate::queue::WorkQueue;

/// How a [`BufferPool`] is seeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Buffers to allocate up front.
    pub num_buffers: usize,
    /// Parameters the up-front buffers are sized for.
    pub buffer: EncodeRequest,
}

impl PoolConfig {
    pub fn new(num_buffers: usize, buffer: EncodeRequest) -> Self {
        Self {
            num_buffers,
            buffer,
        }
    }
}

/// Shared store of idle compressed-output buffers.
///
/// Cloning the pool clones a handle; every clone sees the same buffers.
#[derive(Debug, Clone, Default)]
pub struct BufferPool {
    queue: Arc<WorkQueue<CompressedBuffer>>,
}

impl BufferPool {
    /// Create a pool holding `config.num_buffers` pre-sized buffers.
    pub fn new(config: &PoolConfig) -> Self {
        let pool = Self::default();
        pool.queue.extend(
            (0..config.num_buffers).map(|_| CompressedBuffer::with_params(config.buffer)),
        );
        pool
    }

    /// Take an idle buffer, or build one sized for `fallback` if none is idle.
    ///
    /// Never blocks.
    pub fn acquire(&self, fallback: &EncodeRequest) -> CompressedBuffer {
        self.queue
            .pop_or_else(|| CompressedBuffer::with_params(*fallback))
    }

    /// Take an idle buffer, or build one with `make` if none is idle.
    pub fn acquire_with<F>(&self, make: F) -> CompressedBuffer
    where
        F: FnOnce() -> CompressedBuffer,
    {
        self.queue.pop_or_else(make)
    }

    /// Take an idle buffer, waiting until one is put back if necessary.
    pub fn acquire_blocking(&self) -> CompressedBuffer {
        self.queue.pop()
    }

    /// Wrap `buffer` in a guard that returns it to this pool.
    pub fn checkout(&self, buffer: CompressedBuffer) -> PooledBuffer {
        PooledBuffer {
            buffer,
            queue: Arc::clone(&self.queue),
            returned: false,
        }
    }

    /// Return a buffer to the pool.
    pub fn put_back(&self, buffer: CompressedBuffer) {
        self.queue.push_back(buffer);
    }

    /// Number of idle buffers.
    pub fn available(&self) -> usize {
        self.queue.len()
    }
}

/// A buffer on loan from a [`BufferPool`].
///
/// Dropping the guard returns the buffer to the pool; so does
/// [`release`](Self::release). [`detach`](Self::detach) keeps it instead.
#[derive(Debug)]
pub struct PooledBuffer {
    buffer: CompressedBuffer,
    queue: Arc<WorkQueue<CompressedBuffer>>,
    returned: bool,
}

impl PooledBuffer {
    /// Return the buffer to the pool now.
    pub fn release(mut self) {
        self.give_back();
    }

    /// Take the buffer out of the pool for good.
    pub fn detach(mut self) -> CompressedBuffer {
        self.returned = true;
        std::mem::take(&mut self.buffer)
    }

    fn give_back(&mut self) {
        if !self.returned {
            self.returned = true;
            self.queue.push_back(std::mem::take(&mut self.buffer));
        }
    }
}

impl Deref for PooledBuffer {
    type Target = CompressedBuffer;

    fn deref(&self) -> &CompressedBuffer {
        &self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.give_back();
    }
}

/// JPEG compressor that writes into pooled buffers.
///
/// Counts every time a buffer had to be allocated or grown, which stays at
/// one for a steady stream of same-sized images returned to the pool.
#[derive(Debug)]
pub struct PooledCompressor<C = TurboCodec> {
    codec: C,
    pool: BufferPool,
    growth_events: usize,
}

impl<C: JpegCodec + Default> Default for PooledCompressor<C> {
    fn default() -> Self {
        Self::new(C::default(), &PoolConfig::default())
    }
}

impl<C: JpegCodec> PooledCompressor<C> {
    pub fn new(codec: C, config: &PoolConfig) -> Self {
        Self::with_pool(codec, BufferPool::new(config))
    }

    /// Use an existing (possibly shared) pool.
    pub fn with_pool(codec: C, pool: BufferPool) -> Self {
        Self {
            codec,
            pool,
            growth_events: 0,
        }
    }

    /// Compress `request.uncompressed_size()` bytes of `pixels` into a
    /// buffer taken from the pool.
    ///
    /// On failure the buffer goes straight back to the pool.
    pub fn compress(
        &mut self,
        pixels: &[u8],
        request: &EncodeRequest,
        flags: CodecFlags,
    ) -> Result<PooledBuffer> {
        let required = self
            .codec
            .worst_case_size(request.width, request.height, request.subsampling);
        let mut fresh = false;
        let mut buffer = self.pool.acquire_with(|| {
            fresh = true;
            CompressedBuffer::with_capacity(*request, required)
        });

        match encode_into(&mut self.codec, &mut buffer, pixels, request, 0, flags) {
            Ok(grew) => {
                if fresh || grew {
                    self.growth_events += 1;
                }
                Ok(self.pool.checkout(buffer))
            }
            Err(e) => {
                self.pool.put_back(buffer);
                Err(e)
            }
        }
    }

    /// Return a buffer produced by [`compress`](Self::compress) and detached.
    pub fn put_back(&self, buffer: CompressedBuffer) {
        self.pool.put_back(buffer);
    }

    /// Number of compress calls that allocated or grew a buffer.
    pub fn growth_events(&self) -> usize {
        self.growth_events
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }
}
