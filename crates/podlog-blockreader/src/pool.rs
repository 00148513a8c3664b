//! Reusable read buffers for block scanning, sized to avoid a fresh
//! allocation per block. Two tiers: most blocks fit the small buffer; a
//! block that outgrew its target size during the write path (deferred
//! rotation) gets the oversized one instead.

use std::sync::Mutex;

use bytes::BytesMut;

pub const SMALL_BUFFER_SIZE: usize = 4 * 1024 * 1024;
pub const LARGE_BUFFER_SIZE: usize = 30 * 1024 * 1024;

pub struct BufferPool {
    small: Mutex<Vec<BytesMut>>,
    large: Mutex<Vec<BytesMut>>,
}

/// A checked-out buffer, returned to its pool on drop.
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    large: bool,
    buf: Option<BytesMut>,
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(mut buf) = self.buf.take() {
            buf.clear();
            let slot = if self.large { &self.pool.large } else { &self.pool.small };
            slot.lock().unwrap().push(buf);
        }
    }
}

impl std::ops::Deref for PooledBuffer<'_> {
    type Target = BytesMut;
    fn deref(&self) -> &BytesMut {
        self.buf.as_ref().unwrap()
    }
}

impl std::ops::DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buf.as_mut().unwrap()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        BufferPool::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        BufferPool {
            small: Mutex::new(Vec::new()),
            large: Mutex::new(Vec::new()),
        }
    }

    /// Checks out a buffer sized for a block of `block_size` bytes.
    pub fn checkout(&self, block_size: u64) -> PooledBuffer<'_> {
        let large = block_size as usize > SMALL_BUFFER_SIZE;
        let (slot, capacity) = if large {
            (&self.large, LARGE_BUFFER_SIZE)
        } else {
            (&self.small, SMALL_BUFFER_SIZE)
        };

        let buf = slot.lock().unwrap().pop().unwrap_or_else(|| BytesMut::with_capacity(capacity));

        PooledBuffer {
            pool: self,
            large,
            buf: Some(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_a_returned_buffer() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.checkout(1024);
            buf.extend_from_slice(b"hello");
        }
        assert_eq!(pool.small.lock().unwrap().len(), 1);
        let buf = pool.checkout(1024);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn routes_oversized_blocks_to_the_large_pool() {
        let pool = BufferPool::new();
        let buf = pool.checkout((SMALL_BUFFER_SIZE + 1) as u64);
        assert!(buf.capacity() >= LARGE_BUFFER_SIZE);
    }
}
