//! Reusable byte buffers for streaming entry copies.
//!
//! Every entry copy borrows one buffer from the pool for the duration of its
//! copy loop and returns it on every exit path (success or error) through the
//! `PooledBuf` drop guard. The pool is `Send + Sync` so one instance can be
//! shared by concurrent operations, while a single buffer is never handed to
//! more than one in-flight copy.

use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Buffers larger than this are dropped on release instead of pooled, to
/// bound idle memory.
pub const MAX_POOLED_CAPACITY: usize = 1 << 20; // 1 MiB

const TIER_SMALL: usize = 32 * 1024;
const TIER_MEDIUM: usize = 128 * 1024;
const TIER_LARGE: usize = 512 * 1024;

/// Pick a copy-buffer size from the entry's known or estimated byte length.
///
/// Small files get a small buffer, large files a larger one, trading
/// allocation overhead against memory reuse.
pub fn buffer_size_for(len_hint: u64) -> usize {
    if len_hint <= TIER_SMALL as u64 * 4 {
        TIER_SMALL
    } else if len_hint <= 8 * 1024 * 1024 {
        TIER_MEDIUM
    } else {
        TIER_LARGE
    }
}

/// A thread-safe free list of reusable byte buffers.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a buffer of exactly `len` usable bytes.
    ///
    /// Reuses a free buffer whose capacity covers `len` when one is
    /// available, otherwise allocates fresh. The buffer returns to the pool
    /// when the guard is dropped.
    pub fn acquire(&self, len: usize) -> PooledBuf<'_> {
        let mut free = self.free.lock().unwrap();
        let reusable = free.iter().position(|buf| buf.capacity() >= len);
        let mut buf = match reusable {
            Some(index) => free.swap_remove(index),
            None => Vec::with_capacity(len),
        };
        drop(free);
        buf.resize(len, 0);
        PooledBuf { buf, pool: self }
    }

    fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() <= MAX_POOLED_CAPACITY {
            buf.clear();
            self.free.lock().unwrap().push(buf);
        }
    }

    /// Number of buffers currently sitting in the free list.
    pub fn idle_buffers(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

/// A byte buffer borrowed from a [`BufferPool`].
///
/// Dereferences to `[u8]`; ownership returns to the pool on drop.
pub struct PooledBuf<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuf<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

/// Copy `reader` into `writer` through the given scratch buffer, returning
/// the number of bytes copied.
pub(crate) fn copy_through<R, W>(reader: &mut R, writer: &mut W, buf: &mut [u8]) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut copied = 0u64;
    loop {
        let read = match reader.read(buf) {
            Ok(0) => return Ok(copied),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        writer.write_all(&buf[..read])?;
        copied += read as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_reuses_released_buffers() {
        let pool = BufferPool::new();
        {
            let _buf = pool.acquire(1024);
            assert_eq!(pool.idle_buffers(), 0);
        }
        assert_eq!(pool.idle_buffers(), 1);
        let _again = pool.acquire(512);
        assert_eq!(pool.idle_buffers(), 0);
    }

    #[test]
    fn oversized_buffers_are_not_retained() {
        let pool = BufferPool::new();
        {
            let _buf = pool.acquire(MAX_POOLED_CAPACITY + 1);
        }
        assert_eq!(pool.idle_buffers(), 0);
    }

    #[test]
    fn buffers_return_even_when_the_copy_fails() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "boom"))
            }
        }

        let pool = BufferPool::new();
        {
            let mut buf = pool.acquire(4096);
            let mut sink = Vec::new();
            let result = copy_through(&mut FailingReader, &mut sink, &mut buf);
            assert!(result.is_err());
        }
        assert_eq!(pool.idle_buffers(), 1);
    }

    #[test]
    fn size_tiers_scale_with_hint() {
        assert_eq!(buffer_size_for(100), TIER_SMALL);
        assert_eq!(buffer_size_for(1024 * 1024), TIER_MEDIUM);
        assert_eq!(buffer_size_for(100 * 1024 * 1024), TIER_LARGE);
    }

    #[test]
    fn copy_through_moves_all_bytes() {
        let pool = BufferPool::new();
        let data = vec![7u8; 100_000];
        let mut buf = pool.acquire(buffer_size_for(data.len() as u64));
        let mut out = Vec::new();
        let copied = copy_through(&mut data.as_slice(), &mut out, &mut buf).unwrap();
        assert_eq!(copied, 100_000);
        assert_eq!(out, data);
    }
}
