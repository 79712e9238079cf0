use pgstash_core::{FileMeta, SourceFile};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    data
}

/// Source over an in-memory buffer whose declared size is its length.
#[allow(dead_code)]
pub fn memory_source<'a>(name: &str, data: &'a [u8]) -> SourceFile<&'a [u8]> {
    SourceFile::new(data, FileMeta::new(name, data.len() as u64))
}

/// Reader that yields `ok_bytes` zero bytes and then fails.
#[allow(dead_code)]
pub struct FailingReader {
    remaining: usize,
}

#[allow(dead_code)]
impl FailingReader {
    pub fn new(ok_bytes: usize) -> Self {
        Self {
            remaining: ok_bytes,
        }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.remaining == 0 {
            return Poll::Ready(Err(io::Error::other("source read failed")));
        }
        let n = self.remaining.min(buf.remaining());
        buf.put_slice(&vec![0u8; n]);
        self.remaining -= n;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_deterministic() {
        let data1 = seeded_bytes(42, 1000);
        let data2 = seeded_bytes(42, 1000);
        assert_eq!(data1, data2);
    }

    #[test]
    fn test_seeded_bytes_different_seeds() {
        assert_ne!(seeded_bytes(1, 64), seeded_bytes(2, 64));
    }
}
