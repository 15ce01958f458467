//! Append-only receive buffer: a chain of byte chunks with O(1) `append`
//! and O(k) `take(k)`.
//!
//! Network reads arrive as arbitrarily-sized `Bytes` chunks; rather than
//! copying each into one growing `Vec<u8>` (which makes `append` O(n)),
//! chunks are kept as-is in a deque and only copied out when a complete
//! token's payload is consumed.

use std::collections::VecDeque;

use bytes::Bytes;

/// A chain of buffered byte chunks awaiting consumption by the token decoder.
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    chunks: VecDeque<Bytes>,
    len: usize,
}

impl ReceiveBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self { chunks: VecDeque::new(), len: 0 }
    }

    /// Total number of unconsumed bytes currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer currently holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one chunk. O(1).
    pub fn append(&mut self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Peek the byte at `offset` from the front without consuming
    /// anything. `None` if `offset` is past the end of buffered data.
    #[must_use]
    pub fn peek_byte(&self, offset: usize) -> Option<u8> {
        if offset >= self.len {
            return None;
        }
        let mut remaining = offset;
        for chunk in &self.chunks {
            if remaining < chunk.len() {
                return Some(chunk[remaining]);
            }
            remaining -= chunk.len();
        }
        None
    }

    /// Remove and return exactly `n` bytes from the front, or `None`
    /// (leaving the buffer untouched) if fewer than `n` bytes are
    /// buffered. O(k) in the number of chunks spanned.
    pub fn take(&mut self, n: usize) -> Option<Vec<u8>> {
        if n > self.len {
            return None;
        }
        let mut out = Vec::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            let front = self.chunks.front_mut().expect("len tracked remaining bytes exist");
            if front.len() <= remaining {
                remaining -= front.len();
                out.extend_from_slice(front);
                self.chunks.pop_front();
            } else {
                out.extend_from_slice(&front[..remaining]);
                *front = front.slice(remaining..);
                remaining = 0;
            }
        }
        self.len -= n;
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_take_across_chunks() {
        let mut buf = ReceiveBuffer::new();
        buf.append(Bytes::from_static(b"hel"));
        buf.append(Bytes::from_static(b"lo, "));
        buf.append(Bytes::from_static(b"world"));
        assert_eq!(buf.len(), 12);

        assert_eq!(buf.peek_byte(0), Some(b'h'));
        assert_eq!(buf.peek_byte(7), Some(b'w'));
        assert_eq!(buf.peek_byte(100), None);

        let taken = buf.take(5).unwrap();
        assert_eq!(taken, b"hello");
        assert_eq!(buf.len(), 7);
        assert_eq!(buf.take(100), None);
        assert_eq!(buf.len(), 7);

        let rest = buf.take(7).unwrap();
        assert_eq!(rest, b", world");
        assert!(buf.is_empty());
    }
}
