//! Shared byte buffers for packet payloads

use bytes::Bytes;

/// A reference-counted, immutable byte buffer
///
/// Packets extracted from the container share the page body they were cut
/// from, so cloning a packet never copies its payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Buffer {
    data: Bytes,
}

impl Buffer {
    /// Create a new buffer from bytes
    pub fn new(data: Bytes) -> Self {
        Buffer { data }
    }

    /// Create a buffer from a vector
    pub fn from_vec(vec: Vec<u8>) -> Self {
        Buffer {
            data: Bytes::from(vec),
        }
    }

    /// Create an empty buffer
    pub fn empty() -> Self {
        Buffer { data: Bytes::new() }
    }

    /// Get the length of the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a slice of the buffer data
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl From<Bytes> for Buffer {
    fn from(data: Bytes) -> Self {
        Buffer { data }
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_creation() {
        let buf = Buffer::from_vec(vec![1, 2, 3, 4]);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_buffer_empty() {
        let buf = Buffer::empty();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_buffer_shares_bytes() {
        let bytes = Bytes::from_static(b"OggS");
        let buf = Buffer::from(bytes.slice(1..));
        assert_eq!(buf.as_slice(), b"ggS");
        assert_eq!(buf.as_ref(), b"ggS");
    }
}
