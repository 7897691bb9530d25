//! Ogg container support
//!
//! Bytes are pulled from a [`ByteSource`](crate::format::ByteSource) in fixed
//! chunks, cut into checksum-verified pages by [`OggSync`], and reassembled into
//! packets of a single logical stream by [`OggStream`]. [`OggReader`] ties the
//! three together; [`OggWriter`] produces streams the reader understands.

mod crc;
pub mod page;
pub mod reader;
pub mod stream;
pub mod sync;
pub mod writer;

pub use page::{OggPage, PageHeader};
pub use reader::OggReader;
pub use stream::OggStream;
pub use sync::OggSync;
pub use writer::OggWriter;

/// Every page starts with this
pub const CAPTURE_PATTERN: &[u8; 4] = b"OggS";

/// Fixed header bytes before the lacing table
pub const PAGE_HEADER_SIZE: usize = 27;

/// Maximum number of lacing values on one page
pub const MAX_PAGE_SEGMENTS: usize = 255;

/// Bytes requested from the source per read
pub const READ_CHUNK_SIZE: usize = 4096;

/// Header type: first segment continues a packet from the previous page
pub const FLAG_CONTINUED: u8 = 0x01;
/// Header type: first page of a logical stream
pub const FLAG_BOS: u8 = 0x02;
/// Header type: last page of a logical stream
pub const FLAG_EOS: u8 = 0x04;

/// Check whether `data` begins like an Ogg stream
pub fn probe(data: &[u8]) -> bool {
    data.starts_with(CAPTURE_PATTERN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe() {
        assert!(probe(b"OggS\0\x02"));
        assert!(!probe(b"RIFF"));
        assert!(!probe(b"Og"));
    }
}
