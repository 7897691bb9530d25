//! Page synchronization over an arbitrary byte stream
//!
//! Bytes are written in whatever chunk sizes the source yields; complete
//! pages are cut out once their header, lacing table and body are buffered
//! and the checksum matches. Anything that is not a valid page is skipped
//! until the next capture pattern.

use super::page::{page_checksum, OggPage, PageHeader};
use super::CAPTURE_PATTERN;
use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

/// Page synchronization state
#[derive(Debug, Default)]
pub struct OggSync {
    buffer: BytesMut,
    skipped: u64,
}

impl OggSync {
    /// Create an empty synchronizer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the source
    pub fn write(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet returned as part of a page
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes discarded while searching for pages
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Extract the next complete page, if one is buffered
    pub fn page_out(&mut self) -> Option<OggPage> {
        loop {
            if !self.seek_capture() {
                return None;
            }

            let header = match PageHeader::parse(&self.buffer) {
                Ok(Some(header)) => header,
                Ok(None) => return None,
                Err(e) => {
                    debug!("Ogg resync: {}", e);
                    self.discard(1);
                    continue;
                }
            };

            let header_len = header.header_len();
            let total = header_len + header.body_len();
            if self.buffer.len() < total {
                return None;
            }

            let sum = page_checksum(&self.buffer[..header_len], &self.buffer[header_len..total]);
            if sum != header.checksum {
                warn!(
                    "Ogg page checksum mismatch (serial {:#010x}, sequence {}), resyncing",
                    header.serial, header.sequence
                );
                self.discard(1);
                continue;
            }

            let mut page = self.buffer.split_to(total);
            page.advance(header_len);
            return Some(OggPage::from_parts(header, page.freeze()));
        }
    }

    /// Drop bytes until the buffer starts with a (possibly partial) capture pattern.
    /// Returns false when nothing usable is buffered.
    fn seek_capture(&mut self) -> bool {
        if self.buffer.starts_with(CAPTURE_PATTERN) {
            return true;
        }
        match find(&self.buffer, CAPTURE_PATTERN) {
            Some(pos) => {
                self.discard(pos);
                true
            }
            None => {
                // Keep a tail that could be the start of a split capture pattern
                let keep = (1..CAPTURE_PATTERN.len())
                    .rev()
                    .find(|&n| n <= self.buffer.len() && self.buffer.ends_with(&CAPTURE_PATTERN[..n]))
                    .unwrap_or(0);
                let drop = self.buffer.len() - keep;
                self.discard(drop);
                false
            }
        }
    }

    fn discard(&mut self, n: usize) {
        if n > 0 {
            self.buffer.advance(n);
            self.skipped += n as u64;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ogg::FLAG_BOS;
    use bytes::Bytes;

    fn page(sequence: u32, body: &'static [u8]) -> OggPage {
        OggPage {
            header_type: if sequence == 0 { FLAG_BOS } else { 0 },
            granule_position: sequence as i64,
            serial: 42,
            sequence,
            lacing: vec![body.len() as u8],
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn test_whole_pages() {
        let mut sync = OggSync::new();
        sync.write(&page(0, b"first").to_bytes());
        sync.write(&page(1, b"second").to_bytes());

        let p0 = sync.page_out().unwrap();
        assert_eq!(p0.body.as_ref(), b"first");
        assert!(p0.is_bos());
        let p1 = sync.page_out().unwrap();
        assert_eq!(p1.body.as_ref(), b"second");
        assert_eq!(p1.sequence, 1);
        assert!(sync.page_out().is_none());
        assert_eq!(sync.buffered(), 0);
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = page(0, b"dribble").to_bytes();
        let mut sync = OggSync::new();
        for (i, b) in bytes.iter().enumerate() {
            assert!(sync.page_out().is_none(), "page emitted early at byte {}", i);
            sync.write(std::slice::from_ref(b));
        }
        assert_eq!(sync.page_out().unwrap().body.as_ref(), b"dribble");
    }

    #[test]
    fn test_skips_leading_garbage() {
        let mut sync = OggSync::new();
        sync.write(b"garbage bytes Og");
        assert!(sync.page_out().is_none());
        // The partial "Og" must survive
        assert_eq!(sync.buffered(), 2);
        let bytes = page(0, b"payload").to_bytes();
        sync.write(&bytes[2..]);
        let p = sync.page_out().unwrap();
        assert_eq!(p.body.as_ref(), b"payload");
        assert_eq!(sync.skipped(), 14);
    }

    #[test]
    fn test_bad_checksum_resyncs() {
        let mut corrupt = page(0, b"broken").to_bytes();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;

        let mut sync = OggSync::new();
        sync.write(&corrupt);
        sync.write(&page(1, b"intact").to_bytes());

        let p = sync.page_out().unwrap();
        assert_eq!(p.body.as_ref(), b"intact");
        assert_eq!(p.sequence, 1);
    }
}
