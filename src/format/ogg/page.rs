//! Ogg page layout
//!
//! ```text
//!  0  capture pattern "OggS"
//!  4  stream structure version (0)
//!  5  header type flags
//!  6  granule position          (i64, little endian)
//! 14  bitstream serial number   (u32, little endian)
//! 18  page sequence number      (u32, little endian)
//! 22  CRC checksum              (u32, little endian)
//! 26  number of segments
//! 27  lacing values, then the page body
//! ```

use super::{crc, CAPTURE_PATTERN, FLAG_BOS, FLAG_CONTINUED, FLAG_EOS, PAGE_HEADER_SIZE};
use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

/// Fixed-size part of a page header plus its lacing table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    pub version: u8,
    pub header_type: u8,
    pub granule_position: i64,
    pub serial: u32,
    pub sequence: u32,
    pub checksum: u32,
    pub lacing: Vec<u8>,
}

impl PageHeader {
    /// Parse a header from the start of `data`
    ///
    /// Returns `Ok(None)` when more bytes are needed to see the whole header.
    pub fn parse(data: &[u8]) -> Result<Option<PageHeader>> {
        if data.len() < PAGE_HEADER_SIZE {
            return Ok(None);
        }
        if &data[0..4] != CAPTURE_PATTERN {
            return Err(Error::format("Missing Ogg capture pattern"));
        }
        let version = data[4];
        if version != 0 {
            return Err(Error::format(format!(
                "Unsupported Ogg stream structure version {}",
                version
            )));
        }
        let segments = data[26] as usize;
        if data.len() < PAGE_HEADER_SIZE + segments {
            return Ok(None);
        }
        Ok(Some(PageHeader {
            version,
            header_type: data[5],
            granule_position: LittleEndian::read_i64(&data[6..14]),
            serial: LittleEndian::read_u32(&data[14..18]),
            sequence: LittleEndian::read_u32(&data[18..22]),
            checksum: LittleEndian::read_u32(&data[22..26]),
            lacing: data[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + segments].to_vec(),
        }))
    }

    /// Size of the encoded header including the lacing table
    pub fn header_len(&self) -> usize {
        PAGE_HEADER_SIZE + self.lacing.len()
    }

    /// Size of the page body described by the lacing table
    pub fn body_len(&self) -> usize {
        self.lacing.iter().map(|&l| l as usize).sum()
    }
}

/// One complete, checksum-verified page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPage {
    pub header_type: u8,
    pub granule_position: i64,
    pub serial: u32,
    pub sequence: u32,
    pub lacing: Vec<u8>,
    pub body: Bytes,
}

impl OggPage {
    /// Assemble a page from a parsed header and its body
    pub fn from_parts(header: PageHeader, body: Bytes) -> Self {
        OggPage {
            header_type: header.header_type,
            granule_position: header.granule_position,
            serial: header.serial,
            sequence: header.sequence,
            lacing: header.lacing,
            body,
        }
    }

    /// First segment continues a packet from the previous page
    pub fn is_continued(&self) -> bool {
        self.header_type & FLAG_CONTINUED != 0
    }

    /// First page of a logical stream
    pub fn is_bos(&self) -> bool {
        self.header_type & FLAG_BOS != 0
    }

    /// Last page of a logical stream
    pub fn is_eos(&self) -> bool {
        self.header_type & FLAG_EOS != 0
    }

    /// Number of packets that end on this page
    pub fn packets_completed(&self) -> usize {
        self.lacing.iter().filter(|&&l| l < 255).count()
    }

    /// Serialize the page, computing its checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAGE_HEADER_SIZE + self.lacing.len() + self.body.len());
        out.extend_from_slice(CAPTURE_PATTERN);
        out.push(0);
        out.push(self.header_type);
        let mut field = [0u8; 8];
        LittleEndian::write_i64(&mut field, self.granule_position);
        out.extend_from_slice(&field);
        LittleEndian::write_u32(&mut field[..4], self.serial);
        out.extend_from_slice(&field[..4]);
        LittleEndian::write_u32(&mut field[..4], self.sequence);
        out.extend_from_slice(&field[..4]);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.push(self.lacing.len() as u8);
        out.extend_from_slice(&self.lacing);
        out.extend_from_slice(&self.body);

        let sum = crc::checksum(&out);
        LittleEndian::write_u32(&mut out[22..26], sum);
        out
    }
}

/// Checksum of an encoded page whose CRC field may hold any value
pub fn page_checksum(header: &[u8], body: &[u8]) -> u32 {
    let sum = crc::update(0, &header[..22]);
    let sum = crc::update(sum, &[0, 0, 0, 0]);
    let sum = crc::update(sum, &header[26..]);
    crc::update(sum, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> OggPage {
        OggPage {
            header_type: FLAG_BOS,
            granule_position: 0,
            serial: 0x1234_5678,
            sequence: 0,
            lacing: vec![5],
            body: Bytes::from_static(b"hello"),
        }
    }

    #[test]
    fn test_header_parse() {
        let bytes = sample_page().to_bytes();
        let header = PageHeader::parse(&bytes).unwrap().unwrap();
        assert_eq!(header.serial, 0x1234_5678);
        assert_eq!(header.header_type, FLAG_BOS);
        assert_eq!(header.lacing, vec![5]);
        assert_eq!(header.header_len(), 28);
        assert_eq!(header.body_len(), 5);

        let (head, body) = bytes.split_at(header.header_len());
        assert_eq!(page_checksum(head, body), header.checksum);
    }

    #[test]
    fn test_header_needs_more() {
        let bytes = sample_page().to_bytes();
        assert!(PageHeader::parse(&bytes[..20]).unwrap().is_none());
        assert!(PageHeader::parse(&bytes[..27]).unwrap().is_none());
    }

    #[test]
    fn test_header_rejects_garbage() {
        let mut bytes = sample_page().to_bytes();
        bytes[4] = 1;
        assert!(PageHeader::parse(&bytes).is_err());
        assert!(PageHeader::parse(b"NotOggAtAll-padding-to-27-bytes").is_err());
    }

    #[test]
    fn test_page_flags() {
        let mut page = sample_page();
        assert!(page.is_bos());
        assert!(!page.is_eos());
        assert!(!page.is_continued());
        page.header_type = FLAG_CONTINUED | FLAG_EOS;
        assert!(page.is_continued());
        assert!(page.is_eos());
        page.lacing = vec![255, 255, 10, 255];
        assert_eq!(page.packets_completed(), 1);
    }
}
