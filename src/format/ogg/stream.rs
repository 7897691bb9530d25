//! Packet reassembly for a single logical stream

use super::page::OggPage;
use crate::error::{Error, Result};
use crate::format::{Packet, PacketFlags};
use crate::util::Buffer;
use bytes::BytesMut;
use std::collections::VecDeque;
use tracing::warn;

/// Logical stream state: pages in, packets out
#[derive(Debug)]
pub struct OggStream {
    serial: u32,
    next_sequence: Option<u32>,
    partial: BytesMut,
    /// A packet fragment was lost; drop continuation data until the next packet starts
    skip_continuation: bool,
    pending: VecDeque<Packet>,
    packet_no: i64,
    bos_page_seen: bool,
    eos_seen: bool,
}

impl OggStream {
    /// Create a logical stream context for `serial`
    pub fn new(serial: u32) -> Self {
        OggStream {
            serial,
            next_sequence: None,
            partial: BytesMut::new(),
            skip_continuation: false,
            pending: VecDeque::new(),
            packet_no: 0,
            bos_page_seen: false,
            eos_seen: false,
        }
    }

    /// Serial number of this stream
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Whether the end-of-stream page has been submitted
    pub fn is_eos(&self) -> bool {
        self.eos_seen
    }

    /// Submit a page belonging to this stream
    pub fn page_in(&mut self, page: &OggPage) -> Result<()> {
        if page.serial != self.serial {
            return Err(Error::format(format!(
                "Page serial {:#010x} does not belong to stream {:#010x}",
                page.serial, self.serial
            )));
        }
        if self.eos_seen {
            return Err(Error::format("Page after end of stream"));
        }
        let laced: usize = page.lacing.iter().map(|&l| l as usize).sum();
        if laced != page.body.len() {
            return Err(Error::format(format!(
                "Lacing describes {} bytes but page body holds {}",
                laced,
                page.body.len()
            )));
        }

        if let Some(expected) = self.next_sequence {
            if page.sequence != expected {
                warn!(
                    "Ogg stream {:#010x}: expected page {}, got {}; dropping partial packet",
                    self.serial, expected, page.sequence
                );
                self.partial.clear();
                self.skip_continuation = true;
            }
        } else if page.is_continued() && self.partial.is_empty() {
            // Joined mid-packet; its head was never seen
            self.skip_continuation = true;
        }
        self.next_sequence = Some(page.sequence.wrapping_add(1));
        if page.is_bos() {
            self.bos_page_seen = true;
        }

        if !page.is_continued() {
            if !self.partial.is_empty() {
                warn!(
                    "Ogg stream {:#010x}: unterminated packet of {} bytes discarded",
                    self.serial,
                    self.partial.len()
                );
                self.partial.clear();
            }
            self.skip_continuation = false;
        }

        let completed = page.packets_completed();
        let mut finished = 0;
        let mut offset = 0;
        for &lace in &page.lacing {
            let end = offset + lace as usize;
            let segment = &page.body[offset..end];
            offset = end;

            if !self.skip_continuation {
                self.partial.extend_from_slice(segment);
            }
            if lace < 255 {
                finished += 1;
                if self.skip_continuation {
                    self.skip_continuation = false;
                    continue;
                }
                let data = self.partial.split().freeze();
                let mut packet = Packet::new(self.serial, Buffer::new(data));
                packet.packet_no = self.packet_no;
                packet.flags = PacketFlags {
                    bos: self.bos_page_seen && self.packet_no == 0,
                    eos: page.is_eos() && finished == completed,
                };
                if finished == completed {
                    packet.granule_position = page.granule_position;
                }
                self.packet_no += 1;
                self.pending.push_back(packet);
            }
        }

        if page.is_eos() {
            self.eos_seen = true;
        }
        Ok(())
    }

    /// Take the next complete packet
    pub fn packet_out(&mut self) -> Option<Packet> {
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ogg::{FLAG_BOS, FLAG_CONTINUED, FLAG_EOS};
    use bytes::Bytes;

    fn page(header_type: u8, sequence: u32, granule: i64, lacing: Vec<u8>, body: Vec<u8>) -> OggPage {
        OggPage {
            header_type,
            granule_position: granule,
            serial: 9,
            sequence,
            lacing,
            body: Bytes::from(body),
        }
    }

    #[test]
    fn test_packets_on_one_page() {
        let mut stream = OggStream::new(9);
        let body = b"abcdefg".to_vec();
        stream
            .page_in(&page(FLAG_BOS | FLAG_EOS, 0, 77, vec![3, 4], body))
            .unwrap();

        let first = stream.packet_out().unwrap();
        assert_eq!(first.data.as_slice(), b"abc");
        assert!(first.is_bos());
        assert!(!first.is_eos());
        assert_eq!(first.granule_position, -1);
        assert_eq!(first.packet_no, 0);

        let second = stream.packet_out().unwrap();
        assert_eq!(second.data.as_slice(), b"defg");
        assert!(!second.is_bos());
        assert!(second.is_eos());
        assert_eq!(second.granule_position, 77);
        assert_eq!(second.packet_no, 1);

        assert!(stream.packet_out().is_none());
        assert!(stream.is_eos());
    }

    #[test]
    fn test_packet_spanning_pages() {
        let mut stream = OggStream::new(9);
        let big: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        stream
            .page_in(&page(FLAG_BOS, 0, -1, vec![255], big[..255].to_vec()))
            .unwrap();
        assert!(stream.packet_out().is_none());
        stream
            .page_in(&page(FLAG_CONTINUED, 1, 5, vec![45], big[255..].to_vec()))
            .unwrap();
        let packet = stream.packet_out().unwrap();
        assert_eq!(packet.data.as_slice(), &big[..]);
        assert!(packet.is_bos());
        assert_eq!(packet.granule_position, 5);
    }

    #[test]
    fn test_zero_length_packet() {
        let mut stream = OggStream::new(9);
        stream
            .page_in(&page(FLAG_BOS, 0, 0, vec![0, 2], b"xy".to_vec()))
            .unwrap();
        assert!(stream.packet_out().unwrap().data.is_empty());
        assert_eq!(stream.packet_out().unwrap().data.as_slice(), b"xy");
    }

    #[test]
    fn test_wrong_serial_rejected() {
        let mut stream = OggStream::new(1);
        let result = stream.page_in(&page(FLAG_BOS, 0, 0, vec![1], b"z".to_vec()));
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_sequence_gap_drops_fragment() {
        let mut stream = OggStream::new(9);
        stream
            .page_in(&page(FLAG_BOS, 0, -1, vec![255], vec![1u8; 255]))
            .unwrap();
        // Page 1 is lost; page 2 continues the packet and then starts a new one
        stream
            .page_in(&page(FLAG_CONTINUED, 2, 3, vec![10, 3], {
                let mut b = vec![2u8; 10];
                b.extend_from_slice(b"new");
                b
            }))
            .unwrap();
        let packet = stream.packet_out().unwrap();
        assert_eq!(packet.data.as_slice(), b"new");
        assert!(stream.packet_out().is_none());
    }

    #[test]
    fn test_leading_continuation_dropped() {
        let mut stream = OggStream::new(9);
        stream
            .page_in(&page(FLAG_CONTINUED, 4, 8, vec![5, 3], b"tailsnew".to_vec()))
            .unwrap();
        let packet = stream.packet_out().unwrap();
        assert_eq!(packet.data.as_slice(), b"new");
        assert!(stream.packet_out().is_none());
    }
}
