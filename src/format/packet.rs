//! Packet representation for compressed video data

use crate::util::Buffer;
use std::fmt;

/// Packet flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags {
    /// First packet of its logical stream
    pub bos: bool,
    /// Last packet of its logical stream
    pub eos: bool,
}

/// A packet of compressed data from one logical stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Serial number of the logical stream
    pub serial: u32,

    /// Compressed data
    pub data: Buffer,

    /// End position marker, -1 when the page did not carry one for this packet
    pub granule_position: i64,

    /// Sequence number within the logical stream, starting at 0
    pub packet_no: i64,

    /// Packet flags
    pub flags: PacketFlags,
}

impl Packet {
    /// Create a new packet
    pub fn new(serial: u32, data: Buffer) -> Self {
        Packet {
            serial,
            data,
            granule_position: -1,
            packet_no: 0,
            flags: PacketFlags::default(),
        }
    }

    /// Check whether this packet begins its stream
    pub fn is_bos(&self) -> bool {
        self.flags.bos
    }

    /// Check whether this packet ends its stream
    pub fn is_eos(&self) -> bool {
        self.flags.eos
    }

    /// Get the size of the packet data
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check the packet payload against a magic prefix
    pub fn starts_with(&self, magic: &[u8]) -> bool {
        self.data.as_slice().starts_with(magic)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet(serial={:#010x}, no={}, size={}, granule={}, bos={}, eos={})",
            self.serial,
            self.packet_no,
            self.size(),
            self.granule_position,
            self.is_bos(),
            self.is_eos()
        )
    }
}
