//! Container format handling
//!
//! The analyzer reads a single compressed video stream out of an Ogg
//! container. This module provides the byte sources, the packet type and the
//! Ogg reader/writer.

pub mod ogg;
pub mod packet;
pub mod source;

pub use ogg::{OggReader, OggWriter};
pub use packet::{Packet, PacketFlags};
pub use source::{ByteSource, FileSource};

/// Detect format from the first bytes of a stream
pub fn detect_format_from_magic(data: &[u8]) -> Option<&'static str> {
    if ogg::probe(data) {
        Some("ogg")
    } else if data.starts_with(b"YUV4MPEG2") {
        Some("y4m")
    } else {
        None
    }
}
