//! Uncompressed planar video
//!
//! A stream starts with one header packet:
//!
//! ```text
//!  0  magic "\x80zvaraw\0"
//!  8  picture width   (u32, big endian)
//! 12  picture height  (u32, big endian)
//! 16  chroma xdec     (u8)
//! 17  chroma ydec     (u8)
//! ```
//!
//! Every following packet holds one picture as Y, Cb and Cr planes, each
//! tightly packed at the visible picture size. The decoder pads planes to the
//! frame size by replicating the last column and row. It produces no metadata
//! grids and no accounting.

use super::decoder::{DecoderSetup, HeaderStatus, SideData, VideoCodec, VideoDecoder};
use super::grid::GridKind;
use super::picture::{FrameGeometry, Picture, StreamInfo};
use crate::error::{Error, Result};
use crate::format::Packet;
use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

/// Header packet magic
pub const RAW_MAGIC: &[u8; 8] = b"\x80zvaraw\0";

const HEADER_SIZE: usize = 18;

/// Codec entry point
#[derive(Debug, Clone, Copy, Default)]
pub struct RawVideoCodec;

impl VideoCodec for RawVideoCodec {
    fn name(&self) -> &str {
        "raw"
    }

    fn setup(&self) -> Box<dyn DecoderSetup> {
        Box::new(RawSetup { info: None })
    }
}

/// Encode the header packet for a stream
pub fn header_packet(width: u32, height: u32, xdec: u8, ydec: u8) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_SIZE];
    out[..8].copy_from_slice(RAW_MAGIC);
    BigEndian::write_u32(&mut out[8..12], width);
    BigEndian::write_u32(&mut out[12..16], height);
    out[16] = xdec;
    out[17] = ydec;
    out
}

/// Size of one picture packet
pub fn picture_size(width: usize, height: usize, xdec: u8, ydec: u8) -> usize {
    let (cw, ch) = chroma_size(width, height, xdec, ydec);
    width * height + 2 * cw * ch
}

fn chroma_size(width: usize, height: usize, xdec: u8, ydec: u8) -> (usize, usize) {
    (
        (width + (1 << xdec) - 1) >> xdec,
        (height + (1 << ydec) - 1) >> ydec,
    )
}

fn parse_header(data: &[u8]) -> Result<StreamInfo> {
    if data.len() < HEADER_SIZE || !data.starts_with(RAW_MAGIC) {
        return Err(Error::unsupported("Not a raw video header"));
    }
    let width = BigEndian::read_u32(&data[8..12]) as usize;
    let height = BigEndian::read_u32(&data[12..16]) as usize;
    let (xdec, ydec) = (data[16], data[17]);
    if width == 0 || height == 0 {
        return Err(Error::unsupported(format!("Invalid picture size {}x{}", width, height)));
    }
    if xdec > 1 || ydec > 1 {
        return Err(Error::unsupported(format!(
            "Unsupported chroma decimation {}x{}",
            xdec, ydec
        )));
    }
    let mut info = StreamInfo::new("raw", width, height);
    info.chroma_xdec = xdec;
    info.chroma_ydec = ydec;
    Ok(info)
}

struct RawSetup {
    info: Option<StreamInfo>,
}

impl DecoderSetup for RawSetup {
    fn header_in(&mut self, packet: &Packet) -> Result<HeaderStatus> {
        let info = parse_header(packet.data.as_slice())?;
        debug!("Raw video header: {}", info);
        self.info = Some(info.clone());
        Ok(HeaderStatus::Complete(info))
    }

    fn create_decoder(self: Box<Self>) -> Result<Box<dyn VideoDecoder>> {
        let info = self
            .info
            .ok_or_else(|| Error::invalid_state("Raw video headers not complete"))?;
        let geometry = info.geometry()?;
        Ok(Box::new(RawDecoder {
            info,
            geometry,
            pending: None,
        }))
    }
}

struct RawDecoder {
    info: StreamInfo,
    geometry: FrameGeometry,
    pending: Option<Packet>,
}

impl RawDecoder {
    fn expected_size(&self) -> usize {
        picture_size(
            self.info.pic_width,
            self.info.pic_height,
            self.info.chroma_xdec,
            self.info.chroma_ydec,
        )
    }
}

impl VideoDecoder for RawDecoder {
    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        if packet.size() != self.expected_size() {
            return Err(Error::codec(format!(
                "Raw picture packet {} has {} bytes, expected {}",
                packet.packet_no,
                packet.size(),
                self.expected_size()
            )));
        }
        self.pending = Some(packet.clone());
        Ok(())
    }

    fn receive_picture(&mut self, _side: &mut SideData) -> Result<Picture> {
        let packet = self.pending.take().ok_or(Error::TryAgain)?;
        let data = packet.data.as_slice();
        let (xdec, ydec) = (self.info.chroma_xdec, self.info.chroma_ydec);
        let mut picture = Picture::new(&self.geometry, xdec, ydec)?;

        let mut offset = 0;
        for plane in picture.planes.iter_mut() {
            let (w, h) = chroma_size(self.info.pic_width, self.info.pic_height, plane.xdec, plane.ydec);
            let src = &data[offset..offset + w * h];
            offset += w * h;
            for y in 0..plane.height {
                let src_row = &src[y.min(h - 1) * w..y.min(h - 1) * w + w];
                let row = plane.row_mut(y);
                let copy = w.min(row.len());
                row[..copy].copy_from_slice(&src_row[..copy]);
                let edge = src_row[w - 1];
                for v in row[copy..].iter_mut() {
                    *v = edge;
                }
            }
        }
        Ok(picture)
    }

    fn register_grid(&mut self, kind: GridKind, _width: usize, _height: usize) -> Result<()> {
        Err(Error::unsupported(format!("Raw video has no {} grid", kind)))
    }

    fn set_accounting_enabled(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            Err(Error::unsupported("Raw video has no bit accounting"))
        } else {
            Ok(())
        }
    }
}
