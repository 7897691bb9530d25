//! Common test utilities for ZVA integration tests
//!
//! Provides a synthetic codec that fills every metadata grid and emits an
//! accounting log, plus helpers that build Ogg streams in memory.

#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder};
use std::io::Cursor;
use zva_lib::codec::accounting::{LAYER_FRAME, LAYER_MOTION};
use zva_lib::codec::raw::{header_packet, picture_size};
use zva_lib::codec::{
    DecoderSetup, FrameGeometry, GridKind, HeaderStatus, MvGridPoint, Picture, SideData,
    StreamInfo, VideoCodec, VideoDecoder,
};
use zva_lib::error::{Error, Result};
use zva_lib::format::{OggWriter, Packet};

// ============================================================================
// Synthetic codec
// ============================================================================

/// First header packet: magic, width, height, alignment (all u32 BE after magic)
pub const SYNTH_INFO_MAGIC: &[u8; 6] = b"\x80synth";
/// Second header packet
pub const SYNTH_COMMENT_MAGIC: &[u8; 6] = b"\x81synth";

/// Bit costs (in eighths of a bit) of the symbols recorded for every picture
pub const COEFF_Q3: u32 = 512;
pub const SKIP_Q3: u32 = 64;
pub const MV_EVEN_Q3: u32 = 800;
pub const MV_ODD_Q3: u32 = 360;
pub const FRAME_Q3: u32 = 24;

/// A codec whose pictures are described by a 4-byte payload:
/// `[luma, block-size code, deringing level, flags]`
///
/// With accounting on, every picture records the same five symbols, all well
/// inside a 64x64 frame.
#[derive(Debug, Clone, Copy)]
pub struct SynthCodec {
    /// Accept grid registration
    pub grids: bool,
    /// Accept accounting
    pub accounting: bool,
}

impl Default for SynthCodec {
    fn default() -> Self {
        SynthCodec {
            grids: true,
            accounting: true,
        }
    }
}

impl VideoCodec for SynthCodec {
    fn name(&self) -> &str {
        "synth"
    }

    fn setup(&self) -> Box<dyn DecoderSetup> {
        Box::new(SynthSetup {
            codec: *self,
            info: None,
        })
    }
}

struct SynthSetup {
    codec: SynthCodec,
    info: Option<StreamInfo>,
}

impl DecoderSetup for SynthSetup {
    fn header_in(&mut self, packet: &Packet) -> Result<HeaderStatus> {
        let data = packet.data.as_slice();
        if self.info.is_none() {
            if data.len() < 18 || !data.starts_with(SYNTH_INFO_MAGIC) {
                return Err(Error::unsupported("Not a synth stream"));
            }
            let mut info = StreamInfo::new(
                "synth",
                BigEndian::read_u32(&data[6..10]) as usize,
                BigEndian::read_u32(&data[10..14]) as usize,
            );
            info.alignment = BigEndian::read_u32(&data[14..18]) as usize;
            self.info = Some(info);
            return Ok(HeaderStatus::NeedMore);
        }
        if !data.starts_with(SYNTH_COMMENT_MAGIC) {
            return Err(Error::codec("Missing synth comment header"));
        }
        Ok(HeaderStatus::Complete(self.info.clone().unwrap()))
    }

    fn create_decoder(self: Box<Self>) -> Result<Box<dyn VideoDecoder>> {
        let info = self.info.ok_or_else(|| Error::invalid_state("no headers"))?;
        let geometry = info.geometry()?;
        Ok(Box::new(SynthDecoder {
            codec: self.codec,
            geometry,
            accounting: false,
            pending: None,
            pictures: 0,
        }))
    }
}

struct SynthDecoder {
    codec: SynthCodec,
    geometry: FrameGeometry,
    accounting: bool,
    pending: Option<Vec<u8>>,
    pictures: u64,
}

impl VideoDecoder for SynthDecoder {
    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        if packet.size() != 4 {
            return Err(Error::codec(format!("bad synth packet of {} bytes", packet.size())));
        }
        self.pending = Some(packet.data.as_slice().to_vec());
        Ok(())
    }

    fn receive_picture(&mut self, side: &mut SideData) -> Result<Picture> {
        let payload = self.pending.take().ok_or(Error::TryAgain)?;
        let (luma, block, dering, _flags) = (payload[0], payload[1], payload[2], payload[3]);

        let mut picture = Picture::new(&self.geometry, 1, 1)?;
        for y in 0..picture.height {
            picture.planes[0].row_mut(y).fill(luma);
        }

        if let Some(grid) = side.grids.block_size.as_mut() {
            grid.fill(block);
        }
        if let Some(grid) = side.grids.band_flags.as_mut() {
            // Band 0 skipped in every block
            grid.fill(0b01);
        }
        if let Some(grid) = side.grids.dering.as_mut() {
            grid.fill(dering);
        }
        if let Some(grid) = side.grids.motion.as_mut() {
            // The first picture after a (re)start has no motion vectors
            if self.pictures > 0 {
                grid.set(3, 3, MvGridPoint { mv: [4, -4], valid: true, ..Default::default() });
            }
        }

        if self.accounting {
            let log = &mut side.accounting;
            log.clear();
            log.record("coeff-y", 0, 1, 2, 2, COEFF_Q3);
            log.record("skip-flag", 1, 0, 1, 1, SKIP_Q3);
            log.record("motion-vector", LAYER_MOTION, 2, 4, 4, MV_EVEN_Q3);
            log.record("motion-flag", LAYER_MOTION, 3, 4, 4, MV_ODD_Q3);
            log.record("frame-type", LAYER_FRAME, 0, 0, 0, FRAME_Q3);
        }

        self.pictures += 1;
        Ok(picture)
    }

    fn register_grid(&mut self, kind: GridKind, _width: usize, _height: usize) -> Result<()> {
        if self.codec.grids {
            Ok(())
        } else {
            Err(Error::unsupported(format!("synth has no {} grid", kind)))
        }
    }

    fn set_accounting_enabled(&mut self, enabled: bool) -> Result<()> {
        if enabled && !self.codec.accounting {
            return Err(Error::unsupported("synth accounting disabled"));
        }
        self.accounting = enabled;
        Ok(())
    }
}

// ============================================================================
// Stream builders
// ============================================================================

/// Synth info header packet
pub fn synth_info_header(width: u32, height: u32, alignment: u32) -> Vec<u8> {
    let mut out = SYNTH_INFO_MAGIC.to_vec();
    out.resize(18, 0);
    BigEndian::write_u32(&mut out[6..10], width);
    BigEndian::write_u32(&mut out[10..14], height);
    BigEndian::write_u32(&mut out[14..18], alignment);
    out
}

/// Write `packets` as one logical stream
pub fn ogg_stream(serial: u32, packets: &[Vec<u8>]) -> Vec<u8> {
    let mut writer = OggWriter::new(Vec::new(), serial);
    for (n, packet) in packets.iter().enumerate() {
        writer
            .write_packet(packet, n as i64, n + 1 == packets.len())
            .unwrap();
    }
    writer.into_inner().unwrap()
}

/// Luma of synth picture `n`
pub fn synth_luma(n: u8) -> u8 {
    100 + n
}

/// A synth stream of `count` pictures with block-size code `block` everywhere
pub fn synth_stream(width: u32, height: u32, alignment: u32, count: u8, block: u8) -> Vec<u8> {
    let mut packets = vec![
        synth_info_header(width, height, alignment),
        SYNTH_COMMENT_MAGIC.to_vec(),
    ];
    for n in 0..count {
        packets.push(vec![synth_luma(n), block, n % 6, 0]);
    }
    ogg_stream(0x5e5e, &packets)
}

/// A raw-video stream of `count` pictures; picture `n` has every sample `n`
pub fn raw_stream(width: u32, height: u32, count: u8) -> Vec<u8> {
    let size = picture_size(width as usize, height as usize, 1, 1);
    let mut packets = vec![header_packet(width, height, 1, 1)];
    for n in 0..count {
        packets.push(vec![n; size]);
    }
    ogg_stream(0x7a7a, &packets)
}

/// Wrap stream bytes in an in-memory source
pub fn source(bytes: Vec<u8>) -> Cursor<Vec<u8>> {
    Cursor::new(bytes)
}

/// Open a synth stream in an analyzer with accounting on
pub fn open_synth(
    bytes: Vec<u8>,
    config: zva_lib::AnalyzerConfig,
) -> zva_lib::Analyzer<Cursor<Vec<u8>>> {
    zva_lib::Analyzer::open(Box::new(SynthCodec::default()), source(bytes), &config)
        .expect("synth stream opens")
}
