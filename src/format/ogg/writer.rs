//! Ogg page writer for a single logical stream

use super::page::OggPage;
use super::{FLAG_BOS, FLAG_CONTINUED, FLAG_EOS, MAX_PAGE_SEGMENTS};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::Write;

/// Writes packets of one logical stream as Ogg pages
///
/// Every packet starts on a fresh page; packets longer than one page can hold
/// are continued on following pages.
pub struct OggWriter<W: Write> {
    writer: W,
    serial: u32,
    sequence: u32,
    packets_written: u64,
    finished: bool,
}

impl<W: Write> OggWriter<W> {
    /// Create a writer for the stream `serial`
    pub fn new(writer: W, serial: u32) -> Self {
        OggWriter {
            writer,
            serial,
            sequence: 0,
            packets_written: 0,
            finished: false,
        }
    }

    /// Number of pages written so far
    pub fn pages_written(&self) -> u32 {
        self.sequence
    }

    /// Number of packets written so far
    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Write one packet; `eos` marks it as the last packet of the stream
    pub fn write_packet(&mut self, data: &[u8], granule_position: i64, eos: bool) -> Result<()> {
        if self.finished {
            return Err(Error::invalid_state("Ogg stream already ended"));
        }

        // A packet whose length is a multiple of 255 needs a terminating zero lace
        let mut lacing = vec![255u8; data.len() / 255];
        lacing.push((data.len() % 255) as u8);

        let mut offset = 0;
        let mut chunks = lacing.chunks(MAX_PAGE_SEGMENTS).peekable();
        let mut first = true;
        while let Some(chunk) = chunks.next() {
            let last = chunks.peek().is_none();
            let len: usize = chunk.iter().map(|&l| l as usize).sum();

            let mut header_type = 0;
            if self.sequence == 0 {
                header_type |= FLAG_BOS;
            }
            if !first {
                header_type |= FLAG_CONTINUED;
            }
            if last && eos {
                header_type |= FLAG_EOS;
            }

            let page = OggPage {
                header_type,
                granule_position: if last { granule_position } else { -1 },
                serial: self.serial,
                sequence: self.sequence,
                lacing: chunk.to_vec(),
                body: Bytes::copy_from_slice(&data[offset..offset + len]),
            };
            self.writer.write_all(&page.to_bytes())?;

            offset += len;
            self.sequence += 1;
            first = false;
        }

        self.packets_written += 1;
        self.finished = eos;
        Ok(())
    }

    /// Flush and return the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
