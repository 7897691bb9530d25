//! Container reader: byte source → pages → packets of one logical stream

use super::{OggPage, OggStream, OggSync, READ_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::format::{ByteSource, Packet};
use tracing::{debug, trace};

/// Reads packets of the first logical stream found in an Ogg byte source
pub struct OggReader<S: ByteSource> {
    source: S,
    sync: OggSync,
    stream: Option<OggStream>,
    chunk: Vec<u8>,
    pages_read: u64,
    bytes_read: u64,
}

impl<S: ByteSource> OggReader<S> {
    /// Create a reader over `source`
    pub fn new(source: S) -> Self {
        OggReader {
            source,
            sync: OggSync::new(),
            stream: None,
            chunk: vec![0u8; READ_CHUNK_SIZE],
            pages_read: 0,
            bytes_read: 0,
        }
    }

    /// Serial of the logical stream being read, once one has begun
    pub fn serial(&self) -> Option<u32> {
        self.stream.as_ref().map(|s| s.serial())
    }

    /// Pages extracted so far
    pub fn pages_read(&self) -> u64 {
        self.pages_read
    }

    /// Bytes pulled from the source so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Access the underlying source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Read the next complete page, pulling chunks from the source as needed
    pub fn read_page(&mut self) -> Result<OggPage> {
        loop {
            if let Some(page) = self.sync.page_out() {
                self.pages_read += 1;
                trace!(
                    "page serial={:#010x} seq={} granule={} body={}",
                    page.serial,
                    page.sequence,
                    page.granule_position,
                    page.body.len()
                );
                return Ok(page);
            }
            let n = self.source.read(&mut self.chunk)?;
            if n == 0 {
                return Err(Error::EndOfStream);
            }
            self.bytes_read += n as u64;
            self.sync.write(&self.chunk[..n]);
        }
    }

    /// Skip ahead to the first begin-of-stream page and start reading its stream
    pub fn begin_stream(&mut self) -> Result<u32> {
        loop {
            let page = self.read_page()?;
            if !page.is_bos() {
                debug!(
                    "Skipping page {} of stream {:#010x} before any stream start",
                    page.sequence, page.serial
                );
                continue;
            }
            let mut stream = OggStream::new(page.serial);
            stream.page_in(&page)?;
            let serial = stream.serial();
            self.stream = Some(stream);
            debug!("Logical stream {:#010x} begins", serial);
            return Ok(serial);
        }
    }

    /// Read the next packet of the current logical stream
    ///
    /// Pages of other logical streams are skipped. Returns
    /// [`Error::EndOfStream`] once the source is drained.
    pub fn read_packet(&mut self) -> Result<Packet> {
        loop {
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| Error::invalid_state("No logical stream has begun"))?;
            if let Some(packet) = stream.packet_out() {
                return Ok(packet);
            }
            if stream.is_eos() {
                return Err(Error::EndOfStream);
            }

            let page = self.read_page()?;
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| Error::invalid_state("No logical stream has begun"))?;
            if page.serial != stream.serial() {
                trace!("Skipping page of foreign stream {:#010x}", page.serial);
                continue;
            }
            stream.page_in(&page)?;
        }
    }

    /// Drop all container state and reopen the source from its first byte
    pub fn rewind(&mut self) -> Result<()> {
        self.source.reopen()?;
        self.sync = OggSync::new();
        self.stream = None;
        self.pages_read = 0;
        self.bytes_read = 0;
        Ok(())
    }
}
