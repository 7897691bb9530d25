//! Decode session
//!
//! Owns the container reader, the decoder and everything the decoder writes
//! into. A session moves through
//!
//! ```text
//! Empty -> AwaitingHeaders -> Ready -> Stepping -> { Ready, Exhausted, Failed }
//! ```
//!
//! and is rebuilt from the start of its byte source on [`DecodeSession::restart`].

use crate::codec::{
    AccountingLog, FrameGeometry, GridKind, HeaderStatus, MetadataGrids, Picture, SideData,
    StreamInfo, VideoCodec, VideoDecoder,
};
use crate::error::{Error, Result};
use crate::format::{ByteSource, OggReader};
use std::fmt;
use tracing::{debug, info, warn};

/// First bytes of an Ogg Skeleton header packet
const SKELETON_MAGIC: &[u8] = b"fishead\0";

/// Lifecycle of a [`DecodeSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing opened
    Empty,
    /// Reading header packets
    AwaitingHeaders,
    /// Decoder live, ready for the next picture
    Ready,
    /// A step is in progress
    Stepping,
    /// The source is drained
    Exhausted,
    /// The decoder rejected a packet; only a restart recovers
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Empty => "empty",
            SessionState::AwaitingHeaders => "awaiting headers",
            SessionState::Ready => "ready",
            SessionState::Stepping => "stepping",
            SessionState::Exhausted => "exhausted",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything negotiation produces, committed to the session only on success
struct Negotiated {
    decoder: Box<dyn VideoDecoder>,
    info: StreamInfo,
    geometry: FrameGeometry,
    grids: MetadataGrids,
    accounting_enabled: bool,
}

/// Decodes one logical stream picture by picture
pub struct DecodeSession<S: ByteSource> {
    codec: Box<dyn VideoCodec>,
    reader: Option<OggReader<S>>,
    decoder: Option<Box<dyn VideoDecoder>>,
    info: Option<StreamInfo>,
    geometry: Option<FrameGeometry>,
    side: SideData,
    picture: Option<Picture>,
    picture_count: u64,
    state: SessionState,
    accounting_requested: bool,
    accounting_enabled: bool,
}

impl<S: ByteSource> DecodeSession<S> {
    /// Create an empty session decoding with `codec`
    ///
    /// With `accounting` set the decoder is asked for a per-symbol log on
    /// every picture.
    pub fn new(codec: Box<dyn VideoCodec>, accounting: bool) -> Self {
        DecodeSession {
            codec,
            reader: None,
            decoder: None,
            info: None,
            geometry: None,
            side: SideData::default(),
            picture: None,
            picture_count: 0,
            state: SessionState::Empty,
            accounting_requested: accounting,
            accounting_enabled: false,
        }
    }

    /// Open `source` and negotiate its stream headers
    ///
    /// On failure the session is left empty and may be opened again.
    pub fn open(&mut self, source: S) -> Result<()> {
        if self.state != SessionState::Empty {
            self.close();
        }
        let mut reader = OggReader::new(source);
        self.state = SessionState::AwaitingHeaders;
        match self.negotiate(&mut reader) {
            Ok(negotiated) => {
                info!(
                    "Opened {} ({} stream, {}x{} padded to {}x{})",
                    reader.source().name(),
                    negotiated.info.codec,
                    negotiated.geometry.pic_width,
                    negotiated.geometry.pic_height,
                    negotiated.geometry.frame_width,
                    negotiated.geometry.frame_height
                );
                self.reader = Some(reader);
                self.commit(negotiated);
                Ok(())
            }
            Err(e) => {
                warn!("Could not open {}: {}", reader.source().name(), e);
                self.close();
                Err(e)
            }
        }
    }

    fn negotiate(&self, reader: &mut OggReader<S>) -> Result<Negotiated> {
        let serial = reader.begin_stream().map_err(|e| match e {
            Error::EndOfStream => Error::unsupported("No Ogg stream found"),
            other => other,
        })?;
        debug!("Negotiating headers of stream {:#010x}", serial);

        let mut setup = self.codec.setup();
        let mut first = true;
        let info = loop {
            let packet = reader.read_packet().map_err(|e| match e {
                Error::EndOfStream => Error::unsupported("Stream ended before its headers were complete"),
                other => other,
            })?;
            if first && packet.starts_with(SKELETON_MAGIC) {
                return Err(Error::unsupported("Ogg Skeleton streams are not supported"));
            }
            first = false;
            match setup.header_in(&packet) {
                Ok(HeaderStatus::NeedMore) => continue,
                Ok(HeaderStatus::Complete(info)) => break info,
                Err(Error::Unsupported(msg)) | Err(Error::Codec(msg)) => {
                    return Err(Error::unsupported(format!("Unsupported or corrupt stream: {}", msg)))
                }
                Err(e) => return Err(e),
            }
        };

        let mut decoder = setup.create_decoder()?;
        let geometry = info.geometry()?;
        let mut grids = MetadataGrids::allocate(&geometry)?;
        for kind in GridKind::ALL {
            let (width, height) = kind.extent(&geometry);
            match decoder.register_grid(kind, width, height) {
                Ok(()) => debug!("Registered {} grid {}x{}", kind, width, height),
                Err(Error::Unsupported(msg)) => {
                    warn!("Decoder cannot provide the {} grid: {}", kind, msg);
                    grids.remove(kind);
                }
                Err(e) => return Err(e),
            }
        }

        let accounting_enabled = if self.accounting_requested {
            match decoder.set_accounting_enabled(true) {
                Ok(()) => true,
                Err(Error::Unsupported(msg)) => {
                    warn!("Bit accounting unavailable: {}", msg);
                    false
                }
                Err(e) => return Err(e),
            }
        } else {
            false
        };

        Ok(Negotiated {
            decoder,
            info,
            geometry,
            grids,
            accounting_enabled,
        })
    }

    fn commit(&mut self, negotiated: Negotiated) {
        self.decoder = Some(negotiated.decoder);
        self.info = Some(negotiated.info);
        self.geometry = Some(negotiated.geometry);
        self.side = SideData {
            grids: negotiated.grids,
            accounting: AccountingLog::new(),
        };
        self.accounting_enabled = negotiated.accounting_enabled;
        self.picture = None;
        self.picture_count = 0;
        self.state = SessionState::Ready;
    }

    /// Decode the next picture
    ///
    /// Returns [`Error::EndOfStream`] once the source is drained; the previous
    /// picture stays available. A packet the decoder rejects moves the session
    /// to [`SessionState::Failed`].
    pub fn step(&mut self) -> Result<&Picture> {
        match self.state {
            SessionState::Ready => {}
            SessionState::Exhausted => return Err(Error::EndOfStream),
            SessionState::Failed => {
                return Err(Error::invalid_state("Session failed, restart required"))
            }
            state => return Err(Error::invalid_state(format!("Cannot step a session that is {}", state))),
        }
        self.state = SessionState::Stepping;

        match self.decode_next() {
            Ok(picture) => {
                self.picture = Some(picture);
                self.picture_count += 1;
                self.state = SessionState::Ready;
                debug!("Decoded picture {}", self.picture_count - 1);
                self.picture
                    .as_ref()
                    .ok_or_else(|| Error::invalid_state("No picture decoded"))
            }
            Err(Error::EndOfStream) => {
                info!("End of stream after {} pictures", self.picture_count);
                self.state = SessionState::Exhausted;
                Err(Error::EndOfStream)
            }
            Err(e) => {
                warn!("Decoding failed at picture {}: {}", self.picture_count, e);
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    fn decode_next(&mut self) -> Result<Picture> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| Error::invalid_state("No container reader"))?;
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| Error::invalid_state("No decoder"))?;

        // A failed step must not leave a half-written log behind
        let previous = std::mem::take(&mut self.side.accounting);
        let result = loop {
            match decoder.receive_picture(&mut self.side) {
                Ok(picture) => break Ok(picture),
                Err(Error::TryAgain) => {}
                Err(e) => break Err(e),
            }
            match reader.read_packet() {
                Ok(packet) => {
                    if let Err(e) = decoder.send_packet(&packet) {
                        break Err(e);
                    }
                }
                Err(e) => break Err(e),
            }
        };
        if result.is_err() {
            self.side.accounting = previous;
        }
        result
    }

    /// Rewind the source and negotiate again; the picture count returns to zero
    pub fn restart(&mut self) -> Result<()> {
        let mut reader = self
            .reader
            .take()
            .ok_or_else(|| Error::invalid_state("Cannot restart a session that was never opened"))?;
        self.decoder = None;
        self.state = SessionState::AwaitingHeaders;
        let result = reader.rewind().and_then(|()| self.negotiate(&mut reader));
        match result {
            Ok(negotiated) => {
                info!("Restarted {}", reader.source().name());
                self.reader = Some(reader);
                self.commit(negotiated);
                Ok(())
            }
            Err(e) => {
                warn!("Restart failed: {}", e);
                self.close();
                Err(e)
            }
        }
    }

    /// Drop the decoder, the reader and every buffer
    pub fn close(&mut self) {
        self.reader = None;
        self.decoder = None;
        self.info = None;
        self.geometry = None;
        self.side = SideData::default();
        self.picture = None;
        self.picture_count = 0;
        self.accounting_enabled = false;
        self.state = SessionState::Empty;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The most recently decoded picture
    pub fn picture(&self) -> Option<&Picture> {
        self.picture.as_ref()
    }

    /// Pictures decoded since the last open or restart
    pub fn picture_count(&self) -> u64 {
        self.picture_count
    }

    /// 0-based index of the current picture
    pub fn picture_index(&self) -> Option<u64> {
        self.picture_count.checked_sub(1)
    }

    pub fn info(&self) -> Option<&StreamInfo> {
        self.info.as_ref()
    }

    pub fn geometry(&self) -> Option<&FrameGeometry> {
        self.geometry.as_ref()
    }

    /// Metadata grids of the current picture
    pub fn grids(&self) -> &MetadataGrids {
        &self.side.grids
    }

    /// Accounting log of the current picture
    pub fn accounting(&self) -> &AccountingLog {
        &self.side.accounting
    }

    /// Whether the decoder agreed to produce accounting logs
    pub fn accounting_enabled(&self) -> bool {
        self.accounting_enabled
    }

    /// Name of the open byte source
    pub fn source_name(&self) -> Option<String> {
        self.reader.as_ref().map(|r| r.source().name())
    }
}
