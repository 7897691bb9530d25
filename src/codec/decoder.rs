//! Decoder capability traits

use super::accounting::AccountingLog;
use super::grid::{GridKind, MetadataGrids};
use super::picture::{Picture, StreamInfo};
use crate::error::Result;
use crate::format::Packet;

/// Outcome of feeding one header packet to a [`DecoderSetup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderStatus {
    /// More header packets are required
    NeedMore,
    /// All headers have been seen
    Complete(StreamInfo),
}

/// Side-channel output of one decode step
///
/// Owned by the session and lent to the decoder for the duration of
/// [`VideoDecoder::receive_picture`]. Only grids the decoder agreed to fill
/// are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideData {
    pub grids: MetadataGrids,
    pub accounting: AccountingLog,
}

/// A codec the analyzer can open streams of
pub trait VideoCodec {
    /// Codec name
    fn name(&self) -> &str;

    /// Start header negotiation for a new stream
    fn setup(&self) -> Box<dyn DecoderSetup>;
}

/// Header negotiation state
pub trait DecoderSetup {
    /// Feed one packet from the start of the stream
    ///
    /// An error means the stream cannot be decoded by this codec.
    fn header_in(&mut self, packet: &Packet) -> Result<HeaderStatus>;

    /// Create a decoder once negotiation is complete
    fn create_decoder(self: Box<Self>) -> Result<Box<dyn VideoDecoder>>;
}

/// A live decoder instance
pub trait VideoDecoder {
    /// Submit a compressed picture packet; an error is fatal for the stream
    fn send_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Take the next decoded picture, writing its side data into `side`
    ///
    /// Returns [`Error::TryAgain`](crate::Error::TryAgain) when more input is
    /// needed.
    fn receive_picture(&mut self, side: &mut SideData) -> Result<Picture>;

    /// Ask the decoder to fill the grid of `kind` with the given extent
    ///
    /// Returns [`Error::Unsupported`](crate::Error::Unsupported) when the
    /// decoder cannot provide it.
    fn register_grid(&mut self, kind: GridKind, width: usize, height: usize) -> Result<()>;

    /// Turn per-symbol accounting on or off
    fn set_accounting_enabled(&mut self, enabled: bool) -> Result<()>;
}
