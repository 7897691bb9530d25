//! Decoder capability interface and the data a decoder hands back
//!
//! The analyzer never decodes bitstreams itself. A [`VideoCodec`] supplies a
//! header-negotiation object ([`DecoderSetup`]) which, once satisfied, creates
//! a [`VideoDecoder`]. Decoded pictures come back as [`Picture`]s; per-picture
//! side data (metadata grids and the accounting log) is written into a
//! session-owned [`SideData`].

pub mod accounting;
pub mod decoder;
pub mod grid;
pub mod picture;
pub mod raw;

pub use accounting::{AccountingLog, AccountingSymbol, Layer};
pub use decoder::{DecoderSetup, HeaderStatus, SideData, VideoCodec, VideoDecoder};
pub use grid::{Grid, GridKind, MetadataGrids, MvGridPoint};
pub use picture::{FrameGeometry, Picture, Plane, StreamInfo};
pub use raw::RawVideoCodec;

/// log2 of the smallest transform block edge (4x4)
pub const LOG_BSIZE0: usize = 2;
/// Number of transform block sizes (4x4 through 64x64)
pub const NBSIZES: usize = 5;
/// log2 of the largest transform block edge
pub const LOG_BSIZE_MAX: usize = LOG_BSIZE0 + NBSIZES - 1;
/// Largest transform block edge; frames are padded to a multiple of this
pub const BSIZE_MAX: usize = 1 << LOG_BSIZE_MAX;

/// Block-size grid entries along a superblock edge (one per 8x8 cell)
pub const BSIZE_GRID: usize = 1 << (NBSIZES - 2);
/// Band-flag grid entries along a superblock edge (one per 4x4 unit)
pub const FLAGS_GRID: usize = 1 << (NBSIZES - 1);

/// log2 of the deringing cell edge, in pixels
pub const LOG_DERING_CELL: usize = LOG_BSIZE0 + 4;

/// log2 of the smallest motion-compensation partition
pub const LOG_MVBSIZE_MIN: usize = 3;
/// log2 of the largest motion-compensation partition
pub const LOG_MVBSIZE_MAX: usize = 6;
/// Smallest motion-compensation partition edge
pub const MVBSIZE_MIN: usize = 1 << LOG_MVBSIZE_MIN;

/// Look up a codec implementation by name
pub fn find_codec(name: &str) -> Option<Box<dyn VideoCodec>> {
    match name {
        "raw" | "rawvideo" => Some(Box::new(RawVideoCodec)),
        _ => None,
    }
}
