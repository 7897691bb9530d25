//! ZVA - frame-by-frame video stream analyzer
//!
//! ZVA decodes a video stream carried in an Ogg container one picture at a
//! time and renders diagnostic overlays on top of each decoded picture:
//! transform block structure, motion partitions, skipped and unreferenced
//! frequency bands, deringing strength and a per-pixel bit-cost heat map.
//!
//! # Architecture
//!
//! - `format`: Ogg container reading and writing, byte sources
//! - `codec`: decoder capability traits, pictures, metadata grids, accounting
//! - `analyzer`: decode session, bit distribution, compositing and navigation
//! - `util`: buffers and color conversion
//!
//! Bitstream decoding itself is supplied by a [`codec::VideoCodec`]
//! implementation; an uncompressed reference codec ships in [`codec::raw`].

pub mod analyzer;
pub mod codec;
pub mod error;
pub mod format;
pub mod util;

pub use analyzer::{Analyzer, AnalyzerConfig};
pub use error::{Error, Result};

/// ZVA version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Configuration for the ZVA library
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Enable verbose logging
    pub verbose: bool,
    /// Enable debug output
    pub debug: bool,
}

/// Initialize the ZVA library with the given configuration
///
/// Installs a `tracing` subscriber when verbose or debug output is requested.
/// `RUST_LOG` overrides the level chosen here.
pub fn init(config: Config) -> Result<()> {
    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| Error::Init(format!("Failed to initialize logging: {}", e)))?;
    }

    Ok(())
}
