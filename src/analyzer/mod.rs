//! Stream analysis: decoding session, bit accounting, overlays and navigation
//!
//! - `session`: container reader and decoder state machine
//! - `bits`: spreads per-symbol bit costs over pixels
//! - `compositor`: renders a picture and its overlays to RGB
//! - `navigator`: stepping, seeking and view changes on top of the above

pub mod bits;
pub mod compositor;
pub mod navigator;
pub mod session;
pub mod view;

pub use bits::{BitCostMap, BitDistributor, BitReport, SymbolFilter, SymbolTotal};
pub use compositor::Compositor;
pub use navigator::{Analyzer, ProbeStatus};
pub use session::{DecodeSession, SessionState};
pub use view::{ViewState, MAX_ZOOM, MIN_ZOOM};

use crate::error::{Error, Result};

/// Options an [`Analyzer`] is opened with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Ask the decoder for per-symbol bit accounting
    pub bit_accounting: bool,
    /// Initial zoom factor
    pub zoom: usize,
    /// Start with the padded area visible
    pub show_padding: bool,
    /// Initial symbol filter
    pub filter: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bit_accounting: false,
            zoom: MIN_ZOOM,
            show_padding: false,
            filter: String::new(),
        }
    }
}

impl AnalyzerConfig {
    /// Check option ranges
    pub fn validate(&self) -> Result<()> {
        if !ViewState::zoom_in_range(self.zoom) {
            return Err(Error::Config(format!(
                "Zoom must be between {} and {}, got {}",
                MIN_ZOOM, MAX_ZOOM, self.zoom
            )));
        }
        Ok(())
    }
}
