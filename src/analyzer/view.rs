//! Overlay toggles, zoom and symbol filter

use super::bits::SymbolFilter;
use crate::util::PlaneMask;

/// Smallest zoom factor
pub const MIN_ZOOM: usize = 1;
/// Largest zoom factor
pub const MAX_ZOOM: usize = 4;

/// What the compositor draws
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub zoom: usize,
    pub show_blocks: bool,
    pub show_motion: bool,
    pub show_skip: bool,
    pub show_noref: bool,
    pub show_padding: bool,
    pub show_bits: bool,
    pub show_dering: bool,
    pub planes: PlaneMask,
    pub filter: SymbolFilter,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            zoom: MIN_ZOOM,
            show_blocks: false,
            show_motion: false,
            show_skip: false,
            show_noref: false,
            show_padding: false,
            show_bits: false,
            show_dering: false,
            planes: PlaneMask::ALL,
            filter: SymbolFilter::default(),
        }
    }
}

impl ViewState {
    /// Whether `zoom` is a supported zoom factor
    pub fn zoom_in_range(zoom: usize) -> bool {
        (MIN_ZOOM..=MAX_ZOOM).contains(&zoom)
    }

    /// Turn every overlay off and every plane on; zoom and padding are kept
    pub fn clear_overlays(&mut self) {
        self.show_blocks = false;
        self.show_motion = false;
        self.show_skip = false;
        self.show_noref = false;
        self.show_bits = false;
        self.show_dering = false;
        self.planes = PlaneMask::ALL;
    }

    /// Whether the band-flag overlay is active
    pub fn shows_bands(&self) -> bool {
        self.show_skip || self.show_noref
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let view = ViewState::default();
        assert_eq!(view.zoom, 1);
        assert_eq!(view.planes, PlaneMask::ALL);
        assert!(view.filter.is_empty());
        assert!(!view.shows_bands());
    }

    #[test]
    fn test_zoom_range() {
        assert!(!ViewState::zoom_in_range(0));
        assert!(ViewState::zoom_in_range(1));
        assert!(ViewState::zoom_in_range(4));
        assert!(!ViewState::zoom_in_range(5));
    }

    #[test]
    fn test_clear_overlays() {
        let mut view = ViewState {
            zoom: 3,
            show_blocks: true,
            show_noref: true,
            show_padding: true,
            planes: PlaneMask::LUMA,
            ..Default::default()
        };
        assert!(view.shows_bands());
        view.clear_overlays();
        assert!(!view.show_blocks && !view.shows_bands());
        assert_eq!(view.planes, PlaneMask::ALL);
        assert_eq!(view.zoom, 3);
        assert!(view.show_padding);
    }
}
