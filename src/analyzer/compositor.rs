//! Overlay compositor
//!
//! Maps a decoded picture plus its metadata grids and bit-cost map to a zoomed
//! RGB buffer. Overlays are applied per pixel in a fixed order, later ones
//! overriding earlier substitutions:
//!
//! 1. skip / no-reference bands
//! 2. bit-cost heat map
//! 3. deringing palette
//! 4. transform block edges
//! 5. motion-compensation partitions
//! 6. padding checkerboard

use super::bits::BitCostMap;
use super::view::{ViewState, MAX_ZOOM, MIN_ZOOM};
use crate::codec::{
    FrameGeometry, MetadataGrids, Picture, LOG_BSIZE0, LOG_MVBSIZE_MAX, LOG_MVBSIZE_MIN, NBSIZES,
};
use crate::error::{try_alloc, Error, Result};
use crate::util::colorspace::{
    band_chroma, block_edge_luma, dering_chroma, desaturate, heat_map_chroma, ycbcr_to_rgb,
    CHROMA_NEUTRAL,
};
use crate::util::{PlaneMask, Rgb, Yuv};
use tracing::{debug, warn};

/// Frequency band of offset (`u`, `v`) inside a transform block; `None` for DC
pub fn band_index(u: usize, v: usize) -> Option<u8> {
    let band = match (u, v) {
        (0, 0) => return None,
        (u, v) if u < 4 && v < 4 => 0,
        (u, v) if u < 8 && v < 2 => 1,
        (u, v) if u < 2 && v < 8 => 2,
        (u, v) if u < 8 && v < 8 => 3,
        (u, v) if u < 16 && v < 4 => 4,
        (u, v) if u < 4 && v < 16 => 5,
        (u, v) if u < 16 && v < 16 => 6,
        (u, v) if u < 32 && v < 8 => 7,
        (u, v) if u < 8 && v < 32 => 8,
        (u, v) if u < 32 && v < 32 => 9,
        (u, v) if u < 64 && v < 16 => 10,
        (u, v) if u < 16 && v < 64 => 11,
        _ => 12,
    };
    Some(band)
}

/// Zoomed RGB rendering of the current picture
#[derive(Debug, Clone)]
pub struct Compositor {
    view: ViewState,
    geometry: Option<FrameGeometry>,
    pixels: Vec<u8>,
    width: usize,
    height: usize,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(ViewState::default())
    }
}

impl Compositor {
    /// Create a compositor; no buffer exists until a geometry is set
    pub fn new(view: ViewState) -> Self {
        Compositor {
            view,
            geometry: None,
            pixels: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn geometry(&self) -> Option<&FrameGeometry> {
        self.geometry.as_ref()
    }

    /// RGB bytes, row-major, three per pixel
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Display width and height
    pub fn display_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Width and height of the decoded area shown (before zoom)
    pub fn decode_size(&self) -> (usize, usize) {
        match &self.geometry {
            Some(g) => (
                g.decode_width(self.view.show_padding),
                g.decode_height(self.view.show_padding),
            ),
            None => (0, 0),
        }
    }

    /// Establish the frame geometry and allocate the display buffer
    pub fn set_geometry(&mut self, geometry: FrameGeometry) -> Result<()> {
        let (w, h) = display_extent(
            geometry.decode_width(self.view.show_padding),
            geometry.decode_height(self.view.show_padding),
            self.view.zoom,
        )?;
        self.reallocate(w, h)?;
        self.geometry = Some(geometry);
        Ok(())
    }

    /// Change the zoom factor
    ///
    /// Out-of-range values fail without changing anything; the current value is
    /// a no-op.
    pub fn set_zoom(&mut self, zoom: usize) -> Result<()> {
        if !ViewState::zoom_in_range(zoom) {
            return Err(Error::invalid_input(format!(
                "Zoom {} outside {}..={}",
                zoom, MIN_ZOOM, MAX_ZOOM
            )));
        }
        if zoom == self.view.zoom {
            return Ok(());
        }
        let (dw, dh) = self.decode_size();
        let (w, h) = display_extent(dw, dh, zoom)?;
        self.reallocate(w, h)?;
        self.view.zoom = zoom;
        Ok(())
    }

    /// Show or hide the padded area; resizes the display buffer
    pub fn set_show_padding(&mut self, show: bool) -> Result<()> {
        if show == self.view.show_padding {
            return Ok(());
        }
        if let Some(g) = self.geometry {
            let (w, h) = display_extent(g.decode_width(show), g.decode_height(show), self.view.zoom)?;
            self.reallocate(w, h)?;
        }
        self.view.show_padding = show;
        Ok(())
    }

    pub fn set_show_blocks(&mut self, show: bool) {
        self.view.show_blocks = show;
    }

    pub fn set_show_motion(&mut self, show: bool) {
        self.view.show_motion = show;
    }

    pub fn set_show_skip(&mut self, show: bool) {
        self.view.show_skip = show;
    }

    pub fn set_show_noref(&mut self, show: bool) {
        self.view.show_noref = show;
    }

    pub fn set_show_bits(&mut self, show: bool) {
        self.view.show_bits = show;
    }

    pub fn set_show_dering(&mut self, show: bool) {
        self.view.show_dering = show;
    }

    /// Show or hide color planes
    pub fn set_plane_visible(&mut self, planes: PlaneMask, visible: bool) {
        self.view.planes = self.view.planes.with(planes, visible);
    }

    /// Replace the symbol filter; returns whether it changed
    pub fn set_filter(&mut self, text: &str) -> bool {
        if self.view.filter.text() == text {
            return false;
        }
        self.view.filter = super::bits::SymbolFilter::new(text);
        true
    }

    /// Clear overlays and filter, hide padding and show every plane
    pub fn reset_view(&mut self) -> Result<()> {
        self.set_show_padding(false)?;
        self.view.clear_overlays();
        self.set_filter("");
        Ok(())
    }

    fn reallocate(&mut self, width: usize, height: usize) -> Result<()> {
        let len = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(3))
            .ok_or(Error::OutOfMemory { bytes: usize::MAX })?;
        let pixels = try_alloc(len, 0u8).map_err(|e| {
            warn!("Could not allocate a {}x{} display buffer", width, height);
            e
        })?;
        debug!("Display buffer {}x{}", width, height);
        self.pixels = pixels;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Render `picture` with the active overlays into the display buffer
    pub fn render(&mut self, picture: &Picture, grids: &MetadataGrids, bits: Option<&BitCostMap>) -> Result<()> {
        let geometry = self
            .geometry
            .ok_or_else(|| Error::invalid_state("Compositor has no frame geometry"))?;
        let (dw, dh) = self.decode_size();
        let zoom = self.view.zoom;
        let (w, h) = display_extent(dw, dh, zoom)?;
        if (w, h) != self.display_size() {
            self.reallocate(w, h)?;
        }

        let bits = bits.filter(|_| self.view.show_bits);
        let norm = bits.map(|map| 1.0 / (1e-4 + map.max_in(dw, dh)));
        let stride = self.width * 3;

        for j in 0..dh {
            for i in 0..dw {
                let rgb = self.shade(picture, grids, bits.zip(norm), &geometry, i, j);
                let px = rgb.to_array();
                for v in 0..zoom {
                    let row = (j * zoom + v) * stride;
                    for u in 0..zoom {
                        let at = row + (i * zoom + u) * 3;
                        self.pixels[at..at + 3].copy_from_slice(&px);
                    }
                }
            }
        }
        Ok(())
    }

    /// Color of decoded pixel (`i`, `j`) with every active overlay applied
    pub fn shade(
        &self,
        picture: &Picture,
        grids: &MetadataGrids,
        bits: Option<(&BitCostMap, f64)>,
        geometry: &FrameGeometry,
        i: usize,
        j: usize,
    ) -> Rgb {
        let view = &self.view;
        let Yuv { mut y, mut u, mut v } = picture.sample(i, j);
        let mut mask = view.planes;
        let block = grids
            .block_size_at(i >> LOG_BSIZE0, j >> LOG_BSIZE0)
            .map(|d| (d as usize).min(NBSIZES - 1));

        if view.shows_bands() && grids.band_flags.is_some() {
            if let Some(d) = block {
                let size = 1usize << (d + LOG_BSIZE0);
                let (bx, by) = (i & !(size - 1), j & !(size - 1));
                let flags = grids
                    .band_flags_at(bx >> LOG_BSIZE0, by >> LOG_BSIZE0)
                    .unwrap_or(0);
                u = CHROMA_NEUTRAL;
                v = CHROMA_NEUTRAL;
                mask = PlaneMask::ALL;
                if let Some(band) = band_index(i & (size - 1), j & (size - 1)) {
                    let skip = (flags >> (2 * band)) & 1 != 0;
                    let noref = (flags >> (2 * band + 1)) & 1 != 0;
                    (u, v) = band_chroma(skip, noref, view.show_skip, view.show_noref);
                }
            }
        }

        if let Some((map, norm)) = bits {
            (u, v) = heat_map_chroma(map.get(i, j) * norm);
        }

        if view.show_dering {
            if let Some(level) = grids.dering_at(i, j) {
                (u, v) = dering_chroma(level);
            }
        }

        if view.show_blocks {
            if let Some(d) = block {
                let edge = (1usize << (d + LOG_BSIZE0)) - 1;
                if i & edge == 0 || j & edge == 0 {
                    y = block_edge_luma(y);
                    u = desaturate(u);
                    v = desaturate(v);
                    mask = PlaneMask::ALL;
                }
            }
        }

        if view.show_motion && grids.motion.is_some() && on_motion_partition(grids, i, j) {
            y = block_edge_luma(y);
            u = 255;
        }

        if i >= geometry.pic_width || j >= geometry.pic_height {
            y = 255 * ((i + j) & 1) as i64;
            u = CHROMA_NEUTRAL;
            v = CHROMA_NEUTRAL;
            mask = PlaneMask::ALL;
        }

        ycbcr_to_rgb(Yuv::new(y, u, v), mask)
    }
}

/// Zoomed display size, or `OutOfMemory` when it does not fit in `usize`
fn display_extent(width: usize, height: usize, zoom: usize) -> Result<(usize, usize)> {
    match (width.checked_mul(zoom), height.checked_mul(zoom)) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(Error::OutOfMemory { bytes: usize::MAX }),
    }
}

/// Walk outward from the finest motion partition boundary through coarser
/// ones; true when an enclosing partition's center vertex is valid
fn on_motion_partition(grids: &MetadataGrids, i: usize, j: usize) -> bool {
    let mut mask = !((1usize << LOG_MVBSIZE_MIN) - 1);
    let mut level = LOG_MVBSIZE_MIN;
    while i == (i & mask) || j == (j & mask) {
        mask <<= 1;
        let mid = 1usize << level;
        level += 1;
        let vx = ((i & mask) + mid) >> LOG_MVBSIZE_MIN;
        let vy = ((j & mask) + mid) >> LOG_MVBSIZE_MIN;
        if grids.motion_at(vx, vy).map_or(false, |p| p.valid) {
            return true;
        }
        if level > LOG_MVBSIZE_MAX {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Grid, MvGridPoint};

    const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };
    const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    fn setup(w: usize, h: usize, align: usize) -> (Compositor, Picture, MetadataGrids, FrameGeometry) {
        let g = FrameGeometry::with_alignment(w, h, align).unwrap();
        let picture = Picture::new(&g, 1, 1).unwrap();
        let grids = MetadataGrids::allocate(&g).unwrap();
        let mut c = Compositor::default();
        c.set_geometry(g).unwrap();
        (c, picture, grids, g)
    }

    fn pixel(c: &Compositor, x: usize, y: usize) -> Rgb {
        let at = (y * c.width + x) * 3;
        Rgb::new(c.pixels[at], c.pixels[at + 1], c.pixels[at + 2])
    }

    #[test]
    fn test_band_index() {
        assert_eq!(band_index(0, 0), None);
        assert_eq!(band_index(3, 3), Some(0));
        assert_eq!(band_index(7, 1), Some(1));
        assert_eq!(band_index(1, 7), Some(2));
        assert_eq!(band_index(7, 7), Some(3));
        assert_eq!(band_index(15, 3), Some(4));
        assert_eq!(band_index(3, 15), Some(5));
        assert_eq!(band_index(15, 15), Some(6));
        assert_eq!(band_index(31, 7), Some(7));
        assert_eq!(band_index(7, 31), Some(8));
        assert_eq!(band_index(31, 31), Some(9));
        assert_eq!(band_index(63, 15), Some(10));
        assert_eq!(band_index(15, 63), Some(11));
        assert_eq!(band_index(63, 63), Some(12));
    }

    #[test]
    fn test_zoom_bounds() {
        let (mut c, ..) = setup(16, 8, 8);
        assert_eq!(c.display_size(), (16, 8));
        assert!(c.set_zoom(0).is_err());
        assert!(c.set_zoom(5).is_err());
        assert_eq!(c.view().zoom, 1);
        assert_eq!(c.pixels().len(), 16 * 8 * 3);

        c.set_zoom(1).unwrap();
        c.set_zoom(3).unwrap();
        assert_eq!(c.display_size(), (48, 24));
        assert_eq!(c.pixels().len(), 48 * 24 * 3);
    }

    #[test]
    fn test_padding_resizes() {
        let (mut c, ..) = setup(6, 6, 8);
        assert_eq!(c.display_size(), (6, 6));
        c.set_show_padding(true).unwrap();
        assert_eq!(c.display_size(), (8, 8));
        c.set_zoom(2).unwrap();
        assert_eq!(c.display_size(), (16, 16));
        c.reset_view().unwrap();
        assert_eq!(c.display_size(), (12, 12));
    }

    #[test]
    fn test_failed_resize_keeps_state() {
        let huge = FrameGeometry::with_alignment(1, 1, 1 << 40).unwrap();
        let mut c = Compositor::default();
        c.set_geometry(huge).unwrap();
        assert_eq!(c.display_size(), (1, 1));
        c.pixels[..3].copy_from_slice(&[1, 2, 3]);

        let err = c.set_show_padding(true).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { .. }));
        assert!(!c.view().show_padding);
        assert_eq!(c.view().zoom, 1);
        assert_eq!(c.display_size(), (1, 1));
        assert_eq!(c.pixels(), &[1u8, 2, 3]);

        // The picture-sized buffer still resizes normally
        c.set_zoom(2).unwrap();
        assert_eq!(c.display_size(), (2, 2));
    }

    #[test]
    fn test_failed_geometry_keeps_previous() {
        let (mut c, ..) = setup(16, 8, 8);
        let huge = FrameGeometry::with_alignment(1 << 40, 1 << 40, 1).unwrap();
        assert!(matches!(c.set_geometry(huge), Err(Error::OutOfMemory { .. })));
        assert_eq!(c.geometry().map(|g| g.pic_width), Some(16));
        assert_eq!(c.display_size(), (16, 8));
        assert_eq!(c.pixels().len(), 16 * 8 * 3);
    }

    #[test]
    fn test_display_extent_overflow() {
        assert_eq!(display_extent(64, 32, 4).unwrap(), (256, 128));
        assert!(matches!(
            display_extent(usize::MAX / 2 + 1, 1, 2),
            Err(Error::OutOfMemory { .. })
        ));
        assert!(matches!(
            display_extent(1, usize::MAX, 4),
            Err(Error::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_padding_checkerboard() {
        let (mut c, mut picture, grids, _) = setup(6, 6, 8);
        for y in 0..8 {
            for v in picture.planes[0].row_mut(y).iter_mut() {
                *v = 128;
            }
        }
        c.set_show_padding(true).unwrap();
        c.render(&picture, &grids, None).unwrap();
        let interior = ycbcr_to_rgb(Yuv::new(128, 128, 128), PlaneMask::ALL);
        for y in 0..8 {
            for x in 0..8 {
                let expected = if x < 6 && y < 6 {
                    interior
                } else if (x + y) % 2 == 1 {
                    WHITE
                } else {
                    BLACK
                };
                assert_eq!(pixel(&c, x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_uniform_block_edges() {
        let (mut c, picture, mut grids, _) = setup(64, 64, 64);
        // d = 1: 8x8 blocks everywhere
        grids.block_size.as_mut().unwrap().fill(1);
        c.set_show_blocks(true);
        c.render(&picture, &grids, None).unwrap();
        let plain = ycbcr_to_rgb(Yuv::new(128, 128, 128), PlaneMask::ALL);
        let edge = ycbcr_to_rgb(Yuv::new(64, 128, 128), PlaneMask::ALL);
        for y in 0..64 {
            for x in 0..64 {
                let expected = if x % 8 == 0 || y % 8 == 0 { edge } else { plain };
                assert_eq!(pixel(&c, x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_missing_grid_draws_nothing() {
        let (mut c, picture, mut grids, _) = setup(16, 16, 16);
        grids.block_size = None;
        c.set_show_blocks(true);
        c.set_show_skip(true);
        c.render(&picture, &grids, None).unwrap();
        let plain = ycbcr_to_rgb(Yuv::new(128, 128, 128), PlaneMask::ALL);
        assert!(c.pixels().chunks(3).all(|p| p == plain.to_array()));
    }

    #[test]
    fn test_skip_band_colors() {
        let (mut c, picture, mut grids, g) = setup(64, 64, 64);
        grids.block_size.as_mut().unwrap().fill(0);
        // 4x4 block at pixel (4, 0): band 0 skipped
        grids.band_flags.as_mut().unwrap().set(1, 0, 0b01);
        c.set_show_skip(true);
        let skipped = c.shade(&picture, &grids, None, &g, 5, 1);
        assert_eq!(skipped, ycbcr_to_rgb(Yuv::new(128, 255, 107), PlaneMask::ALL));
        // DC position keeps neutral chroma
        let dc = c.shade(&picture, &grids, None, &g, 4, 0);
        assert_eq!(dc, ycbcr_to_rgb(Yuv::new(128, 128, 128), PlaneMask::ALL));
    }

    #[test]
    fn test_motion_walk() {
        let (mut c, picture, mut grids, g) = setup(64, 64, 64);
        c.set_show_motion(true);
        // Center vertex of the 16x16 partition at (16, 16)
        grids.motion.as_mut().unwrap().set(3, 3, MvGridPoint { valid: true, ..Default::default() });
        let marked = ycbcr_to_rgb(Yuv::new(64, 255, 128), PlaneMask::ALL);
        let plain = ycbcr_to_rgb(Yuv::new(128, 128, 128), PlaneMask::ALL);
        assert_eq!(c.shade(&picture, &grids, None, &g, 16, 20), marked);
        assert_eq!(c.shade(&picture, &grids, None, &g, 20, 16), marked);
        assert_eq!(c.shade(&picture, &grids, None, &g, 20, 20), plain);
        assert_eq!(c.shade(&picture, &grids, None, &g, 40, 16), plain);
    }

    #[test]
    fn test_dering_and_heat_map() {
        let (mut c, picture, mut grids, g) = setup(128, 64, 64);
        let mut dering: Grid<u8> = Grid::new(2, 1).unwrap();
        dering.set(1, 0, 5);
        grids.dering = Some(dering);
        c.set_show_dering(true);
        let red = c.shade(&picture, &grids, None, &g, 70, 3);
        assert_eq!(red, ycbcr_to_rgb(Yuv::new(128, 128, 255), PlaneMask::ALL));

        c.set_show_dering(false);
        let map = BitCostMap::new(&g).unwrap();
        let neutral = c.shade(&picture, &grids, Some((&map, 1.0)), &g, 70, 3);
        assert_eq!(neutral, ycbcr_to_rgb(Yuv::new(128, 128, 128), PlaneMask::ALL));
    }

    #[test]
    fn test_zoom_replication() {
        let (mut c, mut picture, grids, _) = setup(8, 8, 8);
        picture.planes[0].row_mut(0)[1] = 235;
        c.set_zoom(2).unwrap();
        c.render(&picture, &grids, None).unwrap();
        let bright = ycbcr_to_rgb(Yuv::new(235, 128, 128), PlaneMask::ALL);
        for (x, y) in [(2, 0), (3, 0), (2, 1), (3, 1)] {
            assert_eq!(pixel(&c, x, y), bright);
        }
        assert_ne!(pixel(&c, 4, 0), bright);
    }

    #[test]
    fn test_render_needs_geometry() {
        let mut c = Compositor::default();
        let g = FrameGeometry::with_alignment(8, 8, 8).unwrap();
        let picture = Picture::new(&g, 1, 1).unwrap();
        let result = c.render(&picture, &MetadataGrids::default(), None);
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }
}
