//! Per-picture metadata grids
//!
//! Each grid stores one value per fixed-size spatial unit of the padded frame.
//! Extents are derived from the frame geometry when a stream's dimensions are
//! established and never change afterwards.
//!
//! | grid        | unit          | value                                   |
//! |-------------|---------------|-----------------------------------------|
//! | block size  | 8x8 pixels    | `d`, block edge is `4 << d`             |
//! | band flags  | 4x4 pixels    | bit `2b` skip, bit `2b+1` no-reference  |
//! | deringing   | 64x64 pixels  | level 0..5                              |
//! | motion      | 8x8 vertices  | [`MvGridPoint`]                         |

use super::picture::FrameGeometry;
use super::{LOG_BSIZE0, LOG_DERING_CELL, LOG_MVBSIZE_MIN};
use crate::error::{try_alloc, Result};
use std::fmt;

/// Dense 2D container with explicit extent and stride
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    stride: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid<T> {
    /// Allocate a `width`x`height` grid filled with `T::default()`
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let data = try_alloc(width.saturating_mul(height), T::default())?;
        Ok(Grid {
            width,
            height,
            stride: width,
            data,
        })
    }

    /// Reset every entry to `T::default()`
    pub fn clear(&mut self) {
        self.fill(T::default());
    }

    /// Set every entry to `value`
    pub fn fill(&mut self, value: T) {
        for v in self.data.iter_mut() {
            *v = value.clone();
        }
    }
}

impl<T> Grid<T> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Entry at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.width && y < self.height {
            self.data.get(y * self.stride + x)
        } else {
            None
        }
    }

    /// Mutable entry at column `x`, row `y`
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        if x < self.width && y < self.height {
            self.data.get_mut(y * self.stride + x)
        } else {
            None
        }
    }

    /// Store `value` at (`x`, `y`); returns false when out of bounds
    pub fn set(&mut self, x: usize, y: usize, value: T) -> bool {
        match self.get_mut(x, y) {
            Some(v) => {
                *v = value;
                true
            }
            None => false,
        }
    }

    /// All entries in row-major order
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

/// Motion-vector grid vertex
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MvGridPoint {
    /// Forward displacement in 1/8 pel
    pub mv: [i32; 2],
    /// Backward displacement in 1/8 pel
    pub mv1: [i32; 2],
    /// The vertex carries a coded vector
    pub valid: bool,
    /// Reference selector (0..7)
    pub reference: u8,
}

/// The kinds of grid a decoder can be asked to fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridKind {
    BlockSize,
    BandFlags,
    Dering,
    MotionVectors,
}

impl GridKind {
    pub const ALL: [GridKind; 4] = [
        GridKind::BlockSize,
        GridKind::BandFlags,
        GridKind::Dering,
        GridKind::MotionVectors,
    ];

    /// Grid width and height for a padded frame
    pub fn extent(self, geometry: &FrameGeometry) -> (usize, usize) {
        let (fw, fh) = (geometry.frame_width, geometry.frame_height);
        let cells = |shift: usize| (div_ceil(fw, 1 << shift), div_ceil(fh, 1 << shift));
        match self {
            GridKind::BlockSize => cells(LOG_BSIZE0 + 1),
            GridKind::BandFlags => cells(LOG_BSIZE0),
            GridKind::Dering => cells(LOG_DERING_CELL),
            GridKind::MotionVectors => {
                let (w, h) = cells(LOG_MVBSIZE_MIN);
                (w + 1, h + 1)
            }
        }
    }
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GridKind::BlockSize => "block-size",
            GridKind::BandFlags => "band-flag",
            GridKind::Dering => "deringing",
            GridKind::MotionVectors => "motion-vector",
        };
        f.write_str(name)
    }
}

fn div_ceil(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// The four metadata grids of a session
///
/// A grid is `None` when the decoder declined to fill it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataGrids {
    pub block_size: Option<Grid<u8>>,
    pub band_flags: Option<Grid<u32>>,
    pub dering: Option<Grid<u8>>,
    pub motion: Option<Grid<MvGridPoint>>,
}

impl MetadataGrids {
    /// Allocate every grid for `geometry`, zero-filled
    pub fn allocate(geometry: &FrameGeometry) -> Result<Self> {
        let extent = |kind: GridKind| kind.extent(geometry);
        let (bw, bh) = extent(GridKind::BlockSize);
        let (fw, fh) = extent(GridKind::BandFlags);
        let (dw, dh) = extent(GridKind::Dering);
        let (mw, mh) = extent(GridKind::MotionVectors);
        Ok(MetadataGrids {
            block_size: Some(Grid::new(bw, bh)?),
            band_flags: Some(Grid::new(fw, fh)?),
            dering: Some(Grid::new(dw, dh)?),
            motion: Some(Grid::new(mw, mh)?),
        })
    }

    /// Whether the grid of `kind` is present
    pub fn has(&self, kind: GridKind) -> bool {
        match kind {
            GridKind::BlockSize => self.block_size.is_some(),
            GridKind::BandFlags => self.band_flags.is_some(),
            GridKind::Dering => self.dering.is_some(),
            GridKind::MotionVectors => self.motion.is_some(),
        }
    }

    /// Drop the grid of `kind`
    pub fn remove(&mut self, kind: GridKind) {
        match kind {
            GridKind::BlockSize => self.block_size = None,
            GridKind::BandFlags => self.band_flags = None,
            GridKind::Dering => self.dering = None,
            GridKind::MotionVectors => self.motion = None,
        }
    }

    /// Block-size code for the 4x4 unit at (`bx`, `by`)
    pub fn block_size_at(&self, bx: usize, by: usize) -> Option<u8> {
        self.block_size.as_ref()?.get(bx >> 1, by >> 1).copied()
    }

    /// Band flags stored at the 4x4 unit (`bx`, `by`)
    pub fn band_flags_at(&self, bx: usize, by: usize) -> Option<u32> {
        self.band_flags.as_ref()?.get(bx, by).copied()
    }

    /// Deringing level of the cell covering pixel (`x`, `y`)
    pub fn dering_at(&self, x: usize, y: usize) -> Option<u8> {
        self.dering
            .as_ref()?
            .get(x >> LOG_DERING_CELL, y >> LOG_DERING_CELL)
            .copied()
    }

    /// Motion-vector grid vertex (`vx`, `vy`)
    pub fn motion_at(&self, vx: usize, vy: usize) -> Option<&MvGridPoint> {
        self.motion.as_ref()?.get(vx, vy)
    }
}
