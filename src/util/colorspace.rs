//! Color space conversion and overlay palettes
//!
//! Everything here is a pure function from a sample (or a scalar overlay
//! value) to color components, so the compositor stays a thin per-pixel loop
//! and each mapping can be tested on its own.
//!
//! ## Conversion
//!
//! [`ycbcr_to_rgb`] is an exact fixed-point YCbCr to RGB conversion with a
//! 16-bit intermediate result. It is integer-only: the same input always
//! yields the same RGB triple on every platform.
//!
//! ## Palettes
//!
//! - skip / no-reference band classification ([`band_chroma`])
//! - bit-cost colorwheel ([`heat_map_chroma`])
//! - deringing strength ([`dering_chroma`])

use std::f64::consts::PI;
use std::fmt;

/// Neutral chroma value
pub const CHROMA_NEUTRAL: i64 = 128;

/// Number of deringing strength levels
pub const DERING_LEVELS: usize = 6;

/// Display names of the deringing palette entries
pub const DERING_COLOR_NAMES: [&str; DERING_LEVELS] =
    ["Green", "Light Blue", "Blue", "Gray", "Pink", "Red"];

/// Filter gain applied at each deringing level
pub const DERING_GAINS: [f64; DERING_LEVELS] = [0.0, 0.5, 0.707, 1.0, 1.41, 2.0];

const DERING_CR: [u8; DERING_LEVELS] = [96, 92, 119, 128, 160, 255];
const DERING_CB: [u8; DERING_LEVELS] = [96, 255, 160, 128, 128, 128];

const RGB_DIVISOR: i64 = 9_745_792_000;
const Y_COEF: i64 = 2_916_394_880_000;
const CR_TO_R: i64 = 4_490_222_169_144;
const CB_TO_G: i64 = 534_117_096_223;
const CR_TO_G: i64 = 1_334_761_232_047;
const CB_TO_B: i64 = 5_290_866_304_968;

/// Set of visible color planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneMask(u8);

impl PlaneMask {
    pub const NONE: PlaneMask = PlaneMask(0);
    pub const LUMA: PlaneMask = PlaneMask(1 << 0);
    pub const CB: PlaneMask = PlaneMask(1 << 1);
    pub const CR: PlaneMask = PlaneMask(1 << 2);
    pub const ALL: PlaneMask = PlaneMask(0b111);

    /// Check whether every plane in `other` is visible
    pub fn contains(self, other: PlaneMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Return this mask with `other` shown or hidden
    pub fn with(self, other: PlaneMask, visible: bool) -> PlaneMask {
        if visible {
            PlaneMask(self.0 | other.0)
        } else {
            PlaneMask(self.0 & !other.0)
        }
    }

    /// Raw bit representation
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl Default for PlaneMask {
    fn default() -> Self {
        PlaneMask::ALL
    }
}

/// RGB color (8-bit per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Create a new RGB color
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Convert to array [r, g, b]
    pub fn to_array(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// YCbCr sample triple as seen by the compositor
///
/// Components are kept wide so overlays can push them out of range before the
/// conversion clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Yuv {
    pub y: i64,
    pub u: i64,
    pub v: i64,
}

impl Yuv {
    /// Create a new YCbCr triple
    pub fn new(y: i64, u: i64, v: i64) -> Self {
        Yuv { y, u, v }
    }
}

impl fmt::Display for Yuv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Y:{},U:{},V:{}", self.y, self.u, self.v)
    }
}

/// Divide rounding half away from zero (`y` must be positive)
pub fn div_round(x: i64, y: i64) -> i64 {
    let half = y >> 1;
    if x < 0 {
        (x - half) / y
    } else {
        (x + half) / y
    }
}

/// Convert one YCbCr sample to RGB
///
/// Hidden luma is replaced by mid gray, hidden chroma by neutral chroma.
pub fn ycbcr_to_rgb(sample: Yuv, visible: PlaneMask) -> Rgb {
    let y = if visible.contains(PlaneMask::LUMA) {
        sample.y - 16
    } else {
        128
    };
    let cb = if visible.contains(PlaneMask::CB) {
        sample.u - CHROMA_NEUTRAL
    } else {
        0
    };
    let cr = if visible.contains(PlaneMask::CR) {
        sample.v - CHROMA_NEUTRAL
    } else {
        0
    };

    let r = div_round(Y_COEF * y + CR_TO_R * cr, RGB_DIVISOR);
    let g = div_round(Y_COEF * y - CB_TO_G * cb - CR_TO_G * cr, RGB_DIVISOR);
    let b = div_round(Y_COEF * y + CB_TO_B * cb, RGB_DIVISOR);

    Rgb::new(to_u8(r), to_u8(g), to_u8(b))
}

fn to_u8(v16: i64) -> u8 {
    (v16.clamp(0, 65535) >> 8) as u8
}

/// Luma remap used to outline block and motion partitions
pub fn block_edge_luma(y: i64) -> i64 {
    if y > 50 {
        y >> 1
    } else {
        y + 15
    }
}

/// Pull a chroma value halfway toward neutral
pub fn desaturate(c: i64) -> i64 {
    (c + CHROMA_NEUTRAL) >> 1
}

/// Chroma for the skip / no-reference band overlay
///
/// `skip` and `noref` are the flag bits of the band; `show_skip` and
/// `show_noref` are the overlay toggles.
pub fn band_chroma(skip: bool, noref: bool, show_skip: bool, show_noref: bool) -> (i64, i64) {
    let skip = skip && show_skip;
    let noref = noref && show_noref;
    match (skip, noref) {
        (true, true) => (43, 21),
        (false, true) => (84, 255),
        (true, false) => (255, 107),
        (false, false) => (CHROMA_NEUTRAL, CHROMA_NEUTRAL),
    }
}

/// Chroma for the bit-cost heat map
///
/// `normalized` is the pixel's bit cost divided by the frame maximum. The
/// square root of it is walked around a colorwheel: the angle grows with the
/// scaled cost and so does the radius, as its square root.
pub fn heat_map_chroma(normalized: f64) -> (i64, i64) {
    let v = normalized.max(0.0).sqrt();
    let theta = 2.0 * PI * v;
    let radius = 1.2 * v.sqrt();
    let cb = CHROMA_NEUTRAL + (127.0 * radius * theta.cos()) as i64;
    let cr = CHROMA_NEUTRAL - (127.0 * radius * theta.sin()) as i64;
    (cb.clamp(0, 255), cr.clamp(0, 255))
}

/// Chroma for a deringing level; out-of-range levels use the strongest entry
pub fn dering_chroma(level: u8) -> (i64, i64) {
    let idx = (level as usize).min(DERING_LEVELS - 1);
    (DERING_CB[idx] as i64, DERING_CR[idx] as i64)
}

/// Filter gain for a deringing level
pub fn dering_gain(level: u8) -> f64 {
    DERING_GAINS[(level as usize).min(DERING_LEVELS - 1)]
}

/// One-line description of the deringing palette
pub fn dering_legend() -> String {
    DERING_COLOR_NAMES
        .iter()
        .zip(DERING_GAINS.iter())
        .map(|(name, gain)| format!("{} -> {:0.3}", name, gain))
        .collect::<Vec<_>>()
        .join(" ")
}
