//! Per-symbol bit accounting produced by the decoder

use std::fmt;

/// Layer tag of frame-level symbols
pub const LAYER_FRAME: u8 = 10;
/// Layer tag of motion-vector symbols
pub const LAYER_MOTION: u8 = 11;

/// Coding layer a symbol belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Transform/residual coefficients of plane 0..=3
    Plane(u8),
    /// Frame-level syntax
    Frame,
    /// Motion vectors
    MotionVectors,
    /// Any tag the analyzer does not know
    Other(u8),
}

impl Layer {
    pub fn from_tag(tag: u8) -> Layer {
        match tag {
            0..=3 => Layer::Plane(tag),
            LAYER_FRAME => Layer::Frame,
            LAYER_MOTION => Layer::MotionVectors,
            other => Layer::Other(other),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Layer::Plane(p) => p,
            Layer::Frame => LAYER_FRAME,
            Layer::MotionVectors => LAYER_MOTION,
            Layer::Other(t) => t,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Plane(p) => write!(f, "plane {}", p),
            Layer::Frame => write!(f, "frame"),
            Layer::MotionVectors => write!(f, "motion"),
            Layer::Other(t) => write!(f, "layer {}", t),
        }
    }
}

/// One coded symbol and what it cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountingSymbol {
    /// Index into the symbol-type dictionary
    pub id: usize,
    /// Raw layer tag, see [`Layer::from_tag`]
    pub layer: u8,
    /// Spatial level
    pub level: u8,
    /// Grid column (4-pixel units for planes, 8-pixel vertices for motion)
    pub x: i32,
    /// Grid row
    pub y: i32,
    /// Cost in eighths of a bit
    pub bits_q3: u32,
}

impl AccountingSymbol {
    pub fn layer(&self) -> Layer {
        Layer::from_tag(self.layer)
    }
}

/// Symbol-type dictionary plus the ordered symbol records of one picture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountingLog {
    pub dictionary: Vec<String>,
    pub symbols: Vec<AccountingSymbol>,
}

impl AccountingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record and dictionary entry
    pub fn clear(&mut self) {
        self.dictionary.clear();
        self.symbols.clear();
    }

    /// Dictionary index of `name`, adding it if missing
    pub fn intern(&mut self, name: &str) -> usize {
        match self.dictionary.iter().position(|s| s == name) {
            Some(id) => id,
            None => {
                self.dictionary.push(name.to_string());
                self.dictionary.len() - 1
            }
        }
    }

    /// Record a symbol of type `name`
    pub fn record(&mut self, name: &str, layer: u8, level: u8, x: i32, y: i32, bits_q3: u32) {
        let id = self.intern(name);
        self.symbols.push(AccountingSymbol {
            id,
            layer,
            level,
            x,
            y,
            bits_q3,
        });
    }

    /// Name of symbol type `id`
    pub fn name(&self, id: usize) -> Option<&str> {
        self.dictionary.get(id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Sum of all symbol costs, in eighths of a bit
    pub fn total_bits_q3(&self) -> u64 {
        self.symbols.iter().map(|s| s.bits_q3 as u64).sum()
    }
}
