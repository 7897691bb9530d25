//! Bit-accounting distribution
//!
//! Symbol costs are recorded once per coding block or motion-vector vertex.
//! To draw them as a heat map each record's cost is spread over the pixels it
//! influences:
//!
//! - residual planes (layers 0-3): a uniform square of side `4 << level`
//!   anchored at `(4x, 4y)`
//! - motion vectors, even level: a bilinear tent of half-width
//!   `n = 64 >> (level / 2)` centered on vertex `(8x, 8y)`
//! - motion vectors, odd level: a flat box of half-width
//!   `n = 64 >> ((level + 1) / 2)` around the vertex
//!
//! Frame-level and unknown layers count toward the totals but are not drawn.
//!
//! Spreading is clipped at the padded frame. Mass that falls outside is lost,
//! not renormalized, so records near the border deposit less than their cost.

use crate::codec::{AccountingLog, AccountingSymbol, FrameGeometry, Layer};
use crate::error::{try_alloc, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Comma-separated, case-insensitive substring filter over symbol names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolFilter {
    text: String,
    tokens: Vec<String>,
}

impl SymbolFilter {
    pub fn new(text: &str) -> Self {
        let tokens = text
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        SymbolFilter {
            text: text.to_string(),
            tokens,
        }
    }

    /// The filter as the user wrote it
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when every symbol passes
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether `name` contains at least one token
    pub fn matches(&self, name: &str) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        let name = name.to_lowercase();
        self.tokens.iter().any(|t| name.contains(t.as_str()))
    }
}

/// Estimated bit cost per padded-frame pixel, in eighths of a bit
#[derive(Debug, Clone, PartialEq)]
pub struct BitCostMap {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl BitCostMap {
    /// Allocate a zeroed map covering the padded frame
    pub fn new(geometry: &FrameGeometry) -> Result<Self> {
        let data = try_alloc(geometry.frame_pixels(), 0.0)?;
        Ok(BitCostMap {
            width: geometry.frame_width,
            height: geometry.frame_height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Value at pixel (`x`, `y`), zero outside the frame
    pub fn get(&self, x: usize, y: usize) -> f64 {
        if x < self.width && y < self.height {
            self.data[y * self.width + x]
        } else {
            0.0
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Sum over every pixel
    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Largest value inside the top-left `width`x`height` area
    pub fn max_in(&self, width: usize, height: usize) -> f64 {
        let w = width.min(self.width);
        (0..height.min(self.height))
            .flat_map(|y| self.data[y * self.width..y * self.width + w].iter())
            .fold(0.0, |m, &v| if v > m { v } else { m })
    }

    fn clear(&mut self) {
        for v in self.data.iter_mut() {
            *v = 0.0;
        }
    }

    /// Add `weight(x, y)` to every pixel of the clipped rectangle
    /// `[x0, x1] x [y0, y1]`; returns the mass deposited
    fn deposit<F>(&mut self, x0: i64, x1: i64, y0: i64, y1: i64, weight: F) -> f64
    where
        F: Fn(i64, i64) -> f64,
    {
        let x0 = x0.max(0);
        let y0 = y0.max(0);
        let x1 = x1.min(self.width as i64 - 1);
        let y1 = y1.min(self.height as i64 - 1);
        let mut mass = 0.0;
        for y in y0..=y1 {
            let row = y as usize * self.width;
            for x in x0..=x1 {
                let w = weight(x, y);
                self.data[row + x as usize] += w;
                mass += w;
            }
        }
        mass
    }

    /// Spread one record; returns the mass deposited
    fn spread(&mut self, sym: &AccountingSymbol) -> f64 {
        let cost = sym.bits_q3 as f64;
        let (x, y) = (sym.x as i64, sym.y as i64);
        match sym.layer() {
            Layer::Plane(_) => {
                let side = 4.0 * 2f64.powi(sym.level as i32);
                let per_pixel = cost / (side * side);
                let (x0, y0) = (4 * x, 4 * y);
                // Clip the extent before converting back to an integer
                let last = (side - 1.0).min((self.width.max(self.height)) as f64) as i64;
                self.deposit(x0, x0 + last, y0, y0 + last, |_, _| per_pixel)
            }
            Layer::MotionVectors if sym.level % 2 == 0 => {
                let n = 64i64.checked_shr(sym.level as u32 / 2).unwrap_or(0);
                if n == 0 {
                    return 0.0;
                }
                let (cx, cy) = (8 * x, 8 * y);
                let n4 = (n * n * n * n) as f64;
                self.deposit(cx - (n - 1), cx + (n - 1), cy - (n - 1), cy + (n - 1), |px, py| {
                    cost * ((n - (px - cx).abs()) * (n - (py - cy).abs())) as f64 / n4
                })
            }
            Layer::MotionVectors => {
                let n = 64i64.checked_shr((sym.level as u32 + 1) / 2).unwrap_or(0);
                let (cx, cy) = (8 * x, 8 * y);
                let side = (2 * n + 1) as f64;
                let per_pixel = cost / (side * side);
                self.deposit(cx - n, cx + n, cy - n, cy + n, |_, _| per_pixel)
            }
            Layer::Frame | Layer::Other(_) => 0.0,
        }
    }
}

/// Per-symbol-type line of a [`BitReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolTotal {
    pub name: String,
    pub bits: f64,
    pub percent_of_total: f64,
    pub percent_of_filtered: f64,
}

/// Bit totals of one picture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitReport {
    /// Picture index
    pub frame: u64,
    pub filter: String,
    /// Symbol types that passed the filter, in dictionary order
    pub symbols: Vec<SymbolTotal>,
    /// Largest contributing symbol type
    pub largest: Option<String>,
    pub bits_total: f64,
    pub bits_filtered: f64,
    pub filtered_percent: f64,
    /// Change of `bits_filtered` since the previous report with any bits,
    /// including reports made before a restart
    pub delta: f64,
    pub nb_syms: usize,
    /// Mass deposited in the map, in bits
    pub bpp_total: f64,
}

impl BitReport {
    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidData(format!("JSON serialization failed: {}", e)))
    }

    /// Convert to compact JSON string
    pub fn to_json_compact(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::InvalidData(format!("JSON serialization failed: {}", e)))
    }

    /// Text table; the largest contributor is highlighted with ANSI red when
    /// `color` is set
    pub fn to_table(&self, color: bool) -> String {
        let mut out = format!(
            "=== Frame: {:<3} ============= Bits  Total %   Filt % ====\n",
            self.frame
        );
        if self.bits_total == 0.0 {
            return out;
        }
        for s in &self.symbols {
            let highlight = color && self.largest.as_deref() == Some(s.name.as_str());
            if highlight {
                out.push_str("\x1b[1;31m");
            }
            out.push_str(&format!(
                "{:>20} = {:>10.3}  {:>5.2} %  {:>5.2} %\n",
                s.name, s.bits, s.percent_of_total, s.percent_of_filtered
            ));
            if highlight {
                out.push_str("\x1b[0m");
            }
        }
        out.push_str(&format!("{:>20} = {:>10.3}\n", "bits_total", self.bits_total));
        out.push_str(&format!(
            "{:>20} = {:>10.3} {:>6.2} %   delta: {:+.3}\n",
            "bits_filtered", self.bits_filtered, self.filtered_percent, self.delta
        ));
        out.push_str(&format!("{:>20} = {:>10}\n", "nb_syms", self.nb_syms));
        out.push_str(&format!("{:>20} = {:>10.3}\n", "bpp_total", self.bpp_total));
        out
    }
}

impl fmt::Display for BitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_table(false))
    }
}

/// Turns accounting logs into bit-cost maps and reports
#[derive(Debug, Clone)]
pub struct BitDistributor {
    map: BitCostMap,
    last_filtered_q3: f64,
}

impl BitDistributor {
    pub fn new(geometry: &FrameGeometry) -> Result<Self> {
        Ok(BitDistributor {
            map: BitCostMap::new(geometry)?,
            last_filtered_q3: 0.0,
        })
    }

    /// Whether the map covers the padded frame of `geometry`
    pub fn fits(&self, geometry: &FrameGeometry) -> bool {
        self.map.width == geometry.frame_width && self.map.height == geometry.frame_height
    }

    /// The map computed by the last [`distribute`](Self::distribute)
    pub fn map(&self) -> &BitCostMap {
        &self.map
    }

    /// Recompute the map from `log` and report the totals
    pub fn distribute(&mut self, log: &AccountingLog, filter: &SymbolFilter, frame: u64) -> BitReport {
        self.map.clear();
        if !filter.is_empty() {
            debug!("Filtering: {}", filter.text());
        }

        let types = log
            .symbols
            .iter()
            .map(|s| s.id + 1)
            .max()
            .unwrap_or(0)
            .max(log.dictionary.len());
        let mut totals_q3 = vec![0u64; types];
        let mut bits_total = 0u64;
        let mut bits_filtered = 0u64;
        let mut mass = 0.0;

        for sym in &log.symbols {
            bits_total += sym.bits_q3 as u64;
            if !filter.is_empty() && !filter.matches(log.name(sym.id).unwrap_or("")) {
                continue;
            }
            bits_filtered += sym.bits_q3 as u64;
            totals_q3[sym.id] += sym.bits_q3 as u64;
            mass += self.map.spread(sym);
        }

        // First maximum wins
        let mut largest = None;
        let mut largest_q3 = 0;
        for (id, &t) in totals_q3.iter().enumerate() {
            if t > largest_q3 {
                largest_q3 = t;
                largest = Some(id);
            }
        }

        let name = |id: usize| {
            log.name(id)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("#{}", id))
        };
        let percent = |part: u64, whole: u64| {
            if whole == 0 {
                0.0
            } else {
                part as f64 / whole as f64 * 100.0
            }
        };
        let symbols = totals_q3
            .iter()
            .enumerate()
            .filter(|(_, &t)| t > 0)
            .map(|(id, &t)| SymbolTotal {
                name: name(id),
                bits: t as f64 / 8.0,
                percent_of_total: percent(t, bits_total),
                percent_of_filtered: percent(t, bits_filtered),
            })
            .collect();

        let report = BitReport {
            frame,
            filter: filter.text().to_string(),
            symbols,
            largest: largest.map(name),
            bits_total: bits_total as f64 / 8.0,
            bits_filtered: bits_filtered as f64 / 8.0,
            filtered_percent: percent(bits_filtered, bits_total),
            delta: (bits_filtered as f64 - self.last_filtered_q3) / 8.0,
            nb_syms: log.symbols.len(),
            bpp_total: mass / 8.0,
        };
        if bits_total > 0 {
            self.last_filtered_q3 = bits_filtered as f64;
        }
        debug!("\n{}", report);
        report
    }
}
