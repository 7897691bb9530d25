//! Decoded pictures and frame geometry

use super::BSIZE_MAX;
use crate::error::{try_alloc, Error, Result};
use crate::util::Yuv;
use std::fmt;

/// Stream parameters established by header negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Codec name
    pub codec: String,
    /// Visible picture width
    pub pic_width: usize,
    /// Visible picture height
    pub pic_height: usize,
    /// log2 horizontal chroma subsampling
    pub chroma_xdec: u8,
    /// log2 vertical chroma subsampling
    pub chroma_ydec: u8,
    /// Frames are padded to a multiple of this
    pub alignment: usize,
}

impl StreamInfo {
    /// Stream info with the standard 64-pixel frame alignment
    pub fn new(codec: &str, pic_width: usize, pic_height: usize) -> Self {
        StreamInfo {
            codec: codec.to_string(),
            pic_width,
            pic_height,
            chroma_xdec: 1,
            chroma_ydec: 1,
            alignment: BSIZE_MAX,
        }
    }

    /// Padded frame geometry for this stream
    pub fn geometry(&self) -> Result<FrameGeometry> {
        FrameGeometry::with_alignment(self.pic_width, self.pic_height, self.alignment)
    }
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}x{} (chroma 1/{}x1/{}, align {})",
            self.codec,
            self.pic_width,
            self.pic_height,
            1 << self.chroma_xdec,
            1 << self.chroma_ydec,
            self.alignment
        )
    }
}

/// Picture size and the padded frame size derived from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub pic_width: usize,
    pub pic_height: usize,
    pub frame_width: usize,
    pub frame_height: usize,
}

impl FrameGeometry {
    /// Geometry with frames padded to the largest block size
    pub fn new(pic_width: usize, pic_height: usize) -> Result<Self> {
        Self::with_alignment(pic_width, pic_height, BSIZE_MAX)
    }

    /// Geometry with frames padded to a multiple of `alignment` (a power of two)
    pub fn with_alignment(pic_width: usize, pic_height: usize, alignment: usize) -> Result<Self> {
        if pic_width == 0 || pic_height == 0 {
            return Err(Error::invalid_input(format!(
                "Picture size {}x{} is empty",
                pic_width, pic_height
            )));
        }
        if !alignment.is_power_of_two() {
            return Err(Error::invalid_input(format!(
                "Frame alignment {} is not a power of two",
                alignment
            )));
        }
        let mask = alignment - 1;
        let frame_width = pic_width
            .checked_add(mask)
            .ok_or_else(|| Error::invalid_input("Picture width overflows"))?
            & !mask;
        let frame_height = pic_height
            .checked_add(mask)
            .ok_or_else(|| Error::invalid_input("Picture height overflows"))?
            & !mask;
        Ok(FrameGeometry {
            pic_width,
            pic_height,
            frame_width,
            frame_height,
        })
    }

    /// Whether the padded frame extends past the picture
    pub fn has_padding(&self) -> bool {
        self.frame_width > self.pic_width || self.frame_height > self.pic_height
    }

    /// Width of the area shown: the frame with padding, the picture without
    pub fn decode_width(&self, show_padding: bool) -> usize {
        if show_padding {
            self.frame_width
        } else {
            self.pic_width
        }
    }

    /// Height of the area shown
    pub fn decode_height(&self, show_padding: bool) -> usize {
        if show_padding {
            self.frame_height
        } else {
            self.pic_height
        }
    }

    /// Number of pixels in the padded frame, saturating at `usize::MAX`
    pub fn frame_pixels(&self) -> usize {
        self.frame_width.saturating_mul(self.frame_height)
    }
}

/// One color plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    /// Bytes between the starts of consecutive rows
    pub stride: usize,
    /// log2 horizontal subsampling relative to luma
    pub xdec: u8,
    /// log2 vertical subsampling relative to luma
    pub ydec: u8,
}

impl Plane {
    /// Allocate a plane covering a `frame_width`x`frame_height` luma area
    pub fn new(frame_width: usize, frame_height: usize, xdec: u8, ydec: u8, fill: u8) -> Result<Self> {
        let width = (frame_width + (1 << xdec) - 1) >> xdec;
        let height = (frame_height + (1 << ydec) - 1) >> ydec;
        let data = try_alloc(width * height, fill)?;
        Ok(Plane {
            data,
            width,
            height,
            stride: width,
            xdec,
            ydec,
        })
    }

    /// Sample covering luma position (x, y)
    pub fn sample(&self, x: usize, y: usize) -> u8 {
        let px = (x >> self.xdec).min(self.width.saturating_sub(1));
        let py = (y >> self.ydec).min(self.height.saturating_sub(1));
        self.data[py * self.stride + px]
    }

    /// Row `y` of the plane
    pub fn row(&self, y: usize) -> &[u8] {
        &self.data[y * self.stride..y * self.stride + self.width]
    }

    /// Mutable row `y` of the plane
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }
}

/// A decoded picture: Y, Cb and Cr planes covering the padded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub planes: [Plane; 3],
    /// Padded frame width
    pub width: usize,
    /// Padded frame height
    pub height: usize,
}

impl Picture {
    /// Allocate a mid-gray picture for `geometry`
    pub fn new(geometry: &FrameGeometry, chroma_xdec: u8, chroma_ydec: u8) -> Result<Self> {
        let (w, h) = (geometry.frame_width, geometry.frame_height);
        Ok(Picture {
            planes: [
                Plane::new(w, h, 0, 0, 128)?,
                Plane::new(w, h, chroma_xdec, chroma_ydec, 128)?,
                Plane::new(w, h, chroma_xdec, chroma_ydec, 128)?,
            ],
            width: w,
            height: h,
        })
    }

    pub fn luma(&self) -> &Plane {
        &self.planes[0]
    }

    pub fn cb(&self) -> &Plane {
        &self.planes[1]
    }

    pub fn cr(&self) -> &Plane {
        &self.planes[2]
    }

    /// Decoded Y, Cb, Cr values at luma position (x, y)
    pub fn sample(&self, x: usize, y: usize) -> Yuv {
        Yuv::new(
            self.planes[0].sample(x, y) as i64,
            self.planes[1].sample(x, y) as i64,
            self.planes[2].sample(x, y) as i64,
        )
    }
}
