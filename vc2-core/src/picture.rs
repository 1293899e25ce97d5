//! Picture and frame containers.
//!
//! A [`Picture`] is one coded image: a luma plane plus, depending on the
//! chroma format, two chroma planes. A [`Frame`] is what the decoder emits:
//! one picture for progressive material, or two spatially interleaved field
//! pictures for interlaced material.

use crate::array::Array2D;

/// Chroma subsampling of a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaFormat {
    /// 4:4:4 — chroma at full resolution.
    C444,
    /// 4:2:2 — chroma at half horizontal resolution.
    C422,
    /// 4:2:0 — chroma at half resolution in both axes.
    C420,
    /// Luma only.
    Mono,
}

impl ChromaFormat {
    /// Horizontal chroma shift (log2 of the horizontal divisor).
    pub fn x_shift(&self) -> usize {
        match self {
            ChromaFormat::C444 => 0,
            ChromaFormat::C422 | ChromaFormat::C420 => 1,
            ChromaFormat::Mono => 0,
        }
    }

    /// Vertical chroma shift (log2 of the vertical divisor).
    pub fn y_shift(&self) -> usize {
        match self {
            ChromaFormat::C444 | ChromaFormat::C422 => 0,
            ChromaFormat::C420 => 1,
            ChromaFormat::Mono => 0,
        }
    }

    /// Whether the format carries chroma planes at all.
    pub fn has_chroma(&self) -> bool {
        !matches!(self, ChromaFormat::Mono)
    }

    /// Parse from the coded colour-difference format index.
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(ChromaFormat::C444),
            1 => Some(ChromaFormat::C422),
            2 => Some(ChromaFormat::C420),
            3 => Some(ChromaFormat::Mono),
            _ => None,
        }
    }

    /// The coded colour-difference format index.
    pub fn index(&self) -> u32 {
        match self {
            ChromaFormat::C444 => 0,
            ChromaFormat::C422 => 1,
            ChromaFormat::C420 => 2,
            ChromaFormat::Mono => 3,
        }
    }
}

/// Dimensions and chroma format of a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureFormat {
    /// Luma width in samples.
    pub width: usize,
    /// Luma height in samples.
    pub height: usize,
    /// Chroma subsampling.
    pub chroma: ChromaFormat,
}

impl PictureFormat {
    /// Create a picture format.
    pub fn new(width: usize, height: usize, chroma: ChromaFormat) -> Self {
        Self {
            width,
            height,
            chroma,
        }
    }

    /// Chroma plane width.
    pub fn chroma_width(&self) -> usize {
        if self.chroma.has_chroma() {
            self.width >> self.chroma.x_shift()
        } else {
            0
        }
    }

    /// Chroma plane height.
    pub fn chroma_height(&self) -> usize {
        if self.chroma.has_chroma() {
            self.height >> self.chroma.y_shift()
        } else {
            0
        }
    }
}

/// One picture: a luma plane and (optionally) two chroma planes.
///
/// Pictures own their planes and move by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    format: PictureFormat,
    /// Luma plane.
    pub y: Array2D,
    /// Blue-difference chroma plane (empty for mono).
    pub cb: Array2D,
    /// Red-difference chroma plane (empty for mono).
    pub cr: Array2D,
}

impl Picture {
    /// Create a zero-filled picture.
    pub fn new(format: PictureFormat) -> Self {
        let cw = format.chroma_width();
        let ch = format.chroma_height();
        Self {
            format,
            y: Array2D::new(format.width, format.height),
            cb: Array2D::new(cw, ch),
            cr: Array2D::new(cw, ch),
        }
    }

    /// The picture's format.
    pub fn format(&self) -> PictureFormat {
        self.format
    }

    /// Clamp every sample to the signed range of the given bit depths.
    pub fn clip(&mut self, luma_depth: u32, chroma_depth: u32) {
        let y_max = (1 << (luma_depth - 1)) - 1;
        self.y.clip(-(y_max + 1), y_max);
        if self.format.chroma.has_chroma() {
            let c_max = (1 << (chroma_depth - 1)) - 1;
            self.cb.clip(-(c_max + 1), c_max);
            self.cr.clip(-(c_max + 1), c_max);
        }
    }
}

/// A decoded frame: one progressive picture, or two interlaced fields
/// already interleaved into frame-height planes.
///
/// The spatial layout is always top-field rows on even lines; the
/// `top_field_first` flag records which field comes first in time.
#[derive(Debug, Clone)]
pub struct Frame {
    format: PictureFormat,
    interlaced: bool,
    top_field_first: bool,
    picture: Picture,
}

impl Frame {
    /// Create an empty frame.
    pub fn new(format: PictureFormat, interlaced: bool, top_field_first: bool) -> Self {
        Self {
            format,
            interlaced,
            top_field_first,
            picture: Picture::new(format),
        }
    }

    /// Create a progressive frame from a full picture.
    pub fn progressive(picture: Picture) -> Self {
        Self {
            format: picture.format(),
            interlaced: false,
            top_field_first: false,
            picture,
        }
    }

    /// The frame's format.
    pub fn format(&self) -> PictureFormat {
        self.format
    }

    /// Whether the frame was coded as two fields.
    pub fn is_interlaced(&self) -> bool {
        self.interlaced
    }

    /// Whether the top field is first in time.
    pub fn top_field_first(&self) -> bool {
        self.top_field_first
    }

    /// The frame's full-height picture.
    pub fn picture(&self) -> &Picture {
        &self.picture
    }

    /// Replace the frame's full-height picture.
    pub fn set_picture(&mut self, picture: Picture) {
        debug_assert_eq!(picture.format(), self.format);
        self.picture = picture;
    }

    /// Store the temporally first field.
    pub fn set_first_field(&mut self, field: &Picture) {
        self.set_field(field, self.top_field_first);
    }

    /// Store the temporally second field.
    pub fn set_second_field(&mut self, field: &Picture) {
        self.set_field(field, !self.top_field_first);
    }

    /// Extract the temporally first field as a half-height picture.
    pub fn first_field(&self) -> Picture {
        self.field(self.top_field_first)
    }

    /// Extract the temporally second field as a half-height picture.
    pub fn second_field(&self) -> Picture {
        self.field(!self.top_field_first)
    }

    /// Clamp every sample to the signed range of the given bit depths.
    pub fn clip(&mut self, luma_depth: u32, chroma_depth: u32) {
        self.picture.clip(luma_depth, chroma_depth);
    }

    fn set_field(&mut self, field: &Picture, top: bool) {
        let offset = if top { 0 } else { 1 };
        copy_field_rows(&mut self.picture.y, &field.y, offset, true);
        if self.format.chroma.has_chroma() {
            copy_field_rows(&mut self.picture.cb, &field.cb, offset, true);
            copy_field_rows(&mut self.picture.cr, &field.cr, offset, true);
        }
    }

    fn field(&self, top: bool) -> Picture {
        let field_format = PictureFormat::new(self.format.width, self.format.height / 2, self.format.chroma);
        let mut out = Picture::new(field_format);
        let offset = if top { 0 } else { 1 };
        copy_field_rows(&mut out.y, &self.picture.y, offset, false);
        if self.format.chroma.has_chroma() {
            copy_field_rows(&mut out.cb, &self.picture.cb, offset, false);
            copy_field_rows(&mut out.cr, &self.picture.cr, offset, false);
        }
        out
    }
}

/// Copy rows between a full-height plane and a half-height field plane.
///
/// `into_frame` selects the direction; `offset` is 0 for the top field,
/// 1 for the bottom.
fn copy_field_rows(dst: &mut Array2D, src: &Array2D, offset: usize, into_frame: bool) {
    let field_rows = if into_frame { src.height() } else { dst.height() };
    for fy in 0..field_rows {
        if into_frame {
            dst.row_mut(fy * 2 + offset).copy_from_slice(src.row(fy));
        } else {
            dst.row_mut(fy).copy_from_slice(src.row(fy * 2 + offset));
        }
    }
}
