//! The discrete wavelet transform.
//!
//! One level of the forward transform lifts every column, then every row,
//! then deinterleaves even/odd rows and columns into the four quadrant
//! subbands. The inverse runs the same machinery backwards. All arithmetic
//! is integer with arithmetic (floor) right shifts, so forward/inverse is
//! an exact identity for every kernel.

use vc2_core::array::Array2D;
use vc2_core::picture::{ChromaFormat, Picture, PictureFormat};

use crate::tables::{lifting_steps, LiftStep};
use crate::types::WaveletKernel;

/// Subband orientation within one decomposition level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subband {
    /// Low-pass in both axes (only at the coarsest level).
    Ll,
    /// High-pass horizontally.
    Hl,
    /// High-pass vertically.
    Lh,
    /// High-pass in both axes.
    Hh,
}

/// The position and size of one subband within a padded plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubbandRect {
    /// Decomposition level, `depth` for the DC band down to 1.
    pub level: u32,
    /// Orientation.
    pub band: Subband,
    /// Left edge within the padded plane.
    pub x0: usize,
    /// Top edge within the padded plane.
    pub y0: usize,
    /// Subband width.
    pub width: usize,
    /// Subband height.
    pub height: usize,
}

/// Round `size` up to a multiple of `2^depth`.
pub fn padded_size(size: usize, depth: u32) -> usize {
    let align = 1usize << depth;
    size.div_ceil(align) * align
}

/// Subband rectangles of a padded plane, in quantisation-matrix order:
/// the DC band first, then (HL, LH, HH) from the coarsest level to the
/// finest. `3 * depth + 1` entries.
pub fn subband_rects(padded_width: usize, padded_height: usize, depth: u32) -> Vec<SubbandRect> {
    let mut rects = Vec::with_capacity(3 * depth as usize + 1);
    rects.push(SubbandRect {
        level: depth,
        band: Subband::Ll,
        x0: 0,
        y0: 0,
        width: padded_width >> depth,
        height: padded_height >> depth,
    });
    for level in (1..=depth).rev() {
        let w = padded_width >> level;
        let h = padded_height >> level;
        for band in [Subband::Hl, Subband::Lh, Subband::Hh] {
            let (x0, y0) = match band {
                Subband::Hl => (w, 0),
                Subband::Lh => (0, h),
                Subband::Hh => (w, h),
                Subband::Ll => unreachable!(),
            };
            rects.push(SubbandRect {
                level,
                band,
                x0,
                y0,
                width: w,
                height: h,
            });
        }
    }
    rects
}

/// Padded transform-domain geometry for one picture.
///
/// Each component is padded independently to a multiple of `2^depth`, so
/// the chroma planes of a transform-domain picture may be larger than the
/// picture format's chroma fraction implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformFormat {
    /// The unpadded picture format.
    pub picture: PictureFormat,
    /// Transform depth.
    pub depth: u32,
    /// Padded luma dimensions (width, height).
    pub luma: (usize, usize),
    /// Padded chroma dimensions (width, height); (0, 0) for mono.
    pub chroma: (usize, usize),
}

impl TransformFormat {
    /// Compute the padded geometry for a picture format and depth.
    pub fn new(picture: PictureFormat, depth: u32) -> Self {
        let luma = (
            padded_size(picture.width, depth),
            padded_size(picture.height, depth),
        );
        let chroma = if picture.chroma.has_chroma() {
            (
                padded_size(picture.chroma_width(), depth),
                padded_size(picture.chroma_height(), depth),
            )
        } else {
            (0, 0)
        };
        Self {
            picture,
            depth,
            luma,
            chroma,
        }
    }

    /// A zero-filled coefficient picture with the padded plane sizes.
    pub fn coeff_picture(&self) -> Picture {
        let mut pic = Picture::new(PictureFormat::new(
            self.luma.0,
            self.luma.1,
            if self.picture.chroma.has_chroma() {
                ChromaFormat::C444
            } else {
                ChromaFormat::Mono
            },
        ));
        if self.picture.chroma.has_chroma() {
            pic.cb = Array2D::new(self.chroma.0, self.chroma.1);
            pic.cr = Array2D::new(self.chroma.0, self.chroma.1);
        }
        pic
    }

    /// Subband rectangles for the luma plane.
    pub fn luma_rects(&self) -> Vec<SubbandRect> {
        subband_rects(self.luma.0, self.luma.1, self.depth)
    }

    /// Subband rectangles for a chroma plane.
    pub fn chroma_rects(&self) -> Vec<SubbandRect> {
        subband_rects(self.chroma.0, self.chroma.1, self.depth)
    }
}

/// Mirror an index into `[0, n)` about the first and last samples
/// (`x[-k] = x[k]`, `x[n-1+k] = x[n-1-k]`). Preserves lattice parity for
/// even `n`.
fn reflect(index: i64, n: usize) -> usize {
    let n = n as i64;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * (n - 1) - i;
        } else {
            return i as usize;
        }
    }
}

/// Apply one lifting step to an interleaved signal, in place.
///
/// Each step only reads the lattice opposite to the one it writes, so no
/// scratch copy is needed.
fn apply_step(data: &mut [i32], step: &LiftStep, inverse: bool) {
    let n = data.len();
    if n < 2 {
        return;
    }
    let subtract = step.subtract ^ inverse;
    let mut target = if step.odd { 1 } else { 0 };
    while target < n {
        let mut sum = i64::from(step.round);
        for &(offset, weight) in step.taps {
            let idx = reflect(target as i64 + i64::from(offset), n);
            sum += i64::from(weight) * i64::from(data[idx]);
        }
        let delta = (sum >> step.shift) as i32;
        if subtract {
            data[target] -= delta;
        } else {
            data[target] += delta;
        }
        target += 2;
    }
}

/// Forward-lift a 1D signal in place (still interleaved afterwards).
fn lift_forward(data: &mut [i32], steps: &[LiftStep]) {
    for step in steps {
        apply_step(data, step, false);
    }
}

/// Inverse-lift a 1D signal in place.
fn lift_inverse(data: &mut [i32], steps: &[LiftStep]) {
    for step in steps.iter().rev() {
        apply_step(data, step, true);
    }
}

/// Move even rows/columns of the `w x h` region to the first halves and
/// odd ones to the second halves.
fn deinterleave(plane: &mut Array2D, w: usize, h: usize) {
    let mut tmp = Array2D::new(w, h);
    for y in 0..h {
        let dy = if y % 2 == 0 { y / 2 } else { h / 2 + y / 2 };
        for x in 0..w {
            let dx = if x % 2 == 0 { x / 2 } else { w / 2 + x / 2 };
            tmp[(dy, dx)] = plane[(y, x)];
        }
    }
    plane.blit(&tmp, 0, 0);
}

/// Inverse of [`deinterleave`].
fn interleave(plane: &mut Array2D, w: usize, h: usize) {
    let mut tmp = Array2D::new(w, h);
    for y in 0..h {
        let sy = if y % 2 == 0 { y / 2 } else { h / 2 + y / 2 };
        for x in 0..w {
            let sx = if x % 2 == 0 { x / 2 } else { w / 2 + x / 2 };
            tmp[(y, x)] = plane[(sy, sx)];
        }
    }
    plane.blit(&tmp, 0, 0);
}

/// One forward level over the top-left `w x h` region.
fn forward_level(plane: &mut Array2D, w: usize, h: usize, steps: &[LiftStep]) {
    let mut col = vec![0i32; h];
    for x in 0..w {
        for (y, v) in col.iter_mut().enumerate() {
            *v = plane[(y, x)];
        }
        lift_forward(&mut col, steps);
        for (y, v) in col.iter().enumerate() {
            plane[(y, x)] = *v;
        }
    }
    for y in 0..h {
        lift_forward(&mut plane.row_mut(y)[..w], steps);
    }
    deinterleave(plane, w, h);
}

/// One inverse level over the top-left `w x h` region.
fn inverse_level(plane: &mut Array2D, w: usize, h: usize, steps: &[LiftStep]) {
    interleave(plane, w, h);
    for y in 0..h {
        lift_inverse(&mut plane.row_mut(y)[..w], steps);
    }
    let mut col = vec![0i32; h];
    for x in 0..w {
        for (y, v) in col.iter_mut().enumerate() {
            *v = plane[(y, x)];
        }
        lift_inverse(&mut col, steps);
        for (y, v) in col.iter().enumerate() {
            plane[(y, x)] = *v;
        }
    }
}

fn shift_region(plane: &mut Array2D, w: usize, h: usize, shift: u32) {
    for y in 0..h {
        for v in &mut plane.row_mut(y)[..w] {
            *v <<= shift;
        }
    }
}

fn unshift_region(plane: &mut Array2D, w: usize, h: usize, shift: u32) {
    let round = 1 << (shift - 1);
    for y in 0..h {
        for v in &mut plane.row_mut(y)[..w] {
            *v = (*v + round) >> shift;
        }
    }
}

/// Multi-level forward transform of a padded plane, in place.
///
/// The plane's dimensions must be multiples of `2^depth`.
pub fn forward_plane(plane: &mut Array2D, depth: u32, kernel: WaveletKernel) {
    let steps = lifting_steps(kernel);
    let shift = kernel.filter_shift();
    for level in 0..depth {
        let w = plane.width() >> level;
        let h = plane.height() >> level;
        if shift > 0 {
            shift_region(plane, w, h, shift);
        }
        forward_level(plane, w, h, steps);
    }
}

/// Multi-level inverse transform of a padded plane, in place.
pub fn inverse_plane(plane: &mut Array2D, depth: u32, kernel: WaveletKernel) {
    let steps = lifting_steps(kernel);
    let shift = kernel.filter_shift();
    for level in (0..depth).rev() {
        let w = plane.width() >> level;
        let h = plane.height() >> level;
        inverse_level(plane, w, h, steps);
        if shift > 0 {
            unshift_region(plane, w, h, shift);
        }
    }
}

/// Extend a plane to padded dimensions by replicating the last row and
/// column.
fn pad_plane(src: &Array2D, width: usize, height: usize) -> Array2D {
    let mut out = Array2D::new(width, height);
    for y in 0..height {
        let sy = y.min(src.height().saturating_sub(1));
        let dst_row = out.row_mut(y);
        if src.width() > 0 {
            let src_row = src.row(sy);
            dst_row[..src.width()].copy_from_slice(src_row);
            let edge = src_row[src.width() - 1];
            for v in &mut dst_row[src.width()..] {
                *v = edge;
            }
        }
    }
    out
}

/// Forward-transform a picture into padded transform-domain coefficients.
pub fn forward_transform(
    picture: &Picture,
    format: &TransformFormat,
    kernel: WaveletKernel,
) -> Picture {
    let mut out = format.coeff_picture();
    out.y = pad_plane(&picture.y, format.luma.0, format.luma.1);
    forward_plane(&mut out.y, format.depth, kernel);
    if format.picture.chroma.has_chroma() {
        out.cb = pad_plane(&picture.cb, format.chroma.0, format.chroma.1);
        out.cr = pad_plane(&picture.cr, format.chroma.0, format.chroma.1);
        forward_plane(&mut out.cb, format.depth, kernel);
        forward_plane(&mut out.cr, format.depth, kernel);
    }
    out
}

/// Inverse-transform padded coefficients back to a picture, cropping the
/// padding away.
pub fn inverse_transform(
    coeffs: &Picture,
    format: &TransformFormat,
    kernel: WaveletKernel,
) -> Picture {
    let mut y = coeffs.y.clone();
    inverse_plane(&mut y, format.depth, kernel);

    let mut out = Picture::new(format.picture);
    out.y = y.window(0, format.picture.height, 0, format.picture.width);
    if format.picture.chroma.has_chroma() {
        let mut cb = coeffs.cb.clone();
        let mut cr = coeffs.cr.clone();
        inverse_plane(&mut cb, format.depth, kernel);
        inverse_plane(&mut cr, format.depth, kernel);
        let cw = format.picture.chroma_width();
        let ch = format.picture.chroma_height();
        out.cb = cb.window(0, ch, 0, cw);
        out.cr = cr.window(0, ch, 0, cw);
    }
    out
}
