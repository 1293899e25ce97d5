//! Slice (de)serialisation and slice/picture reordering.
//!
//! A slice is a rectangular tile of the transformed picture: within each
//! subband it owns the sub-rectangle given by floor-division bounds, and
//! its coefficients are stored subband by subband in quantisation-matrix
//! order. Two wire formats exist: fixed-size low-delay slices and
//! variable-size high-quality slices with per-component byte counts.

use vc2_core::array::Array2D;
use vc2_core::bitstream::{intlog2, BitReader, BitWriter};
use vc2_core::error::{CodecError, Error, Result};
use vc2_core::picture::Picture;

use crate::types::SliceProfile;
use crate::wavelet::{SubbandRect, TransformFormat};

/// Coefficients of one slice, per component, concatenated across subbands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceBlock {
    /// Luma coefficients.
    pub y: Vec<i32>,
    /// Cb coefficients (empty for mono).
    pub cb: Vec<i32>,
    /// Cr coefficients (empty for mono).
    pub cr: Vec<i32>,
}

/// A picture's worth of slices: the slice grid, per-slice quantiser
/// indices and per-slice coefficient blocks in raster order.
#[derive(Debug, Clone)]
pub struct Slices {
    /// Transform-domain geometry the slices tile.
    pub format: TransformFormat,
    /// Horizontal slice count.
    pub x_slices: usize,
    /// Vertical slice count.
    pub y_slices: usize,
    /// Per-slice quantiser indices (`y_slices` rows by `x_slices` columns).
    pub qindices: Array2D,
    /// Per-slice coefficient blocks in raster order.
    pub blocks: Vec<SliceBlock>,
}

impl Slices {
    /// Create an empty container for the given geometry.
    pub fn new(format: TransformFormat, x_slices: usize, y_slices: usize) -> Self {
        Self {
            format,
            x_slices,
            y_slices,
            qindices: Array2D::new(x_slices, y_slices),
            blocks: vec![SliceBlock::default(); x_slices * y_slices],
        }
    }
}

/// The sample positions a slice owns within one component, in coded order.
fn slice_positions(
    rects: &[SubbandRect],
    sx: usize,
    x_slices: usize,
    sy: usize,
    y_slices: usize,
) -> Vec<(usize, usize)> {
    let mut positions = Vec::new();
    for rect in rects {
        let y0 = rect.y0 + rect.height * sy / y_slices;
        let y1 = rect.y0 + rect.height * (sy + 1) / y_slices;
        let x0 = rect.x0 + rect.width * sx / x_slices;
        let x1 = rect.x0 + rect.width * (sx + 1) / x_slices;
        for y in y0..y1 {
            for x in x0..x1 {
                positions.push((y, x));
            }
        }
    }
    positions
}

/// Reorder per-slice blocks into contiguous subband regions of a full
/// transform-domain picture. Inverse of [`split_blocks`].
pub fn merge_blocks(slices: &Slices) -> Picture {
    let mut out = slices.format.coeff_picture();
    let luma_rects = slices.format.luma_rects();
    let chroma_rects = slices.format.chroma_rects();
    for sy in 0..slices.y_slices {
        for sx in 0..slices.x_slices {
            let block = &slices.blocks[sy * slices.x_slices + sx];
            for (i, (y, x)) in slice_positions(&luma_rects, sx, slices.x_slices, sy, slices.y_slices)
                .into_iter()
                .enumerate()
            {
                out.y[(y, x)] = block.y[i];
            }
            if slices.format.picture.chroma.has_chroma() {
                for (i, (y, x)) in
                    slice_positions(&chroma_rects, sx, slices.x_slices, sy, slices.y_slices)
                        .into_iter()
                        .enumerate()
                {
                    out.cb[(y, x)] = block.cb[i];
                    out.cr[(y, x)] = block.cr[i];
                }
            }
        }
    }
    out
}

/// Partition a full transform-domain picture into per-slice blocks.
/// Inverse of [`merge_blocks`].
pub fn split_blocks(
    coeffs: &Picture,
    format: &TransformFormat,
    x_slices: usize,
    y_slices: usize,
    qindices: Array2D,
) -> Slices {
    let mut slices = Slices::new(*format, x_slices, y_slices);
    slices.qindices = qindices;
    let luma_rects = format.luma_rects();
    let chroma_rects = format.chroma_rects();
    for sy in 0..y_slices {
        for sx in 0..x_slices {
            let block = &mut slices.blocks[sy * x_slices + sx];
            block.y = slice_positions(&luma_rects, sx, x_slices, sy, y_slices)
                .into_iter()
                .map(|(y, x)| coeffs.y[(y, x)])
                .collect();
            if format.picture.chroma.has_chroma() {
                let positions = slice_positions(&chroma_rects, sx, x_slices, sy, y_slices);
                block.cb = positions.iter().map(|&(y, x)| coeffs.cb[(y, x)]).collect();
                block.cr = positions.iter().map(|&(y, x)| coeffs.cr[(y, x)]).collect();
            }
        }
    }
    slices
}

/// The byte budget of every low-delay slice: slice `n` of `N` receives
/// `floor((n+1) * num / den) - floor(n * num / den)` bytes.
pub fn ld_slice_bytes(
    y_slices: usize,
    x_slices: usize,
    bytes_num: u32,
    bytes_den: u32,
) -> Array2D {
    let mut table = Array2D::new(x_slices, y_slices);
    let num = u64::from(bytes_num);
    let den = u64::from(bytes_den);
    for sy in 0..y_slices {
        for sx in 0..x_slices {
            let n = (sy * x_slices + sx) as u64;
            table[(sy, sx)] = (((n + 1) * num / den) - (n * num / den)) as i32;
        }
    }
    table
}

/// A bit source bounded at an absolute position; reads past the bound
/// return one-bits, so truncated variable-length codes decode as zero
/// coefficients (ST 2042-1 §10.5.3.2 bounded blocks).
struct BoundedBits<'r, 'a> {
    reader: &'r mut BitReader<'a>,
    end: usize,
}

impl<'r, 'a> BoundedBits<'r, 'a> {
    fn new(reader: &'r mut BitReader<'a>, len_bits: usize) -> Self {
        let end = reader.position() + len_bits;
        Self { reader, end }
    }

    fn read_bit(&mut self) -> Result<bool> {
        if self.reader.position() >= self.end {
            Ok(true)
        } else {
            self.reader.read_bit()
        }
    }

    fn read_uint(&mut self) -> Result<u32> {
        let mut value: u64 = 1;
        while !self.read_bit()? {
            value <<= 1;
            if self.read_bit()? {
                value |= 1;
            }
            if value > (1u64 << 32) {
                return Err(vc2_core::error::BitstreamError::ValueOverflow.into());
            }
        }
        Ok((value - 1) as u32)
    }

    fn read_sint(&mut self) -> Result<i32> {
        let magnitude = self.read_uint()? as i32;
        if magnitude != 0 && self.read_bit()? {
            Ok(-magnitude)
        } else {
            Ok(magnitude)
        }
    }

    /// Skip whatever remains up to the bound.
    fn finish(self) -> Result<()> {
        self.reader.seek_to(self.end)
    }
}

/// Drop trailing zero coefficients from the low-delay luma block.
///
/// Only the luma block may be truncated: its explicit bit length moves the
/// bound to the exact coded end, so the dropped coefficients are read past
/// the bound and reconstruct as zeros. Chroma and high-quality component
/// blocks are padded up to their bound, and padding inside a bound is not
/// coefficient data, so they must be written in full.
fn truncate_zeros(coeffs: &[i32]) -> &[i32] {
    let end = coeffs
        .iter()
        .rposition(|&c| c != 0)
        .map_or(0, |last| last + 1);
    &coeffs[..end]
}

/// Bits a coefficient sequence occupies when exp-Golomb coded.
fn coded_bits(coeffs: &[i32]) -> usize {
    let mut probe = BitWriter::new();
    for &c in coeffs {
        // Infallible: BitWriter only errors on misuse of byte APIs.
        let _ = probe.write_sint(c);
    }
    probe.position()
}

fn write_coeffs(writer: &mut BitWriter, coeffs: &[i32]) -> Result<()> {
    for &c in coeffs {
        writer.write_sint(c)?;
    }
    Ok(())
}

/// Read one picture's slices in the given profile.
pub fn read_slices(
    reader: &mut BitReader,
    format: &TransformFormat,
    x_slices: usize,
    y_slices: usize,
    profile: &SliceProfile,
) -> Result<Slices> {
    let mut slices = Slices::new(*format, x_slices, y_slices);
    let luma_rects = format.luma_rects();
    let chroma_rects = format.chroma_rects();
    let ld_bytes = match profile {
        SliceProfile::LowDelay {
            bytes_num,
            bytes_den,
        } => Some(ld_slice_bytes(y_slices, x_slices, *bytes_num, *bytes_den)),
        SliceProfile::HighQuality { .. } => None,
    };

    for sy in 0..y_slices {
        for sx in 0..x_slices {
            let block_index = sy * x_slices + sx;
            let luma_positions = slice_positions(&luma_rects, sx, x_slices, sy, y_slices);
            let chroma_positions = if format.picture.chroma.has_chroma() {
                slice_positions(&chroma_rects, sx, x_slices, sy, y_slices)
            } else {
                Vec::new()
            };

            match profile {
                SliceProfile::LowDelay { .. } => {
                    let budget_bytes = ld_bytes.as_ref().unwrap()[(sy, sx)] as usize;
                    if budget_bytes == 0 {
                        return Err(Error::Codec(CodecError::Other(format!(
                            "low-delay slice ({},{}) has no byte budget",
                            sx, sy
                        ))));
                    }
                    let budget_bits = budget_bytes * 8;
                    let start = reader.position();

                    let qindex = reader.read_bits(7)?;
                    let length_bits = intlog2(budget_bits as u64);
                    let y_length = reader.read_bits(length_bits)? as usize;
                    if 7 + length_bits as usize + y_length > budget_bits {
                        return Err(Error::Codec(CodecError::Other(format!(
                            "low-delay slice ({},{}): luma length {} exceeds slice budget",
                            sx, sy, y_length
                        ))));
                    }
                    slices.qindices[(sy, sx)] = qindex as i32;

                    let mut luma = BoundedBits::new(reader, y_length);
                    let mut y_coeffs = Vec::with_capacity(luma_positions.len());
                    for _ in 0..luma_positions.len() {
                        y_coeffs.push(luma.read_sint()?);
                    }
                    luma.finish()?;

                    let remaining = start + budget_bits - reader.position();
                    let mut chroma = BoundedBits::new(reader, remaining);
                    let mut cb_coeffs = Vec::with_capacity(chroma_positions.len());
                    let mut cr_coeffs = Vec::with_capacity(chroma_positions.len());
                    for _ in 0..chroma_positions.len() {
                        cb_coeffs.push(chroma.read_sint()?);
                        cr_coeffs.push(chroma.read_sint()?);
                    }
                    chroma.finish()?;

                    slices.blocks[block_index] = SliceBlock {
                        y: y_coeffs,
                        cb: cb_coeffs,
                        cr: cr_coeffs,
                    };
                }
                SliceProfile::HighQuality {
                    prefix_bytes,
                    size_scalar,
                } => {
                    reader.read_bytes(*prefix_bytes as usize)?;
                    let qindex = reader.read_bits(8)?;
                    if qindex > 127 {
                        return Err(Error::Codec(CodecError::QuantIndexRange { qindex }));
                    }
                    slices.qindices[(sy, sx)] = qindex as i32;

                    let mut components: [Vec<i32>; 3] = [Vec::new(), Vec::new(), Vec::new()];
                    let counts = [
                        luma_positions.len(),
                        chroma_positions.len(),
                        chroma_positions.len(),
                    ];
                    for (comp, count) in components.iter_mut().zip(counts) {
                        let size = reader.read_bits(8)? as usize * *size_scalar as usize;
                        let mut bits = BoundedBits::new(reader, size * 8);
                        comp.reserve(count);
                        for _ in 0..count {
                            comp.push(bits.read_sint()?);
                        }
                        bits.finish()?;
                    }
                    let [y, cb, cr] = components;
                    slices.blocks[block_index] = SliceBlock { y, cb, cr };
                }
            }
        }
    }
    Ok(slices)
}

/// Write one picture's slices in the given profile.
pub fn write_slices(writer: &mut BitWriter, slices: &Slices, profile: &SliceProfile) -> Result<()> {
    let ld_bytes = match profile {
        SliceProfile::LowDelay {
            bytes_num,
            bytes_den,
        } => Some(ld_slice_bytes(
            slices.y_slices,
            slices.x_slices,
            *bytes_num,
            *bytes_den,
        )),
        SliceProfile::HighQuality { .. } => None,
    };

    for sy in 0..slices.y_slices {
        for sx in 0..slices.x_slices {
            let block = &slices.blocks[sy * slices.x_slices + sx];
            let qindex = slices.qindices[(sy, sx)] as u32;

            match profile {
                SliceProfile::LowDelay { .. } => {
                    let budget_bytes = ld_bytes.as_ref().unwrap()[(sy, sx)] as usize;
                    if budget_bytes == 0 {
                        return Err(Error::Codec(CodecError::Other(format!(
                            "low-delay slice ({},{}) has no byte budget",
                            sx, sy
                        ))));
                    }
                    let budget_bits = budget_bytes * 8;
                    let start = writer.position();

                    let length_bits = intlog2(budget_bits as u64);
                    let luma = truncate_zeros(&block.y);
                    let y_length = coded_bits(luma);
                    let mut chroma = Vec::with_capacity(block.cb.len() * 2);
                    for (&cb, &cr) in block.cb.iter().zip(&block.cr) {
                        chroma.push(cb);
                        chroma.push(cr);
                    }
                    let c_length = coded_bits(&chroma);

                    let needed = 7 + length_bits as usize + y_length + c_length;
                    if needed > budget_bits {
                        return Err(Error::Codec(CodecError::SliceOverflow {
                            x: sx as u32,
                            y: sy as u32,
                            needed,
                            budget: budget_bits,
                        }));
                    }

                    writer.write_bits(qindex, 7)?;
                    writer.write_bits(y_length as u32, length_bits)?;
                    write_coeffs(writer, luma)?;
                    write_coeffs(writer, &chroma)?;
                    writer.pad_to(start + budget_bits)?;
                }
                SliceProfile::HighQuality {
                    prefix_bytes,
                    size_scalar,
                } => {
                    let scalar = *size_scalar as usize;
                    for _ in 0..*prefix_bytes {
                        writer.write_bits(0, 8)?;
                    }
                    writer.write_bits(qindex, 8)?;
                    for coeffs in [&block.y, &block.cb, &block.cr] {
                        let bytes_needed = coded_bits(coeffs).div_ceil(8);
                        let size_units = bytes_needed.div_ceil(scalar);
                        if size_units > 255 {
                            return Err(Error::Codec(CodecError::SliceOverflow {
                                x: sx as u32,
                                y: sy as u32,
                                needed: size_units,
                                budget: 255,
                            }));
                        }
                        let start = writer.position();
                        writer.write_bits(size_units as u32, 8)?;
                        write_coeffs(writer, coeffs)?;
                        writer.pad_to(start + 8 + size_units * scalar * 8)?;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SliceProfile;
    use vc2_core::picture::{ChromaFormat, PictureFormat};

    fn test_format() -> TransformFormat {
        TransformFormat::new(PictureFormat::new(16, 16, ChromaFormat::C420), 1)
    }

    fn test_coeffs(format: &TransformFormat) -> Picture {
        let mut coeffs = format.coeff_picture();
        for (i, v) in coeffs.y.data_mut().iter_mut().enumerate() {
            *v = (i as i32 % 17) - 8;
        }
        for (i, v) in coeffs.cb.data_mut().iter_mut().enumerate() {
            *v = (i as i32 % 9) - 4;
        }
        for (i, v) in coeffs.cr.data_mut().iter_mut().enumerate() {
            *v = (i as i32 % 5) - 2;
        }
        coeffs
    }

    #[test]
    fn test_slice_positions_cover_plane() {
        let format = test_format();
        let rects = format.luma_rects();
        let mut seen = vec![false; 16 * 16];
        for sy in 0..2 {
            for sx in 0..2 {
                for (y, x) in slice_positions(&rects, sx, 2, sy, 2) {
                    assert!(!seen[y * 16 + x], "position ({},{}) visited twice", y, x);
                    seen[y * 16 + x] = true;
                }
            }
        }
        assert!(seen.iter().all(|&v| v), "positions do not cover the plane");
    }

    #[test]
    fn test_merge_split_roundtrip() {
        let format = test_format();
        let coeffs = test_coeffs(&format);

        let slices = split_blocks(&coeffs, &format, 2, 2, Array2D::new(2, 2));
        let merged = merge_blocks(&slices);
        assert_eq!(merged.y, coeffs.y);
        assert_eq!(merged.cb, coeffs.cb);
        assert_eq!(merged.cr, coeffs.cr);

        let again = split_blocks(&merged, &format, 2, 2, slices.qindices.clone());
        assert_eq!(again.blocks, slices.blocks);
    }

    #[test]
    fn test_ld_slice_bytes_distribution() {
        // 100 bytes over 8 slices: budgets differ by at most one byte and
        // sum exactly.
        let table = ld_slice_bytes(2, 4, 100, 8);
        let total: i32 = table.data().iter().sum();
        assert_eq!(total, 100);
        assert!(table.data().iter().all(|&b| b == 12 || b == 13));

        // Exact division gives every slice the same budget.
        let even = ld_slice_bytes(2, 2, 8, 1);
        assert!(even.data().iter().all(|&b| b == 8));
    }

    #[test]
    fn test_hq_slice_roundtrip() {
        let format = test_format();
        let coeffs = test_coeffs(&format);
        let mut qindices = Array2D::new(2, 2);
        for (i, v) in qindices.data_mut().iter_mut().enumerate() {
            *v = i as i32;
        }
        let slices = split_blocks(&coeffs, &format, 2, 2, qindices);

        let profile = SliceProfile::HighQuality {
            prefix_bytes: 2,
            size_scalar: 1,
        };
        let mut writer = BitWriter::new();
        write_slices(&mut writer, &slices, &profile).unwrap();
        let data = writer.into_data();

        let mut reader = BitReader::new(&data);
        let back = read_slices(&mut reader, &format, 2, 2, &profile).unwrap();
        assert_eq!(back.qindices, slices.qindices);
        assert_eq!(back.blocks, slices.blocks);
        assert_eq!(reader.position(), data.len() * 8);
    }

    #[test]
    fn test_hq_slice_scalar_padding() {
        let format = test_format();
        let coeffs = test_coeffs(&format);
        let slices = split_blocks(&coeffs, &format, 2, 2, Array2D::new(2, 2));

        let profile = SliceProfile::HighQuality {
            prefix_bytes: 0,
            size_scalar: 4,
        };
        let mut writer = BitWriter::new();
        write_slices(&mut writer, &slices, &profile).unwrap();
        let data = writer.into_data();

        let mut reader = BitReader::new(&data);
        let back = read_slices(&mut reader, &format, 2, 2, &profile).unwrap();
        assert_eq!(back.blocks, slices.blocks);
    }

    #[test]
    fn test_ld_slice_roundtrip() {
        let format = test_format();
        let coeffs = test_coeffs(&format);
        let slices = split_blocks(&coeffs, &format, 2, 2, Array2D::new(2, 2));

        // Generous fixed budget so the test coefficients fit.
        let profile = SliceProfile::LowDelay {
            bytes_num: 256,
            bytes_den: 1,
        };
        let mut writer = BitWriter::new();
        write_slices(&mut writer, &slices, &profile).unwrap();
        let data = writer.into_data();
        assert_eq!(data.len(), 4 * 256);

        let mut reader = BitReader::new(&data);
        let back = read_slices(&mut reader, &format, 2, 2, &profile).unwrap();
        assert_eq!(back.qindices, slices.qindices);
        assert_eq!(back.blocks, slices.blocks);
    }

    #[test]
    fn test_ld_slice_overflow_is_fatal() {
        let format = test_format();
        let coeffs = test_coeffs(&format);
        let slices = split_blocks(&coeffs, &format, 2, 2, Array2D::new(2, 2));

        let profile = SliceProfile::LowDelay {
            bytes_num: 4,
            bytes_den: 1,
        };
        let mut writer = BitWriter::new();
        let err = write_slices(&mut writer, &slices, &profile).unwrap_err();
        assert!(matches!(
            err,
            Error::Codec(CodecError::SliceOverflow { .. })
        ));
    }

    #[test]
    fn test_ld_zero_coefficients_fit_exact_budget() {
        let format = test_format();
        let coeffs = format.coeff_picture();
        let slices = split_blocks(&coeffs, &format, 2, 2, Array2D::new(2, 2));

        let profile = SliceProfile::LowDelay {
            bytes_num: 8,
            bytes_den: 1,
        };
        let mut writer = BitWriter::new();
        write_slices(&mut writer, &slices, &profile).unwrap();
        assert_eq!(writer.data().len(), 4 * 8);

        let mut reader = BitReader::new(writer.data());
        let back = read_slices(&mut reader, &format, 2, 2, &profile).unwrap();
        assert!(back.blocks.iter().all(|b| b.y.iter().all(|&v| v == 0)));
    }
}
