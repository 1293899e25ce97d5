//! The VC-2 dead-zone quantiser.
//!
//! Coefficients are quantised as `(4 * |c|) / qf`, sign preserved, where
//! `qf` is the quantisation factor for the subband's index. Reconstruction
//! multiplies back and adds half of the step; the low-delay profile adds a
//! further mid-tread offset, the high-quality profile does not.

use vc2_core::array::Array2D;
use vc2_core::picture::Picture;

use crate::tables::{quant_factor, quant_offset};
use crate::wavelet::{SubbandRect, TransformFormat};

/// Whether reconstruction applies the mid-tread quantisation offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequantVariant {
    /// Low-delay reconstruction: adds `quant_offset(q)`.
    LowDelay,
    /// High-quality reconstruction: plain dead-zone inverse.
    HighQuality,
}

/// The quantiser index used for a subband: the slice index offset by the
/// matrix entry for that band, clamped at zero.
pub fn subband_quant_index(qindex: u32, matrix_value: i32) -> u32 {
    (qindex as i32 - matrix_value).max(0) as u32
}

/// Quantise a single coefficient.
pub fn quantise(coeff: i32, qindex: u32) -> i32 {
    let qf = quant_factor(qindex);
    let magnitude = (4 * i64::from(coeff.unsigned_abs())) / qf;
    (magnitude as i32) * coeff.signum()
}

/// Reconstruct a single coefficient.
pub fn dequantise(coeff: i32, qindex: u32, variant: DequantVariant) -> i32 {
    if coeff == 0 {
        return 0;
    }
    let mut magnitude = i64::from(coeff.unsigned_abs()) * quant_factor(qindex);
    if variant == DequantVariant::LowDelay {
        magnitude += quant_offset(qindex);
    }
    magnitude += 2;
    ((magnitude >> 2) as i32) * coeff.signum()
}

/// Apply `f` to every (subband, slice) sub-rectangle of a plane, passing
/// the quantiser index derived from that slice's qindex and that band's
/// matrix entry.
fn for_each_slice_band(
    plane: &mut Array2D,
    rects: &[SubbandRect],
    qindices: &Array2D,
    matrix: &[i32],
    mut f: impl FnMut(&mut i32, u32),
) {
    let x_slices = qindices.width();
    let y_slices = qindices.height();
    for (band, rect) in rects.iter().enumerate() {
        let m = matrix[band];
        for sy in 0..y_slices {
            let ry0 = rect.y0 + rect.height * sy / y_slices;
            let ry1 = rect.y0 + rect.height * (sy + 1) / y_slices;
            for sx in 0..x_slices {
                let rx0 = rect.x0 + rect.width * sx / x_slices;
                let rx1 = rect.x0 + rect.width * (sx + 1) / x_slices;
                let qi = subband_quant_index(qindices[(sy, sx)] as u32, m);
                for y in ry0..ry1 {
                    for v in &mut plane.row_mut(y)[rx0..rx1] {
                        f(v, qi);
                    }
                }
            }
        }
    }
}

/// Quantise a transform-domain picture in place, per slice and subband.
pub fn quantise_picture(
    coeffs: &mut Picture,
    format: &TransformFormat,
    qindices: &Array2D,
    matrix: &[i32],
) {
    let luma_rects = format.luma_rects();
    for_each_slice_band(&mut coeffs.y, &luma_rects, qindices, matrix, |v, qi| {
        *v = quantise(*v, qi)
    });
    if format.picture.chroma.has_chroma() {
        let chroma_rects = format.chroma_rects();
        for plane in [&mut coeffs.cb, &mut coeffs.cr] {
            for_each_slice_band(plane, &chroma_rects, qindices, matrix, |v, qi| {
                *v = quantise(*v, qi)
            });
        }
    }
}

/// Reconstruct a quantised transform-domain picture in place.
pub fn dequantise_picture(
    coeffs: &mut Picture,
    format: &TransformFormat,
    qindices: &Array2D,
    matrix: &[i32],
    variant: DequantVariant,
) {
    let luma_rects = format.luma_rects();
    for_each_slice_band(&mut coeffs.y, &luma_rects, qindices, matrix, |v, qi| {
        *v = dequantise(*v, qi, variant)
    });
    if format.picture.chroma.has_chroma() {
        let chroma_rects = format.chroma_rects();
        for plane in [&mut coeffs.cb, &mut coeffs.cr] {
            for_each_slice_band(plane, &chroma_rects, qindices, matrix, |v, qi| {
                *v = dequantise(*v, qi, variant)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vc2_core::picture::{ChromaFormat, PictureFormat};

    #[test]
    fn test_qindex_zero_is_lossless() {
        for coeff in [-1000, -17, -1, 0, 1, 17, 1000] {
            let q = quantise(coeff, 0);
            assert_eq!(q, coeff);
            assert_eq!(dequantise(q, 0, DequantVariant::HighQuality), coeff);
            assert_eq!(dequantise(q, 0, DequantVariant::LowDelay), coeff);
        }
    }

    #[test]
    fn test_zero_maps_to_zero() {
        for q in [0, 1, 37, 127] {
            assert_eq!(quantise(0, q), 0);
            assert_eq!(dequantise(0, q, DequantVariant::HighQuality), 0);
            assert_eq!(dequantise(0, q, DequantVariant::LowDelay), 0);
        }
    }

    #[test]
    fn test_sign_symmetry() {
        for q in [0, 3, 16, 40] {
            for c in [1, 7, 100, 4096] {
                assert_eq!(quantise(-c, q), -quantise(c, q));
                let qc = quantise(c, q);
                assert_eq!(
                    dequantise(-qc, q, DequantVariant::HighQuality),
                    -dequantise(qc, q, DequantVariant::HighQuality)
                );
            }
        }
    }

    #[test]
    fn test_error_bounded_by_step() {
        // Dead-zone reconstruction error stays below one quantisation step.
        for &c in &[3, 25, 100, 1000, 30000] {
            for q in 0..=40 {
                let rec = dequantise(quantise(c, q), q, DequantVariant::HighQuality);
                let err = i64::from((rec - c).abs());
                let step = quant_factor(q) / 4;
                assert!(
                    err <= step + 1,
                    "error {} above step {} at q={} for c={}",
                    err,
                    step,
                    q,
                    c
                );
            }
        }
    }

    #[test]
    fn test_deadzone_collapses_small_coefficients() {
        // Once the step exceeds four times the coefficient, it quantises
        // to zero and the reconstruction error is the coefficient itself.
        let c = 9;
        let q = 24; // factor 256
        assert_eq!(quantise(c, q), 0);
        assert_eq!(dequantise(quantise(c, q), q, DequantVariant::HighQuality), 0);
    }

    #[test]
    fn test_subband_quant_index_clamps() {
        assert_eq!(subband_quant_index(5, 2), 3);
        assert_eq!(subband_quant_index(1, 4), 0);
        assert_eq!(subband_quant_index(0, 0), 0);
    }

    #[test]
    fn test_picture_quantise_dequantise_identity_at_zero() {
        let pf = PictureFormat::new(16, 16, ChromaFormat::C420);
        let tf = TransformFormat::new(pf, 1);
        let mut coeffs = tf.coeff_picture();
        for (i, v) in coeffs.y.data_mut().iter_mut().enumerate() {
            *v = (i as i32 % 61) - 30;
        }
        let original = coeffs.clone();

        let qindices = Array2D::new(2, 2);
        let matrix = crate::tables::quant_matrix(crate::types::WaveletKernel::LeGall53, 1).unwrap();

        quantise_picture(&mut coeffs, &tf, &qindices, &matrix);
        dequantise_picture(
            &mut coeffs,
            &tf,
            &qindices,
            &matrix,
            DequantVariant::HighQuality,
        );
        assert_eq!(coeffs.y, original.y);
    }

    #[test]
    fn test_per_slice_qindex_application() {
        // Two slices horizontally; the right slice quantises coarsely.
        let pf = PictureFormat::new(8, 4, ChromaFormat::Mono);
        let tf = TransformFormat::new(pf, 0);
        let mut coeffs = tf.coeff_picture();
        coeffs.y.fill(100);

        let mut qindices = Array2D::new(2, 1);
        qindices[(0, 0)] = 0;
        qindices[(0, 1)] = 24; // factor 256, step 64

        quantise_picture(&mut coeffs, &tf, &qindices, &[0]);
        assert_eq!(coeffs.y[(0, 0)], 100);
        assert_eq!(coeffs.y[(0, 4)], 400 / 256);
    }
}
