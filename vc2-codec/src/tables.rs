//! Static codec tables: lifting steps, quantisation factors and the
//! default quantisation matrices.

use vc2_core::error::{CodecError, Error, Result};

use crate::types::WaveletKernel;

/// One lifting step of a wavelet filter.
///
/// The step updates either the odd or the even lattice: each target sample
/// gains (or loses) `(sum(weight * neighbour) + round) >> shift`, where the
/// neighbours are taken from the opposite lattice at the given offsets
/// (in sample positions relative to the target).
#[derive(Debug, Clone, Copy)]
pub struct LiftStep {
    /// Updates the odd lattice when true, the even lattice otherwise.
    pub odd: bool,
    /// Subtract the filtered value instead of adding it.
    pub subtract: bool,
    /// (offset, weight) pairs; offsets are odd so they always land on the
    /// opposite lattice.
    pub taps: &'static [(i32, i32)],
    /// Rounding constant added before the shift.
    pub round: i32,
    /// Arithmetic right shift applied to the filtered sum.
    pub shift: u32,
}

const DESLAURIERS_DUBUC_9_7: &[LiftStep] = &[
    LiftStep {
        odd: true,
        subtract: true,
        taps: &[(-3, -1), (-1, 9), (1, 9), (3, -1)],
        round: 8,
        shift: 4,
    },
    LiftStep {
        odd: false,
        subtract: false,
        taps: &[(-1, 1), (1, 1)],
        round: 2,
        shift: 2,
    },
];

const LEGALL_5_3: &[LiftStep] = &[
    LiftStep {
        odd: true,
        subtract: true,
        taps: &[(-1, 1), (1, 1)],
        round: 1,
        shift: 1,
    },
    LiftStep {
        odd: false,
        subtract: false,
        taps: &[(-1, 1), (1, 1)],
        round: 2,
        shift: 2,
    },
];

const DESLAURIERS_DUBUC_13_7: &[LiftStep] = &[
    LiftStep {
        odd: true,
        subtract: true,
        taps: &[(-3, -1), (-1, 9), (1, 9), (3, -1)],
        round: 8,
        shift: 4,
    },
    LiftStep {
        odd: false,
        subtract: false,
        taps: &[(-3, -1), (-1, 9), (1, 9), (3, -1)],
        round: 16,
        shift: 5,
    },
];

const HAAR: &[LiftStep] = &[
    LiftStep {
        odd: true,
        subtract: true,
        taps: &[(-1, 1)],
        round: 0,
        shift: 0,
    },
    LiftStep {
        odd: false,
        subtract: false,
        taps: &[(1, 1)],
        round: 1,
        shift: 1,
    },
];

const FIDELITY: &[LiftStep] = &[
    LiftStep {
        odd: false,
        subtract: true,
        taps: &[
            (-7, -8),
            (-5, 21),
            (-3, -46),
            (-1, 161),
            (1, 161),
            (3, -46),
            (5, 21),
            (7, -8),
        ],
        round: 128,
        shift: 8,
    },
    LiftStep {
        odd: true,
        subtract: false,
        taps: &[
            (-7, -2),
            (-5, 10),
            (-3, -25),
            (-1, 81),
            (1, 81),
            (3, -25),
            (5, 10),
            (7, -2),
        ],
        round: 128,
        shift: 8,
    },
];

const DAUBECHIES_9_7: &[LiftStep] = &[
    LiftStep {
        odd: true,
        subtract: true,
        taps: &[(-1, 6497), (1, 6497)],
        round: 2048,
        shift: 12,
    },
    LiftStep {
        odd: false,
        subtract: true,
        taps: &[(-1, 217), (1, 217)],
        round: 2048,
        shift: 12,
    },
    LiftStep {
        odd: true,
        subtract: false,
        taps: &[(-1, 3616), (1, 3616)],
        round: 2048,
        shift: 12,
    },
    LiftStep {
        odd: false,
        subtract: false,
        taps: &[(-1, 1817), (1, 1817)],
        round: 2048,
        shift: 12,
    },
];

/// Forward (analysis) lifting steps for a kernel. The inverse transform
/// applies the same steps in reverse order with add/subtract swapped.
pub fn lifting_steps(kernel: WaveletKernel) -> &'static [LiftStep] {
    match kernel {
        WaveletKernel::DeslauriersDubuc97 => DESLAURIERS_DUBUC_9_7,
        WaveletKernel::LeGall53 => LEGALL_5_3,
        WaveletKernel::DeslauriersDubuc137 => DESLAURIERS_DUBUC_13_7,
        WaveletKernel::Haar0 | WaveletKernel::Haar1 => HAAR,
        WaveletKernel::Fidelity => FIDELITY,
        WaveletKernel::Daubechies97 => DAUBECHIES_9_7,
    }
}

/// The quantisation factor for an index, four times the step size, using
/// the exact integer divisions of ST 2042-1 §13.3.1.
pub fn quant_factor(index: u32) -> i64 {
    let base = 1i64 << (index / 4);
    match index % 4 {
        0 => 4 * base,
        1 => (503_829 * base + 52_958) / 105_917,
        2 => (665_857 * base + 58_854) / 117_708,
        _ => (440_253 * base + 32_722) / 65_444,
    }
}

/// The reconstruction offset paired with [`quant_factor`], used by the
/// low-delay dequantiser.
pub fn quant_offset(index: u32) -> i64 {
    match index {
        0 => 1,
        1 => 2,
        _ => quant_factor(index) / 2,
    }
}

/// Default quantisation matrices, keyed by wavelet index then transform
/// depth 0..=4. Entries are in DC-first order: LL, then (HL, LH, HH) from
/// the coarsest level down to the finest.
const QUANT_MATRICES: [[&[i32]; 5]; 7] = [
    // Deslauriers-Dubuc (9,7)
    [
        &[5],
        &[4, 2, 2, 0],
        &[4, 2, 2, 0, 4, 4, 2],
        &[5, 3, 3, 1, 5, 5, 3, 6, 6, 5],
        &[5, 3, 3, 1, 5, 5, 3, 6, 6, 5, 7, 7, 6],
    ],
    // LeGall (5,3)
    [
        &[2],
        &[2, 1, 1, 0],
        &[2, 1, 1, 0, 3, 3, 2],
        &[2, 1, 1, 0, 3, 3, 2, 4, 4, 3],
        &[2, 1, 1, 0, 3, 3, 2, 4, 4, 3, 5, 5, 4],
    ],
    // Deslauriers-Dubuc (13,7)
    [
        &[5],
        &[4, 2, 2, 0],
        &[4, 2, 2, 0, 5, 5, 3],
        &[5, 3, 3, 1, 5, 5, 3, 6, 6, 5],
        &[5, 3, 3, 1, 5, 5, 3, 6, 6, 5, 7, 7, 6],
    ],
    // Haar, no shift
    [
        &[0],
        &[8, 4, 4, 0],
        &[8, 4, 4, 0, 4, 4, 0],
        &[8, 4, 4, 0, 4, 4, 0, 4, 4, 0],
        &[8, 4, 4, 0, 4, 4, 0, 4, 4, 0, 4, 4, 0],
    ],
    // Haar, single shift per level
    [
        &[0],
        &[8, 4, 4, 0],
        &[12, 8, 8, 4, 4, 4, 0],
        &[16, 12, 12, 8, 8, 8, 4, 4, 4, 0],
        &[20, 16, 16, 12, 12, 12, 8, 8, 8, 4, 4, 4, 0],
    ],
    // Fidelity
    [
        &[0],
        &[4, 2, 2, 0],
        &[4, 2, 2, 0, 4, 4, 2],
        &[4, 2, 2, 0, 4, 4, 2, 6, 6, 4],
        &[4, 2, 2, 0, 4, 4, 2, 6, 6, 4, 8, 8, 6],
    ],
    // Daubechies (9,7)
    [
        &[3],
        &[3, 1, 1, 0],
        &[3, 1, 1, 0, 4, 4, 2],
        &[3, 1, 1, 0, 4, 4, 2, 5, 5, 4],
        &[3, 1, 1, 0, 4, 4, 2, 5, 5, 4, 6, 6, 5],
    ],
];

/// The default quantisation matrix for a kernel/depth pair.
///
/// The result has `3 * depth + 1` entries. Depths beyond the tabulated
/// range require a custom matrix in the stream.
pub fn quant_matrix(kernel: WaveletKernel, depth: u32) -> Result<Vec<i32>> {
    if depth > 4 {
        return Err(Error::Codec(CodecError::NoQuantMatrix {
            index: kernel.index(),
            depth,
        }));
    }
    Ok(QUANT_MATRICES[kernel.index() as usize][depth as usize].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quant_factor_exact_values() {
        // The first octave of the standard's table.
        assert_eq!(quant_factor(0), 4);
        assert_eq!(quant_factor(1), 5);
        assert_eq!(quant_factor(2), 6);
        assert_eq!(quant_factor(3), 7);
        assert_eq!(quant_factor(4), 8);
        // Doubling every four indices.
        assert_eq!(quant_factor(8), 16);
        assert_eq!(quant_factor(12), 32);
    }

    #[test]
    fn test_quant_factor_monotone() {
        for q in 0..127 {
            assert!(
                quant_factor(q + 1) >= quant_factor(q),
                "quant factor not monotone at {}",
                q
            );
        }
    }

    #[test]
    fn test_quant_offset() {
        assert_eq!(quant_offset(0), 1);
        assert_eq!(quant_offset(1), 2);
        assert_eq!(quant_offset(4), quant_factor(4) / 2);
    }

    #[test]
    fn test_quant_matrix_lengths() {
        for index in 0..7 {
            let kernel = WaveletKernel::from_index(index).unwrap();
            for depth in 0..=4 {
                let m = quant_matrix(kernel, depth).unwrap();
                assert_eq!(m.len(), 3 * depth as usize + 1);
            }
            assert!(quant_matrix(kernel, 5).is_err());
        }
    }

    #[test]
    fn test_lifting_steps_land_on_opposite_lattice() {
        for index in 0..7 {
            let kernel = WaveletKernel::from_index(index).unwrap();
            for step in lifting_steps(kernel) {
                for &(offset, _) in step.taps {
                    assert_eq!(offset.rem_euclid(2), 1, "{}: even tap offset", kernel);
                }
            }
        }
    }
}
