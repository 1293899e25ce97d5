//! VC-2 type definitions.

use vc2_core::error::{CodecError, Error, Result};

/// The seven wavelet kernels of ST 2042-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveletKernel {
    /// Deslauriers-Dubuc (9,7).
    DeslauriersDubuc97,
    /// LeGall (5,3).
    LeGall53,
    /// Deslauriers-Dubuc (13,7).
    DeslauriersDubuc137,
    /// Haar with no shift.
    Haar0,
    /// Haar with a single shift per level.
    Haar1,
    /// Fidelity filter.
    Fidelity,
    /// Integer Daubechies (9,7) approximation.
    Daubechies97,
}

impl WaveletKernel {
    /// The coded wavelet index.
    pub fn index(&self) -> u32 {
        match self {
            WaveletKernel::DeslauriersDubuc97 => 0,
            WaveletKernel::LeGall53 => 1,
            WaveletKernel::DeslauriersDubuc137 => 2,
            WaveletKernel::Haar0 => 3,
            WaveletKernel::Haar1 => 4,
            WaveletKernel::Fidelity => 5,
            WaveletKernel::Daubechies97 => 6,
        }
    }

    /// Parse a coded wavelet index.
    pub fn from_index(index: u32) -> Result<Self> {
        match index {
            0 => Ok(WaveletKernel::DeslauriersDubuc97),
            1 => Ok(WaveletKernel::LeGall53),
            2 => Ok(WaveletKernel::DeslauriersDubuc137),
            3 => Ok(WaveletKernel::Haar0),
            4 => Ok(WaveletKernel::Haar1),
            5 => Ok(WaveletKernel::Fidelity),
            6 => Ok(WaveletKernel::Daubechies97),
            _ => Err(Error::Codec(CodecError::UnsupportedWaveletIndex { index })),
        }
    }

    /// Bit shift applied to samples before each forward level (and undone,
    /// with rounding, after each inverse level).
    pub fn filter_shift(&self) -> u32 {
        match self {
            WaveletKernel::Haar1 => 1,
            _ => 0,
        }
    }

    /// Human-readable kernel name.
    pub fn name(&self) -> &'static str {
        match self {
            WaveletKernel::DeslauriersDubuc97 => "Deslauriers-Dubuc (9,7)",
            WaveletKernel::LeGall53 => "LeGall (5,3)",
            WaveletKernel::DeslauriersDubuc137 => "Deslauriers-Dubuc (13,7)",
            WaveletKernel::Haar0 => "Haar (no shift)",
            WaveletKernel::Haar1 => "Haar (single shift)",
            WaveletKernel::Fidelity => "Fidelity",
            WaveletKernel::Daubechies97 => "Daubechies (9,7)",
        }
    }
}

impl std::fmt::Display for WaveletKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse codes of the data units handled by this decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseCode {
    /// Sequence header (0x00).
    SequenceHeader,
    /// End of sequence (0x10).
    EndOfSequence,
    /// Auxiliary data (0x20).
    AuxiliaryData,
    /// Padding (0x30).
    Padding,
    /// Low-delay profile picture (0xC8).
    LdPicture,
    /// High-quality profile picture (0xE8).
    HqPicture,
    /// Anything else; skipped via the next-unit offset.
    Unknown(u8),
}

impl ParseCode {
    /// Parse a coded byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => ParseCode::SequenceHeader,
            0x10 => ParseCode::EndOfSequence,
            0x20 => ParseCode::AuxiliaryData,
            0x30 => ParseCode::Padding,
            0xC8 => ParseCode::LdPicture,
            0xE8 => ParseCode::HqPicture,
            other => ParseCode::Unknown(other),
        }
    }

    /// The coded byte.
    pub fn byte(&self) -> u8 {
        match self {
            ParseCode::SequenceHeader => 0x00,
            ParseCode::EndOfSequence => 0x10,
            ParseCode::AuxiliaryData => 0x20,
            ParseCode::Padding => 0x30,
            ParseCode::LdPicture => 0xC8,
            ParseCode::HqPicture => 0xE8,
            ParseCode::Unknown(b) => *b,
        }
    }

    /// Whether this unit carries a coded picture.
    pub fn is_picture(&self) -> bool {
        matches!(self, ParseCode::LdPicture | ParseCode::HqPicture)
    }
}

impl std::fmt::Display for ParseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseCode::SequenceHeader => write!(f, "sequence header"),
            ParseCode::EndOfSequence => write!(f, "end of sequence"),
            ParseCode::AuxiliaryData => write!(f, "auxiliary data"),
            ParseCode::Padding => write!(f, "padding"),
            ParseCode::LdPicture => write!(f, "low-delay picture"),
            ParseCode::HqPicture => write!(f, "high-quality picture"),
            ParseCode::Unknown(b) => write!(f, "unknown (0x{:02X})", b),
        }
    }
}

/// A frame rate as an exact fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    /// Frames (or fields pairs) per `den` seconds.
    pub num: u32,
    /// Denominator.
    pub den: u32,
}

/// The preset frame rates of ST 2042-1, indexed 1..=11.
const FRAME_RATE_PRESETS: [FrameRate; 11] = [
    FrameRate { num: 24000, den: 1001 },
    FrameRate { num: 24, den: 1 },
    FrameRate { num: 25, den: 1 },
    FrameRate { num: 30000, den: 1001 },
    FrameRate { num: 30, den: 1 },
    FrameRate { num: 50, den: 1 },
    FrameRate { num: 60000, den: 1001 },
    FrameRate { num: 60, den: 1 },
    FrameRate { num: 15000, den: 1001 },
    FrameRate { num: 25, den: 2 },
    FrameRate { num: 48, den: 1 },
];

impl FrameRate {
    /// Create a frame rate from a literal fraction.
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Look up a preset index (1..=11).
    pub fn from_preset(index: u32) -> Option<Self> {
        if (1..=11).contains(&index) {
            Some(FRAME_RATE_PRESETS[index as usize - 1])
        } else {
            None
        }
    }

    /// The preset index matching this rate, if any.
    pub fn preset_index(&self) -> Option<u32> {
        FRAME_RATE_PRESETS
            .iter()
            .position(|p| p == self)
            .map(|i| i as u32 + 1)
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Preset signal ranges, indexed 1..=4, and the bit depth each implies.
pub mod signal_range {
    /// Bit depth for a signal-range preset index.
    pub fn bit_depth(index: u32) -> Option<u32> {
        match index {
            1 | 2 => Some(8),
            3 => Some(10),
            4 => Some(12),
            _ => None,
        }
    }

    /// A preset index whose excursion matches the given bit depth.
    pub fn from_bit_depth(depth: u32) -> Option<u32> {
        match depth {
            8 => Some(1),
            10 => Some(3),
            12 => Some(4),
            _ => None,
        }
    }
}

/// The slice profile of a coded picture, with its wire parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceProfile {
    /// Constant-bit-rate slices: each slice's byte budget is the fraction
    /// `bytes_num / bytes_den`, distributed exactly across the slice grid.
    LowDelay { bytes_num: u32, bytes_den: u32 },
    /// Variable-bit-rate slices with per-component byte counts scaled by
    /// `size_scalar`, preceded by `prefix_bytes` bytes of prefix.
    HighQuality { prefix_bytes: u32, size_scalar: u32 },
}

impl SliceProfile {
    /// The parse code pictures of this profile carry.
    pub fn parse_code(&self) -> ParseCode {
        match self {
            SliceProfile::LowDelay { .. } => ParseCode::LdPicture,
            SliceProfile::HighQuality { .. } => ParseCode::HqPicture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wavelet_index_roundtrip() {
        for index in 0..7 {
            let kernel = WaveletKernel::from_index(index).unwrap();
            assert_eq!(kernel.index(), index);
        }
        assert!(WaveletKernel::from_index(7).is_err());
    }

    #[test]
    fn test_filter_shift() {
        assert_eq!(WaveletKernel::Haar1.filter_shift(), 1);
        assert_eq!(WaveletKernel::Haar0.filter_shift(), 0);
        assert_eq!(WaveletKernel::LeGall53.filter_shift(), 0);
    }

    #[test]
    fn test_parse_code_roundtrip() {
        for byte in [0x00u8, 0x10, 0x20, 0x30, 0xC8, 0xE8, 0x42] {
            assert_eq!(ParseCode::from_byte(byte).byte(), byte);
        }
        assert!(ParseCode::from_byte(0xC8).is_picture());
        assert!(!ParseCode::from_byte(0x00).is_picture());
    }

    #[test]
    fn test_frame_rate_presets() {
        let ntsc = FrameRate::from_preset(4).unwrap();
        assert_eq!(ntsc, FrameRate::new(30000, 1001));
        assert_eq!(ntsc.preset_index(), Some(4));

        assert_eq!(FrameRate::new(123, 7).preset_index(), None);
        assert!(FrameRate::from_preset(0).is_none());
        assert!(FrameRate::from_preset(12).is_none());
    }

    #[test]
    fn test_signal_range() {
        assert_eq!(signal_range::bit_depth(3), Some(10));
        assert_eq!(signal_range::from_bit_depth(12), Some(4));
        assert_eq!(signal_range::bit_depth(9), None);
    }
}
