//! Planar sample file reading and writing.
//!
//! Decoded frames and diagnostic arrays are exchanged as raw planar files:
//! every sample of a plane in row-major order, planes in Y, Cb, Cr order,
//! one frame after another. The sample representation is described by an
//! explicit [`SampleFormat`] value rather than by stateful stream modifiers.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::array::Array2D;
use crate::error::{Error, Result};
use crate::picture::{Frame, Picture, PictureFormat};

/// How samples are packed into file words.
///
/// Words are big-endian. Left-justified samples sit in the most significant
/// bits of the word; offset-binary samples have `2^(d-1)` added before
/// packing (and subtracted after unpacking).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    /// Bytes per file word (1..=4).
    pub word_bytes: usize,
    /// Two's-complement storage.
    pub signed: bool,
    /// Add `2^(d-1)` before packing.
    pub offset_binary: bool,
    /// Shift the sample into the word's MSBs.
    pub left_justified: bool,
    /// Significant bits per sample.
    pub bit_depth: u32,
}

impl SampleFormat {
    /// The decoded-output format for a given bit depth: offset binary,
    /// left justified, `ceil(d / 8)` bytes per word.
    pub fn offset_binary(bit_depth: u32) -> Self {
        Self {
            word_bytes: (bit_depth as usize + 7) / 8,
            signed: false,
            offset_binary: true,
            left_justified: true,
            bit_depth,
        }
    }

    /// Four-byte two's-complement words, as used for coefficient
    /// diagnostics.
    pub fn signed32() -> Self {
        Self {
            word_bytes: 4,
            signed: true,
            offset_binary: false,
            left_justified: false,
            bit_depth: 32,
        }
    }

    /// Single unsigned bytes, as used for quantisation-index diagnostics.
    pub fn unsigned8() -> Self {
        Self {
            word_bytes: 1,
            signed: false,
            offset_binary: false,
            left_justified: false,
            bit_depth: 8,
        }
    }

    fn word_bits(&self) -> u32 {
        self.word_bytes as u32 * 8
    }

    fn pack(&self, sample: i32) -> u64 {
        let mut v = i64::from(sample);
        if self.offset_binary {
            v += 1 << (self.bit_depth - 1);
        }
        if self.left_justified {
            v <<= self.word_bits() - self.bit_depth;
        }
        (v as u64) & (u64::MAX >> (64 - self.word_bits()))
    }

    fn unpack(&self, raw: u64) -> i32 {
        let bits = self.word_bits();
        let mut v = if self.signed {
            // Sign-extend from the word width.
            ((raw << (64 - bits)) as i64) >> (64 - bits)
        } else {
            raw as i64
        };
        if self.left_justified {
            v >>= bits - self.bit_depth;
        }
        if self.offset_binary {
            v -= 1 << (self.bit_depth - 1);
        }
        v as i32
    }
}

/// Write one array of samples.
pub fn write_array(w: &mut impl Write, array: &Array2D, format: &SampleFormat) -> Result<()> {
    for &sample in array.data() {
        w.write_uint::<BigEndian>(format.pack(sample), format.word_bytes)?;
    }
    Ok(())
}

/// Read one array of samples with known dimensions.
///
/// Returns [`Error::EndOfStream`] when the input is already exhausted at the
/// first sample; a truncation mid-array is an I/O error.
pub fn read_array(
    r: &mut impl Read,
    width: usize,
    height: usize,
    format: &SampleFormat,
) -> Result<Array2D> {
    let mut out = Array2D::new(width, height);
    for (i, sample) in out.data_mut().iter_mut().enumerate() {
        let raw = match r.read_uint::<BigEndian>(format.word_bytes) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && i == 0 => {
                return Err(Error::EndOfStream)
            }
            Err(e) => return Err(e.into()),
        };
        *sample = format.unpack(raw);
    }
    Ok(out)
}

/// Write a picture's planes in Y, Cb, Cr order.
pub fn write_picture(w: &mut impl Write, picture: &Picture, format: &SampleFormat) -> Result<()> {
    write_array(w, &picture.y, format)?;
    if picture.format().chroma.has_chroma() {
        write_array(w, &picture.cb, format)?;
        write_array(w, &picture.cr, format)?;
    }
    Ok(())
}

/// Read a picture's planes in Y, Cb, Cr order.
pub fn read_picture(
    r: &mut impl Read,
    picture_format: PictureFormat,
    format: &SampleFormat,
) -> Result<Picture> {
    let mut picture = Picture::new(picture_format);
    picture.y = read_array(r, picture_format.width, picture_format.height, format)?;
    if picture_format.chroma.has_chroma() {
        let cw = picture_format.chroma_width();
        let ch = picture_format.chroma_height();
        picture.cb = read_array(r, cw, ch, format)?;
        picture.cr = read_array(r, cw, ch, format)?;
    }
    Ok(picture)
}

/// Write a frame (fields already spatially interleaved).
pub fn write_frame(w: &mut impl Write, frame: &Frame, format: &SampleFormat) -> Result<()> {
    write_picture(w, frame.picture(), format)
}
