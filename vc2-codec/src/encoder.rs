//! The constant-quantiser stream encoder.
//!
//! The encoder is the decoder's dual: frames are split into pictures,
//! padded and forward transformed, quantised with a single configured
//! index, partitioned into slices and framed as data units. There is no
//! rate control; in the low-delay profile a slice that cannot hold its
//! coefficients at the configured index is a fatal error.

use std::io::Write;

use log::debug;

use vc2_core::array::Array2D;
use vc2_core::bitstream::BitWriter;
use vc2_core::error::{CodecError, Error, Result};
use vc2_core::picture::{ChromaFormat, Frame, Picture};

use crate::quant::quantise_picture;
use crate::slice::{split_blocks, write_slices};
use crate::stream::{DataUnitWriter, PicturePreamble, SequenceHeader};
use crate::tables::quant_matrix;
use crate::types::{FrameRate, SliceProfile, WaveletKernel};
use crate::wavelet::{forward_transform, TransformFormat};

/// Encoder configuration.
#[derive(Debug, Clone, Copy)]
pub struct EncoderConfig {
    /// Luma frame width.
    pub width: u32,
    /// Luma frame height.
    pub height: u32,
    /// Chroma subsampling.
    pub chroma: ChromaFormat,
    /// Sample bit depth.
    pub bit_depth: u32,
    /// Code each frame as two field pictures.
    pub interlaced: bool,
    /// The top field is first in time.
    pub top_field_first: bool,
    /// Frame rate written to the sequence header.
    pub frame_rate: FrameRate,
    /// Wavelet kernel.
    pub kernel: WaveletKernel,
    /// Transform depth.
    pub depth: u32,
    /// Horizontal slice count.
    pub x_slices: u32,
    /// Vertical slice count.
    pub y_slices: u32,
    /// The constant quantisation index.
    pub qindex: u32,
    /// Slice profile with its wire parameters.
    pub profile: SliceProfile,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            chroma: ChromaFormat::C422,
            bit_depth: 10,
            interlaced: false,
            top_field_first: false,
            frame_rate: FrameRate::new(25, 1),
            kernel: WaveletKernel::LeGall53,
            depth: 3,
            x_slices: 60,
            y_slices: 34,
            qindex: 4,
            profile: SliceProfile::HighQuality {
                prefix_bytes: 0,
                size_scalar: 1,
            },
        }
    }
}

/// VC-2 stream encoder.
pub struct Encoder {
    config: EncoderConfig,
    matrix: Vec<i32>,
    picture_number: u32,
}

impl Encoder {
    /// Create an encoder, validating the configuration.
    pub fn new(config: EncoderConfig) -> Result<Self> {
        if config.qindex > 127 {
            return Err(Error::Codec(CodecError::QuantIndexRange {
                qindex: config.qindex,
            }));
        }
        if config.depth > 16 {
            return Err(Error::Codec(CodecError::UnsupportedDepth {
                depth: config.depth,
            }));
        }
        if config.x_slices == 0 || config.y_slices == 0 {
            return Err(Error::invalid_param("slice counts must be non-zero"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(Error::invalid_param("frame dimensions must be non-zero"));
        }
        if config.interlaced && config.height % 2 != 0 {
            return Err(Error::invalid_param(
                "interlaced frames need an even height",
            ));
        }
        if !(1..=16).contains(&config.bit_depth) {
            return Err(Error::invalid_param("bit depth must be 1..=16"));
        }
        let matrix = quant_matrix(config.kernel, config.depth)?;
        Ok(Encoder {
            config,
            matrix,
            picture_number: 0,
        })
    }

    /// The configuration in force.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// The sequence header this encoder emits.
    pub fn sequence_header(&self) -> SequenceHeader {
        SequenceHeader {
            width: self.config.width,
            height: self.config.height,
            chroma: self.config.chroma,
            interlaced: self.config.interlaced,
            top_field_first: self.config.top_field_first,
            frame_rate: self.config.frame_rate,
            bit_depth: self.config.bit_depth,
        }
    }

    /// Write the sequence header data unit.
    pub fn write_sequence_header<W: Write>(&self, writer: &mut DataUnitWriter<W>) -> Result<()> {
        let payload = self.sequence_header().to_payload(&self.config.profile)?;
        writer.write_unit(crate::types::ParseCode::SequenceHeader, &payload)
    }

    /// Encode one frame as one or two picture data units.
    pub fn encode_frame<W: Write>(
        &mut self,
        writer: &mut DataUnitWriter<W>,
        frame: &Frame,
    ) -> Result<()> {
        if self.config.interlaced {
            let first = frame.first_field();
            let second = frame.second_field();
            self.encode_picture(writer, &first)?;
            self.encode_picture(writer, &second)?;
        } else {
            self.encode_picture(writer, frame.picture())?;
        }
        Ok(())
    }

    /// Write the end-of-sequence unit and flush.
    pub fn finish<W: Write>(&self, writer: &mut DataUnitWriter<W>) -> Result<()> {
        writer.finish()
    }

    fn encode_picture<W: Write>(
        &mut self,
        writer: &mut DataUnitWriter<W>,
        picture: &Picture,
    ) -> Result<()> {
        let format = TransformFormat::new(picture.format(), self.config.depth);
        let mut coefficients = forward_transform(picture, &format, self.config.kernel);

        let mut qindices = Array2D::new(
            self.config.x_slices as usize,
            self.config.y_slices as usize,
        );
        qindices.fill(self.config.qindex as i32);

        quantise_picture(&mut coefficients, &format, &qindices, &self.matrix);
        let slices = split_blocks(
            &coefficients,
            &format,
            self.config.x_slices as usize,
            self.config.y_slices as usize,
            qindices,
        );

        let preamble = PicturePreamble {
            picture_number: self.picture_number,
            kernel: self.config.kernel,
            depth: self.config.depth,
            x_slices: self.config.x_slices,
            y_slices: self.config.y_slices,
            profile: self.config.profile,
            quant_matrix: None,
        };

        let mut payload = BitWriter::new();
        preamble.write(&mut payload)?;
        write_slices(&mut payload, &slices, &self.config.profile)?;

        debug!(
            "picture {}: {} coded bytes",
            self.picture_number,
            payload.data().len()
        );
        writer.write_unit(self.config.profile.parse_code(), payload.data())?;
        self.picture_number = self.picture_number.wrapping_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = EncoderConfig::default();
        assert!(Encoder::new(config).is_ok());

        config.qindex = 128;
        assert!(Encoder::new(config).is_err());

        config.qindex = 0;
        config.x_slices = 0;
        assert!(Encoder::new(config).is_err());

        config.x_slices = 4;
        config.depth = 5; // no default quantisation matrix
        assert!(Encoder::new(config).is_err());
    }

    #[test]
    fn test_interlaced_needs_even_height() {
        let config = EncoderConfig {
            height: 1081,
            interlaced: true,
            ..EncoderConfig::default()
        };
        assert!(Encoder::new(config).is_err());
    }
}
