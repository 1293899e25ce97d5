//! The stream decoder.
//!
//! The decoder owns the live sequence state (the most recent sequence
//! header) and, for interlaced material, the pending first field between
//! the two picture units of a frame. Data units are dispatched one at a
//! time; pictures flow through slice parsing, inverse quantisation and the
//! inverse wavelet transform, with optional short-circuit outputs after
//! each stage.

use std::io::Read;

use log::{debug, warn};

use vc2_core::array::Array2D;
use vc2_core::bitstream::BitReader;
use vc2_core::error::{BitstreamError, Error, Result, StreamError};
use vc2_core::picture::{Frame, Picture, PictureFormat};

use crate::quant::{dequantise_picture, DequantVariant};
use crate::slice::{merge_blocks, read_slices};
use crate::stream::{DataUnit, DataUnitReader, PicturePreamble, SequenceHeader};
use crate::tables::quant_matrix;
use crate::types::ParseCode;
use crate::wavelet::{inverse_transform, TransformFormat};

/// Which stage of the pipeline to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStage {
    /// Fully decoded frames.
    #[default]
    Decoded,
    /// Dequantised transform coefficients, before the inverse wavelet.
    Transform,
    /// Quantised coefficients, straight out of the slices.
    Quantised,
    /// Per-slice quantisation indices.
    Indices,
}

/// Decoder configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderConfig {
    /// Pipeline stage to emit.
    pub output: OutputStage,
}

/// One emitted output.
#[derive(Debug, Clone)]
pub enum DecoderOutput {
    /// A decoded frame, clipped to the sequence bit depth.
    Frame(Frame),
    /// Coefficient planes at padded (transform-domain) dimensions.
    Coefficients(Picture),
    /// The per-slice quantisation index grid of one picture.
    Indices(Array2D),
}

/// The result of dispatching one data unit.
#[derive(Debug)]
pub enum UnitOutcome {
    /// State updated or unit skipped; nothing to emit.
    Continue,
    /// An output is ready.
    Output(DecoderOutput),
    /// End of sequence.
    End,
}

/// VC-2 stream decoder.
pub struct Decoder {
    config: DecoderConfig,
    header: Option<SequenceHeader>,
    pending_field: Option<Picture>,
    frames: u64,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Create a decoder emitting decoded frames.
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Create a decoder with an explicit configuration.
    pub fn with_config(config: DecoderConfig) -> Self {
        Decoder {
            config,
            header: None,
            pending_field: None,
            frames: 0,
        }
    }

    /// Number of frames emitted so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The sequence header currently in force.
    pub fn sequence_header(&self) -> Option<&SequenceHeader> {
        self.header.as_ref()
    }

    /// Dispatch a single data unit.
    pub fn process_unit(&mut self, unit: &DataUnit) -> Result<UnitOutcome> {
        debug!("data unit: {}", unit.info.code);
        match unit.info.code {
            ParseCode::SequenceHeader => {
                let header = SequenceHeader::parse(&unit.payload)?;
                debug!(
                    "sequence header: {}x{} chroma {:?} {} {} fps, {} bit",
                    header.width,
                    header.height,
                    header.chroma,
                    if header.interlaced {
                        "interlaced"
                    } else {
                        "progressive"
                    },
                    header.frame_rate,
                    header.bit_depth,
                );
                if self.pending_field.take().is_some() {
                    warn!("sequence header arrived mid-frame, dropping pending field");
                }
                self.header = Some(header);
                Ok(UnitOutcome::Continue)
            }
            ParseCode::EndOfSequence => {
                debug!("end of sequence after {} frames", self.frames);
                Ok(UnitOutcome::End)
            }
            ParseCode::AuxiliaryData | ParseCode::Padding => Ok(UnitOutcome::Continue),
            ParseCode::Unknown(code) => {
                warn!("{}, skipping", Error::Stream(StreamError::UnknownParseCode { code }));
                Ok(UnitOutcome::Continue)
            }
            ParseCode::LdPicture | ParseCode::HqPicture => {
                let Some(header) = self.header else {
                    warn!("cannot decode picture, no previous sequence header");
                    return Ok(UnitOutcome::Continue);
                };
                self.decode_picture(&header, unit)
            }
        }
    }

    fn decode_picture(&mut self, header: &SequenceHeader, unit: &DataUnit) -> Result<UnitOutcome> {
        let mut reader = BitReader::new(&unit.payload);
        let preamble = PicturePreamble::parse(&mut reader, unit.info.code)?;
        debug!(
            "picture {}: {} depth {} with {}x{} slices",
            preamble.picture_number,
            preamble.kernel,
            preamble.depth,
            preamble.x_slices,
            preamble.y_slices,
        );

        let picture_height = if header.interlaced {
            header.height as usize / 2
        } else {
            header.height as usize
        };
        let picture_format =
            PictureFormat::new(header.width as usize, picture_height, header.chroma);
        let transform_format = TransformFormat::new(picture_format, preamble.depth);

        let matrix = match &preamble.quant_matrix {
            Some(custom) => custom.clone(),
            None => quant_matrix(preamble.kernel, preamble.depth)?,
        };
        debug!("quantisation matrix: {:?}", matrix);

        let slices = read_slices(
            &mut reader,
            &transform_format,
            preamble.x_slices as usize,
            preamble.y_slices as usize,
            &preamble.profile,
        )?;

        if self.config.output == OutputStage::Indices {
            return Ok(UnitOutcome::Output(DecoderOutput::Indices(slices.qindices)));
        }

        let mut coefficients = merge_blocks(&slices);
        if self.config.output == OutputStage::Quantised {
            return Ok(UnitOutcome::Output(DecoderOutput::Coefficients(
                coefficients,
            )));
        }

        let variant = match unit.info.code {
            ParseCode::LdPicture => DequantVariant::LowDelay,
            _ => DequantVariant::HighQuality,
        };
        dequantise_picture(
            &mut coefficients,
            &transform_format,
            &slices.qindices,
            &matrix,
            variant,
        );
        if self.config.output == OutputStage::Transform {
            return Ok(UnitOutcome::Output(DecoderOutput::Coefficients(
                coefficients,
            )));
        }

        let picture = inverse_transform(&coefficients, &transform_format, preamble.kernel);

        if !header.interlaced {
            let mut frame = Frame::progressive(picture);
            frame.clip(header.bit_depth, header.bit_depth);
            self.frames += 1;
            return Ok(UnitOutcome::Output(DecoderOutput::Frame(frame)));
        }

        match self.pending_field.take() {
            None => {
                self.pending_field = Some(picture);
                Ok(UnitOutcome::Continue)
            }
            Some(first) => {
                if first.format() != picture.format() {
                    let first_format = first.format();
                    warn!(
                        "{}, restarting field accumulation",
                        Error::Codec(vc2_core::error::CodecError::FieldMismatch {
                            expected_width: first_format.width as u32,
                            expected_height: first_format.height as u32,
                            width: picture.format().width as u32,
                            height: picture.format().height as u32,
                        })
                    );
                    self.pending_field = Some(picture);
                    return Ok(UnitOutcome::Continue);
                }
                let frame_format = PictureFormat::new(
                    header.width as usize,
                    header.height as usize,
                    header.chroma,
                );
                let mut frame = Frame::new(frame_format, true, header.top_field_first);
                frame.set_first_field(&first);
                frame.set_second_field(&picture);
                frame.clip(header.bit_depth, header.bit_depth);
                self.frames += 1;
                Ok(UnitOutcome::Output(DecoderOutput::Frame(frame)))
            }
        }
    }

    /// Drive a full decode over a raw byte stream, handing each output to
    /// `sink`. Per-picture failures are logged and the stream continues;
    /// everything else aborts the run. Returns the number of frames
    /// decoded.
    pub fn decode<R: Read>(
        &mut self,
        reader: R,
        mut sink: impl FnMut(DecoderOutput) -> Result<()>,
    ) -> Result<u64> {
        let mut units = DataUnitReader::new(reader);
        loop {
            let unit = match units.next_unit() {
                Ok(Some(unit)) => unit,
                Ok(None) => {
                    debug!("end of stream after {} frames", self.frames);
                    return Ok(self.frames);
                }
                Err(Error::Bitstream(BitstreamError::UnexpectedEnd)) => {
                    warn!("stream truncated mid data unit");
                    return Ok(self.frames);
                }
                Err(e) => return Err(e),
            };
            match self.process_unit(&unit) {
                Ok(UnitOutcome::Continue) => {}
                Ok(UnitOutcome::Output(output)) => sink(output)?,
                Ok(UnitOutcome::End) => return Ok(self.frames),
                Err(e) if e.is_recoverable() => {
                    warn!("dropping picture: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
