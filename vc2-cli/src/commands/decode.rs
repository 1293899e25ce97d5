//! The decode subcommand.

use std::io::Write;

use anyhow::Context;
use clap::{Args, ValueEnum};
use tracing::{info, warn};

use vc2_codec::{
    DataUnitReader, Decoder, DecoderConfig, DecoderOutput, OutputStage, UnitOutcome,
};
use vc2_core::error::{BitstreamError, Error};
use vc2_core::planar::{self, SampleFormat};

/// Pipeline stage selectable on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputArg {
    /// Fully decoded frames.
    #[default]
    Decoded,
    /// Dequantised transform coefficients.
    Transform,
    /// Quantised coefficients.
    Quantised,
    /// Per-slice quantisation indices.
    Indices,
}

impl OutputArg {
    fn stage(self) -> OutputStage {
        match self {
            OutputArg::Decoded => OutputStage::Decoded,
            OutputArg::Transform => OutputStage::Transform,
            OutputArg::Quantised => OutputStage::Quantised,
            OutputArg::Indices => OutputStage::Indices,
        }
    }
}

/// Decode a VC-2 stream to a planar file.
#[derive(Args, Debug)]
pub struct CmdDecode {
    /// Input VC-2 stream, or '-' for standard input
    #[arg(value_name = "IN")]
    in_file: String,

    /// Output planar file, or '-' for standard output
    #[arg(value_name = "OUT")]
    out_file: String,

    /// Pipeline stage to write
    #[arg(long, value_enum, default_value = "decoded")]
    output: OutputArg,
}

impl CmdDecode {
    /// Run the decode.
    pub fn run(&self) -> anyhow::Result<()> {
        let input = super::open_input(&self.in_file)?;
        let mut output = super::open_output(&self.out_file)?;

        let mut units = DataUnitReader::new(input);
        let mut decoder = Decoder::with_config(DecoderConfig {
            output: self.output.stage(),
        });

        loop {
            let unit = match units.next_unit() {
                Ok(Some(unit)) => unit,
                Ok(None) => break,
                Err(Error::Bitstream(BitstreamError::UnexpectedEnd)) => {
                    warn!("stream truncated mid data unit");
                    break;
                }
                Err(e) => return Err(e).context("failed to read the input stream"),
            };
            match decoder.process_unit(&unit) {
                Ok(UnitOutcome::Continue) => {}
                Ok(UnitOutcome::End) => break,
                Ok(UnitOutcome::Output(out)) => {
                    self.write_output(&mut output, &decoder, out)?;
                }
                Err(e) if e.is_recoverable() => warn!("dropping picture: {}", e),
                Err(e) => return Err(e).context("failed to decode the input stream"),
            }
        }

        output
            .flush()
            .with_context(|| format!("failed to write output file \"{}\"", self.out_file))?;
        info!("decoded {} frames", decoder.frames());
        Ok(())
    }

    fn write_output(
        &self,
        output: &mut Box<dyn Write>,
        decoder: &Decoder,
        out: DecoderOutput,
    ) -> anyhow::Result<()> {
        let result = match out {
            DecoderOutput::Frame(frame) => {
                let header = decoder
                    .sequence_header()
                    .context("frame emitted without a sequence header")?;
                let format = SampleFormat::offset_binary(header.bit_depth);
                planar::write_frame(output, &frame, &format)
            }
            DecoderOutput::Coefficients(picture) => {
                planar::write_picture(output, &picture, &SampleFormat::signed32())
            }
            DecoderOutput::Indices(indices) => {
                planar::write_array(output, &indices, &SampleFormat::unsigned8())
            }
        };
        result.with_context(|| format!("failed to write output file \"{}\"", self.out_file))
    }
}
