//! The encode subcommand.

use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use tracing::info;

use vc2_codec::{DataUnitWriter, Encoder, EncoderConfig, FrameRate, SliceProfile, WaveletKernel};
use vc2_core::error::Error;
use vc2_core::picture::{ChromaFormat, Frame, PictureFormat};
use vc2_core::planar::{self, SampleFormat};

/// Chroma format selectable on the command line.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ChromaArg {
    /// 4:4:4
    C444,
    /// 4:2:2
    C422,
    /// 4:2:0
    C420,
    /// Luma only
    Mono,
}

impl ChromaArg {
    fn format(self) -> ChromaFormat {
        match self {
            ChromaArg::C444 => ChromaFormat::C444,
            ChromaArg::C422 => ChromaFormat::C422,
            ChromaArg::C420 => ChromaFormat::C420,
            ChromaArg::Mono => ChromaFormat::Mono,
        }
    }
}

/// Wavelet kernel selectable on the command line.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum KernelArg {
    /// Deslauriers-Dubuc (9,7)
    Dd97,
    /// LeGall (5,3)
    Legall,
    /// Deslauriers-Dubuc (13,7)
    Dd137,
    /// Haar without shift
    Haar0,
    /// Haar with a shift per level
    Haar1,
    /// Fidelity
    Fidelity,
    /// Daubechies (9,7)
    Daub97,
}

impl KernelArg {
    fn kernel(self) -> WaveletKernel {
        match self {
            KernelArg::Dd97 => WaveletKernel::DeslauriersDubuc97,
            KernelArg::Legall => WaveletKernel::LeGall53,
            KernelArg::Dd137 => WaveletKernel::DeslauriersDubuc137,
            KernelArg::Haar0 => WaveletKernel::Haar0,
            KernelArg::Haar1 => WaveletKernel::Haar1,
            KernelArg::Fidelity => WaveletKernel::Fidelity,
            KernelArg::Daub97 => WaveletKernel::Daubechies97,
        }
    }
}

/// Encode raw planar frames into a VC-2 stream.
#[derive(Args, Debug)]
pub struct CmdEncode {
    /// Input planar file, or '-' for standard input
    #[arg(value_name = "IN")]
    in_file: String,

    /// Output VC-2 stream, or '-' for standard output
    #[arg(value_name = "OUT")]
    out_file: String,

    /// Frame width in luma samples
    #[arg(long)]
    width: u32,

    /// Frame height in luma samples
    #[arg(long)]
    height: u32,

    /// Chroma format of the input
    #[arg(long, value_enum, default_value = "c420")]
    chroma: ChromaArg,

    /// Sample bit depth of the input
    #[arg(long, default_value_t = 8)]
    bit_depth: u32,

    /// Input frames are interlaced; code them as field pairs
    #[arg(long)]
    interlaced: bool,

    /// The top field is first in time
    #[arg(long, requires = "interlaced")]
    top_field_first: bool,

    /// Frame rate, as an integer or a "num/den" fraction
    #[arg(long, default_value = "25")]
    frame_rate: String,

    /// Wavelet kernel
    #[arg(long, value_enum, default_value = "legall")]
    kernel: KernelArg,

    /// Transform depth
    #[arg(long, default_value_t = 2)]
    depth: u32,

    /// Horizontal slice count
    #[arg(long, default_value_t = 4)]
    x_slices: u32,

    /// Vertical slice count
    #[arg(long, default_value_t = 4)]
    y_slices: u32,

    /// Constant quantisation index (0..=127)
    #[arg(long, default_value_t = 0)]
    qindex: u32,

    /// Use the low-delay profile with this many bytes per slice
    /// (integer or "num/den" fraction)
    #[arg(long, value_name = "BYTES")]
    ld_slice_bytes: Option<String>,

    /// High-quality profile slice size scalar
    #[arg(long, default_value_t = 1, conflicts_with = "ld_slice_bytes")]
    hq_scalar: u32,

    /// High-quality profile slice prefix bytes
    #[arg(long, default_value_t = 0, conflicts_with = "ld_slice_bytes")]
    hq_prefix: u32,
}

/// Parse an integer or "num/den" fraction.
fn parse_fraction(text: &str) -> anyhow::Result<(u32, u32)> {
    let (num, den) = match text.split_once('/') {
        Some((num, den)) => (num.trim(), den.trim()),
        None => (text.trim(), "1"),
    };
    let num: u32 = num
        .parse()
        .with_context(|| format!("invalid fraction \"{}\"", text))?;
    let den: u32 = den
        .parse()
        .with_context(|| format!("invalid fraction \"{}\"", text))?;
    if den == 0 {
        bail!("fraction \"{}\" has a zero denominator", text);
    }
    Ok((num, den))
}

impl CmdEncode {
    /// Run the encode.
    pub fn run(&self) -> anyhow::Result<()> {
        let (rate_num, rate_den) = parse_fraction(&self.frame_rate)?;
        let profile = match &self.ld_slice_bytes {
            Some(bytes) => {
                let (bytes_num, bytes_den) = parse_fraction(bytes)?;
                SliceProfile::LowDelay {
                    bytes_num,
                    bytes_den,
                }
            }
            None => SliceProfile::HighQuality {
                prefix_bytes: self.hq_prefix,
                size_scalar: self.hq_scalar,
            },
        };

        let config = EncoderConfig {
            width: self.width,
            height: self.height,
            chroma: self.chroma.format(),
            bit_depth: self.bit_depth,
            interlaced: self.interlaced,
            top_field_first: self.top_field_first,
            frame_rate: FrameRate::new(rate_num, rate_den),
            kernel: self.kernel.kernel(),
            depth: self.depth,
            x_slices: self.x_slices,
            y_slices: self.y_slices,
            qindex: self.qindex,
            profile,
        };
        let mut encoder = Encoder::new(config).context("invalid encoder configuration")?;

        let mut input = super::open_input(&self.in_file)?;
        let output = super::open_output(&self.out_file)?;
        let mut writer = DataUnitWriter::new(output);

        let frame_format = PictureFormat::new(
            self.width as usize,
            self.height as usize,
            self.chroma.format(),
        );
        let sample_format = SampleFormat::offset_binary(self.bit_depth);

        encoder
            .write_sequence_header(&mut writer)
            .context("failed to write the sequence header")?;

        let mut frames = 0u64;
        loop {
            let picture = match planar::read_picture(&mut input, frame_format, &sample_format) {
                Ok(picture) => picture,
                Err(Error::EndOfStream) => break,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to read frame {} from input", frames))
                }
            };
            let frame = if self.interlaced {
                let mut frame = Frame::new(frame_format, true, self.top_field_first);
                frame.set_picture(picture);
                frame
            } else {
                Frame::progressive(picture)
            };
            encoder
                .encode_frame(&mut writer, &frame)
                .with_context(|| format!("failed to encode frame {}", frames))?;
            frames += 1;
        }

        encoder
            .finish(&mut writer)
            .context("failed to finish the stream")?;
        info!(
            "encoded {} frames, {} bytes",
            frames,
            writer.bytes_written()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_fraction("25").unwrap(), (25, 1));
        assert_eq!(parse_fraction("30000/1001").unwrap(), (30000, 1001));
        assert!(parse_fraction("8/0").is_err());
        assert!(parse_fraction("abc").is_err());
    }
}
