// Codec implementations often use patterns that trigger clippy warnings
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]

//! VC-2 Video Codec
//!
//! This crate provides a pure Rust implementation of the SMPTE ST 2042
//! (VC-2) intra-frame wavelet video codec: the data-unit stream parser,
//! the low-delay and high-quality slice profiles, the dead-zone quantiser
//! with the standard quantisation matrices, and the seven wavelet kernels
//! as exact integer lifting.
//!
//! # Features
//!
//! - Stream synchronisation and resynchronisation on the parse-info prefix
//! - Low-delay (CBR) and high-quality (VBR) slice decoding and encoding
//! - Progressive and interlaced (two-field) picture assembly
//! - Constant-quantiser encoding in both profiles
//! - Diagnostic outputs: quantiser indices, quantised and dequantised
//!   transform coefficients
//!
//! # Example
//!
//! ```no_run
//! use vc2_codec::{Decoder, DecoderOutput};
//!
//! let file = std::fs::File::open("stream.vc2").unwrap();
//! let mut decoder = Decoder::new();
//! decoder
//!     .decode(std::io::BufReader::new(file), |output| {
//!         if let DecoderOutput::Frame(frame) = output {
//!             println!("decoded {}x{}", frame.format().width, frame.format().height);
//!         }
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

mod decoder;
mod encoder;
mod quant;
mod slice;
mod stream;
mod tables;
mod types;
mod wavelet;

pub use decoder::{Decoder, DecoderConfig, DecoderOutput, OutputStage, UnitOutcome};
pub use encoder::{Encoder, EncoderConfig};
pub use quant::{dequantise, quantise, DequantVariant};
pub use slice::{merge_blocks, split_blocks, SliceBlock, Slices};
pub use stream::{
    DataUnit, DataUnitReader, DataUnitWriter, ParseInfo, PicturePreamble, SequenceHeader,
    PARSE_INFO_PREFIX, PARSE_INFO_SIZE,
};
pub use tables::{quant_factor, quant_matrix};
pub use types::{FrameRate, ParseCode, SliceProfile, WaveletKernel};
pub use wavelet::{
    forward_transform, inverse_transform, padded_size, Subband, SubbandRect, TransformFormat,
};
