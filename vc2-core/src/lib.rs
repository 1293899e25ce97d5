//! # VC-2 Core
//!
//! Core types and utilities for the VC-2 (SMPTE ST 2042) codec library.
//!
//! This crate provides the building blocks shared by the codec and the
//! command-line tools:
//! - Error handling types
//! - Bit-level stream reading/writing with the VC-2 variable-length codes
//! - Two-dimensional sample arrays
//! - Picture and frame containers
//! - Planar (raw component) file reading/writing

pub mod array;
pub mod bitstream;
pub mod error;
pub mod picture;
pub mod planar;

pub use array::Array2D;
pub use bitstream::{BitReader, BitWriter};
pub use error::{BitstreamError, CodecError, Error, Result, StreamError};
pub use picture::{ChromaFormat, Frame, Picture, PictureFormat};
pub use planar::SampleFormat;
