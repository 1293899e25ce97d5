//! Error types for the VC-2 library.
//!
//! This module provides the error hierarchy shared by every component of the
//! library.

use thiserror::Error;

/// Main error type for the VC-2 library.
#[derive(Error, Debug)]
pub enum Error {
    /// Stream framing errors (parse-info, data units).
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Codec errors (transform, quantisation, slices).
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Bitstream parsing errors.
    #[error("Bitstream error: {0}")]
    Bitstream(#[from] BitstreamError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// End of stream reached.
    #[error("End of stream")]
    EndOfStream,
}

/// Stream framing errors.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Parse-info prefix not found at the expected position.
    #[error("Lost synchronisation at offset {offset}")]
    OutOfSync { offset: u64 },

    /// Parse code not recognised.
    #[error("Unknown parse code 0x{code:02X}")]
    UnknownParseCode { code: u8 },

    /// A picture arrived before any sequence header.
    #[error("Picture data unit before any sequence header")]
    MissingSequenceHeader,

    /// Malformed parse-info header.
    #[error("Invalid parse info: {0}")]
    InvalidParseInfo(String),

    /// Unsupported base video format index.
    #[error("Unsupported base video format {index}")]
    UnsupportedVideoFormat { index: u32 },

    /// Generic stream error message.
    #[error("{0}")]
    Other(String),
}

impl From<String> for StreamError {
    fn from(s: String) -> Self {
        StreamError::Other(s)
    }
}

impl From<&str> for StreamError {
    fn from(s: &str) -> Self {
        StreamError::Other(s.to_string())
    }
}

/// Codec errors.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Second field's format disagrees with the first.
    #[error("Field format mismatch: first field {expected_width}x{expected_height}, second {width}x{height}")]
    FieldMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// Slice coefficients do not fit the fixed byte budget.
    #[error("Slice ({x},{y}) overflows its budget: {needed} bits > {budget} bits")]
    SliceOverflow {
        x: u32,
        y: u32,
        needed: usize,
        budget: usize,
    },

    /// Wavelet index outside the seven standard kernels.
    #[error("Unsupported wavelet index {index}")]
    UnsupportedWaveletIndex { index: u32 },

    /// Transform depth outside the supported range.
    #[error("Unsupported transform depth {depth}")]
    UnsupportedDepth { depth: u32 },

    /// No default quantisation matrix for this kernel/depth pair.
    #[error("No default quantisation matrix for wavelet index {index} at depth {depth}")]
    NoQuantMatrix { index: u32, depth: u32 },

    /// Quantisation index outside [0, 127].
    #[error("Quantisation index {qindex} out of range")]
    QuantIndexRange { qindex: u32 },

    /// Generic codec error message.
    #[error("{0}")]
    Other(String),
}

impl From<String> for CodecError {
    fn from(s: String) -> Self {
        CodecError::Other(s)
    }
}

impl From<&str> for CodecError {
    fn from(s: &str) -> Self {
        CodecError::Other(s.to_string())
    }
}

/// Bitstream parsing errors.
#[derive(Error, Debug)]
pub enum BitstreamError {
    /// Unexpected end of bitstream.
    #[error("Unexpected end of bitstream")]
    UnexpectedEnd,

    /// A variable-length code exceeded the representable range.
    #[error("Variable-length code overflow")]
    ValueOverflow,

    /// Byte-aligned access attempted at an unaligned position.
    #[error("Bit alignment error")]
    AlignmentError,

    /// Generic bitstream error message.
    #[error("{0}")]
    Other(String),
}

impl From<String> for BitstreamError {
    fn from(s: String) -> Self {
        BitstreamError::Other(s)
    }
}

impl From<&str> for BitstreamError {
    fn from(s: &str) -> Self {
        BitstreamError::Other(s.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Check if this is an end-of-stream error.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }

    /// Check if this error is recoverable (the stream can continue at the
    /// next data unit after dropping the current picture).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Stream(StreamError::OutOfSync { .. })
                | Error::Stream(StreamError::UnknownParseCode { .. })
                | Error::Stream(StreamError::MissingSequenceHeader)
                | Error::Codec(CodecError::FieldMismatch { .. })
                | Error::Bitstream(BitstreamError::UnexpectedEnd)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidParameter("test parameter".into());
        assert_eq!(err.to_string(), "Invalid parameter: test parameter");
    }

    #[test]
    fn test_stream_error_conversion() {
        let stream_err = StreamError::MissingSequenceHeader;
        let err: Error = stream_err.into();
        assert!(matches!(
            err,
            Error::Stream(StreamError::MissingSequenceHeader)
        ));
    }

    #[test]
    fn test_is_eof() {
        assert!(Error::EndOfStream.is_eof());
        assert!(!Error::Bitstream(BitstreamError::UnexpectedEnd).is_eof());
    }

    #[test]
    fn test_is_recoverable() {
        let recoverable = Error::Stream(StreamError::OutOfSync { offset: 42 });
        assert!(recoverable.is_recoverable());

        let fatal = Error::Codec(CodecError::SliceOverflow {
            x: 0,
            y: 0,
            needed: 128,
            budget: 64,
        });
        assert!(!fatal.is_recoverable());

        let io: Error = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(!io.is_recoverable());
    }
}
