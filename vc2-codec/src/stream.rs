//! Data-unit framing: parse-info headers, synchronisation, and the coded
//! sequence header and picture preamble.
//!
//! A VC-2 stream is a chain of data units, each introduced by a 13-byte
//! parse-info header: the 4-byte sync prefix, a parse code, and big-endian
//! offsets to the next and previous headers. The decoder scans for the
//! prefix to join a stream mid-flow and rescans whenever the chain breaks.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder};
use log::{debug, warn};

use vc2_core::bitstream::{BitReader, BitWriter};
use vc2_core::error::{Error, Result, StreamError};
use vc2_core::picture::ChromaFormat;

use crate::types::{signal_range, FrameRate, ParseCode, SliceProfile, WaveletKernel};

/// The parse-info sync prefix ("BBCD").
pub const PARSE_INFO_PREFIX: [u8; 4] = [0x42, 0x42, 0x43, 0x44];

/// Total size of a parse-info header in bytes.
pub const PARSE_INFO_SIZE: usize = 13;

/// A decoded parse-info header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseInfo {
    /// The data-unit type.
    pub code: ParseCode,
    /// Bytes from the start of this header to the next (0 = rest of
    /// stream).
    pub next_offset: u32,
    /// Bytes back to the previous header (0 for the first unit).
    pub prev_offset: u32,
}

impl ParseInfo {
    /// Serialise the 13-byte header.
    pub fn to_bytes(&self) -> [u8; PARSE_INFO_SIZE] {
        let mut bytes = [0u8; PARSE_INFO_SIZE];
        bytes[..4].copy_from_slice(&PARSE_INFO_PREFIX);
        bytes[4] = self.code.byte();
        BigEndian::write_u32(&mut bytes[5..9], self.next_offset);
        BigEndian::write_u32(&mut bytes[9..13], self.prev_offset);
        bytes
    }

    /// Parse the 9 bytes following the sync prefix.
    pub fn from_tail(tail: &[u8; PARSE_INFO_SIZE - 4]) -> Self {
        ParseInfo {
            code: ParseCode::from_byte(tail[0]),
            next_offset: BigEndian::read_u32(&tail[1..5]),
            prev_offset: BigEndian::read_u32(&tail[5..9]),
        }
    }
}

/// One framed element of the stream: its header and payload bytes.
#[derive(Debug, Clone)]
pub struct DataUnit {
    /// The parse-info header.
    pub info: ParseInfo,
    /// Payload between this header and the next.
    pub payload: Vec<u8>,
}

/// Reads data units from a byte stream, synchronising on the parse-info
/// prefix and resynchronising after chain breaks.
pub struct DataUnitReader<R> {
    inner: R,
    /// Total bytes consumed, for diagnostics.
    offset: u64,
    synced: bool,
}

impl<R: Read> DataUnitReader<R> {
    /// Create a reader over a raw stream.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            synced: false,
        }
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Scan forward until the sync prefix has been consumed, starting with
    /// the already-read `seed` bytes. Returns false at end of stream.
    fn scan_for_prefix(&mut self, seed: &[u8], skipped: &mut u64) -> Result<bool> {
        let mut window = [0u8; 4];
        let mut filled = 0usize;
        let mut seed_pos = 0usize;
        loop {
            let byte = if seed_pos < seed.len() {
                seed_pos += 1;
                seed[seed_pos - 1]
            } else {
                match self.read_byte()? {
                    Some(b) => b,
                    None => return Ok(false),
                }
            };
            if filled < 4 {
                window[filled] = byte;
                filled += 1;
            } else {
                window.rotate_left(1);
                window[3] = byte;
                *skipped += 1;
            }
            if filled == 4 && window == PARSE_INFO_PREFIX {
                return Ok(true);
            }
        }
    }

    fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        for (i, slot) in buf.iter_mut().enumerate() {
            match self.read_byte()? {
                Some(b) => *slot = b,
                None if i == 0 => return Ok(false),
                None => {
                    return Err(Error::Bitstream(
                        vc2_core::error::BitstreamError::UnexpectedEnd,
                    ))
                }
            }
        }
        Ok(true)
    }

    /// Read the next data unit, or `None` at a clean end of stream.
    ///
    /// A broken chain (no sync prefix where one was expected) is reported
    /// with a warning and recovered by scanning forward.
    pub fn next_unit(&mut self) -> Result<Option<DataUnit>> {
        if !self.synced {
            let mut skipped = 0u64;
            if !self.scan_for_prefix(&[], &mut skipped)? {
                return Ok(None);
            }
            if skipped > 0 {
                debug!("synchronised after skipping {} bytes", skipped);
            }
            self.synced = true;
        } else {
            let mut prefix = [0u8; 4];
            match self.read_exact_or_eof(&mut prefix)? {
                false => return Ok(None),
                true if prefix == PARSE_INFO_PREFIX => {}
                true => {
                    let err = StreamError::OutOfSync {
                        offset: self.offset - 4,
                    };
                    warn!("{}, scanning for next parse info", Error::Stream(err));
                    let mut skipped = 0u64;
                    if !self.scan_for_prefix(&prefix, &mut skipped)? {
                        return Ok(None);
                    }
                }
            }
        }

        let mut tail = [0u8; PARSE_INFO_SIZE - 4];
        if !self.read_exact_or_eof(&mut tail)? {
            return Err(Error::Bitstream(
                vc2_core::error::BitstreamError::UnexpectedEnd,
            ));
        }
        let info = ParseInfo::from_tail(&tail);

        let payload = if info.next_offset == 0 {
            if info.code == ParseCode::EndOfSequence {
                Vec::new()
            } else {
                let mut rest = Vec::new();
                self.inner.read_to_end(&mut rest)?;
                self.offset += rest.len() as u64;
                rest
            }
        } else {
            let len = info.next_offset as usize;
            if len < PARSE_INFO_SIZE {
                return Err(Error::Stream(StreamError::InvalidParseInfo(format!(
                    "next offset {} smaller than the parse info header",
                    len
                ))));
            }
            let mut payload = vec![0u8; len - PARSE_INFO_SIZE];
            if !self.read_exact_or_eof(&mut payload)? && !payload.is_empty() {
                return Err(Error::Bitstream(
                    vc2_core::error::BitstreamError::UnexpectedEnd,
                ));
            }
            payload
        };

        Ok(Some(DataUnit { info, payload }))
    }
}

/// Writes a chain of data units, maintaining the offset fields.
pub struct DataUnitWriter<W> {
    inner: W,
    prev_size: u32,
    /// Total bytes written.
    written: u64,
}

impl<W: Write> DataUnitWriter<W> {
    /// Create a writer over a byte sink.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            prev_size: 0,
            written: 0,
        }
    }

    /// Frame and write one data unit.
    pub fn write_unit(&mut self, code: ParseCode, payload: &[u8]) -> Result<()> {
        let next_offset = (PARSE_INFO_SIZE + payload.len()) as u32;
        let info = ParseInfo {
            code,
            next_offset,
            prev_offset: self.prev_size,
        };
        self.inner.write_all(&info.to_bytes())?;
        self.inner.write_all(payload)?;
        self.prev_size = next_offset;
        self.written += u64::from(next_offset);
        Ok(())
    }

    /// Write the end-of-sequence unit and flush.
    pub fn finish(&mut self) -> Result<()> {
        self.write_unit(ParseCode::EndOfSequence, &[])?;
        self.inner.flush()?;
        Ok(())
    }

    /// Total bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

/// The interpreted sequence header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceHeader {
    /// Luma frame width.
    pub width: u32,
    /// Luma frame height.
    pub height: u32,
    /// Chroma subsampling.
    pub chroma: ChromaFormat,
    /// Pictures are fields rather than frames.
    pub interlaced: bool,
    /// The top field is first in time.
    pub top_field_first: bool,
    /// Frame rate.
    pub frame_rate: FrameRate,
    /// Sample bit depth (both luma and chroma).
    pub bit_depth: u32,
}

/// Defaults of base video format 0 (custom), overridden field by field.
const BASE_FORMAT_DEFAULTS: SequenceHeader = SequenceHeader {
    width: 640,
    height: 480,
    chroma: ChromaFormat::C420,
    interlaced: false,
    top_field_first: false,
    frame_rate: FrameRate { num: 24000, den: 1001 },
    bit_depth: 8,
};

impl SequenceHeader {
    /// Parse a sequence-header payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = BitReader::new(payload);

        // Parse parameters: versions, profile and level are read and not
        // otherwise interpreted.
        let _major_version = r.read_uint()?;
        let _minor_version = r.read_uint()?;
        let _profile = r.read_uint()?;
        let _level = r.read_uint()?;

        let base_format = r.read_uint()?;
        if base_format != 0 {
            return Err(Error::Stream(StreamError::UnsupportedVideoFormat {
                index: base_format,
            }));
        }
        let mut header = BASE_FORMAT_DEFAULTS;

        if r.read_bool()? {
            header.width = r.read_uint()?;
            header.height = r.read_uint()?;
        }
        if r.read_bool()? {
            let index = r.read_uint()?;
            header.chroma = ChromaFormat::from_index(index).ok_or_else(|| {
                Error::Stream(StreamError::Other(format!(
                    "unknown colour difference format {}",
                    index
                )))
            })?;
        }
        if r.read_bool()? {
            let source_sampling = r.read_uint()?;
            header.interlaced = source_sampling == 1;
            header.top_field_first = header.interlaced && r.read_bool()?;
        }
        if r.read_bool()? {
            let index = r.read_uint()?;
            header.frame_rate = if index == 0 {
                FrameRate::new(r.read_uint()?, r.read_uint()?)
            } else {
                FrameRate::from_preset(index).ok_or_else(|| {
                    Error::Stream(StreamError::Other(format!(
                        "unknown frame rate preset {}",
                        index
                    )))
                })?
            };
        }
        if r.read_bool()? {
            // Pixel aspect ratio: consumed, not interpreted.
            let index = r.read_uint()?;
            if index == 0 {
                let _num = r.read_uint()?;
                let _den = r.read_uint()?;
            }
        }
        if r.read_bool()? {
            // Clean area: consumed, not interpreted.
            for _ in 0..4 {
                let _ = r.read_uint()?;
            }
        }
        if r.read_bool()? {
            let index = r.read_uint()?;
            header.bit_depth = if index == 0 {
                let _luma_offset = r.read_uint()?;
                let luma_excursion = r.read_uint()?;
                let _chroma_offset = r.read_uint()?;
                let _chroma_excursion = r.read_uint()?;
                u32::from(vc2_core::bitstream::intlog2(u64::from(luma_excursion) + 1))
            } else {
                signal_range::bit_depth(index).ok_or_else(|| {
                    Error::Stream(StreamError::Other(format!(
                        "unknown signal range preset {}",
                        index
                    )))
                })?
            };
        }
        if r.read_bool()? {
            // Colour specification: consumed, not interpreted.
            let index = r.read_uint()?;
            if index == 0 {
                for _ in 0..3 {
                    if r.read_bool()? {
                        let _ = r.read_uint()?;
                    }
                }
            }
        }

        let picture_coding_mode = r.read_uint()?;
        header.interlaced = picture_coding_mode == 1;

        Ok(header)
    }

    /// Serialise a sequence-header payload.
    pub fn to_payload(&self, profile: &SliceProfile) -> Result<Vec<u8>> {
        let mut w = BitWriter::new();

        // Parse parameters.
        w.write_uint(3)?; // major version
        w.write_uint(0)?; // minor version
        w.write_uint(match profile {
            SliceProfile::LowDelay { .. } => 0,
            SliceProfile::HighQuality { .. } => 3,
        })?;
        w.write_uint(0)?; // level

        // Custom base format with explicit overrides for every field the
        // decoder interprets.
        w.write_uint(0)?;

        w.write_bool(true)?;
        w.write_uint(self.width)?;
        w.write_uint(self.height)?;

        w.write_bool(true)?;
        w.write_uint(self.chroma.index())?;

        w.write_bool(true)?;
        w.write_uint(u32::from(self.interlaced))?;
        if self.interlaced {
            w.write_bool(self.top_field_first)?;
        }

        w.write_bool(true)?;
        match self.frame_rate.preset_index() {
            Some(index) => w.write_uint(index)?,
            None => {
                w.write_uint(0)?;
                w.write_uint(self.frame_rate.num)?;
                w.write_uint(self.frame_rate.den)?;
            }
        }

        w.write_bool(false)?; // pixel aspect ratio
        w.write_bool(false)?; // clean area

        w.write_bool(true)?;
        match signal_range::from_bit_depth(self.bit_depth) {
            Some(index) => w.write_uint(index)?,
            None => {
                w.write_uint(0)?;
                let excursion = (1u32 << self.bit_depth) - 1;
                w.write_uint(0)?;
                w.write_uint(excursion)?;
                w.write_uint(1 << (self.bit_depth - 1))?;
                w.write_uint(excursion)?;
            }
        }

        w.write_bool(false)?; // colour specification

        w.write_uint(u32::from(self.interlaced))?;
        w.byte_align()?;
        Ok(w.into_data())
    }
}

/// The coded per-picture preamble: picture number, transform and slice
/// parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PicturePreamble {
    /// Picture number.
    pub picture_number: u32,
    /// Wavelet kernel.
    pub kernel: WaveletKernel,
    /// Transform depth.
    pub depth: u32,
    /// Horizontal slice count.
    pub x_slices: u32,
    /// Vertical slice count.
    pub y_slices: u32,
    /// Slice profile with its wire parameters.
    pub profile: SliceProfile,
    /// Custom quantisation matrix, if the stream carries one.
    pub quant_matrix: Option<Vec<i32>>,
}

impl PicturePreamble {
    /// Parse a picture preamble. `reader` is left byte-aligned at the
    /// start of the slice data.
    pub fn parse(reader: &mut BitReader, code: ParseCode) -> Result<Self> {
        let picture_number = reader.read_bits(32)?;
        let kernel = WaveletKernel::from_index(reader.read_uint()?)?;
        let depth = reader.read_uint()?;
        if depth > 16 {
            return Err(Error::Codec(vc2_core::error::CodecError::UnsupportedDepth {
                depth,
            }));
        }
        let x_slices = reader.read_uint()?;
        let y_slices = reader.read_uint()?;
        if x_slices == 0 || y_slices == 0 {
            return Err(Error::Stream(StreamError::Other(
                "picture with an empty slice grid".into(),
            )));
        }

        let profile = match code {
            ParseCode::LdPicture => {
                let bytes_num = reader.read_uint()?;
                let bytes_den = reader.read_uint()?;
                if bytes_den == 0 {
                    return Err(Error::Stream(StreamError::Other(
                        "low-delay slice bytes with zero denominator".into(),
                    )));
                }
                SliceProfile::LowDelay {
                    bytes_num,
                    bytes_den,
                }
            }
            ParseCode::HqPicture => {
                let prefix_bytes = reader.read_uint()?;
                let size_scalar = reader.read_uint()?;
                if size_scalar == 0 {
                    return Err(Error::Stream(StreamError::Other(
                        "high-quality slice size scalar of zero".into(),
                    )));
                }
                SliceProfile::HighQuality {
                    prefix_bytes,
                    size_scalar,
                }
            }
            other => {
                return Err(Error::Stream(StreamError::Other(format!(
                    "parse code {} is not a picture",
                    other
                ))))
            }
        };

        let quant_matrix = if reader.read_bool()? {
            let entries = 3 * depth as usize + 1;
            let mut matrix = Vec::with_capacity(entries);
            for _ in 0..entries {
                matrix.push(reader.read_uint()? as i32);
            }
            Some(matrix)
        } else {
            None
        };

        reader.byte_align();
        Ok(PicturePreamble {
            picture_number,
            kernel,
            depth,
            x_slices,
            y_slices,
            profile,
            quant_matrix,
        })
    }

    /// Serialise the preamble, leaving the writer byte-aligned for the
    /// slice data.
    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_bits(self.picture_number, 32)?;
        writer.write_uint(self.kernel.index())?;
        writer.write_uint(self.depth)?;
        writer.write_uint(self.x_slices)?;
        writer.write_uint(self.y_slices)?;
        match self.profile {
            SliceProfile::LowDelay {
                bytes_num,
                bytes_den,
            } => {
                writer.write_uint(bytes_num)?;
                writer.write_uint(bytes_den)?;
            }
            SliceProfile::HighQuality {
                prefix_bytes,
                size_scalar,
            } => {
                writer.write_uint(prefix_bytes)?;
                writer.write_uint(size_scalar)?;
            }
        }
        match &self.quant_matrix {
            Some(matrix) => {
                writer.write_bool(true)?;
                for &value in matrix {
                    writer.write_uint(value as u32)?;
                }
            }
            None => writer.write_bool(false)?,
        }
        writer.byte_align()?;
        Ok(())
    }
}
