//! End-to-end stream scenarios: encode/decode round trips, interlaced
//! assembly, diagnostics and resynchronisation.

use vc2_codec::{
    DataUnitWriter, Decoder, DecoderConfig, DecoderOutput, Encoder, EncoderConfig, FrameRate,
    OutputStage, ParseCode, PicturePreamble, SequenceHeader, SliceProfile, WaveletKernel,
};
use vc2_core::bitstream::BitWriter;
use vc2_core::picture::{ChromaFormat, Frame, Picture, PictureFormat};
use vc2_core::planar::{self, SampleFormat};

/// Encode a sequence of frames into a complete stream.
fn encode_stream(config: EncoderConfig, frames: &[Frame]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut writer = DataUnitWriter::new(&mut out);
    let mut encoder = Encoder::new(config).unwrap();
    encoder.write_sequence_header(&mut writer).unwrap();
    for frame in frames {
        encoder.encode_frame(&mut writer, frame).unwrap();
    }
    encoder.finish(&mut writer).unwrap();
    drop(writer);
    out
}

/// Decode a stream, collecting every output.
fn decode_all(data: &[u8], config: DecoderConfig) -> Vec<DecoderOutput> {
    let mut decoder = Decoder::with_config(config);
    let mut outputs = Vec::new();
    decoder
        .decode(data, |output| {
            outputs.push(output);
            Ok(())
        })
        .unwrap();
    outputs
}

fn small_hq_config() -> EncoderConfig {
    EncoderConfig {
        width: 16,
        height: 16,
        chroma: ChromaFormat::C420,
        bit_depth: 8,
        interlaced: false,
        top_field_first: false,
        frame_rate: FrameRate::new(25, 1),
        kernel: WaveletKernel::LeGall53,
        depth: 1,
        x_slices: 2,
        y_slices: 2,
        qindex: 0,
        profile: SliceProfile::HighQuality {
            prefix_bytes: 0,
            size_scalar: 1,
        },
    }
}

/// A mid-grey frame: all samples zero before the offset-binary shift.
fn grey_frame(config: &EncoderConfig) -> Frame {
    let format = PictureFormat::new(
        config.width as usize,
        config.height as usize,
        config.chroma,
    );
    Frame::progressive(Picture::new(format))
}

fn decoded_bytes(outputs: &[DecoderOutput], bit_depth: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    let format = SampleFormat::offset_binary(bit_depth);
    for output in outputs {
        match output {
            DecoderOutput::Frame(frame) => {
                planar::write_frame(&mut bytes, frame, &format).unwrap()
            }
            other => panic!("expected a frame, got {:?}", other),
        }
    }
    bytes
}

#[test]
fn minimal_hq_decode_produces_grey() {
    let config = small_hq_config();
    let stream = encode_stream(config, &[grey_frame(&config)]);

    let outputs = decode_all(&stream, DecoderConfig::default());
    assert_eq!(outputs.len(), 1);

    let bytes = decoded_bytes(&outputs, 8);
    assert_eq!(bytes.len(), 16 * 16 + 2 * 8 * 8);
    assert!(bytes.iter().all(|&b| b == 128));
}

#[test]
fn minimal_ld_decode_produces_grey() {
    let config = EncoderConfig {
        profile: SliceProfile::LowDelay {
            bytes_num: 8,
            bytes_den: 1,
        },
        ..small_hq_config()
    };
    let stream = encode_stream(config, &[grey_frame(&config)]);

    let outputs = decode_all(&stream, DecoderConfig::default());
    let bytes = decoded_bytes(&outputs, 8);
    assert_eq!(bytes.len(), 384);
    assert!(bytes.iter().all(|&b| b == 128));
}

/// The 64x64 4:4:4 test image of the round-trip scenario, as planar bytes.
fn gradient_image() -> Vec<u8> {
    let mut bytes = Vec::with_capacity(3 * 64 * 64);
    for y in 0..64usize {
        for x in 0..64usize {
            bytes.push(((y + x) & 0xFF) as u8);
        }
    }
    bytes.extend(std::iter::repeat(128).take(2 * 64 * 64));
    bytes
}

fn roundtrip_config(profile: SliceProfile) -> EncoderConfig {
    EncoderConfig {
        width: 64,
        height: 64,
        chroma: ChromaFormat::C444,
        bit_depth: 8,
        interlaced: false,
        top_field_first: false,
        frame_rate: FrameRate::new(25, 1),
        kernel: WaveletKernel::LeGall53,
        depth: 2,
        x_slices: 4,
        y_slices: 4,
        qindex: 0,
        profile,
    }
}

#[test]
fn hq_roundtrip_is_lossless_at_qindex_zero() {
    let config = roundtrip_config(SliceProfile::HighQuality {
        prefix_bytes: 0,
        size_scalar: 2,
    });
    let image = gradient_image();

    let sample_format = SampleFormat::offset_binary(8);
    let picture_format = PictureFormat::new(64, 64, ChromaFormat::C444);
    let picture =
        planar::read_picture(&mut image.as_slice(), picture_format, &sample_format).unwrap();
    let frame = Frame::progressive(picture);

    let stream = encode_stream(config, &[frame]);
    let outputs = decode_all(&stream, DecoderConfig::default());
    assert_eq!(decoded_bytes(&outputs, 8), image);
}

#[test]
fn ld_roundtrip_is_lossless_at_qindex_zero() {
    // A generous fixed budget: plenty of room for every slice's
    // coefficients at quantiser zero.
    let config = roundtrip_config(SliceProfile::LowDelay {
        bytes_num: 1536,
        bytes_den: 1,
    });
    let image = gradient_image();

    let sample_format = SampleFormat::offset_binary(8);
    let picture_format = PictureFormat::new(64, 64, ChromaFormat::C444);
    let picture =
        planar::read_picture(&mut image.as_slice(), picture_format, &sample_format).unwrap();
    let frame = Frame::progressive(picture);

    let stream = encode_stream(config, &[frame]);
    let outputs = decode_all(&stream, DecoderConfig::default());
    assert_eq!(decoded_bytes(&outputs, 8), image);
}

#[test]
fn interlaced_fields_interleave_top_first() {
    let config = EncoderConfig {
        width: 16,
        height: 16,
        chroma: ChromaFormat::Mono,
        interlaced: true,
        top_field_first: true,
        ..small_hq_config()
    };

    let format = PictureFormat::new(16, 16, ChromaFormat::Mono);
    let mut picture = Picture::new(format);
    for y in 0..16 {
        let value = if y % 2 == 0 { 10 } else { -20 };
        for x in 0..16 {
            picture.y[(y, x)] = value;
        }
    }
    let mut frame = Frame::new(format, true, true);
    frame.set_picture(picture);

    let stream = encode_stream(config, &[frame]);
    let outputs = decode_all(&stream, DecoderConfig::default());

    // Two picture units, one emitted frame.
    assert_eq!(outputs.len(), 1);
    let DecoderOutput::Frame(decoded) = &outputs[0] else {
        panic!("expected a frame");
    };
    assert!(decoded.is_interlaced());
    for y in 0..16 {
        let expected = if y % 2 == 0 { 10 } else { -20 };
        assert!(
            decoded.picture().y.row(y).iter().all(|&v| v == expected),
            "row {} does not match its field",
            y
        );
    }
}

#[test]
fn diagnostic_indices_in_raster_order() {
    // Hand-built HQ picture: sixteen slices whose quantiser indices count
    // up in raster order, with empty coefficient blocks.
    let header = SequenceHeader {
        width: 16,
        height: 16,
        chroma: ChromaFormat::C420,
        interlaced: false,
        top_field_first: false,
        frame_rate: FrameRate::new(25, 1),
        bit_depth: 8,
    };
    let profile = SliceProfile::HighQuality {
        prefix_bytes: 0,
        size_scalar: 1,
    };

    let mut picture_payload = BitWriter::new();
    let preamble = PicturePreamble {
        picture_number: 0,
        kernel: WaveletKernel::LeGall53,
        depth: 1,
        x_slices: 4,
        y_slices: 4,
        profile,
        quant_matrix: None,
    };
    preamble.write(&mut picture_payload).unwrap();
    for qindex in 0..16u32 {
        picture_payload.write_bits(qindex, 8).unwrap();
        for _ in 0..3 {
            picture_payload.write_bits(0, 8).unwrap();
        }
    }

    let mut stream = Vec::new();
    let mut writer = DataUnitWriter::new(&mut stream);
    writer
        .write_unit(
            ParseCode::SequenceHeader,
            &header.to_payload(&profile).unwrap(),
        )
        .unwrap();
    writer
        .write_unit(ParseCode::HqPicture, picture_payload.data())
        .unwrap();
    writer.finish().unwrap();
    drop(writer);

    let outputs = decode_all(
        &stream,
        DecoderConfig {
            output: OutputStage::Indices,
        },
    );
    assert_eq!(outputs.len(), 1);
    let DecoderOutput::Indices(indices) = &outputs[0] else {
        panic!("expected indices");
    };

    let mut bytes = Vec::new();
    planar::write_array(&mut bytes, indices, &SampleFormat::unsigned8()).unwrap();
    let expected: Vec<u8> = (0..16).collect();
    assert_eq!(bytes, expected);
}

#[test]
fn diagnostic_coefficients_use_padded_dimensions() {
    // 18x18 at depth 2 pads to 20x20 (luma) and 12x12 (chroma).
    let config = EncoderConfig {
        width: 18,
        height: 18,
        depth: 2,
        ..small_hq_config()
    };
    let format = PictureFormat::new(18, 18, ChromaFormat::C420);
    let frame = Frame::progressive(Picture::new(format));

    let stream = encode_stream(config, &[frame]);
    let outputs = decode_all(
        &stream,
        DecoderConfig {
            output: OutputStage::Transform,
        },
    );
    assert_eq!(outputs.len(), 1);
    let DecoderOutput::Coefficients(coeffs) = &outputs[0] else {
        panic!("expected coefficients");
    };
    assert_eq!((coeffs.y.width(), coeffs.y.height()), (20, 20));
    assert_eq!((coeffs.cb.width(), coeffs.cb.height()), (12, 12));
}

#[test]
fn resync_skips_prepended_garbage() {
    let config = small_hq_config();
    let stream = encode_stream(config, &[grey_frame(&config)]);
    let clean = decoded_bytes(&decode_all(&stream, DecoderConfig::default()), 8);

    // 1024 bytes that never form the sync prefix.
    let mut dirty = vec![0xAA; 1024];
    dirty.extend_from_slice(&stream);

    let outputs = decode_all(&dirty, DecoderConfig::default());
    assert_eq!(decoded_bytes(&outputs, 8), clean);
}

#[test]
fn picture_before_sequence_header_is_skipped() {
    let config = small_hq_config();
    let stream = encode_stream(config, &[grey_frame(&config)]);

    // Split the stream after the sequence header unit and move the
    // header behind the first picture.
    let header_len = {
        let mut r = vc2_codec::DataUnitReader::new(stream.as_slice());
        let unit = r.next_unit().unwrap().unwrap();
        unit.info.next_offset as usize
    };
    let mut reordered = Vec::new();
    let picture_end = stream.len() - 13; // end-of-sequence unit
    reordered.extend_from_slice(&stream[header_len..picture_end]);
    reordered.extend_from_slice(&stream[..header_len]);
    reordered.extend_from_slice(&stream[picture_end..]);

    // The orphan picture is dropped with a diagnostic; the stream still
    // terminates cleanly with no decoded frames.
    let outputs = decode_all(&reordered, DecoderConfig::default());
    assert!(outputs.is_empty());
}
