//! Property-based tests for bitstream operations.
//!
//! Uses proptest to verify round-trip correctness of BitReader/BitWriter
//! and the VC-2 variable-length codes.

use proptest::prelude::*;
use vc2_core::bitstream::{intlog2, BitReader, BitWriter};

proptest! {
    /// Writing and reading fixed-width values produces the same value.
    #[test]
    fn roundtrip_bits_variable_width(value in 0u32..=0xFFFF, width in 1u8..=16) {
        let masked_value = value & ((1u32 << width) - 1);

        let mut writer = BitWriter::new();
        writer.write_bits(masked_value, width).unwrap();
        writer.byte_align().unwrap();

        let mut reader = BitReader::new(writer.data());
        let read_value = reader.read_bits(width).unwrap();

        prop_assert_eq!(masked_value, read_value);
    }

    /// Individual bits round-trip correctly.
    #[test]
    fn roundtrip_individual_bits(bits in prop::collection::vec(any::<bool>(), 1..100)) {
        let mut writer = BitWriter::new();
        for &bit in &bits {
            writer.write_bit(bit).unwrap();
        }
        writer.byte_align().unwrap();

        let mut reader = BitReader::new(writer.data());
        for (i, &expected_bit) in bits.iter().enumerate() {
            let read_bit = reader.read_bit().unwrap();
            prop_assert_eq!(expected_bit, read_bit, "Mismatch at bit {}", i);
        }
    }

    /// The interleaved exp-Golomb unsigned code round-trips.
    #[test]
    fn roundtrip_uint(value in any::<u32>()) {
        let mut writer = BitWriter::new();
        writer.write_uint(value).unwrap();
        writer.byte_align().unwrap();

        let mut reader = BitReader::new(writer.data());
        prop_assert_eq!(reader.read_uint().unwrap(), value);
    }

    /// The interleaved exp-Golomb signed code round-trips.
    #[test]
    fn roundtrip_sint(value in -1_000_000i32..=1_000_000) {
        let mut writer = BitWriter::new();
        writer.write_sint(value).unwrap();
        writer.byte_align().unwrap();

        let mut reader = BitReader::new(writer.data());
        prop_assert_eq!(reader.read_sint().unwrap(), value);
    }

    /// Magnitude-plus-sign fixed-width values round-trip.
    #[test]
    fn roundtrip_bits_signed(value in -4095i32..=4095) {
        let mut writer = BitWriter::new();
        writer.write_bits_signed(value, 12).unwrap();
        writer.byte_align().unwrap();

        let mut reader = BitReader::new(writer.data());
        prop_assert_eq!(reader.read_bits_signed(12).unwrap(), value);
    }

    /// Mixed sequences of codes decode in order.
    #[test]
    fn roundtrip_mixed_codes(
        uints in prop::collection::vec(0u32..100_000, 1..10),
        sints in prop::collection::vec(-50_000i32..50_000, 1..10)
    ) {
        let mut writer = BitWriter::new();
        for (&u, &s) in uints.iter().zip(sints.iter()) {
            writer.write_uint(u).unwrap();
            writer.write_sint(s).unwrap();
        }
        writer.byte_align().unwrap();

        let mut reader = BitReader::new(writer.data());
        for (i, (&u, &s)) in uints.iter().zip(sints.iter()).enumerate() {
            prop_assert_eq!(reader.read_uint().unwrap(), u, "uint mismatch at {}", i);
            prop_assert_eq!(reader.read_sint().unwrap(), s, "sint mismatch at {}", i);
        }
    }

    /// Position bookkeeping matches the number of bits consumed.
    #[test]
    fn bit_position_tracking(bits_to_read in 1usize..64, data_len in 8usize..32) {
        let data: Vec<u8> = (0..data_len as u8).collect();
        let mut reader = BitReader::new(&data);

        let total_bits = data_len * 8;
        let bits_to_read = bits_to_read.min(total_bits);

        prop_assert_eq!(reader.position(), 0);
        prop_assert_eq!(reader.remaining_bits(), total_bits);

        for _ in 0..bits_to_read {
            reader.read_bit().ok();
        }

        prop_assert_eq!(reader.position(), bits_to_read);
        prop_assert_eq!(reader.remaining_bits(), total_bits - bits_to_read);
    }

    /// Byte alignment lands on a byte boundary from any phase.
    #[test]
    fn byte_alignment(initial_bits in 0u8..8, data in prop::collection::vec(any::<u8>(), 2..10)) {
        let mut reader = BitReader::new(&data);

        for _ in 0..initial_bits {
            let _ = reader.read_bit();
        }

        if initial_bits == 0 {
            prop_assert!(reader.is_byte_aligned());
        } else {
            prop_assert!(!reader.is_byte_aligned());
        }

        reader.byte_align();
        prop_assert!(reader.is_byte_aligned());
    }

    /// Alignment padding written by the writer is all zero bits.
    #[test]
    fn writer_alignment_pads_with_zeros(bits in 1u8..8) {
        let mut writer = BitWriter::new();
        for _ in 0..bits {
            writer.write_bit(true).unwrap();
        }
        writer.byte_align().unwrap();

        let data = writer.data();
        prop_assert_eq!(data.len(), 1);
        let pad_mask = (1u16 << (8 - bits)) as u8 - 1;
        prop_assert_eq!(data[0] & pad_mask, 0);
    }

    /// intlog2 is the bit width needed for values in 0..n.
    #[test]
    fn intlog2_is_ceil_log2(n in 1u64..=1_000_000) {
        let bits = intlog2(n);
        prop_assert!((1u64 << bits) >= n);
        if bits > 0 {
            prop_assert!((1u64 << (bits - 1)) < n);
        }
    }
}
