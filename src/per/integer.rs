//! Whole numbers: constrained (X.691 10.5), semi-constrained, unconstrained and extensible.

use super::length::{decode_length, encode_length};
use super::Variant;
use crate::bits::{BitReader, BitWriter};
use crate::codec::CodecError;

/// Bits needed to hold any offset in `0..=range`. Zero for a single-value range.
pub fn bits_needed(range: u64) -> u32 {
    64 - range.leading_zeros()
}

/// Minimal number of octets for an unsigned value (at least one).
pub(crate) fn octets_needed(v: u64) -> usize {
    ((bits_needed(v) + 7) / 8).max(1) as usize
}

fn write_unsigned_octets(w: &mut BitWriter, v: u64, n: usize) -> Result<(), CodecError> {
    w.write_bits(v, (n * 8) as u32)
}

fn read_unsigned_octets(r: &mut BitReader, n: usize) -> Result<u64, CodecError> {
    if n == 0 || n > 8 {
        return Err(CodecError::Unsupported(format!("integer of {} octets", n)));
    }
    r.read_bits((n * 8) as u32)
}

/// Constrained whole number over `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerCodec {
    pub lo: i64,
    pub hi: i64,
}

impl IntegerCodec {
    pub fn new(lo: i64, hi: i64) -> Self {
        IntegerCodec { lo, hi }
    }

    /// `hi - lo`.
    pub fn range(&self) -> u64 {
        (self.hi as i128 - self.lo as i128).max(0) as u64
    }

    /// Field width in the unaligned variant: `ceil(log2(hi - lo + 1))`.
    pub fn width(&self) -> u32 {
        bits_needed(self.range())
    }

    pub fn contains(&self, v: i64) -> bool {
        self.lo <= v && v <= self.hi
    }

    pub fn encode(&self, w: &mut BitWriter, value: i64, variant: Variant) -> Result<(), CodecError> {
        if !self.contains(value) {
            return Err(CodecError::ConstraintViolation(format!(
                "{} not in {}..{}",
                value, self.lo, self.hi
            )));
        }
        let offset = (value as i128 - self.lo as i128) as u64;
        match variant {
            Variant::Unaligned => w.write_bits(offset, self.width()),
            Variant::Aligned => self.encode_aligned(w, offset),
        }
    }

    fn encode_aligned(&self, w: &mut BitWriter, offset: u64) -> Result<(), CodecError> {
        let values = self.range() as u128 + 1;
        if values <= 255 {
            w.write_bits(offset, self.width())
        } else if values == 256 {
            w.align_to_byte()?;
            w.write_bits(offset, 8)
        } else if values <= 65536 {
            w.align_to_byte()?;
            w.write_bits(offset, 16)
        } else {
            let n = octets_needed(offset);
            self.octet_count().encode(w, n as i64, Variant::Unaligned)?;
            w.align_to_byte()?;
            write_unsigned_octets(w, offset, n)
        }
    }

    /// Octet count field used for ranges above 64K in the aligned variant.
    fn octet_count(&self) -> IntegerCodec {
        IntegerCodec::new(1, octets_needed(self.range()) as i64)
    }

    /// Decode and check `lo <= v <= hi`.
    pub fn decode(&self, r: &mut BitReader, variant: Variant) -> Result<i64, CodecError> {
        let offset = self.decode_offset(r, variant)?;
        let value = self.lo as i128 + offset as i128;
        if value > self.hi as i128 {
            return Err(CodecError::ConstraintViolation(format!(
                "decoded {} above {}..{}",
                value, self.lo, self.hi
            )));
        }
        Ok(value as i64)
    }

    /// Raw offset from `lo`, not checked against `hi`.
    pub fn decode_offset(&self, r: &mut BitReader, variant: Variant) -> Result<u64, CodecError> {
        match variant {
            Variant::Unaligned => r.read_bits(self.width()),
            Variant::Aligned => {
                let values = self.range() as u128 + 1;
                if values <= 255 {
                    r.read_bits(self.width())
                } else if values == 256 {
                    r.align_to_byte()?;
                    r.read_bits(8)
                } else if values <= 65536 {
                    r.align_to_byte()?;
                    r.read_bits(16)
                } else {
                    let n = self.octet_count().decode(r, Variant::Unaligned)? as usize;
                    r.align_to_byte()?;
                    read_unsigned_octets(r, n)
                }
            }
        }
    }
}

/// Minimal two's complement octets of `v`.
fn twos_complement_octets(v: i64) -> Vec<u8> {
    let be = v.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let (b, next) = (be[start], be[start + 1]);
        let redundant = (b == 0x00 && next & 0x80 == 0) || (b == 0xff && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    be[start..].to_vec()
}

/// Unconstrained whole number: length determinant plus two's complement octets.
pub fn encode_unconstrained(w: &mut BitWriter, value: i64, variant: Variant) -> Result<(), CodecError> {
    let octets = twos_complement_octets(value);
    encode_length(w, octets.len(), variant)?;
    w.write_bytes(&octets)
}

pub fn decode_unconstrained(r: &mut BitReader, variant: Variant) -> Result<i64, CodecError> {
    let n = decode_length(r, variant)?;
    if n == 0 || n > 8 {
        return Err(CodecError::Unsupported(format!("integer of {} octets", n)));
    }
    let octets = r.read_bytes(n)?;
    let mut v: i64 = if octets[0] & 0x80 != 0 { -1 } else { 0 };
    for b in octets {
        v = (v << 8) | b as i64;
    }
    Ok(v)
}

/// Semi-constrained whole number (`lo..MAX`): length determinant plus unsigned octets of `v - lo`.
pub fn encode_semi_constrained(
    w: &mut BitWriter,
    value: i64,
    lo: i64,
    variant: Variant,
) -> Result<(), CodecError> {
    if value < lo {
        return Err(CodecError::ConstraintViolation(format!("{} not in {}..MAX", value, lo)));
    }
    let offset = (value as i128 - lo as i128) as u64;
    let n = octets_needed(offset);
    encode_length(w, n, variant)?;
    write_unsigned_octets(w, offset, n)
}

pub fn decode_semi_constrained(r: &mut BitReader, lo: i64, variant: Variant) -> Result<i64, CodecError> {
    let n = decode_length(r, variant)?;
    let offset = read_unsigned_octets(r, n)?;
    let value = lo as i128 + offset as i128;
    if value > i64::MAX as i128 {
        return Err(CodecError::ConstraintViolation(format!("decoded {} overflows", value)));
    }
    Ok(value as i64)
}

/// INTEGER constraint as declared: `lo == None` is unconstrained, `hi == None` is `lo..MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntegerConstraint {
    pub lo: Option<i64>,
    pub hi: Option<i64>,
    pub extensible: bool,
}

impl IntegerConstraint {
    pub fn in_root(&self, v: i64) -> bool {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) => lo <= v && v <= hi,
            (Some(lo), None) => v >= lo,
            _ => true,
        }
    }

    pub fn encode(&self, w: &mut BitWriter, value: i64, variant: Variant) -> Result<(), CodecError> {
        if self.extensible {
            let in_root = self.in_root(value);
            w.write_bit(!in_root)?;
            if !in_root {
                return encode_unconstrained(w, value, variant);
            }
        }
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) => IntegerCodec::new(lo, hi).encode(w, value, variant),
            (Some(lo), None) => encode_semi_constrained(w, value, lo, variant),
            _ => encode_unconstrained(w, value, variant),
        }
    }

    pub fn decode(&self, r: &mut BitReader, variant: Variant) -> Result<i64, CodecError> {
        if self.extensible && r.read_bit()? {
            return decode_unconstrained(r, variant);
        }
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) => IntegerCodec::new(lo, hi).decode(r, variant),
            (Some(lo), None) => decode_semi_constrained(r, lo, variant),
            _ => decode_unconstrained(r, variant),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_aligned(codec: IntegerCodec, v: i64) -> Vec<u8> {
        let mut w = BitWriter::new();
        codec.encode(&mut w, v, Variant::Aligned).unwrap();
        w.into_bytes()
    }

    #[test]
    fn width_is_ceil_log2_of_value_count() {
        assert_eq!(IntegerCodec::new(0, 0).width(), 0);
        assert_eq!(IntegerCodec::new(7, 7).width(), 0);
        assert_eq!(IntegerCodec::new(0, 1).width(), 1);
        assert_eq!(IntegerCodec::new(0, 3).width(), 2);
        assert_eq!(IntegerCodec::new(1, 12).width(), 4);
        assert_eq!(IntegerCodec::new(0, 15).width(), 4);
        assert_eq!(IntegerCodec::new(0, 16).width(), 5);
        assert_eq!(IntegerCodec::new(-1, 510).width(), 9);
        assert_eq!(IntegerCodec::new(i64::MIN, i64::MAX).width(), 64);
    }

    #[test]
    fn width_does_not_depend_on_value() {
        let codec = IntegerCodec::new(0, 511);
        for v in [0, 1, 255, 511] {
            let mut w = BitWriter::new();
            codec.encode(&mut w, v, Variant::Unaligned).unwrap();
            assert_eq!(w.bits_consumed(), 9);
        }
    }

    #[test]
    fn single_value_range_takes_no_bits() {
        let codec = IntegerCodec::new(5, 5);
        let mut w = BitWriter::new();
        codec.encode(&mut w, 5, Variant::Unaligned).unwrap();
        assert_eq!(w.bits_consumed(), 0);
        let mut r = BitReader::new(&[]);
        assert_eq!(codec.decode(&mut r, Variant::Unaligned).unwrap(), 5);
    }

    #[test]
    fn encodes_offset_from_lower_bound() {
        let codec = IntegerCodec::new(1, 12);
        let mut w = BitWriter::new();
        codec.encode(&mut w, 12, Variant::Unaligned).unwrap();
        assert_eq!(w.into_bytes(), vec![0b1011_0000]);
    }

    #[test]
    fn rejects_out_of_range_on_encode() {
        let codec = IntegerCodec::new(0, 3);
        let mut w = BitWriter::new();
        assert!(matches!(
            codec.encode(&mut w, 4, Variant::Unaligned),
            Err(CodecError::ConstraintViolation(_))
        ));
        assert!(matches!(
            codec.encode(&mut w, -1, Variant::Unaligned),
            Err(CodecError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn rejects_decoded_value_above_upper_bound() {
        // 1..12 in 4 bits: offset 15 decodes to 16.
        let codec = IntegerCodec::new(1, 12);
        let mut r = BitReader::new(&[0xf0]);
        assert!(matches!(
            codec.decode(&mut r, Variant::Unaligned),
            Err(CodecError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn aligned_small_range_is_a_bit_field() {
        let mut w = BitWriter::new();
        w.write_bit(true).unwrap();
        IntegerCodec::new(0, 7).encode(&mut w, 5, Variant::Aligned).unwrap();
        assert_eq!(w.bits_consumed(), 4);
        assert_eq!(w.into_bytes(), vec![0b1101_0000]);
    }

    #[test]
    fn aligned_one_and_two_octet_ranges() {
        let mut w = BitWriter::new();
        w.write_bit(true).unwrap();
        IntegerCodec::new(0, 255).encode(&mut w, 0x42, Variant::Aligned).unwrap();
        assert_eq!(w.into_bytes(), vec![0x80, 0x42]);

        assert_eq!(encode_aligned(IntegerCodec::new(0, 65535), 0x1234), vec![0x12, 0x34]);
        assert_eq!(encode_aligned(IntegerCodec::new(10, 300), 11), vec![0x00, 0x01]);
    }

    #[test]
    fn aligned_large_range_uses_octet_count() {
        // 0..2^32-1: count 1..4 in 2 bits, then aligned octets.
        let codec = IntegerCodec::new(0, u32::MAX as i64);
        let bytes = encode_aligned(codec, 0x0102);
        assert_eq!(bytes, vec![0b0100_0000, 0x01, 0x02]);
        let mut r = BitReader::new(&bytes);
        assert_eq!(codec.decode(&mut r, Variant::Aligned).unwrap(), 0x0102);
    }

    #[test]
    fn unconstrained_twos_complement() {
        for (v, expect) in [
            (0i64, vec![0x01, 0x00]),
            (127, vec![0x01, 0x7f]),
            (128, vec![0x02, 0x00, 0x80]),
            (-1, vec![0x01, 0xff]),
            (-129, vec![0x02, 0xff, 0x7f]),
        ] {
            let mut w = BitWriter::new();
            encode_unconstrained(&mut w, v, Variant::Unaligned).unwrap();
            let bytes = w.into_bytes();
            assert_eq!(bytes, expect, "value {}", v);
            let mut r = BitReader::new(&bytes);
            assert_eq!(decode_unconstrained(&mut r, Variant::Unaligned).unwrap(), v);
        }
    }

    #[test]
    fn semi_constrained_offsets_from_lower_bound() {
        let mut w = BitWriter::new();
        encode_semi_constrained(&mut w, 300, 44, Variant::Unaligned).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes, vec![0x02, 0x01, 0x00]);
        let mut r = BitReader::new(&bytes);
        assert_eq!(decode_semi_constrained(&mut r, 44, Variant::Unaligned).unwrap(), 300);
    }

    #[test]
    fn extensible_integer_in_and_out_of_root() {
        let c = IntegerConstraint {
            lo: Some(0),
            hi: Some(7),
            extensible: true,
        };
        let mut w = BitWriter::new();
        c.encode(&mut w, 5, Variant::Unaligned).unwrap();
        assert_eq!(w.bits_consumed(), 4);
        c.encode(&mut w, 1000, Variant::Unaligned).unwrap();
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(c.decode(&mut r, Variant::Unaligned).unwrap(), 5);
        assert_eq!(c.decode(&mut r, Variant::Unaligned).unwrap(), 1000);
    }
}
