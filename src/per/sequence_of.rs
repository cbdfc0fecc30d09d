//! SEQUENCE OF: element count under a SIZE constraint, then the elements through an
//! element codec supplied by the caller.

use super::length::{decode_size, encode_size, SizeRange};
use super::Variant;
use crate::bits::{BitReader, BitWriter};
use crate::codec::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceOfCodec {
    pub size: SizeRange,
}

impl SequenceOfCodec {
    pub fn new(size: SizeRange) -> Self {
        SequenceOfCodec { size }
    }

    fn violation(&self, count: u64) -> CodecError {
        CodecError::CardinalityViolation {
            count,
            min: self.size.min,
            max: self.size.max,
        }
    }

    pub fn encode<T, F>(
        &self,
        w: &mut BitWriter,
        items: &[T],
        variant: Variant,
        mut element: F,
    ) -> Result<(), CodecError>
    where
        F: FnMut(&mut BitWriter, &T) -> Result<(), CodecError>,
    {
        let count = items.len() as u64;
        if !self.size.contains(count) && !self.size.extensible {
            return Err(self.violation(count));
        }
        encode_size(w, count, &self.size, variant)?;
        for item in items {
            element(w, item)?;
        }
        Ok(())
    }

    pub fn decode<T, F>(&self, r: &mut BitReader, variant: Variant, mut element: F) -> Result<Vec<T>, CodecError>
    where
        F: FnMut(&mut BitReader) -> Result<T, CodecError>,
    {
        let (count, extended) = decode_size(r, &self.size, variant)?;
        if !extended && !self.size.contains(count) {
            return Err(self.violation(count));
        }
        let mut items = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            items.push(element(r)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::per::IntegerCodec;

    #[test]
    fn integer_elements_with_per_element_bounds() {
        let codec = SequenceOfCodec::new(SizeRange::new(1, Some(4)));
        let element = IntegerCodec::new(0, 511);
        let mut w = BitWriter::new();
        codec
            .encode(&mut w, &[3i64, 511, 0], Variant::Unaligned, |w, v| {
                element.encode(w, *v, Variant::Unaligned)
            })
            .unwrap();
        assert_eq!(w.bits_consumed(), 2 + 3 * 9);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        let back = codec
            .decode(&mut r, Variant::Unaligned, |r| element.decode(r, Variant::Unaligned))
            .unwrap();
        assert_eq!(back, vec![3, 511, 0]);
    }

    #[test]
    fn fixed_count_writes_no_length() {
        let codec = SequenceOfCodec::new(SizeRange::fixed(2));
        let mut w = BitWriter::new();
        codec
            .encode(&mut w, &[true, false], Variant::Unaligned, |w, b| w.write_bit(*b))
            .unwrap();
        assert_eq!(w.bits_consumed(), 2);
    }

    #[test]
    fn count_outside_range_is_cardinality_violation() {
        let codec = SequenceOfCodec::new(SizeRange::new(1, Some(16)));
        let mut w = BitWriter::new();
        let err = codec
            .encode(&mut w, &Vec::<bool>::new(), Variant::Unaligned, |w, b| w.write_bit(*b))
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::CardinalityViolation { count: 0, min: 1, max: Some(16) }
        );
        assert!(matches!(
            codec.encode(&mut w, &[false; 17], Variant::Unaligned, |w, b| w.write_bit(*b)),
            Err(CodecError::CardinalityViolation { count: 17, .. })
        ));
    }

    #[test]
    fn decoded_count_above_max_is_cardinality_violation() {
        // SIZE(1..12) in 4 bits: offset 12 means 13 elements.
        let codec = SequenceOfCodec::new(SizeRange::new(1, Some(12)));
        let mut r = BitReader::new(&[0b1100_0000, 0, 0]);
        assert!(matches!(
            codec.decode(&mut r, Variant::Unaligned, |r| r.read_bit()),
            Err(CodecError::CardinalityViolation { count: 13, min: 1, max: Some(12) })
        ));
    }
}
