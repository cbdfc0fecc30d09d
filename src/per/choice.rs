//! CHOICE discriminant: index as a constrained number over the root alternatives,
//! led by an extension bit when the type is extensible.

use super::integer::IntegerCodec;
use super::length::{decode_normally_small, encode_normally_small};
use super::Variant;
use crate::bits::{BitReader, BitWriter};
use crate::codec::CodecError;

/// Selected alternative: root index, or index among the extension additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminant {
    Root(usize),
    Extension(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceIndex {
    pub root_arms: usize,
    pub extensible: bool,
}

impl ChoiceIndex {
    pub fn new(root_arms: usize, extensible: bool) -> Self {
        ChoiceIndex { root_arms, extensible }
    }

    fn codec(&self) -> IntegerCodec {
        IntegerCodec::new(0, self.root_arms.saturating_sub(1) as i64)
    }

    pub fn encode(&self, w: &mut BitWriter, d: Discriminant, variant: Variant) -> Result<(), CodecError> {
        match d {
            Discriminant::Root(i) => {
                if i >= self.root_arms {
                    return Err(CodecError::InvalidChoiceId {
                        index: i as u64,
                        arms: self.root_arms,
                    });
                }
                if self.extensible {
                    w.write_bit(false)?;
                }
                self.codec().encode(w, i as i64, variant)
            }
            Discriminant::Extension(i) => {
                if !self.extensible {
                    return Err(CodecError::InvalidChoiceId {
                        index: (self.root_arms + i) as u64,
                        arms: self.root_arms,
                    });
                }
                w.write_bit(true)?;
                encode_normally_small(w, i as u64, variant)
            }
        }
    }

    pub fn decode(&self, r: &mut BitReader, variant: Variant) -> Result<Discriminant, CodecError> {
        if self.extensible && r.read_bit()? {
            return Ok(Discriminant::Extension(decode_normally_small(r, variant)? as usize));
        }
        let index = self.codec().decode_offset(r, variant)?;
        if index >= self.root_arms as u64 {
            log::error!("invalid choice id {} ({} alternatives)", index, self.root_arms);
            return Err(CodecError::InvalidChoiceId {
                index,
                arms: self.root_arms,
            });
        }
        Ok(Discriminant::Root(index as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(idx: ChoiceIndex, d: Discriminant) -> (Vec<u8>, usize) {
        let mut w = BitWriter::new();
        idx.encode(&mut w, d, Variant::Unaligned).unwrap();
        let bits = w.bits_consumed();
        (w.into_bytes(), bits)
    }

    #[test]
    fn root_index_width_follows_arm_count() {
        assert_eq!(encode(ChoiceIndex::new(2, false), Discriminant::Root(1)).1, 1);
        assert_eq!(encode(ChoiceIndex::new(16, false), Discriminant::Root(2)), (vec![0x20], 4));
        assert_eq!(encode(ChoiceIndex::new(1, false), Discriminant::Root(0)).1, 0);
        assert_eq!(encode(ChoiceIndex::new(3, true), Discriminant::Root(2)), (vec![0b0100_0000], 3));
    }

    #[test]
    fn unknown_root_index_is_invalid_choice_id() {
        // Three arms in two bits: index 3 has no arm.
        let idx = ChoiceIndex::new(3, false);
        let mut r = BitReader::new(&[0b1100_0000]);
        assert_eq!(
            idx.decode(&mut r, Variant::Unaligned),
            Err(CodecError::InvalidChoiceId { index: 3, arms: 3 })
        );
    }

    #[test]
    fn extension_index_is_normally_small() {
        let idx = ChoiceIndex::new(2, true);
        let (bytes, bits) = encode(idx, Discriminant::Extension(5));
        assert_eq!(bits, 8);
        assert_eq!(bytes, vec![0b1000_0101]);
        let mut r = BitReader::new(&bytes);
        assert_eq!(idx.decode(&mut r, Variant::Unaligned).unwrap(), Discriminant::Extension(5));
    }

    #[test]
    fn extension_on_closed_choice_is_rejected() {
        let mut w = BitWriter::new();
        assert!(matches!(
            ChoiceIndex::new(2, false).encode(&mut w, Discriminant::Extension(0), Variant::Unaligned),
            Err(CodecError::InvalidChoiceId { .. })
        ));
    }
}
