//! Presence bitmap of a SEQUENCE: one bit per OPTIONAL or DEFAULT root component,
//! in declaration order, ahead of the components themselves.

use crate::bits::{BitReader, BitWriter};
use crate::codec::CodecError;

pub fn pack_presence(w: &mut BitWriter, flags: &[bool]) -> Result<(), CodecError> {
    for &present in flags {
        w.write_bit(present)?;
    }
    Ok(())
}

pub fn unpack_presence(r: &mut BitReader, count: usize) -> Result<Vec<bool>, CodecError> {
    if count > r.remaining_bits() {
        return Err(CodecError::OutOfRange {
            needed: count,
            available: r.remaining_bits(),
        });
    }
    (0..count).map(|_| r.read_bit()).collect()
}
