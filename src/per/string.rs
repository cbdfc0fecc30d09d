//! BIT STRING and OCTET STRING contents (X.691 16, 17).
//!
//! Fixed sizes carry no length. In the aligned variant the content is octet-aligned unless
//! the fixed size is at most 16 bits (two octets); variable sizes are always aligned.

use super::length::{decode_size, encode_size, SizeRange};
use super::Variant;
use crate::bits::{BitReader, BitWriter};
use crate::codec::CodecError;
use crate::value::BitString;

fn aligned_content(size: &SizeRange, count: u64, extended: bool, fixed_limit: u64) -> bool {
    match size.fixed_size() {
        Some(fixed) if !extended => fixed > fixed_limit,
        _ => count > 0,
    }
}

fn check_size(size: &SizeRange, n: u64, what: &str) -> Result<(), CodecError> {
    if !size.contains(n) && !size.extensible {
        return Err(CodecError::ConstraintViolation(format!(
            "{} of size {} not in SIZE({})",
            what, n, size
        )));
    }
    Ok(())
}

pub fn encode_bit_string(
    w: &mut BitWriter,
    bits: &BitString,
    size: &SizeRange,
    variant: Variant,
) -> Result<(), CodecError> {
    let n = bits.len() as u64;
    check_size(size, n, "BIT STRING")?;
    encode_size(w, n, size, variant)?;
    if variant.is_aligned() && aligned_content(size, n, !size.contains(n), 16) {
        w.align_to_byte()?;
    }
    let full = bits.len() / 8;
    w.write_bytes(&bits.bytes()[..full])?;
    let rem = bits.len() % 8;
    if rem > 0 {
        let last = bits.bytes().get(full).copied().unwrap_or(0);
        w.write_bits((last >> (8 - rem)) as u64, rem as u32)?;
    }
    Ok(())
}

pub fn decode_bit_string(r: &mut BitReader, size: &SizeRange, variant: Variant) -> Result<BitString, CodecError> {
    let (n, extended) = decode_size(r, size, variant)?;
    if !extended {
        check_size(size, n, "BIT STRING")?;
    }
    if variant.is_aligned() && aligned_content(size, n, extended, 16) {
        r.align_to_byte()?;
    }
    let n = n as usize;
    if n > r.remaining_bits() {
        return Err(CodecError::OutOfRange {
            needed: n,
            available: r.remaining_bits(),
        });
    }
    let mut bytes = r.read_bytes(n / 8)?;
    let rem = n % 8;
    if rem > 0 {
        bytes.push((r.read_bits(rem as u32)? as u8) << (8 - rem));
    }
    Ok(BitString::new(bytes, n))
}

pub fn encode_octet_string(
    w: &mut BitWriter,
    octets: &[u8],
    size: &SizeRange,
    variant: Variant,
) -> Result<(), CodecError> {
    let n = octets.len() as u64;
    check_size(size, n, "OCTET STRING")?;
    encode_size(w, n, size, variant)?;
    if variant.is_aligned() && aligned_content(size, n, !size.contains(n), 2) {
        w.align_to_byte()?;
    }
    w.write_bytes(octets)
}

pub fn decode_octet_string(r: &mut BitReader, size: &SizeRange, variant: Variant) -> Result<Vec<u8>, CodecError> {
    let (n, extended) = decode_size(r, size, variant)?;
    if !extended {
        check_size(size, n, "OCTET STRING")?;
    }
    if variant.is_aligned() && aligned_content(size, n, extended, 2) {
        r.align_to_byte()?;
    }
    let n = n as usize;
    if n.saturating_mul(8) > r.remaining_bits() {
        return Err(CodecError::OutOfRange {
            needed: n.saturating_mul(8),
            available: r.remaining_bits(),
        });
    }
    r.read_bytes(n)
}
