//! Extension additions: addition bitmap plus one length-prefixed open type per present addition.
//!
//! Wire layout after the root components of an extensible SEQUENCE whose extension bit is set:
//!
//! ```text
//! normally-small(n - 1) | n presence bits | open type for each present addition
//! open type = length determinant (octets) | content zero-padded to an octet boundary
//! ```
//!
//! `n` is the index of the last present addition plus one. A decoder that knows fewer than `n`
//! additions skips the unknown ones by their declared length. A count that cannot fit the
//! remaining input is malformed.

use super::length::{decode_length, decode_normally_small, encode_length, encode_normally_small};
use super::presence::{pack_presence, unpack_presence};
use super::Variant;
use crate::bits::{BitReader, BitWriter};
use crate::codec::CodecError;

/// Encode `content` as a standalone open type and append it as length plus octets.
/// An empty content is sent as a single zero octet.
pub fn pack_open_type<F>(w: &mut BitWriter, variant: Variant, content: F) -> Result<(), CodecError>
where
    F: FnOnce(&mut BitWriter) -> Result<(), CodecError>,
{
    let mut inner = BitWriter::new();
    content(&mut inner)?;
    inner.align_to_byte()?;
    let mut octets = inner.into_bytes();
    if octets.is_empty() {
        octets.push(0);
    }
    encode_length(w, octets.len(), variant)?;
    w.write_bytes(&octets)
}

/// Decode an open type with `content` inside a reader bounded by the declared length.
/// Bits left over after `content` (padding, or members appended by a newer peer) are skipped.
pub fn unpack_open_type<T, F>(r: &mut BitReader, variant: Variant, content: F) -> Result<T, CodecError>
where
    F: FnOnce(&mut BitReader) -> Result<T, CodecError>,
{
    let len = decode_length(r, variant)?;
    let mut region = r.take(len * 8)?;
    let value = content(&mut region).map_err(|e| match e {
        CodecError::OutOfRange { needed, available } => CodecError::MalformedExtension(format!(
            "content overruns its declared length of {} octets ({} bits needed, {} left)",
            len, needed, available
        )),
        other => other,
    })?;
    if region.remaining_bits() >= 8 {
        log::debug!(
            "open type: {} trailing bits of {} octets ignored",
            region.remaining_bits(),
            len
        );
    }
    Ok(value)
}

/// Skip an open type by its declared length; returns the length in octets.
pub fn skip_open_type(r: &mut BitReader, variant: Variant) -> Result<usize, CodecError> {
    let len = decode_length(r, variant)?;
    r.skip_bits(len * 8)?;
    Ok(len)
}

/// Pack the addition bitmap and the present additions. `present` holds one flag per addition
/// known to the schema; at least one must be set (the caller wrote extension bit 1).
pub fn pack_extension_additions<F>(
    w: &mut BitWriter,
    variant: Variant,
    present: &[bool],
    mut content: F,
) -> Result<(), CodecError>
where
    F: FnMut(usize, &mut BitWriter) -> Result<(), CodecError>,
{
    let n = present
        .iter()
        .rposition(|&p| p)
        .map(|i| i + 1)
        .ok_or_else(|| CodecError::MalformedExtension("extension bit set without additions".to_string()))?;
    encode_normally_small(w, (n - 1) as u64, variant)?;
    pack_presence(w, &present[..n])?;
    for (i, &p) in present[..n].iter().enumerate() {
        if p {
            pack_open_type(w, variant, |inner| content(i, inner))?;
        }
    }
    Ok(())
}

/// Unpack the addition bitmap and decode the present additions among the first `known`.
/// Present additions beyond `known` are skipped. Returns the received bitmap.
pub fn unpack_extension_additions<F>(
    r: &mut BitReader,
    variant: Variant,
    known: usize,
    mut content: F,
) -> Result<Vec<bool>, CodecError>
where
    F: FnMut(usize, &mut BitReader) -> Result<(), CodecError>,
{
    let count = decode_normally_small(r, variant)?;
    let n = count
        .checked_add(1)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| CodecError::MalformedExtension(format!("addition count {} out of range", count)))?;
    if n > r.remaining_bits() {
        return Err(CodecError::MalformedExtension(format!(
            "addition bitmap of {} bits exceeds the remaining {} bits",
            n,
            r.remaining_bits()
        )));
    }
    let present = unpack_presence(r, n)?;
    for (i, &p) in present.iter().enumerate() {
        if !p {
            continue;
        }
        if i < known {
            unpack_open_type(r, variant, |inner| content(i, inner))?;
        } else {
            let len = skip_open_type(r, variant)?;
            log::debug!("skipped unknown extension addition {} ({} octets)", i, len);
        }
    }
    Ok(present)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_type_is_padded_and_length_prefixed() {
        let mut w = BitWriter::new();
        w.write_bit(true).unwrap();
        pack_open_type(&mut w, Variant::Unaligned, |inner| inner.write_bits(0b101, 3)).unwrap();
        // 1 | 00000001 | 10100000
        assert_eq!(w.bits_consumed(), 17);
        assert_eq!(w.into_bytes(), vec![0x80, 0xd0, 0x00]);
    }

    #[test]
    fn empty_open_type_is_one_zero_octet() {
        let mut w = BitWriter::new();
        pack_open_type(&mut w, Variant::Unaligned, |_| Ok(())).unwrap();
        assert_eq!(w.into_bytes(), vec![0x01, 0x00]);
    }

    #[test]
    fn overrun_is_malformed_extension() {
        let data = [0x01, 0xff, 0xff];
        let mut r = BitReader::new(&data);
        let res = unpack_open_type(&mut r, Variant::Unaligned, |inner| inner.read_bits(12));
        assert!(matches!(res, Err(CodecError::MalformedExtension(_))));
    }

    #[test]
    fn additions_roundtrip_with_trailing_absent_trimmed() {
        let mut w = BitWriter::new();
        pack_extension_additions(&mut w, Variant::Unaligned, &[false, true, false], |i, inner| {
            inner.write_bits(i as u64, 8)
        })
        .unwrap();
        // n = 2: 0 000001 | 0 1 | len 1 | 0x01
        assert_eq!(w.bits_consumed(), 7 + 2 + 8 + 8);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        let mut seen = Vec::new();
        let present = unpack_extension_additions(&mut r, Variant::Unaligned, 3, |i, inner| {
            seen.push((i, inner.read_bits(8)?));
            Ok(())
        })
        .unwrap();
        assert_eq!(present, vec![false, true]);
        assert_eq!(seen, vec![(1, 1)]);
    }

    #[test]
    fn unknown_additions_are_skipped() {
        let mut w = BitWriter::new();
        pack_extension_additions(&mut w, Variant::Unaligned, &[true, true], |i, inner| {
            inner.write_bits(0xa0 + i as u64, 8)
        })
        .unwrap();
        w.write_bits(0x5, 3).unwrap();
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        let mut seen = Vec::new();
        unpack_extension_additions(&mut r, Variant::Unaligned, 1, |i, inner| {
            seen.push((i, inner.read_bits(8)?));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(0, 0xa0)]);
        assert_eq!(r.read_bits(3).unwrap(), 0x5);
    }

    #[test]
    fn no_present_addition_is_rejected() {
        let mut w = BitWriter::new();
        assert!(matches!(
            pack_extension_additions(&mut w, Variant::Unaligned, &[false], |_, _| Ok(())),
            Err(CodecError::MalformedExtension(_))
        ));
    }
}
