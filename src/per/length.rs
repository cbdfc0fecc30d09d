//! Length determinants (X.691 11.9), size ranges and normally small numbers.

use super::integer::{octets_needed, IntegerCodec};
use super::Variant;
use crate::bits::{BitReader, BitWriter};
use crate::codec::CodecError;
use std::fmt;

/// Largest length encodable without fragmentation.
pub const MAX_LENGTH: usize = 16383;

/// Unconstrained length determinant: `0` + 7 bits below 128, `10` + 14 bits below 16K.
/// The aligned variant octet-aligns first.
pub fn encode_length(w: &mut BitWriter, len: usize, variant: Variant) -> Result<(), CodecError> {
    if variant.is_aligned() {
        w.align_to_byte()?;
    }
    if len < 128 {
        w.write_bits(len as u64, 8)
    } else if len <= MAX_LENGTH {
        w.write_bits(0x8000 | len as u64, 16)
    } else {
        log::error!("length {} requires fragmentation", len);
        Err(CodecError::Unsupported(format!("length {} requires fragmentation", len)))
    }
}

pub fn decode_length(r: &mut BitReader, variant: Variant) -> Result<usize, CodecError> {
    if variant.is_aligned() {
        r.align_to_byte()?;
    }
    if !r.read_bit()? {
        return Ok(r.read_bits(7)? as usize);
    }
    if !r.read_bit()? {
        return Ok(r.read_bits(14)? as usize);
    }
    log::error!("fragmented length determinant");
    Err(CodecError::Unsupported("fragmented length determinant".to_string()))
}

/// Normally small non-negative whole number (X.691 11.6).
pub fn encode_normally_small(w: &mut BitWriter, n: u64, variant: Variant) -> Result<(), CodecError> {
    if n <= 63 {
        w.write_bit(false)?;
        return w.write_bits(n, 6);
    }
    w.write_bit(true)?;
    let octets = octets_needed(n);
    encode_length(w, octets, variant)?;
    w.write_bits(n, (octets * 8) as u32)
}

pub fn decode_normally_small(r: &mut BitReader, variant: Variant) -> Result<u64, CodecError> {
    if !r.read_bit()? {
        return r.read_bits(6);
    }
    let octets = decode_length(r, variant)?;
    if octets == 0 || octets > 8 {
        return Err(CodecError::Unsupported(format!("normally small number of {} octets", octets)));
    }
    r.read_bits((octets * 8) as u32)
}

/// SIZE constraint of a string or SEQUENCE OF. `max == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRange {
    pub min: u64,
    pub max: Option<u64>,
    pub extensible: bool,
}

impl SizeRange {
    pub const UNCONSTRAINED: SizeRange = SizeRange {
        min: 0,
        max: None,
        extensible: false,
    };

    pub fn new(min: u64, max: Option<u64>) -> Self {
        SizeRange {
            min,
            max,
            extensible: false,
        }
    }

    pub fn fixed(n: u64) -> Self {
        SizeRange::new(n, Some(n))
    }

    pub fn extensible(mut self) -> Self {
        self.extensible = true;
        self
    }

    /// Within the root range.
    pub fn contains(&self, n: u64) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }

    /// Root size when it is fixed and small enough to carry no length.
    pub fn fixed_size(&self) -> Option<u64> {
        match self.max {
            Some(max) if max == self.min && max < 65536 => Some(max),
            _ => None,
        }
    }

    fn constrained(&self) -> Option<IntegerCodec> {
        match self.max {
            Some(max) if max < 65536 => Some(IntegerCodec::new(self.min as i64, max as i64)),
            _ => None,
        }
    }
}

impl fmt::Display for SizeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max)?,
            Some(max) => write!(f, "{}..{}", self.min, max)?,
            None => write!(f, "{}..MAX", self.min)?,
        }
        if self.extensible {
            write!(f, ", ...")?;
        }
        Ok(())
    }
}

/// Encode a count or length under `size`. The caller checks the root range first;
/// out-of-root values are only accepted for extensible sizes.
pub fn encode_size(w: &mut BitWriter, n: u64, size: &SizeRange, variant: Variant) -> Result<(), CodecError> {
    let in_root = size.contains(n);
    if size.extensible {
        w.write_bit(!in_root)?;
        if !in_root {
            return encode_length(w, n as usize, variant);
        }
    } else if !in_root {
        return Err(CodecError::ConstraintViolation(format!("size {} not in {}", n, size)));
    }
    if size.fixed_size().is_some() {
        return Ok(());
    }
    match size.constrained() {
        Some(codec) => codec.encode(w, n as i64, variant),
        None => encode_length(w, n as usize, variant),
    }
}

/// Decode a count or length under `size`. Returns the count and whether it came from the
/// extension (out-of-root) form. Root counts are not range-checked here.
pub fn decode_size(r: &mut BitReader, size: &SizeRange, variant: Variant) -> Result<(u64, bool), CodecError> {
    if size.extensible && r.read_bit()? {
        return Ok((decode_length(r, variant)? as u64, true));
    }
    if let Some(n) = size.fixed_size() {
        return Ok((n, false));
    }
    match size.constrained() {
        Some(codec) => {
            let offset = codec.decode_offset(r, variant)?;
            Ok((size.min.saturating_add(offset), false))
        }
        None => Ok((decode_length(r, variant)? as u64, false)),
    }
}
