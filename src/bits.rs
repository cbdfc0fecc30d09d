//! Bit-level reader and writer, MSB first.
//!
//! Positions are counted in bits from the start of the reader or writer. A reader
//! carved out with [`BitReader::take`] has its own origin, so alignment inside an
//! open-type region is relative to the start of that region.

use crate::codec::CodecError;

/// Sequential MSB-first reader over a byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Absolute bit position in `data`.
    pos: usize,
    /// Origin of this reader (absolute bit).
    start: usize,
    /// Exclusive limit (absolute bit).
    end: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            pos: 0,
            start: 0,
            end: data.len() * 8,
        }
    }

    pub fn remaining_bits(&self) -> usize {
        self.end - self.pos
    }

    pub fn bits_consumed(&self) -> usize {
        self.pos - self.start
    }

    /// Bytes touched so far, counting a partially read byte.
    pub fn bytes_consumed(&self) -> usize {
        (self.bits_consumed() + 7) / 8
    }

    pub fn is_aligned(&self) -> bool {
        self.bits_consumed() % 8 == 0
    }

    fn ensure(&self, n: usize) -> Result<(), CodecError> {
        if n > self.remaining_bits() {
            return Err(CodecError::OutOfRange {
                needed: n,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    /// Read `n` bits (at most 64) as an unsigned integer, first bit most significant.
    pub fn read_bits(&mut self, n: u32) -> Result<u64, CodecError> {
        if n > 64 {
            return Err(CodecError::Unsupported(format!("read of {} bits in one call", n)));
        }
        self.ensure(n as usize)?;
        let mut value: u64 = 0;
        let mut left = n as usize;
        while left > 0 {
            let byte = self.data.get(self.pos / 8).copied().ok_or(CodecError::OutOfRange {
                needed: left,
                available: 0,
            })?;
            let used = self.pos % 8;
            let avail = 8 - used;
            let take = avail.min(left);
            let chunk = (byte >> (avail - take)) & (((1u16 << take) - 1) as u8);
            value = (value << take) | chunk as u64;
            self.pos += take;
            left -= take;
        }
        Ok(value)
    }

    pub fn read_bit(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Read `n` whole octets starting at the current (possibly unaligned) position.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, CodecError> {
        self.ensure(n * 8)?;
        if self.pos % 8 == 0 {
            let at = self.pos / 8;
            let out = self.data[at..at + n].to_vec();
            self.pos += n * 8;
            return Ok(out);
        }
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_bits(8)? as u8);
        }
        Ok(out)
    }

    pub fn skip_bits(&mut self, n: usize) -> Result<(), CodecError> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Skip to the next octet boundary relative to this reader's origin.
    pub fn align_to_byte(&mut self) -> Result<(), CodecError> {
        let rem = self.bits_consumed() % 8;
        if rem != 0 {
            self.skip_bits(8 - rem)?;
        }
        Ok(())
    }

    /// Split off the next `nbits` as a bounded reader and advance past them.
    pub fn take(&mut self, nbits: usize) -> Result<BitReader<'a>, CodecError> {
        self.ensure(nbits)?;
        let sub = BitReader {
            data: self.data,
            pos: self.pos,
            start: self.pos,
            end: self.pos + nbits,
        };
        self.pos += nbits;
        Ok(sub)
    }
}

/// Growable MSB-first writer with an optional capacity limit.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    bits: usize,
    limit: Option<usize>,
}

impl BitWriter {
    pub fn new() -> Self {
        BitWriter::default()
    }

    /// Writer that fails with `BufferFull` once more than `bytes` octets would be needed.
    pub fn with_capacity_limit(bytes: usize) -> Self {
        BitWriter {
            buf: Vec::with_capacity(bytes),
            bits: 0,
            limit: Some(bytes),
        }
    }

    pub fn bits_consumed(&self) -> usize {
        self.bits
    }

    pub fn bytes_consumed(&self) -> usize {
        (self.bits + 7) / 8
    }

    pub fn is_aligned(&self) -> bool {
        self.bits % 8 == 0
    }

    fn reserve_bits(&self, n: usize) -> Result<(), CodecError> {
        if let Some(capacity) = self.limit {
            let needed = (self.bits + n + 7) / 8;
            if needed > capacity {
                return Err(CodecError::BufferFull { needed, capacity });
            }
        }
        Ok(())
    }

    /// Append the low `n` bits of `value` (at most 64), most significant first.
    pub fn write_bits(&mut self, value: u64, n: u32) -> Result<(), CodecError> {
        if n > 64 {
            return Err(CodecError::Unsupported(format!("write of {} bits in one call", n)));
        }
        self.reserve_bits(n as usize)?;
        let value = if n == 64 { value } else { value & ((1u64 << n) - 1) };
        let mut left = n as usize;
        while left > 0 {
            let used = self.bits % 8;
            if used == 0 {
                self.buf.push(0);
            }
            let free = 8 - used;
            let take = free.min(left);
            let chunk = ((value >> (left - take)) & ((1u64 << take) - 1)) as u8;
            if let Some(last) = self.buf.last_mut() {
                *last |= chunk << (free - take);
            }
            self.bits += take;
            left -= take;
        }
        Ok(())
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<(), CodecError> {
        self.write_bits(bit as u64, 1)
    }

    /// Append whole octets at the current (possibly unaligned) position.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        if self.is_aligned() {
            self.reserve_bits(bytes.len() * 8)?;
            self.buf.extend_from_slice(bytes);
            self.bits += bytes.len() * 8;
            return Ok(());
        }
        for b in bytes {
            self.write_bits(*b as u64, 8)?;
        }
        Ok(())
    }

    /// Zero-pad to the next octet boundary.
    pub fn align_to_byte(&mut self) -> Result<(), CodecError> {
        let rem = self.bits % 8;
        if rem != 0 {
            self.write_bits(0, (8 - rem) as u32)?;
        }
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Written octets; a trailing partial octet is zero-filled.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
