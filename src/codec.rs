//! Encode/decode values of schema types with Packed Encoding Rules.
//!
//! One generic engine walks the resolved schema: SEQUENCE (extension bit, presence bitmap,
//! root components, extension additions), CHOICE, ENUMERATED, INTEGER, BOOLEAN, NULL,
//! BIT/OCTET STRING and SEQUENCE OF, each through the primitives in [`crate::per`].

use crate::ast::*;
use crate::bits::{BitReader, BitWriter};
use crate::per::string::{decode_bit_string, decode_octet_string, encode_bit_string, encode_octet_string};
use crate::per::{
    decode_length, decode_normally_small, encode_length, encode_normally_small, pack_extension_additions,
    pack_open_type, pack_presence, unpack_extension_additions, unpack_open_type, unpack_presence,
    ChoiceIndex, Discriminant, IntegerCodec, IntegerConstraint, SequenceOfCodec, SizeRange,
};
use crate::value::{unknown_extension_index, unknown_extension_name, Value};
use std::collections::HashMap;

pub use crate::per::Variant;

#[derive(Debug, Clone)]
pub struct Codec {
    pub variant: Variant,
    resolved: ResolvedModule,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("out of range: {needed} bits needed, {available} available")]
    OutOfRange { needed: usize, available: usize },
    #[error("buffer full: {needed} octets needed, capacity {capacity}")]
    BufferFull { needed: usize, capacity: usize },
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("invalid choice id {index} ({arms} alternatives)")]
    InvalidChoiceId { index: u64, arms: usize },
    #[error("malformed extension: {0}")]
    MalformedExtension(String),
    #[error("cardinality violation: {count} elements not in {min}..{}", upper_bound(.max))]
    CardinalityViolation { count: u64, min: u64, max: Option<u64> },
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("missing mandatory field: {0}")]
    MissingField(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

fn upper_bound(max: &Option<u64>) -> String {
    max.map_or_else(|| "MAX".to_string(), |m| m.to_string())
}

fn mismatch(spec: &TypeSpec, v: &Value) -> CodecError {
    CodecError::TypeMismatch(format!("expected {}, got {}", spec.kind(), v.kind()))
}

fn size_range(range: Option<&Range>) -> Result<SizeRange, CodecError> {
    let range = match range {
        Some(r) => r,
        None => return Ok(SizeRange::UNCONSTRAINED),
    };
    let (lo, hi) = range
        .bounds()
        .ok_or_else(|| CodecError::Unsupported("unresolved SIZE bound".to_string()))?;
    if lo < 0 || hi.map_or(false, |h| h < lo) {
        return Err(CodecError::Unsupported(format!("SIZE bounds {:?}..{:?}", lo, hi)));
    }
    Ok(SizeRange {
        min: lo as u64,
        max: hi.map(|h| h as u64),
        extensible: range.extensible,
    })
}

fn integer_constraint(range: Option<&Range>) -> Result<IntegerConstraint, CodecError> {
    let range = match range {
        Some(r) => r,
        None => return Ok(IntegerConstraint::default()),
    };
    let (lo, hi) = range
        .bounds()
        .ok_or_else(|| CodecError::Unsupported("unresolved INTEGER bound".to_string()))?;
    Ok(IntegerConstraint {
        lo: Some(lo),
        hi,
        extensible: range.extensible,
    })
}

/// Deepest nesting of types the engine walks before giving up on a value or an input.
pub const MAX_NESTING_DEPTH: usize = 100;

fn nested(depth: usize) -> Result<usize, CodecError> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(CodecError::Unsupported(format!(
            "nesting deeper than {} levels",
            MAX_NESTING_DEPTH
        )));
    }
    Ok(depth + 1)
}

fn log_field<T>(name: &str, res: Result<T, CodecError>) -> Result<T, CodecError> {
    if let Err(e) = &res {
        log::debug!("field {}: {}", name, e);
    }
    res
}

impl Codec {
    pub fn new(resolved: ResolvedModule, variant: Variant) -> Self {
        Codec { variant, resolved }
    }

    pub fn resolved(&self) -> &ResolvedModule {
        &self.resolved
    }

    fn type_spec(&self, type_name: &str) -> Result<&TypeSpec, CodecError> {
        self.resolved
            .get_type(type_name)
            .map(|t| &t.type_spec)
            .ok_or_else(|| CodecError::UnknownType(type_name.to_string()))
    }

    /// Encode a complete message: the encoding is zero-padded to an octet boundary, and an
    /// empty encoding becomes a single zero octet.
    pub fn encode(&self, type_name: &str, value: &Value) -> Result<Vec<u8>, CodecError> {
        let mut w = BitWriter::new();
        self.encode_into(&mut w, type_name, value)?;
        w.align_to_byte()?;
        let mut out = w.into_bytes();
        if out.is_empty() {
            out.push(0);
        }
        log::trace!("encoded {} into {} octets", type_name, out.len());
        Ok(out)
    }

    /// Encode into a caller-owned writer, without final alignment.
    pub fn encode_into(&self, w: &mut BitWriter, type_name: &str, value: &Value) -> Result<(), CodecError> {
        let spec = self.type_spec(type_name)?;
        self.encode_type(w, spec, value, 0)
    }

    /// Decode a single message by name from the given bytes.
    pub fn decode(&self, type_name: &str, bytes: &[u8]) -> Result<Value, CodecError> {
        self.decode_with_extent(type_name, bytes).1
    }

    /// Decode a single message and return (bytes_consumed, result). On failure the count
    /// covers everything read up to the failing field.
    pub fn decode_with_extent(&self, type_name: &str, bytes: &[u8]) -> (usize, Result<Value, CodecError>) {
        let mut r = BitReader::new(bytes);
        let res = self.decode_from(&mut r, type_name);
        match &res {
            Ok(_) => log::trace!("decoded {} from {} bits", type_name, r.bits_consumed()),
            Err(e) => log::debug!("decode {} failed after {} bits: {}", type_name, r.bits_consumed(), e),
        }
        (r.bytes_consumed(), res)
    }

    /// Decode from a caller-owned reader, without final alignment.
    pub fn decode_from(&self, r: &mut BitReader, type_name: &str) -> Result<Value, CodecError> {
        let spec = self.type_spec(type_name)?;
        self.decode_type(r, spec, 0)
    }

    fn encode_type(&self, w: &mut BitWriter, spec: &TypeSpec, v: &Value, depth: usize) -> Result<(), CodecError> {
        let next = nested(depth)?;
        match (spec, v) {
            (TypeSpec::Ref(name), _) => self.encode_type(w, self.type_spec(name)?, v, depth),
            (TypeSpec::Null, Value::Null) => Ok(()),
            (TypeSpec::Boolean, Value::Bool(b)) => w.write_bit(*b),
            (TypeSpec::Integer(range), Value::Integer(n)) => {
                integer_constraint(range.as_ref())?.encode(w, *n, self.variant)
            }
            (TypeSpec::Enumerated(e), Value::Enumerated(item)) => self.encode_enumerated(w, e, item),
            (TypeSpec::BitString(size), Value::BitString(bits)) => {
                encode_bit_string(w, bits, &size_range(size.as_ref())?, self.variant)
            }
            (TypeSpec::OctetString { size, .. }, Value::OctetString(octets)) => {
                encode_octet_string(w, octets, &size_range(size.as_ref())?, self.variant)
            }
            (TypeSpec::Sequence(s), Value::Sequence(m)) => self.encode_sequence(w, s, m, next),
            (TypeSpec::SequenceOf { size, element }, Value::List(items)) => {
                SequenceOfCodec::new(size_range(size.as_ref())?).encode(w, items, self.variant, |w, item| {
                    self.encode_type(w, element, item, next)
                })
            }
            (TypeSpec::Choice(c), Value::Choice { arm, value }) => self.encode_choice(w, c, arm, value, next),
            _ => Err(mismatch(spec, v)),
        }
    }

    fn decode_type(&self, r: &mut BitReader, spec: &TypeSpec, depth: usize) -> Result<Value, CodecError> {
        let next = nested(depth)?;
        match spec {
            TypeSpec::Ref(name) => self.decode_type(r, self.type_spec(name)?, depth),
            TypeSpec::Null => Ok(Value::Null),
            TypeSpec::Boolean => Ok(Value::Bool(r.read_bit()?)),
            TypeSpec::Integer(range) => Ok(Value::Integer(
                integer_constraint(range.as_ref())?.decode(r, self.variant)?,
            )),
            TypeSpec::Enumerated(e) => self.decode_enumerated(r, e),
            TypeSpec::BitString(size) => Ok(Value::BitString(decode_bit_string(
                r,
                &size_range(size.as_ref())?,
                self.variant,
            )?)),
            TypeSpec::OctetString { size, .. } => Ok(Value::OctetString(decode_octet_string(
                r,
                &size_range(size.as_ref())?,
                self.variant,
            )?)),
            TypeSpec::Sequence(s) => self.decode_sequence(r, s, next),
            TypeSpec::SequenceOf { size, element } => {
                let items = SequenceOfCodec::new(size_range(size.as_ref())?)
                    .decode(r, self.variant, |r| self.decode_type(r, element, next))?;
                Ok(Value::List(items))
            }
            TypeSpec::Choice(c) => self.decode_choice(r, c, next),
        }
    }

    fn encode_enumerated(&self, w: &mut BitWriter, e: &Enumerated, item: &str) -> Result<(), CodecError> {
        if let Some(i) = e.items.iter().position(|x| x == item) {
            if e.extensible {
                w.write_bit(false)?;
            }
            return IntegerCodec::new(0, e.items.len() as i64 - 1).encode(w, i as i64, self.variant);
        }
        let addition = e
            .additions
            .iter()
            .position(|x| x == item)
            .or_else(|| unknown_extension_index(item));
        match addition {
            Some(j) if e.extensible => {
                w.write_bit(true)?;
                encode_normally_small(w, j as u64, self.variant)
            }
            _ => Err(CodecError::ConstraintViolation(format!(
                "{} is not an item of the enumeration",
                item
            ))),
        }
    }

    fn decode_enumerated(&self, r: &mut BitReader, e: &Enumerated) -> Result<Value, CodecError> {
        if e.extensible && r.read_bit()? {
            let j = decode_normally_small(r, self.variant)? as usize;
            let name = match e.additions.get(j) {
                Some(name) => name.clone(),
                None => {
                    log::debug!("unknown enumeration extension {}", j);
                    unknown_extension_name(j)
                }
            };
            return Ok(Value::Enumerated(name));
        }
        let i = IntegerCodec::new(0, e.items.len() as i64 - 1).decode_offset(r, self.variant)?;
        e.items
            .get(i as usize)
            .cloned()
            .map(Value::Enumerated)
            .ok_or_else(|| {
                CodecError::ConstraintViolation(format!(
                    "enumeration index {} beyond {} items",
                    i,
                    e.items.len()
                ))
            })
    }

    fn encode_sequence(
        &self,
        w: &mut BitWriter,
        s: &Sequence,
        m: &HashMap<String, Value>,
        depth: usize,
    ) -> Result<(), CodecError> {
        for name in m.keys() {
            let known = s.fields.iter().any(|f| &f.name == name)
                || s.additions.iter().any(|a| a.fields().iter().any(|f| &f.name == name));
            if !known {
                return Err(CodecError::UnknownField(name.clone()));
            }
        }

        let additions_present: Vec<bool> = s
            .additions
            .iter()
            .map(|a| a.fields().iter().any(|f| m.contains_key(&f.name)))
            .collect();
        let extended = additions_present.iter().any(|&p| p);
        if s.extensible {
            w.write_bit(extended)?;
        }

        let flags: Vec<bool> = s
            .fields
            .iter()
            .filter(|f| f.has_presence_bit())
            .map(|f| m.contains_key(&f.name))
            .collect();
        pack_presence(w, &flags)?;

        for f in &s.fields {
            self.encode_field(w, f, m, depth)?;
        }

        if extended {
            pack_extension_additions(w, self.variant, &additions_present, |i, inner| {
                match s.additions.get(i) {
                    Some(Addition::Group(fields)) => {
                        let flags: Vec<bool> = fields
                            .iter()
                            .filter(|f| f.has_presence_bit())
                            .map(|f| m.contains_key(&f.name))
                            .collect();
                        pack_presence(inner, &flags)?;
                        for f in fields {
                            self.encode_field(inner, f, m, depth)?;
                        }
                        Ok(())
                    }
                    Some(Addition::Single(f)) => self.encode_field(inner, f, m, depth),
                    None => Err(CodecError::MalformedExtension(format!("no extension addition {}", i))),
                }
            })?;
        }
        Ok(())
    }

    fn encode_field(&self, w: &mut BitWriter, f: &Field, m: &HashMap<String, Value>, depth: usize) -> Result<(), CodecError> {
        match m.get(&f.name) {
            Some(v) => log_field(&f.name, self.encode_type(w, &f.type_spec, v, depth)),
            None if f.has_presence_bit() => Ok(()),
            None => Err(CodecError::MissingField(f.name.clone())),
        }
    }

    fn decode_sequence(&self, r: &mut BitReader, s: &Sequence, depth: usize) -> Result<Value, CodecError> {
        let extended = s.extensible && r.read_bit()?;
        let mut out = HashMap::new();
        self.decode_fields(r, &s.fields, &mut out, depth)?;

        if extended {
            unpack_extension_additions(r, self.variant, s.additions.len(), |i, inner| {
                match s.additions.get(i) {
                    Some(Addition::Group(fields)) => self.decode_fields(inner, fields, &mut out, depth),
                    Some(Addition::Single(f)) => {
                        let v = log_field(&f.name, self.decode_type(inner, &f.type_spec, depth))?;
                        out.insert(f.name.clone(), v);
                        Ok(())
                    }
                    None => Err(CodecError::MalformedExtension(format!("no extension addition {}", i))),
                }
            })?;
        }
        Ok(Value::Sequence(out))
    }

    /// Presence bitmap then the present components, into `out`.
    fn decode_fields(
        &self,
        r: &mut BitReader,
        fields: &[Field],
        out: &mut HashMap<String, Value>,
        depth: usize,
    ) -> Result<(), CodecError> {
        let optional = fields.iter().filter(|f| f.has_presence_bit()).count();
        let mut flags = unpack_presence(r, optional)?.into_iter();
        for f in fields {
            let present = if f.has_presence_bit() {
                flags.next().unwrap_or(false)
            } else {
                true
            };
            if present {
                let v = log_field(&f.name, self.decode_type(r, &f.type_spec, depth))?;
                out.insert(f.name.clone(), v);
            }
        }
        Ok(())
    }

    fn encode_choice(
        &self,
        w: &mut BitWriter,
        c: &Choice,
        arm: &str,
        value: &Value,
        depth: usize,
    ) -> Result<(), CodecError> {
        let index = ChoiceIndex::new(c.alternatives.len(), c.extensible);
        match c.find(arm) {
            Some((i, false)) => {
                index.encode(w, Discriminant::Root(i), self.variant)?;
                log_field(arm, self.encode_type(w, &c.alternatives[i].type_spec, value, depth))
            }
            Some((i, true)) => {
                index.encode(w, Discriminant::Extension(i), self.variant)?;
                pack_open_type(w, self.variant, |inner| {
                    log_field(arm, self.encode_type(inner, &c.additions[i].type_spec, value, depth))
                })
            }
            None => {
                let i = unknown_extension_index(arm).ok_or_else(|| CodecError::UnknownField(arm.to_string()))?;
                let content = value.as_bytes().ok_or_else(|| {
                    CodecError::TypeMismatch(format!("{} needs open type content, got {}", arm, value.kind()))
                })?;
                index.encode(w, Discriminant::Extension(i), self.variant)?;
                encode_length(w, content.len(), self.variant)?;
                w.write_bytes(content)
            }
        }
    }

    fn decode_choice(&self, r: &mut BitReader, c: &Choice, depth: usize) -> Result<Value, CodecError> {
        let index = ChoiceIndex::new(c.alternatives.len(), c.extensible);
        match index.decode(r, self.variant)? {
            Discriminant::Root(i) => {
                let alt = c.alternatives.get(i).ok_or(CodecError::InvalidChoiceId {
                    index: i as u64,
                    arms: c.alternatives.len(),
                })?;
                let v = log_field(&alt.name, self.decode_type(r, &alt.type_spec, depth))?;
                Ok(Value::choice(alt.name.clone(), v))
            }
            Discriminant::Extension(i) => match c.additions.get(i) {
                Some(alt) => {
                    let v = unpack_open_type(r, self.variant, |inner| {
                        log_field(&alt.name, self.decode_type(inner, &alt.type_spec, depth))
                    })?;
                    Ok(Value::choice(alt.name.clone(), v))
                }
                None => {
                    let len = decode_length(r, self.variant)?;
                    let content = r.read_bytes(len)?;
                    log::debug!("unknown extension alternative {} ({} octets) kept opaque", i, len);
                    Ok(Value::choice(unknown_extension_name(i), Value::Opaque(content)))
                }
            },
        }
    }
}
