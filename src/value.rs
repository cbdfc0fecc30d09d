//! Runtime values for encode/decode.

use std::collections::HashMap;
use std::fmt;

/// Arm name used for extension alternatives (and enumeration items) unknown to the schema.
pub const UNKNOWN_EXTENSION_PREFIX: &str = "extension#";

pub fn unknown_extension_name(index: usize) -> String {
    format!("{}{}", UNKNOWN_EXTENSION_PREFIX, index)
}

/// Index carried by an `extension#<i>` name.
pub fn unknown_extension_index(name: &str) -> Option<usize> {
    name.strip_prefix(UNKNOWN_EXTENSION_PREFIX)?.parse().ok()
}

/// Bit string of arbitrary length, MSB first; unused trailing bits of the last octet are zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitString {
    bytes: Vec<u8>,
    len: usize,
}

impl BitString {
    pub fn new(mut bytes: Vec<u8>, len: usize) -> Self {
        bytes.resize((len + 7) / 8, 0);
        let rem = len % 8;
        if rem != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= 0xffu8 << (8 - rem);
            }
        }
        BitString { bytes, len }
    }

    /// Low `len` bits of `value` (`len <= 64`).
    pub fn from_u64(value: u64, len: usize) -> Self {
        let len = len.min(64);
        let aligned = if len == 0 { 0 } else { value << (64 - len) };
        BitString::new(aligned.to_be_bytes().to_vec(), len)
    }

    /// From a string of `0` and `1`.
    pub fn from_bits(bits: &str) -> Option<Self> {
        let mut bytes = vec![0u8; (bits.len() + 7) / 8];
        for (i, c) in bits.chars().enumerate() {
            match c {
                '0' => {}
                '1' => bytes[i / 8] |= 0x80 >> (i % 8),
                _ => return None,
            }
        }
        Some(BitString::new(bytes, bits.len()))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn get(&self, i: usize) -> Option<bool> {
        if i >= self.len {
            return None;
        }
        Some(self.bytes[i / 8] & (0x80 >> (i % 8)) != 0)
    }

    /// Value of the bits as an unsigned number (`len <= 64`).
    pub fn to_u64(&self) -> Option<u64> {
        if self.len > 64 {
            return None;
        }
        let mut v = 0u64;
        for i in 0..self.len {
            v = (v << 1) | self.get(i)? as u64;
        }
        Some(v)
    }
}

impl fmt::Display for BitString {
    /// ASN.1 notation: `'0A3F'H` for whole octets, `'101'B` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len % 8 == 0 {
            write!(f, "'{}'H", hex::encode_upper(&self.bytes))
        } else {
            let bits: String = (0..self.len)
                .map(|i| if self.get(i) == Some(true) { '1' } else { '0' })
                .collect();
            write!(f, "'{}'B", bits)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    /// Enumeration item by name.
    Enumerated(String),
    BitString(BitString),
    OctetString(Vec<u8>),
    /// SEQUENCE components by name; an absent OPTIONAL component has no entry.
    /// Components of extension additions live in the same map.
    Sequence(HashMap<String, Value>),
    /// CHOICE: the selected arm owns its payload.
    Choice { arm: String, value: Box<Value> },
    /// SEQUENCE OF elements.
    List(Vec<Value>),
    /// Undecoded open-type content of an unknown extension alternative.
    Opaque(Vec<u8>),
}

impl Value {
    pub fn choice(arm: impl Into<String>, value: Value) -> Self {
        Value::Choice {
            arm: arm.into(),
            value: Box::new(value),
        }
    }

    pub fn sequence<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Sequence(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn empty_sequence() -> Self {
        Value::Sequence(HashMap::new())
    }

    /// Select `arm` with a fresh payload. The previous arm and its payload are dropped.
    pub fn set_arm(&mut self, arm: impl Into<String>, value: Value) {
        *self = Value::choice(arm, value);
    }

    /// Selected arm name and payload of a CHOICE.
    pub fn arm(&self) -> Option<(&str, &Value)> {
        match self {
            Value::Choice { arm, value } => Some((arm.as_str(), value.as_ref())),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_sequence()?.get(name)
    }

    /// Insert or replace a SEQUENCE component; no-op on other values.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        if let Value::Sequence(m) = self {
            m.insert(name.into(), value);
        }
    }

    /// Navigate a dotted path: SEQUENCE components by name, CHOICE payloads by arm name,
    /// list elements by index.
    pub fn path(&self, path: &str) -> Option<&Value> {
        let mut cur = self;
        for part in path.split('.').filter(|p| !p.is_empty()) {
            cur = match cur {
                Value::Sequence(m) => m.get(part)?,
                Value::Choice { arm, value } if arm == part => value.as_ref(),
                Value::List(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_enumerated(&self) -> Option<&str> {
        match self {
            Value::Enumerated(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(b) | Value::Opaque(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bit_string(&self) -> Option<&BitString> {
        match self {
            Value::BitString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Sequence(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Integer(_) => "INTEGER",
            Value::Enumerated(_) => "ENUMERATED",
            Value::BitString(_) => "BIT STRING",
            Value::OctetString(_) => "OCTET STRING",
            Value::Sequence(_) => "SEQUENCE",
            Value::Choice { .. } => "CHOICE",
            Value::List(_) => "SEQUENCE OF",
            Value::Opaque(_) => "open type",
        }
    }
}
