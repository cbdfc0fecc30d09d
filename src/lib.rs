//! # perdsl: ASN.1 schema subset and PER codec
//!
//! A PEST grammar for a practical subset of ASN.1 type notation, plus one generic engine that
//! encodes and decodes values of those types with the Packed Encoding Rules (unaligned by
//! default, aligned on request). Built for 3GPP-style control-plane messages such as NR RRC.
//!
//! ## Schema language
//!
//! - Value assignments: `maxNrofS-NSSAI INTEGER ::= 8`
//! - Types: `NULL`, `BOOLEAN`, `INTEGER (lo..hi)`, `ENUMERATED { a, b, ... }`,
//!   `BIT STRING (SIZE(n))`, `OCTET STRING`, `SEQUENCE { ... }`, `SEQUENCE (SIZE(1..n)) OF T`,
//!   `CHOICE { ... }`, and references to other assignments
//! - Components: `OPTIONAL`, `DEFAULT v`, extension marker `...`, extension groups `[[ ... ]]`
//! - Bounds may name value assignments; `MAX` leaves the upper bound open
//!
//! ## Example schema
//!
//! ```text
//! RegisteredAMF ::= SEQUENCE {
//!     plmn-Identity   PLMN-Identity OPTIONAL,
//!     amf-Identifier  BIT STRING (SIZE(24)),
//!     ...
//! }
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use perdsl::{parse, Codec, ResolvedModule, Variant};
//!
//! let module = parse(&std::fs::read_to_string("schemas/nr_rrc_ul_dcch.asn").unwrap()).unwrap();
//! let codec = Codec::new(ResolvedModule::resolve(module).unwrap(), Variant::Unaligned);
//! let msg = codec.decode("UL-DCCH-Message", &[0x20, 0x00]).unwrap();
//! let bytes = codec.encode("UL-DCCH-Message", &msg).unwrap();
//! ```
//!
//! See `tests/integration.rs` for a full RRCSetupComplete round trip.

pub mod ast;
pub mod bits;
pub mod capture;
pub mod codec;
pub mod dump;
pub mod lint;
pub mod parser;
pub mod per;
pub mod value;

pub use ast::{Module, ResolvedModule, TypeSpec};
pub use bits::{BitReader, BitWriter};
pub use capture::{CaptureSink, MemorySink, PcapWriter};
pub use codec::{Codec, CodecError, Variant};
pub use dump::dump_value;
pub use parser::parse;
pub use value::{BitString, Value};
