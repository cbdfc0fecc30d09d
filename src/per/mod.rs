//! PER primitives used by the schema engine in [`crate::codec`].
//!
//! Every primitive takes the reader or writer explicitly plus the [`Variant`] and keeps no
//! state between calls. Building blocks, leaves first:
//!
//! - [`integer`]: constrained, semi-constrained, unconstrained and extensible whole numbers
//! - [`length`]: length determinants, size ranges, normally small numbers
//! - [`presence`]: optional-field presence bitmaps
//! - [`choice`]: CHOICE discriminants
//! - [`string`]: BIT STRING and OCTET STRING contents
//! - [`sequence_of`]: counts plus element delegation
//! - [`extension`]: extension addition bitmaps and open types

pub mod choice;
pub mod extension;
pub mod integer;
pub mod length;
pub mod presence;
pub mod sequence_of;
pub mod string;

pub use choice::{ChoiceIndex, Discriminant};
pub use extension::{
    pack_extension_additions, pack_open_type, skip_open_type, unpack_extension_additions,
    unpack_open_type,
};
pub use integer::{bits_needed, IntegerCodec, IntegerConstraint};
pub use length::{
    decode_length, decode_normally_small, encode_length, encode_normally_small, SizeRange,
};
pub use presence::{pack_presence, unpack_presence};
pub use sequence_of::SequenceOfCodec;

/// PER flavour. Alignment only differs where X.691 calls for octet alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// Unaligned PER (UPER), used by RRC.
    #[default]
    Unaligned,
    /// Aligned PER (APER).
    Aligned,
}

impl Variant {
    pub fn is_aligned(self) -> bool {
        self == Variant::Aligned
    }
}
