//! Decoder fuzz target: decode arbitrary bytes as UL-DCCH-Message (both PER variants) under the
//! bundled NR RRC schema. A successful decode must re-encode without error.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const RRC_SCHEMA: &str = include_str!("../../schemas/nr_rrc_ul_dcch.asn");

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let module = perdsl::parse(RRC_SCHEMA).expect("bundled schema parses");
    let resolved = perdsl::ResolvedModule::resolve(module).expect("bundled schema resolves");
    for variant in [perdsl::Variant::Unaligned, perdsl::Variant::Aligned] {
        let codec = perdsl::Codec::new(resolved.clone(), variant);
        if let Ok(value) = codec.decode("UL-DCCH-Message", data) {
            codec
                .encode("UL-DCCH-Message", &value)
                .expect("decoded value re-encodes");
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
