//! Benchmark: decode, encode and decode+encode of an UL-DCCH RRCSetupComplete PDU under the
//! bundled NR RRC schema, in both PER variants. The aligned PDU is produced once at setup by
//! re-encoding the decoded unaligned one.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use perdsl::{parse, Codec, ResolvedModule, Variant};

const RRC_SCHEMA: &str = include_str!("../schemas/nr_rrc_ul_dcch.asn");
const TYPE_NAME: &str = "UL-DCCH-Message";

const SETUP_COMPLETE_HEX: &str = "10 c0 10 00 20 25 97 e0 1e 1e 34 b5 30 b7 e0 04 10 90 00 bf 20 0f 11 08 \
    00 10 15 66 75 f7 12 e0 4f 07 0f 07 07 10 03 87 e0 04 10 90 00 bf 20 0f \
    11 08 00 10 15 66 75 f7 11 00 10 32 e0 4f 07 0f 07 02 f0 20 10 15 20 0f \
    11 00 00 06 41 70 7f 07 00 00 01 88 0b 01 80 10 17 40 00 09 05 30 10 10";

fn codec(variant: Variant) -> Codec {
    let module = parse(RRC_SCHEMA).expect("parse schema");
    Codec::new(ResolvedModule::resolve(module).expect("resolve schema"), variant)
}

fn bench_codec(c: &mut Criterion) {
    let pdu = hex::decode(SETUP_COMPLETE_HEX.replace(' ', "")).expect("fixture hex");
    let uper = codec(Variant::Unaligned);
    let aper = codec(Variant::Aligned);
    let value = uper.decode(TYPE_NAME, &pdu).expect("decode fixture");
    let aligned_pdu = aper.encode(TYPE_NAME, &value).expect("aligned encode");

    c.bench_function("uper_decode_rrc_setup_complete", |b| {
        b.iter(|| black_box(uper.decode(TYPE_NAME, black_box(&pdu))))
    });

    c.bench_function("uper_encode_rrc_setup_complete", |b| {
        b.iter(|| black_box(uper.encode(TYPE_NAME, black_box(&value))))
    });

    c.bench_function("uper_decode_encode_rrc_setup_complete", |b| {
        b.iter(|| {
            let (consumed, res) = uper.decode_with_extent(TYPE_NAME, black_box(&pdu));
            if let Ok(v) = res {
                let _ = black_box(uper.encode(TYPE_NAME, &v));
            }
            black_box(consumed)
        })
    });

    c.bench_function("aper_decode_rrc_setup_complete", |b| {
        b.iter(|| black_box(aper.decode(TYPE_NAME, black_box(&aligned_pdu))))
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
