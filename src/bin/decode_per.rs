//! Decode PER-encoded PDUs against a schema and print them.
//!
//! Usage:
//!   decode_per [OPTIONS] SCHEMA.asn TYPE [HEX ...]
//!
//! PDUs come from the HEX arguments, from `--pcap=FILE` (pcap or pcapng), or from stdin (one hex
//! PDU per line) when neither is given.
//!
//! Options:
//!   --aligned         Aligned PER (default: unaligned)
//!   --dump            Print each decoded value in schema order
//!   --reencode        Re-encode each decoded value and report byte mismatches
//!   --capture=FILE    Write every successfully decoded PDU to a pcap file (DLT_USER0)
//!   --pcap=FILE       Read PDUs from a capture: raw records for DLT_USER0, else IPv4/UDP payloads
//!
//! Logging goes through `RUST_LOG` (e.g. `RUST_LOG=perdsl=debug`).

use perdsl::capture::{CaptureSink, PcapWriter};
use perdsl::{dump_value, parse, Codec, ResolvedModule, Variant};
use pcap_parser::pcapng::Block as PcapNgBlock;
use pcap_parser::traits::{PcapNGPacketBlock, PcapReaderIterator};
use pcap_parser::{Linktype, PcapBlockOwned, PcapError};
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Read};
use std::path::{Path, PathBuf};

const DLT_USER0: i32 = 147;

#[derive(Default)]
struct Stats {
    pdus: u64,
    decoded: u64,
    failed: u64,
    mismatched: u64,
}

struct Options {
    dump: bool,
    reencode: bool,
}

fn take_flag(args: &mut Vec<String>, name: &str) -> bool {
    if let Some(pos) = args.iter().position(|a| a == name) {
        args.remove(pos);
        true
    } else {
        false
    }
}

fn take_value(args: &mut Vec<String>, prefix: &str) -> Option<PathBuf> {
    let pos = args.iter().position(|a| a.starts_with(prefix))?;
    let arg = args.remove(pos);
    arg.strip_prefix(prefix).map(PathBuf::from)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let variant = if take_flag(&mut raw_args, "--aligned") {
        Variant::Aligned
    } else {
        Variant::Unaligned
    };
    let opts = Options {
        dump: take_flag(&mut raw_args, "--dump"),
        reencode: take_flag(&mut raw_args, "--reencode"),
    };
    let capture_path = take_value(&mut raw_args, "--capture=");
    let pcap_path = take_value(&mut raw_args, "--pcap=");

    let mut args = raw_args.into_iter();
    let schema_path: PathBuf = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("schemas/nr_rrc_ul_dcch.asn"));
    let type_name = args.next().unwrap_or_else(|| "UL-DCCH-Message".to_string());
    let hex_args: Vec<String> = args.collect();

    let src = std::fs::read_to_string(&schema_path)?;
    let module = parse(&src).map_err(|e| anyhow::anyhow!(e))?;
    let resolved = ResolvedModule::resolve(module).map_err(|e| anyhow::anyhow!(e))?;
    if resolved.get_type(&type_name).is_none() {
        anyhow::bail!("{}: no type {}", schema_path.display(), type_name);
    }
    let codec = Codec::new(resolved, variant);

    let mut capture: Option<PcapWriter<BufWriter<File>>> = match &capture_path {
        Some(p) => Some(PcapWriter::new(BufWriter::new(File::create(p)?))?),
        None => None,
    };

    let mut pdus: Vec<Vec<u8>> = Vec::new();
    for h in &hex_args {
        pdus.push(hex::decode(h.replace([' ', ':'], ""))?);
    }
    if let Some(p) = &pcap_path {
        read_capture(p, &mut pdus)?;
    }
    if hex_args.is_empty() && pcap_path.is_none() {
        for line in io::stdin().lock().lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            pdus.push(hex::decode(line.replace([' ', ':'], ""))?);
        }
    }

    let mut stats = Stats::default();
    for (i, pdu) in pdus.iter().enumerate() {
        process_pdu(&codec, &type_name, i + 1, pdu, &opts, &mut stats, capture.as_mut())?;
    }
    if let Some(w) = capture {
        let records = w.records();
        w.into_inner()?;
        eprintln!("captured {} PDU(s)", records);
    }

    eprintln!("schema: {}", schema_path.display());
    eprintln!("type:   {} ({:?})", type_name, variant);
    eprintln!("pdus: {}", stats.pdus);
    eprintln!("decoded: {}", stats.decoded);
    eprintln!("failed: {}", stats.failed);
    if opts.reencode {
        eprintln!("re-encode mismatches: {}", stats.mismatched);
    }
    if stats.failed > 0 || stats.mismatched > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn process_pdu(
    codec: &Codec,
    type_name: &str,
    index: usize,
    pdu: &[u8],
    opts: &Options,
    stats: &mut Stats,
    capture: Option<&mut PcapWriter<BufWriter<File>>>,
) -> anyhow::Result<()> {
    stats.pdus += 1;
    let (consumed, res) = codec.decode_with_extent(type_name, pdu);
    let value = match res {
        Ok(v) => v,
        Err(e) => {
            stats.failed += 1;
            println!("=== pdu {}  len {}  FAILED after {} octets: {} ===", index, pdu.len(), consumed, e);
            return Ok(());
        }
    };
    stats.decoded += 1;
    println!("=== pdu {}  len {}  decoded {} octets ===", index, pdu.len(), consumed);
    if opts.dump {
        println!("{}", dump_value(codec.resolved(), type_name, &value));
    }
    if opts.reencode {
        match codec.encode(type_name, &value) {
            Ok(bytes) if bytes.as_slice() == &pdu[..consumed.min(pdu.len())] => {}
            Ok(bytes) => {
                stats.mismatched += 1;
                println!("  re-encoded differs: {}", hex::encode(&bytes));
            }
            Err(e) => {
                stats.mismatched += 1;
                println!("  re-encode failed: {}", e);
            }
        }
    }
    if let Some(w) = capture {
        w.capture(pdu)?;
    }
    Ok(())
}

fn read_capture(path: &Path, pdus: &mut Vec<Vec<u8>>) -> anyhow::Result<()> {
    // pcap vs pcapng by the magic at the start of the file.
    let mut magic = [0u8; 4];
    {
        let mut f = File::open(path)?;
        f.read_exact(&mut magic)?;
    }
    let file = File::open(path)?;
    if magic == [0x0a, 0x0d, 0x0d, 0x0a] {
        read_pcapng(file, pdus)
    } else {
        read_legacy_pcap(file, pdus)
    }
}

fn read_legacy_pcap<R: Read>(file: R, pdus: &mut Vec<Vec<u8>>) -> anyhow::Result<()> {
    let mut reader = pcap_parser::pcap::LegacyPcapReader::new(1 << 20, file)?;
    let mut linktype: Option<Linktype> = None;
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::LegacyHeader(h) => linktype = Some(h.network),
                    PcapBlockOwned::Legacy(b) => {
                        let lt = linktype.unwrap_or(Linktype(DLT_USER0));
                        if let Some(pdu) = pdu_from_linktype(lt, b.data) {
                            pdus.push(pdu.to_vec());
                        }
                    }
                    PcapBlockOwned::NG(_) => {}
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| anyhow::anyhow!("pcap refill error: {:?}", e))?;
            }
            Err(e) => return Err(anyhow::anyhow!("pcap read error: {:?}", e)),
        }
    }
    Ok(())
}

fn read_pcapng<R: Read>(file: R, pdus: &mut Vec<Vec<u8>>) -> anyhow::Result<()> {
    let mut reader = pcap_parser::pcapng::PcapNGReader::new(1 << 20, file)?;
    let mut if_linktypes: Vec<Linktype> = Vec::new();
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                if let PcapBlockOwned::NG(b) = block {
                    match &b {
                        PcapNgBlock::InterfaceDescription(idb) => if_linktypes.push(idb.linktype),
                        PcapNgBlock::EnhancedPacket(epb) => {
                            let lt = if_linktypes
                                .get(epb.if_id as usize)
                                .copied()
                                .unwrap_or(Linktype(DLT_USER0));
                            if let Some(pdu) = pdu_from_linktype(lt, epb.packet_data()) {
                                pdus.push(pdu.to_vec());
                            }
                        }
                        PcapNgBlock::SimplePacket(spb) => {
                            let lt = if_linktypes.first().copied().unwrap_or(Linktype(DLT_USER0));
                            if let Some(pdu) = pdu_from_linktype(lt, spb.packet_data()) {
                                pdus.push(pdu.to_vec());
                            }
                        }
                        _ => {}
                    }
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| anyhow::anyhow!("pcapng refill error: {:?}", e))?;
            }
            Err(e) => return Err(anyhow::anyhow!("pcapng read error: {:?}", e)),
        }
    }
    Ok(())
}

/// PDU bytes of a captured frame: the whole record for user DLTs, the UDP payload otherwise.
fn pdu_from_linktype(linktype: Linktype, frame: &[u8]) -> Option<&[u8]> {
    let l3 = match linktype.0 {
        147..=162 => return Some(frame), // DLT_USER0..DLT_USER15
        1 => ethernet_l3(frame)?,        // DLT_EN10MB
        101 => frame,                    // DLT_RAW
        _ => return None,
    };
    ipv4_udp_payload(l3)
}

fn ethernet_l3(frame: &[u8]) -> Option<&[u8]> {
    if frame.len() < 14 {
        return None;
    }
    let mut off = 12usize;
    let mut ethertype = u16::from_be_bytes([frame[off], frame[off + 1]]);
    off += 2;
    // 802.1Q / 802.1ad tags
    while ethertype == 0x8100 || ethertype == 0x88a8 {
        if frame.len() < off + 4 {
            return None;
        }
        ethertype = u16::from_be_bytes([frame[off + 2], frame[off + 3]]);
        off += 4;
    }
    match ethertype {
        0x0800 => Some(&frame[off..]),
        _ => None,
    }
}

fn ipv4_udp_payload(l3: &[u8]) -> Option<&[u8]> {
    if l3.len() < 20 || l3[0] >> 4 != 4 {
        return None;
    }
    let ihl = (l3[0] & 0x0f) as usize * 4;
    let total_len = u16::from_be_bytes([l3[2], l3[3]]) as usize;
    if ihl < 20 || total_len < ihl + 8 || l3[9] != 17 {
        return None;
    }
    let l3 = if total_len <= l3.len() { &l3[..total_len] } else { l3 };
    let udp = l3.get(ihl..)?;
    let udp_len = u16::from_be_bytes([*udp.get(4)?, *udp.get(5)?]) as usize;
    if udp_len < 8 || udp.len() < udp_len {
        return None;
    }
    Some(&udp[8..udp_len])
}
