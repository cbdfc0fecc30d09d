//! Capture sinks for encoded PDUs: an in-memory log and a classic pcap file writer.
//!
//! The pcap writer emits little-endian legacy pcap with link type `DLT_USER0` (147), one
//! record per PDU, so captures open in Wireshark with a user DLT mapped to the PER dissector.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
pub const DLT_USER0: u32 = 147;
const SNAPLEN: u32 = 65535;

/// Receives every encoded PDU the caller chooses to record.
pub trait CaptureSink {
    fn capture(&mut self, pdu: &[u8]) -> io::Result<()>;
}

/// Keeps captured PDUs in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub pdus: Vec<Vec<u8>>,
}

impl CaptureSink for MemorySink {
    fn capture(&mut self, pdu: &[u8]) -> io::Result<()> {
        self.pdus.push(pdu.to_vec());
        Ok(())
    }
}

pub struct PcapWriter<W: Write> {
    out: W,
    records: usize,
}

impl<W: Write> PcapWriter<W> {
    /// Write the global header and return the writer.
    pub fn new(mut out: W) -> io::Result<Self> {
        out.write_u32::<LittleEndian>(PCAP_MAGIC)?;
        out.write_u16::<LittleEndian>(2)?;
        out.write_u16::<LittleEndian>(4)?;
        out.write_i32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(SNAPLEN)?;
        out.write_u32::<LittleEndian>(DLT_USER0)?;
        Ok(PcapWriter { out, records: 0 })
    }

    /// Append one record stamped with `ts` since the Unix epoch.
    pub fn capture_at(&mut self, pdu: &[u8], ts: Duration) -> io::Result<()> {
        let caplen = pdu.len().min(SNAPLEN as usize);
        self.out.write_u32::<LittleEndian>(ts.as_secs() as u32)?;
        self.out.write_u32::<LittleEndian>(ts.subsec_micros())?;
        self.out.write_u32::<LittleEndian>(caplen as u32)?;
        self.out.write_u32::<LittleEndian>(pdu.len() as u32)?;
        self.out.write_all(&pdu[..caplen])?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> CaptureSink for PcapWriter<W> {
    fn capture(&mut self, pdu: &[u8]) -> io::Result<()> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        self.capture_at(pdu, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcap_parser::traits::PcapReaderIterator;
    use pcap_parser::{Linktype, PcapBlockOwned, PcapError};
    use std::fs::File;

    #[test]
    fn memory_sink_keeps_order() {
        let mut sink = MemorySink::default();
        sink.capture(&[1]).unwrap();
        sink.capture(&[2, 3]).unwrap();
        assert_eq!(sink.pdus, vec![vec![1], vec![2, 3]]);
    }

    #[test]
    fn pcap_file_reads_back() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut w = PcapWriter::new(File::create(tmp.path()).unwrap()).unwrap();
        w.capture_at(&[0x10, 0x20], Duration::from_micros(1_500_000)).unwrap();
        w.capture(&[0x30]).unwrap();
        assert_eq!(w.records(), 2);
        w.into_inner().unwrap();

        let mut reader = pcap_parser::pcap::LegacyPcapReader::new(1 << 16, File::open(tmp.path()).unwrap()).unwrap();
        let mut linktype = None;
        let mut records = Vec::new();
        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    match block {
                        PcapBlockOwned::LegacyHeader(h) => linktype = Some(h.network),
                        PcapBlockOwned::Legacy(b) => records.push((b.ts_sec, b.ts_usec, b.data.to_vec())),
                        PcapBlockOwned::NG(_) => {}
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_)) => reader.refill().unwrap(),
                Err(e) => panic!("pcap read error: {:?}", e),
            }
        }
        assert_eq!(linktype, Some(Linktype(DLT_USER0 as i32)));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (1, 500_000, vec![0x10, 0x20]));
        assert_eq!(records[1].2, vec![0x30]);
    }
}
