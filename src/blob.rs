//! Container-format primitives shared by the packet framer (writer) and the
//! index builder (reader): the common header, the packet table, and the
//! delta-coded event-id set.
//!
//! Resolves one of spec's open questions: the header always carries
//! `bloom_bits`/`bloom_k` and a `dict_len`/`dict_bytes` block regardless of
//! magic (`TPF3`/`PFQ1`/`TPF2`) — every packet always carries a Bloom (the
//! per-packet invariant is unconditional), and `dict_len == 0` is simply how
//! a non-dictionary blob spells "no shared dictionary". This keeps one
//! reader and one writer for all three magics, differing only in default
//! packet size and whether training actually produced a non-empty dictionary.

use crate::config::EncodeMode;
use crate::error::{Error, Result};
use crate::primitives::{bstr_decode, bstr_encode, uvarint_decode, uvarint_encode};

const VERSION: u32 = 1;

/// The fixed-size portion of a blob, plus its variable-length dictionary and
/// template-table bytes.
#[derive(Debug, Clone)]
pub struct Header {
    /// 4-byte container magic: `TPF3`, `PFQ1`, or `TPF2`.
    pub magic: [u8; 4],
    /// Format version; currently always `1`.
    pub version: u32,
    /// zstd compressor level packets were built with.
    pub zstd_level: u32,
    /// Maximum rows per packet this blob was built with.
    pub packet_events: u32,
    /// Per-packet Bloom width in bits.
    pub bloom_bits: u32,
    /// Number of hash positions per Bloom-indexed token.
    pub bloom_k: u32,
    /// Trained shared compression dictionary; empty if none.
    pub dict: Vec<u8>,
    /// The template bank's source text, embedded verbatim.
    pub tpl_bytes: Vec<u8>,
}

impl Header {
    /// Which [`EncodeMode`] a magic corresponds to, if recognized.
    pub fn mode(&self) -> Result<EncodeMode> {
        match &self.magic {
            b"TPF3" => Ok(EncodeMode::Archival),
            b"PFQ1" => Ok(EncodeMode::Query),
            b"TPF2" => Ok(EncodeMode::Dict),
            _ => Err(Error::corrupt(format!(
                "unrecognized magic {:?}",
                String::from_utf8_lossy(&self.magic)
            ))),
        }
    }
}

/// One packet's entry in the packet table: where its compressed payload
/// lives, the distinct event ids it contains, and its Bloom bytes.
#[derive(Debug, Clone)]
pub struct PacketTableEntry {
    /// Absolute byte offset of this packet's compressed payload in the blob.
    pub offset: u32,
    /// Length in bytes of the compressed payload.
    pub length: u32,
    /// Sorted, deduplicated event ids appearing in this packet (invariant I2).
    pub eids_sorted: Vec<u32>,
    /// This packet's raw Bloom bit array.
    pub bloom_bytes: Vec<u8>,
}

/// Encode a sorted, deduplicated event-id set as delta-coded uvarints.
#[must_use]
pub fn encode_eidset(eids_sorted: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev = 0u32;
    for (i, &eid) in eids_sorted.iter().enumerate() {
        let delta = if i == 0 { eid } else { eid - prev };
        out.extend(uvarint_encode(u64::from(delta)));
        prev = eid;
    }
    out
}

/// Decode a delta-coded event-id set.
pub fn decode_eidset(bytes: &[u8]) -> Result<Vec<u32>> {
    let mut out = Vec::new();
    let mut off = 0;
    let mut prev = 0u32;
    while off < bytes.len() {
        let (delta, new_off) = uvarint_decode(bytes, off)?;
        off = new_off;
        let delta = u32::try_from(delta).map_err(|_| Error::corrupt("eidset delta overflows u32"))?;
        let eid = if out.is_empty() { delta } else { prev + delta };
        out.push(eid);
        prev = eid;
    }
    Ok(out)
}

/// Serialize the header fields, the packet table, and the packet payloads
/// into one blob, patching absolute offsets after payload placement.
#[must_use]
pub fn assemble(
    mode: EncodeMode,
    zstd_level: u32,
    packet_events: u32,
    bloom_bits: u32,
    bloom_k: u32,
    dict: &[u8],
    tpl_bytes: &[u8],
    packets: &[(Vec<u32>, Vec<u8>, Vec<u8>)], // (eids_sorted, bloom_bytes, compressed_payload)
) -> Vec<u8> {
    let mut header = Vec::new();
    header.extend_from_slice(mode.magic());
    header.extend_from_slice(&VERSION.to_le_bytes());
    header.extend_from_slice(&zstd_level.to_le_bytes());
    header.extend_from_slice(&packet_events.to_le_bytes());
    header.extend_from_slice(&bloom_bits.to_le_bytes());
    header.extend_from_slice(&bloom_k.to_le_bytes());
    header.extend_from_slice(&(dict.len() as u32).to_le_bytes());
    header.extend_from_slice(dict);
    header.extend_from_slice(&(tpl_bytes.len() as u32).to_le_bytes());
    header.extend_from_slice(tpl_bytes);
    header.extend(uvarint_encode(packets.len() as u64));

    let wrapped: Vec<(Vec<u8>, Vec<u8>)> = packets
        .iter()
        .map(|(eids, bloom, _)| (bstr_encode(&encode_eidset(eids)), bstr_encode(bloom)))
        .collect();

    let table_len: usize = wrapped.iter().map(|(e, b)| 4 + 4 + e.len() + b.len()).sum();
    let payloads_start = header.len() + table_len;

    let mut offsets = Vec::with_capacity(packets.len());
    let mut cursor = payloads_start;
    for (_, _, payload) in packets {
        offsets.push(cursor as u32);
        cursor += payload.len();
    }

    let mut out = header;
    for ((eidset_bytes, bloom_bytes), (offset, (_, _, payload))) in
        wrapped.iter().zip(offsets.iter().zip(packets.iter()))
    {
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(eidset_bytes);
        out.extend_from_slice(bloom_bytes);
    }
    for (_, _, payload) in packets {
        out.extend_from_slice(payload);
    }
    out
}

/// Parse the header and packet table; no payload bytes are read.
pub fn parse(data: &[u8]) -> Result<(Header, Vec<PacketTableEntry>)> {
    if data.len() < 4 {
        return Err(Error::corrupt("blob too short for magic"));
    }
    let magic: [u8; 4] = data[0..4].try_into().unwrap();
    if !matches!(&magic, b"TPF3" | b"PFQ1" | b"TPF2") {
        return Err(Error::corrupt(format!(
            "bad magic {:?}",
            String::from_utf8_lossy(&magic)
        )));
    }
    let mut off = 4;
    let version = read_u32(data, &mut off)?;
    if version != VERSION {
        return Err(Error::corrupt(format!("unsupported blob version {version}")));
    }
    let zstd_level = read_u32(data, &mut off)?;
    let packet_events = read_u32(data, &mut off)?;
    let bloom_bits = read_u32(data, &mut off)?;
    let bloom_k = read_u32(data, &mut off)?;

    let dict_len = read_u32(data, &mut off)? as usize;
    let dict = read_bytes(data, &mut off, dict_len)?.to_vec();

    let tpl_len = read_u32(data, &mut off)? as usize;
    let tpl_bytes = read_bytes(data, &mut off, tpl_len)?.to_vec();

    let (packet_count, new_off) = uvarint_decode(data, off)?;
    off = new_off;

    let mut table = Vec::with_capacity(packet_count as usize);
    for _ in 0..packet_count {
        let offset = read_u32(data, &mut off)?;
        let length = read_u32(data, &mut off)?;
        let (eidset_bytes, new_off) = bstr_decode(data, off)?;
        off = new_off;
        let eids_sorted = decode_eidset(eidset_bytes)?;
        let (bloom_bytes, new_off) = bstr_decode(data, off)?;
        off = new_off;

        let end = (offset as usize)
            .checked_add(length as usize)
            .ok_or_else(|| Error::corrupt("packet offset+length overflow"))?;
        if end > data.len() {
            return Err(Error::corrupt("packet payload extends past end of blob"));
        }

        table.push(PacketTableEntry {
            offset,
            length,
            eids_sorted,
            bloom_bytes: bloom_bytes.to_vec(),
        });
    }

    validate_offsets(&table)?;

    Ok((
        Header {
            magic,
            version,
            zstd_level,
            packet_events,
            bloom_bits,
            bloom_k,
            dict,
            tpl_bytes,
        },
        table,
    ))
}

/// Invariant I4: offsets monotonically increase and packet payloads never overlap.
fn validate_offsets(table: &[PacketTableEntry]) -> Result<()> {
    let mut prev_end = 0u64;
    for entry in table {
        let start = u64::from(entry.offset);
        let end = start + u64::from(entry.length);
        if start < prev_end {
            return Err(Error::corrupt("packet table offsets are not monotonically increasing"));
        }
        prev_end = end;
    }
    Ok(())
}

fn read_u32(data: &[u8], off: &mut usize) -> Result<u32> {
    let bytes = read_bytes(data, off, 4)?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_bytes<'a>(data: &'a [u8], off: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = off.checked_add(len).ok_or_else(|| Error::corrupt("length overflow"))?;
    if end > data.len() {
        return Err(Error::Truncated {
            needed: end,
            available: data.len(),
        });
    }
    let slice = &data[*off..end];
    *off = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eidset_roundtrip() {
        let eids = vec![1u32, 5, 5, 7, 1000];
        let bytes = encode_eidset(&eids);
        let decoded = decode_eidset(&bytes).unwrap();
        assert_eq!(decoded, eids);
    }

    #[test]
    fn eidset_roundtrip_empty() {
        assert!(decode_eidset(&encode_eidset(&[])).unwrap().is_empty());
    }

    #[test]
    fn assemble_and_parse_empty_blob() {
        let bytes = assemble(EncodeMode::Query, 19, 32, 8192, 4, &[], b"EventId,EventTemplate\n", &[]);
        let (header, table) = parse(&bytes).unwrap();
        assert_eq!(&header.magic, b"PFQ1");
        assert!(table.is_empty());
    }

    #[test]
    fn assemble_and_parse_roundtrips_table() {
        let packets = vec![
            (vec![1, 2], vec![0xAAu8; 8], vec![1, 2, 3]),
            (vec![5], vec![0x55u8; 8], vec![4, 5]),
        ];
        let bytes = assemble(EncodeMode::Archival, 3, 1000, 64, 4, &[], b"tpl", &packets);
        let (header, table) = parse(&bytes).unwrap();
        assert_eq!(header.zstd_level, 3);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].eids_sorted, vec![1, 2]);
        assert_eq!(table[1].eids_sorted, vec![5]);
        let p0 = &bytes[table[0].offset as usize..(table[0].offset + table[0].length) as usize];
        assert_eq!(p0, &[1, 2, 3]);
        let p1 = &bytes[table[1].offset as usize..(table[1].offset + table[1].length) as usize];
        assert_eq!(p1, &[4, 5]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = assemble(EncodeMode::Query, 1, 1, 8, 1, &[], b"", &[]);
        bytes[0] = b'X';
        assert!(parse(&bytes).is_err());
    }

    #[test]
    fn rejects_truncated_blob() {
        let bytes = assemble(EncodeMode::Query, 1, 1, 8, 1, &[], b"tpl text", &[]);
        assert!(parse(&bytes[..bytes.len() - 2]).is_err());
    }
}
