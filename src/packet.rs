//! Packet framer (`TPF3`/`PFQ1`/`TPF2`): groups a parsed batch of rows into
//! packets, compresses each independently, and builds the per-packet eid-set
//! and Bloom that make the resulting blob randomly addressable.
//!
//! Packet-level work (H1M2 encode, compress, Bloom build) is independent per
//! packet (spec.md §5); when the `parallel` feature is enabled this runs over
//! `rayon`'s global pool and the per-packet outputs are re-joined in row
//! order before the serial table-assembly pass, so the observable bytes are
//! identical to the serial path.

use log::{debug, warn};

use crate::blob;
use crate::bloom::{self, Bloom};
use crate::channel;
use crate::compressor;
use crate::config::{EncodeMode, EncodeOptions};
use crate::error::Result;
use crate::template::{render_template, Bank, RowKind};

/// One packet's worth of parsed rows, in input order.
struct PacketRows {
    events: Vec<(u32, Vec<String>)>,
    unknown: Vec<String>,
    row_kinds: Vec<RowKind>,
}

/// Split `row_kinds` (global) plus the already-separated `events`/`unknown`
/// vectors into `packet_events`-sized chunks, re-deriving local row_kinds and
/// local event/unknown slices per chunk so each packet is self-contained.
fn split_into_packets(
    events: &[(u32, Vec<String>)],
    unknown: &[String],
    row_kinds: &[RowKind],
    packet_rows: usize,
) -> Vec<PacketRows> {
    let packet_rows = packet_rows.max(1);
    let mut packets = Vec::new();
    for chunk in row_kinds.chunks(packet_rows) {
        let mut local_events = Vec::new();
        let mut local_unknown = Vec::new();
        let mut local_kinds = Vec::with_capacity(chunk.len());
        for kind in chunk {
            match *kind {
                RowKind::Known(i) => {
                    local_kinds.push(RowKind::Known(local_events.len()));
                    local_events.push(events[i].clone());
                }
                RowKind::Unknown(i) => {
                    local_kinds.push(RowKind::Unknown(local_unknown.len()));
                    local_unknown.push(unknown[i].clone());
                }
            }
        }
        packets.push(PacketRows {
            events: local_events,
            unknown: local_unknown,
            row_kinds: local_kinds,
        });
    }
    packets
}

/// Render every row of a packet (events through their template, unknown
/// lines verbatim) and tokenize into the Bloom per invariant I3.
fn build_bloom(bank: &Bank, rows: &PacketRows, opts: &EncodeOptions) -> Result<Bloom> {
    bloom::validate_bits(opts.bloom_bits)?;
    let mut filter = Bloom::new(opts.bloom_bits, opts.bloom_k);
    for (eid, params) in &rows.events {
        let rendered = match bank.get(*eid) {
            Some(tpl) => render_template(tpl.pattern(), params),
            None => return Err(crate::error::Error::corrupt(format!("unknown event id {eid} in bank"))),
        };
        for tok in bloom::tokenize(&rendered) {
            filter.add_indexed(&tok, opts.stem_enabled, opts.prefix_len);
        }
    }
    for line in &rows.unknown {
        for tok in bloom::tokenize(line) {
            filter.add_indexed(&tok, opts.stem_enabled, opts.prefix_len);
        }
    }
    Ok(filter)
}

fn eids_sorted(rows: &PacketRows) -> Vec<u32> {
    let mut eids: Vec<u32> = rows.events.iter().map(|(eid, _)| *eid).collect();
    eids.sort_unstable();
    eids.dedup();
    eids
}

/// Encode one packet: H1M2 bytes, eid-set, Bloom, and the compressed payload
/// (against `dict` when non-empty, per invariant I5).
fn encode_one_packet(
    bank: &Bank,
    rows: &PacketRows,
    opts: &EncodeOptions,
    dict: &[u8],
) -> Result<(Vec<u32>, Vec<u8>, Vec<u8>)> {
    let plain = channel::encode_batch(&rows.events, &rows.unknown, &rows.row_kinds);
    let compressed = compressor::compress_auto(&plain, opts.zstd_level, dict)?;
    let filter = build_bloom(bank, rows, opts)?;
    Ok((eids_sorted(rows), filter.as_bytes().to_vec(), compressed))
}

/// Plaintext H1M2 bytes for every packet, used as shared-dictionary training
/// samples. Computed once, reused both for training and (if training yields
/// a dictionary) discarded in favor of the dict-compressed payload.
fn plaintexts(packets: &[PacketRows]) -> Vec<Vec<u8>> {
    packets
        .iter()
        .map(|p| channel::encode_batch(&p.events, &p.unknown, &p.row_kinds))
        .collect()
}

/// Build a complete blob from a parsed batch of rows.
///
/// `row_kinds` must have come from the same [`Bank::parse_lines`] call as
/// `events`/`unknown` (or an equivalent reconstruction) — it is the rowmask
/// that lets packetization preserve input order across the event/unknown
/// split.
pub fn encode_blob(
    bank: &Bank,
    tpl_csv_text: &str,
    events: &[(u32, Vec<String>)],
    unknown: &[String],
    row_kinds: &[RowKind],
    opts: &EncodeOptions,
) -> Result<Vec<u8>> {
    let packets = split_into_packets(events, unknown, row_kinds, opts.packet_events as usize);

    let dict = if matches!(opts.mode, EncodeMode::Dict) && opts.dict_target_size > 0 {
        let samples = plaintexts(&packets);
        match compressor::train_dictionary(&samples, opts.dict_target_size) {
            Some(d) => {
                debug!("trained shared dictionary: {} bytes from {} packets", d.len(), packets.len());
                d
            }
            None => {
                warn!("dictionary training declined (corpus too small or trainer failed); falling back to plain compression");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let encoded = encode_all_packets(bank, &packets, opts, &dict)?;

    debug!(
        "encoded {} packets ({} events, {} unknown lines) into {:?} blob",
        packets.len(),
        events.len(),
        unknown.len(),
        opts.mode
    );

    Ok(blob::assemble(
        opts.mode,
        opts.zstd_level as u32,
        opts.packet_events,
        opts.bloom_bits,
        opts.bloom_k,
        &dict,
        tpl_csv_text.as_bytes(),
        &encoded,
    ))
}

#[cfg(feature = "parallel")]
fn encode_all_packets(
    bank: &Bank,
    packets: &[PacketRows],
    opts: &EncodeOptions,
    dict: &[u8],
) -> Result<Vec<(Vec<u32>, Vec<u8>, Vec<u8>)>> {
    use rayon::prelude::*;
    packets
        .par_iter()
        .map(|rows| encode_one_packet(bank, rows, opts, dict))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn encode_all_packets(
    bank: &Bank,
    packets: &[PacketRows],
    opts: &EncodeOptions,
    dict: &[u8],
) -> Result<Vec<(Vec<u32>, Vec<u8>, Vec<u8>)>> {
    packets.iter().map(|rows| encode_one_packet(bank, rows, opts, dict)).collect()
}
