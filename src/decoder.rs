//! Decoder: selectively decompresses packets and rehydrates lines, replaying
//! each packet's row-kind interleaving so events and unknown lines come back
//! out in exactly their original order (invariant I1).

use crate::channel;
use crate::compressor;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::template::{render_template, RowKind};

/// Decode every packet in order and concatenate their rehydrated rows.
pub fn decode_all(index: &Index, blob_bytes: &[u8]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for i in 0..index.packet_count() {
        out.extend(decode_packet(index, blob_bytes, i)?);
    }
    Ok(out)
}

/// Decode only the packets at `packet_indices`, in the order given.
///
/// The caller is responsible for including enough packets to cover the
/// desired lines (spec.md §4.7) — this performs no reordering or dedup
/// beyond what the caller asks for.
pub fn decode_selected(index: &Index, blob_bytes: &[u8], packet_indices: &[usize]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for &i in packet_indices {
        out.extend(decode_packet(index, blob_bytes, i)?);
    }
    Ok(out)
}

/// Decompress one packet and rehydrate its rows, replaying the packet's
/// rowmask (spec.md §4.3) to restore the original event/unknown
/// interleaving rather than assuming any fixed layout.
pub(crate) fn decode_packet(index: &Index, blob_bytes: &[u8], packet_idx: usize) -> Result<Vec<String>> {
    let payload = index.packet_payload(blob_bytes, packet_idx);
    let dict = index.dict();
    let plain = compressor::decompress_auto(payload, dict)?;
    let (events, unknown, row_kinds) = channel::decode_batch(&plain)?;

    let mut rendered_events = Vec::with_capacity(events.len());
    for (eid, params) in events {
        let tpl = index
            .bank()
            .get(eid)
            .ok_or_else(|| Error::corrupt(format!("event id {eid} has no entry in the template bank")))?;
        rendered_events.push(render_template(tpl.pattern(), &params));
    }

    let mut lines = Vec::with_capacity(row_kinds.len());
    for kind in row_kinds {
        match kind {
            RowKind::Known(i) => lines.push(
                rendered_events
                    .get(i)
                    .cloned()
                    .ok_or_else(|| Error::corrupt("rowmask references out-of-range event index"))?,
            ),
            RowKind::Unknown(i) => lines.push(
                unknown
                    .get(i)
                    .cloned()
                    .ok_or_else(|| Error::corrupt("rowmask references out-of-range unknown index"))?,
            ),
        }
    }
    Ok(lines)
}

/// A lazy, forward-only iterator over a blob's rehydrated lines, decoding
/// one packet at a time rather than materializing every line up front. Not
/// restartable; re-open the blob via a fresh [`Index`] to iterate again.
pub struct LineIter<'a> {
    index: &'a Index,
    blob_bytes: &'a [u8],
    next_packet: usize,
    buffered: std::vec::IntoIter<String>,
}

impl<'a> LineIter<'a> {
    /// Start a lazy iterator over every line in `index`'s blob.
    #[must_use]
    pub fn new(index: &'a Index, blob_bytes: &'a [u8]) -> Self {
        LineIter { index, blob_bytes, next_packet: 0, buffered: Vec::new().into_iter() }
    }
}

impl Iterator for LineIter<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.buffered.next() {
                return Some(Ok(line));
            }
            if self.next_packet >= self.index.packet_count() {
                return None;
            }
            match decode_packet(self.index, self.blob_bytes, self.next_packet) {
                Ok(lines) => {
                    self.next_packet += 1;
                    self.buffered = lines.into_iter();
                }
                Err(e) => {
                    self.next_packet = self.index.packet_count();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Iterate packets as decoded line-groups, one `Vec<String>` per packet.
pub fn iter_packets<'a>(index: &'a Index, blob_bytes: &'a [u8]) -> impl Iterator<Item = Result<Vec<String>>> + 'a {
    (0..index.packet_count()).map(move |i| decode_packet(index, blob_bytes, i))
}

/// Iterate every line in the blob lazily, packet by packet.
#[must_use]
pub fn iter_lines<'a>(index: &'a Index, blob_bytes: &'a [u8]) -> LineIter<'a> {
    LineIter::new(index, blob_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncodeMode, EncodeOptions};
    use crate::packet::encode_blob;
    use crate::template::Bank;

    fn build_blob(lines: &[&str], packet_events: u32) -> (Index, Vec<u8>) {
        let tpl_text = "EventId,EventTemplate\nE1,User <*> logged in from <*>\n";
        let bank = Bank::load_from_text(tpl_text).unwrap();
        let lines: Vec<String> = lines.iter().map(|s| (*s).to_string()).collect();
        let (events, unknown, row_kinds) = bank.parse_lines(&lines);
        let mut opts = EncodeOptions::for_mode(EncodeMode::Query);
        opts.packet_events = packet_events;
        let blob = encode_blob(&bank, tpl_text, &events, &unknown, &row_kinds, &opts).unwrap();
        let index = Index::build(&blob).unwrap();
        (index, blob)
    }

    #[test]
    fn decode_all_round_trips_exact_lines() {
        let lines = [
            "User Alice logged in from 10.0.0.1",
            "an untemplated warning",
            "User Bob logged in from 10.0.0.2",
        ];
        let (index, blob) = build_blob(&lines, 32768);
        let decoded = decode_all(&index, &blob).unwrap();
        assert_eq!(decoded, lines.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn decode_selected_subset_matches_full_decode() {
        let lines: Vec<String> = (0..30).map(|i| format!("User u{i} logged in from 10.0.0.{i}")).collect();
        let lines_ref: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (index, blob) = build_blob(&lines_ref, 10);
        assert_eq!(index.packet_count(), 3);

        let all = decode_all(&index, &blob).unwrap();
        let selected = decode_selected(&index, &blob, &[1]).unwrap();
        assert_eq!(selected, all[10..20]);
    }

    #[test]
    fn lazy_iter_lines_matches_decode_all() {
        let lines = ["User Alice logged in from 10.0.0.1", "a plain line"];
        let (index, blob) = build_blob(&lines, 32768);
        let eager = decode_all(&index, &blob).unwrap();
        let lazy: Vec<String> = iter_lines(&index, &blob).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(eager, lazy);
    }

    #[test]
    fn decode_preserves_alternating_known_unknown_interleaving() {
        let lines = [
            "an untemplated warning",
            "User Alice logged in from 10.0.0.1",
            "another untemplated line",
            "User Bob logged in from 10.0.0.2",
            "yet another unknown",
        ];
        let (index, blob) = build_blob(&lines, 32768);
        let decoded = decode_all(&index, &blob).unwrap();
        assert_eq!(decoded, lines.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn empty_blob_decodes_to_empty() {
        let (index, blob) = build_blob(&[], 32768);
        assert!(decode_all(&index, &blob).unwrap().is_empty());
    }
}
