//! Query engine: tokenizes a keyword query, probes each packet's Bloom to
//! prune candidates, decompresses only the survivors, and applies an exact
//! substring post-filter (spec.md §4.8 — the Bloom is one-sided, so this
//! pass is what makes the result set authoritative).

use hashbrown::HashSet;
use log::trace;

use crate::bloom;
use crate::config::QueryOptions;
use crate::decoder;
use crate::error::Result;
use crate::index::Index;

/// Run a keyword query against `index`/`blob_bytes`.
///
/// Packets are visited in index order (spec.md §5's ordering guarantee: hits
/// come back in packet-index order, row order within a packet) and decoding
/// stops as soon as `limit` hits have accumulated. The template-routed fast
/// path (spec.md §4.8, §4.14) is consulted per packet before the Bloom probe:
/// [`Index::route_tokens_to_events`] maps the query tokens to templates whose
/// literal text plausibly contains them, and a packet touching one of those
/// routed event ids is decoded directly, skipping its own Bloom probe.
/// Every other packet falls back to the ordinary Bloom-probe scan — routing
/// only ever saves a probe, it never skips a packet the full scan would have
/// visited.
pub fn query(index: &Index, blob_bytes: &[u8], q: &str, opts: &QueryOptions) -> Result<Vec<String>> {
    let tokens = bloom::tokenize(q);
    let mut hits = Vec::new();
    if tokens.is_empty() {
        return Ok(hits);
    }

    let routed_events = index.route_tokens_to_events(&tokens);
    let routed_packets: HashSet<usize> = routed_events
        .iter()
        .flat_map(|&eid| index.packets_with_event(eid).iter().copied())
        .collect();

    for packet_idx in 0..index.packet_count() {
        if hits.len() >= opts.limit {
            break;
        }
        if routed_packets.contains(&packet_idx) {
            trace!("packet {packet_idx} reached via template-routed fast path, decompressing");
        } else {
            let filter = index.packet_bloom(packet_idx);
            if !filter.probe(&tokens, opts.require_all_terms) {
                continue;
            }
            trace!("packet {packet_idx} survived bloom probe, decompressing");
        }
        decode_and_collect(index, blob_bytes, packet_idx, &tokens, opts, &mut hits)?;
    }

    Ok(hits)
}

/// Decode one packet and append every substring-verified hit to `hits`,
/// stopping as soon as `opts.limit` is reached.
fn decode_and_collect(
    index: &Index,
    blob_bytes: &[u8],
    packet_idx: usize,
    tokens: &[String],
    opts: &QueryOptions,
    hits: &mut Vec<String>,
) -> Result<()> {
    let lines = decoder::decode_packet(index, blob_bytes, packet_idx)?;
    for line in lines {
        if hits.len() >= opts.limit {
            break;
        }
        if matches(&line, tokens, opts.require_all_terms) {
            hits.push(line);
        }
    }
    Ok(())
}

/// Exact (non-probabilistic) substring match: every query token must occur
/// as a case-insensitive substring of `line` (`require_all`), or any one
/// token suffices otherwise.
fn matches(line: &str, tokens: &[String], require_all: bool) -> bool {
    let lowered = line.to_lowercase();
    if require_all {
        tokens.iter().all(|t| lowered.contains(t.as_str()))
    } else {
        tokens.iter().any(|t| lowered.contains(t.as_str()))
    }
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
    fn finds_exact_token_in_templated_line() {
        let lines = [
            "User Alice logged in from 10.0.0.1",
            "User Bob logged in from 10.0.0.2",
        ];
        let (index, blob) = build_blob(&lines, 32768);
        let hits = query(&index, &blob, "Bob", &QueryOptions::default()).unwrap();
        assert_eq!(hits, vec!["User Bob logged in from 10.0.0.2".to_string()]);
    }

    #[test]
    fn require_all_terms_and_semantics() {
        let lines = [
            "User Alice logged in from 10.0.0.1",
            "User Bob logged in from 10.0.0.2",
        ];
        let (index, blob) = build_blob(&lines, 32768);
        let opts = QueryOptions { require_all_terms: true, ..QueryOptions::default() };
        let hits = query(&index, &blob, "Alice 10.0.0.1", &opts).unwrap();
        assert_eq!(hits, vec!["User Alice logged in from 10.0.0.1".to_string()]);
    }

    #[test]
    fn unknown_line_is_searchable() {
        let (index, blob) = build_blob(&["free-form log text"], 32768);
        let hits = query(&index, &blob, "text", &QueryOptions::default()).unwrap();
        assert_eq!(hits, vec!["free-form log text".to_string()]);
    }

    #[test]
    fn multi_packet_selective_decode_returns_exact_subset() {
        let mut lines: Vec<String> = (0..100).map(|i| format!("User u{i} logged in from 10.0.0.{i}")).collect();
        // Plant a unique token only in rows 55..57 (within one packet at packet_events=10).
        lines[55] = "User special logged in from 10.0.0.55".to_string();
        lines[56] = "User special logged in from 10.0.0.56".to_string();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (index, blob) = build_blob(&refs, 10);

        let hits = query(&index, &blob, "special", &QueryOptions::default()).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.contains("special")));
    }

    #[test]
    fn limit_stops_early() {
        let lines: Vec<String> = (0..20).map(|i| format!("User u{i} logged in from 10.0.0.{i}")).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (index, blob) = build_blob(&refs, 32768);
        let opts = QueryOptions { limit: 3, require_all_terms: true };
        let hits = query(&index, &blob, "logged", &opts).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn empty_query_returns_no_hits() {
        let (index, blob) = build_blob(&["a line"], 32768);
        let hits = query(&index, &blob, "", &QueryOptions::default()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn template_routed_fast_path_is_actually_consulted() {
        // "logged" appears in the E1 template's literal text, so
        // route_tokens_to_events should route straight to packets touching
        // event id 1 without needing a single Bloom probe to agree first.
        let (index, blob) = build_blob(
            &["User Alice logged in from 10.0.0.1", "User Bob logged in from 10.0.0.2"],
            32768,
        );
        assert_eq!(index.route_tokens_to_events(&["logged".to_string()]), vec![1]);
        let hits = query(&index, &blob, "logged", &QueryOptions::default()).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn routed_and_unrouted_hits_stay_in_packet_index_order() {
        // Plant a token that only appears inside an unknown line — routing
        // cannot find it (it is not part of any template's literal text), so
        // this packet must still surface through the Bloom-probe fallback,
        // and the combined hit list must stay in packet-index order rather
        // than routed-packets-first.
        let mut lines: Vec<String> = (0..30).map(|i| format!("User u{i} logged in from 10.0.0.{i}")).collect();
        lines.insert(0, "an unrelated warning mentioning logged systems".to_string());
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (index, blob) = build_blob(&refs, 10);

        let hits = query(&index, &blob, "logged", &QueryOptions::default()).unwrap();
        let plain_scan = decoder::decode_all(&index, &blob).unwrap();
        let expected: Vec<String> = plain_scan.into_iter().filter(|l| l.to_lowercase().contains("logged")).collect();
        assert_eq!(hits, expected);
    }
}
