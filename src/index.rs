//! Index builder: parses a blob's header and packet table into a read-only
//! [`Index`], without reading any packet payload. Construction cost is
//! `O(packet_count)` (spec.md §4.6).

use hashbrown::HashMap;

use crate::blob::{self, Header, PacketTableEntry};
use crate::bloom::Bloom;
use crate::config::EncodeMode;
use crate::error::Result;
use crate::template::Bank;

/// A read-only, random-access view into a blob's structure: its template
/// bank, shared dictionary (if any), and per-packet table entries.
///
/// `Index` holds no payload bytes and may be shared across concurrent
/// queries (spec.md §5) — it never mutates after [`Index::build`] returns.
#[derive(Debug)]
pub struct Index {
    header: Header,
    bank: Bank,
    table: Vec<PacketTableEntry>,
    by_event_id: HashMap<u32, Vec<usize>>,
}

impl Index {
    /// Parse `blob`'s header and packet table into a random-access index.
    pub fn build(blob_bytes: &[u8]) -> Result<Self> {
        let (header, table) = blob::parse(blob_bytes)?;
        let tpl_text = std::str::from_utf8(&header.tpl_bytes)
            .map_err(|_| crate::error::Error::corrupt("template table is not valid utf-8"))?;
        let bank = Bank::load_from_text(tpl_text)?;

        let mut by_event_id: HashMap<u32, Vec<usize>> = HashMap::new();
        for (packet_idx, entry) in table.iter().enumerate() {
            for &eid in &entry.eids_sorted {
                by_event_id.entry(eid).or_default().push(packet_idx);
            }
        }

        Ok(Index { header, bank, table, by_event_id })
    }

    /// Which container variant this blob was built as.
    pub fn mode(&self) -> Result<EncodeMode> {
        self.header.mode()
    }

    /// The loaded template bank.
    #[must_use]
    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    /// The shared compression dictionary, empty if this blob has none.
    #[must_use]
    pub fn dict(&self) -> &[u8] {
        &self.header.dict
    }

    /// The Bloom width/hash-count this blob's packets were built with.
    #[must_use]
    pub fn bloom_params(&self) -> (u32, u32) {
        (self.header.bloom_bits, self.header.bloom_k)
    }

    /// Number of packets in the blob.
    #[must_use]
    pub fn packet_count(&self) -> usize {
        self.table.len()
    }

    /// A packet's table entry (offset, length, eidset, Bloom bytes).
    #[must_use]
    pub fn packet(&self, i: usize) -> &PacketTableEntry {
        &self.table[i]
    }

    /// Iterate packet table entries in packet-index order.
    pub fn packets(&self) -> impl Iterator<Item = &PacketTableEntry> {
        self.table.iter()
    }

    /// Raw compressed payload bytes for packet `i`, sliced out of `blob_bytes`.
    #[must_use]
    pub fn packet_payload<'a>(&self, blob_bytes: &'a [u8], i: usize) -> &'a [u8] {
        let entry = &self.table[i];
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        &blob_bytes[start..end]
    }

    /// Rehydrate packet `i`'s Bloom filter for probing.
    #[must_use]
    pub fn packet_bloom(&self, i: usize) -> Bloom {
        let (_, bloom_k) = self.bloom_params();
        Bloom::from_bytes(self.table[i].bloom_bytes.clone(), bloom_k)
    }

    /// Which packet indices contain at least one row with this event id.
    #[must_use]
    pub fn packets_with_event(&self, event_id: u32) -> &[usize] {
        self.by_event_id.get(&event_id).map_or(&[], Vec::as_slice)
    }

    /// Best-effort template-routed query fast path (spec.md §4.8, "a router
    /// optionally tries a template-routed path first"): map query tokens to
    /// templates whose rendered form could plausibly contain them, and
    /// return the packets touching those templates' event ids.
    ///
    /// This is a pure optimization — a token that matches no template
    /// literal text yields no route and the caller falls back to the full
    /// Bloom scan over every packet.
    #[must_use]
    pub fn route_tokens_to_events(&self, tokens: &[String]) -> Vec<u32> {
        let mut matched = Vec::new();
        for tpl in self.bank.iter() {
            let pattern_lower = tpl.pattern().to_lowercase();
            if tokens.iter().any(|t| pattern_lower.contains(t.as_str())) {
                matched.push(tpl.event_id());
            }
        }
        matched
    }
}
