//! A queryable, templated log archive codec.
//!
//! `templog` mines a latent template structure out of a stream of log
//! lines, packs the resulting `(event_id, params)` rows (plus any line that
//! matched no template) into independently-compressed, Bloom-indexed
//! packets, and frames the result into one self-describing blob. The blob is
//! simultaneously strongly compressed and directly searchable by keyword
//! without full decompression.
//!
//! The pipeline, leaf-to-root:
//!
//! 1. [`primitives`] — uvarint/zigzag/bit-packing wire primitives.
//! 2. [`template`] — the template bank: parses lines into events or unknown lines.
//! 3. [`channel`] — the H1M2 typed columnar encoder for one batch of rows.
//! 4. [`bloom`] — the per-packet keyword Bloom filter.
//! 5. [`blob`] — the container header/packet-table format shared by writer and reader.
//! 6. [`packet`] — the packet framer: the actual encode entry point, [`encode`].
//! 7. [`index`] — the read-only [`Index`] built from a blob's header and table.
//! 8. [`decoder`] — selective decompression and line rehydration.
//! 9. [`query`] — the keyword query engine.
//!
//! # Example
//!
//! ```
//! use templog::{config::EncodeOptions, encode, Index};
//!
//! let tpl_text = "EventId,EventTemplate\nE1,User <*> logged in from <*>\n";
//! let lines = vec![
//!     "User Alice logged in from 10.0.0.1".to_string(),
//!     "User Bob logged in from 10.0.0.2".to_string(),
//! ];
//!
//! let blob = encode(&lines, tpl_text, &EncodeOptions::default()).unwrap();
//! let index = Index::build(&blob).unwrap();
//! assert_eq!(templog::decode_all(&index, &blob).unwrap(), lines);
//!
//! let hits = templog::query(&index, &blob, "Bob", &Default::default()).unwrap();
//! assert_eq!(hits, vec!["User Bob logged in from 10.0.0.2".to_string()]);
//! ```

pub mod blob;
pub mod bloom;
pub mod channel;
pub mod compressor;
pub mod config;
pub mod decoder;
pub mod error;
pub mod index;
pub mod packet;
pub mod primitives;
pub mod query;
pub mod template;

pub use config::{EncodeMode, EncodeOptions, QueryOptions};
pub use error::{Error, Result};
pub use index::Index;
pub use template::Bank;

/// Mine `lines` against the templates in `tpl_csv_text` and frame the result
/// into a complete blob (spec's end-to-end encode: template bank → H1M2 →
/// packet framer).
///
/// `tpl_csv_text` is embedded verbatim in the produced blob so a later
/// [`Index::build`] can reload the same bank without external state.
pub fn encode(lines: &[String], tpl_csv_text: &str, opts: &EncodeOptions) -> Result<Vec<u8>> {
    let bank = Bank::load_from_text(tpl_csv_text)?;
    let (events, unknown, row_kinds) = bank.parse_lines(lines);
    packet::encode_blob(&bank, tpl_csv_text, &events, &unknown, &row_kinds, opts)
}

/// Decode every line in `blob_bytes` in order (spec's `decode_all`).
pub fn decode_all(index: &Index, blob_bytes: &[u8]) -> Result<Vec<String>> {
    decoder::decode_all(index, blob_bytes)
}

/// Decode only the packets at `packet_indices`, in the order given (spec's
/// `decode_selected`).
pub fn decode_selected(index: &Index, blob_bytes: &[u8], packet_indices: &[usize]) -> Result<Vec<String>> {
    decoder::decode_selected(index, blob_bytes, packet_indices)
}

/// Run a keyword query against an indexed blob (spec's `query`).
pub fn query(index: &Index, blob_bytes: &[u8], q: &str, opts: &QueryOptions) -> Result<Vec<String>> {
    query::query(index, blob_bytes, q, opts)
}
