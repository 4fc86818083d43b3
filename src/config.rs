//! Encoder/query configuration surface (spec §6's option table, made concrete).

/// Which magic/default profile an encode targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    /// `TPF3`, large packets, optimized for compression ratio.
    Archival,
    /// `PFQ1`, small packets, optimized for selective decode.
    Query,
    /// `TPF2`, carries a trained shared dictionary.
    Dict,
}

impl EncodeMode {
    pub(crate) fn magic(self) -> &'static [u8; 4] {
        match self {
            EncodeMode::Archival => b"TPF3",
            EncodeMode::Query => b"PFQ1",
            EncodeMode::Dict => b"TPF2",
        }
    }

    pub(crate) fn default_packet_events(self) -> u32 {
        match self {
            EncodeMode::Archival => 32768,
            EncodeMode::Query => 32,
            EncodeMode::Dict => 32768,
        }
    }
}

/// Encoder configuration. `Default` matches the documented defaults for
/// [`EncodeMode::Query`]; callers targeting archival/dict blobs typically
/// start from [`EncodeOptions::for_mode`] instead.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Which container variant (and default packet size) to build.
    pub mode: EncodeMode,
    /// Maximum rows per packet.
    pub packet_events: u32,
    /// zstd compressor level, 1-22.
    pub zstd_level: i32,
    /// Per-packet Bloom width in bits; must be a positive multiple of 8.
    pub bloom_bits: u32,
    /// Number of independent hash positions per Bloom-indexed token.
    pub bloom_k: u32,
    /// Target size in bytes for the trained shared dictionary; 0 disables training.
    pub dict_target_size: usize,
    /// Whether to also index a light stem of every token.
    pub stem_enabled: bool,
    /// Whether to also index a `pref:<first_n>` prefix of every token; 0 disables.
    pub prefix_len: usize,
}

impl EncodeOptions {
    /// Start from the documented defaults for `mode`.
    #[must_use]
    pub fn for_mode(mode: EncodeMode) -> Self {
        EncodeOptions {
            mode,
            packet_events: mode.default_packet_events(),
            zstd_level: 19,
            bloom_bits: 8192,
            bloom_k: 4,
            dict_target_size: if matches!(mode, EncodeMode::Dict) { 32 * 1024 } else { 0 },
            stem_enabled: false,
            prefix_len: 0,
        }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions::for_mode(EncodeMode::Query)
    }
}

/// Query-time configuration.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Stop once this many hits have accumulated.
    pub limit: usize,
    /// Whether every query token must match (`AND`) or any one is enough (`OR`).
    pub require_all_terms: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            limit: usize::MAX,
            require_all_terms: true,
        }
    }
}
