//! Fixed-width Bloom filter used as a per-packet keyword index.
//!
//! One-sided error: `probe` may return `true` for a token that was never
//! added (false positive), but never `false` for one that was (no false
//! negatives). Hashing is deterministic so an independently-built index can
//! probe the same bits a blob's packets were built with.

use crate::error::{Error, Result};

/// Regex-free word tokenizer matching `[A-Za-z0-9_./:-]{2,}`, lowercased.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let is_word_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | ':' | '-');
    let mut tokens = Vec::new();
    let mut cur = String::new();
    for c in text.chars() {
        if is_word_char(c) {
            cur.push(c);
        } else if !cur.is_empty() {
            push_token(&mut tokens, &mut cur);
        }
    }
    if !cur.is_empty() {
        push_token(&mut tokens, &mut cur);
    }
    tokens
}

fn push_token(tokens: &mut Vec<String>, cur: &mut String) {
    if cur.chars().count() >= 2 {
        tokens.push(cur.to_lowercase());
    }
    cur.clear();
}

/// A light, rule-based stemmer: strips a short suffix list. Not a linguistic
/// stemmer — just enough to let `logged`/`logging`/`logs` probe each other.
#[must_use]
pub fn stem(token: &str) -> String {
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(stripped) = token.strip_suffix(suffix) {
            if stripped.chars().count() >= 2 {
                return stripped.to_string();
            }
        }
    }
    token.to_string()
}

/// A `pref:<first_n>` prefix form of a token.
#[must_use]
pub fn prefix_form(token: &str, prefix_len: usize) -> String {
    let prefix: String = token.chars().take(prefix_len).collect();
    format!("pref:{prefix}")
}

/// A fixed-width Bloom filter with `k` independent hash positions per token.
#[derive(Debug, Clone)]
pub struct Bloom {
    bits: Vec<u8>,
    m_bits: u32,
    k: u32,
}

impl Bloom {
    /// Build an empty filter. `m_bits` must be a multiple of 8.
    #[must_use]
    pub fn new(m_bits: u32, k: u32) -> Self {
        assert_eq!(m_bits % 8, 0, "m_bits must be a multiple of 8");
        Bloom {
            bits: vec![0u8; (m_bits / 8) as usize],
            m_bits,
            k,
        }
    }

    /// Rehydrate a filter from its raw bit array.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, k: u32) -> Self {
        let m_bits = bytes.len() as u32 * 8;
        Bloom { bits: bytes, m_bits, k }
    }

    /// The raw bit array, `m_bits / 8` bytes long.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Number of bits in this filter.
    #[must_use]
    pub fn m_bits(&self) -> u32 {
        self.m_bits
    }

    /// Add a single (already-lowercased) token.
    pub fn add(&mut self, token: &str) {
        for pos in self.positions(token) {
            self.set_bit(pos);
        }
    }

    /// Add `token`, and if `stem_enabled`/`prefix_len` are active, also add
    /// its stem and `pref:<first_n>` form so query-time variants can probe
    /// without a reindex.
    pub fn add_indexed(&mut self, token: &str, stem_enabled: bool, prefix_len: usize) {
        self.add(token);
        if stem_enabled {
            let stemmed = stem(token);
            if stemmed != token {
                self.add(&stemmed);
            }
        }
        if prefix_len > 0 && token.chars().count() > prefix_len {
            self.add(&prefix_form(token, prefix_len));
        }
    }

    /// Probe a set of tokens. `require_all` demands every token's positions
    /// all be set; otherwise any single token hitting is sufficient.
    #[must_use]
    pub fn probe(&self, tokens: &[String], require_all: bool) -> bool {
        if tokens.is_empty() {
            return true;
        }
        if require_all {
            tokens.iter().all(|t| self.contains(t))
        } else {
            tokens.iter().any(|t| self.contains(t))
        }
    }

    fn contains(&self, token: &str) -> bool {
        self.positions(token).all(|pos| self.get_bit(pos))
    }

    fn positions(&self, token: &str) -> impl Iterator<Item = u32> + '_ {
        let lower = token.to_lowercase();
        let mut h = hash64(&lower);
        let m_bits = self.m_bits;
        (0..self.k).map(move |i| {
            h = h
                .wrapping_mul(0x9E3779B97F4A7C15)
                .wrapping_add((i as u64 + 1).wrapping_mul(0xD1B54A32D192ED03));
            (h % u64::from(m_bits)) as u32
        })
    }

    fn set_bit(&mut self, pos: u32) {
        self.bits[(pos / 8) as usize] |= 1 << (pos % 8);
    }

    fn get_bit(&self, pos: u32) -> bool {
        self.bits[(pos / 8) as usize] & (1 << (pos % 8)) != 0
    }
}

/// A simple 64-bit FNV-1a hash of the lowercased token, used as the seed for
/// the xorshift-style position mixer.
fn hash64(s: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

pub(crate) fn validate_bits(m_bits: u32) -> Result<()> {
    if m_bits == 0 || m_bits % 8 != 0 {
        return Err(Error::BadArgument(format!(
            "bloom_bits must be a positive multiple of 8, got {m_bits}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_drops_short_tokens() {
        let tokens = tokenize("User Alice logged in from 10.0.0.1!");
        assert_eq!(
            tokens,
            vec!["user", "alice", "logged", "in", "from", "10.0.0.1"]
        );
    }

    #[test]
    fn no_false_negatives() {
        let mut bloom = Bloom::new(2048, 4);
        for w in ["alice", "logged", "10.0.0.1", "warning"] {
            bloom.add(w);
        }
        for w in ["alice", "logged", "10.0.0.1", "warning"] {
            assert!(bloom.probe(&[w.to_string()], true), "false negative for {w}");
        }
    }

    #[test]
    fn require_all_vs_any() {
        let mut bloom = Bloom::new(2048, 4);
        bloom.add("alice");
        // "any" is satisfied as soon as one of the tokens was added.
        let tokens = vec!["alice".to_string(), "bob".to_string()];
        assert!(bloom.probe(&tokens, false));

        // "require_all" is satisfied once every token was actually added.
        bloom.add("bob");
        assert!(bloom.probe(&tokens, true));
    }

    #[test]
    fn stem_strips_common_suffixes() {
        assert_eq!(stem("logging"), "logg");
        assert_eq!(stem("logged"), "logg");
        assert_eq!(stem("logs"), "log");
    }

    #[test]
    fn roundtrip_bytes() {
        let mut bloom = Bloom::new(2048, 4);
        bloom.add("hello");
        let bytes = bloom.as_bytes().to_vec();
        let rehydrated = Bloom::from_bytes(bytes, 4);
        assert!(rehydrated.probe(&["hello".to_string()], true));
    }
}
