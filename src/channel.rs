//! Typed channel encoder ("H1M2"): encodes one batch of rows — events plus
//! unknown lines — into a compact columnar payload, preserving their
//! positional interleaving via the caller-held rowmask.
//!
//! The wire magic for this frame is `H1M1`; the name of the channel-typing
//! scheme itself ("H1M2") is one generation ahead of the frame magic, a
//! mismatch inherited from the multiple codec variants this format was
//! consolidated from. Both are kept as specified — a conformant decoder only
//! needs to recognize the `H1M1` magic.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::primitives::{bitpack, bitunpack, bstr_decode, bstr_encode, uvarint_decode, uvarint_encode, zigzag_decode, zigzag_encode};
use crate::template::RowKind;

const MAGIC: &[u8; 4] = b"H1M1";
const VERSION: u32 = 1;

/// Channel type tags, dispatching the encoding used for one channel's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelType {
    Raw = 0,
    Int = 1,
    Hex = 2,
    Ip = 3,
    Dict = 4,
}

impl ChannelType {
    fn from_tag(tag: u64) -> Result<Self> {
        match tag {
            0 => Ok(ChannelType::Raw),
            1 => Ok(ChannelType::Int),
            2 => Ok(ChannelType::Hex),
            3 => Ok(ChannelType::Ip),
            4 => Ok(ChannelType::Dict),
            other => Err(Error::corrupt(format!("unknown channel type tag {other}"))),
        }
    }
}

/// Encode a batch of events plus unknown lines into an `H1M1`-framed block.
///
/// `row_kinds` is the batch's rowmask (spec.md §4.3): it carries no values of
/// its own, only which row index is the next event versus the next unknown
/// line, so a decoder can replay the original event/unknown interleaving. It
/// is appended as a trailing bit-packed field, one bit per row (`1` = event,
/// `0` = unknown), after the unknown-line list.
#[must_use]
pub fn encode_batch(events: &[(u32, Vec<String>)], unknown: &[String], row_kinds: &[RowKind]) -> Vec<u8> {
    let n_events = events.len();
    let n_unknown = unknown.len();
    let max_params = events.iter().map(|(_, p)| p.len()).max().unwrap_or(0);

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend(uvarint_encode(n_events as u64));
    out.extend(uvarint_encode(n_unknown as u64));
    out.extend(uvarint_encode(max_params as u64));
    for (eid, _) in events {
        out.extend(uvarint_encode(u64::from(*eid)));
    }

    for chan in 0..max_params {
        let mask_vals: Vec<u64> = events
            .iter()
            .map(|(_, p)| u64::from(p.len() > chan))
            .collect();
        let mask_bytes = bitpack(&mask_vals, 1);
        out.extend(bstr_encode(&mask_bytes));

        let present: Vec<&str> = events
            .iter()
            .filter(|(_, p)| p.len() > chan)
            .map(|(_, p)| p[chan].as_str())
            .collect();
        let channel_type = detect_channel_type(&present);
        out.extend(uvarint_encode(channel_type as u64));
        let payload = encode_channel_payload(channel_type, &present);
        out.extend(bstr_encode(&payload));
    }

    for line in unknown {
        out.extend(bstr_encode(line.as_bytes()));
    }

    let rowmask_vals: Vec<u64> = row_kinds
        .iter()
        .map(|k| u64::from(matches!(k, RowKind::Known(_))))
        .collect();
    out.extend(bstr_encode(&bitpack(&rowmask_vals, 1)));

    out
}

/// Decode an `H1M1`-framed block into its events, unknown lines, and the
/// rowmask that interleaves them back into original row order.
pub fn decode_batch(data: &[u8]) -> Result<(Vec<(u32, Vec<String>)>, Vec<String>, Vec<RowKind>)> {
    let (n_events, n_unknown, max_params, mut off) = decode_header(data)?;

    let mut event_ids = Vec::with_capacity(n_events);
    for _ in 0..n_events {
        let (v, new_off) = uvarint_decode(data, off)?;
        event_ids.push(u32::try_from(v).map_err(|_| Error::corrupt("event id overflows u32"))?);
        off = new_off;
    }

    let mut params: Vec<Vec<String>> = vec![Vec::new(); n_events];
    for _ in 0..max_params {
        let (mask_bytes, new_off) = bstr_decode(data, off)?;
        off = new_off;
        let mask = bitunpack(mask_bytes, n_events, 1)?;
        let present_count = mask.iter().filter(|&&b| b == 1).count();

        let (tag, new_off) = uvarint_decode(data, off)?;
        off = new_off;
        let channel_type = ChannelType::from_tag(tag)?;

        let (payload, new_off) = bstr_decode(data, off)?;
        off = new_off;

        let values = decode_channel_payload(channel_type, payload, present_count)?;
        let mut values = values.into_iter();
        for (row, &bit) in mask.iter().enumerate() {
            if bit == 1 {
                let v = values
                    .next()
                    .ok_or_else(|| Error::corrupt("channel value count mismatch"))?;
                params[row].push(v);
            }
        }
    }

    let events: Vec<(u32, Vec<String>)> = event_ids.into_iter().zip(params).collect();

    let mut unknown = Vec::with_capacity(n_unknown);
    for _ in 0..n_unknown {
        let (bytes, new_off) = bstr_decode(data, off)?;
        off = new_off;
        unknown.push(
            std::str::from_utf8(bytes)
                .map_err(|_| Error::corrupt("unknown line is not valid utf-8"))?
                .to_string(),
        );
    }

    let (rowmask_bytes, _) = bstr_decode(data, off)?;
    let n_rows = n_events + n_unknown;
    let rowmask = bitunpack(rowmask_bytes, n_rows, 1)?;
    if rowmask.iter().filter(|&&b| b == 1).count() != n_events {
        return Err(Error::corrupt("rowmask known-row count does not match n_events"));
    }
    let mut row_kinds = Vec::with_capacity(n_rows);
    let (mut known_idx, mut unknown_idx) = (0usize, 0usize);
    for &bit in &rowmask {
        if bit == 1 {
            row_kinds.push(RowKind::Known(known_idx));
            known_idx += 1;
        } else {
            row_kinds.push(RowKind::Unknown(unknown_idx));
            unknown_idx += 1;
        }
    }

    Ok((events, unknown, row_kinds))
}

/// Decode only the rows matching `target_event_id`, short-circuiting the
/// moment the header shows no matching row, and skipping the payload of any
/// channel no matching row has a value in.
pub fn decode_batch_selective(data: &[u8], target_event_id: u32) -> Result<Vec<(u32, Vec<String>)>> {
    let (n_events, _n_unknown, max_params, mut off) = decode_header(data)?;

    let mut event_ids = Vec::with_capacity(n_events);
    for _ in 0..n_events {
        let (v, new_off) = uvarint_decode(data, off)?;
        event_ids.push(u32::try_from(v).map_err(|_| Error::corrupt("event id overflows u32"))?);
        off = new_off;
    }

    let hit_rows: Vec<usize> = event_ids
        .iter()
        .enumerate()
        .filter(|(_, &eid)| eid == target_event_id)
        .map(|(i, _)| i)
        .collect();
    if hit_rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut params: Vec<Vec<String>> = vec![Vec::new(); hit_rows.len()];
    for _ in 0..max_params {
        let (mask_bytes, new_off) = bstr_decode(data, off)?;
        off = new_off;
        let mask = bitunpack(mask_bytes, n_events, 1)?;

        let (tag, new_off) = uvarint_decode(data, off)?;
        off = new_off;

        let any_hit_present = hit_rows.iter().any(|&r| mask[r] == 1);
        if !any_hit_present {
            // Skip the payload bytes without interpreting them.
            let (_, new_off) = bstr_decode(data, off)?;
            off = new_off;
            continue;
        }

        let channel_type = ChannelType::from_tag(tag)?;
        let (payload, new_off) = bstr_decode(data, off)?;
        off = new_off;
        let present_count = mask.iter().filter(|&&b| b == 1).count();
        let values = decode_channel_payload(channel_type, payload, present_count)?;

        let mut value_idx = 0usize;
        let mut hit_cursor = 0usize;
        for (row, &bit) in mask.iter().enumerate() {
            if bit != 1 {
                continue;
            }
            if hit_cursor < hit_rows.len() && hit_rows[hit_cursor] == row {
                params[hit_cursor].push(values[value_idx].clone());
                hit_cursor += 1;
            }
            value_idx += 1;
        }
    }

    Ok(hit_rows
        .into_iter()
        .map(|_| target_event_id)
        .zip(params)
        .collect())
}

fn decode_header(data: &[u8]) -> Result<(usize, usize, usize, usize)> {
    if data.len() < 8 || &data[0..4] != MAGIC {
        return Err(Error::corrupt("bad H1M1 magic"));
    }
    let version = u32::from_le_bytes(data[4..8].try_into().unwrap());
    if version != VERSION {
        return Err(Error::corrupt(format!("unsupported H1M1 version {version}")));
    }
    let mut off = 8;
    let (n_events, new_off) = uvarint_decode(data, off)?;
    off = new_off;
    let (n_unknown, new_off) = uvarint_decode(data, off)?;
    off = new_off;
    let (max_params, new_off) = uvarint_decode(data, off)?;
    off = new_off;
    Ok((n_events as usize, n_unknown as usize, max_params as usize, off))
}

/// Sample up to the first 256 present values and pick a channel type.
///
/// Only the sample is checked, not the full column — a value past the
/// sampled prefix that doesn't actually fit the chosen type is handled by
/// `encode_channel_payload` falling back to a default rather than panicking.
fn detect_channel_type(values: &[&str]) -> ChannelType {
    if values.is_empty() {
        return ChannelType::Raw;
    }
    let sample = &values[..values.len().min(256)];

    if sample.iter().all(|v| v.parse::<i64>().is_ok()) {
        return ChannelType::Int;
    }
    if sample.iter().all(|v| parse_ipv4(v).is_some()) {
        return ChannelType::Ip;
    }
    if sample.iter().all(|v| is_hex_string(v)) {
        return ChannelType::Hex;
    }

    let mut seen: IndexMap<&str, ()> = IndexMap::new();
    for v in sample {
        seen.insert(v, ());
    }
    if sample.len() as i64 - seen.len() as i64 >= 12 {
        return ChannelType::Dict;
    }

    ChannelType::Raw
}

fn is_hex_string(s: &str) -> bool {
    let stripped = strip_hex_prefix(s);
    stripped.len() >= 8 && !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

fn parse_ipv4(s: &str) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut parts = s.split('.');
    for octet in octets.iter_mut() {
        *octet = parts.next()?.parse::<u8>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}

fn encode_channel_payload(ty: ChannelType, values: &[&str]) -> Vec<u8> {
    let mut out = uvarint_encode(values.len() as u64);
    match ty {
        ChannelType::Raw => {
            for v in values {
                out.extend(bstr_encode(v.as_bytes()));
            }
        }
        ChannelType::Int => {
            let mut prev = 0i64;
            for (i, v) in values.iter().enumerate() {
                // Only the first 256 values are sampled to pick the channel type
                // (detect_channel_type); a later value outside the sample can still
                // fail to parse. Fall back to 0 rather than trust the sample, the
                // same graceful-degradation the original codec uses.
                let n: i64 = v.parse().unwrap_or(0);
                let delta = if i == 0 { n } else { n - prev };
                out.extend(uvarint_encode(zigzag_encode(delta)));
                prev = n;
            }
        }
        ChannelType::Hex => {
            for v in values {
                let stripped = strip_hex_prefix(v);
                let padded;
                let digits = if stripped.len() % 2 == 1 {
                    padded = format!("0{stripped}");
                    padded.as_str()
                } else {
                    stripped
                };
                let bytes = hex_decode(digits);
                out.extend(bstr_encode(&bytes));
            }
        }
        ChannelType::Ip => {
            for v in values {
                // Same sampling caveat as the Int arm above: a value past the
                // first 256 may not actually parse as an IPv4 octet quad.
                let octets = parse_ipv4(v).unwrap_or([0, 0, 0, 0]);
                out.extend_from_slice(&octets);
            }
        }
        ChannelType::Dict => {
            let mut freq: IndexMap<&str, usize> = IndexMap::new();
            for v in values {
                *freq.entry(v).or_insert(0) += 1;
            }
            let mut vocab: Vec<(&str, usize)> = freq.into_iter().collect();
            vocab.sort_by(|a, b| b.1.cmp(&a.1));
            let vocab_index: hashbrown::HashMap<&str, usize> = vocab
                .iter()
                .enumerate()
                .map(|(i, (s, _))| (*s, i))
                .collect();

            out.extend(uvarint_encode(vocab.len() as u64));
            for (word, _) in &vocab {
                out.extend(bstr_encode(word.as_bytes()));
            }
            for v in values {
                out.extend(uvarint_encode(vocab_index[v] as u64));
            }
        }
    }
    out
}

fn decode_channel_payload(ty: ChannelType, data: &[u8], expected_count: usize) -> Result<Vec<String>> {
    let (count, mut off) = uvarint_decode(data, 0)?;
    let count = count as usize;
    if count != expected_count {
        return Err(Error::corrupt("channel payload count does not match mask"));
    }

    let mut out = Vec::with_capacity(count);
    match ty {
        ChannelType::Raw => {
            for _ in 0..count {
                let (bytes, new_off) = bstr_decode(data, off)?;
                off = new_off;
                out.push(utf8(bytes)?);
            }
        }
        ChannelType::Int => {
            let mut prev = 0i64;
            for i in 0..count {
                let (z, new_off) = uvarint_decode(data, off)?;
                off = new_off;
                let delta_or_first = zigzag_decode(z);
                let n = if i == 0 { delta_or_first } else { prev + delta_or_first };
                prev = n;
                out.push(n.to_string());
            }
        }
        ChannelType::Hex => {
            for _ in 0..count {
                let (bytes, new_off) = bstr_decode(data, off)?;
                off = new_off;
                out.push(hex_encode(bytes));
            }
        }
        ChannelType::Ip => {
            for _ in 0..count {
                if off + 4 > data.len() {
                    return Err(Error::Truncated {
                        needed: off + 4,
                        available: data.len(),
                    });
                }
                out.push(format!("{}.{}.{}.{}", data[off], data[off + 1], data[off + 2], data[off + 3]));
                off += 4;
            }
        }
        ChannelType::Dict => {
            let (vocab_len, new_off) = uvarint_decode(data, off)?;
            off = new_off;
            let mut vocab = Vec::with_capacity(vocab_len as usize);
            for _ in 0..vocab_len {
                let (bytes, new_off) = bstr_decode(data, off)?;
                off = new_off;
                vocab.push(utf8(bytes)?);
            }
            for _ in 0..count {
                let (id, new_off) = uvarint_decode(data, off)?;
                off = new_off;
                let idx = if (id as usize) < vocab.len() { id as usize } else { 0 };
                out.push(vocab.get(idx).cloned().unwrap_or_default());
            }
        }
    }
    Ok(out)
}

fn utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| Error::corrupt("channel value is not valid utf-8"))
}

fn hex_decode(digits: &str) -> Vec<u8> {
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).unwrap();
            u8::from_str_radix(s, 16).unwrap_or(0)
        })
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
