//! The external bytestream compressor, consumed as an opaque compress/
//! decompress pair with optional shared-dictionary support. Backed by
//! `zstd`; the rest of the codec never sees a zstd type directly.

use std::io::{Read, Write};

use crate::error::{Error, Result};

fn compressor_err(e: std::io::Error) -> Error {
    Error::Compressor(e.to_string())
}

/// Compress `data` at `level` with no dictionary.
pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::encode_all(data, level).map_err(compressor_err)
}

/// Decompress a plain (no-dictionary) payload.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(compressor_err)
}

/// Compress `data` at `level` against a trained shared dictionary.
pub fn compress_with_dict(data: &[u8], level: i32, dict: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = zstd::stream::write::Encoder::with_dictionary(Vec::new(), level, dict)
        .map_err(compressor_err)?;
    encoder.write_all(data).map_err(compressor_err)?;
    encoder.finish().map_err(compressor_err)
}

/// Decompress a payload that was compressed against `dict`.
pub fn decompress_with_dict(data: &[u8], dict: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = zstd::stream::read::Decoder::with_dictionary(data, dict).map_err(compressor_err)?;
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(compressor_err)?;
    Ok(out)
}

/// Compress against `dict` when non-empty, plain otherwise — the single
/// dispatch point invariant I5 depends on.
pub fn compress_auto(data: &[u8], level: i32, dict: &[u8]) -> Result<Vec<u8>> {
    if dict.is_empty() {
        compress(data, level)
    } else {
        compress_with_dict(data, level, dict)
    }
}

/// Decompress a payload compressed by [`compress_auto`] with the same `dict`.
pub fn decompress_auto(data: &[u8], dict: &[u8]) -> Result<Vec<u8>> {
    if dict.is_empty() {
        decompress(data)
    } else {
        decompress_with_dict(data, dict)
    }
}

/// Train a shared dictionary on `samples`, targeting `target_size` bytes.
///
/// Training is skipped outright (returns `None`, "recovered locally" per the
/// `TrainingFailed` policy) if the samples sum to under 8 KiB. Otherwise the
/// trainer is retried with the size halved each time, from
/// `min(target_size, total_src/8)` down to 1 KiB, until one succeeds; if even
/// 1 KiB fails training gives up and the caller falls back to plain
/// compression.
#[must_use]
pub fn train_dictionary(samples: &[Vec<u8>], target_size: usize) -> Option<Vec<u8>> {
    if target_size == 0 {
        return None;
    }
    let total: usize = samples.iter().map(Vec::len).sum();
    if total < 8 * 1024 {
        return None;
    }

    let mut size = target_size.min(total / 8).max(1024);
    loop {
        match zstd::dict::from_samples(samples, size) {
            Ok(dict) if !dict.is_empty() => return Some(dict),
            _ => {
                if size <= 1024 {
                    return None;
                }
                size = (size / 2).max(1024);
            }
        }
    }
}
