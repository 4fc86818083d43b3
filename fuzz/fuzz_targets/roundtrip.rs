//! Binary round-trip fuzzer for the templog codec.
//!
//! Treats the raw fuzz input as a batch of newline-separated log lines,
//! encodes it against a small fixed template bank, and checks that decoding
//! the resulting blob reproduces the exact input lines (invariant I1).

use honggfuzz::fuzz;
use templog::config::EncodeOptions;
use templog::Index;

const TPL_TEXT: &str = "EventId,EventTemplate\n\
    E1,User <*> logged in from <*>\n\
    E2,Connection closed after <*> seconds\n";

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            let Ok(text) = std::str::from_utf8(data) else {
                return;
            };
            let lines: Vec<String> = text.lines().map(str::to_string).collect();

            let Ok(blob) = templog::encode(&lines, TPL_TEXT, &EncodeOptions::default()) else {
                return;
            };
            let index = Index::build(&blob).expect("index build on self-produced blob must succeed");
            let decoded =
                templog::decode_all(&index, &blob).expect("decode of self-produced blob must succeed");
            assert_eq!(decoded, lines, "round-trip mismatch for input: {data:?}");
        });
    }
}
