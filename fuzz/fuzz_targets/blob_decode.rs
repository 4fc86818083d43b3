//! Fuzzer for the read path: feeds arbitrary bytes straight to `Index::build`
//! and `decode_all` and requires that malformed input surfaces a `templog`
//! error rather than panicking (spec.md §7's "either fully readable or
//! rejected" contract).

use honggfuzz::fuzz;
use templog::Index;

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            if let Ok(index) = Index::build(data) {
                let _ = templog::decode_all(&index, data);
                let _ = templog::query(&index, data, "anything", &Default::default());
            }
        });
    }
}
