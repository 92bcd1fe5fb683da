//! Small standalone harness exercising the cache core against synthetic
//! traffic, in the spirit of `pageserver/pagebench` — not part of the
//! tested contract, just a manual poking tool.

use lfc::cache::{BlockKey, ForkNumber, LocalFileCache, BLOCKS_PER_CHUNK, PAGE_SIZE};

fn main() {
    lfc::logging::init();

    let capacity_mb = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(64u64);
    let iterations = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000u32);

    let cache = LocalFileCache::new(capacity_mb, capacity_mb).expect("failed to construct cache");
    let page = [0xAB_u8; PAGE_SIZE];
    let mut out = [0u8; PAGE_SIZE];

    for i in 0..iterations {
        let key = BlockKey {
            spc_node: 1,
            db_node: 1,
            rel_node: 1,
            fork: ForkNumber::Main,
            chunk_no: (i % (capacity_mb as u32 * 2)) * BLOCKS_PER_CHUNK,
        };
        cache.write(key, 0, &page);
        cache.read(&key, 0, &mut out);
    }

    let stats = cache.stats();
    println!(
        "size={} used={} size_limit={}",
        stats.size_chunks, stats.used_chunks, stats.size_limit_chunks
    );
}
