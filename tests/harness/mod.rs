#![allow(dead_code)]

use jitscope_core::{BlockCache, CacheRegions, JitBlock, ProfileData, Symbol, SymbolMap};

/// Opt-in log output for debugging a failing test: `RUST_LOG=jitscope=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn profile(run_count: u64, cycles_spent: u64, time_spent_ns: u64) -> ProfileData {
    ProfileData {
        run_count,
        cycles_spent,
        time_spent_ns,
    }
}

/// Small regions so fragmentation is visible in memory statistics.
pub fn small_regions() -> CacheRegions {
    CacheRegions {
        near_base: 0x1_0000,
        near_capacity: 0x1000,
        far_base: 0x2_0000,
        far_capacity: 0x1000,
    }
}

/// Three blocks at 0x80001000/0x80002000/0x80003000, labelled UpdateInput/Render/main.
pub fn game_cache() -> BlockCache {
    let mut cache = BlockCache::new(small_regions());
    cache.map_page(0x80001, 0x00001);
    cache.map_page(0x80002, 0x00002);
    let blocks = [
        JitBlock::new(0x8000_1000, &[0x3860_0001, 0x4e80_0020])
            .with_host_code(vec![0x90; 16], vec![0xc3])
            .with_profile(profile(10, 1_000, 500)),
        JitBlock::new(0x8000_2000, &[0x6000_0000])
            .with_host_code(vec![0x90; 8], Vec::new())
            .with_profile(profile(20, 3_000, 1_500)),
        JitBlock::new(0x8000_3000, &[0x4800_0000]).with_host_code(vec![0xc3], Vec::new()),
    ];
    for block in blocks {
        cache.insert(block).expect("fixture block fits");
    }
    cache
}

pub fn game_symbols() -> SymbolMap {
    [
        Symbol::new("UpdateInput", 0x8000_1000, 0x100),
        Symbol::new("Render", 0x8000_2000, 0x100),
        Symbol::new("main", 0x8000_3000, 0x100),
    ]
    .into_iter()
    .collect()
}
