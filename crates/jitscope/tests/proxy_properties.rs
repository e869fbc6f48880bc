use jitscope::{Column, CoreContext, FieldValue, JitBlockProxyModel, SortOrder, SortSpec};
use jitscope_core::{BlockCache, CpuThread, JitBlock, ProfileData, Symbol, SymbolMap};
use proptest::prelude::*;

const NAMES: [&str; 4] = ["main", "UpdateInput", "Render", "MAIN_loop"];

#[derive(Debug, Clone)]
struct BlockSpec {
    word: u32,
    len: usize,
    profile: Option<(u64, u64, u64)>,
    named: Option<usize>,
}

fn block_spec() -> impl Strategy<Value = BlockSpec> {
    (
        0u32..0x400,
        1usize..6,
        prop::option::of((0u64..8, 0u64..1_000, 0u64..1_000)),
        prop::option::of(0usize..NAMES.len()),
    )
        .prop_map(|(word, len, profile, named)| BlockSpec {
            word,
            len,
            profile,
            named,
        })
}

fn block_specs() -> impl Strategy<Value = Vec<BlockSpec>> {
    prop::collection::vec(block_spec(), 0..24).prop_map(|mut specs| {
        specs.sort_by_key(|s| s.word);
        specs.dedup_by_key(|s| s.word);
        specs
    })
}

fn effective_address(word: u32) -> u32 {
    0x8000_0000 + word * 0x40
}

fn physical_address(word: u32) -> u32 {
    0x0100_0000 + word * 0x40
}

fn build(specs: &[BlockSpec]) -> (BlockCache, SymbolMap) {
    let mut cache = BlockCache::default();
    let mut symbols = SymbolMap::new();
    for spec in specs {
        let ea = effective_address(spec.word);
        let mut block = JitBlock::new(ea, &vec![0x6000_0000; spec.len])
            .with_physical_addresses([physical_address(spec.word)]);
        if let Some((run_count, cycles_spent, time_spent_ns)) = spec.profile {
            block = block.with_profile(ProfileData {
                run_count,
                cycles_spent,
                time_spent_ns,
            });
        }
        cache.insert(block).unwrap();
        if let Some(i) = spec.named {
            symbols.insert(Symbol::new(NAMES[i], ea, 0x40));
        }
    }
    (cache, symbols)
}

fn column_keys(proxy: &JitBlockProxyModel, column: Column) -> Vec<FieldValue> {
    (0..proxy.row_count()).map(|row| proxy.field(row, column)).collect()
}

fn visible_addresses(proxy: &JitBlockProxyModel) -> Vec<u32> {
    proxy.visible_rows().map(|r| r.effective_address()).collect()
}

fn numeric_column() -> impl Strategy<Value = Column> {
    prop::sample::select(vec![
        Column::EffectiveAddress,
        Column::CodeBufferSize,
        Column::RunCount,
        Column::CyclesSpent,
        Column::CyclesAverage,
        Column::CyclesPercent,
        Column::TimeSpent,
        Column::TimeAverage,
        Column::TimePercent,
    ])
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn inverted_address_window_is_empty(specs in block_specs(), lo in 0u32..0x400, gap in 1u32..0x400) {
        let (mut cache, symbols) = build(&specs);
        let cpu = CpuThread::new();
        let ctx = CoreContext::new(&mut cache, &symbols, &cpu);

        let mut proxy = JitBlockProxyModel::new();
        proxy.refresh(&ctx);
        let min = effective_address(lo) + gap;
        proxy.set_min_effective_address_text(&format!("{min:08x}"));
        proxy.set_max_effective_address_text(&format!("{:08x}", min - gap));
        prop_assert_eq!(proxy.row_count(), 0);
    }

    #[test]
    fn unique_physical_address_selects_one_block(specs in block_specs(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!specs.is_empty());
        let target = &specs[pick.index(specs.len())];
        let (mut cache, symbols) = build(&specs);
        let cpu = CpuThread::new();
        let ctx = CoreContext::new(&mut cache, &symbols, &cpu);

        let mut proxy = JitBlockProxyModel::new();
        proxy.refresh(&ctx);
        proxy.set_physical_address_text(&format!("0x{:x}", physical_address(target.word)));
        prop_assert_eq!(visible_addresses(&proxy), vec![effective_address(target.word)]);
    }

    #[test]
    fn descending_is_exact_reverse_of_ascending(specs in block_specs(), column in numeric_column()) {
        let (mut cache, symbols) = build(&specs);
        let cpu = CpuThread::new();
        let ctx = CoreContext::new(&mut cache, &symbols, &cpu);

        let mut proxy = JitBlockProxyModel::with_sort(SortSpec::new(column, SortOrder::Ascending));
        proxy.refresh(&ctx);
        let ascending = column_keys(&proxy, column);
        let ascending_sources: Vec<usize> =
            (0..proxy.row_count()).filter_map(|r| proxy.map_to_source(r)).collect();

        proxy.set_sort(Some(SortSpec::new(column, SortOrder::Descending)));
        let mut descending = column_keys(&proxy, column);
        let descending_sources: Vec<usize> =
            (0..proxy.row_count()).filter_map(|r| proxy.map_to_source(r)).collect();

        for pair in ascending.windows(2) {
            prop_assert!(pair[0].compare(&pair[1]).is_le());
        }
        descending.reverse();
        prop_assert_eq!(&ascending, &descending);

        // Equal keys keep source order in both directions.
        for sources in [&ascending_sources, &descending_sources] {
            for pair in sources.windows(2) {
                let a = proxy.source().field(pair[0], column);
                let b = proxy.source().field(pair[1], column);
                if a.compare(&b).is_eq() {
                    prop_assert!(pair[0] < pair[1]);
                }
            }
        }
    }

    #[test]
    fn symbol_filter_ignores_case(specs in block_specs(), needle in prop::sample::select(vec!["main", "MAIN", "Main", "upda", "RENDER"])) {
        let (mut cache, symbols) = build(&specs);
        let cpu = CpuThread::new();
        let ctx = CoreContext::new(&mut cache, &symbols, &cpu);

        let mut proxy = JitBlockProxyModel::new();
        proxy.refresh(&ctx);
        proxy.set_symbol_name(needle);

        let expected: Vec<u32> = specs
            .iter()
            .filter(|s| {
                s.named
                    .is_some_and(|i| NAMES[i].to_lowercase().contains(&needle.to_lowercase()))
            })
            .map(|s| effective_address(s.word))
            .collect();
        prop_assert_eq!(visible_addresses(&proxy), expected);
    }

    #[test]
    fn refresh_of_unchanged_cache_is_idempotent(specs in block_specs(), column in numeric_column(), min in 0u32..0x400) {
        let (mut cache, symbols) = build(&specs);
        let cpu = CpuThread::new();
        let ctx = CoreContext::new(&mut cache, &symbols, &cpu);

        let mut proxy = JitBlockProxyModel::with_sort(SortSpec::new(column, SortOrder::Descending));
        proxy.set_min_effective_address_text(&format!("{:x}", effective_address(min)));
        proxy.refresh(&ctx);
        let first: Vec<_> = proxy.visible_rows().cloned().collect();
        proxy.refresh(&ctx);
        let second: Vec<_> = proxy.visible_rows().cloned().collect();
        prop_assert_eq!(first, second);
    }
}
