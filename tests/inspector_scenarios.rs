mod harness;

use anyhow::Result;
use harness::{game_cache, game_symbols, init_tracing, profile};
use jitscope::{
    BoundEdit, Column, CoreContext, DisassemblyView, FieldValue, InspectError, JitInspector,
    SortOrder, SortSpec,
};
use jitscope_core::{CpuThread, JitBlock, JitInterface, RunState};

fn visible(inspector: &JitInspector) -> Vec<u32> {
    inspector
        .proxy()
        .visible_rows()
        .map(|row| row.effective_address())
        .collect()
}

#[test]
fn address_window_selects_middle_block() {
    init_tracing();
    let mut cache = game_cache();
    let symbols = game_symbols();
    let cpu = CpuThread::new();
    let ctx = CoreContext::new(&mut cache, &symbols, &cpu);

    let mut inspector = JitInspector::new();
    inspector.refresh(&ctx);
    assert_eq!(
        inspector.set_min_address_filter("80001500"),
        BoundEdit::Set(0x8000_1500)
    );
    assert_eq!(
        inspector.set_max_address_filter("0x80002500"),
        BoundEdit::Set(0x8000_2500)
    );
    assert_eq!(visible(&inspector), vec![0x8000_2000]);
}

#[test]
fn symbol_substring_matches_update_input_only() {
    let mut cache = game_cache();
    let symbols = game_symbols();
    let cpu = CpuThread::new();
    let ctx = CoreContext::new(&mut cache, &symbols, &cpu);

    let mut inspector = JitInspector::new();
    inspector.refresh(&ctx);
    inspector.set_symbol_filter("upda");
    assert_eq!(visible(&inspector), vec![0x8000_1000]);

    inspector.set_symbol_filter("MAIN");
    assert_eq!(visible(&inspector), vec![0x8000_3000]);
}

#[test]
fn clear_cache_needs_paused_cpu() -> Result<()> {
    let mut cache = game_cache();
    let symbols = game_symbols();
    let cpu = CpuThread::with_run_state(RunState::Running);
    let mut ctx = CoreContext::new(&mut cache, &symbols, &cpu);

    let mut inspector = JitInspector::new();
    inspector.refresh(&ctx);
    assert!(matches!(
        inspector.clear_cache(&mut ctx),
        Err(InspectError::CpuRunning)
    ));
    assert_eq!(inspector.proxy().row_count(), 3);

    cpu.pause();
    inspector.clear_cache(&mut ctx)?;
    assert_eq!(inspector.proxy().row_count(), 0);
    assert_eq!(inspector.proxy().source().row_count(), 0);
    assert_eq!(cpu.pending_pause_requests(), 0);
    Ok(())
}

#[test]
fn wipe_keeps_blocks_and_zeroes_statistics() -> Result<()> {
    let mut cache = game_cache();
    let symbols = game_symbols();
    let cpu = CpuThread::new();
    let mut ctx = CoreContext::new(&mut cache, &symbols, &cpu);

    let mut inspector = JitInspector::new();
    inspector.refresh(&ctx);
    assert_eq!(inspector.proxy().field(1, Column::RunCount), FieldValue::Counter(20));

    inspector.wipe_profiling_data(&mut ctx)?;
    assert_eq!(inspector.proxy().row_count(), 3);
    assert_eq!(inspector.proxy().field(1, Column::RunCount), FieldValue::Counter(0));
    assert_eq!(inspector.proxy().field(1, Column::CyclesPercent), FieldValue::Ratio(0.0));
    assert_eq!(inspector.proxy().field(2, Column::RunCount), FieldValue::Empty);
    Ok(())
}

#[test]
fn profiling_toggle_discards_blocks() -> Result<()> {
    let mut cache = game_cache();
    let symbols = game_symbols();
    let cpu = CpuThread::new();

    {
        let mut ctx = CoreContext::new(&mut cache, &symbols, &cpu);
        let mut inspector = JitInspector::new();
        inspector.refresh(&ctx);
        inspector.set_profiling_enabled(&mut ctx, true)?;
        assert!(ctx.jit.profiling_enabled());
        assert_eq!(inspector.proxy().row_count(), 0);
    }

    // Blocks compiled after the switch carry (empty) profiles.
    cache.insert(JitBlock::new(0x8000_4000, &[0x6000_0000]))?;
    cache.record_run(0x8000_4000, 12, 34);
    assert_eq!(cache.get(0x8000_4000).unwrap().profile, Some(profile(1, 12, 34)));
    Ok(())
}

#[test]
fn selection_follows_block_across_resort_and_refresh() {
    let mut cache = game_cache();
    let symbols = game_symbols();
    let cpu = CpuThread::new();
    let mut ctx = CoreContext::new(&mut cache, &symbols, &cpu);

    let mut inspector = JitInspector::new();
    inspector.refresh(&ctx);
    assert_eq!(inspector.select_row(1), Some(0x8000_2000));

    inspector.set_sort(Some(SortSpec::new(Column::CyclesSpent, SortOrder::Descending)));
    assert_eq!(inspector.proxy().find_row(0x8000_2000), Some(0));
    inspector.refresh(&ctx);
    assert_eq!(inspector.selected(), Some(0x8000_2000));

    let DisassemblyView::Block(view) = inspector.disassemble_selection(&ctx) else {
        panic!("selected block should disassemble");
    };
    assert_eq!(view.effective_address, 0x8000_2000);
    assert_eq!(view.guest, "Render\n80002000  60000000  nop\n");
    assert_eq!(view.host_near_instruction_count, 8);
    assert_eq!(view.blowup_percent, Some(800.0));

    inspector.erase_block(&mut ctx, 0).unwrap();
    assert_eq!(inspector.selected(), None);
    assert!(matches!(
        inspector.disassemble_selection(&ctx),
        DisassemblyView::Cleared { .. }
    ));
}

#[test]
fn memory_status_reflects_fragmentation() -> Result<()> {
    let mut cache = game_cache();
    let symbols = game_symbols();
    let cpu = CpuThread::new();
    let mut ctx = CoreContext::new(&mut cache, &symbols, &cpu);

    let mut inspector = JitInspector::new();
    inspector.refresh(&ctx);
    // Near code is laid out 16 bytes (0x80001000), 8 bytes (0x80002000), 1 byte (0x80003000).
    let row = inspector.proxy().find_row(0x8000_1000).unwrap();
    inspector.erase_block(&mut ctx, row)?;

    let status = JitInspector::memory_status(&ctx);
    let near = status.lines().find(|l| l.starts_with("near:")).unwrap();
    // 4096 - 9 bytes free, in extents of 16 and 4071.
    assert_eq!(near, "near: free 4087 bytes, fragmentation 0.39%");
    Ok(())
}

#[test]
fn translation_of_unmapped_address_is_reported() {
    let mut cache = game_cache();
    let symbols = game_symbols();
    let cpu = CpuThread::new();
    let ctx = CoreContext::new(&mut cache, &symbols, &cpu);

    assert_eq!(
        JitInspector::translate_address(&ctx, 0x8000_2abc).unwrap(),
        0x0000_2abc
    );
    let err = JitInspector::translate_address(&ctx, 0x8000_3000).unwrap_err();
    assert_eq!(
        err.to_string(),
        "effective address 0x80003000 has no physical translation"
    );
}
