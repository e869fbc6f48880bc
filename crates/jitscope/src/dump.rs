use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::{BlockRow, CoreContext, InspectError, InspectorConfig, Result};

const HEADER: &str = "effective_address\tguest_instructions\trun_count\tcycles_spent\t\
cycles_average\tcycles_percent\ttime_spent_ns\ttime_average_ns\ttime_percent\tsymbol";

/// Write the profile of every block that carries profiling data as tab-separated text, hottest
/// block first. Returns the number of blocks written.
pub fn write_block_log_dump(ctx: &CoreContext<'_>, out: &mut dyn Write) -> io::Result<usize> {
    let blocks = {
        let guard = ctx.cpu.guard();
        ctx.jit.jit_blocks(&guard)
    };
    let mut rows: Vec<BlockRow> = BlockRow::build_all(blocks, ctx.symbols)
        .into_iter()
        .filter(|row| row.stats.is_some())
        .collect();
    rows.sort_by(|a, b| {
        let cycles = |row: &BlockRow| row.stats.as_ref().map_or(0, |s| s.cycles_spent);
        cycles(b)
            .cmp(&cycles(a))
            .then(a.effective_address().cmp(&b.effective_address()))
    });

    writeln!(out, "{HEADER}")?;
    for row in &rows {
        let Some(stats) = row.stats.as_ref() else {
            continue;
        };
        writeln!(
            out,
            "{:08x}\t{}\t{}\t{}\t{:.2}\t{:.2}\t{}\t{:.2}\t{:.2}\t{}",
            row.effective_address(),
            row.block.guest_instruction_count,
            stats.run_count,
            stats.cycles_spent,
            stats.cycles_average,
            stats.cycles_percent,
            stats.time_spent_ns,
            stats.time_average_ns,
            stats.time_percent,
            row.symbol.as_deref().unwrap_or(""),
        )?;
    }
    Ok(rows.len())
}

/// Write the dump to `<dump_dir>/<game_id>.txt`, creating the directory, and return the path.
pub fn write_block_log_dump_file(ctx: &CoreContext<'_>, config: &InspectorConfig) -> Result<PathBuf> {
    let path = config.dump_path();
    let io_err = |source| InspectError::Io {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(&config.dump_dir).map_err(io_err)?;
    let mut out = BufWriter::new(File::create(&path).map_err(io_err)?);
    let written = write_block_log_dump(ctx, &mut out).map_err(io_err)?;
    out.flush().map_err(io_err)?;

    tracing::info!(path = %path.display(), blocks = written, "wrote jit block log dump");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jitscope_core::{BlockCache, CpuThread, JitBlock, ProfileData, Symbol, SymbolMap};

    #[test]
    fn hottest_blocks_first_ties_by_address() {
        let mut cache = BlockCache::default();
        let profile = |run_count, cycles_spent| ProfileData {
            run_count,
            cycles_spent,
            time_spent_ns: 10,
        };
        for block in [
            JitBlock::new(0x8000_3000, &[0]).with_profile(profile(1, 20)),
            JitBlock::new(0x8000_1000, &[0, 0]).with_profile(profile(2, 60)),
            JitBlock::new(0x8000_2000, &[0]).with_profile(profile(1, 20)),
            JitBlock::new(0x8000_4000, &[0]),
        ] {
            cache.insert(block).unwrap();
        }
        let symbols: SymbolMap = [Symbol::new("hot", 0x8000_1000, 8)].into_iter().collect();
        let cpu = CpuThread::new();
        let ctx = CoreContext::new(&mut cache, &symbols, &cpu);

        let mut out = Vec::new();
        assert_eq!(write_block_log_dump(&ctx, &mut out).unwrap(), 3);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "80001000\t2\t2\t60\t30.00\t60.00\t10\t5.00\t33.33\thot");
        assert!(lines[2].starts_with("80002000\t"));
        assert!(lines[3].starts_with("80003000\t"));
        assert_eq!(lines.len(), 4);
    }
}
