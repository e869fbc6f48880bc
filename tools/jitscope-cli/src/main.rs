#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jitscope::{
    parse_hex_bound, write_block_log_dump_file, BoundEdit, Column, CoreContext, DisassemblyView,
    InspectError, InspectorConfig, JitInspector, SortOrder, SortSpec,
};
use jitscope_core::{BlockCache, CacheSnapshot, CpuThread, SymbolMap};

#[derive(Parser, Debug)]
#[command(
    name = "jitscope",
    about = "Inspect a snapshot of a PowerPC JIT block cache: list, filter and sort blocks, cross-disassemble them, and maintain the cache."
)]
struct Cli {
    /// JIT cache snapshot (JSON)
    #[arg(long, value_name = "PATH")]
    snapshot: PathBuf,

    /// Symbol map used to label blocks
    #[arg(long, value_name = "PATH")]
    symbols: Option<PathBuf>,

    /// Inspector config (JSON)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List blocks, filtered and sorted
    List(ListArgs),
    /// Cross-disassemble the block at an effective address
    Disasm {
        #[arg(value_parser = parse_address)]
        address: u32,
    },
    /// Print free space and fragmentation of the host code regions
    Stats,
    /// Translate an effective address to a physical address
    Translate {
        #[arg(value_parser = parse_address)]
        address: u32,
    },
    /// Write the block profiling log to <dump dir>/<game id>.txt
    Dump {
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        #[arg(long, value_name = "ID")]
        game_id: Option<String>,
    },
    /// Erase one block and write the resulting snapshot
    Erase {
        #[arg(value_parser = parse_address)]
        address: u32,
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },
    /// Discard every block and write the resulting snapshot
    Clear {
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },
    /// Zero all profiling counters and write the resulting snapshot
    Wipe {
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },
    /// Turn block profiling on or off; a change discards every compiled block
    Profiling {
        state: Toggle,
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Case-insensitive substring of the symbol name
    #[arg(long)]
    symbol: Option<String>,

    /// Lowest effective address shown (hex)
    #[arg(long, value_name = "HEX")]
    min: Option<String>,

    /// Highest effective address shown (hex)
    #[arg(long, value_name = "HEX")]
    max: Option<String>,

    /// Only blocks that have been entered at this physical address (hex)
    #[arg(long, value_name = "HEX")]
    physical: Option<String>,

    /// Sort column, e.g. `cycles-spent` (defaults to the config's sort column)
    #[arg(long, value_name = "COLUMN")]
    sort: Option<Column>,

    /// Sort descending
    #[arg(long, action = clap::ArgAction::SetTrue)]
    desc: bool,

    /// Emit JSON instead of a tab-separated table
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

fn parse_address(text: &str) -> Result<u32, String> {
    parse_hex_bound(text).ok_or_else(|| format!("`{text}` is not a 32-bit hexadecimal address"))
}

struct Session {
    cache: BlockCache,
    symbols: SymbolMap,
    cpu: CpuThread,
    config: InspectorConfig,
}

impl Session {
    fn load(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => InspectorConfig::from_json_file(path)?,
            None => InspectorConfig::default(),
        };

        let text = fs::read_to_string(&cli.snapshot)
            .with_context(|| format!("read snapshot {}", cli.snapshot.display()))?;
        let mut snapshot: CacheSnapshot = serde_json::from_str(&text)
            .with_context(|| format!("parse snapshot {}", cli.snapshot.display()))?;
        if let Some(regions) = config.cache_regions {
            snapshot.regions = regions;
        }
        let cache = BlockCache::from_snapshot(snapshot)
            .with_context(|| format!("load snapshot {}", cli.snapshot.display()))?;

        let symbols = match &cli.symbols {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("read symbol map {}", path.display()))?;
                SymbolMap::parse(&text)
                    .with_context(|| format!("parse symbol map {}", path.display()))?
            }
            None => SymbolMap::new(),
        };
        tracing::debug!(blocks = cache.len(), symbols = symbols.len(), "session loaded");

        // Offline snapshot: there is no CPU thread, and it is never running.
        Ok(Self {
            cache,
            symbols,
            cpu: CpuThread::new(),
            config,
        })
    }

    fn context(&mut self) -> CoreContext<'_> {
        CoreContext::new(&mut self.cache, &self.symbols, &self.cpu)
    }

    fn save(&self, output: &Path) -> anyhow::Result<()> {
        fs::write(output, self.cache.to_json_pretty())
            .with_context(|| format!("write snapshot {}", output.display()))?;
        tracing::info!(path = %output.display(), blocks = self.cache.len(), "wrote snapshot");
        Ok(())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut session = Session::load(&cli)?;

    match cli.command {
        Command::List(args) => list(&mut session, &args)?,
        Command::Disasm { address } => disasm(&mut session, address)?,
        Command::Stats => {
            let ctx = session.context();
            println!("{}", JitInspector::memory_status(&ctx));
        }
        Command::Translate { address } => {
            let ctx = session.context();
            match JitInspector::translate_address(&ctx, address) {
                Ok(physical) => println!("{address:08x} -> {physical:08x}"),
                Err(err @ InspectError::NoTranslation(_)) => {
                    eprintln!("warning: {err}");
                    return Ok(ExitCode::FAILURE);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Dump { out_dir, game_id } => {
            let mut config = session.config.clone();
            if let Some(dir) = out_dir {
                config.dump_dir = dir;
            }
            if let Some(id) = game_id {
                config.game_id = id;
            }
            let ctx = session.context();
            let path = write_block_log_dump_file(&ctx, &config)?;
            println!("{}", path.display());
        }
        Command::Erase { address, output } => {
            {
                let mut ctx = session.context();
                let mut inspector = JitInspector::new();
                inspector.refresh(&ctx);
                let row = inspector
                    .proxy()
                    .find_row(address)
                    .ok_or_else(|| anyhow!("no block at {address:08x}"))?;
                inspector.erase_block(&mut ctx, row)?;
            }
            session.save(&output)?;
        }
        Command::Clear { output } => {
            {
                let mut ctx = session.context();
                JitInspector::new().clear_cache(&mut ctx)?;
            }
            session.save(&output)?;
        }
        Command::Wipe { output } => {
            {
                let mut ctx = session.context();
                JitInspector::new().wipe_profiling_data(&mut ctx)?;
            }
            session.save(&output)?;
        }
        Command::Profiling { state, output } => {
            {
                let mut ctx = session.context();
                JitInspector::new().set_profiling_enabled(&mut ctx, matches!(state, Toggle::On))?;
            }
            session.save(&output)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn list(session: &mut Session, args: &ListArgs) -> anyhow::Result<()> {
    let mut sort = session.config.default_sort();
    if let Some(column) = args.sort {
        sort = Some(SortSpec::new(column, session.config.sort_order));
    }
    if args.desc {
        match sort {
            Some(spec) => sort = Some(SortSpec::new(spec.column, SortOrder::Descending)),
            None => eprintln!("warning: ignoring --desc: no sort column from --sort or the config"),
        }
    }

    let ctx = session.context();
    let mut inspector = JitInspector::new();
    inspector.set_sort(sort);
    if let Some(symbol) = &args.symbol {
        inspector.set_symbol_filter(symbol);
    }
    if let Some(text) = &args.min {
        warn_if_rejected("--min", text, inspector.set_min_address_filter(text));
    }
    if let Some(text) = &args.max {
        warn_if_rejected("--max", text, inspector.set_max_address_filter(text));
    }
    if let Some(text) = &args.physical {
        warn_if_rejected("--physical", text, inspector.set_physical_address_filter(text));
    }
    inspector.refresh(&ctx);

    let proxy = inspector.proxy();
    if args.json {
        let rows: Vec<serde_json::Value> = (0..proxy.row_count())
            .map(|row| {
                let fields = Column::ALL
                    .into_iter()
                    .map(|column| (column.key().to_string(), proxy.display(row, column).into()))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(fields)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        let header: Vec<&str> = Column::ALL.into_iter().map(Column::title).collect();
        println!("{}", header.join("\t"));
        for row in 0..proxy.row_count() {
            let cells: Vec<String> = Column::ALL
                .into_iter()
                .map(|column| proxy.display(row, column))
                .collect();
            println!("{}", cells.join("\t"));
        }
    }
    Ok(())
}

fn warn_if_rejected(flag: &str, text: &str, edit: BoundEdit) {
    if edit == BoundEdit::Rejected {
        eprintln!("warning: ignoring {flag} `{text}`: not a hexadecimal address");
    }
}

fn disasm(session: &mut Session, address: u32) -> anyhow::Result<()> {
    let ctx = session.context();
    let mut inspector = JitInspector::new();
    inspector.refresh(&ctx);
    if inspector.proxy().source().find_row(address).is_none() {
        bail!("no block at {address:08x}");
    }
    inspector.select(Some(address));

    let DisassemblyView::Block(view) = inspector.disassemble_selection(&ctx) else {
        bail!("no block at {address:08x}");
    };
    println!("guest ({} instructions):", view.guest_instruction_count);
    print!("{}", view.guest);
    println!("host near ({} instructions):", view.host_near_instruction_count);
    print!("{}", view.host_near);
    println!("host far ({} instructions):", view.host_far_instruction_count);
    print!("{}", view.host_far);
    match view.blowup_percent {
        Some(blowup) => println!("blowup: {blowup:.2}%"),
        None => println!("blowup: n/a"),
    }
    Ok(())
}
