use anyhow::{bail, Context, Result};
use chunkcache_analysis::HeuristicAnalyzer;
use chunkcache_index::{chapter_chunk_id, CursorHit};
use chunkcache_manager::{
    BatchReport, ChunkAnalysis, ChunkEvent, ChunkManager, EditDelta, ManagerConfig, ManagerStats,
};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use manuscript::{split_chapters, ChapterText};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use serde::Serialize;
use settings::{load_config, Overrides};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

mod manuscript;
mod settings;

#[derive(Parser)]
#[command(name = "chunkcache")]
#[command(about = "Incremental chunk analysis for long-form manuscripts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Manager config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the edit debounce window (ms)
    #[arg(long, global = true)]
    debounce_ms: Option<u64>,

    /// Override the number of concurrent analyses
    #[arg(long, global = true)]
    concurrency: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a manuscript and print stats plus chapter and book summaries
    Analyze(AnalyzeArgs),

    /// Print the scene analysis under a cursor offset
    Cursor(CursorArgs),

    /// Watch a manuscript and print engine events as JSON lines
    Watch(WatchArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Manuscript file; chapters start at `# ` headings
    file: PathBuf,

    /// Emit compact JSON
    #[arg(long)]
    compact: bool,
}

#[derive(Args)]
struct CursorArgs {
    file: PathBuf,

    /// Chapter key (`ch1`, `ch2`, ...)
    #[arg(long, default_value = "ch1")]
    chapter: String,

    /// Byte offset into the chapter body
    #[arg(long)]
    offset: usize,
}

#[derive(Args)]
struct WatchArgs {
    file: PathBuf,

    /// Filesystem poll interval for backends that poll (ms)
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,
}

#[derive(Serialize)]
struct AnalyzeOutput {
    report: BatchReport,
    stats: ManagerStats,
    book: ChunkAnalysis,
    chapters: BTreeMap<String, ChapterSummary>,
}

#[derive(Serialize)]
struct ChapterSummary {
    title: String,
    scenes: usize,
    analysis: Option<ChunkAnalysis>,
}

#[derive(Serialize)]
struct CursorOutput {
    chapter: String,
    offset: usize,
    #[serde(flatten)]
    hit: CursorHit,
    stale: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(
        cli.config.as_deref(),
        Overrides {
            debounce_ms: cli.debounce_ms,
            concurrency: cli.concurrency,
        },
    )?;

    match cli.command {
        Commands::Analyze(args) => run_analyze(args, config).await,
        Commands::Cursor(args) => run_cursor(args, config).await,
        Commands::Watch(args) => run_watch(args, config).await,
    }
}

fn new_manager(config: ManagerConfig) -> Result<ChunkManager> {
    ChunkManager::new(Arc::new(HeuristicAnalyzer::new()), config)
        .context("Failed to start chunk manager")
}

fn read_chapters(path: &Path) -> Result<Vec<ChapterText>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manuscript {}", path.display()))?;
    Ok(split_chapters(&source))
}

fn load_manuscript(
    path: &Path,
    config: ManagerConfig,
) -> Result<(ChunkManager, Vec<ChapterText>)> {
    let chapters = read_chapters(path)?;
    if chapters.is_empty() {
        bail!("Manuscript {} is empty", path.display());
    }
    let manager = new_manager(config)?;
    for chapter in &chapters {
        manager
            .register_chapter(&chapter.key, &chapter.text)
            .with_context(|| format!("Failed to register {}", chapter.key))?;
    }
    Ok((manager, chapters))
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{out}");
    Ok(())
}

async fn run_analyze(args: AnalyzeArgs, config: ManagerConfig) -> Result<()> {
    let (manager, chapters) = load_manuscript(&args.file, config)?;
    let report = manager.process_all_dirty().await?;
    info!(
        "Analyzed {} chapters ({} scenes processed, {} failed)",
        chapters.len(),
        report.processed,
        report.failed
    );

    let analyses = manager.get_all_chapter_analyses();
    let summaries = chapters
        .into_iter()
        .map(|chapter| {
            let summary = ChapterSummary {
                scenes: manager.get_children(&chapter_chunk_id(&chapter.key)).len(),
                analysis: analyses.get(&chapter.key).cloned(),
                title: chapter.title,
            };
            (chapter.key, summary)
        })
        .collect();

    let output = AnalyzeOutput {
        report,
        stats: manager.get_stats(),
        book: manager.get_book_summary(),
        chapters: summaries,
    };
    manager.destroy();
    print_json(&output, args.compact)
}

async fn run_cursor(args: CursorArgs, config: ManagerConfig) -> Result<()> {
    let (manager, _) = load_manuscript(&args.file, config)?;
    if manager.get_chapter_chunk(&args.chapter).is_none() {
        bail!("Unknown chapter {}", args.chapter);
    }
    manager.process_all_dirty().await?;

    let Some(hit) = manager.get_analysis_at_cursor(&args.chapter, args.offset) else {
        bail!("No scene at offset {} in {}", args.offset, args.chapter);
    };
    manager.destroy();
    print_json(
        &CursorOutput {
            chapter: args.chapter,
            offset: args.offset,
            stale: hit.is_stale(),
            hit,
        },
        false,
    )
}

async fn run_watch(args: WatchArgs, config: ManagerConfig) -> Result<()> {
    let manager = new_manager(config)?;
    let mut events = manager.subscribe();
    let mut known: HashMap<String, String> = HashMap::new();
    sync_file(&manager, &args.file, &mut known)?;

    let (fs_tx, mut fs_rx) = mpsc::channel::<notify::Result<Event>>(64);
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = fs_tx.blocking_send(res);
        },
        NotifyConfig::default().with_poll_interval(Duration::from_millis(args.poll_ms)),
    )
    .context("Failed to create file watcher")?;
    watcher
        .watch(&args.file, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", args.file.display()))?;
    info!("Watching {}", args.file.display());

    loop {
        tokio::select! {
            Some(res) = fs_rx.recv() => {
                match res {
                    Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                        if let Err(err) = sync_file(&manager, &args.file, &mut known) {
                            warn!("{err:#}");
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!("Watch error: {err}"),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        print_json(&event, true)?;
                        if event == ChunkEvent::ProcessingEnd {
                            print_json(&BookLine::from(manager.get_book_summary()), true)?;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!("Dropped {skipped} events"),
                    Err(RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    manager.destroy();
    Ok(())
}

#[derive(Serialize)]
struct BookLine {
    event: &'static str,
    summary: String,
    word_count: usize,
}

impl From<ChunkAnalysis> for BookLine {
    fn from(analysis: ChunkAnalysis) -> Self {
        Self {
            event: "book_summary",
            summary: analysis.summary,
            word_count: analysis.word_count,
        }
    }
}

/// Push the file's current chapters into the manager as edits
fn sync_file(
    manager: &ChunkManager,
    path: &Path,
    known: &mut HashMap<String, String>,
) -> Result<()> {
    let chapters = read_chapters(path)?;
    for chapter in &chapters {
        let previous = known.get(&chapter.key).map(String::as_str);
        let cursor = previous
            .and_then(|old| EditDelta::between(old, &chapter.text))
            .map_or(0, |delta| delta.new_end);
        manager.handle_edit(&chapter.key, &chapter.text, cursor, cursor)?;
    }

    let current: Vec<&str> = chapters.iter().map(|c| c.key.as_str()).collect();
    let removed: Vec<String> = known
        .keys()
        .filter(|key| !current.contains(&key.as_str()))
        .cloned()
        .collect();
    for key in removed {
        manager.remove_chapter(&key)?;
        known.remove(&key);
    }
    for chapter in chapters {
        known.insert(chapter.key, chapter.text);
    }
    Ok(())
}
