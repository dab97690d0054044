mod assemble;
mod batch;
mod config;
mod console;
mod detect;
mod error;
mod ghostscript;
mod probe;
mod raster;
mod tui;
mod worker;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pdfraster",
    version,
    about = "Flatten PDFs into image-only PDFs using Ghostscript"
)]
struct Cli {
    /// PDF files, directories or glob patterns
    inputs: Vec<String>,
    /// Additional inputs (repeatable)
    #[arg(long)]
    input: Vec<String>,
    /// Read inputs from stdin (newline-separated)
    #[arg(long)]
    stdin: bool,
    /// Recurse into directories
    #[arg(long)]
    recursive: bool,
    /// Directory that receives the <name>_RASTERIZED.pdf files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Raster resolution (72-1200)
    #[arg(long)]
    dpi: Option<u32>,
    /// Ghostscript executable (defaults to gs, or gswin64c on Windows)
    #[arg(long)]
    gs: Option<String>,
    /// Do not copy title, author and other document info into the output
    #[arg(long)]
    strip_metadata: bool,
    /// Path to config file (defaults to XDG config path)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Config profile name
    #[arg(long)]
    profile: Option<String>,
    /// Print the file table (title, pages, size) without rasterizing
    #[arg(long)]
    list: bool,
    /// Open the interactive terminal UI
    #[arg(long, conflicts_with_all = ["list", "json"])]
    tui: bool,
    /// Emit JSON output
    #[arg(long)]
    json: bool,
    /// Increase diagnostic output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut app = config::load(cli.config.as_deref(), cli.profile.as_deref())?;
    if let Some(value) = cli.dpi {
        app.options.dpi = config::check_dpi(value)?;
    }
    if let Some(value) = cli.output_dir.as_ref() {
        app.options.output_dir = Some(value.clone());
    }
    if let Some(value) = cli.gs.as_deref() {
        app.options.ghostscript = value.to_string();
    }
    if cli.strip_metadata {
        app.options.strip_metadata = true;
    }

    let mut inputs = cli.inputs.clone();
    inputs.extend(cli.input.iter().cloned());
    let stdin_sources = if cli.stdin {
        read_stdin_lines()?
    } else {
        Vec::new()
    };
    let sources = batch::collect_sources(&inputs, stdin_sources, cli.recursive)?;

    if cli.tui {
        return tui::run(app, sources);
    }
    if sources.is_empty() {
        anyhow::bail!("no input files provided");
    }
    if cli.list {
        return list(&sources, &app.options.ghostscript, cli.json);
    }
    run_headless(&cli, &app, sources)
}

fn init_tracing(cli: &Cli) {
    // Diagnostics would corrupt the alternate screen unless explicitly asked for.
    if cli.tui && std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let fallback = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn list(sources: &[PathBuf], gs_program: &str, json: bool) -> Result<()> {
    let rows: Vec<probe::DocumentInfo> = sources
        .iter()
        .map(|source| probe::describe(source, gs_program))
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!("{:>3}  {:<40}  {:>5}  {:>9}  Path", "#", "Title", "Pages", "Size");
    for (index, row) in rows.iter().enumerate() {
        println!(
            "{:>3}  {:<40}  {:>5}  {:>9}  {}",
            index + 1,
            row.title,
            row.pages.to_string(),
            row.size_label(),
            row.path.display()
        );
    }
    Ok(())
}

fn run_headless(cli: &Cli, app: &config::AppConfig, sources: Vec<PathBuf>) -> Result<()> {
    let output_dir = app
        .options
        .output_dir
        .clone()
        .context("missing output folder; pass --output-dir or set output_dir in config")?;

    let jobs: Vec<raster::RasterJob> = sources
        .into_iter()
        .map(|source| raster::RasterJob {
            source,
            output_dir: output_dir.clone(),
            dpi: app.options.dpi,
            strip_metadata: app.options.strip_metadata,
        })
        .collect();
    let shared = raster::shared_outputs(&jobs);
    if let Some(path) = shared.first() {
        anyhow::bail!(
            "several inputs would write {}; rename them or run them separately",
            path.display()
        );
    }

    let console = if cli.json {
        console::Console::new()
    } else {
        console::Console::echoing()
    };
    // Headless runs report through the console and the final summary only.
    let (events_tx, _events_rx) = mpsc::channel();
    let worker = worker::Worker::spawn(
        raster::Rasterizer::new(app.options.ghostscript.clone()),
        console,
        events_tx,
    );
    for job in jobs {
        worker.submit(job)?;
    }
    let summary = worker.finish()?;

    if cli.json {
        let output = serde_json::json!({
            "status": if summary.is_success() { "ok" } else { "failed" },
            "total": summary.total,
            "succeeded": summary.succeeded,
            "failed": summary.failures.len(),
            "failures": summary.failures,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "Summary: total {}, succeeded {}, failed {}",
            summary.total,
            summary.succeeded,
            summary.failures.len()
        );
    }
    if !summary.is_success() {
        anyhow::bail!("rasterization completed with failures");
    }
    Ok(())
}

fn read_stdin_lines() -> Result<Vec<String>> {
    use std::io::Read;
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("read stdin")?;
    Ok(input
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}
