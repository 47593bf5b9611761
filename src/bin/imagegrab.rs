use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;
use url::Url;

use imagegrab_engine::config::{load_config, save_config, DownloaderConfig};
use imagegrab_engine::page::PageDocument;
use imagegrab_engine::paths::OutputPaths;
use imagegrab_engine::persist::{DirectoryPersistence, Persistence};
use imagegrab_engine::report::{render_preview, write_manifest, write_summary};
use imagegrab_engine::session::{parse_indices, BatchOutcome, Downloader};
use imagegrab_engine::transport::{Transport, UreqTransport};
use imagegrab_engine::{EngineError, Result};

#[derive(Parser, Debug)]
#[command(name = "imagegrab")]
#[command(about = "Download the images embedded in a blog post")]
#[command(version)]
struct Cli {
    /// Address of the post; also decides the file-name prefix
    #[arg(long, global = true, value_name = "URL")]
    page_url: Option<String>,

    /// Read the page markup from a saved file instead of fetching it
    #[arg(long, global = true, value_name = "FILE")]
    html: Option<PathBuf>,

    /// Directory the images are written to (default: ./downloads)
    #[arg(long, global = true, value_name = "DIR")]
    out: Option<PathBuf>,

    /// JSON config file (default: ./imagegrab.json, if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pause between two downloads, in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover every image, preview the list, then download all of them
    Run {
        /// Skip the numbered preview listing
        #[arg(long)]
        no_preview: bool,
    },
    /// Discover and list images without downloading
    List,
    /// Download only the listed 1-based indices, e.g. "1,3,5"
    Select {
        #[arg(value_name = "INDICES")]
        indices: String,
    },
    /// Write the effective configuration (defaults plus flags) to the config file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!(error = %err, "command_failed");
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}

/// Returns `Ok(false)` when the command ran but not everything succeeded.
fn execute(cli: Cli) -> Result<bool> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(OutputPaths::default_config_path);
    let mut config: DownloaderConfig = load_config(&config_path)?;
    if let Some(delay_ms) = cli.delay_ms {
        config.delay_ms = delay_ms;
    }
    let config = config.normalized();

    if let Commands::InitConfig { force } = cli.command {
        if config_path.exists() && !force {
            eprintln!(
                "{} already exists; pass --force to replace it",
                config_path.display()
            );
            return Ok(false);
        }
        save_config(&config_path, &config)?;
        info!(path = %config_path.display(), "config_written");
        println!("Wrote {}", config_path.display());
        return Ok(true);
    }

    let raw_url = cli
        .page_url
        .as_deref()
        .ok_or_else(|| EngineError::InvalidUrl("--page-url is required".to_string()))?;
    let page_url =
        Url::parse(raw_url.trim()).map_err(|e| EngineError::InvalidUrl(format!("{raw_url}: {e}")))?;

    let paths = OutputPaths::new(cli.out.clone().unwrap_or_else(OutputPaths::default_base_dir));
    let transport = UreqTransport::new(&config.user_agent, config.timeout());

    let html = match &cli.html {
        Some(path) => std::fs::read_to_string(path)?,
        None => transport.fetch_document(&page_url)?,
    };
    let page = PageDocument::parse(&html, page_url.clone());

    let persistence = DirectoryPersistence::new(paths.images_dir());
    let write_reports = config.write_manifest;
    let show_preview = config.show_preview;
    let downloader = Downloader::new(&page_url, config, transport, persistence);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let outcome = match cli.command {
        Commands::List => {
            let discovery = downloader.discover(&page);
            writeln!(out, "File prefix: \"{}_\"", downloader.prefix())?;
            if discovery.records.is_empty() {
                writeln!(out, "No images found on the page.")?;
            } else {
                render_preview(&discovery.records, &mut out)?;
            }
            return Ok(true);
        }
        Commands::Run { no_preview } => {
            downloader.run(&page, show_preview && !no_preview, &mut out)?
        }
        Commands::Select { indices } => {
            let indices = parse_indices(&indices)?;
            downloader.download_selected(&page, &indices, &mut out)?
        }
        Commands::InitConfig { .. } => return Ok(true),
    };
    out.flush()?;

    if write_reports && outcome.report.total > 0 {
        write_reports_for(&paths, &downloader, &outcome)?;
    }
    Ok(outcome.report.failed == 0)
}

fn write_reports_for<T: Transport, P: Persistence>(
    paths: &OutputPaths,
    downloader: &Downloader<T, P>,
    outcome: &BatchOutcome,
) -> Result<()> {
    paths.ensure_dirs()?;
    let manifest = paths.manifest_path(downloader.prefix());
    let summary = paths.summary_path(downloader.prefix());
    write_manifest(&manifest, &outcome.run.results)?;
    write_summary(&summary, &outcome.report)?;
    info!(
        manifest = %manifest.display(),
        summary = %summary.display(),
        "reports_written"
    );
    Ok(())
}
