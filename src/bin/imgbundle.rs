//! CLI binary for imgbundle.
//!
//! A thin shim over the library crate: reads image files, drives a
//! `Session` in archive or document mode and delivers the result into an
//! output directory.

use anyhow::{Context, Result};
use clap::Parser;
use imgbundle::pipeline::input;
use imgbundle::{
    BatchConfig, ConversionProgressCallback, DeliveryReceipt, DirectoryDelivery, DocumentOptions,
    ItemId, ItemReport, Margin, Orientation, OutputMode, ProcessingStats, ProgressCallback,
    RefLedger, RunSummary, Session,
};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per run plus a log line per item or
/// page. Items of a group settle out of order, so timing is keyed by id.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<ItemId, Instant>>,
    mode: Mutex<OutputMode>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            mode: Mutex::new(OutputMode::Archive),
            errors: AtomicUsize::new(0),
        })
    }

    /// Reset the bar for a new run of `total` units.
    fn activate_bar(&self, total: usize, unit: &str) {
        let progress_style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  {{msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn elapsed_secs(&self, id: ItemId) -> f64 {
        self.start_times
            .lock()
            .remove(&id)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn failed(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_items: usize, mode: OutputMode) {
        *self.mode.lock() = mode;
        self.errors.store(0, Ordering::SeqCst);
        let (unit, prefix) = match mode {
            OutputMode::Archive => ("images", "Converting"),
            OutputMode::Document => ("pages", "Assembling"),
        };
        self.activate_bar(total_items, unit);
        self.bar.set_prefix(prefix);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{prefix} {total_items} {unit}…"))
        ));
    }

    fn on_group_start(&self, group: usize, size: usize) {
        self.bar.set_message(format!("group {} ({size})", group + 1));
    }

    fn on_item_start(&self, id: ItemId, _name: &str) {
        self.start_times.lock().insert(id, Instant::now());
    }

    fn on_item_complete(&self, id: ItemId, name: &str, output_len: usize) {
        let secs = self.elapsed_secs(id);
        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            green("✓"),
            name,
            dim(&format!("{output_len:>9} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, id: ItemId, name: &str, error: &str) {
        let secs = self.elapsed_secs(id);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            name,
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_start(&self, index: usize, _total_pages: usize) {
        self.bar.set_position(index as u64);
        self.bar.set_message(format!("page {}", index + 1));
    }

    fn on_page_error(&self, index: usize, name: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>3}  {:<32}  {}",
            red("✗"),
            index + 1,
            name,
            red(&truncate(error, 80)),
        ));
    }

    fn on_run_complete(&self, total_items: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let mode = *self.mode.lock();
        let failed = self.failed();

        match mode {
            OutputMode::Archive if failed == 0 => eprintln!(
                "{} {} images converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            ),
            OutputMode::Archive => eprintln!(
                "{} {}/{} images converted  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_items,
                red(&failed.to_string()),
            ),
            OutputMode::Document if success_count < total_items => {
                eprintln!("{} document could not be finalised", red("✘"))
            }
            OutputMode::Document if failed == 0 => eprintln!(
                "{} {} pages laid out",
                green("✔"),
                bold(&total_items.to_string())
            ),
            OutputMode::Document => eprintln!(
                "{} {} pages laid out  ({} with error markers)",
                cyan("⚠"),
                bold(&total_items.to_string()),
                red(&failed.to_string()),
            ),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Re-encode a folder of screenshots as JPEGs, zipped
  imgbundle shots/ -o out/

  # One PDF page per image, landscape with 10 mm margins
  imgbundle --mode document --orientation landscape --margin small *.png -o out/

  # Retry failed conversions twice, print a JSON report
  imgbundle --retries 2 --json photos/ > report.json

OUTPUT:
  archive   converted-images-<millis>.zip   one <stem>.jpg per converted image
  document  document-<millis>.pdf           one A4 page per image, in input order

ENVIRONMENT VARIABLES:
  IMGBUNDLE_MODE          archive | document
  IMGBUNDLE_OUTPUT_DIR    Directory the result is written to
  IMGBUNDLE_MARGIN        none | small | big
  IMGBUNDLE_ORIENTATION   portrait | landscape
  IMGBUNDLE_QUALITY       JPEG quality in (0, 1]
  IMGBUNDLE_GROUP_SIZE    Images converted concurrently per group
  RUST_LOG                Overrides the log filter
"#;

/// Convert images into a JPEG archive or a single PDF.
#[derive(Parser, Debug)]
#[command(
    name = "imgbundle",
    version,
    about = "Convert images into a ZIP of JPEGs or a single paginated PDF",
    long_about = "Convert PNG, JPEG, WebP, GIF and BMP images into either a ZIP archive of \
re-encoded JPEGs (transparency flattened onto white) or a single A4 PDF with one image per \
page, fitted and centred. Everything runs locally.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files or directories (directories are read one level deep).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output kind.
    #[arg(short, long, env = "IMGBUNDLE_MODE", value_enum, default_value = "archive")]
    mode: ModeArg,

    /// Directory to write the archive or document into.
    #[arg(short, long = "output-dir", env = "IMGBUNDLE_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Page margin in document mode: none (0 mm), small (10 mm), big (20 mm).
    #[arg(long, env = "IMGBUNDLE_MARGIN", value_enum, default_value = "none")]
    margin: MarginArg,

    /// Page orientation in document mode.
    #[arg(long, env = "IMGBUNDLE_ORIENTATION", value_enum, default_value = "portrait")]
    orientation: OrientationArg,

    /// JPEG quality, 0 < q ≤ 1.
    #[arg(long, env = "IMGBUNDLE_QUALITY", default_value_t = imgbundle::config::DEFAULT_QUALITY)]
    quality: f32,

    /// Images converted concurrently per group in archive mode.
    #[arg(long, env = "IMGBUNDLE_GROUP_SIZE", default_value_t = imgbundle::config::DEFAULT_GROUP_SIZE)]
    group_size: usize,

    /// Re-run archive conversion up to N times while items remain failed.
    #[arg(long, env = "IMGBUNDLE_RETRIES", default_value_t = 0)]
    retries: u32,

    /// Print a JSON report (run summary, items, stats) on stdout.
    #[arg(long, env = "IMGBUNDLE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMGBUNDLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMGBUNDLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMGBUNDLE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Archive,
    Document,
}

impl From<ModeArg> for OutputMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Archive => OutputMode::Archive,
            ModeArg::Document => OutputMode::Document,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MarginArg {
    None,
    Small,
    Big,
}

impl From<MarginArg> for Margin {
    fn from(v: MarginArg) -> Self {
        match v {
            MarginArg::None => Margin::None,
            MarginArg::Small => Margin::Small,
            MarginArg::Big => Margin::Big,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OrientationArg {
    Portrait,
    Landscape,
}

impl From<OrientationArg> for Orientation {
    fn from(v: OrientationArg) -> Self {
        match v {
            OrientationArg::Portrait => Orientation::Portrait,
            OrientationArg::Landscape => Orientation::Landscape,
        }
    }
}

/// `--json` output.
#[derive(Serialize)]
struct Report {
    runs: Vec<RunSummary>,
    stats: ProcessingStats,
    items: Vec<ItemReport>,
    output: DeliveryReceipt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the user-facing feedback, so library logs
    // drop to ERROR while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read inputs ──────────────────────────────────────────────────────
    let inputs = cli.inputs.clone();
    let sources = tokio::task::spawn_blocking(move || input::read_sources(&inputs))
        .await
        .context("Input reader panicked")?
        .context("Failed to read inputs")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|cb| cb as ProgressCallback))?;
    let mode = OutputMode::from(cli.mode);

    let ledger = RefLedger::new();
    let session = Session::with_display_refs(config, Box::new(ledger.clone()));
    session.add(sources);

    // ── Run ──────────────────────────────────────────────────────────────
    let mut runs = vec![session
        .start(mode)
        .await
        .with_context(|| format!("{mode} run failed"))?];

    if mode == OutputMode::Archive {
        for attempt in 1..=cli.retries {
            let failed = session.stats().failed;
            if failed == 0 {
                break;
            }
            if !cli.quiet {
                eprintln!(
                    "{} retry {}/{}: {} failed item(s)",
                    cyan("↻"),
                    attempt,
                    cli.retries,
                    failed
                );
            }
            runs.push(session.start(mode).await.context("Retry failed")?);
        }
    }

    // ── Deliver ──────────────────────────────────────────────────────────
    let delivery = DirectoryDelivery::new(&cli.output_dir);
    let receipt = session
        .download(mode, &delivery)
        .context("Failed to write output")?;
    let stats = session.stats();

    if cli.json {
        let report = Report {
            runs,
            stats,
            items: session.items().iter().map(|i| i.report()).collect(),
            output: receipt,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        let location = receipt
            .location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| receipt.file_name.clone());
        let duration_ms: u64 = runs
            .iter()
            .map(|r| match r {
                RunSummary::Archive(s) => s.duration_ms,
                RunSummary::Document { duration_ms, .. } => *duration_ms,
            })
            .sum();
        eprintln!(
            "{}  {}/{} {}  {}ms  →  {}  {}",
            if stats.failed == 0 { green("✔") } else { cyan("⚠") },
            stats.completed,
            stats.total,
            if mode == OutputMode::Archive { "images" } else { "pages" },
            duration_ms,
            bold(&location),
            dim(&format!("({} bytes)", receipt.size)),
        );
        if progress.is_none() && stats.failed > 0 {
            eprintln!("  {} item(s) failed", red(&stats.failed.to_string()));
        }
    }

    // Every display reference handed out must come back once the session
    // lets go of its items.
    session.clear();
    if ledger.live() > 0 {
        warn!(
            "{} display reference(s) still live at exit ({} created, {} released)",
            ledger.live(),
            ledger.created(),
            ledger.released()
        );
    }

    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder()
        .group_size(cli.group_size)
        .quality(cli.quality)
        .document(DocumentOptions {
            margin: cli.margin.into(),
            orientation: cli.orientation.into(),
        });

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
