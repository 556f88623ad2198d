//! CLI binary for docverify.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` and prints the report as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use docverify::{
    AnalysisConfig, AnalysisProgressCallback, Analyzer, DocumentFormat, DocumentType, FieldRow,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

/// Spinner while the document renders, then a page bar while the model reads.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Reading");
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} Page {:>2}/{:<2}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_analysis_complete(&self, _total_pages: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # ID card, front and back in one PDF
  docverify cni.pdf --type id-card

  # Passport photo, pretty-printed report
  docverify passeport.jpg --type passport --pretty

  # Remote vision server, per-page field comparison on stderr
  docverify cni.pdf --type id-card --vision-url http://gpu-box:1234 --detailed

ENVIRONMENT VARIABLES:
  DOCVERIFY_VISION_URL    Base URL of the OpenAI-compatible vision service
  DOCVERIFY_MODEL         Model ID sent in each request
  DOCVERIFY_API_KEY       Bearer token
  PDFIUM_LIB_PATH         Path to libpdfium (PDF input only)
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Verify identity documents with a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docverify",
    version,
    about = "Verify ID cards and passports with a Vision LLM",
    long_about = "Render an identity document (PDF, JPEG or PNG), let an OpenAI-compatible \
vision model read every page, reconcile the pages into one record, score it and print \
the report as JSON.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to analyse (.pdf, .jpg, .jpeg or .png).
    input: PathBuf,

    /// Declared document type: id-card (cni) or passport (passeport).
    #[arg(short = 't', long = "type", env = "DOCVERIFY_TYPE", value_parser = parse_doc_type)]
    doc_type: DocumentType,

    /// Base URL of the vision service.
    #[arg(
        long,
        env = "DOCVERIFY_VISION_URL",
        default_value = docverify::config::DEFAULT_VISION_BASE_URL
    )]
    vision_url: String,

    /// Vision model ID.
    #[arg(long, env = "DOCVERIFY_MODEL", default_value = docverify::config::DEFAULT_MODEL)]
    model: String,

    /// Bearer token for the vision service.
    #[arg(long, env = "DOCVERIFY_API_KEY", default_value = docverify::config::DEFAULT_API_KEY,
          hide_env_values = true)]
    api_key: String,

    /// PDF render scale (0.5–8.0).
    #[arg(long, env = "DOCVERIFY_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Threshold used for the justification.
    #[arg(long, env = "DOCVERIFY_THRESHOLD", default_value_t = 75)]
    threshold: u32,

    /// Pages sent to the model at once.
    #[arg(short, long, env = "DOCVERIFY_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Per-request timeout in seconds.
    #[arg(long, env = "DOCVERIFY_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Path to the pdfium shared library.
    #[arg(long, env = "DOCVERIFY_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,

    /// Print the per-page field comparison to stderr (ID cards).
    #[arg(long)]
    detailed: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCVERIFY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCVERIFY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the report.
    #[arg(short, long, env = "DOCVERIFY_QUIET")]
    quiet: bool,
}

fn parse_doc_type(s: &str) -> std::result::Result<DocumentType, String> {
    DocumentType::parse(s)
        .ok_or_else(|| format!("unknown document type '{s}' (expected id-card or passport)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v asks for them.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Format gate ──────────────────────────────────────────────────────
    let filename = cli
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .context("Input path has no usable file name")?
        .to_string();
    let format = DocumentFormat::from_filename(&filename)
        .with_context(|| format!("Refusing {}", cli.input.display()))?;

    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let analyzer = Analyzer::new(config).context("Failed to create analyzer")?;

    if !cli.quiet {
        eprintln!(
            "{} {} {}",
            cyan("◆"),
            bold(&filename),
            dim(&format!("({}, {})", cli.doc_type, format.mime_type())),
        );
    }

    // ── Run analysis ─────────────────────────────────────────────────────
    let start = Instant::now();
    let report = match cli.doc_type {
        DocumentType::IdCard => {
            let analysis = analyzer
                .analyze_id_card_detailed(&bytes, &filename)
                .await
                .context("Analysis failed")?;
            if cli.detailed {
                print_field_table(&analysis.field_table());
            }
            analysis.report
        }
        DocumentType::Passport => analyzer
            .analyze_passport(&bytes, &filename)
            .await
            .context("Analysis failed")?,
    };

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("Failed to serialise report")?;
    println!("{json}");

    if !cli.quiet {
        eprintln!(
            "{} score {}  {}",
            green("✔"),
            bold(&report.score.map(|s| s.to_string()).unwrap_or_else(|| "-".into())),
            dim(&format!("{}ms", start.elapsed().as_millis())),
        );
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .vision_base_url(cli.vision_url.clone())
        .model(cli.model.clone())
        .api_key(cli.api_key.clone())
        .scale_factor(cli.scale)
        .score_threshold(cli.threshold)
        .concurrency(cli.concurrency)
        .request_timeout_secs(cli.timeout);

    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Field × (fused, page 1..n) table on stderr.
fn print_field_table(rows: &[FieldRow]) {
    let pages = rows.first().map(|r| r.pages.len()).unwrap_or(0);
    let cell = |v: &Option<String>| v.clone().unwrap_or_else(|| "·".into());

    let mut header = format!("{:<16} {:<22}", "champ", "fusion");
    for p in 1..=pages {
        header.push_str(&format!(" {:<22}", format!("page_{p}")));
    }
    eprintln!("{}", bold(&header));

    for row in rows {
        let mut line = format!("{:<16} {:<22}", row.field, cell(&row.fused));
        for value in &row.pages {
            line.push_str(&format!(" {:<22}", cell(value)));
        }
        eprintln!("{line}");
    }
}
