//! CLI binary for md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `ConversionRequest` and `ConversionConfig` and prints results.

use std::future::Future;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf::{
    convert_with_cancel, preview_html, CancelFlag, ConversionConfig, ConversionError,
    ConversionProgressCallback, ConversionRequest, Md2PdfError, PaperFormat, PaperOrientation,
    Phase, ProgressCallback,
};
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner line that names the running stage and logs each finished one.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("md2pdf");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Validation => "Validating request",
        Phase::Transform => "Rendering Markdown",
        Phase::Assemble => "Assembling page",
        Phase::TempFile => "Writing temp page",
        Phase::ResolveOutput => "Resolving output path",
        Phase::Launch => "Launching Chrome",
        Phase::Load => "Loading page",
        Phase::Stabilize => "Waiting for diagrams and layout",
        Phase::Export => "Exporting PDF",
        Phase::Verify => "Verifying output",
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, phase: Phase) {
        self.bar.set_message(format!("{}…", stage_label(phase)));
    }

    fn on_stage_complete(&self, phase: Phase, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<32} {}",
            green("✓"),
            stage_label(phase),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_conversion_complete(&self, _path: &Path) {
        self.bar.finish_and_clear();
    }

    fn on_conversion_error(&self, phase: Phase, error: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✗"), stage_label(phase), dim(error)));
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # Convert a file; the PDF lands in your home directory
  md2pdf notes.md

  # Choose the name and paper
  md2pdf notes.md -o report --format a4 --orientation landscape --border 1.5cm

  # Watermark every page
  md2pdf draft.md --watermark "DRAFT"

  # Read Markdown from stdin
  cat notes.md | md2pdf - -o notes.pdf

  # JSON request (same schema as the library's RawRequest)
  md2pdf --request '{"markdown":"# Hi","paperFormat":"a5"}'

  # Inspect the page shell without launching Chrome
  md2pdf --html-only notes.md > page.html

ENVIRONMENT VARIABLES:
  M2P_OUTPUT_DIR           Output directory; beats any path given with -o
  MD2PDF_CHROME_PATH       Chrome/Chromium binary to try first
  MD2PDF_CHROME_CACHE_DIR  Where the pinned chrome-headless-shell is installed
  RUST_LOG                 Log filter (overrides --verbose / --quiet)
"##;

#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown to PDF through headless Chrome",
    long_about = "Convert Markdown documents to paginated PDF. Code blocks are syntax \
highlighted, Mermaid diagrams are rendered in the browser, and an optional watermark is \
drawn across every page and repeated in the running header and footer.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to convert, or `-` for stdin.
    #[arg(required_unless_present = "request")]
    input: Option<String>,

    /// Full JSON request instead of a file and flags.
    #[arg(long, conflicts_with = "input")]
    request: Option<String>,

    /// Output file name or path. `.pdf` is appended when missing.
    #[arg(short, long)]
    output: Option<String>,

    #[arg(long, value_enum, default_value = "letter")]
    format: FormatArg,

    #[arg(long, value_enum, default_value = "portrait")]
    orientation: OrientationArg,

    /// Uniform page margin, e.g. 20mm, 2cm, 0.5in, 40px.
    #[arg(long, default_value = "20mm")]
    border: String,

    /// Up to 15 characters of A-Z, 0-9, spaces and dashes.
    #[arg(long)]
    watermark: Option<String>,

    /// Output directory; wins over the directory in --output.
    #[arg(long, env = "M2P_OUTPUT_DIR")]
    output_dir: Option<String>,

    /// Chrome binary to try before discovery.
    #[arg(long, env = "MD2PDF_CHROME_PATH")]
    chrome: Option<String>,

    /// Settle delay after page load, in milliseconds.
    #[arg(long, default_value_t = 7000,
          value_parser = clap::value_parser!(u64).range(0..=120_000))]
    render_delay_ms: u64,

    /// Navigation timeout, in seconds.
    #[arg(long, default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    load_timeout_secs: u64,

    /// Print the assembled HTML page and exit without launching Chrome.
    #[arg(long)]
    html_only: bool,

    /// Print the result (or error details) as JSON on stdout.
    #[arg(long)]
    json: bool,

    #[arg(long)]
    no_progress: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Letter,
    A4,
    A3,
    A5,
    Legal,
    Tabloid,
}

impl From<FormatArg> for PaperFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Letter => PaperFormat::Letter,
            FormatArg::A4 => PaperFormat::A4,
            FormatArg::A3 => PaperFormat::A3,
            FormatArg::A5 => PaperFormat::A5,
            FormatArg::Legal => PaperFormat::Legal,
            FormatArg::Tabloid => PaperFormat::Tabloid,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OrientationArg {
    Portrait,
    Landscape,
}

impl From<OrientationArg> for PaperOrientation {
    fn from(v: OrientationArg) -> Self {
        match v {
            OrientationArg::Portrait => PaperOrientation::Portrait,
            OrientationArg::Landscape => PaperOrientation::Landscape,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers stage feedback, so library INFO logs stay quiet
    // while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.html_only;
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

    // ── Build request and config ─────────────────────────────────────────
    let request = build_request(&cli).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── HTML-only mode ───────────────────────────────────────────────────
    if cli.html_only {
        let html = preview_html(&request, &config).context("Failed to assemble page")?;
        print!("{html}");
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let cancel = CancelFlag::new();
    let signals = shutdown_signal().context("Failed to install signal handlers")?;
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let name = signals.await;
            eprintln!("\nReceived {name} signal; closing Chrome and cleaning up…");
            cancel.cancel();
        })
    };
    let result = convert_with_cancel(&request, &config, &cancel).await;
    watcher.abort();

    match result {
        Ok(output) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                );
            } else if cli.quiet {
                println!("{}", output.path.display());
            } else {
                eprintln!("{}  {}", green("✔"), bold("Done"));
                println!("{}", output.summary());
            }
            Ok(())
        }
        Err(err) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&err.details())
                        .context("Failed to serialise error")?
                );
            }
            if !cli.quiet {
                print_hint(&err);
            }
            Err(err.into())
        }
    }
}

/// Resolves with the name of the first interrupt or termination signal.
///
/// Handlers are installed before this returns, so a signal that arrives
/// while the future is not yet polled is still observed.
fn shutdown_signal() -> io::Result<impl Future<Output = &'static str>> {
    #[cfg(unix)]
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        let interrupt = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        {
            tokio::select! {
                _ = interrupt => "interrupt",
                _ = terminate.recv() => "termination",
            }
        }
        #[cfg(not(unix))]
        {
            interrupt.await;
            "interrupt"
        }
    })
}

async fn build_request(cli: &Cli) -> Result<ConversionRequest> {
    if let Some(json) = &cli.request {
        return ConversionRequest::from_json(json).context("Invalid --request");
    }

    let markdown = match cli.input.as_deref() {
        Some("-") | None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read Markdown from stdin")?;
            buf
        }
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {path}"))?,
    };

    let mut builder = ConversionRequest::builder(markdown)
        .paper_format(PaperFormat::from(cli.format).as_str())
        .paper_orientation(PaperOrientation::from(cli.orientation).as_str())
        .paper_border(cli.border.clone());
    if let Some(out) = &cli.output {
        let has_dir = Path::new(out)
            .parent()
            .is_some_and(|p| !p.as_os_str().is_empty());
        builder = if has_dir {
            builder.output_path(out.clone())
        } else {
            builder.output_filename(out.clone())
        };
    }
    if let Some(mark) = &cli.watermark {
        builder = builder.watermark(mark.clone());
    }
    builder.build().context("Invalid request")
}

fn build_config(cli: &Cli, progress_cb: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .render_delay(Duration::from_millis(cli.render_delay_ms))
        .load_timeout(Duration::from_secs(cli.load_timeout_secs));

    if let Some(dir) = cli.output_dir.as_deref().filter(|d| !d.trim().is_empty()) {
        builder = builder.output_dir(dir);
    }
    if let Some(chrome) = &cli.chrome {
        builder = builder.chrome_path(chrome);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_hint(err: &ConversionError) {
    if let Md2PdfError::EngineLaunch { .. } = err.kind {
        eprintln!(
            "{} pinned chrome-headless-shell {} is not installed.",
            bold("hint:"),
            chrome_locate::CHROME_VERSION
        );
        if let Ok(url) = chrome_locate::download_url() {
            eprintln!("      download {url}");
            eprintln!(
                "      and unpack it into {}",
                chrome_locate::chrome_cache_dir().display()
            );
        }
    }
}
