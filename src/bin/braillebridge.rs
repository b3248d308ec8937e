//! CLI binary for braillebridge.
//!
//! A thin shim over the library crate: registers a local file as a document,
//! runs one conversion against a file-system blob store and prints the
//! artifact references.

use anyhow::{Context, Result};
use braillebridge::{
    extract_file, ArtifactKind, ConversionConfig, ConversionProgressCallback, Converter,
    FsBlobStore, MemoryDocumentStore, ProgressCallback, Stage,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while fetching, extracting and translating; a chunk counter bar
/// once speech synthesis starts. Chunks may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    bar_active: AtomicUsize,
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
            bar_active: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the counter style the first time the chunk total is known.
    fn activate_bar(&self, total: usize) {
        if self.bar_active.swap(1, Ordering::SeqCst) == 1 {
            return;
        }
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Speaking");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, document_id: &str, kind: ArtifactKind) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting {kind} conversion of {document_id}…"))
        ));
    }

    fn on_stage(&self, stage: Stage) {
        self.bar.set_message(stage.to_string());
    }

    fn on_chunk_start(&self, index: usize, total: usize) {
        self.activate_bar(total);
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(index, Instant::now());
    }

    fn on_chunk_complete(&self, index: usize, total: usize, audio_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{audio_len:>6} bytes")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, _document_id: &str, kind: ArtifactKind) {
        self.bar.finish_and_clear();
        eprintln!("{} {} artifact stored", green("✔"), bold(&kind.to_string()));
    }
}

impl CliProgressCallback {
    /// Clear the bar after a failed conversion.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
        let errors = self.errors.load(Ordering::SeqCst);
        if errors > 0 {
            eprintln!("{} {} chunk(s) failed", red("✘"), errors);
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Contracted + uncontracted Braille, printed to stdout
  braillebridge braille --print letter.docx

  # Speech, slowed down, in French
  braillebridge speech --lang fr --slow notes.pdf

  # Plain text only
  braillebridge extract report.pdf > report.txt

  # Machine-readable result
  braillebridge braille --json letter.txt

ENVIRONMENT VARIABLES:
  BRAILLEBRIDGE_STORE_DIR      Artifact store directory
  BRAILLEBRIDGE_LOU_TRANSLATE  lou_translate executable
  BRAILLEBRIDGE_TABLE          Liblouis table for contracted output
  BRAILLEBRIDGE_LANG           Speech language
  BRAILLEBRIDGE_MAX_UPLOAD_MB  Largest accepted input file (default 50)
  LOUIS_TABLEPATH              Where liblouis looks up bare table names
  PDFIUM_LIB_PATH              Path to libpdfium (file or directory)
  RUST_LOG                     Log filter, overrides --verbose / --quiet

NOTES:
  Without lou_translate on PATH, Braille is produced with a built-in
  letter-by-letter table: readable, but uncontracted in both files.
"#;

/// Convert documents to Braille and speech.
#[derive(Parser, Debug)]
#[command(
    name = "braillebridge",
    version,
    about = "Convert PDF, Word and text documents to Braille and speech",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory that holds uploaded sources and artifacts.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_STORE_DIR", default_value = "./braillebridge-store")]
    store_dir: PathBuf,

    /// Owner the document is registered under; scopes Braille artifact keys.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_OWNER", default_value = "local")]
    owner: String,

    /// `lou_translate` executable (path or name on PATH).
    #[arg(long, global = true, env = "BRAILLEBRIDGE_LOU_TRANSLATE", default_value = "lou_translate")]
    lou_translate: PathBuf,

    /// Liblouis table for contracted output.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_TABLE", default_value = "en-us-g2.ctb")]
    table: PathBuf,

    /// Speech language code.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_LANG", default_value = "en")]
    lang: String,

    /// Slowed-down speech.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_SLOW")]
    slow: bool,

    /// Maximum characters per speech request (20–5000).
    #[arg(long, global = true, env = "BRAILLEBRIDGE_CHUNK_LIMIT", default_value_t = 200)]
    chunk_limit: usize,

    /// Number of concurrent speech requests.
    #[arg(short, long, global = true, env = "BRAILLEBRIDGE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Base URL of the TTS endpoint.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_TTS_HOST", default_value = "https://translate.google.com")]
    tts_host: String,

    /// Largest accepted input file in MiB.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: u64,

    /// Per-chunk speech request timeout in seconds.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Print the Braille text to stdout.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_PRINT")]
    print: bool,

    /// Output the conversion result as JSON.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_JSON")]
    json: bool,

    /// Disable progress display.
    #[arg(long, global = true, env = "BRAILLEBRIDGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "BRAILLEBRIDGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "BRAILLEBRIDGE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a file to contracted and uncontracted Braille.
    Braille { file: PathBuf },
    /// Convert a file to one MP3 file.
    Speech { file: PathBuf },
    /// Print the text extracted from a file.
    Extract { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs would fight with the progress bar.
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

    let (kind, file) = match &cli.command {
        Command::Extract { file } => {
            let text = extract_file(file)
                .await
                .with_context(|| format!("Failed to extract text from {}", file.display()))?;
            write_stdout(&text)?;
            return Ok(());
        }
        Command::Braille { file } => (ArtifactKind::Braille, file.clone()),
        Command::Speech { file } => (ArtifactKind::Speech, file.clone()),
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|cb| cb as ProgressCallback))?;

    // ── Register the file as a document ──────────────────────────────────
    let blobs = Arc::new(
        FsBlobStore::new(&cli.store_dir, config.download_timeout_secs)
            .context("Failed to open the artifact store")?,
    );
    let documents = Arc::new(MemoryDocumentStore::new());
    let converter =
        Converter::from_config(blobs, documents, config).context("Invalid configuration")?;
    let document_id = register(&converter, &file, &cli.owner).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let result = run(&cli, &converter, kind, &document_id).await;
    if let Some(cb) = progress {
        if result.is_err() {
            cb.abandon();
        }
    }
    result
}

async fn run(
    cli: &Cli,
    converter: &Converter,
    kind: ArtifactKind,
    document_id: &str,
) -> Result<()> {
    match kind {
        ArtifactKind::Braille => {
            let output = converter
                .convert_to_braille(document_id, &cli.owner)
                .await
                .context("Braille conversion failed")?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                );
                return Ok(());
            }
            if cli.print {
                write_stdout(&output.contracted)?;
            }
            if !cli.quiet {
                eprintln!("   contracted    {}", bold(&output.contracted_ref.url));
                eprintln!("   uncontracted  {}", bold(&output.uncontracted_ref.url));
                eprintln!(
                    "   {} chars in  /  {} cells out  —  {}ms total",
                    dim(&output.stats.text_chars.to_string()),
                    dim(&output.contracted.chars().count().to_string()),
                    output.stats.total_ms,
                );
            }
        }
        ArtifactKind::Speech => {
            let output = converter
                .convert_to_speech(document_id, &cli.owner)
                .await
                .context("Speech conversion failed")?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                );
                return Ok(());
            }
            if !cli.quiet {
                eprintln!("   audio  {}", bold(&output.audio_ref.url));
                eprintln!(
                    "   {} chunks  /  {} bytes  —  {}ms total",
                    dim(&output.chunk_count.to_string()),
                    dim(&output.byte_len.to_string()),
                    output.stats.total_ms,
                );
            }
        }
    }
    Ok(())
}

/// Upload `file` through the converter and return the new document id.
async fn register(converter: &Converter, file: &Path, owner: &str) -> Result<String> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("{} has no file name", file.display()))?;

    let document = converter
        .upload(owner, &file_name, bytes)
        .await
        .with_context(|| format!("Failed to upload {}", file.display()))?;
    Ok(document.id)
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .lou_translate(cli.lou_translate.clone())
        .braille_table(cli.table.clone())
        .language(cli.lang.clone())
        .slow_speech(cli.slow)
        .chunk_limit(cli.chunk_limit)
        .concurrency(cli.concurrency)
        .tts_host(cli.tts_host.clone())
        .api_timeout_secs(cli.api_timeout)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024));

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
