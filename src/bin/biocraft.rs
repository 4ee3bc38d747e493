//! CLI binary for biocraft.
//!
//! A thin shim over the library crate: resolves inputs, submits them as one
//! batch, waits for every pipeline, and exports each completed profile as
//! `<name>_简介.docx`.

use anyhow::{Context, Result};
use biocraft::{
    resolve_input, BioCraftConfig, DocxExporter, FileId, FileReport, PipelineController,
    PipelineObserver, ProcessingStatus, ProfileExporter, Rejection, UploadedFile,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: one progress bar across all files, one log line per
/// finished file. Files finish in any order.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Classifying");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineObserver for CliObserver {
    fn on_batch_submitted(&self, accepted: usize, _rejected: usize) {
        self.bar.inc_length(accepted as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {accepted} document(s)…"))
        ));
    }

    fn on_file_rejected(&self, file_name: &str, reason: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✗"), file_name, dim(reason)));
    }

    fn on_file_completed(&self, _id: FileId, name: &str) {
        self.bar.println(format!("  {} {}", green("✓"), name));
        self.bar.inc(1);
    }

    fn on_file_failed(&self, _id: FileId, error: &str) {
        // Keep long messages on one line.
        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('\u{2026}');
            s
        } else {
            error.to_string()
        };
        self.bar.println(format!("  {} {}", red("✗"), red(&msg)));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Classify and export one biography (writes 张三_简介.docx)
  biocraft 张三.docx

  # A whole folder, exported into out/
  biocraft bios/*.docx -o out/

  # Attach a portrait beside the titles section
  biocraft 张三.docx --image 张三.jpg

  # Use another provider and model
  biocraft --provider openai --model gpt-4.1-mini bios/*.docx

  # Structured profiles as JSON, no documents written
  biocraft --json --no-export bios/*.docx > profiles.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  BIOCRAFT_PROVIDER       Override provider (gemini, openai, anthropic, ollama, lmstudio)
  BIOCRAFT_MODEL          Override model ID

  The API key is only read when the first document reaches classification.
"#;

/// Turn biography documents into uniformly formatted profiles.
#[derive(Parser, Debug)]
#[command(
    name = "biocraft",
    version,
    about = "Turn .docx biographies into uniformly formatted profile documents",
    long_about = "Extract the text of each .docx biography, let an LLM sort it into fixed \
categories (titles, career, education, research direction, topics, …) and export every \
completed profile as a formatted <name>_简介.docx document. Every file is processed \
independently; a failure affects only that file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local .docx paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Directory for exported documents.
    #[arg(short, long, env = "BIOCRAFT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// LLM model ID.
    #[arg(long, env = "BIOCRAFT_MODEL", default_value = "gemini-2.5-flash")]
    model: String,

    /// LLM provider: gemini, openai, anthropic, ollama, lmstudio.
    #[arg(long, env = "BIOCRAFT_PROVIDER", default_value = "gemini")]
    provider: String,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "BIOCRAFT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per document.
    #[arg(long, env = "BIOCRAFT_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Per-document LLM call timeout in seconds.
    #[arg(long, env = "BIOCRAFT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "BIOCRAFT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Path to a text file containing a custom classification instruction.
    #[arg(long, env = "BIOCRAFT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// PNG or JPEG portrait to attach (single input only).
    #[arg(long)]
    image: Option<PathBuf>,

    /// Print a JSON report of every file instead of the summary.
    #[arg(long, env = "BIOCRAFT_JSON")]
    json: bool,

    /// Do not write any documents.
    #[arg(long)]
    no_export: bool,

    /// Replace documents already in the output directory instead of
    /// writing `<name>_简介 (2).docx`.
    #[arg(long)]
    overwrite: bool,

    /// Disable progress bar.
    #[arg(long, env = "BIOCRAFT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BIOCRAFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "BIOCRAFT_QUIET")]
    quiet: bool,
}

/// `--json` output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReport {
    files: Vec<FileReport>,
    rejected: Vec<Rejection>,
    unreadable: Vec<UnreadableInput>,
    exported: Vec<PathBuf>,
    export_errors: Vec<ExportFailure>,
}

/// A completed profile whose document could not be written.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportFailure {
    file_name: String,
    error: String,
}

#[derive(Default)]
struct ExportRun {
    written: Vec<PathBuf>,
    failed: Vec<ExportFailure>,
}

#[derive(Serialize)]
struct UnreadableInput {
    input: String,
    error: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    if cli.image.is_some() && cli.inputs.len() != 1 {
        anyhow::bail!("--image can only be used with a single input");
    }

    // ── Build config ─────────────────────────────────────────────────────
    let observer = show_progress.then(CliObserver::new);
    let config = build_config(&cli, observer.clone()).await?;
    let controller = PipelineController::new(config.clone());

    // ── Resolve inputs ───────────────────────────────────────────────────
    let started = Instant::now();
    let mut uploads: Vec<UploadedFile> = Vec::with_capacity(cli.inputs.len());
    let mut unreadable = Vec::new();
    for input in &cli.inputs {
        match resolve_input(input, config.download_timeout_secs).await {
            Ok(file) => uploads.push(file),
            Err(e) => {
                if !cli.quiet && !cli.json {
                    eprintln!("  {} {}  {}", red("✗"), input, dim(&e.to_string()));
                }
                unreadable.push(UnreadableInput {
                    input: input.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    // ── Run pipelines ────────────────────────────────────────────────────
    let receipt = controller.submit_batch(uploads);
    controller.settle().await;
    if let Some(obs) = &observer {
        obs.bar.finish_and_clear();
    }

    if let (Some(path), Some(&id)) = (&cli.image, receipt.accepted.first()) {
        if controller.get(id).map(|r| r.status) == Some(ProcessingStatus::Completed) {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read image {:?}", path))?;
            controller
                .set_profile_image(id, &bytes)
                .context("Failed to attach image")?;
        }
    }

    // ── Export ───────────────────────────────────────────────────────────
    let exported = if cli.no_export {
        ExportRun::default()
    } else {
        export_completed(&controller, &cli.output_dir, cli.overwrite).await?
    };

    // ── Report ───────────────────────────────────────────────────────────
    let summary = controller.summary();
    if cli.json {
        let report = RunReport {
            files: controller.snapshot(),
            rejected: receipt.rejected,
            unreadable,
            exported: exported.written,
            export_errors: exported.failed,
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            for rejection in &receipt.rejected {
                eprintln!("  {} {}  {}", red("✗"), rejection.file_name, dim(&rejection.reason));
            }
            for file in controller.snapshot() {
                match (&file.result, &file.error_message) {
                    (Some(profile), _) => {
                        eprintln!("  {} {}  →  {}", green("✓"), file.file_name, profile.name)
                    }
                    (_, Some(message)) => {
                        eprintln!("  {} {}  {}", red("✗"), file.file_name, red(message))
                    }
                    _ => {}
                }
            }
        }
        for path in &exported.written {
            eprintln!("  {} {}", dim("→"), bold(&path.display().to_string()));
        }
        for failure in &exported.failed {
            eprintln!("  {} {}  {}", red("✗"), failure.file_name, red(&failure.error));
        }
        let failed = summary.failed + receipt.rejected.len() + unreadable.len();
        eprintln!(
            "{}  {}/{} completed  {}ms",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            summary.completed,
            summary.total + receipt.rejected.len() + unreadable.len(),
            started.elapsed().as_millis(),
        );
    }

    if summary.completed == 0 {
        anyhow::bail!("No document was processed successfully");
    }
    Ok(())
}

/// Map CLI args to `BioCraftConfig`.
async fn build_config(cli: &Cli, observer: Option<Arc<CliObserver>>) -> Result<BioCraftConfig> {
    let mut builder = BioCraftConfig::builder()
        .model(&cli.model)
        .provider_name(&cli.provider)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    if let Some(obs) = observer {
        builder = builder.observer(obs as Arc<dyn PipelineObserver>);
    }

    builder.build().context("Invalid configuration")
}

/// Export every completed profile into `dir`.
///
/// A profile that fails to export is recorded and skipped; a failed write
/// aborts the run.
async fn export_completed(
    controller: &PipelineController,
    dir: &Path,
    overwrite: bool,
) -> Result<ExportRun> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let mut used = HashSet::new();
    let mut run = ExportRun::default();
    for file in controller.snapshot() {
        if file.status != ProcessingStatus::Completed {
            continue;
        }
        let doc = match controller.export(file.id, &DocxExporter) {
            Ok(doc) => doc,
            Err(e) => {
                run.failed.push(ExportFailure {
                    file_name: file.file_name,
                    error: e.to_string(),
                });
                continue;
            }
        };
        let path = dir.join(unique_name(dir, &doc.file_name, &mut used, overwrite));
        write_atomic(&path, &doc.bytes).await?;
        run.written.push(path);
    }
    Ok(run)
}

/// `name`, or `stem (n).ext` if `name` was already written in this run or,
/// unless `overwrite` is set, already exists in `dir`.
fn unique_name(dir: &Path, name: &str, used: &mut HashSet<String>, overwrite: bool) -> String {
    let ext = DocxExporter.extension();
    let stem = name.strip_suffix(&format!(".{ext}")).unwrap_or(name);
    let taken = |candidate: &str, used: &HashSet<String>| {
        used.contains(candidate) || (!overwrite && dir.join(candidate).exists())
    };

    let mut candidate = name.to_string();
    let mut n = 2;
    while taken(&candidate, used) {
        candidate = format!("{stem} ({n}).{ext}");
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Write via a temp file in the same directory, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("docx.tmp");
    let written = match tokio::fs::write(&tmp, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if let Err(source) = written {
        // Never leave a partial document behind.
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(biocraft::BioCraftError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        }
        .into());
    }
    Ok(())
}
