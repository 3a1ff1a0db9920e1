//! CLI binary for edgequake-web2md.
//!
//! A thin shim over the library crate that maps CLI flags to `ScrapeConfig`,
//! runs requests through a `ScrapeSession` and prints each `Presentation`.
//! Markdown goes to stdout; status, errors and the raw preview go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_web2md::{
    Presentation, ProgressCallback, ScrapeConfig, ScrapeError, ScrapeProgressCallback,
    ScrapeSession, Scraper, Stage, WaitUntil,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "https://www.theverge.com";

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner per request, with a log line per finished stage.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn spinner() -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(ref bar) = *guard {
                f(bar);
            }
        }
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Idle => "Idle",
        Stage::Validating => "Validating",
        Stage::Rendering => "Rendering",
        Stage::Extracting => "Extracting",
        Stage::Presenting => "Presenting",
    }
}

impl ScrapeProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, url: &str) {
        if let Ok(mut guard) = self.bar.lock() {
            let bar = guard.get_or_insert_with(Self::spinner);
            bar.set_prefix(stage_label(stage));
            bar.set_message(match stage {
                Stage::Rendering => format!("{url}  (waiting for network idle…)"),
                Stage::Extracting => "asking the model for clean Markdown…".to_string(),
                _ => url.to_string(),
            });
        }
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.with_bar(|bar| {
            bar.println(format!(
                "  {} {:<11} {}",
                green("✓"),
                stage_label(stage),
                dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
            ));
        });
    }

    fn on_stage_failed(&self, stage: Stage, _error: &str) {
        self.with_bar(|bar| {
            bar.println(format!("  {} {}", red("✗"), stage_label(stage)));
        });
    }

    fn on_request_complete(&self, _success: bool) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scrape the default page to stdout
  web2md

  # Scrape an article and save it as clean-article.md in the current directory
  web2md https://example.com/post -o .

  # Also show the first 2,000 characters of the rendered HTML
  web2md https://example.com --raw

  # Serve one URL per line from stdin until EOF
  web2md --interactive -o downloads/

  # Use another edgequake-llm provider instead of Gemini
  web2md --provider openai --model gpt-4.1-mini https://example.com

  # JSON output (Presentation: markdown, raw_preview, error, stats)
  web2md --json https://example.com > page.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (required for the default backend)
  EDGEQUAKE_LLM_PROVIDER  Provider for the edgequake-llm backends
  EDGEQUAKE_MODEL         Model for the edgequake-llm backends
  OPENAI_API_KEY, ANTHROPIC_API_KEY, …  Keys read by the named provider
  CHROME                  Path to a Chrome/Chromium binary
  RUST_LOG                Overrides the log filter

SETUP:
  1. Install Chromium (or Google Chrome).
  2. Set API key:     export GEMINI_API_KEY=...
  3. Scrape:          web2md https://example.com
"#;

/// Render web pages in headless Chromium and extract clean Markdown with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "web2md",
    version,
    about = "Render web pages in headless Chromium and extract clean Markdown with an LLM",
    long_about = "Loads a page in a fresh headless Chromium, waits for the network to go idle, \
and sends the first 60,000 characters of the rendered HTML to Google Gemini (or any \
edgequake-llm provider) with an instruction to return only the main article as Markdown.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page URL; must start with http:// or https://.
    #[arg(default_value = DEFAULT_URL)]
    url: String,

    /// Save the Markdown to this file, or into this directory as --file-name.
    #[arg(short, long, env = "WEB2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// File name used when --output is a directory.
    #[arg(long, env = "WEB2MD_FILE_NAME", default_value = "clean-article.md")]
    file_name: String,

    /// Read one URL per line from stdin and scrape each in turn.
    #[arg(short, long)]
    interactive: bool,

    /// Output the presentation as JSON instead of Markdown.
    #[arg(long, env = "WEB2MD_JSON")]
    json: bool,

    /// Also print a preview of the raw rendered HTML.
    #[arg(long, env = "WEB2MD_RAW")]
    raw: bool,

    /// LLM model ID (default: gemini-1.5-flash).
    #[arg(long, env = "WEB2MD_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider: openai, anthropic, ollama, … (default: built-in Gemini).
    #[arg(long, env = "WEB2MD_PROVIDER")]
    provider: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini REST base URL.
    #[arg(long, env = "WEB2MD_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Maximum HTML characters sent to the model.
    #[arg(long, env = "WEB2MD_MAX_HTML_CHARS", default_value_t = 60_000,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_html_chars: u64,

    /// Characters of raw HTML shown with --raw.
    #[arg(long, env = "WEB2MD_PREVIEW_CHARS", default_value_t = 2_000)]
    preview_chars: usize,

    /// Navigation timeout in seconds (load + network idle).
    #[arg(long, env = "WEB2MD_NAVIGATION_TIMEOUT", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    navigation_timeout: u64,

    /// Extra wait after network idle, in milliseconds.
    #[arg(long, env = "WEB2MD_SETTLE_DELAY_MS", default_value_t = 3_000)]
    settle_delay_ms: u64,

    /// When navigation counts as finished.
    #[arg(long, env = "WEB2MD_WAIT_UNTIL", value_enum, default_value = "networkidle")]
    wait_until: WaitUntilArg,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,

    /// Chrome/Chromium executable (auto-detected if unset).
    #[arg(long, env = "CHROME")]
    chrome_executable: Option<PathBuf>,

    /// Extra browser flag, appended to the defaults (repeatable).
    #[arg(long = "browser-arg", allow_hyphen_values = true)]
    browser_args: Vec<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "WEB2MD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "WEB2MD_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max LLM output tokens.
    #[arg(long, env = "WEB2MD_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM call timeout in seconds.
    #[arg(long, env = "WEB2MD_API_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    api_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "WEB2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "WEB2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "WEB2MD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum WaitUntilArg {
    Load,
    #[value(name = "networkidle")]
    NetworkIdle,
}

impl From<WaitUntilArg> for WaitUntil {
    fn from(v: WaitUntilArg) -> Self {
        match v {
            WaitUntilArg::Load => WaitUntil::Load,
            WaitUntilArg::NetworkIdle => WaitUntil::NetworkIdle,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless -v was given.
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

    // ── Build scraper ────────────────────────────────────────────────────
    // Resolving the backend reads the API key; a missing key stops here,
    // before any page is requested.
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ScrapeProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let scraper = Scraper::new(config)
        .map_err(|e| {
            let hint = startup_hint(&e);
            anyhow::Error::new(e).context(hint)
        })
        .context("Start-up failed")?;
    if !cli.quiet && !cli.json {
        eprintln!("{} {}", cyan("◆"), dim(&format!("backend: {}", scraper.backend_name())));
    }
    let mut session = ScrapeSession::new(scraper);

    if cli.interactive {
        run_interactive(&cli, &mut session).await;
        return Ok(ExitCode::SUCCESS);
    }

    let presentation = session.submit(&cli.url).await;
    show(&cli, presentation).await?;
    Ok(if presentation.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Serve URLs from stdin until EOF. Failures are shown and the loop goes on.
async fn run_interactive(cli: &Cli, session: &mut ScrapeSession) {
    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Enter a URL per line (empty line: {DEFAULT_URL}; Ctrl-D to quit)"))
        );
    }

    let served = serve_lines(cli, session, read_stdin_lines()).await;
    tracing::debug!("Interactive session ended after {} requests", served);
}

/// Submit each line as one request; returns how many were served.
///
/// A failed save or write is reported like any other failure and the next
/// line is still served.
async fn serve_lines(
    cli: &Cli,
    session: &mut ScrapeSession,
    mut lines: tokio::sync::mpsc::UnboundedReceiver<String>,
) -> usize {
    let mut served = 0;
    while let Some(line) = lines.recv().await {
        let url = if line.is_empty() { DEFAULT_URL } else { line.as_str() };
        let presentation = session.submit(url).await;
        served += 1;
        if let Err(e) = show(cli, presentation).await {
            eprintln!("{} {}", red("✘"), red(&format!("{e:#}")));
        }
    }
    served
}

/// Forward stdin lines over a channel so the runtime is never blocked on a read.
fn read_stdin_lines() -> tokio::sync::mpsc::UnboundedReceiver<String> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line.trim_end_matches(['\r', '\n']).to_string()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Print one presentation: Markdown to stdout, everything else to stderr.
async fn show(cli: &Cli, p: &Presentation) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(p).context("Failed to serialise output")?;
        println!("{json}");
    } else if let Some(ref markdown) = p.markdown {
        if cli.output.is_none() {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(markdown.as_bytes())
                .context("Failed to write to stdout")?;
            // Ensure a trailing newline on stdout.
            if !markdown.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            handle.flush().ok();
        }
    }

    if let Some(ref error) = p.error {
        eprintln!("{} {}", red("✘"), red(error));
        if p.stage_reached == Stage::Rendering && error.contains("browser launch failed") {
            eprintln!("  {}", dim(LAUNCH_HINT));
        }
    }

    if cli.raw && !cli.json {
        if let Some(ref preview) = p.raw_preview {
            eprintln!("{}", bold("── Raw HTML preview ──"));
            eprintln!("{}", dim(preview));
        }
    }

    if let (Some(download), Some(ref target)) = (&p.download, &cli.output) {
        let path = download
            .save(target)
            .await
            .context("Failed to save Markdown")?;
        if !cli.quiet {
            eprintln!(
                "{}  {}  →  {}",
                green("✔"),
                download.mime,
                bold(&path.display().to_string())
            );
        }
    }

    if let (Some(stats), false) = (&p.stats, cli.quiet || cli.json) {
        eprintln!(
            "   {} of {} chars sent{}  /  {} tokens in  /  {} tokens out  —  {}ms total",
            dim(&stats.submitted_chars.to_string()),
            dim(&stats.html_chars.to_string()),
            if stats.truncated { " (truncated)" } else { "" },
            dim(&stats.input_tokens.to_string()),
            dim(&stats.output_tokens.to_string()),
            stats.total_duration_ms,
        );
    }
    Ok(())
}

const LAUNCH_HINT: &str = "Pass --chrome-executable (or set CHROME) to use a specific Chrome binary.";

/// Flag-level advice for a start-up failure.
fn startup_hint(e: &ScrapeError) -> String {
    match e {
        ScrapeError::MissingCredential { var } => {
            format!("Set {var} or pass --api-key, or choose another backend with --provider.")
        }
        ScrapeError::ProviderNotConfigured { provider, .. } => {
            format!("Check --provider {provider} and --model, and that provider's API key variable.")
        }
        _ => "Check the command-line options.".to_string(),
    }
}

/// Map CLI args to `ScrapeConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScrapeConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ScrapeConfig::builder()
        .max_html_chars(cli.max_html_chars as usize)
        .preview_chars(cli.preview_chars)
        .navigation_timeout_secs(cli.navigation_timeout)
        .settle_delay_ms(cli.settle_delay_ms)
        .wait_until(cli.wait_until.into())
        .headless(!cli.headed)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_file_name(cli.file_name.clone());

    for arg in &cli.browser_args {
        builder = builder.browser_arg(arg.clone());
    }
    if let Some(ref exe) = cli.chrome_executable {
        builder = builder.chrome_executable(exe.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref base) = cli.api_base_url {
        builder = builder.api_base_url(base.clone());
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
