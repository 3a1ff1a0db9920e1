//! The [`Scraper`]: one configured pipeline, reused for every request.
//!
//! Building a scraper resolves the model backend (and so the credential)
//! once; a missing key fails here rather than in the middle of a request.
//! Each call to [`Scraper::scrape`] then runs validate → render → extract to
//! completion with a fresh browser process. Nothing is cached between calls.

use crate::config::ScrapeConfig;
use crate::error::{ExtractionError, RenderError, ScrapeError};
use crate::output::{ExtractionResult, RenderedPage, ScrapeOutput, ScrapeStats};
use crate::pipeline::chromium::ChromiumLauncher;
use crate::pipeline::extract::{extract_markdown, TextGenerator};
use crate::pipeline::present::Download;
use crate::pipeline::provider::resolve_generator;
use crate::pipeline::render::{render_page, BrowserLauncher};
use crate::pipeline::validate::validate_url;
use crate::progress::Stage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A configured scrape pipeline.
///
/// # Example
/// ```rust,no_run
/// use edgequake_web2md::{ScrapeConfig, Scraper};
///
/// # async fn run() -> Result<(), edgequake_web2md::ScrapeError> {
/// let scraper = Scraper::new(ScrapeConfig::default())?; // reads GEMINI_API_KEY
/// let output = scraper.scrape("https://example.com").await?;
/// println!("{}", output.markdown());
/// # Ok(())
/// # }
/// ```
pub struct Scraper {
    config: ScrapeConfig,
    launcher: Arc<dyn BrowserLauncher>,
    generator: Arc<dyn TextGenerator>,
}

impl fmt::Debug for Scraper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scraper")
            .field("config", &self.config)
            .field("generator", &self.generator.name())
            .finish_non_exhaustive()
    }
}

impl Scraper {
    /// Local Chromium plus the backend selected by `config`.
    pub fn new(config: ScrapeConfig) -> Result<Self, ScrapeError> {
        let generator = resolve_generator(&config)?;
        Ok(Self::with_components(
            config,
            Arc::new(ChromiumLauncher::new()),
            generator,
        ))
    }

    /// Explicit browser and model implementations.
    pub fn with_components(
        config: ScrapeConfig,
        launcher: Arc<dyn BrowserLauncher>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            config,
            launcher,
            generator,
        }
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Label of the model backend, e.g. "gemini/gemini-1.5-flash".
    pub fn backend_name(&self) -> String {
        self.generator.name()
    }

    // ── Stages ───────────────────────────────────────────────────────────

    /// Stage 1: reject anything that is not an `http://` or `https://` URL.
    pub fn validate<'a>(&self, url: &'a str) -> Result<&'a str, ScrapeError> {
        self.stage_started(Stage::Validating, url);
        let start = Instant::now();
        match validate_url(url) {
            Ok(url) => {
                self.stage_completed(Stage::Validating, start);
                Ok(url)
            }
            Err(e) => {
                warn!("Rejected URL {:?}", url);
                self.stage_failed(Stage::Validating, &e.to_string());
                Err(e)
            }
        }
    }

    /// Stage 2: render an already-validated URL.
    pub async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        self.stage_started(Stage::Rendering, url);
        let start = Instant::now();
        match render_page(self.launcher.as_ref(), url, &self.config).await {
            Ok(page) => {
                self.stage_completed(Stage::Rendering, start);
                Ok(page)
            }
            Err(e) => {
                self.stage_failed(Stage::Rendering, &e.to_string());
                Err(e)
            }
        }
    }

    /// Stage 3: ask the model for the article Markdown.
    pub async fn extract(&self, page: &RenderedPage) -> Result<ExtractionResult, ExtractionError> {
        self.stage_started(Stage::Extracting, &page.url);
        let start = Instant::now();
        match extract_markdown(self.generator.as_ref(), page, &self.config).await {
            Ok(result) => {
                self.stage_completed(Stage::Extracting, start);
                Ok(result)
            }
            Err(e) => {
                self.stage_failed(Stage::Extracting, &e.to_string());
                Err(e)
            }
        }
    }

    // ── Entry points ─────────────────────────────────────────────────────

    /// Run all stages for `url`.
    ///
    /// # Errors
    /// - [`ScrapeError::InvalidUrl`]: nothing was launched or sent
    /// - [`ScrapeError::Render`]: the browser has already been released
    /// - [`ScrapeError::Extraction`]: the model call failed
    pub async fn scrape(&self, url: &str) -> Result<ScrapeOutput, ScrapeError> {
        let result = self.run_stages(url).await;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_request_complete(result.is_ok());
        }
        result
    }

    pub(crate) async fn run_stages(&self, url: &str) -> Result<ScrapeOutput, ScrapeError> {
        let total_start = Instant::now();
        info!("Scraping {}", url);
        let url = self.validate(url)?;
        let page = self.render(url).await?;
        let extraction = self.extract(&page).await?;

        let total_ms = total_start.elapsed().as_millis() as u64;
        let stats = ScrapeStats::from_stages(&page, &extraction, total_ms);
        info!(
            "Scraped {} in {}ms ({} of {} chars sent)",
            url, total_ms, stats.submitted_chars, stats.html_chars
        );
        Ok(ScrapeOutput {
            page,
            extraction,
            stats,
        })
    }

    /// Scrape and write the Markdown to `output_path` (a file, or a
    /// directory that receives the configured download file name).
    pub async fn scrape_to_file(
        &self,
        url: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<(PathBuf, ScrapeStats), ScrapeError> {
        let output = self.scrape(url).await?;
        let download = Download::markdown(
            self.config.download_file_name.clone(),
            output.extraction.markdown,
        );
        let path = download.save(output_path).await?;
        Ok((path, output.stats))
    }

    /// Synchronous wrapper around [`Scraper::scrape`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from
    /// inside an async context.
    pub fn scrape_sync(&self, url: &str) -> Result<ScrapeOutput, ScrapeError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ScrapeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.scrape(url))
    }

    // ── Progress plumbing ────────────────────────────────────────────────

    pub(crate) fn stage_started(&self, stage: Stage, url: &str) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage, url);
        }
    }

    pub(crate) fn stage_completed(&self, stage: Stage, start: Instant) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage, start.elapsed().as_millis() as u64);
        }
    }

    fn stage_failed(&self, stage: Stage, error: &str) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_failed(stage, error);
        }
    }
}
