//! # edgequake-web2md
//!
//! Render a web page in headless Chromium and let a language model extract
//! the main article as clean Markdown.
//!
//! ## Why this crate?
//!
//! Modern pages are assembled by JavaScript; fetching the HTML over plain
//! HTTP often returns an empty shell. Rule-based readability extractors then
//! guess at what the article is. This crate lets a real browser finish the
//! page first, then hands the rendered DOM to a model that strips navigation,
//! ads and boilerplate and keeps the article's structure.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Validate  literal http:// or https:// prefix
//!  ├─ 2. Render    fresh Chromium, network idle + settle delay, DOM capture
//!  ├─ 3. Extract   first 60 000 chars of HTML → Gemini / any edgequake-llm provider
//!  └─ 4. Present   Markdown, raw HTML preview, clean-article.md download
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_web2md::{ScrapeConfig, Scraper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // The Gemini key is read from GEMINI_API_KEY here, once.
//!     let scraper = Scraper::new(ScrapeConfig::default())?;
//!     let output = scraper.scrape("https://example.com").await?;
//!     println!("{}", output.markdown());
//!     eprintln!("{} of {} chars sent",
//!         output.stats.submitted_chars,
//!         output.stats.html_chars);
//!     Ok(())
//! }
//! ```
//!
//! For a long-running front end that serves one request after another and
//! always ends in something displayable, use [`ScrapeSession`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `web2md` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-web2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scrape;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ScrapeConfig, ScrapeConfigBuilder, WaitUntil};
pub use error::{ExtractionError, RenderError, ScrapeError};
pub use output::{ExtractionResult, RenderedPage, ScrapeOutput, ScrapeStats};
pub use pipeline::extract::{truncate_html, Generation, TextGenerator};
pub use pipeline::present::{raw_preview, Download, Presentation};
pub use pipeline::render::{BrowserLauncher, BrowserSession, LaunchOptions, PageHandle};
pub use pipeline::validate::validate_url;
pub use progress::{NoopProgressCallback, ProgressCallback, ScrapeProgressCallback, Stage};
pub use scrape::Scraper;
pub use session::ScrapeSession;
