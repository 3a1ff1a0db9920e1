//! Configuration types for scraping a web page to Markdown.
//!
//! Every knob of the pipeline lives in [`ScrapeConfig`], built via its
//! [`ScrapeConfigBuilder`]. The config is created once at start-up and passed
//! by reference into each stage; nothing in the library reads process-wide
//! mutable state once a [`crate::Scraper`] has been built.

use crate::error::ScrapeError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable holding the Gemini API key.
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Default Gemini REST endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for the built-in Gemini client.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Default model when an edgequake-llm provider is named without a model.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

/// Default model call timeout in seconds.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 120;

/// Default file name offered by the download action.
pub const DEFAULT_DOWNLOAD_NAME: &str = "clean-article.md";

/// Chromium flags for hosts where the setuid sandbox, a GPU and a large
/// `/dev/shm` are unavailable (containers, PaaS dynos).
pub const DEFAULT_BROWSER_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-gpu",
    "--single-process",
    "--disable-dev-shm-usage",
    "--no-zygote",
];

/// Configuration for a scrape.
///
/// Built via [`ScrapeConfig::builder()`] or using [`ScrapeConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_web2md::ScrapeConfig;
///
/// let config = ScrapeConfig::builder()
///     .max_html_chars(30_000)
///     .navigation_timeout_secs(30)
///     .api_key("test-key")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_html_chars, 30_000);
/// ```
#[derive(Clone)]
pub struct ScrapeConfig {
    /// Maximum number of HTML characters forwarded to the model. Default: 60 000.
    ///
    /// A hard cost bound, not a semantic boundary: whatever lies past the
    /// cutoff is dropped and never sent.
    pub max_html_chars: usize,

    /// Characters of raw HTML shown in the preview region. Default: 2 000.
    pub preview_chars: usize,

    /// Navigation timeout in seconds, covering both the page load and the
    /// network-idle wait. Default: 60.
    pub navigation_timeout_secs: u64,

    /// Extra wait after the page is idle, for lazy-loaded content. Default: 3 000 ms.
    pub settle_delay_ms: u64,

    /// When navigation counts as finished. Default: [`WaitUntil::NetworkIdle`].
    pub wait_until: WaitUntil,

    /// Run the browser without a window. Default: true.
    pub headless: bool,

    /// Extra command-line flags for the browser. Default: [`DEFAULT_BROWSER_ARGS`].
    pub browser_args: Vec<String>,

    /// Explicit Chrome/Chromium binary. If None, the browser is auto-detected.
    pub chrome_executable: Option<PathBuf>,

    /// LLM model identifier. If None, the backend default is used
    /// ([`DEFAULT_GEMINI_MODEL`] or [`DEFAULT_PROVIDER_MODEL`]).
    pub model: Option<String>,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    /// None or "gemini" selects the built-in Gemini client.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over everything else.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Gemini API key. If None, [`GEMINI_API_KEY_VAR`] is read when the
    /// scraper is built.
    pub api_key: Option<String>,

    /// Base URL of the Gemini REST API. Default: [`GEMINI_BASE_URL`].
    pub api_base_url: String,

    /// Sampling temperature. If None, the model default applies.
    pub temperature: Option<f32>,

    /// Maximum tokens the model may generate. Default: 8192.
    pub max_tokens: Option<usize>,

    /// Model call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom extraction instruction. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// File name offered by the download action. Default: [`DEFAULT_DOWNLOAD_NAME`].
    pub download_file_name: String,

    /// Optional stage-progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_html_chars: 60_000,
            preview_chars: 2_000,
            navigation_timeout_secs: 60,
            settle_delay_ms: 3_000,
            wait_until: WaitUntil::default(),
            headless: true,
            browser_args: DEFAULT_BROWSER_ARGS.iter().map(|s| s.to_string()).collect(),
            chrome_executable: None,
            model: None,
            provider_name: None,
            provider: None,
            api_key: None,
            api_base_url: GEMINI_BASE_URL.to_string(),
            temperature: None,
            max_tokens: Some(8192),
            api_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            system_prompt: None,
            download_file_name: DEFAULT_DOWNLOAD_NAME.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScrapeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeConfig")
            .field("max_html_chars", &self.max_html_chars)
            .field("preview_chars", &self.preview_chars)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("wait_until", &self.wait_until)
            .field("headless", &self.headless)
            .field("browser_args", &self.browser_args)
            .field("chrome_executable", &self.chrome_executable)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_file_name", &self.download_file_name)
            .finish()
    }
}

impl ScrapeConfig {
    /// Create a new builder for `ScrapeConfig`.
    pub fn builder() -> ScrapeConfigBuilder {
        ScrapeConfigBuilder {
            config: Self::default(),
        }
    }

    /// True when the built-in Gemini client should serve extraction.
    pub fn uses_builtin_gemini(&self) -> bool {
        self.provider.is_none()
            && self
                .provider_name
                .as_deref()
                .map_or(true, |name| name.eq_ignore_ascii_case("gemini"))
    }
}

/// Builder for [`ScrapeConfig`].
pub struct ScrapeConfigBuilder {
    config: ScrapeConfig,
}

impl fmt::Debug for ScrapeConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ScrapeConfigBuilder {
    pub fn max_html_chars(mut self, n: usize) -> Self {
        self.config.max_html_chars = n;
        self
    }

    pub fn preview_chars(mut self, n: usize) -> Self {
        self.config.preview_chars = n;
        self
    }

    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.navigation_timeout_secs = secs;
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms;
        self
    }

    pub fn wait_until(mut self, wait: WaitUntil) -> Self {
        self.config.wait_until = wait;
        self
    }

    pub fn headless(mut self, v: bool) -> Self {
        self.config.headless = v;
        self
    }

    /// Replace the browser flags entirely.
    pub fn browser_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.browser_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Append one flag to the defaults.
    pub fn browser_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.browser_args.push(arg.into());
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_executable = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.download_file_name = name.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScrapeConfig, ScrapeError> {
        let c = &self.config;
        if c.max_html_chars == 0 {
            return Err(ScrapeError::InvalidConfig(
                "max_html_chars must be ≥ 1".into(),
            ));
        }
        if c.navigation_timeout_secs == 0 {
            return Err(ScrapeError::InvalidConfig(
                "navigation timeout must be ≥ 1s".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ScrapeError::InvalidConfig(
                "API timeout must be ≥ 1s".into(),
            ));
        }
        if c.download_file_name.trim().is_empty()
            || c.download_file_name.contains(['/', '\\'])
        {
            return Err(ScrapeError::InvalidConfig(format!(
                "download file name must be a plain file name, got '{}'",
                c.download_file_name
            )));
        }
        if c.api_base_url.trim().is_empty() {
            return Err(ScrapeError::InvalidConfig("API base URL is empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// When a navigation is considered finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// The `load` event fired.
    Load,
    /// No network connections for a short quiescence window after load. (default)
    #[default]
    NetworkIdle,
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitUntil::Load => f.write_str("load"),
            WaitUntil::NetworkIdle => f.write_str("networkidle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ScrapeConfig::default();
        assert_eq!(c.max_html_chars, 60_000);
        assert_eq!(c.preview_chars, 2_000);
        assert_eq!(c.navigation_timeout_secs, 60);
        assert_eq!(c.settle_delay_ms, 3_000);
        assert_eq!(c.wait_until, WaitUntil::NetworkIdle);
        assert!(c.headless);
        assert!(c.browser_args.iter().any(|a| a == "--no-sandbox"));
        assert_eq!(c.download_file_name, "clean-article.md");
        assert!(c.uses_builtin_gemini());
    }

    #[test]
    fn zero_html_cap_is_rejected() {
        let err = ScrapeConfig::builder().max_html_chars(0).build().unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidConfig(_)));
    }

    #[test]
    fn zero_navigation_timeout_is_rejected() {
        let err = ScrapeConfig::builder()
            .navigation_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("navigation timeout"));
    }

    #[test]
    fn download_name_with_path_is_rejected() {
        let err = ScrapeConfig::builder()
            .download_file_name("../etc/passwd")
            .build()
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidConfig(_)));
    }

    #[test]
    fn browser_arg_appends_to_defaults() {
        let c = ScrapeConfig::builder()
            .browser_arg("--lang=en-US")
            .build()
            .unwrap();
        assert_eq!(c.browser_args.len(), DEFAULT_BROWSER_ARGS.len() + 1);
        assert_eq!(c.browser_args.last().map(String::as_str), Some("--lang=en-US"));
    }

    #[test]
    fn named_provider_disables_builtin_gemini() {
        let c = ScrapeConfig::builder().provider_name("openai").build().unwrap();
        assert!(!c.uses_builtin_gemini());

        let c = ScrapeConfig::builder().provider_name("Gemini").build().unwrap();
        assert!(c.uses_builtin_gemini());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ScrapeConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = ScrapeConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, Some(2.0));
    }
}
