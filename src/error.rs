//! Error types for the edgequake-web2md library.
//!
//! Three error types follow the three places a scrape can stop:
//!
//! * [`RenderError`]: the browser could not be launched, the page could not
//!   be reached, or navigation did not settle before the timeout.
//!
//! * [`ExtractionError`]: the language model call failed (credential,
//!   quota, network, blocked or empty output).
//!
//! * [`ScrapeError`]: everything a caller of the top-level entry points can
//!   see, including input validation, start-up configuration problems, and
//!   the two stage errors above wrapped via `From`.
//!
//! Stage errors are kept separate so the session layer can tell *where* a
//! request stopped and still show what the earlier stages produced.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the top-level edgequake-web2md API.
#[derive(Debug, Error)]
pub enum ScrapeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The URL does not start with `http://` or `https://`.
    #[error("Invalid URL '{input}': please include http:// or https://")]
    InvalidUrl { input: String },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// The browser stage failed; no extraction was attempted.
    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    /// The model stage failed.
    #[error("AI extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    // ── Start-up errors ───────────────────────────────────────────────────
    /// The model API key is missing from both the config and the environment.
    #[error("Missing API key: set {var} or provide a key in the configuration.\nThe key is read once at start-up.")]
    MissingCredential { var: String },

    /// The configured edgequake-llm provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the downloaded Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of the browser stage.
///
/// Every variant is produced *after* the browser has been released (or was
/// never launched), so callers never need to clean anything up themselves.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RenderError {
    /// The browser process could not be started.
    #[error("browser launch failed: {detail}\nInstall Chromium or configure the path to a Chrome binary.")]
    Launch { detail: String },

    /// Opening a new tab failed.
    #[error("could not open a page: {detail}")]
    PageOpen { detail: String },

    /// DNS, connection, TLS or protocol failure while navigating.
    #[error("navigation to '{url}' failed: {detail}")]
    Navigation { url: String, detail: String },

    /// Navigation plus the idle wait did not finish in time.
    #[error("navigation to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The DOM could not be serialised.
    #[error("could not capture page content: {detail}")]
    Capture { detail: String },

    /// Neither a graceful close nor a kill terminated the browser.
    #[error("browser process could not be terminated: {detail}")]
    Release { detail: String },
}

/// Failures of the model stage.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// 401/403 or an invalid key reported by the API.
    #[error("authentication error from '{provider}': {detail}")]
    Auth { provider: String, detail: String },

    /// 429 / quota exhausted.
    #[error("rate limit or quota exceeded for '{provider}': {detail}")]
    RateLimited { provider: String, detail: String },

    /// The request never reached the API or the connection dropped.
    #[error("network error talking to '{provider}': {detail}")]
    Network { provider: String, detail: String },

    /// The API did not answer within the configured timeout.
    #[error("'{provider}' did not respond within {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// The model refused the prompt (safety filter, blocked content).
    #[error("'{provider}' blocked the request: {reason}")]
    Blocked { provider: String, reason: String },

    /// Any other non-success API answer.
    #[error("'{provider}' API error{}: {message}", http_status_suffix(.status))]
    Api {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("unreadable response from '{provider}': {detail}")]
    InvalidResponse { provider: String, detail: String },

    /// The model answered with no usable text.
    #[error("'{provider}' returned an empty response")]
    EmptyResponse { provider: String },
}

fn http_status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}
