//! Pipeline stages for web-page-to-Markdown scraping.
//!
//! Each submodule implements exactly one step. The browser and the model
//! sit behind traits ([`render::BrowserLauncher`], [`extract::TextGenerator`])
//! so each stage can be tested without Chromium or network access.
//!
//! ## Data Flow
//!
//! ```text
//! validate ──▶ render ──▶ extract ──▶ present
//!  (prefix)   (chromium)  (gemini /   (markdown, preview,
//!                          provider)   download)
//! ```
//!
//! 1. [`validate`]: literal `http://` / `https://` prefix check; nothing
//!    else runs if it fails
//! 2. [`render`]: launch a browser, wait for network idle plus a settle
//!    delay, capture the DOM; the browser is released on every path
//!    ([`chromium`] is the real implementation)
//! 3. [`extract`]: cut the HTML to the character cap and ask the model for
//!    Markdown ([`gemini`] built in, [`provider`] for edgequake-llm backends)
//! 4. [`present`]: assemble the per-request view and the download file

pub mod chromium;
pub mod extract;
pub mod gemini;
pub mod present;
pub mod provider;
pub mod render;
pub mod validate;
