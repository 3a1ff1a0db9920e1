//! Page rendering: launch a browser, navigate, settle, capture the DOM.
//!
//! The browser is reached through three small traits that mirror the
//! automation calls the pipeline needs:
//!
//! ```text
//! BrowserLauncher::launch(options)      → BrowserSession
//! BrowserSession::new_page()            → PageHandle
//! PageHandle::goto(url, wait_until, t)
//! PageHandle::wait_fixed_delay(d)
//! PageHandle::content()                 → HTML
//! BrowserSession::close()
//! ```
//!
//! [`render_page`] owns the lifecycle. Once `launch` succeeds, `close` is
//! called exactly once on every path, including navigation failure, so a
//! failed request never leaves a browser process behind. The Chromium
//! implementation lives in [`crate::pipeline::chromium`]; tests plug in
//! in-memory fakes.

use crate::config::{ScrapeConfig, WaitUntil};
use crate::error::RenderError;
use crate::output::RenderedPage;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything a launcher needs to start one browser process.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub args: Vec<String>,
    pub executable: Option<PathBuf>,
    /// Upper bound for any single protocol request to the browser.
    pub request_timeout: Duration,
}

impl LaunchOptions {
    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self {
            headless: config.headless,
            args: config.browser_args.clone(),
            executable: config.chrome_executable.clone(),
            request_timeout: Duration::from_secs(config.navigation_timeout_secs),
        }
    }
}

/// Starts browser processes.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, RenderError>;
}

/// One running browser process.
#[async_trait]
pub trait BrowserSession: Send {
    async fn new_page(&mut self) -> Result<Box<dyn PageHandle>, RenderError>;

    /// Terminate the process. Must be safe to call more than once.
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// One tab inside a [`BrowserSession`].
#[async_trait]
pub trait PageHandle: Send {
    /// Navigate and wait until `wait_until` holds, failing with
    /// [`RenderError::Timeout`] once `timeout` has elapsed.
    async fn goto(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), RenderError>;

    async fn wait_fixed_delay(&mut self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    /// Serialise the current DOM.
    async fn content(&mut self) -> Result<String, RenderError>;
}

/// Render `url` with a freshly launched browser and return its HTML.
///
/// The caller is expected to have validated the URL already.
pub async fn render_page(
    launcher: &dyn BrowserLauncher,
    url: &str,
    config: &ScrapeConfig,
) -> Result<RenderedPage, RenderError> {
    let start = Instant::now();
    let options = LaunchOptions::from_config(config);

    info!("Launching browser for {}", url);
    let mut browser = launcher.launch(&options).await?;

    let captured = capture(browser.as_mut(), url, config).await;

    if let Err(e) = browser.close().await {
        warn!("Browser release reported an error: {}", e);
    }
    drop(browser);

    let html = captured?;
    let render_ms = start.elapsed().as_millis() as u64;
    info!("Rendered {} ({} bytes) in {}ms", url, html.len(), render_ms);

    Ok(RenderedPage {
        url: url.to_string(),
        html,
        captured_at: Utc::now(),
        render_ms,
    })
}

async fn capture(
    browser: &mut dyn BrowserSession,
    url: &str,
    config: &ScrapeConfig,
) -> Result<String, RenderError> {
    let mut page = browser.new_page().await?;

    let timeout = Duration::from_secs(config.navigation_timeout_secs);
    debug!("Navigating to {} (wait_until={}, timeout={:?})", url, config.wait_until, timeout);
    page.goto(url, config.wait_until, timeout).await?;

    if config.settle_delay_ms > 0 {
        debug!("Settling for {}ms", config.settle_delay_ms);
        page.wait_fixed_delay(Duration::from_millis(config.settle_delay_ms))
            .await;
    }

    page.content().await
}
