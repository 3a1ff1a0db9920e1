//! Chromium implementation of the rendering traits, via `chromiumoxide`.
//!
//! Each [`ChromiumLauncher::launch`] starts a new Chromium process and a
//! task that pumps its DevTools event handler. Closing the session shuts the
//! browser down, waits a few seconds for the process to exit and stops the
//! handler task; if the graceful close fails, or the process does not exit
//! in time, it is killed. Dropping an unclosed session also kills the
//! process (chromiumoxide's `Browser` does this on drop), so a panic
//! mid-render cannot leak it either.
//!
//! ## Network idle
//!
//! Chromium reports page lifecycle events per frame and per loader. A
//! navigation is idle once the *main frame* emits `networkIdle` for the
//! loader its `init` event announced, i.e. no requests for 500 ms after the
//! new document started. Lifecycle events of `about:blank` or of iframes are
//! ignored.

use crate::config::WaitUntil;
use crate::error::RenderError;
use crate::pipeline::render::{BrowserLauncher, BrowserSession, LaunchOptions, PageHandle};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long a browser that accepted `close` may take to exit before it is killed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Launches a local Chromium for every request.
#[derive(Debug, Default, Clone)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, RenderError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(options.request_timeout)
            .args(options.args.iter().cloned());
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(ref exe) = options.executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder
            .build()
            .map_err(|detail| RenderError::Launch { detail })?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch {
                detail: e.to_string(),
            })?;

        // The handler must be polled for any browser command to complete.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        debug!("Chromium launched (headless={})", options.headless);
        Ok(Box::new(ChromiumSession {
            browser,
            handler,
            closed: false,
        }))
    }
}

/// A running Chromium process.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&mut self) -> Result<Box<dyn PageHandle>, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::PageOpen {
                detail: e.to_string(),
            })?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = match self.browser.close().await {
            Ok(_) => match wait_for_exit(self.browser.wait(), EXIT_GRACE).await {
                ExitWait::Exited => Ok(()),
                ExitWait::Failed(e) => {
                    warn!("Waiting for browser exit failed: {}", e);
                    Ok(())
                }
                ExitWait::TimedOut => {
                    warn!("Browser did not exit within {:?}, killing process", EXIT_GRACE);
                    self.kill_process("exit wait timed out").await
                }
            },
            Err(e) => {
                warn!("Graceful browser close failed, killing process: {}", e);
                self.kill_process(&format!("close: {e}")).await
            }
        };

        self.handler.abort();
        debug!("Chromium closed");
        result
    }
}

impl ChromiumSession {
    async fn kill_process(&mut self, reason: &str) -> Result<(), RenderError> {
        match self.browser.kill().await {
            Some(Err(kill_err)) => Err(RenderError::Release {
                detail: format!("{reason}; kill: {kill_err}"),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
enum ExitWait {
    Exited,
    Failed(std::io::Error),
    TimedOut,
}

async fn wait_for_exit<F>(exit: F, grace: Duration) -> ExitWait
where
    F: Future<Output = std::io::Result<Option<ExitStatus>>>,
{
    match tokio::time::timeout(grace, exit).await {
        Ok(Ok(_)) => ExitWait::Exited,
        Ok(Err(e)) => ExitWait::Failed(e),
        Err(_) => ExitWait::TimedOut,
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Browser session dropped without close; process will be killed");
            self.handler.abort();
        }
    }
}

/// A Chromium tab.
pub struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn goto(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), RenderError> {
        let page = &self.page;
        let navigation = async {
            page.execute(SetLifecycleEventsEnabledParams::new(true))
                .await
                .map_err(|e| navigation_error(url, timeout, e))?;
            let events = page
                .event_listener::<EventLifecycleEvent>()
                .await
                .map_err(|e| navigation_error(url, timeout, e))?;
            let main_frame = page
                .mainframe()
                .await
                .map_err(|e| navigation_error(url, timeout, e))?;

            page.goto(url)
                .await
                .map_err(|e| navigation_error(url, timeout, e))?;

            if wait_until == WaitUntil::NetworkIdle {
                let main_frame = main_frame.map(|frame| {
                    let id: &str = frame.as_ref();
                    id.to_string()
                });
                wait_for_network_idle(events, IdleTracker::new(main_frame)).await;
            }
            Ok(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.page
            .content()
            .await
            .map_err(|e| RenderError::Capture {
                detail: e.to_string(),
            })
    }
}

fn navigation_error(url: &str, timeout: Duration, e: CdpError) -> RenderError {
    match e {
        CdpError::Timeout => RenderError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        },
        other => RenderError::Navigation {
            url: url.to_string(),
            detail: other.to_string(),
        },
    }
}

async fn wait_for_network_idle<S>(events: S, mut tracker: IdleTracker)
where
    S: Stream<Item = Arc<EventLifecycleEvent>>,
{
    futures::pin_mut!(events);
    while let Some(event) = events.next().await {
        if tracker.observe(event.frame_id.as_ref(), event.loader_id.as_ref(), &event.name) {
            debug!("Network idle");
            return;
        }
    }
    debug!("Lifecycle stream ended before network idle");
}

/// Decides when a navigation's network has gone quiet.
#[derive(Debug, Default)]
struct IdleTracker {
    main_frame: Option<String>,
    loader: Option<String>,
}

impl IdleTracker {
    fn new(main_frame: Option<String>) -> Self {
        Self {
            main_frame,
            loader: None,
        }
    }

    /// Feed one lifecycle event; returns true once the navigated document is idle.
    fn observe(&mut self, frame_id: &str, loader_id: &str, name: &str) -> bool {
        if let Some(ref main) = self.main_frame {
            if main != frame_id {
                return false;
            }
        }
        match name {
            "init" => {
                self.loader = Some(loader_id.to_string());
                false
            }
            "networkIdle" => self.loader.as_deref() == Some(loader_id),
            _ => false,
        }
    }
}
