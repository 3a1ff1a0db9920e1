//! Interactive use: one request at a time, each ending in a [`Presentation`].
//!
//! [`ScrapeSession::submit`] takes `&mut self`, so a second request cannot
//! start while one is running. Each submit first discards the previous
//! presentation, then walks
//!
//! ```text
//! Idle → Validating → Rendering → Extracting → Presenting → Idle
//! ```
//!
//! and a failure in any of the first three stages goes straight back to
//! `Idle` with the error presented. Failures never end the session.

use crate::output::{ScrapeOutput, ScrapeStats};
use crate::pipeline::present::Presentation;
use crate::progress::Stage;
use crate::scrape::Scraper;
use std::time::Instant;
use tracing::debug;

/// A long-lived front end over one [`Scraper`].
#[derive(Debug)]
pub struct ScrapeSession {
    scraper: Scraper,
    state: Stage,
    last: Option<Presentation>,
}

impl ScrapeSession {
    pub fn new(scraper: Scraper) -> Self {
        Self {
            scraper,
            state: Stage::Idle,
            last: None,
        }
    }

    /// Current state; always [`Stage::Idle`] between submits.
    pub fn state(&self) -> Stage {
        self.state
    }

    /// The presentation of the most recent request, if any.
    pub fn last(&self) -> Option<&Presentation> {
        self.last.as_ref()
    }

    pub fn scraper(&self) -> &Scraper {
        &self.scraper
    }

    /// Run one request to completion and present it.
    pub async fn submit(&mut self, url: &str) -> &Presentation {
        self.last = None;
        let presentation = self.run(url).await;
        self.state = Stage::Idle;
        debug!("Request for {} ended at {}", url, presentation.stage_reached);

        if let Some(ref cb) = self.scraper.config().progress_callback {
            cb.on_request_complete(presentation.is_success());
        }
        self.last.insert(presentation)
    }

    async fn run(&mut self, url: &str) -> Presentation {
        let total_start = Instant::now();

        self.state = Stage::Validating;
        let url = match self.scraper.validate(url) {
            Ok(url) => url,
            Err(_) => return Presentation::invalid_url(url),
        };

        self.state = Stage::Rendering;
        let page = match self.scraper.render(url).await {
            Ok(page) => page,
            Err(e) => return Presentation::render_failed(url, &e),
        };

        self.state = Stage::Extracting;
        let extraction = match self.scraper.extract(&page).await {
            Ok(extraction) => extraction,
            Err(e) => {
                return Presentation::extraction_failed(&page, &e, self.scraper.config())
            }
        };

        self.state = Stage::Presenting;
        let present_start = Instant::now();
        self.scraper.stage_started(Stage::Presenting, url);
        let total_ms = total_start.elapsed().as_millis() as u64;
        let stats = ScrapeStats::from_stages(&page, &extraction, total_ms);
        let output = ScrapeOutput {
            page,
            extraction,
            stats,
        };
        let presentation = Presentation::success(&output, self.scraper.config());
        self.scraper.stage_completed(Stage::Presenting, present_start);
        presentation
    }
}
