//! Progress-callback trait for per-stage scrape events.
//!
//! Inject an [`Arc<dyn ScrapeProgressCallback>`] via
//! [`crate::config::ScrapeConfigBuilder::progress_callback`] to be told when
//! each stage of a request starts, finishes or fails. The CLI uses it to drive
//! its spinner; a server could forward the events to a WebSocket instead.
//!
//! # Example
//!
//! ```rust
//! use edgequake_web2md::{ScrapeProgressCallback, ScrapeConfig, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ScrapeProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ScrapeConfig::builder()
//!     .progress_callback(counter as Arc<dyn ScrapeProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The states of one scrape request.
///
/// `Idle → Validating → Rendering → Extracting → Presenting → Idle`; a failure
/// in `Validating`, `Rendering` or `Extracting` goes straight back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Validating,
    Rendering,
    Extracting,
    Presenting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::Validating => "validating",
            Stage::Rendering => "rendering",
            Stage::Extracting => "extracting",
            Stage::Presenting => "presenting",
        };
        f.write_str(s)
    }
}

/// Called by the pipeline as a request moves through its stages.
///
/// Requests never overlap, so calls for one request are strictly ordered.
/// All methods default to no-ops.
pub trait ScrapeProgressCallback: Send + Sync {
    /// A stage is about to run for `url`.
    fn on_stage_start(&self, stage: Stage, url: &str) {
        let _ = (stage, url);
    }

    /// A stage finished successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// A stage failed; the request is over.
    fn on_stage_failed(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// The request has been presented (successfully or not) and the
    /// pipeline is idle again.
    fn on_request_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScrapeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScrapeConfig`].
pub type ProgressCallback = Arc<dyn ScrapeProgressCallback>;
