//! Presentation: what the user sees once a request is over.
//!
//! A [`Presentation`] is built from scratch for every request and holds only
//! that request's results, so nothing from an earlier page can leak into a
//! later one. Regions are optional:
//!
//! | outcome            | markdown | raw preview | download | error |
//! |--------------------|----------|-------------|----------|-------|
//! | success            | yes      | yes         | yes      | no    |
//! | extraction failed  | no       | yes         | no       | yes   |
//! | render failed      | no       | no          | no       | yes   |
//! | invalid URL        | no       | no          | no       | yes   |

use crate::config::ScrapeConfig;
use crate::error::{ExtractionError, RenderError, ScrapeError};
use crate::output::{RenderedPage, ScrapeOutput, ScrapeStats};
use crate::progress::Stage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// MIME type of the downloadable file.
pub const MARKDOWN_MIME: &str = "text/markdown; charset=utf-8";

/// Message shown when the URL has no accepted scheme.
pub const INVALID_URL_MESSAGE: &str = "Please include http:// or https://";

/// The extracted Markdown, packaged as a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    pub file_name: String,
    pub mime: String,
    /// UTF-8 file body; always identical to the presented Markdown.
    #[serde(skip)]
    pub contents: String,
}

impl Download {
    pub fn markdown(file_name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: MARKDOWN_MIME.to_string(),
            contents: contents.into(),
        }
    }

    /// Write the file and return where it landed.
    ///
    /// `target` names a directory when it already is one, ends in a path
    /// separator, or does not exist and has no extension; the directory is
    /// created if needed and the file goes inside it under
    /// [`Download::file_name`]. Any other `target` is the file path itself.
    /// The write is atomic (temp file + rename), so an interrupted save never
    /// leaves a partial file.
    pub async fn save(&self, target: impl AsRef<Path>) -> Result<PathBuf, ScrapeError> {
        let target = target.as_ref();
        let path = if names_directory(target).await {
            target.join(&self.file_name)
        } else {
            target.to_path_buf()
        };

        let write_err = |e: std::io::Error| ScrapeError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = path.with_extension("md.tmp");
        tokio::fs::write(&tmp_path, self.contents.as_bytes())
            .await
            .map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(e));
        }

        debug!("Saved {} bytes to {}", self.contents.len(), path.display());
        Ok(path)
    }
}

async fn names_directory(target: &Path) -> bool {
    match tokio::fs::metadata(target).await {
        Ok(meta) => meta.is_dir(),
        Err(_) => {
            let trailing_separator = target
                .as_os_str()
                .to_string_lossy()
                .chars()
                .last()
                .is_some_and(std::path::is_separator);
            trailing_separator || target.extension().is_none()
        }
    }
}

/// The user-facing result of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    pub url: String,
    /// `Presenting` on success, otherwise the stage that failed.
    pub stage_reached: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<Download>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ScrapeStats>,
}

impl Presentation {
    fn failed(url: &str, stage: Stage, error: String) -> Self {
        Self {
            url: url.to_string(),
            stage_reached: stage,
            markdown: None,
            raw_preview: None,
            error: Some(error),
            download: None,
            stats: None,
        }
    }

    pub fn success(output: &ScrapeOutput, config: &ScrapeConfig) -> Self {
        let markdown = output.markdown().to_string();
        Self {
            url: output.page.url.clone(),
            stage_reached: Stage::Presenting,
            raw_preview: Some(raw_preview(&output.page.html, config.preview_chars)),
            download: Some(Download::markdown(
                config.download_file_name.clone(),
                markdown.clone(),
            )),
            markdown: Some(markdown),
            error: None,
            stats: Some(output.stats.clone()),
        }
    }

    pub fn invalid_url(url: &str) -> Self {
        Self::failed(url, Stage::Validating, INVALID_URL_MESSAGE.to_string())
    }

    pub fn render_failed(url: &str, error: &RenderError) -> Self {
        Self::failed(url, Stage::Rendering, ScrapeError::from(error.clone()).to_string())
    }

    /// The page rendered but the model call failed; the raw HTML preview is kept.
    pub fn extraction_failed(
        page: &RenderedPage,
        error: &ExtractionError,
        config: &ScrapeConfig,
    ) -> Self {
        let mut p = Self::failed(
            &page.url,
            Stage::Extracting,
            ScrapeError::from(error.clone()).to_string(),
        );
        p.raw_preview = Some(raw_preview(&page.html, config.preview_chars));
        p
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.markdown.is_some()
    }
}

/// First `limit` characters of `html`, with `...` appended when cut.
pub fn raw_preview(html: &str, limit: usize) -> String {
    match html.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}...", &html[..byte_idx]),
        None => html.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ExtractionResult;
    use chrono::Utc;

    fn page(html: &str) -> RenderedPage {
        RenderedPage {
            url: "https://example.com".into(),
            html: html.into(),
            captured_at: Utc::now(),
            render_ms: 5,
        }
    }

    fn output(html: &str, markdown: &str) -> ScrapeOutput {
        let page = page(html);
        let extraction = ExtractionResult {
            markdown: markdown.into(),
            model: "stub".into(),
            submitted_chars: html.chars().count(),
            truncated: false,
            input_tokens: 0,
            output_tokens: 0,
            extract_ms: 1,
        };
        let stats = ScrapeStats::from_stages(&page, &extraction, 6);
        ScrapeOutput {
            page,
            extraction,
            stats,
        }
    }

    #[test]
    fn preview_is_bounded_and_marked() {
        let html = "x".repeat(2_500);
        let p = raw_preview(&html, 2_000);
        assert_eq!(p.len(), 2_003);
        assert!(p.ends_with("..."));
        assert_eq!(raw_preview("<p>short</p>", 2_000), "<p>short</p>");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(raw_preview("ééé", 2), "éé...");
    }

    #[test]
    fn success_fills_every_region() {
        let config = ScrapeConfig::default();
        let p = Presentation::success(&output("<h1>Example</h1>", "# Example"), &config);
        assert!(p.is_success());
        assert_eq!(p.stage_reached, Stage::Presenting);
        assert_eq!(p.markdown.as_deref(), Some("# Example"));
        assert_eq!(p.raw_preview.as_deref(), Some("<h1>Example</h1>"));
        let d = p.download.unwrap();
        assert_eq!(d.file_name, "clean-article.md");
        assert_eq!(d.mime, MARKDOWN_MIME);
        assert_eq!(d.contents, "# Example");
    }

    #[test]
    fn render_failure_shows_only_the_error() {
        let e = RenderError::Timeout {
            url: "https://example.com".into(),
            secs: 60,
        };
        let p = Presentation::render_failed("https://example.com", &e);
        assert!(!p.is_success());
        assert!(p.markdown.is_none() && p.raw_preview.is_none() && p.download.is_none());
        assert!(p.error.unwrap().starts_with("Rendering failed"));
    }

    #[test]
    fn extraction_failure_keeps_raw_preview() {
        let e = ExtractionError::Auth {
            provider: "stub".into(),
            detail: "bad key".into(),
        };
        let p = Presentation::extraction_failed(&page("<p>Hi</p>"), &e, &ScrapeConfig::default());
        assert_eq!(p.stage_reached, Stage::Extracting);
        assert!(p.markdown.is_none());
        assert!(p.download.is_none());
        assert_eq!(p.raw_preview.as_deref(), Some("<p>Hi</p>"));
        assert!(p.error.unwrap().starts_with("AI extraction failed"));
    }

    #[test]
    fn invalid_url_message() {
        let p = Presentation::invalid_url("ftp://example.com");
        assert_eq!(p.error.as_deref(), Some(INVALID_URL_MESSAGE));
        assert_eq!(p.stage_reached, Stage::Validating);
    }

    #[test]
    fn json_omits_absent_regions_and_file_body() {
        let p = Presentation::success(&output("<p/>", "# T"), &ScrapeConfig::default());
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("error").is_none());
        assert!(json["download"].get("contents").is_none());
        assert_eq!(json["stage_reached"], "presenting");
    }

    #[tokio::test]
    async fn save_into_directory_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let d = Download::markdown("clean-article.md", "# Example\n\nHi");
        let path = d.save(dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("clean-article.md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Example\n\nHi");
        assert!(!dir.path().join("clean-article.md.tmp").exists());
    }

    #[tokio::test]
    async fn save_to_explicit_path_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.md");
        let path = Download::markdown("ignored.md", "body").save(&target).await.unwrap();
        assert_eq!(path, target);
        assert_eq!(std::fs::read_to_string(target).unwrap(), "body");
    }

    #[tokio::test]
    async fn save_creates_missing_directory_with_trailing_separator() {
        let dir = tempfile::tempdir().unwrap();
        let target = format!("{}/downloads/", dir.path().display());
        let path = Download::markdown("clean-article.md", "# A").save(&target).await.unwrap();
        assert_eq!(path, dir.path().join("downloads").join("clean-article.md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# A");
        assert!(!dir.path().join("downloads.md.tmp").exists());
    }

    #[tokio::test]
    async fn save_treats_missing_extensionless_target_as_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = Download::markdown("clean-article.md", "# B")
            .save(dir.path().join("out"))
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("out").join("clean-article.md"));
    }

    #[tokio::test]
    async fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory where the file should land makes the rename fail.
        std::fs::create_dir_all(dir.path().join("clean-article.md").join("inner")).unwrap();
        let err = Download::markdown("clean-article.md", "body")
            .save(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::OutputWriteFailed { .. }));
        assert!(!dir.path().join("clean-article.md.tmp").exists());
    }
}
