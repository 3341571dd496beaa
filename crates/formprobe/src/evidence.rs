//! Evidence capture.
//!
//! After every step the executor asks an [`EvidenceCapture`] for a
//! screenshot. Evidence is diagnostic only: failures are logged and never
//! change a step outcome.

use crate::driver::{CaptureTarget, PageDriver};
use crate::locator::{LocatorChain, LocatorResolver, LocatorStrategy};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default output directory for evidence files
pub const DEFAULT_EVIDENCE_DIR: &str = "test_artifacts";

/// Timestamp format used in evidence file names
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Captures diagnostic artifacts from the page
#[async_trait]
pub trait EvidenceCapture: Send + Sync {
    /// Take a screenshot labelled `label`
    async fn capture(&self, label: &str, driver: &dyn PageDriver) -> Option<PathBuf>;

    /// Save the page HTML labelled `label`
    async fn capture_page_source(&self, label: &str, driver: &dyn PageDriver) -> Option<PathBuf>;
}

/// Evidence disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvidence;

#[async_trait]
impl EvidenceCapture for NoEvidence {
    async fn capture(&self, _label: &str, _driver: &dyn PageDriver) -> Option<PathBuf> {
        None
    }

    async fn capture_page_source(&self, _label: &str, _driver: &dyn PageDriver) -> Option<PathBuf> {
        None
    }
}

/// File evidence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Directory evidence files are written to
    pub output_dir: PathBuf,
    /// Capture a screenshot after each step
    pub screenshots: bool,
    /// Save the page source at the end of the run
    pub page_source: bool,
    /// Elements to screenshot instead of the full page, in priority order
    pub focus: Vec<LocatorStrategy>,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_EVIDENCE_DIR),
            screenshots: true,
            page_source: true,
            focus: Vec::new(),
        }
    }
}

impl EvidenceConfig {
    /// Write evidence under `dir`
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Prefer screenshots of the first element `focus` resolves to
    #[must_use]
    pub fn with_focus(mut self, focus: &LocatorChain) -> Self {
        self.focus = focus.strategies().to_vec();
        self
    }
}

/// Writes screenshots and page sources to a directory
///
/// The directory is created on first write.
#[derive(Debug, Clone)]
pub struct FileEvidence {
    config: EvidenceConfig,
    focus: Option<LocatorChain>,
    resolver: LocatorResolver,
}

impl FileEvidence {
    /// Create from settings
    #[must_use]
    pub fn new(config: EvidenceConfig) -> Self {
        let focus = (!config.focus.is_empty()).then(|| {
            config
                .focus
                .iter()
                .cloned()
                .fold(LocatorChain::new("evidence focus"), LocatorChain::then)
        });
        Self {
            config,
            focus,
            resolver: LocatorResolver::new(),
        }
    }

    /// Output directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    fn file_path(&self, label: &str, extension: &str) -> PathBuf {
        let stamp = Utc::now().format(TIMESTAMP_FORMAT);
        self.config
            .output_dir
            .join(format!("{}_{stamp}.{extension}", sanitize(label)))
    }

    async fn write(&self, path: PathBuf, bytes: &[u8]) -> Option<PathBuf> {
        if let Err(err) = tokio::fs::create_dir_all(&self.config.output_dir).await {
            warn!(dir = %self.config.output_dir.display(), %err, "cannot create evidence directory");
            return None;
        }
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => {
                debug!(path = %path.display(), "evidence written");
                Some(path)
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "cannot write evidence");
                None
            }
        }
    }

    async fn target(&self, driver: &dyn PageDriver) -> CaptureTarget {
        match &self.focus {
            Some(chain) => match self.resolver.resolve(chain, driver).await {
                Some(resolved) => CaptureTarget::Element(resolved.handle),
                None => CaptureTarget::FullPage,
            },
            None => CaptureTarget::FullPage,
        }
    }
}

#[async_trait]
impl EvidenceCapture for FileEvidence {
    async fn capture(&self, label: &str, driver: &dyn PageDriver) -> Option<PathBuf> {
        if !self.config.screenshots {
            return None;
        }
        let target = self.target(driver).await;
        let shot = match driver.screenshot(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if matches!(target, CaptureTarget::Element(_)) => {
                debug!(label, %err, "element screenshot failed, using full page");
                driver.screenshot(&CaptureTarget::FullPage).await
            }
            Err(err) => Err(err),
        };
        match shot {
            Ok(bytes) => self.write(self.file_path(label, "png"), &bytes).await,
            Err(err) => {
                warn!(label, %err, "screenshot failed");
                None
            }
        }
    }

    async fn capture_page_source(&self, label: &str, driver: &dyn PageDriver) -> Option<PathBuf> {
        if !self.config.page_source {
            return None;
        }
        match driver.page_source().await {
            Ok(html) => self.write(self.file_path(label, "html"), html.as_bytes()).await,
            Err(err) => {
                warn!(label, %err, "page source unavailable");
                None
            }
        }
    }
}

/// Make a label safe for use in a file name
fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "evidence".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement, MOCK_PNG};

    fn files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("step1_country state"), "step1_country_state");
        assert_eq!(sanitize("a/b"), "a_b");
        assert_eq!(sanitize(""), "evidence");
    }

    #[test]
    fn test_default_config() {
        let config = EvidenceConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("test_artifacts"));
        assert!(config.screenshots);
        assert!(config.focus.is_empty());
    }

    #[tokio::test]
    async fn test_no_evidence() {
        let driver = MockDriver::new();
        assert!(NoEvidence.capture("x", &driver).await.is_none());
        assert!(NoEvidence.capture_page_source("x", &driver).await.is_none());
        assert!(driver.call_history().is_empty());
    }

    #[tokio::test]
    async fn test_directory_created_lazily() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("artifacts");
        let evidence = FileEvidence::new(EvidenceConfig::default().with_output_dir(&dir));
        assert!(!dir.exists());

        let driver = MockDriver::new();
        let path = evidence.capture("states_updated", &driver).await.unwrap();
        assert!(dir.exists());
        assert_eq!(std::fs::read(&path).unwrap(), MOCK_PNG);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("states_updated_"));
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_focus_element_preferred() {
        let tmp = tempfile::tempdir().unwrap();
        let focus = LocatorChain::new("form").css("form").css("body > div");
        let evidence = FileEvidence::new(
            EvidenceConfig::default()
                .with_output_dir(tmp.path())
                .with_focus(&focus),
        );
        let driver = MockDriver::new();
        driver.insert(LocatorStrategy::css("body > div"), MockElement::new("div"));

        assert!(evidence.capture("negative", &driver).await.is_some());
        assert!(driver.was_called("screenshot:css=body > div"));
        assert!(!driver.was_called("screenshot:full"));
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let tmp = tempfile::tempdir().unwrap();
        let evidence = FileEvidence::new(EvidenceConfig::default().with_output_dir(tmp.path()));
        let driver = MockDriver::new();
        driver.lose_session();
        assert!(evidence.capture("x", &driver).await.is_none());
        assert!(evidence.capture_page_source("x", &driver).await.is_none());
        assert!(files(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_page_source_written() {
        let tmp = tempfile::tempdir().unwrap();
        let evidence = FileEvidence::new(EvidenceConfig::default().with_output_dir(tmp.path()));
        let driver = MockDriver::new();
        driver.with_dom(|dom| dom.set_page_source("<html>ok</html>"));
        let path = evidence.capture_page_source("page_source", &driver).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html>ok</html>");
        let names = files(tmp.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("page_source_") && names[0].ends_with(".html"));
    }

    #[tokio::test]
    async fn test_disabled_screenshots() {
        let tmp = tempfile::tempdir().unwrap();
        let config = EvidenceConfig {
            screenshots: false,
            ..EvidenceConfig::default().with_output_dir(tmp.path())
        };
        let driver = MockDriver::new();
        assert!(FileEvidence::new(config).capture("x", &driver).await.is_none());
        assert_eq!(driver.call_count("screenshot"), 0);
    }
}
