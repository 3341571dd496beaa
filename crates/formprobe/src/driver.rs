//! PageDriver - Abstract Browser Facade
//!
//! The observation engine never talks to a browser directly. Everything it
//! needs from the live page goes through [`PageDriver`], which allows swapping
//! implementations:
//!
//! - `CdpDriver` - Chromium over CDP (feature `browser`)
//! - [`MockDriver`](crate::MockDriver) - scriptable in-memory page for tests
//!
//! All operations are serialized by the caller; a driver is a single shared
//! mutable resource (the browser session) and is never used concurrently.

use crate::result::DriverResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Element selection method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateBy {
    /// Element id attribute
    Id,
    /// CSS selector
    Css,
    /// XPath expression
    XPath,
    /// Element name attribute
    Name,
}

impl LocateBy {
    /// Short label used in logs and handle descriptions
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Name => "name",
        }
    }

    /// JavaScript expression yielding the first matching element (or null)
    #[must_use]
    pub fn to_query(&self, selector: &str) -> String {
        let literal = js_string(selector);
        match self {
            Self::Id => format!("document.getElementById({literal})"),
            Self::Css => format!("document.querySelector({literal})"),
            Self::XPath => format!(
                "document.evaluate({literal}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
            ),
            Self::Name => format!("document.querySelector({})", js_string(&name_css(selector))),
        }
    }

    /// JavaScript expression yielding an array of every matching element
    #[must_use]
    pub fn to_query_all(&self, selector: &str) -> String {
        let literal = js_string(selector);
        match self {
            Self::Id => format!("[document.getElementById({literal})].filter(Boolean)"),
            Self::Css => format!("Array.from(document.querySelectorAll({literal}))"),
            Self::XPath => format!(
                "(() => {{ const r = document.evaluate({literal}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); return Array.from({{ length: r.snapshotLength }}, (_, i) => r.snapshotItem(i)); }})()"
            ),
            Self::Name => format!(
                "Array.from(document.querySelectorAll({}))",
                js_string(&name_css(selector))
            ),
        }
    }
}

/// Quoted JavaScript string literal
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn name_css(name: &str) -> String {
    format!("[name={}]", js_string(name))
}

impl std::fmt::Display for LocateBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a page element
///
/// Handles are weak: any read may fail with `StaleReference` once the page
/// replaces the node. Callers re-resolve instead of caching handles across
/// page mutations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-issued identifier
    pub id: String,
    /// How the element was found (for diagnostics only)
    pub description: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description, self.id)
    }
}

/// What a screenshot should cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    /// Entire page
    FullPage,
    /// A single element
    Element(ElementHandle),
}

/// Argument passed to [`PageDriver::run_script`]
///
/// Scripts see their arguments as `arguments[i]`, the same calling
/// convention WebDriver uses.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    /// Plain JSON value
    Value(serde_json::Value),
    /// Live element reference
    Element(ElementHandle),
}

impl From<ElementHandle> for ScriptArg {
    fn from(handle: ElementHandle) -> Self {
        Self::Element(handle)
    }
}

impl From<serde_json::Value> for ScriptArg {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

/// Abstract driver trait for browser interaction
///
/// Lookups never fail for "not found": `find_first` returns `Ok(None)` and
/// `find_all` an empty vector. Errors are reserved for driver-level
/// conditions (stale handles, blocked interactions, session loss).
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Find the first element matching the selector
    async fn find_first(&self, by: LocateBy, selector: &str)
        -> DriverResult<Option<ElementHandle>>;

    /// Find all elements matching the selector, in document order
    async fn find_all(&self, by: LocateBy, selector: &str) -> DriverResult<Vec<ElementHandle>>;

    /// Visible text of an element
    async fn read_text(&self, handle: &ElementHandle) -> DriverResult<String>;

    /// Attribute or DOM property of an element (`value`, `textContent`, ...)
    async fn read_attribute(&self, handle: &ElementHandle, name: &str)
        -> DriverResult<Option<String>>;

    /// Whether the element is enabled
    async fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool>;

    /// Whether a checkbox, radio or option is selected
    async fn is_selected(&self, handle: &ElementHandle) -> DriverResult<bool>;

    /// Click an element
    async fn click(&self, handle: &ElementHandle) -> DriverResult<()>;

    /// Type text into an element (appends to its current value)
    async fn type_text(&self, handle: &ElementHandle, text: &str) -> DriverResult<()>;

    /// Clear an input's value
    async fn clear(&self, handle: &ElementHandle) -> DriverResult<()>;

    /// Execute JavaScript in page context
    async fn run_script(
        &self,
        source: &str,
        args: Vec<ScriptArg>,
    ) -> DriverResult<serde_json::Value>;

    /// Take a PNG screenshot
    async fn screenshot(&self, target: &CaptureTarget) -> DriverResult<Vec<u8>>;

    /// Current page HTML
    async fn page_source(&self) -> DriverResult<String>;
}
