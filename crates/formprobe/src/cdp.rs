//! Chromium driver over CDP.
//!
//! Elements found by a lookup are tagged with a `data-formprobe-handle`
//! attribute and the handle id is that attribute's value. Every later
//! operation looks the element up by its tag, so a node the page replaced
//! reports `StaleReference` instead of acting on a detached element.

use crate::clock::SystemClock;
use crate::config::{BrowserSettings, RunConfig};
use crate::driver::{js_string, CaptureTarget, ElementHandle, LocateBy, PageDriver, ScriptArg};
use crate::form::FormScenario;
use crate::reporter::RunSummary;
use crate::result::{DriverError, DriverResult, FormProbeError, FormProbeResult};
use crate::wait::CancelToken;
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, Viewport,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Attribute carrying the handle id
const HANDLE_ATTR: &str = "data-formprobe-handle";

/// Tags an element (`found`) and returns its handle id
const TAG_FN: &str = "const tag = (found) => { \
     if (!found.hasAttribute('data-formprobe-handle')) { \
       window.__formprobeSeq = (window.__formprobeSeq || 0) + 1; \
       found.setAttribute('data-formprobe-handle', 'fp-' + window.__formprobeSeq); \
     } \
     return found.getAttribute('data-formprobe-handle'); };";

/// Chromium page driven over CDP
#[derive(Debug)]
pub struct CdpDriver {
    browser: Mutex<CdpBrowser>,
    page: CdpPage,
    handler: tokio::task::JoinHandle<()>,
}

impl CdpDriver {
    /// Launch chromium and open a blank page
    ///
    /// # Errors
    ///
    /// `BrowserLaunch` when chromium cannot be started.
    pub async fn launch(settings: &BrowserSettings) -> FormProbeResult<Self> {
        let mut builder =
            CdpConfig::builder().window_size(settings.window_width, settings.window_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        if !settings.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = settings.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|message| FormProbeError::BrowserLaunch { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(config)
                .await
                .map_err(|e| FormProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FormProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;

        info!(headless = settings.headless, "browser launched");
        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
        })
    }

    /// Navigate and wait for the load to finish
    ///
    /// # Errors
    ///
    /// `Navigation` when the page cannot be loaded.
    pub async fn goto(&self, url: &str) -> FormProbeResult<()> {
        let navigation = |e: CdpError| FormProbeError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };
        self.page.goto(url).await.map_err(navigation)?;
        info!(url, "page loaded");
        Ok(())
    }

    /// Close the browser
    ///
    /// # Errors
    ///
    /// `BrowserLaunch` when chromium does not shut down cleanly.
    pub async fn close(self) -> FormProbeResult<()> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| FormProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;
        drop(browser);
        self.handler.abort();
        Ok(())
    }

    async fn eval(&self, script: String) -> DriverResult<Value> {
        let mut params = EvaluateParams::new(script);
        params.return_by_value = Some(true);
        params.await_promise = Some(true);
        let result = self.page.evaluate_expression(params).await.map_err(map_cdp)?;
        result
            .into_value::<Value>()
            .map_err(|e| DriverError::transport(format!("unreadable script result: {e}")))
    }

    /// Run `body` with `el` bound to the element behind `handle`
    ///
    /// `body` returns `{ value }` or `{ blocked: message }`.
    async fn on_element(&self, handle: &ElementHandle, body: &str) -> DriverResult<Value> {
        let reply = self.eval(element_script(&handle.id, body)).await?;
        parse_reply(handle, reply)
    }

    fn describe(by: LocateBy, selector: &str) -> String {
        format!("{by}={selector}")
    }
}

/// Launch chromium, open the configured page and run one scenario
///
/// The browser is closed afterwards whatever the outcome.
///
/// # Errors
///
/// `Config`, `BrowserLaunch` or `Navigation` when the run cannot start.
/// Failures during the run are reported in the summary.
pub async fn run_in_browser(
    config: &RunConfig,
    scenario: FormScenario,
    cancel: CancelToken,
) -> FormProbeResult<RunSummary> {
    let url = config.page_url()?;
    let driver = CdpDriver::launch(&config.browser).await?;
    if let Err(err) = driver.goto(&url).await {
        if let Err(close_err) = driver.close().await {
            warn!(%close_err, "browser did not close cleanly");
        }
        return Err(err);
    }

    let plan = scenario.build(&config.profile, &config.timings());
    let summary = config
        .runner(SystemClock::shared(), cancel)
        .run(&plan, &driver)
        .await;

    if let Err(err) = driver.close().await {
        warn!(%err, "browser did not close cleanly");
    }
    Ok(summary)
}

fn map_cdp(err: CdpError) -> DriverError {
    match err {
        CdpError::JavascriptException(details) => {
            let message = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone());
            DriverError::blocked(format!("script error: {message}"))
        }
        other => DriverError::transport(other.to_string()),
    }
}

fn element_lookup(id: &str) -> String {
    format!(
        "document.querySelector('[{HANDLE_ATTR}=' + JSON.stringify({}) + ']')",
        js_string(id)
    )
}

fn element_script(id: &str, body: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return {{ stale: true }}; {body} }})()",
        element_lookup(id)
    )
}

fn parse_reply(handle: &ElementHandle, reply: Value) -> DriverResult<Value> {
    if reply.get("stale").and_then(Value::as_bool) == Some(true) {
        return Err(DriverError::stale(handle.id.clone()));
    }
    if let Some(message) = reply.get("blocked").and_then(Value::as_str) {
        return Err(DriverError::blocked(format!("{}: {message}", handle.description)));
    }
    Ok(reply.get("value").cloned().unwrap_or(Value::Null))
}

/// Arguments array plus the handle ids that must still be attached
fn script_args(args: &[ScriptArg]) -> (String, Vec<String>) {
    let mut ids = Vec::new();
    let items: Vec<String> = args
        .iter()
        .map(|arg| match arg {
            ScriptArg::Value(value) => value.to_string(),
            ScriptArg::Element(handle) => {
                ids.push(handle.id.clone());
                element_lookup(&handle.id)
            }
        })
        .collect();
    (format!("[{}]", items.join(", ")), ids)
}

const CLICK_BODY: &str = "if (el.tagName === 'OPTION') { \
       const select = el.closest('select'); \
       if (!select || select.disabled) return { value: false }; \
       select.value = el.value; el.selected = true; \
       select.dispatchEvent(new Event('input', { bubbles: true })); \
       select.dispatchEvent(new Event('change', { bubbles: true })); \
       return { value: true }; \
     } \
     if (el.disabled) return { value: false }; \
     if (!el.getClientRects().length) return { blocked: 'element not displayed' }; \
     el.scrollIntoView({ block: 'center' }); \
     const r = el.getBoundingClientRect(); \
     const top = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2); \
     if (top && top !== el && !el.contains(top) && !top.contains(el) && !(el.labels && Array.from(el.labels).includes(top))) { \
       return { blocked: 'click intercepted by <' + top.tagName.toLowerCase() + '>' }; \
     } \
     el.click(); return { value: true };";

const FOCUS_BODY: &str = "if (el.disabled || el.readOnly) return { blocked: 'element is disabled' }; \
     if (!el.getClientRects().length) return { blocked: 'element not displayed' }; \
     el.focus(); return { value: true };";

const CLEAR_BODY: &str = "if (el.disabled || el.readOnly) return { blocked: 'element is disabled' }; \
     el.value = ''; \
     el.dispatchEvent(new Event('input', { bubbles: true })); \
     el.dispatchEvent(new Event('change', { bubbles: true })); \
     return { value: true };";

const RECT_BODY: &str = "el.scrollIntoView({ block: 'center' }); \
     const r = el.getBoundingClientRect(); \
     return { value: [r.left + window.scrollX, r.top + window.scrollY, r.width, r.height] };";

#[async_trait]
impl PageDriver for CdpDriver {
    async fn find_first(&self, by: LocateBy, selector: &str) -> DriverResult<Option<ElementHandle>> {
        let script = format!(
            "(() => {{ {TAG_FN} const found = {}; return found ? tag(found) : null; }})()",
            by.to_query(selector)
        );
        let id = self.eval(script).await?;
        Ok(id
            .as_str()
            .map(|id| ElementHandle::new(id, Self::describe(by, selector))))
    }

    async fn find_all(&self, by: LocateBy, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        let script = format!(
            "(() => {{ {TAG_FN} return {}.map(tag); }})()",
            by.to_query_all(selector)
        );
        let ids = self.eval(script).await?;
        let description = Self::describe(by, selector);
        Ok(ids
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(|id| ElementHandle::new(id, description.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_text(&self, handle: &ElementHandle) -> DriverResult<String> {
        let value = self
            .on_element(handle, "return { value: el.innerText || '' };")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn read_attribute(&self, handle: &ElementHandle, name: &str) -> DriverResult<Option<String>> {
        let body = format!(
            "const name = {}; \
             if (name === 'value' && 'value' in el) return {{ value: String(el.value) }}; \
             if (name === 'textContent') return {{ value: el.textContent }}; \
             return {{ value: el.getAttribute(name) }};",
            js_string(name)
        );
        let value = self.on_element(handle, &body).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let value = self.on_element(handle, "return { value: !el.disabled };").await?;
        Ok(value.as_bool().unwrap_or(true))
    }

    async fn is_selected(&self, handle: &ElementHandle) -> DriverResult<bool> {
        let value = self
            .on_element(handle, "return { value: !!(el.checked || el.selected) };")
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, handle: &ElementHandle) -> DriverResult<()> {
        let clicked = self.on_element(handle, CLICK_BODY).await?;
        if clicked.as_bool() == Some(false) {
            debug!(element = %handle, "click ignored on disabled element");
        }
        Ok(())
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> DriverResult<()> {
        self.on_element(handle, FOCUS_BODY).await?;
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(map_cdp)?;
        Ok(())
    }

    async fn clear(&self, handle: &ElementHandle) -> DriverResult<()> {
        self.on_element(handle, CLEAR_BODY).await.map(|_| ())
    }

    async fn run_script(&self, source: &str, args: Vec<ScriptArg>) -> DriverResult<Value> {
        let (array, ids) = script_args(&args);
        let ids = serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string());
        let script = format!(
            "(() => {{ \
               const stale = {ids}.find((id) => !{lookup}); \
               if (stale) return {{ stale }}; \
               const value = (function() {{ {source} \n}}).apply(null, {array}); \
               return {{ value: value === undefined ? null : value }}; \
             }})()",
            lookup = "document.querySelector('[data-formprobe-handle=' + JSON.stringify(id) + ']')",
        );
        let reply = self.eval(script).await?;
        if let Some(id) = reply.get("stale").and_then(Value::as_str) {
            return Err(DriverError::stale(id));
        }
        Ok(reply.get("value").cloned().unwrap_or(Value::Null))
    }

    async fn screenshot(&self, target: &CaptureTarget) -> DriverResult<Vec<u8>> {
        let mut params = CaptureScreenshotParams::builder().format(CaptureScreenshotFormat::Png);
        if let CaptureTarget::Element(handle) = target {
            let rect = self.on_element(handle, RECT_BODY).await?;
            let dims: Vec<f64> = rect
                .as_array()
                .map(|items| items.iter().filter_map(Value::as_f64).collect())
                .unwrap_or_default();
            let [x, y, width, height] = dims[..] else {
                return Err(DriverError::blocked(format!("{}: no bounding box", handle.description)));
            };
            if width <= 0.0 || height <= 0.0 {
                return Err(DriverError::blocked(format!("{}: element has no size", handle.description)));
            }
            params = params
                .clip(Viewport {
                    x,
                    y,
                    width,
                    height,
                    scale: 1.0,
                })
                .capture_beyond_viewport(true);
        }

        let shot = self.page.execute(params.build()).await.map_err(map_cdp)?;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| DriverError::transport(format!("screenshot decode: {e}")))
    }

    async fn page_source(&self) -> DriverResult<String> {
        self.page.content().await.map_err(map_cdp)
    }
}
