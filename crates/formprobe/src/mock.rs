//! MockDriver - scriptable in-memory page for unit testing.
//!
//! The mock keeps a tiny DOM: element nodes bound to the locator strategies
//! that find them. Pages are simulated by reactions (a click or input on a
//! node schedules an edit after a delay) and by edits scheduled directly on
//! the driver's clock. With a [`VirtualClock`](crate::VirtualClock) shared
//! between the mock and the poller, dynamic behaviour such as "the state
//! list repopulates 1.2 s after the country changes" is exact and instant.
//!
//! Handles carry a generation; re-rendering or removing a node makes every
//! outstanding handle to it stale.

use crate::clock::{SharedClock, VirtualClock};
use crate::driver::{CaptureTarget, ElementHandle, LocateBy, PageDriver, ScriptArg};
use crate::locator::LocatorStrategy;
use crate::result::{DriverError, DriverResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Index of a node in the mock DOM
pub type NodeId = usize;

/// Bytes returned for every mock screenshot (PNG signature)
pub const MOCK_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

type Edit = Box<dyn FnOnce(&mut MockDom) + Send>;
type Reaction = Arc<dyn Fn(&mut MockDom, NodeId) + Send + Sync>;
type ScriptHandler =
    Arc<dyn Fn(&mut MockDom, &[ScriptArg]) -> DriverResult<serde_json::Value> + Send + Sync>;

/// Element state in the mock DOM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    tag: String,
    text: String,
    attributes: BTreeMap<String, String>,
    enabled: bool,
    selected: bool,
    visible: bool,
    interactable: bool,
}

impl MockElement {
    /// Create a visible, enabled element
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: String::new(),
            attributes: BTreeMap::new(),
            enabled: true,
            selected: false,
            visible: true,
            interactable: true,
        }
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the `value` attribute
    #[must_use]
    pub fn with_value(self, value: impl Into<String>) -> Self {
        self.with_attribute("value", value)
    }

    /// Mark as disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Mark as selected / checked
    #[must_use]
    pub const fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    /// Hide the element (visible text reads empty)
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Reject clicks and typing
    #[must_use]
    pub const fn blocked(mut self) -> Self {
        self.interactable = false;
        self
    }

    /// Tag name
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Text content
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attribute value
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Current `value`, empty when unset
    #[must_use]
    pub fn value(&self) -> &str {
        self.attribute("value").unwrap_or_default()
    }

    /// Whether the element is enabled
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the element is selected / checked
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        self.selected
    }

    fn input_type(&self) -> Option<&str> {
        self.attribute("type")
    }
}

#[derive(Debug)]
struct MockNode {
    element: MockElement,
    generation: u64,
    removed: bool,
}

struct Pending {
    due: Duration,
    seq: u64,
    edit: Edit,
}

/// The mock page state
///
/// Passed to scheduled edits, reactions and script handlers.
#[derive(Default)]
pub struct MockDom {
    now: Duration,
    nodes: Vec<MockNode>,
    bindings: HashMap<LocatorStrategy, Vec<NodeId>>,
    lookup_failures: HashMap<LocatorStrategy, DriverError>,
    click_reactions: HashMap<NodeId, Vec<(Duration, Reaction)>>,
    input_reactions: HashMap<NodeId, Vec<(Duration, Reaction)>>,
    scripts: Vec<(String, ScriptHandler)>,
    pending: Vec<Pending>,
    seq: u64,
    stale_reads: HashSet<NodeId>,
    session_lost: bool,
    hang_lookups: bool,
    page_source: Option<String>,
}

impl std::fmt::Debug for MockDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDom")
            .field("now", &self.now)
            .field("nodes", &self.nodes.len())
            .field("bindings", &self.bindings.len())
            .field("pending", &self.pending.len())
            .field("session_lost", &self.session_lost)
            .finish_non_exhaustive()
    }
}

impl MockDom {
    /// Current time on the driver's clock
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Add a node reachable through `strategy`
    pub fn insert(&mut self, strategy: LocatorStrategy, element: MockElement) -> NodeId {
        let node = self.nodes.len();
        self.nodes.push(MockNode {
            element,
            generation: 0,
            removed: false,
        });
        self.bindings.entry(strategy).or_default().push(node);
        node
    }

    /// Make an existing node reachable through another strategy
    pub fn bind(&mut self, strategy: LocatorStrategy, node: NodeId) {
        self.bindings.entry(strategy).or_default().push(node);
    }

    /// Replace every node bound to `strategy` with fresh nodes
    ///
    /// The old nodes are removed; their handles go stale.
    pub fn replace(&mut self, strategy: &LocatorStrategy, elements: Vec<MockElement>) -> Vec<NodeId> {
        for node in self.bindings.remove(strategy).unwrap_or_default() {
            self.remove(node);
        }
        elements
            .into_iter()
            .map(|element| self.insert(strategy.clone(), element))
            .collect()
    }

    /// Detach a node from the page
    pub fn remove(&mut self, node: NodeId) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.removed = true;
        }
        for nodes in self.bindings.values_mut() {
            nodes.retain(|n| *n != node);
        }
        self.click_reactions.remove(&node);
        self.input_reactions.remove(&node);
    }

    /// Re-render a node in place, invalidating outstanding handles
    pub fn rerender(&mut self, node: NodeId) {
        if let Some(entry) = self.nodes.get_mut(node) {
            entry.generation += 1;
        }
    }

    /// First live node bound to `strategy`
    #[must_use]
    pub fn find(&self, strategy: &LocatorStrategy) -> Option<NodeId> {
        self.find_all(strategy).into_iter().next()
    }

    /// Every live node bound to `strategy`
    #[must_use]
    pub fn find_all(&self, strategy: &LocatorStrategy) -> Vec<NodeId> {
        self.bindings
            .get(strategy)
            .map(|nodes| {
                nodes
                    .iter()
                    .copied()
                    .filter(|n| self.nodes.get(*n).is_some_and(|entry| !entry.removed))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Element state of a live node
    #[must_use]
    pub fn element(&self, node: NodeId) -> Option<&MockElement> {
        self.nodes
            .get(node)
            .filter(|entry| !entry.removed)
            .map(|entry| &entry.element)
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut MockElement> {
        self.nodes
            .get_mut(node)
            .filter(|entry| !entry.removed)
            .map(|entry| &mut entry.element)
    }

    /// Current `value` of a node (empty when missing)
    #[must_use]
    pub fn value(&self, node: NodeId) -> String {
        self.element(node)
            .map(|e| e.value().to_string())
            .unwrap_or_default()
    }

    /// Whether a node is selected / checked
    #[must_use]
    pub fn is_selected(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(MockElement::is_selected)
    }

    /// Set text content
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) {
        if let Some(element) = self.element_mut(node) {
            element.text = text.into();
        }
    }

    /// Set an attribute
    pub fn set_attribute(&mut self, node: NodeId, name: impl Into<String>, value: impl Into<String>) {
        if let Some(element) = self.element_mut(node) {
            element.attributes.insert(name.into(), value.into());
        }
    }

    /// Set the `value` attribute
    pub fn set_value(&mut self, node: NodeId, value: impl Into<String>) {
        self.set_attribute(node, "value", value);
    }

    /// Enable or disable a node
    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        if let Some(element) = self.element_mut(node) {
            element.enabled = enabled;
        }
    }

    /// Select or deselect a node
    pub fn set_selected(&mut self, node: NodeId, selected: bool) {
        if let Some(element) = self.element_mut(node) {
            element.selected = selected;
        }
    }

    /// Show or hide a node
    pub fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(element) = self.element_mut(node) {
            element.visible = visible;
        }
    }

    /// Run `edit` once the clock reaches `now + delay`
    pub fn schedule(&mut self, delay: Duration, edit: impl FnOnce(&mut Self) + Send + 'static) {
        self.seq += 1;
        self.pending.push(Pending {
            due: self.now + delay,
            seq: self.seq,
            edit: Box::new(edit),
        });
    }

    /// React to clicks on `node` after `delay`
    pub fn on_click(
        &mut self,
        node: NodeId,
        delay: Duration,
        reaction: impl Fn(&mut Self, NodeId) + Send + Sync + 'static,
    ) {
        self.click_reactions
            .entry(node)
            .or_default()
            .push((delay, Arc::new(reaction)));
    }

    /// React to typing into or clearing `node` after `delay`
    pub fn on_input(
        &mut self,
        node: NodeId,
        delay: Duration,
        reaction: impl Fn(&mut Self, NodeId) + Send + Sync + 'static,
    ) {
        self.input_reactions
            .entry(node)
            .or_default()
            .push((delay, Arc::new(reaction)));
    }

    /// Make lookups through `strategy` fail with `error`
    pub fn fail_lookup(&mut self, strategy: LocatorStrategy, error: DriverError) {
        self.lookup_failures.insert(strategy, error);
    }

    /// Remove an injected lookup failure
    pub fn clear_lookup_failure(&mut self, strategy: &LocatorStrategy) {
        self.lookup_failures.remove(strategy);
    }

    /// Fail the next read of `node` with a stale reference
    pub fn stale_next_read(&mut self, node: NodeId) {
        self.stale_reads.insert(node);
    }

    /// Close the session: every later operation fails with `Transport`
    pub fn lose_session(&mut self) {
        self.session_lost = true;
    }

    /// Set the HTML returned by `page_source`
    pub fn set_page_source(&mut self, html: impl Into<String>) {
        self.page_source = Some(html.into());
    }

    /// Live node behind a handle, if the handle is still valid
    #[must_use]
    pub fn node_of(&self, handle: &ElementHandle) -> Option<NodeId> {
        let (node, generation) = parse_handle(&handle.id)?;
        let entry = self.nodes.get(node)?;
        (!entry.removed && entry.generation == generation).then_some(node)
    }

    fn advance_to(&mut self, now: Duration) {
        self.now = self.now.max(now);
        self.apply_due();
    }

    fn apply_due(&mut self) {
        loop {
            let now = self.now;
            let next = self
                .pending
                .iter()
                .enumerate()
                .filter(|(_, p)| p.due <= now)
                .min_by_key(|(_, p)| (p.due, p.seq))
                .map(|(index, _)| index);
            let Some(index) = next else { break };
            let pending = self.pending.remove(index);
            (pending.edit)(self);
        }
    }

    fn fire(&mut self, node: NodeId, click: bool) {
        let reactions = if click {
            self.click_reactions.get(&node).cloned()
        } else {
            self.input_reactions.get(&node).cloned()
        };
        for (delay, reaction) in reactions.unwrap_or_default() {
            self.schedule(delay, move |dom| reaction(dom, node));
        }
    }

    fn handle(&self, node: NodeId, strategy: &LocatorStrategy) -> ElementHandle {
        let generation = self.nodes.get(node).map_or(0, |entry| entry.generation);
        ElementHandle::new(format!("mock-{node}-{generation}"), strategy.to_string())
    }

    fn live(&self, handle: &ElementHandle) -> DriverResult<NodeId> {
        self.node_of(handle)
            .ok_or_else(|| DriverError::stale(handle.id.clone()))
    }

    fn read(&mut self, handle: &ElementHandle) -> DriverResult<&MockElement> {
        let node = self.live(handle)?;
        if self.stale_reads.remove(&node) {
            return Err(DriverError::stale(handle.id.clone()));
        }
        self.element(node)
            .ok_or_else(|| DriverError::stale(handle.id.clone()))
    }

    fn interactable(&self, handle: &ElementHandle) -> DriverResult<NodeId> {
        let node = self.live(handle)?;
        match self.element(node) {
            Some(element) if !element.interactable => Err(DriverError::blocked(format!(
                "{} is not interactable",
                handle.description
            ))),
            Some(_) => Ok(node),
            None => Err(DriverError::stale(handle.id.clone())),
        }
    }

    fn render_source(&self) -> String {
        let mut html = String::from("<html><body>");
        for entry in self.nodes.iter().filter(|entry| !entry.removed) {
            let element = &entry.element;
            html.push('<');
            html.push_str(&element.tag);
            for (name, value) in &element.attributes {
                html.push_str(&format!(" {name}=\"{value}\""));
            }
            html.push('>');
            html.push_str(&element.text);
            html.push_str(&format!("</{}>", element.tag));
        }
        html.push_str("</body></html>");
        html
    }
}

fn parse_handle(id: &str) -> Option<(NodeId, u64)> {
    let rest = id.strip_prefix("mock-")?;
    let (node, generation) = rest.split_once('-')?;
    Some((node.parse().ok()?, generation.parse().ok()?))
}

/// Mock driver for unit testing
///
/// All methods take `&self`; state lives behind a mutex so the mock can be
/// shared with scheduled edits and inspected while a scenario runs.
pub struct MockDriver {
    dom: Mutex<MockDom>,
    clock: SharedClock,
    calls: Mutex<Vec<String>>,
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("dom", &*self.lock())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create an empty page on its own virtual clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(VirtualClock::shared())
    }

    /// Create an empty page whose scheduled edits follow `clock`
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            dom: Mutex::new(MockDom::default()),
            clock,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The clock scheduled edits follow
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    fn lock(&self) -> MutexGuard<'_, MockDom> {
        self.dom.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Inspect or edit the page, after applying edits that are due
    pub fn with_dom<T>(&self, f: impl FnOnce(&mut MockDom) -> T) -> T {
        let mut dom = self.lock();
        dom.advance_to(self.clock.elapsed());
        let out = f(&mut dom);
        dom.apply_due();
        out
    }

    /// Add a node reachable through `strategy`
    pub fn insert(&self, strategy: LocatorStrategy, element: MockElement) -> NodeId {
        self.with_dom(|dom| dom.insert(strategy, element))
    }

    /// Make lookups through `strategy` fail with `error`
    pub fn fail_lookup(&self, strategy: LocatorStrategy, error: DriverError) {
        self.with_dom(|dom| dom.fail_lookup(strategy, error));
    }

    /// Fail the next read of `node` with a stale reference
    pub fn stale_next_read(&self, node: NodeId) {
        self.with_dom(|dom| dom.stale_next_read(node));
    }

    /// Close the session
    pub fn lose_session(&self) {
        self.with_dom(MockDom::lose_session);
    }

    /// Make every lookup hang forever
    pub fn hang_lookups(&self) {
        self.with_dom(|dom| dom.hang_lookups = true);
    }

    /// Run `edit` once the clock reaches `now + delay`
    pub fn schedule(&self, delay: Duration, edit: impl FnOnce(&mut MockDom) + Send + 'static) {
        self.with_dom(|dom| dom.schedule(delay, edit));
    }

    /// Answer scripts whose source contains `pattern`
    ///
    /// Handlers are tried in registration order; unmatched scripts return
    /// `null`.
    pub fn on_script(
        &self,
        pattern: impl Into<String>,
        handler: impl Fn(&mut MockDom, &[ScriptArg]) -> DriverResult<serde_json::Value>
            + Send
            + Sync
            + 'static,
    ) {
        let pattern = pattern.into();
        self.with_dom(|dom| dom.scripts.push((pattern, Arc::new(handler))));
    }

    /// Get call history
    #[must_use]
    pub fn call_history(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.call_count(prefix) > 0
    }

    /// Number of calls starting with `prefix`
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn op<T>(&self, call: String, f: impl FnOnce(&mut MockDom) -> DriverResult<T>) -> DriverResult<T> {
        self.record(call);
        let mut dom = self.lock();
        dom.advance_to(self.clock.elapsed());
        if dom.session_lost {
            return Err(DriverError::transport("mock session closed"));
        }
        let out = f(&mut dom);
        dom.apply_due();
        out
    }

    fn hangs(&self) -> bool {
        self.lock().hang_lookups
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn find_first(&self, by: LocateBy, selector: &str) -> DriverResult<Option<ElementHandle>> {
        let strategy = LocatorStrategy::new(by, selector);
        if self.hangs() {
            self.record(format!("find_first:{strategy}"));
            std::future::pending::<()>().await;
        }
        self.op(format!("find_first:{strategy}"), |dom| {
            if let Some(err) = dom.lookup_failures.get(&strategy) {
                return Err(err.clone());
            }
            Ok(dom.find(&strategy).map(|node| dom.handle(node, &strategy)))
        })
    }

    async fn find_all(&self, by: LocateBy, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        let strategy = LocatorStrategy::new(by, selector);
        if self.hangs() {
            self.record(format!("find_all:{strategy}"));
            std::future::pending::<()>().await;
        }
        self.op(format!("find_all:{strategy}"), |dom| {
            if let Some(err) = dom.lookup_failures.get(&strategy) {
                return Err(err.clone());
            }
            Ok(dom
                .find_all(&strategy)
                .into_iter()
                .map(|node| dom.handle(node, &strategy))
                .collect())
        })
    }

    async fn read_text(&self, handle: &ElementHandle) -> DriverResult<String> {
        self.op(format!("read_text:{}", handle.description), |dom| {
            let element = dom.read(handle)?;
            Ok(if element.visible {
                element.text.clone()
            } else {
                String::new()
            })
        })
    }

    async fn read_attribute(&self, handle: &ElementHandle, name: &str) -> DriverResult<Option<String>> {
        self.op(format!("read_attribute:{}:{name}", handle.description), |dom| {
            let element = dom.read(handle)?;
            Ok(match element.attribute(name) {
                Some(value) => Some(value.to_string()),
                None if name == "textContent" => Some(element.text.clone()),
                None => None,
            })
        })
    }

    async fn is_enabled(&self, handle: &ElementHandle) -> DriverResult<bool> {
        self.op(format!("is_enabled:{}", handle.description), |dom| {
            Ok(dom.read(handle)?.enabled)
        })
    }

    async fn is_selected(&self, handle: &ElementHandle) -> DriverResult<bool> {
        self.op(format!("is_selected:{}", handle.description), |dom| {
            Ok(dom.read(handle)?.selected)
        })
    }

    async fn click(&self, handle: &ElementHandle) -> DriverResult<()> {
        self.op(format!("click:{}", handle.description), |dom| {
            let node = dom.interactable(handle)?;
            if !dom.element(node).is_some_and(MockElement::is_enabled) {
                return Ok(());
            }
            let kind = dom
                .element(node)
                .and_then(MockElement::input_type)
                .map(str::to_string);
            match kind.as_deref() {
                Some("checkbox") => {
                    let checked = dom.is_selected(node);
                    dom.set_selected(node, !checked);
                }
                Some("radio") => dom.set_selected(node, true),
                _ => {}
            }
            dom.fire(node, true);
            Ok(())
        })
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> DriverResult<()> {
        self.op(format!("type_text:{}", handle.description), |dom| {
            let node = dom.interactable(handle)?;
            if !dom.element(node).is_some_and(MockElement::is_enabled) {
                return Err(DriverError::blocked(format!(
                    "{} is disabled",
                    handle.description
                )));
            }
            let value = format!("{}{text}", dom.value(node));
            dom.set_value(node, value);
            dom.fire(node, false);
            Ok(())
        })
    }

    async fn clear(&self, handle: &ElementHandle) -> DriverResult<()> {
        self.op(format!("clear:{}", handle.description), |dom| {
            let node = dom.interactable(handle)?;
            dom.set_value(node, "");
            dom.fire(node, false);
            Ok(())
        })
    }

    async fn run_script(&self, source: &str, args: Vec<ScriptArg>) -> DriverResult<serde_json::Value> {
        self.op("run_script".to_string(), |dom| {
            let handler = dom
                .scripts
                .iter()
                .find(|(pattern, _)| source.contains(pattern.as_str()))
                .map(|(_, handler)| Arc::clone(handler));
            match handler {
                Some(handler) => handler(dom, &args),
                None => Ok(serde_json::Value::Null),
            }
        })
    }

    async fn screenshot(&self, target: &CaptureTarget) -> DriverResult<Vec<u8>> {
        match target {
            CaptureTarget::FullPage => self.op("screenshot:full".to_string(), |_| Ok(MOCK_PNG.to_vec())),
            CaptureTarget::Element(handle) => {
                self.op(format!("screenshot:{}", handle.description), |dom| {
                    dom.live(handle)?;
                    Ok(MOCK_PNG.to_vec())
                })
            }
        }
    }

    async fn page_source(&self) -> DriverResult<String> {
        self.op("page_source".to_string(), |dom| {
            Ok(dom
                .page_source
                .clone()
                .unwrap_or_else(|| dom.render_source()))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use futures::executor::block_on;

    fn find(driver: &MockDriver, strategy: &LocatorStrategy) -> Option<ElementHandle> {
        block_on(driver.find_first(strategy.by, &strategy.selector)).unwrap()
    }

    mod lookup_tests {
        use super::*;

        #[test]
        fn test_mock_driver_new() {
            let driver = MockDriver::new();
            assert!(driver.call_history().is_empty());
            assert!(find(&driver, &LocatorStrategy::id("missing")).is_none());
        }

        #[test]
        fn test_find_first_and_all() {
            let driver = MockDriver::new();
            let options = LocatorStrategy::css("#city option");
            driver.insert(options.clone(), MockElement::new("option").with_text("Select City"));
            driver.insert(options.clone(), MockElement::new("option").with_value("Hyderabad"));

            let first = find(&driver, &options).unwrap();
            assert_eq!(first.id, "mock-0-0");
            assert_eq!(first.description, "css=#city option");

            let all = block_on(driver.find_all(LocateBy::Css, "#city option")).unwrap();
            assert_eq!(all.len(), 2);
        }

        #[test]
        fn test_bind_shares_node() {
            let driver = MockDriver::new();
            let node = driver.insert(LocatorStrategy::id("submitBtn"), MockElement::new("button"));
            driver.with_dom(|dom| dom.bind(LocatorStrategy::css("button[type=submit]"), node));
            let by_css = find(&driver, &LocatorStrategy::css("button[type=submit]")).unwrap();
            assert_eq!(by_css.id, format!("mock-{node}-0"));
        }

        #[test]
        fn test_injected_failure() {
            let driver = MockDriver::new();
            let strategy = LocatorStrategy::id("x");
            driver.fail_lookup(strategy.clone(), DriverError::blocked("overlay"));
            let err = block_on(driver.find_first(LocateBy::Id, "x")).unwrap_err();
            assert_eq!(err, DriverError::blocked("overlay"));
            driver.with_dom(|dom| dom.clear_lookup_failure(&strategy));
            assert!(block_on(driver.find_first(LocateBy::Id, "x")).unwrap().is_none());
        }
    }

    mod staleness_tests {
        use super::*;

        #[test]
        fn test_rerender_makes_handle_stale() {
            let driver = MockDriver::new();
            let strategy = LocatorStrategy::id("pwdText");
            let node = driver.insert(strategy.clone(), MockElement::new("span").with_text("a"));
            let handle = find(&driver, &strategy).unwrap();
            driver.with_dom(|dom| dom.rerender(node));

            let err = block_on(driver.read_text(&handle)).unwrap_err();
            assert!(matches!(err, DriverError::StaleReference { .. }));

            let fresh = find(&driver, &strategy).unwrap();
            assert_eq!(block_on(driver.read_text(&fresh)).unwrap(), "a");
        }

        #[test]
        fn test_replace_removes_old_nodes() {
            let driver = MockDriver::new();
            let options = LocatorStrategy::css("#state option");
            driver.insert(options.clone(), MockElement::new("option").with_text("Select State"));
            let old = find(&driver, &options).unwrap();
            driver.with_dom(|dom| {
                dom.replace(
                    &options,
                    vec![
                        MockElement::new("option").with_text("Select State"),
                        MockElement::new("option").with_value("Telangana"),
                    ],
                );
            });
            assert!(block_on(driver.read_text(&old)).is_err());
            assert_eq!(block_on(driver.find_all(LocateBy::Css, "#state option")).unwrap().len(), 2);
        }

        #[test]
        fn test_stale_next_read_is_one_shot() {
            let driver = MockDriver::new();
            let strategy = LocatorStrategy::id("x");
            let node = driver.insert(strategy.clone(), MockElement::new("div").with_text("t"));
            driver.stale_next_read(node);
            let handle = find(&driver, &strategy).unwrap();
            assert!(block_on(driver.read_text(&handle)).is_err());
            assert_eq!(block_on(driver.read_text(&handle)).unwrap(), "t");
        }
    }

    mod interaction_tests {
        use super::*;

        #[test]
        fn test_type_and_clear() {
            let driver = MockDriver::new();
            let strategy = LocatorStrategy::id("firstName");
            driver.insert(strategy.clone(), MockElement::new("input"));
            let handle = find(&driver, &strategy).unwrap();
            block_on(driver.type_text(&handle, "Jane")).unwrap();
            block_on(driver.type_text(&handle, " Doe")).unwrap();
            assert_eq!(
                block_on(driver.read_attribute(&handle, "value")).unwrap().as_deref(),
                Some("Jane Doe")
            );
            block_on(driver.clear(&handle)).unwrap();
            assert_eq!(
                block_on(driver.read_attribute(&handle, "value")).unwrap().as_deref(),
                Some("")
            );
        }

        #[test]
        fn test_blocked_and_disabled() {
            let driver = MockDriver::new();
            driver.insert(LocatorStrategy::id("a"), MockElement::new("button").blocked());
            driver.insert(LocatorStrategy::id("b"), MockElement::new("input").disabled());
            let a = find(&driver, &LocatorStrategy::id("a")).unwrap();
            let b = find(&driver, &LocatorStrategy::id("b")).unwrap();
            assert!(matches!(
                block_on(driver.click(&a)).unwrap_err(),
                DriverError::InteractionBlocked { .. }
            ));
            assert!(matches!(
                block_on(driver.type_text(&b, "x")).unwrap_err(),
                DriverError::InteractionBlocked { .. }
            ));
        }

        #[test]
        fn test_checkbox_toggles() {
            let driver = MockDriver::new();
            let strategy = LocatorStrategy::id("terms");
            driver.insert(strategy.clone(), MockElement::new("input").with_attribute("type", "checkbox"));
            let handle = find(&driver, &strategy).unwrap();
            block_on(driver.click(&handle)).unwrap();
            assert!(block_on(driver.is_selected(&handle)).unwrap());
            block_on(driver.click(&handle)).unwrap();
            assert!(!block_on(driver.is_selected(&handle)).unwrap());
        }

        #[test]
        fn test_click_on_disabled_is_ignored() {
            let driver = MockDriver::new();
            let strategy = LocatorStrategy::id("submitBtn");
            let node = driver.insert(strategy.clone(), MockElement::new("button").disabled());
            driver.with_dom(|dom| {
                dom.on_click(node, Duration::ZERO, |dom, node| dom.set_text(node, "clicked"));
            });
            let handle = find(&driver, &strategy).unwrap();
            block_on(driver.click(&handle)).unwrap();
            assert_eq!(block_on(driver.read_text(&handle)).unwrap(), "");
        }

        #[test]
        fn test_hidden_text_reads_empty_but_has_text_content() {
            let driver = MockDriver::new();
            let strategy = LocatorStrategy::id("err");
            driver.insert(strategy.clone(), MockElement::new("div").with_text("Required").hidden());
            let handle = find(&driver, &strategy).unwrap();
            assert_eq!(block_on(driver.read_text(&handle)).unwrap(), "");
            assert_eq!(
                block_on(driver.read_attribute(&handle, "textContent")).unwrap().as_deref(),
                Some("Required")
            );
        }
    }

    mod timing_tests {
        use super::*;

        #[test]
        fn test_reaction_applies_after_delay() {
            let clock = VirtualClock::shared();
            let driver = MockDriver::with_clock(clock.clone());
            let button = LocatorStrategy::id("go");
            let label = LocatorStrategy::id("label");
            let label_node = driver.insert(label.clone(), MockElement::new("span"));
            let button_node = driver.insert(button.clone(), MockElement::new("button"));
            driver.with_dom(|dom| {
                dom.on_click(button_node, Duration::from_millis(300), move |dom, _| {
                    dom.set_text(label_node, "done");
                });
            });

            let handle = find(&driver, &button).unwrap();
            block_on(driver.click(&handle)).unwrap();
            let label_handle = find(&driver, &label).unwrap();
            assert_eq!(block_on(driver.read_text(&label_handle)).unwrap(), "");

            clock.advance(Duration::from_millis(300));
            assert_eq!(block_on(driver.read_text(&label_handle)).unwrap(), "done");
        }

        #[test]
        fn test_scheduled_edits_apply_in_order() {
            let clock = VirtualClock::shared();
            let driver = MockDriver::with_clock(clock.clone());
            let strategy = LocatorStrategy::id("x");
            let node = driver.insert(strategy.clone(), MockElement::new("div"));
            driver.schedule(Duration::from_millis(200), move |dom| dom.set_text(node, "second"));
            driver.schedule(Duration::from_millis(100), move |dom| dom.set_text(node, "first"));

            block_on(clock.sleep(Duration::from_millis(150)));
            let handle = find(&driver, &strategy).unwrap();
            assert_eq!(block_on(driver.read_text(&handle)).unwrap(), "first");
            block_on(clock.sleep(Duration::from_millis(100)));
            assert_eq!(block_on(driver.read_text(&handle)).unwrap(), "second");
        }

        #[test]
        fn test_session_loss() {
            let driver = MockDriver::new();
            driver.lose_session();
            let err = block_on(driver.page_source()).unwrap_err();
            assert!(err.is_fatal());
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn test_script_handler_receives_element() {
            let driver = MockDriver::new();
            let strategy = LocatorStrategy::id("confirmPassword");
            let node = driver.insert(strategy.clone(), MockElement::new("input"));
            driver.on_script("blur", move |dom, args| {
                let Some(ScriptArg::Element(handle)) = args.first() else {
                    return Err(DriverError::blocked("no element"));
                };
                Ok(serde_json::json!(dom.node_of(handle) == Some(node)))
            });
            let handle = find(&driver, &strategy).unwrap();
            let out = block_on(driver.run_script("arguments[0].blur();", vec![handle.into()])).unwrap();
            assert_eq!(out, serde_json::json!(true));
            assert_eq!(
                block_on(driver.run_script("other()", vec![])).unwrap(),
                serde_json::Value::Null
            );
        }

        #[test]
        fn test_screenshot_and_source() {
            let driver = MockDriver::new();
            driver.insert(LocatorStrategy::id("f"), MockElement::new("form").with_attribute("id", "f"));
            assert_eq!(block_on(driver.screenshot(&CaptureTarget::FullPage)).unwrap(), MOCK_PNG);
            let html = block_on(driver.page_source()).unwrap();
            assert!(html.contains("<form id=\"f\"></form>"));
            assert!(driver.was_called("page_source"));
            assert_eq!(driver.call_count("screenshot"), 1);
        }
    }
}
