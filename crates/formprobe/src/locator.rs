//! Fallback locator resolution.
//!
//! A semantic target such as "confirm-password error" can be rendered in
//! several markup shapes depending on the page build. A [`LocatorChain`]
//! lists the candidate strategies in priority order and the
//! [`LocatorResolver`] returns the first one that yields a usable element.
//!
//! # Design Philosophy
//!
//! - **Short-circuit**: strategies after the first success are never invoked
//! - **Non-raising**: an exhausted chain is a value (`None` / [`TextLookup::Absent`]),
//!   never an error; each call site decides what absence means
//! - **Weak handles**: a stale read re-resolves the same strategy before
//!   moving on

use crate::driver::{ElementHandle, LocateBy, PageDriver};
use crate::result::{DriverError, DriverResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Default number of re-resolutions after a stale read
pub const DEFAULT_STALE_RETRIES: usize = 1;

/// One way of finding an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorStrategy {
    /// Selection method
    pub by: LocateBy,
    /// Selector string
    pub selector: String,
}

impl LocatorStrategy {
    /// Create a strategy
    #[must_use]
    pub fn new(by: LocateBy, selector: impl Into<String>) -> Self {
        Self {
            by,
            selector: selector.into(),
        }
    }

    /// Match by element id
    #[must_use]
    pub fn id(selector: impl Into<String>) -> Self {
        Self::new(LocateBy::Id, selector)
    }

    /// Match by CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(LocateBy::Css, selector)
    }

    /// Match by XPath expression
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::new(LocateBy::XPath, selector)
    }

    /// Match by name attribute
    #[must_use]
    pub fn name(selector: impl Into<String>) -> Self {
        Self::new(LocateBy::Name, selector)
    }
}

impl std::fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.by, self.selector)
    }
}

/// Ordered list of strategies for one semantic target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorChain {
    label: String,
    strategies: Vec<LocatorStrategy>,
}

impl LocatorChain {
    /// Create an empty chain
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            strategies: Vec::new(),
        }
    }

    /// Chain with a single strategy
    #[must_use]
    pub fn single(label: impl Into<String>, strategy: LocatorStrategy) -> Self {
        Self::new(label).then(strategy)
    }

    /// Append a strategy
    #[must_use]
    pub fn then(mut self, strategy: LocatorStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Append an id strategy
    #[must_use]
    pub fn id(self, selector: impl Into<String>) -> Self {
        self.then(LocatorStrategy::id(selector))
    }

    /// Append a CSS strategy
    #[must_use]
    pub fn css(self, selector: impl Into<String>) -> Self {
        self.then(LocatorStrategy::css(selector))
    }

    /// Append an XPath strategy
    #[must_use]
    pub fn xpath(self, selector: impl Into<String>) -> Self {
        self.then(LocatorStrategy::xpath(selector))
    }

    /// Append a name strategy
    #[must_use]
    pub fn name(self, selector: impl Into<String>) -> Self {
        self.then(LocatorStrategy::name(selector))
    }

    /// Semantic label
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Strategies in priority order
    #[must_use]
    pub fn strategies(&self) -> &[LocatorStrategy] {
        &self.strategies
    }

    /// Number of strategies
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the chain has no strategies
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// A successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Element handle
    pub handle: ElementHandle,
    /// Index of the winning strategy
    pub strategy_index: usize,
    /// The winning strategy
    pub strategy: LocatorStrategy,
}

/// Result of a text-bearing lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextLookup {
    /// Non-empty text found
    Found {
        /// Trimmed text
        text: String,
        /// Index of the winning strategy
        strategy_index: usize,
    },
    /// At least one element matched but all had empty text
    Empty {
        /// Index of the first strategy that matched an empty element
        strategy_index: usize,
    },
    /// No strategy matched anything
    Absent,
}

impl TextLookup {
    /// Text when found
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Found { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Whether non-empty text was found
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Outcome of trying a single strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The strategy produced an element
    Found,
    /// Nothing matched
    NoMatch,
    /// The driver failed
    Failed(DriverError),
    /// The driver did not answer within the per-strategy timeout
    TimedOut,
}

/// A single strategy attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// Strategy tried
    pub strategy: LocatorStrategy,
    /// What happened
    pub outcome: AttemptOutcome,
}

/// Every attempt made while resolving a chain
#[derive(Debug, Clone)]
pub struct ChainReport {
    /// Chain label
    pub label: String,
    /// Attempts in order
    pub attempts: Vec<Attempt>,
    /// Winning resolution, if any
    pub resolved: Option<Resolved>,
}

impl ChainReport {
    /// First transport failure seen during the attempts
    #[must_use]
    pub fn transport_error(&self) -> Option<&DriverError> {
        self.attempts.iter().find_map(|a| match &a.outcome {
            AttemptOutcome::Failed(err) if err.is_fatal() => Some(err),
            _ => None,
        })
    }

    /// Convert into a driver result
    ///
    /// `NotFound` becomes `ElementAbsent`, unless the session itself failed
    /// during the attempts, in which case that transport error is returned.
    pub fn into_result(self) -> DriverResult<Resolved> {
        if let Some(resolved) = self.resolved {
            return Ok(resolved);
        }
        if let Some(err) = self.transport_error() {
            return Err(err.clone());
        }
        Err(DriverError::absent(self.label))
    }
}

enum CallError {
    Driver(DriverError),
    TimedOut,
}

/// Resolves locator chains against a driver
#[derive(Debug, Clone)]
pub struct LocatorResolver {
    strategy_timeout: Option<Duration>,
    stale_retries: usize,
}

impl Default for LocatorResolver {
    fn default() -> Self {
        Self {
            strategy_timeout: None,
            stale_retries: DEFAULT_STALE_RETRIES,
        }
    }
}

impl LocatorResolver {
    /// Create a resolver with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each driver call made for a strategy
    #[must_use]
    pub const fn with_strategy_timeout(mut self, timeout: Duration) -> Self {
        self.strategy_timeout = Some(timeout);
        self
    }

    /// Set how often a stale read is re-resolved
    #[must_use]
    pub const fn with_stale_retries(mut self, retries: usize) -> Self {
        self.stale_retries = retries;
        self
    }

    /// Per-strategy timeout, if any
    #[must_use]
    pub const fn strategy_timeout(&self) -> Option<Duration> {
        self.strategy_timeout
    }

    async fn call<T, F>(&self, fut: F) -> Result<T, CallError>
    where
        F: Future<Output = DriverResult<T>>,
    {
        let result = match self.strategy_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => return Err(CallError::TimedOut),
            },
            None => fut.await,
        };
        result.map_err(CallError::Driver)
    }

    async fn attempt(
        &self,
        driver: &dyn PageDriver,
        strategy: &LocatorStrategy,
    ) -> (Option<ElementHandle>, AttemptOutcome) {
        match self
            .call(driver.find_first(strategy.by, &strategy.selector))
            .await
        {
            Ok(Some(handle)) => (Some(handle), AttemptOutcome::Found),
            Ok(None) => (None, AttemptOutcome::NoMatch),
            Err(CallError::Driver(err)) => (None, AttemptOutcome::Failed(err)),
            Err(CallError::TimedOut) => (None, AttemptOutcome::TimedOut),
        }
    }

    /// Resolve a chain, recording every attempt
    pub async fn resolve_report(&self, chain: &LocatorChain, driver: &dyn PageDriver) -> ChainReport {
        let mut attempts = Vec::with_capacity(chain.len());
        for (index, strategy) in chain.strategies().iter().enumerate() {
            let (handle, outcome) = self.attempt(driver, strategy).await;
            debug!(chain = chain.label(), %strategy, ?outcome, "locator attempt");
            attempts.push(Attempt {
                strategy: strategy.clone(),
                outcome,
            });
            if let Some(handle) = handle {
                return ChainReport {
                    label: chain.label().to_string(),
                    attempts,
                    resolved: Some(Resolved {
                        handle,
                        strategy_index: index,
                        strategy: strategy.clone(),
                    }),
                };
            }
        }
        ChainReport {
            label: chain.label().to_string(),
            attempts,
            resolved: None,
        }
    }

    /// Resolve a chain to the first element found
    pub async fn resolve(&self, chain: &LocatorChain, driver: &dyn PageDriver) -> Option<Resolved> {
        self.resolve_report(chain, driver).await.resolved
    }

    /// Resolve a chain, surfacing only a lost session
    ///
    /// # Errors
    ///
    /// Returns the transport error when the session failed during the
    /// attempts and no strategy matched.
    pub async fn try_resolve(
        &self,
        chain: &LocatorChain,
        driver: &dyn PageDriver,
    ) -> DriverResult<Option<Resolved>> {
        let report = self.resolve_report(chain, driver).await;
        if report.resolved.is_none() {
            if let Some(err) = report.transport_error() {
                return Err(err.clone());
            }
        }
        Ok(report.resolved)
    }

    /// Resolve a chain, treating `NotFound` as an error
    ///
    /// Used before interactions, where a missing element means the step
    /// cannot proceed.
    pub async fn require(
        &self,
        chain: &LocatorChain,
        driver: &dyn PageDriver,
    ) -> DriverResult<ElementHandle> {
        self.resolve_report(chain, driver)
            .await
            .into_result()
            .map(|resolved| resolved.handle)
    }

    /// Resolve a chain to the first element with non-empty text
    ///
    /// An element whose text is empty does not end the chain: an empty
    /// error node must not be mistaken for a rendered message.
    ///
    /// # Errors
    ///
    /// Returns the transport error as soon as the session is lost; every
    /// other failure moves on to the next strategy.
    pub async fn resolve_text(
        &self,
        chain: &LocatorChain,
        driver: &dyn PageDriver,
    ) -> DriverResult<TextLookup> {
        let mut first_empty = None;

        for (index, strategy) in chain.strategies().iter().enumerate() {
            let mut retries = self.stale_retries;
            loop {
                let handle = match self.attempt(driver, strategy).await {
                    (Some(handle), _) => handle,
                    (None, AttemptOutcome::Failed(err)) if err.is_fatal() => return Err(err),
                    (None, _) => {
                        debug!(chain = chain.label(), %strategy, "text lookup: no element");
                        break;
                    }
                };

                match self.call(element_text(driver, &handle)).await {
                    Ok(text) if !text.is_empty() => {
                        debug!(chain = chain.label(), %strategy, %text, "text lookup: found");
                        return Ok(TextLookup::Found {
                            text,
                            strategy_index: index,
                        });
                    }
                    Ok(_) => {
                        debug!(chain = chain.label(), %strategy, "text lookup: empty text");
                        first_empty.get_or_insert(index);
                        break;
                    }
                    Err(CallError::Driver(DriverError::StaleReference { .. })) if retries > 0 => {
                        retries -= 1;
                        debug!(chain = chain.label(), %strategy, "text lookup: stale, re-resolving");
                    }
                    Err(CallError::Driver(err)) if err.is_fatal() => return Err(err),
                    Err(_) => break,
                }
            }
        }

        Ok(match first_empty {
            Some(strategy_index) => TextLookup::Empty { strategy_index },
            None => TextLookup::Absent,
        })
    }
}

/// Trimmed text of an element
///
/// Falls back to `textContent` when the visible text is empty (hidden
/// elements report no visible text).
pub async fn element_text(driver: &dyn PageDriver, handle: &ElementHandle) -> DriverResult<String> {
    let text = driver.read_text(handle).await?;
    let text = text.trim();
    if !text.is_empty() {
        return Ok(text.to_string());
    }
    let content = driver.read_attribute(handle, "textContent").await?;
    Ok(content.unwrap_or_default().trim().to_string())
}
