//! Snapshots of observable page state.
//!
//! A [`Snapshot`] is what the change poller compares. Readers in this module
//! turn driver reads into snapshots and map recoverable read failures to
//! [`Snapshot::Unavailable`], the neutral value that never counts as a
//! change. A lost session is returned as an error.

use crate::driver::{LocateBy, PageDriver};
use crate::locator::{element_text, LocatorChain, LocatorResolver, TextLookup};
use crate::result::{DriverError, DriverResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum list items shown by `Display`
const DISPLAY_LIST_LIMIT: usize = 6;

/// Immutable observation of one piece of page state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Snapshot {
    /// The state could not be read (transient failure)
    Unavailable,
    /// A text value
    Text(String),
    /// An ordered list of values (e.g. dropdown options)
    List(Vec<String>),
    /// A boolean state (enabled, checked)
    Flag(bool),
}

impl Snapshot {
    /// Whether this is the neutral snapshot
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Text content, if this is a text snapshot
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// List content, if this is a list snapshot
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Flag value, if this is a flag snapshot
    #[must_use]
    pub const fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Whether `self` differs from `baseline` in a way that counts as a change
    ///
    /// An unavailable current value is never a change. An unavailable
    /// baseline changes as soon as any value can be read.
    #[must_use]
    pub fn differs_from(&self, baseline: &Self) -> bool {
        match (baseline, self) {
            (_, Self::Unavailable) => false,
            (Self::Unavailable, _) => true,
            (before, after) => before != after,
        }
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => f.write_str("<unavailable>"),
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Flag(flag) => write!(f, "{flag}"),
            Self::List(items) => {
                let shown: Vec<&str> = items
                    .iter()
                    .take(DISPLAY_LIST_LIMIT)
                    .map(String::as_str)
                    .collect();
                write!(f, "[{}", shown.join(", "))?;
                if items.len() > DISPLAY_LIST_LIMIT {
                    write!(f, ", ... +{}", items.len() - DISPLAY_LIST_LIMIT)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Neutral snapshot for a recoverable read failure
///
/// A lost session is not recoverable and is returned as the error.
fn degrade(err: DriverError, what: &str) -> DriverResult<Snapshot> {
    if err.is_fatal() {
        return Err(err);
    }
    debug!(what, %err, "snapshot unavailable");
    Ok(Snapshot::Unavailable)
}

/// Values of every `<option>` under a `<select>`
///
/// Each option contributes its `value` attribute, or its text when the value
/// is empty.
///
/// # Errors
///
/// Only a lost session; other read failures yield `Unavailable`.
pub async fn option_values(driver: &dyn PageDriver, select_css: &str) -> DriverResult<Snapshot> {
    let selector = format!("{select_css} option");
    let options = match driver.find_all(LocateBy::Css, &selector).await {
        Ok(options) => options,
        Err(err) => return degrade(err, &selector),
    };

    let mut values = Vec::with_capacity(options.len());
    for option in &options {
        let value = match driver.read_attribute(option, "value").await {
            Ok(Some(value)) if !value.is_empty() => value,
            Ok(_) => match element_text(driver, option).await {
                Ok(text) => text,
                Err(err) => return degrade(err, &selector),
            },
            Err(err) => return degrade(err, &selector),
        };
        values.push(value);
    }
    Ok(Snapshot::List(values))
}

/// Text of the first chain entry with a usable element
///
/// An element that exists but is empty yields `Text("")`; a chain that
/// matches nothing yields `Unavailable`.
///
/// # Errors
///
/// Only a lost session.
pub async fn chain_text(
    driver: &dyn PageDriver,
    resolver: &LocatorResolver,
    chain: &LocatorChain,
) -> DriverResult<Snapshot> {
    Ok(match resolver.resolve_text(chain, driver).await? {
        TextLookup::Found { text, .. } => Snapshot::Text(text),
        TextLookup::Empty { .. } => Snapshot::Text(String::new()),
        TextLookup::Absent => Snapshot::Unavailable,
    })
}

/// Enabled state of the element a chain resolves to
///
/// # Errors
///
/// Only a lost session.
pub async fn chain_enabled(
    driver: &dyn PageDriver,
    resolver: &LocatorResolver,
    chain: &LocatorChain,
) -> DriverResult<Snapshot> {
    let Some(resolved) = resolver.try_resolve(chain, driver).await? else {
        return Ok(Snapshot::Unavailable);
    };
    match driver.is_enabled(&resolved.handle).await {
        Ok(enabled) => Ok(Snapshot::Flag(enabled)),
        Err(err) => degrade(err, chain.label()),
    }
}

/// Snapshot of a script's return value
///
/// Strings map to `Text`, booleans to `Flag`, arrays to `List`; `null`,
/// other values and script failures map to `Unavailable`.
///
/// # Errors
///
/// Only a lost session.
pub async fn script_value(driver: &dyn PageDriver, source: &str) -> DriverResult<Snapshot> {
    match driver.run_script(source, Vec::new()).await {
        Ok(serde_json::Value::String(text)) => Ok(Snapshot::Text(text.trim().to_string())),
        Ok(serde_json::Value::Bool(flag)) => Ok(Snapshot::Flag(flag)),
        Ok(serde_json::Value::Array(items)) => Ok(Snapshot::List(
            items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        )),
        Ok(_) => Ok(Snapshot::Unavailable),
        Err(err) => degrade(err, "script"),
    }
}
