//! Registration-form scenarios.
//!
//! Reusable steps for the registration page (cascading Country -> State ->
//! City dropdowns, password-strength indicator, inline validation, submit
//! gating, submission and reset) and the three scenarios built from them:
//!
//! - [`logic_scenario`]: dependent dropdowns, strength meter, confirm error,
//!   submit gating
//! - [`negative_scenario`]: a required field left empty shows its error
//! - [`positive_scenario`]: a valid submission succeeds and resets the form

use crate::driver::{ElementHandle, LocateBy, PageDriver, ScriptArg};
use crate::locator::{element_text, LocatorChain, LocatorResolver};
use crate::result::{DriverError, DriverResult, FailureKind};
use crate::scenario::{Scenario, StepContext, ValidationStep};
use crate::snapshot::{chain_enabled, chain_text, option_values, script_value, Snapshot};
use crate::step::Observation;
use crate::wait::{PollOptions, PollOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Country dropdown
pub const COUNTRY_SELECT: &str = "#country";
/// State dropdown
pub const STATE_SELECT: &str = "#state";
/// City dropdown
pub const CITY_SELECT: &str = "#city";

/// First name input id
pub const FIRST_NAME: &str = "firstName";
/// Last name input id
pub const LAST_NAME: &str = "lastName";
/// Email input id
pub const EMAIL: &str = "email";
/// Phone input id
pub const PHONE: &str = "phone";
/// Password input id
pub const PASSWORD: &str = "password";
/// Confirm password input id
pub const CONFIRM_PASSWORD: &str = "confirmPassword";
/// Terms checkbox id
pub const TERMS: &str = "terms";

/// Message expected after a successful submission (case-insensitive)
pub const SUCCESS_TEXT: &str = "registration successful";

/// Detail recorded when an expected error text never appears
pub const ABSENT_OR_EMPTY: &str = "ElementAbsent or empty";

/// Reads the strength meter bar width when no text indicator exists
pub const METER_WIDTH_SCRIPT: &str = "const b = document.querySelector('#pwdMeterBar'); \
     if (!b) return ''; \
     return b.style.width || window.getComputedStyle(b).width || '';";

/// Removes focus from `arguments[0]` so blur validation runs
pub const BLUR_SCRIPT: &str = "arguments[0].blur();";

/// Submits the form owning `arguments[0]` without clicking it
pub const REQUEST_SUBMIT_SCRIPT: &str = "const f = arguments[0].form || document.querySelector('form'); \
     if (!f) return false; \
     if (f.requestSubmit) { f.requestSubmit(); } else { f.dispatchEvent(new Event('submit', { cancelable: true })); } \
     return true;";

/// Values entered into the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormProfile {
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Email address
    pub email: String,
    /// Phone number with country code
    pub phone: String,
    /// Country option value
    pub country: String,
    /// State option value
    pub state: String,
    /// City option value
    pub city: String,
    /// Id of the gender radio to select
    pub gender: String,
    /// Password rated weak by the strength meter
    pub weak_password: String,
    /// Password rated strong by the strength meter
    pub strong_password: String,
    /// Confirm-password value that does not match
    pub mismatch_password: String,
}

impl Default for FormProfile {
    fn default() -> Self {
        Self {
            first_name: "Form".to_string(),
            last_name: "Tester".to_string(),
            email: "form.tester@example.com".to_string(),
            phone: "+919876543210".to_string(),
            country: "IN".to_string(),
            state: "Telangana".to_string(),
            city: "Hyderabad".to_string(),
            gender: "genderMale".to_string(),
            weak_password: "12345".to_string(),
            strong_password: "Str0ngP@ssw0rd!".to_string(),
            mismatch_password: "WrongPassword".to_string(),
        }
    }
}

/// Wait budgets used by the form steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormTimings {
    /// Default wait (strength indicator, confirm error, submit state, reset)
    pub poll: PollOptions,
    /// Wait for a dependent dropdown to repopulate
    pub option_wait: Duration,
    /// Wait for a required-field error
    pub error_wait: Duration,
    /// Wait for the success message
    pub message_wait: Duration,
    /// Settle delay after selecting a dropdown option
    pub select_settle: Duration,
}

impl Default for FormTimings {
    fn default() -> Self {
        Self {
            poll: PollOptions::default(),
            option_wait: Duration::from_secs(5),
            error_wait: Duration::from_secs(5),
            message_wait: Duration::from_secs(6),
            select_settle: Duration::from_millis(350),
        }
    }
}

impl FormTimings {
    fn wait(&self, timeout: Duration) -> PollOptions {
        self.poll.with_timeout(timeout)
    }
}

fn field_chain(id: &str) -> LocatorChain {
    LocatorChain::new(id).id(id)
}

/// Password strength indicator
#[must_use]
pub fn strength_indicator_chain() -> LocatorChain {
    LocatorChain::new("password strength")
        .css(".pwdText")
        .id("pwdText")
        .css(".pwd-text")
        .css("#pwdMeterBar")
}

/// Inline confirm-password error
#[must_use]
pub fn confirm_error_chain() -> LocatorChain {
    LocatorChain::new("confirm-password error")
        .id("confirmErr")
        .id("confirmPasswordErr")
        .css("#confirmPassword + .error")
        .css(".confirm-password-error")
        .css(".error")
        .xpath("//*[contains(@id,'confirm') and contains(translate(@class,'ERROR','error'),'err')]")
}

/// Inline last-name error
#[must_use]
pub fn last_name_error_chain() -> LocatorChain {
    LocatorChain::new("last-name error")
        .id("lastNameErr")
        .css("#lastName + .error")
        .css("#lastName ~ .error")
}

/// Submit button
#[must_use]
pub fn submit_chain() -> LocatorChain {
    LocatorChain::new("submit button")
        .id("submitBtn")
        .css("button[type='submit']")
}

/// Success message after submission
#[must_use]
pub fn success_message_chain() -> LocatorChain {
    LocatorChain::new("success message")
        .id("topAlert")
        .id("formMessage")
}

/// Element screenshotted as evidence instead of the full page
#[must_use]
pub fn evidence_focus_chain() -> LocatorChain {
    LocatorChain::new("form container")
        .css("form")
        .css("body > div")
}

/// Gender radio, falling back to the first radio of the group
#[must_use]
pub fn gender_chain(id: &str) -> LocatorChain {
    LocatorChain::new("gender")
        .id(id)
        .css("input[type='radio'][name='gender']")
}

/// Strength indicator text, falling back to the meter bar width
///
/// # Errors
///
/// Only a lost session.
pub async fn strength_snapshot(
    driver: &dyn PageDriver,
    resolver: &LocatorResolver,
) -> DriverResult<Snapshot> {
    match chain_text(driver, resolver, &strength_indicator_chain()).await? {
        Snapshot::Text(text) if !text.is_empty() => Ok(Snapshot::Text(text)),
        _ => script_value(driver, METER_WIDTH_SCRIPT).await,
    }
}

fn is_filled_text(snapshot: &Snapshot) -> bool {
    snapshot.as_text().is_some_and(|text| !text.is_empty())
}

/// Snapshot a wait ended on
fn final_snapshot(outcome: PollOutcome) -> Snapshot {
    match outcome {
        PollOutcome::Changed { snapshot, .. } => snapshot,
        PollOutcome::TimedOut { last, .. } => last,
        PollOutcome::Cancelled { .. } => Snapshot::Unavailable,
    }
}

async fn option_value(driver: &dyn PageDriver, option: &ElementHandle) -> DriverResult<String> {
    match driver.read_attribute(option, "value").await? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => element_text(driver, option).await,
    }
}

/// Select an option of `select_css`
///
/// Picks the option whose value equals `preferred`, else the first one that
/// contains it, else the second option (the first real choice after the
/// placeholder). Returns the chosen value.
///
/// # Errors
///
/// `ElementAbsent` when the dropdown has fewer than two options and nothing
/// matches; any driver error from reading or clicking.
pub async fn choose_option(ctx: &StepContext<'_>, select_css: &str, preferred: &str) -> DriverResult<String> {
    let selector = format!("{select_css} option");
    let options = ctx.driver.find_all(LocateBy::Css, &selector).await?;

    let mut values = Vec::with_capacity(options.len());
    for option in &options {
        values.push(option_value(ctx.driver, option).await?);
    }

    let index = values
        .iter()
        .position(|value| value == preferred)
        .or_else(|| {
            (!preferred.is_empty())
                .then(|| values.iter().position(|value| value.contains(preferred)))
                .flatten()
        })
        .or_else(|| (options.len() > 1).then_some(1))
        .ok_or_else(|| DriverError::absent(format!("{selector} ({preferred})")))?;

    debug!(select = select_css, value = %values[index], "choosing option");
    ctx.driver.click(&options[index]).await?;
    Ok(values[index].clone())
}

/// Clear an input and type `value`
///
/// # Errors
///
/// `ElementAbsent` when the field is missing; any driver error.
pub async fn set_field(ctx: &StepContext<'_>, id: &str, value: &str) -> DriverResult<ElementHandle> {
    let field = ctx.require(&field_chain(id)).await?;
    ctx.driver.clear(&field).await?;
    ctx.driver.type_text(&field, value).await?;
    Ok(field)
}

/// Blur an element so change validation runs
///
/// # Errors
///
/// Any driver error from running the script.
pub async fn blur(ctx: &StepContext<'_>, element: &ElementHandle) -> DriverResult<()> {
    ctx.driver
        .run_script(BLUR_SCRIPT, vec![ScriptArg::from(element.clone())])
        .await
        .map(|_| ())
}

/// Click a checkbox or radio unless it is already selected
///
/// # Errors
///
/// `ElementAbsent` when nothing matches; any driver error.
pub async fn ensure_selected(ctx: &StepContext<'_>, chain: &LocatorChain) -> DriverResult<()> {
    let element = ctx.require(chain).await?;
    if !ctx.driver.is_selected(&element).await? {
        ctx.driver.click(&element).await?;
    }
    Ok(())
}

/// Select country, state and city, waiting for each dependent list
///
/// # Errors
///
/// Any error from [`choose_option`].
pub async fn select_location(
    ctx: &StepContext<'_>,
    profile: &FormProfile,
    timings: &FormTimings,
) -> DriverResult<()> {
    select_location_from(ctx, profile, timings, 0).await
}

/// Cascade starting at level `start` (0 country, 1 state, 2 city)
async fn select_location_from(
    ctx: &StepContext<'_>,
    profile: &FormProfile,
    timings: &FormTimings,
    start: usize,
) -> DriverResult<()> {
    let wait = timings.wait(timings.option_wait);
    let cascade = [
        (COUNTRY_SELECT, profile.country.as_str(), Some((STATE_SELECT, profile.state.as_str()))),
        (STATE_SELECT, profile.state.as_str(), Some((CITY_SELECT, profile.city.as_str()))),
        (CITY_SELECT, profile.city.as_str(), None),
    ];

    for (select, value, dependent) in cascade.into_iter().skip(start) {
        choose_option(ctx, select, value).await?;
        if let Some((child, expected)) = dependent {
            let outcome = ctx
                .poller
                .await_until(
                    || option_values(ctx.driver, child),
                    |snapshot| {
                        snapshot
                            .as_list()
                            .is_some_and(|items| items.iter().any(|item| item.contains(expected)))
                    },
                    &wait,
                )
                .await?;
            if !outcome.is_changed() {
                debug!(child, expected, "dependent options did not populate in time");
            }
        }
    }
    Ok(())
}

/// Complete the location cascade from the first empty dropdown
///
/// Dropdowns that already hold a value are left alone.
///
/// # Errors
///
/// `ElementAbsent` when a dropdown is missing; any error from
/// [`choose_option`].
pub async fn ensure_location(
    ctx: &StepContext<'_>,
    profile: &FormProfile,
    timings: &FormTimings,
) -> DriverResult<()> {
    for (level, id) in ["country", "state", "city"].into_iter().enumerate() {
        let select = ctx.require(&field_chain(id)).await?;
        let value = ctx.driver.read_attribute(&select, "value").await?;
        if value.map_or(true, |value| value.is_empty()) {
            return select_location_from(ctx, profile, timings, level).await;
        }
    }
    Ok(())
}

/// Fill every form field except those listed in `skip`
///
/// # Errors
///
/// The first driver error; a missing field is `ElementAbsent`.
pub async fn fill_form(
    ctx: &StepContext<'_>,
    profile: &FormProfile,
    timings: &FormTimings,
    skip: &[&str],
) -> DriverResult<()> {
    let wanted = |id: &str| !skip.contains(&id);

    for (id, value) in [
        (FIRST_NAME, &profile.first_name),
        (LAST_NAME, &profile.last_name),
        (EMAIL, &profile.email),
    ] {
        if wanted(id) {
            set_field(ctx, id, value).await?;
        }
    }
    select_location(ctx, profile, timings).await?;
    if wanted(PHONE) {
        set_field(ctx, PHONE, &profile.phone).await?;
    }
    ensure_selected(ctx, &gender_chain(&profile.gender)).await?;
    if wanted(PASSWORD) {
        set_field(ctx, PASSWORD, &profile.strong_password).await?;
    }
    if wanted(CONFIRM_PASSWORD) {
        set_field(ctx, CONFIRM_PASSWORD, &profile.strong_password).await?;
    }
    if wanted(TERMS) {
        ensure_selected(ctx, &field_chain(TERMS)).await?;
    }
    Ok(())
}

/// Wait for a text-bearing chain to show non-empty text
async fn text_appears(
    ctx: &StepContext<'_>,
    chain: &LocatorChain,
    wait: &PollOptions,
) -> DriverResult<Observation> {
    let outcome = ctx
        .poller
        .await_until(|| chain_text(ctx.driver, ctx.resolver, chain), is_filled_text, wait)
        .await?;
    Ok(match outcome {
        PollOutcome::Changed { snapshot, .. } => Observation::pass(snapshot.to_string()),
        PollOutcome::TimedOut { .. } => Observation::fail(FailureKind::ElementAbsent, ABSENT_OR_EMPTY),
        PollOutcome::Cancelled { .. } => {
            Observation::fail(FailureKind::Cancelled, format!("{}: run cancelled", chain.label()))
        }
    })
}

/// Fields that still hold a value, as a list snapshot
///
/// Returns `Unavailable` when the page cannot be read.
///
/// # Errors
///
/// Only a lost session.
pub async fn reset_issues(driver: &dyn PageDriver, resolver: &LocatorResolver) -> DriverResult<Snapshot> {
    async fn collect(driver: &dyn PageDriver, resolver: &LocatorResolver) -> DriverResult<Vec<String>> {
        let mut issues = Vec::new();
        let inputs = [FIRST_NAME, LAST_NAME, EMAIL, PHONE, PASSWORD, CONFIRM_PASSWORD];
        let selects = ["country", "state", "city"];

        for id in inputs.into_iter().chain(selects) {
            let Some(found) = resolver.try_resolve(&field_chain(id), driver).await? else {
                issues.push(format!("{id} missing"));
                continue;
            };
            let value = driver
                .read_attribute(&found.handle, "value")
                .await?
                .unwrap_or_default();
            if !value.trim().is_empty() {
                issues.push(format!("{id} not reset (value='{}')", value.trim()));
            }
        }

        match resolver.try_resolve(&field_chain(TERMS), driver).await? {
            Some(found) => {
                if driver.is_selected(&found.handle).await? {
                    issues.push("terms checkbox still selected".to_string());
                }
            }
            None => issues.push(format!("{TERMS} missing")),
        }
        Ok(issues)
    }

    match collect(driver, resolver).await {
        Ok(issues) => Ok(Snapshot::List(issues)),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            debug!(%err, "reset state unavailable");
            Ok(Snapshot::Unavailable)
        }
    }
}

/// Selecting an option in one dropdown repopulates another
#[derive(Debug, Clone)]
pub struct DependentSelect {
    name: String,
    parent: String,
    child: String,
    preferred: String,
    settle: Duration,
    wait: PollOptions,
}

impl DependentSelect {
    /// Select `preferred` in `parent` and expect `child` options to change
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        parent: impl Into<String>,
        child: impl Into<String>,
        preferred: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parent: parent.into(),
            child: child.into(),
            preferred: preferred.into(),
            settle: Duration::ZERO,
            wait: PollOptions::default(),
        }
    }

    /// Delay after selecting before polling
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Wait options for the repopulation
    #[must_use]
    pub const fn with_wait(mut self, wait: PollOptions) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl ValidationStep for DependentSelect {
    fn name(&self) -> &str {
        &self.name
    }

    fn settle_delay(&self) -> Option<Duration> {
        Some(self.settle)
    }

    async fn baseline(&self, ctx: &StepContext<'_>) -> DriverResult<Snapshot> {
        option_values(ctx.driver, &self.child).await
    }

    async fn act(&self, ctx: &StepContext<'_>) -> DriverResult<()> {
        choose_option(ctx, &self.parent, &self.preferred).await.map(|_| ())
    }

    async fn verify(&self, ctx: &StepContext<'_>, baseline: Snapshot) -> DriverResult<Observation> {
        let outcome = ctx
            .poller
            .await_change(|| option_values(ctx.driver, &self.child), &baseline, &self.wait)
            .await?;
        Ok(Observation::from_poll(&outcome, &format!("{} options", self.child)))
    }
}

/// The strength indicator changes between a weak and a strong password
#[derive(Debug, Clone)]
pub struct StrengthMeter {
    name: String,
    weak: String,
    strong: String,
    wait: PollOptions,
}

impl StrengthMeter {
    /// Type `weak`, then `strong`, and expect the indicator to change
    #[must_use]
    pub fn new(name: impl Into<String>, weak: impl Into<String>, strong: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weak: weak.into(),
            strong: strong.into(),
            wait: PollOptions::default(),
        }
    }

    /// Wait options for each indicator reading
    #[must_use]
    pub const fn with_wait(mut self, wait: PollOptions) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl ValidationStep for StrengthMeter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn baseline(&self, ctx: &StepContext<'_>) -> DriverResult<Snapshot> {
        set_field(ctx, PASSWORD, &self.weak).await?;
        let outcome = ctx
            .poller
            .await_until(|| strength_snapshot(ctx.driver, ctx.resolver), is_filled_text, &self.wait)
            .await?;
        Ok(final_snapshot(outcome))
    }

    async fn act(&self, ctx: &StepContext<'_>) -> DriverResult<()> {
        set_field(ctx, PASSWORD, &self.strong).await.map(|_| ())
    }

    async fn verify(&self, ctx: &StepContext<'_>, baseline: Snapshot) -> DriverResult<Observation> {
        if !is_filled_text(&baseline) {
            return Ok(Observation::fail(
                FailureKind::ElementAbsent,
                "strength indicator not rendered for the weak password",
            ));
        }
        let outcome = ctx
            .poller
            .await_until(
                || strength_snapshot(ctx.driver, ctx.resolver),
                |current| is_filled_text(current) && current != &baseline,
                &self.wait,
            )
            .await?;
        Ok(match outcome {
            PollOutcome::Changed { snapshot, .. } => Observation::pass(format!("{baseline} -> {snapshot}")),
            PollOutcome::TimedOut { .. } => Observation::fail(
                FailureKind::TimeoutExceeded,
                format!("strength indicator unchanged: {baseline}"),
            ),
            PollOutcome::Cancelled { .. } => {
                Observation::fail(FailureKind::Cancelled, "strength indicator: run cancelled")
            }
        })
    }
}

/// A non-matching confirm password shows an inline error after blur
#[derive(Debug, Clone)]
pub struct ConfirmMismatch {
    name: String,
    mismatch: String,
    wait: PollOptions,
}

impl ConfirmMismatch {
    /// Enter `mismatch` as the confirm password
    #[must_use]
    pub fn new(name: impl Into<String>, mismatch: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mismatch: mismatch.into(),
            wait: PollOptions::default(),
        }
    }

    /// Wait options for the error to render
    #[must_use]
    pub const fn with_wait(mut self, wait: PollOptions) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl ValidationStep for ConfirmMismatch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn act(&self, ctx: &StepContext<'_>) -> DriverResult<()> {
        let confirm = set_field(ctx, CONFIRM_PASSWORD, &self.mismatch).await?;
        blur(ctx, &confirm).await
    }

    async fn verify(&self, ctx: &StepContext<'_>, _baseline: Snapshot) -> DriverResult<Observation> {
        text_appears(ctx, &confirm_error_chain(), &self.wait).await
    }
}

/// Submit stays disabled while confirm mismatches and enables once fixed
#[derive(Debug, Clone)]
pub struct SubmitGating {
    name: String,
    profile: FormProfile,
    timings: FormTimings,
    settle: Duration,
    wait: PollOptions,
}

impl SubmitGating {
    /// Fill the remaining fields from `profile`, keeping confirm wrong
    #[must_use]
    pub fn new(name: impl Into<String>, profile: FormProfile, timings: FormTimings) -> Self {
        Self {
            name: name.into(),
            profile,
            timings,
            settle: Duration::from_millis(400),
            wait: timings.poll,
        }
    }

    /// Delay between filling and reading the disabled state
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Wait options for the button to enable
    #[must_use]
    pub const fn with_wait(mut self, wait: PollOptions) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl ValidationStep for SubmitGating {
    fn name(&self) -> &str {
        &self.name
    }

    async fn baseline(&self, ctx: &StepContext<'_>) -> DriverResult<Snapshot> {
        for (id, value) in [
            (FIRST_NAME, &self.profile.first_name),
            (LAST_NAME, &self.profile.last_name),
            (EMAIL, &self.profile.email),
            (PHONE, &self.profile.phone),
        ] {
            set_field(ctx, id, value).await?;
        }
        ensure_location(ctx, &self.profile, &self.timings).await?;
        ensure_selected(ctx, &gender_chain(&self.profile.gender)).await?;
        ensure_selected(ctx, &field_chain(TERMS)).await?;
        ctx.settle(self.settle).await;
        chain_enabled(ctx.driver, ctx.resolver, &submit_chain()).await
    }

    async fn act(&self, ctx: &StepContext<'_>) -> DriverResult<()> {
        let confirm = set_field(ctx, CONFIRM_PASSWORD, &self.profile.strong_password).await?;
        blur(ctx, &confirm).await
    }

    async fn verify(&self, ctx: &StepContext<'_>, baseline: Snapshot) -> DriverResult<Observation> {
        match baseline.as_flag() {
            None => {
                return Ok(Observation::fail(
                    FailureKind::ElementAbsent,
                    "submit button not found before fixing confirm password",
                ))
            }
            Some(true) => {
                return Ok(Observation::mismatch(
                    "submit enabled while confirm password mismatched",
                ))
            }
            Some(false) => {}
        }
        let submit = submit_chain();
        let outcome = ctx
            .poller
            .await_until(
                || chain_enabled(ctx.driver, ctx.resolver, &submit),
                |s| s.as_flag() == Some(true),
                &self.wait,
            )
            .await?;
        Ok(match outcome {
            PollOutcome::Changed { .. } => {
                Observation::pass("disabled while invalid, enabled once confirm matched")
            }
            PollOutcome::TimedOut { .. } => Observation::fail(
                FailureKind::TimeoutExceeded,
                "submit still disabled after confirm password matched",
            ),
            PollOutcome::Cancelled { .. } => Observation::fail(FailureKind::Cancelled, "run cancelled"),
        })
    }
}

/// Submitting with a required field empty shows that field's error
#[derive(Debug, Clone)]
pub struct RequiredFieldError {
    name: String,
    field: String,
    error: LocatorChain,
    profile: FormProfile,
    timings: FormTimings,
}

impl RequiredFieldError {
    /// Leave `field` empty and expect `error` to show text
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        error: LocatorChain,
        profile: FormProfile,
        timings: FormTimings,
    ) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            error,
            profile,
            timings,
        }
    }
}

#[async_trait]
impl ValidationStep for RequiredFieldError {
    fn name(&self) -> &str {
        &self.name
    }

    async fn act(&self, ctx: &StepContext<'_>) -> DriverResult<()> {
        fill_form(ctx, &self.profile, &self.timings, &[self.field.as_str()]).await?;
        let submit = ctx.require(&submit_chain()).await?;
        if ctx.driver.is_enabled(&submit).await? {
            ctx.driver.click(&submit).await
        } else {
            debug!(field = %self.field, "submit disabled, requesting form submission");
            ctx.driver
                .run_script(REQUEST_SUBMIT_SCRIPT, vec![ScriptArg::from(submit)])
                .await
                .map(|_| ())
        }
    }

    async fn verify(&self, ctx: &StepContext<'_>, _baseline: Snapshot) -> DriverResult<Observation> {
        let wait = self.timings.wait(self.timings.error_wait);
        text_appears(ctx, &self.error, &wait).await
    }
}

/// A fully valid form enables the submit button
#[derive(Debug, Clone)]
pub struct SubmitEnabled {
    name: String,
    profile: FormProfile,
    timings: FormTimings,
}

impl SubmitEnabled {
    /// Fill the form from `profile`
    #[must_use]
    pub fn new(name: impl Into<String>, profile: FormProfile, timings: FormTimings) -> Self {
        Self {
            name: name.into(),
            profile,
            timings,
        }
    }
}

#[async_trait]
impl ValidationStep for SubmitEnabled {
    fn name(&self) -> &str {
        &self.name
    }

    async fn act(&self, ctx: &StepContext<'_>) -> DriverResult<()> {
        fill_form(ctx, &self.profile, &self.timings, &[]).await
    }

    async fn verify(&self, ctx: &StepContext<'_>, _baseline: Snapshot) -> DriverResult<Observation> {
        let submit = submit_chain();
        let outcome = ctx
            .poller
            .await_until(
                || chain_enabled(ctx.driver, ctx.resolver, &submit),
                |s| s.as_flag() == Some(true),
                &self.timings.poll,
            )
            .await?;
        if !outcome.is_changed() {
            ctx.evidence.capture("submit-disabled-debug", ctx.driver).await;
        }
        Ok(Observation::from_poll(&outcome, "submit enabled"))
    }
}

/// Submitting shows the success message
#[derive(Debug, Clone)]
pub struct SuccessMessage {
    name: String,
    wait: PollOptions,
}

impl SuccessMessage {
    /// Click submit and expect the success message
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wait: FormTimings::default().wait(Duration::from_secs(6)),
        }
    }

    /// Wait options for the message
    #[must_use]
    pub const fn with_wait(mut self, wait: PollOptions) -> Self {
        self.wait = wait;
        self
    }
}

fn is_success(snapshot: &Snapshot) -> bool {
    snapshot
        .as_text()
        .is_some_and(|text| text.to_lowercase().contains(SUCCESS_TEXT))
}

#[async_trait]
impl ValidationStep for SuccessMessage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn act(&self, ctx: &StepContext<'_>) -> DriverResult<()> {
        let submit = ctx.require(&submit_chain()).await?;
        ctx.driver.click(&submit).await
    }

    async fn verify(&self, ctx: &StepContext<'_>, _baseline: Snapshot) -> DriverResult<Observation> {
        let chain = success_message_chain();
        let outcome = ctx
            .poller
            .await_until(|| chain_text(ctx.driver, ctx.resolver, &chain), is_success, &self.wait)
            .await?;
        Ok(match outcome {
            PollOutcome::Changed { snapshot, .. } => Observation::pass(snapshot.to_string()),
            PollOutcome::TimedOut { last, .. } if is_filled_text(&last) => {
                Observation::mismatch(format!("unexpected message {last}"))
            }
            PollOutcome::TimedOut { .. } => {
                Observation::fail(FailureKind::ElementAbsent, "no success message shown")
            }
            PollOutcome::Cancelled { .. } => Observation::fail(FailureKind::Cancelled, "run cancelled"),
        })
    }
}

/// After submission every field is cleared
#[derive(Debug, Clone)]
pub struct FormReset {
    name: String,
    wait: PollOptions,
}

impl FormReset {
    /// Expect inputs, dropdowns and the terms checkbox to be cleared
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wait: PollOptions::default(),
        }
    }

    /// Wait options for the reset
    #[must_use]
    pub const fn with_wait(mut self, wait: PollOptions) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl ValidationStep for FormReset {
    fn name(&self) -> &str {
        &self.name
    }

    async fn act(&self, _ctx: &StepContext<'_>) -> DriverResult<()> {
        Ok(())
    }

    async fn verify(&self, ctx: &StepContext<'_>, _baseline: Snapshot) -> DriverResult<Observation> {
        let outcome = ctx
            .poller
            .await_until(
                || reset_issues(ctx.driver, ctx.resolver),
                |s| s.as_list().is_some_and(<[String]>::is_empty),
                &self.wait,
            )
            .await?;
        Ok(match final_snapshot(outcome) {
            Snapshot::List(issues) if issues.is_empty() => Observation::pass("all fields cleared"),
            Snapshot::List(issues) => Observation::mismatch(issues.join("; ")),
            _ => Observation::fail(FailureKind::TransientReadFailure, "form state could not be read"),
        })
    }
}

/// Dependent dropdowns, strength meter, confirm error and submit gating
#[must_use]
pub fn logic_scenario(profile: &FormProfile, timings: &FormTimings) -> Scenario {
    let options = timings.wait(timings.option_wait);
    Scenario::builder("form-logic")
        .step(
            DependentSelect::new("states_updated", COUNTRY_SELECT, STATE_SELECT, &profile.country)
                .with_settle(timings.select_settle)
                .with_wait(options),
        )
        .step(
            DependentSelect::new("cities_updated", STATE_SELECT, CITY_SELECT, &profile.state)
                .with_settle(timings.select_settle)
                .with_wait(options),
        )
        .step(
            StrengthMeter::new("pwd_meter_changed", &profile.weak_password, &profile.strong_password)
                .with_wait(timings.poll),
        )
        .step(ConfirmMismatch::new("confirm_error_shown", &profile.mismatch_password).with_wait(timings.poll))
        .step(SubmitGating::new("submit_disabled_until_valid", profile.clone(), *timings))
        .build()
}

/// Required last name left empty
#[must_use]
pub fn negative_scenario(profile: &FormProfile, timings: &FormTimings) -> Scenario {
    Scenario::builder("negative")
        .step(RequiredFieldError::new(
            "last_name_error_shown",
            LAST_NAME,
            last_name_error_chain(),
            profile.clone(),
            *timings,
        ))
        .build()
}

/// Valid submission, success message, form reset
#[must_use]
pub fn positive_scenario(profile: &FormProfile, timings: &FormTimings) -> Scenario {
    Scenario::builder("positive")
        .step(SubmitEnabled::new("submit_enabled", profile.clone(), *timings))
        .step(SuccessMessage::new("success_message_shown").with_wait(timings.wait(timings.message_wait)))
        .step(FormReset::new("form_reset").with_wait(timings.poll))
        .build()
}

/// The scenarios this crate ships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormScenario {
    /// [`logic_scenario`]
    Logic,
    /// [`negative_scenario`]
    Negative,
    /// [`positive_scenario`]
    Positive,
}

impl FormScenario {
    /// Build the scenario
    #[must_use]
    pub fn build(self, profile: &FormProfile, timings: &FormTimings) -> Scenario {
        match self {
            Self::Logic => logic_scenario(profile, timings),
            Self::Negative => negative_scenario(profile, timings),
            Self::Positive => positive_scenario(profile, timings),
        }
    }
}
