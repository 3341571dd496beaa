//! Simulated registration page on the mock driver.
//!
//! Mirrors the real page's behavior: cascading Country -> State -> City
//! dropdowns that repopulate after a delay, a password strength indicator,
//! confirm-password validation on blur, submit gating, and a submit that
//! shows a banner and resets the form. `PageBehavior` switches individual
//! features off to model broken pages.

#![allow(dead_code, clippy::unwrap_used)]

use formprobe::mock::{MockDom, NodeId};
use formprobe::{LocatorStrategy, MockDriver, MockElement, ScriptArg, SharedClock, VirtualClock};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

type States = &'static [(&'static str, &'static [&'static str])];

/// Country code, name, states with cities
pub const LOCATIONS: &[(&str, &str, States)] = &[
    (
        "IN",
        "India",
        &[
            ("Telangana", &["Hyderabad", "Warangal"]),
            ("Maharashtra", &["Mumbai", "Pune"]),
        ],
    ),
    ("US", "United States", &[("California", &["Los Angeles", "San Francisco"])]),
];

pub const SUCCESS_BANNER: &str = "Registration Successful! Your profile has been submitted successfully.";
pub const ERROR_BANNER: &str = "Please fix the highlighted errors and try again.";

/// How the strength meter renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meter {
    /// `#pwdText` shows "Strength: X"
    Text,
    /// Only the bar exists; its width tracks the score
    BarOnly,
    /// Neither exists
    Missing,
}

/// Submit button behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Enabled exactly when the form is valid
    Validates,
    /// Always enabled
    AlwaysEnabled,
    /// Never enabled
    NeverEnabled,
}

#[derive(Debug, Clone, Copy)]
pub struct PageBehavior {
    pub repopulate_delay: Duration,
    pub meter_delay: Duration,
    pub meter: Meter,
    pub gate: Gate,
    pub confirm_error: bool,
    pub last_name_error: bool,
    pub success_banner: bool,
    pub reset_after_submit: bool,
    pub cascade: bool,
}

impl Default for PageBehavior {
    fn default() -> Self {
        Self {
            repopulate_delay: Duration::from_millis(600),
            meter_delay: Duration::from_millis(200),
            meter: Meter::Text,
            gate: Gate::Validates,
            confirm_error: true,
            last_name_error: true,
            success_banner: true,
            reset_after_submit: true,
            cascade: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageIds {
    pub form: NodeId,
    pub first_name: NodeId,
    pub last_name: NodeId,
    pub email: NodeId,
    pub phone: NodeId,
    pub password: NodeId,
    pub confirm: NodeId,
    pub country: NodeId,
    pub state: NodeId,
    pub city: NodeId,
    pub gender_male: NodeId,
    pub gender_female: NodeId,
    pub terms: NodeId,
    pub submit: NodeId,
    pub pwd_text: Option<NodeId>,
    pub confirm_err: NodeId,
    pub last_name_err: NodeId,
    pub top_alert: NodeId,
    pub form_message: NodeId,
}

pub struct RegistrationPage {
    pub driver: MockDriver,
    pub clock: Arc<VirtualClock>,
    pub ids: PageIds,
}

impl RegistrationPage {
    pub fn new() -> Self {
        Self::with_behavior(PageBehavior::default())
    }

    pub fn with_behavior(behavior: PageBehavior) -> Self {
        let clock = VirtualClock::shared();
        let driver = MockDriver::with_clock(clock.clone());
        let ids = driver.with_dom(|dom| build(dom, behavior));

        driver.on_script("blur()", move |dom, args| {
            if let Some(ScriptArg::Element(handle)) = args.first() {
                if dom.node_of(handle) == Some(ids.confirm) && behavior.confirm_error {
                    check_confirm(dom, ids);
                }
            }
            Ok(Value::Null)
        });
        driver.on_script("requestSubmit", move |dom, _| {
            submit(dom, ids, behavior);
            Ok(json!(true))
        });
        if behavior.meter == Meter::BarOnly {
            driver.on_script("pwdMeterBar", move |dom, _| {
                let score = strength(&dom.value(ids.password));
                Ok(json!(format!("{}%", score * 25)))
            });
        }

        Self { driver, clock, ids }
    }

    pub fn shared_clock(&self) -> SharedClock {
        self.clock.clone()
    }

    pub fn value(&self, node: NodeId) -> String {
        self.driver.with_dom(|dom| dom.value(node))
    }

    pub fn text(&self, node: NodeId) -> String {
        self.driver.with_dom(|dom| {
            dom.element(node)
                .map(|element| element.text().to_string())
                .unwrap_or_default()
        })
    }

    pub fn is_enabled(&self, node: NodeId) -> bool {
        self.driver
            .with_dom(|dom| dom.element(node).is_some_and(MockElement::is_enabled))
    }

    pub fn is_selected(&self, node: NodeId) -> bool {
        self.driver.with_dom(|dom| dom.is_selected(node))
    }
}

fn input(dom: &mut MockDom, id: &str, kind: &str) -> NodeId {
    dom.insert(
        LocatorStrategy::id(id),
        MockElement::new("input").with_attribute("type", kind).with_value(""),
    )
}

fn div(dom: &mut MockDom, id: &str) -> NodeId {
    dom.insert(
        LocatorStrategy::id(id),
        MockElement::new("div").with_attribute("class", "error"),
    )
}

fn radio(dom: &mut MockDom, id: &str, value: &str) -> NodeId {
    let node = dom.insert(
        LocatorStrategy::id(id),
        MockElement::new("input")
            .with_attribute("type", "radio")
            .with_attribute("name", "gender")
            .with_value(value),
    );
    dom.bind(LocatorStrategy::css("input[type='radio'][name='gender']"), node);
    node
}

fn build(dom: &mut MockDom, behavior: PageBehavior) -> PageIds {
    let form = dom.insert(LocatorStrategy::css("form"), MockElement::new("form"));
    let first_name = input(dom, "firstName", "text");
    let last_name = input(dom, "lastName", "text");
    let email = input(dom, "email", "email");
    let phone = input(dom, "phone", "tel");
    let password = input(dom, "password", "password");
    let confirm = input(dom, "confirmPassword", "password");
    let country = dom.insert(LocatorStrategy::id("country"), MockElement::new("select").with_value(""));
    let state = dom.insert(LocatorStrategy::id("state"), MockElement::new("select").with_value(""));
    let city = dom.insert(LocatorStrategy::id("city"), MockElement::new("select").with_value(""));
    let gender_male = radio(dom, "genderMale", "male");
    let gender_female = radio(dom, "genderFemale", "female");
    let terms = dom.insert(
        LocatorStrategy::id("terms"),
        MockElement::new("input").with_attribute("type", "checkbox"),
    );

    let mut button = MockElement::new("button")
        .with_attribute("type", "submit")
        .with_text("Submit");
    if behavior.gate != Gate::AlwaysEnabled {
        button = button.disabled();
    }
    let submit_btn = dom.insert(LocatorStrategy::id("submitBtn"), button);
    dom.bind(LocatorStrategy::css("button[type='submit']"), submit_btn);

    let pwd_text = (behavior.meter == Meter::Text)
        .then(|| dom.insert(LocatorStrategy::id("pwdText"), MockElement::new("div")));
    let confirm_err = div(dom, "confirmErr");
    let last_name_err = div(dom, "lastNameErr");
    let top_alert = dom.insert(LocatorStrategy::id("topAlert"), MockElement::new("div").hidden());
    let form_message = dom.insert(LocatorStrategy::id("formMessage"), MockElement::new("div"));

    let ids = PageIds {
        form,
        first_name,
        last_name,
        email,
        phone,
        password,
        confirm,
        country,
        state,
        city,
        gender_male,
        gender_female,
        terms,
        submit: submit_btn,
        pwd_text,
        confirm_err,
        last_name_err,
        top_alert,
        form_message,
    };

    for node in [first_name, last_name, email, phone, confirm] {
        dom.on_input(node, Duration::ZERO, move |dom, _| {
            validate(dom, ids, behavior);
        });
    }
    dom.on_input(password, Duration::ZERO, move |dom, _| {
        validate(dom, ids, behavior);
    });
    dom.on_input(password, behavior.meter_delay, move |dom, _| update_meter(dom, ids));
    for node in [gender_male, gender_female, terms] {
        dom.on_click(node, Duration::ZERO, move |dom, _| {
            validate(dom, ids, behavior);
        });
    }
    dom.on_click(submit_btn, Duration::ZERO, move |dom, _| submit(dom, ids, behavior));

    populate_countries(dom, ids, behavior);
    populate_states(dom, ids, behavior, "");
    populate_cities(dom, ids, behavior, "");
    ids
}

fn option(value: &str, text: &str) -> MockElement {
    MockElement::new("option").with_value(value).with_text(text)
}

fn populate_countries(dom: &mut MockDom, ids: PageIds, behavior: PageBehavior) {
    let mut options = vec![option("", "-- Select Country --")];
    options.extend(LOCATIONS.iter().map(|(code, name, _)| option(code, name)));
    for node in dom.replace(&LocatorStrategy::css("#country option"), options) {
        dom.on_click(node, Duration::ZERO, move |dom, node| {
            let code = dom.value(node);
            dom.set_value(ids.country, code.clone());
            dom.set_value(ids.state, "");
            dom.set_value(ids.city, "");
            if behavior.cascade {
                dom.schedule(behavior.repopulate_delay, move |dom| {
                    populate_states(dom, ids, behavior, &code);
                    populate_cities(dom, ids, behavior, "");
                });
            }
            validate(dom, ids, behavior);
        });
    }
}

fn populate_states(dom: &mut MockDom, ids: PageIds, behavior: PageBehavior, country: &str) {
    let mut options = vec![option("", "-- Select State --")];
    if let Some((_, _, states)) = LOCATIONS.iter().find(|(code, _, _)| *code == country) {
        options.extend(states.iter().map(|(name, _)| option(name, name)));
    }
    for node in dom.replace(&LocatorStrategy::css("#state option"), options) {
        dom.on_click(node, Duration::ZERO, move |dom, node| {
            let state = dom.value(node);
            dom.set_value(ids.state, state.clone());
            dom.set_value(ids.city, "");
            if behavior.cascade {
                dom.schedule(behavior.repopulate_delay, move |dom| {
                    populate_cities(dom, ids, behavior, &state);
                });
            }
            validate(dom, ids, behavior);
        });
    }
}

fn populate_cities(dom: &mut MockDom, ids: PageIds, behavior: PageBehavior, state: &str) {
    let mut options = vec![option("", "-- Select City --")];
    let cities = LOCATIONS
        .iter()
        .flat_map(|(_, _, states)| states.iter())
        .find(|(name, _)| *name == state)
        .map(|(_, cities)| *cities)
        .unwrap_or_default();
    options.extend(cities.iter().map(|city| option(city, city)));
    for node in dom.replace(&LocatorStrategy::css("#city option"), options) {
        dom.on_click(node, Duration::ZERO, move |dom, node| {
            let city = dom.value(node);
            dom.set_value(ids.city, city);
            validate(dom, ids, behavior);
        });
    }
}

/// Password score 0..=4
pub fn strength(password: &str) -> usize {
    [
        password.chars().count() >= 8,
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ]
    .into_iter()
    .filter(|met| *met)
    .count()
}

fn strength_label(score: usize) -> &'static str {
    match score {
        0 | 1 => "Weak",
        2 => "Medium",
        _ => "Strong",
    }
}

fn update_meter(dom: &mut MockDom, ids: PageIds) {
    if let Some(text) = ids.pwd_text {
        let label = strength_label(strength(&dom.value(ids.password)));
        dom.set_text(text, format!("Strength: {label}"));
    }
}

fn filled(dom: &MockDom, node: NodeId) -> bool {
    !dom.value(node).trim().is_empty()
}

fn check_confirm(dom: &mut MockDom, ids: PageIds) {
    if dom.value(ids.confirm) != dom.value(ids.password) {
        dom.set_text(ids.confirm_err, "Passwords do not match");
    }
}

fn validate(dom: &mut MockDom, ids: PageIds, behavior: PageBehavior) -> bool {
    let password = dom.value(ids.password);
    let confirm_ok = dom.value(ids.confirm) == password;
    let valid = [
        ids.first_name,
        ids.last_name,
        ids.email,
        ids.phone,
        ids.country,
        ids.state,
        ids.city,
    ]
    .into_iter()
    .all(|node| filled(dom, node))
        && (dom.is_selected(ids.gender_male) || dom.is_selected(ids.gender_female))
        && dom.is_selected(ids.terms)
        && password.chars().count() >= 8
        && strength(&password) >= 2
        && confirm_ok;

    if confirm_ok {
        dom.set_text(ids.confirm_err, "");
    }
    if behavior.gate == Gate::Validates {
        dom.set_enabled(ids.submit, valid);
    }
    valid
}

fn show_alert(dom: &mut MockDom, ids: PageIds, text: &str) {
    dom.set_text(ids.top_alert, text);
    dom.set_visible(ids.top_alert, true);
}

fn submit(dom: &mut MockDom, ids: PageIds, behavior: PageBehavior) {
    if !validate(dom, ids, behavior) {
        if behavior.last_name_error && !filled(dom, ids.last_name) {
            dom.set_text(ids.last_name_err, "Last name is required");
        }
        show_alert(dom, ids, ERROR_BANNER);
        return;
    }
    if behavior.success_banner {
        show_alert(dom, ids, SUCCESS_BANNER);
    }
    if behavior.reset_after_submit {
        reset(dom, ids, behavior);
    }
}

fn reset(dom: &mut MockDom, ids: PageIds, behavior: PageBehavior) {
    for node in [
        ids.first_name,
        ids.last_name,
        ids.email,
        ids.phone,
        ids.password,
        ids.confirm,
        ids.country,
        ids.state,
        ids.city,
    ] {
        dom.set_value(node, "");
    }
    for node in [ids.gender_male, ids.gender_female, ids.terms] {
        dom.set_selected(node, false);
    }
    populate_states(dom, ids, behavior, "");
    populate_cities(dom, ids, behavior, "");
    update_meter(dom, ids);
    if behavior.gate == Gate::Validates {
        dom.set_enabled(ids.submit, false);
    }
}
