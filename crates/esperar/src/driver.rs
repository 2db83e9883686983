//! Browser driver capability boundary.
//!
//! The core never speaks a wire protocol itself; it consumes the
//! [`WebDriver`] trait, which a CDP or WebDriver-protocol adapter
//! implements out of tree. [`FakeDriver`] is the in-memory implementation
//! used throughout the test suite: a scriptable page model that can make
//! elements appear after N lookups, report staleness or interception on
//! demand, and route clicks to new pages, while recording every call for
//! verification.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::scripts;
use crate::locator::{Locator, Query};

/// Opaque reference to a resolved element.
///
/// Handles may go stale at any time after resolution (the browser
/// re-rendered and detached the node). They are never cached across
/// operations; every operation re-resolves its locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identifier
    pub id: String,
    /// Query the handle was resolved from, for diagnostics
    pub description: String,
}

impl ElementHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// Classification of driver-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverErrorKind {
    /// Query matched nothing
    NotFound,
    /// Handle no longer attached to the live page
    Stale,
    /// Another element would receive the interaction
    Intercepted,
    /// Page is mid-navigation; the DOM is not queryable right now
    Navigating,
    /// Query string the driver cannot parse
    InvalidSelector,
    /// Script evaluation failed
    Script,
    /// Browser/session level failure
    Session,
}

impl DriverErrorKind {
    /// Short tag for log output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::Stale => "stale",
            Self::Intercepted => "intercepted",
            Self::Navigating => "navigating",
            Self::InvalidSelector => "invalid-selector",
            Self::Script => "script",
            Self::Session => "session",
        }
    }
}

/// Error reported by a [`WebDriver`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverError {
    /// Failure classification
    pub kind: DriverErrorKind,
    /// Driver-supplied detail
    pub message: String,
}

impl DriverError {
    /// Create a new driver error.
    #[must_use]
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether a polling loop may absorb this failure and retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            DriverErrorKind::NotFound | DriverErrorKind::Stale | DriverErrorKind::Navigating
        )
    }
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for DriverError {}

/// Result alias for driver-level operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Abstract browser automation capability (external collaborator).
///
/// Implementations own the actual protocol (CDP, WebDriver, ...). The
/// synchronization core treats every method as potentially racing the
/// browser's rendering pipeline: absence and staleness are expected
/// outcomes, not bugs.
pub trait WebDriver: Send {
    /// Navigate the session to `url`.
    fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// Find the first element matching `query`, if any.
    ///
    /// Absence is a value, not an error; callers decide whether it is
    /// expected.
    fn find_element(&mut self, query: &Query) -> DriverResult<Option<ElementHandle>>;

    /// Find all elements matching `query` (possibly empty).
    fn find_elements(&mut self, query: &Query) -> DriverResult<Vec<ElementHandle>>;

    /// Evaluate a script in page context. Element arguments are passed as
    /// handle ids inside `args`.
    fn execute_script(&mut self, script: &str, args: &[Value]) -> DriverResult<Value>;

    /// Current top-level URL.
    fn current_url(&mut self) -> DriverResult<String>;

    /// Current document title.
    fn title(&mut self) -> DriverResult<String>;

    /// Native click on a resolved element.
    fn click(&mut self, handle: &ElementHandle) -> DriverResult<()>;

    /// Send text to an element, character for character, in order.
    fn send_keys(&mut self, handle: &ElementHandle, text: &str) -> DriverResult<()>;

    /// Clear an element's current value.
    fn clear(&mut self, handle: &ElementHandle) -> DriverResult<()>;

    /// Whether the element is rendered visible.
    fn is_displayed(&mut self, handle: &ElementHandle) -> DriverResult<bool>;

    /// Whether the element is enabled.
    fn is_enabled(&mut self, handle: &ElementHandle) -> DriverResult<bool>;

    /// Visible text content of the element.
    fn text(&mut self, handle: &ElementHandle) -> DriverResult<String>;

    /// Terminate the browser and release all resources.
    fn close(&mut self) -> DriverResult<()>;
}

// =============================================================================
// FAKE DRIVER (test double)
// =============================================================================

/// One element in the fake page model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FakeElement {
    /// Tag name
    pub tag: String,
    /// Visible text content
    pub text: String,
    /// Current input value
    pub value: String,
    /// Rendered visible
    pub visible: bool,
    /// Enabled for interaction
    pub enabled: bool,
    /// Another element currently covers this one's click point
    pub obscured: bool,
    /// Option texts, for `<select>` elements
    pub options: Vec<String>,
    /// Index of the selected option, if any
    pub selected: Option<usize>,
}

impl FakeElement {
    /// Visible, enabled element with the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: String::new(),
            value: String::new(),
            visible: true,
            enabled: true,
            obscured: false,
            options: Vec::new(),
            selected: None,
        }
    }

    /// Set visible text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set a pre-existing input value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Mark the element present but not rendered visible.
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark the element disabled.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Mark the element geometrically covered by another element.
    #[must_use]
    pub const fn obscured(mut self) -> Self {
        self.obscured = true;
        self
    }

    /// Attach select options by visible text.
    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// A complete fake page: url, title, and elements keyed by rendered query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FakePage {
    /// Page URL
    pub url: String,
    /// Document title
    pub title: String,
    /// Elements, keyed by [`Query::key`]
    pub elements: BTreeMap<String, Vec<FakeElement>>,
}

impl FakePage {
    /// Create an empty page.
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            elements: BTreeMap::new(),
        }
    }

    /// Add an element reachable via `locator`.
    #[must_use]
    pub fn with_element(mut self, locator: &Locator, element: FakeElement) -> Self {
        self.insert(locator, element);
        self
    }

    /// Add an element reachable via `locator`.
    pub fn insert(&mut self, locator: &Locator, element: FakeElement) {
        self.elements
            .entry(key_of(locator))
            .or_default()
            .push(element);
    }

    /// Remove all elements matching `locator` (simulates a re-render that
    /// detached them).
    pub fn detach(&mut self, locator: &Locator) {
        let _ = self.elements.remove(&key_of(locator));
    }
}

fn key_of(locator: &Locator) -> String {
    locator
        .render()
        .map(|q| q.key())
        .unwrap_or_else(|_| locator.to_string())
}

fn stale(message: &str) -> DriverError {
    DriverError::new(DriverErrorKind::Stale, message)
}

/// In-memory [`WebDriver`] for unit and scenario tests.
#[derive(Debug, Default)]
pub struct FakeDriver {
    page: FakePage,
    routes: HashMap<String, FakePage>,
    click_goes_to: HashMap<String, String>,
    appear_after: HashMap<String, u32>,
    stale_uses: HashMap<String, u32>,
    intercept_clicks: HashMap<String, u32>,
    handles: HashMap<String, (String, usize)>,
    calls: Vec<String>,
    next_handle: u64,
    closed: bool,
}

impl FakeDriver {
    /// Create a driver with an empty page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver already displaying `page`.
    #[must_use]
    pub fn with_page(page: FakePage) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Replace the current page.
    pub fn set_page(&mut self, page: FakePage) {
        self.page = page;
        self.handles.clear();
    }

    /// Register a page that `navigate(url)` swaps in.
    pub fn route(&mut self, url: impl Into<String>, page: FakePage) {
        let _ = self.routes.insert(url.into(), page);
    }

    /// Make a click on `locator`'s element navigate to `url`.
    pub fn on_click_navigate(&mut self, locator: &Locator, url: impl Into<String>) {
        let _ = self.click_goes_to.insert(key_of(locator), url.into());
    }

    /// Make the first `misses` lookups of `locator` find nothing before the
    /// element becomes resolvable (models late rendering).
    pub fn appear_after_polls(&mut self, locator: &Locator, misses: u32) {
        let _ = self.appear_after.insert(key_of(locator), misses);
    }

    /// Make the next `uses` interactions with `locator`'s element report a
    /// stale handle (models a re-render between resolution and use). Pure
    /// reads such as `is_displayed` do not consume the budget; staleness is
    /// discovered at interaction time.
    pub fn stale_next_uses(&mut self, locator: &Locator, uses: u32) {
        let _ = self.stale_uses.insert(key_of(locator), uses);
    }

    /// Make the next `clicks` native clicks on `locator`'s element fail as
    /// intercepted (models an overlay appearing at click time).
    pub fn intercept_next_clicks(&mut self, locator: &Locator, clicks: u32) {
        let _ = self.intercept_clicks.insert(key_of(locator), clicks);
    }

    /// Recorded calls, oldest first.
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.calls
    }

    /// Whether any recorded call starts with `prefix`.
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls.iter().any(|c| c.starts_with(prefix))
    }

    /// Number of recorded calls starting with `prefix`.
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Current page, for assertions.
    #[must_use]
    pub fn page(&self) -> &FakePage {
        &self.page
    }

    /// Mutable page, for mid-test mutation.
    pub fn page_mut(&mut self) -> &mut FakePage {
        &mut self.page
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::new(
                DriverErrorKind::Session,
                "browser already closed",
            ));
        }
        Ok(())
    }

    fn location(&self, id: &str) -> DriverResult<(String, usize)> {
        self.handles
            .get(id)
            .cloned()
            .ok_or_else(|| stale("element is not attached to the page document"))
    }

    /// Element lookup for interactions; consumes scripted staleness.
    fn interact(&mut self, id: &str) -> DriverResult<(String, &mut FakeElement)> {
        let (key, idx) = self.location(id)?;
        if let Some(uses) = self.stale_uses.get_mut(&key) {
            if *uses > 0 {
                *uses -= 1;
                return Err(stale("element detached by re-render"));
            }
        }
        let element = self
            .page
            .elements
            .get_mut(&key)
            .and_then(|v| v.get_mut(idx))
            .ok_or_else(|| stale("element is not attached to the page document"))?;
        Ok((key, element))
    }

    /// Element lookup for pure reads; never consumes staleness budgets.
    fn inspect(&self, id: &str) -> DriverResult<&FakeElement> {
        let (key, idx) = self.location(id)?;
        self.page
            .elements
            .get(&key)
            .and_then(|v| v.get(idx))
            .ok_or_else(|| stale("element is not attached to the page document"))
    }

    fn mint_handle(&mut self, key: &str, idx: usize) -> ElementHandle {
        self.next_handle += 1;
        let id = format!("h{}", self.next_handle);
        let _ = self.handles.insert(id.clone(), (key.to_string(), idx));
        ElementHandle::new(id, key)
    }

    fn swap_to(&mut self, url: &str) {
        if let Some(page) = self.routes.get(url).cloned() {
            self.page = page;
        } else {
            self.page.url = url.to_string();
        }
        // Old handles point at the previous document.
        self.handles.clear();
    }

    fn forced_click(&mut self, id: &str) -> DriverResult<Value> {
        let (key, _) = self.interact(id)?;
        self.calls.push(format!("force_click:{key}"));
        if let Some(url) = self.click_goes_to.get(&key).cloned() {
            self.swap_to(&url);
        }
        Ok(Value::Null)
    }

    fn select_by_text(&mut self, id: &str, wanted: &str) -> DriverResult<Value> {
        let (key, element) = self.interact(id)?;
        let found = element.options.iter().position(|o| o == wanted);
        match found {
            Some(idx) => {
                element.selected = Some(idx);
                self.calls.push(format!("select:{key}:{wanted}"));
                Ok(Value::from(idx as i64))
            }
            None => {
                self.calls.push(format!("select_miss:{key}:{wanted}"));
                Ok(Value::from(-1_i64))
            }
        }
    }

    fn arg_handle<'a>(args: &'a [Value], pos: usize) -> DriverResult<&'a str> {
        args.get(pos).and_then(Value::as_str).ok_or_else(|| {
            DriverError::new(
                DriverErrorKind::Script,
                format!("script argument {pos} is not an element handle"),
            )
        })
    }
}

impl WebDriver for FakeDriver {
    fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.ensure_open()?;
        self.calls.push(format!("navigate:{url}"));
        self.swap_to(url);
        Ok(())
    }

    fn find_element(&mut self, query: &Query) -> DriverResult<Option<ElementHandle>> {
        self.ensure_open()?;
        let key = query.key();
        self.calls.push(format!("find:{key}"));
        if let Some(misses) = self.appear_after.get_mut(&key) {
            if *misses > 0 {
                *misses -= 1;
                return Ok(None);
            }
        }
        if self.page.elements.get(&key).is_some_and(|v| !v.is_empty()) {
            Ok(Some(self.mint_handle(&key, 0)))
        } else {
            Ok(None)
        }
    }

    fn find_elements(&mut self, query: &Query) -> DriverResult<Vec<ElementHandle>> {
        self.ensure_open()?;
        let key = query.key();
        self.calls.push(format!("find_all:{key}"));
        let count = self.page.elements.get(&key).map_or(0, Vec::len);
        Ok((0..count).map(|idx| self.mint_handle(&key, idx)).collect())
    }

    fn execute_script(&mut self, script: &str, args: &[Value]) -> DriverResult<Value> {
        self.ensure_open()?;
        match script {
            scripts::DISPATCH_CLICK => {
                let id = Self::arg_handle(args, 0)?.to_string();
                self.forced_click(&id)
            }
            scripts::SELECT_BY_VISIBLE_TEXT => {
                let id = Self::arg_handle(args, 0)?.to_string();
                let wanted = args
                    .get(1)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.select_by_text(&id, &wanted)
            }
            scripts::TOP_AT_CENTER => {
                let id = Self::arg_handle(args, 0)?;
                let element = self.inspect(id)?;
                let unobscured = !element.obscured;
                self.calls.push("script:top_at_center".to_string());
                Ok(Value::Bool(unobscured))
            }
            _ => {
                self.calls.push("script:unknown".to_string());
                Ok(Value::Null)
            }
        }
    }

    fn current_url(&mut self) -> DriverResult<String> {
        self.ensure_open()?;
        Ok(self.page.url.clone())
    }

    fn title(&mut self) -> DriverResult<String> {
        self.ensure_open()?;
        Ok(self.page.title.clone())
    }

    fn click(&mut self, handle: &ElementHandle) -> DriverResult<()> {
        self.ensure_open()?;
        let (key, _) = self.location(&handle.id)?;
        if let Some(clicks) = self.intercept_clicks.get_mut(&key) {
            if *clicks > 0 {
                *clicks -= 1;
                return Err(DriverError::new(
                    DriverErrorKind::Intercepted,
                    format!("another element would receive the click on {key}"),
                ));
            }
        }
        let (key, element) = self.interact(&handle.id)?;
        if element.obscured {
            return Err(DriverError::new(
                DriverErrorKind::Intercepted,
                format!("element {key} is covered at its click point"),
            ));
        }
        self.calls.push(format!("click:{key}"));
        if let Some(url) = self.click_goes_to.get(&key).cloned() {
            self.swap_to(&url);
        }
        Ok(())
    }

    fn send_keys(&mut self, handle: &ElementHandle, text: &str) -> DriverResult<()> {
        self.ensure_open()?;
        let (key, element) = self.interact(&handle.id)?;
        element.value.push_str(text);
        self.calls.push(format!("send_keys:{key}:{text}"));
        Ok(())
    }

    fn clear(&mut self, handle: &ElementHandle) -> DriverResult<()> {
        self.ensure_open()?;
        let (key, element) = self.interact(&handle.id)?;
        element.value.clear();
        self.calls.push(format!("clear:{key}"));
        Ok(())
    }

    fn is_displayed(&mut self, handle: &ElementHandle) -> DriverResult<bool> {
        self.ensure_open()?;
        Ok(self.inspect(&handle.id)?.visible)
    }

    fn is_enabled(&mut self, handle: &ElementHandle) -> DriverResult<bool> {
        self.ensure_open()?;
        Ok(self.inspect(&handle.id)?.enabled)
    }

    fn text(&mut self, handle: &ElementHandle) -> DriverResult<String> {
        self.ensure_open()?;
        Ok(self.inspect(&handle.id)?.text.clone())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.calls.push("close".to_string());
        self.closed = true;
        Ok(())
    }
}

impl FakeDriver {
    /// Wrap the driver so a test can keep one handle for inspection
    /// while the session owns another.
    #[must_use]
    pub fn into_shared(self) -> Arc<Mutex<FakeDriver>> {
        Arc::new(Mutex::new(self))
    }
}

/// Shared fake, for tests that verify call history after the session
/// has taken ownership of its driver.
impl WebDriver for Arc<Mutex<FakeDriver>> {
    fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.lock().expect("fake driver lock").navigate(url)
    }

    fn find_element(&mut self, query: &Query) -> DriverResult<Option<ElementHandle>> {
        self.lock().expect("fake driver lock").find_element(query)
    }

    fn find_elements(&mut self, query: &Query) -> DriverResult<Vec<ElementHandle>> {
        self.lock().expect("fake driver lock").find_elements(query)
    }

    fn execute_script(&mut self, script: &str, args: &[Value]) -> DriverResult<Value> {
        self.lock()
            .expect("fake driver lock")
            .execute_script(script, args)
    }

    fn current_url(&mut self) -> DriverResult<String> {
        self.lock().expect("fake driver lock").current_url()
    }

    fn title(&mut self) -> DriverResult<String> {
        self.lock().expect("fake driver lock").title()
    }

    fn click(&mut self, handle: &ElementHandle) -> DriverResult<()> {
        self.lock().expect("fake driver lock").click(handle)
    }

    fn send_keys(&mut self, handle: &ElementHandle, text: &str) -> DriverResult<()> {
        self.lock()
            .expect("fake driver lock")
            .send_keys(handle, text)
    }

    fn clear(&mut self, handle: &ElementHandle) -> DriverResult<()> {
        self.lock().expect("fake driver lock").clear(handle)
    }

    fn is_displayed(&mut self, handle: &ElementHandle) -> DriverResult<bool> {
        self.lock().expect("fake driver lock").is_displayed(handle)
    }

    fn is_enabled(&mut self, handle: &ElementHandle) -> DriverResult<bool> {
        self.lock().expect("fake driver lock").is_enabled(handle)
    }

    fn text(&mut self, handle: &ElementHandle) -> DriverResult<String> {
        self.lock().expect("fake driver lock").text(handle)
    }

    fn close(&mut self) -> DriverResult<()> {
        self.lock().expect("fake driver lock").close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_page() -> FakePage {
        FakePage::new("https://www.saucedemo.com/", "Swag Labs")
            .with_element(&Locator::id("user-name"), FakeElement::new("input"))
            .with_element(&Locator::id("password"), FakeElement::new("input"))
            .with_element(&Locator::id("login-button"), FakeElement::new("button"))
    }

    mod driver_error_tests {
        use super::*;

        #[test]
        fn test_transient_kinds() {
            assert!(DriverError::new(DriverErrorKind::NotFound, "x").is_transient());
            assert!(DriverError::new(DriverErrorKind::Stale, "x").is_transient());
            assert!(DriverError::new(DriverErrorKind::Navigating, "x").is_transient());
            assert!(!DriverError::new(DriverErrorKind::Intercepted, "x").is_transient());
            assert!(!DriverError::new(DriverErrorKind::Session, "x").is_transient());
        }

        #[test]
        fn test_display() {
            let err = DriverError::new(DriverErrorKind::Stale, "detached");
            assert_eq!(err.to_string(), "stale: detached");
        }
    }

    mod lookup_tests {
        use super::*;

        #[test]
        fn test_find_element_present() {
            let mut driver = FakeDriver::with_page(login_page());
            let query = Locator::id("user-name").render().unwrap();
            let handle = driver.find_element(&query).unwrap();
            assert!(handle.is_some());
            assert!(driver.was_called("find:id:user-name"));
        }

        #[test]
        fn test_find_element_absent_is_none_not_error() {
            let mut driver = FakeDriver::with_page(login_page());
            let query = Locator::id("missing").render().unwrap();
            assert!(driver.find_element(&query).unwrap().is_none());
        }

        #[test]
        fn test_appear_after_polls() {
            let mut driver = FakeDriver::with_page(login_page());
            let locator = Locator::id("user-name");
            driver.appear_after_polls(&locator, 2);
            let query = locator.render().unwrap();
            assert!(driver.find_element(&query).unwrap().is_none());
            assert!(driver.find_element(&query).unwrap().is_none());
            assert!(driver.find_element(&query).unwrap().is_some());
        }

        #[test]
        fn test_find_elements_multiplicity() {
            let item = Locator::class_name("inventory_item_name");
            let page = FakePage::new("u", "t")
                .with_element(&item, FakeElement::new("div").with_text("Backpack"))
                .with_element(&item, FakeElement::new("div").with_text("Bike Light"));
            let mut driver = FakeDriver::with_page(page);
            let handles = driver.find_elements(&item.render().unwrap()).unwrap();
            assert_eq!(handles.len(), 2);
        }
    }

    mod interaction_tests {
        use super::*;

        #[test]
        fn test_send_keys_appends_in_order() {
            let mut driver = FakeDriver::with_page(login_page());
            let query = Locator::id("user-name").render().unwrap();
            let handle = driver.find_element(&query).unwrap().unwrap();
            driver.send_keys(&handle, "standard_").unwrap();
            driver.send_keys(&handle, "user").unwrap();
            let key = query.key();
            assert_eq!(driver.page().elements[&key][0].value, "standard_user");
        }

        #[test]
        fn test_clear_empties_value() {
            let locator = Locator::id("first-name");
            let page = FakePage::new("u", "t")
                .with_element(&locator, FakeElement::new("input").with_value("old"));
            let mut driver = FakeDriver::with_page(page);
            let handle = driver
                .find_element(&locator.render().unwrap())
                .unwrap()
                .unwrap();
            driver.clear(&handle).unwrap();
            assert_eq!(driver.page().elements[&key_of(&locator)][0].value, "");
        }

        #[test]
        fn test_scripted_staleness_hits_interactions_not_reads() {
            let mut driver = FakeDriver::with_page(login_page());
            let locator = Locator::id("login-button");
            driver.stale_next_uses(&locator, 1);
            let handle = driver
                .find_element(&locator.render().unwrap())
                .unwrap()
                .unwrap();
            // Pure read does not consume the staleness budget.
            assert!(driver.is_displayed(&handle).unwrap());
            let err = driver.click(&handle).unwrap_err();
            assert_eq!(err.kind, DriverErrorKind::Stale);
            // Budget consumed; the next interaction works.
            driver.click(&handle).unwrap();
        }

        #[test]
        fn test_intercepted_click_then_success() {
            let mut driver = FakeDriver::with_page(login_page());
            let locator = Locator::id("login-button");
            driver.intercept_next_clicks(&locator, 1);
            let handle = driver
                .find_element(&locator.render().unwrap())
                .unwrap()
                .unwrap();
            let err = driver.click(&handle).unwrap_err();
            assert_eq!(err.kind, DriverErrorKind::Intercepted);
            driver.click(&handle).unwrap();
        }

        #[test]
        fn test_click_navigates_when_routed() {
            let mut driver = FakeDriver::with_page(login_page());
            let button = Locator::id("login-button");
            driver.route(
                "https://www.saucedemo.com/inventory.html",
                FakePage::new("https://www.saucedemo.com/inventory.html", "Swag Labs"),
            );
            driver.on_click_navigate(&button, "https://www.saucedemo.com/inventory.html");
            let handle = driver
                .find_element(&button.render().unwrap())
                .unwrap()
                .unwrap();
            driver.click(&handle).unwrap();
            assert_eq!(
                driver.current_url().unwrap(),
                "https://www.saucedemo.com/inventory.html"
            );
            // The old handle belongs to the previous document.
            let err = driver.click(&handle).unwrap_err();
            assert_eq!(err.kind, DriverErrorKind::Stale);
        }
    }

    mod script_tests {
        use super::*;

        #[test]
        fn test_dispatch_click_bypasses_interception() {
            let mut driver = FakeDriver::with_page(
                FakePage::new("u", "t").with_element(
                    &Locator::xpath("//a[text()='CREATE NEW ACCOUNT']"),
                    FakeElement::new("a").obscured(),
                ),
            );
            let locator = Locator::xpath("//a[text()='CREATE NEW ACCOUNT']");
            let handle = driver
                .find_element(&locator.render().unwrap())
                .unwrap()
                .unwrap();
            assert_eq!(
                driver.click(&handle).unwrap_err().kind,
                DriverErrorKind::Intercepted
            );
            driver
                .execute_script(scripts::DISPATCH_CLICK, &[Value::from(handle.id.clone())])
                .unwrap();
            assert_eq!(driver.call_count("force_click:"), 1);
        }

        #[test]
        fn test_select_by_visible_text_exact_match_only() {
            let dropdown = Locator::name("countryListboxRegisterPage");
            let page = FakePage::new("u", "t").with_element(
                &dropdown,
                FakeElement::new("select").with_options(["", "Egypt", "France"]),
            );
            let mut driver = FakeDriver::with_page(page);
            let handle = driver
                .find_element(&dropdown.render().unwrap())
                .unwrap()
                .unwrap();

            let hit = driver
                .execute_script(
                    scripts::SELECT_BY_VISIBLE_TEXT,
                    &[Value::from(handle.id.clone()), Value::from("Egypt")],
                )
                .unwrap();
            assert_eq!(hit, Value::from(1_i64));

            let miss = driver
                .execute_script(
                    scripts::SELECT_BY_VISIBLE_TEXT,
                    &[Value::from(handle.id.clone()), Value::from("egypt")],
                )
                .unwrap();
            assert_eq!(miss, Value::from(-1_i64));
        }

        #[test]
        fn test_top_at_center_reports_obscured() {
            let overlay = Locator::css(".loader");
            let button = Locator::id("register_btn");
            let page = FakePage::new("u", "t")
                .with_element(&overlay, FakeElement::new("div"))
                .with_element(&button, FakeElement::new("button").obscured());
            let mut driver = FakeDriver::with_page(page);
            let handle = driver
                .find_element(&button.render().unwrap())
                .unwrap()
                .unwrap();
            let topmost = driver
                .execute_script(scripts::TOP_AT_CENTER, &[Value::from(handle.id.clone())])
                .unwrap();
            assert_eq!(topmost, Value::Bool(false));
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_close_is_idempotent_at_driver_level() {
            let mut driver = FakeDriver::new();
            driver.close().unwrap();
            driver.close().unwrap();
        }

        #[test]
        fn test_operations_after_close_fail_with_session_error() {
            let mut driver = FakeDriver::with_page(login_page());
            driver.close().unwrap();
            let err = driver.navigate("https://example.com").unwrap_err();
            assert_eq!(err.kind, DriverErrorKind::Session);
        }
    }
}
