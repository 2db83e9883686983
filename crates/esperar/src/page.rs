//! Page objects and screen flow.
//!
//! A page object names the locators of one screen; it never holds
//! resolved handles, so every operation reads the live DOM. Screen
//! transitions are declared up front in a [`TransitionTable`] and
//! validated before any scenario runs, instead of living implicitly in
//! the order of method calls.

use std::collections::{BTreeSet, HashMap};

use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};
use crate::session::Session;
use crate::wait::{FnCondition, Outcome, WaitOptions, Waiter};

/// One screen of the application under automation.
pub trait PageObject {
    /// Page name, used in flow tables and log output.
    fn name(&self) -> &str;

    /// Substring the top-level URL must contain while this page is shown.
    fn url_pattern(&self) -> &str;

    /// Element whose visibility marks the page as rendered.
    fn ready_marker(&self) -> &Locator;

    /// Ceiling for this page to finish loading.
    fn load_timeout_ms(&self) -> u64 {
        30_000
    }

    /// One readiness probe: URL matches and the ready marker is visible.
    fn is_loaded(&self, session: &mut Session) -> EsperarResult<bool> {
        if !session.current_url()?.contains(self.url_pattern()) {
            return Ok(false);
        }
        match session.resolve(self.ready_marker())? {
            Some(handle) => session.displayed(&handle),
            None => Ok(false),
        }
    }

    /// Poll [`PageObject::is_loaded`] until it holds or the page's load
    /// ceiling passes.
    fn await_loaded(&self, waiter: &Waiter, session: &mut Session) -> EsperarResult<()>
    where
        Self: Sized,
    {
        let options = WaitOptions::new()
            .with_timeout_ms(self.load_timeout_ms())
            .with_poll_interval_ms(session.config().poll_interval_ms);
        let mut condition = FnCondition::new(
            format!("page {} is loaded", self.name()),
            |session: &mut Session| match self.is_loaded(session) {
                Ok(true) => Outcome::Success(()),
                Ok(false) => Outcome::NotYet(None),
                Err(err) => Outcome::from_err(err),
            },
        );
        waiter.wait_for(session, &mut condition, options)
    }
}

/// Declarative page object: a name, a readiness marker, and a map of
/// named locators.
#[derive(Debug, Clone)]
pub struct Page {
    name: String,
    url_pattern: String,
    ready_marker: Locator,
    load_timeout_ms: u64,
    locators: HashMap<String, Locator>,
}

impl Page {
    /// Start building a page named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PageBuilder {
        PageBuilder::new(name)
    }

    /// Look up a named locator.
    pub fn locator(&self, name: &str) -> EsperarResult<&Locator> {
        self.locators.get(name).ok_or_else(|| EsperarError::PageFlow {
            message: format!("page {:?} has no element named {name:?}", self.name),
        })
    }

    /// Names of all declared elements, sorted.
    #[must_use]
    pub fn element_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.locators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl PageObject for Page {
    fn name(&self) -> &str {
        &self.name
    }

    fn url_pattern(&self) -> &str {
        &self.url_pattern
    }

    fn ready_marker(&self) -> &Locator {
        &self.ready_marker
    }

    fn load_timeout_ms(&self) -> u64 {
        self.load_timeout_ms
    }
}

/// Builder for [`Page`].
#[derive(Debug, Clone)]
pub struct PageBuilder {
    name: String,
    url_pattern: String,
    ready_marker: Locator,
    load_timeout_ms: u64,
    locators: HashMap<String, Locator>,
}

impl PageBuilder {
    /// Builder with an empty URL pattern and `body` as the ready marker.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_pattern: String::new(),
            ready_marker: Locator::css("body"),
            load_timeout_ms: 30_000,
            locators: HashMap::new(),
        }
    }

    /// Require the URL to contain `pattern`.
    #[must_use]
    pub fn with_url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_pattern = pattern.into();
        self
    }

    /// Element whose visibility marks the page as rendered.
    #[must_use]
    pub fn with_ready_marker(mut self, locator: Locator) -> Self {
        self.ready_marker = locator;
        self
    }

    /// Ceiling for this page to finish loading.
    #[must_use]
    pub const fn with_load_timeout_ms(mut self, ms: u64) -> Self {
        self.load_timeout_ms = ms;
        self
    }

    /// Declare a named element.
    #[must_use]
    pub fn with_element(mut self, name: impl Into<String>, locator: Locator) -> Self {
        let _ = self.locators.insert(name.into(), locator);
        self
    }

    /// Finish the page.
    #[must_use]
    pub fn build(self) -> Page {
        Page {
            name: self.name,
            url_pattern: self.url_pattern,
            ready_marker: self.ready_marker,
            load_timeout_ms: self.load_timeout_ms,
            locators: self.locators,
        }
    }
}

// =============================================================================
// SCREEN FLOW
// =============================================================================

/// One `(state, operation) -> state` row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Transition {
    from: String,
    operation: String,
    to: String,
}

/// Declared states and transitions of a scenario.
///
/// The table is authored up front and checked by [`TransitionTable::validate`]
/// before a flow starts, so a typo in a state name fails at authoring
/// time rather than as a mysterious mid-scenario mismatch.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    states: BTreeSet<String>,
    rows: Vec<Transition>,
}

impl TransitionTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a state.
    #[must_use]
    pub fn with_state(mut self, name: impl Into<String>) -> Self {
        let _ = self.states.insert(name.into());
        self
    }

    /// Declare that `operation` performed on `from` lands on `to`.
    #[must_use]
    pub fn with_transition(
        mut self,
        from: impl Into<String>,
        operation: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.rows.push(Transition {
            from: from.into(),
            operation: operation.into(),
            to: to.into(),
        });
        self
    }

    /// Check the table for undeclared states and ambiguous rows.
    pub fn validate(&self) -> EsperarResult<()> {
        for row in &self.rows {
            for state in [&row.from, &row.to] {
                if !self.states.contains(state) {
                    return Err(EsperarError::PageFlow {
                        message: format!(
                            "transition ({} --{}--> {}) references undeclared state {state:?}",
                            row.from, row.operation, row.to
                        ),
                    });
                }
            }
        }
        for (i, row) in self.rows.iter().enumerate() {
            let ambiguous = self.rows[i + 1..]
                .iter()
                .any(|other| other.from == row.from && other.operation == row.operation);
            if ambiguous {
                return Err(EsperarError::PageFlow {
                    message: format!(
                        "state {:?} has two transitions for operation {:?}",
                        row.from, row.operation
                    ),
                });
            }
        }
        Ok(())
    }

    /// Destination of `operation` from `from`, if declared.
    #[must_use]
    pub fn next(&self, from: &str, operation: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.from == from && row.operation == operation)
            .map(|row| row.to.as_str())
    }
}

/// Tracks the current screen while a scenario runs.
#[derive(Debug, Clone)]
pub struct PageFlow {
    table: TransitionTable,
    current: String,
}

impl PageFlow {
    /// Validate `table` and start at `initial`.
    pub fn start(table: TransitionTable, initial: impl Into<String>) -> EsperarResult<Self> {
        table.validate()?;
        let current = initial.into();
        if !table.states.contains(&current) {
            return Err(EsperarError::PageFlow {
                message: format!("initial state {current:?} is not declared"),
            });
        }
        Ok(Self { table, current })
    }

    /// Current state name.
    #[must_use]
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Perform `operation`, moving to the declared destination.
    ///
    /// An operation with no row for the current state is a
    /// [`EsperarError::PageFlow`] error: the scenario and the table
    /// disagree about where the application is.
    pub fn apply(&mut self, operation: &str) -> EsperarResult<&str> {
        let to = self
            .table
            .next(&self.current, operation)
            .ok_or_else(|| EsperarError::PageFlow {
                message: format!(
                    "no transition from {:?} on operation {operation:?}",
                    self.current
                ),
            })?
            .to_string();
        tracing::debug!(from = %self.current, operation, to = %to, "screen transition");
        self.current = to;
        Ok(&self.current)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::action::Actions;
    use crate::clock::FakeClock;
    use crate::driver::{FakeDriver, FakeElement, FakePage};
    use crate::session::SessionConfig;

    const LOGIN_URL: &str = "https://www.saucedemo.com/";
    const INVENTORY_URL: &str = "https://www.saucedemo.com/inventory.html";

    fn login_page() -> Page {
        Page::builder("login")
            .with_url_pattern("saucedemo.com")
            .with_ready_marker(Locator::id("login-button"))
            .with_element("username", Locator::id("user-name"))
            .with_element("password", Locator::id("password"))
            .with_element("submit", Locator::id("login-button"))
            .with_element("error", Locator::css("[data-test='error']"))
            .build()
    }

    fn inventory_page() -> Page {
        Page::builder("inventory")
            .with_url_pattern("inventory.html")
            .with_ready_marker(Locator::id("inventory_list"))
            .with_element(
                "add_to_cart",
                Locator::xpath(
                    "//div[text()='{}']/ancestor::div[@class='inventory_item']\
                     //button[contains(@data-test, 'add-to-cart')]",
                ),
            )
            .with_element("cart_link", Locator::class_name("shopping_cart_link"))
            .build()
    }

    fn sauce_driver() -> FakeDriver {
        let mut driver = FakeDriver::new();
        driver.set_page(
            FakePage::new(LOGIN_URL, "Swag Labs")
                .with_element(&Locator::id("user-name"), FakeElement::new("input"))
                .with_element(&Locator::id("password"), FakeElement::new("input"))
                .with_element(&Locator::id("login-button"), FakeElement::new("input")),
        );
        driver.route(
            INVENTORY_URL,
            FakePage::new(INVENTORY_URL, "Swag Labs")
                .with_element(&Locator::id("inventory_list"), FakeElement::new("div"))
                .with_element(
                    &Locator::class_name("shopping_cart_link"),
                    FakeElement::new("a"),
                ),
        );
        driver.on_click_navigate(&Locator::id("login-button"), INVENTORY_URL);
        driver
    }

    fn fake_waiter() -> (Waiter, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new());
        (
            Waiter::with_clock(Arc::<FakeClock>::clone(&clock)),
            clock,
        )
    }

    mod page_tests {
        use super::*;

        #[test]
        fn test_locator_lookup() {
            let page = login_page();
            let locator = page.locator("username").unwrap();
            assert_eq!(locator.to_string(), "id:user-name");
        }

        #[test]
        fn test_unknown_element_is_an_error() {
            let err = login_page().locator("captcha").unwrap_err();
            assert!(matches!(err, EsperarError::PageFlow { .. }));
        }

        #[test]
        fn test_element_names_sorted() {
            assert_eq!(
                login_page().element_names(),
                vec!["error", "password", "submit", "username"]
            );
        }

        #[test]
        fn test_is_loaded_requires_url_and_marker() {
            let mut session =
                Session::attach(Box::new(sauce_driver()), SessionConfig::default());
            assert!(login_page().is_loaded(&mut session).unwrap());
            assert!(!inventory_page().is_loaded(&mut session).unwrap());
        }

        #[test]
        fn test_await_loaded_polls_until_marker_appears() {
            let mut driver = sauce_driver();
            driver.appear_after_polls(&Locator::id("login-button"), 3);
            let mut session = Session::attach(Box::new(driver), SessionConfig::default());
            let (waiter, clock) = fake_waiter();
            login_page().await_loaded(&waiter, &mut session).unwrap();
            assert_eq!(clock.sleep_count(), 3);
        }

        #[test]
        fn test_await_loaded_times_out_on_wrong_page() {
            let mut session =
                Session::attach(Box::new(sauce_driver()), SessionConfig::default());
            let (waiter, _clock) = fake_waiter();
            let page = Page::builder("inventory")
                .with_url_pattern("inventory.html")
                .with_load_timeout_ms(2_000)
                .build();
            let err = page.await_loaded(&waiter, &mut session).unwrap_err();
            match err {
                EsperarError::Timeout { condition, .. } => {
                    assert_eq!(condition, "page inventory is loaded");
                }
                other => panic!("expected timeout, got {other:?}"),
            }
        }
    }

    mod transition_table_tests {
        use super::*;

        fn sauce_table() -> TransitionTable {
            TransitionTable::new()
                .with_state("login")
                .with_state("inventory")
                .with_state("cart")
                .with_transition("login", "submit", "inventory")
                .with_transition("inventory", "open_cart", "cart")
                .with_transition("cart", "continue_shopping", "inventory")
        }

        #[test]
        fn test_valid_table_passes() {
            sauce_table().validate().unwrap();
        }

        #[test]
        fn test_undeclared_state_rejected_at_authoring_time() {
            let table = TransitionTable::new()
                .with_state("login")
                .with_transition("login", "submit", "inventory");
            let err = table.validate().unwrap_err();
            match err {
                EsperarError::PageFlow { message } => {
                    assert!(message.contains("inventory"));
                }
                other => panic!("expected page flow error, got {other:?}"),
            }
        }

        #[test]
        fn test_ambiguous_row_rejected() {
            let table = TransitionTable::new()
                .with_state("login")
                .with_state("inventory")
                .with_state("cart")
                .with_transition("login", "submit", "inventory")
                .with_transition("login", "submit", "cart");
            assert!(table.validate().is_err());
        }

        #[test]
        fn test_flow_walk() {
            let mut flow = PageFlow::start(sauce_table(), "login").unwrap();
            assert_eq!(flow.apply("submit").unwrap(), "inventory");
            assert_eq!(flow.apply("open_cart").unwrap(), "cart");
            assert_eq!(flow.apply("continue_shopping").unwrap(), "inventory");
            assert_eq!(flow.current(), "inventory");
        }

        #[test]
        fn test_unknown_operation_is_an_error() {
            let mut flow = PageFlow::start(sauce_table(), "login").unwrap();
            let err = flow.apply("open_cart").unwrap_err();
            assert!(matches!(err, EsperarError::PageFlow { .. }));
            // State unchanged on error.
            assert_eq!(flow.current(), "login");
        }

        #[test]
        fn test_undeclared_initial_state_rejected() {
            let err = PageFlow::start(sauce_table(), "checkout").unwrap_err();
            assert!(matches!(err, EsperarError::PageFlow { .. }));
        }
    }

    mod scenario_tests {
        use super::*;

        /// Full login walk: type credentials, submit, land on inventory,
        /// add a product via a bound template, with the flow table
        /// tracking every step.
        #[test]
        fn test_login_to_inventory_scenario() {
            let mut driver = sauce_driver();
            let add_backpack = inventory_page()
                .locator("add_to_cart")
                .unwrap()
                .clone()
                .bind("Sauce Labs Backpack");
            // The inventory route needs the product button.
            driver.route(
                INVENTORY_URL,
                FakePage::new(INVENTORY_URL, "Swag Labs")
                    .with_element(&Locator::id("inventory_list"), FakeElement::new("div"))
                    .with_element(&add_backpack, FakeElement::new("button")),
            );

            let mut session = Session::attach(
                Box::new(driver),
                SessionConfig::default().with_base_url(LOGIN_URL),
            );
            let (waiter, _clock) = fake_waiter();
            let actions = Actions::with_waiter(Waiter::with_clock(Arc::new(FakeClock::new())));
            let mut flow = PageFlow::start(
                TransitionTable::new()
                    .with_state("login")
                    .with_state("inventory")
                    .with_transition("login", "submit", "inventory"),
                "login",
            )
            .unwrap();

            let login = login_page();
            login.await_loaded(&waiter, &mut session).unwrap();
            actions
                .type_text(&mut session, login.locator("username").unwrap(), "standard_user")
                .unwrap();
            actions
                .type_text(&mut session, login.locator("password").unwrap(), "secret_sauce")
                .unwrap();
            actions
                .click(&mut session, login.locator("submit").unwrap())
                .unwrap();
            flow.apply("submit").unwrap();

            let inventory = inventory_page();
            inventory.await_loaded(&waiter, &mut session).unwrap();
            assert_eq!(flow.current(), "inventory");
            actions.click(&mut session, &add_backpack).unwrap();
        }
    }
}
