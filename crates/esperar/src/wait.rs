//! Condition polling.
//!
//! Synchronization with a rendered page is polling a condition until it
//! holds or a deadline passes. A probe reports one of three outcomes:
//! not yet (absorb and retry), success (return immediately), or fatal
//! (raise immediately). Exceptions are never used as control flow; a
//! transient miss is a value, not an error.
//!
//! The [`Waiter`] checks its deadline *after* each probe, so a condition
//! that becomes true at the last instant is still observed, and total
//! wall clock never exceeds `timeout + poll_interval`.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::driver::ElementHandle;
use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};
use crate::session::{Session, SessionConfig};

/// Result of a single condition probe.
#[derive(Debug)]
pub enum Outcome<T> {
    /// Condition does not hold yet; the optional cause is the transient
    /// failure observed, kept for timeout diagnostics
    NotYet(Option<EsperarError>),
    /// Condition holds; polling stops immediately
    Success(T),
    /// Unrecoverable failure; polling stops immediately
    Fatal(EsperarError),
}

impl<T> Outcome<T> {
    /// Fold an operation failure into an outcome: transient failures are
    /// absorbed as `NotYet`, everything else is `Fatal`.
    #[must_use]
    pub fn from_err(err: EsperarError) -> Self {
        if err.is_transient() {
            Self::NotYet(Some(err))
        } else {
            Self::Fatal(err)
        }
    }
}

/// A pollable condition over the live page.
pub trait WaitCondition {
    /// Value produced when the condition holds.
    type Output;

    /// Probe the condition once against the live page.
    fn probe(&mut self, session: &mut Session) -> Outcome<Self::Output>;

    /// Human-readable description, embedded in timeout errors.
    fn describe(&self) -> String;
}

/// Adapter turning a closure into a [`WaitCondition`].
pub struct FnCondition<T, F>
where
    F: FnMut(&mut Session) -> Outcome<T>,
{
    probe_fn: F,
    description: String,
    _output: PhantomData<fn() -> T>,
}

impl<T, F> FnCondition<T, F>
where
    F: FnMut(&mut Session) -> Outcome<T>,
{
    /// Wrap `probe_fn` with a description for diagnostics.
    pub fn new(description: impl Into<String>, probe_fn: F) -> Self {
        Self {
            probe_fn,
            description: description.into(),
            _output: PhantomData,
        }
    }
}

impl<T, F> std::fmt::Debug for FnCondition<T, F>
where
    F: FnMut(&mut Session) -> Outcome<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<T, F> WaitCondition for FnCondition<T, F>
where
    F: FnMut(&mut Session) -> Outcome<T>,
{
    type Output = T;

    fn probe(&mut self, session: &mut Session) -> Outcome<T> {
        (self.probe_fn)(session)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Timing bounds for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Deadline in milliseconds
    pub timeout_ms: u64,
    /// Pause between probes in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            poll_interval_ms: 500,
        }
    }
}

impl WaitOptions {
    /// Create options with the default timings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive options from a session's configured timings.
    #[must_use]
    pub const fn from_config(config: &SessionConfig) -> Self {
        Self {
            timeout_ms: config.default_timeout_ms,
            poll_interval_ms: config.poll_interval_ms,
        }
    }

    /// Set the deadline.
    #[must_use]
    pub const fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the pause between probes.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Deadline as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Polls conditions against a deadline.
///
/// Carries its own time source so every timing property is testable
/// against a virtual clock.
pub struct Waiter {
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter").finish_non_exhaustive()
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Waiter {
    /// Waiter on the system monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Waiter on an explicit time source.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Poll `condition` until it holds or `options.timeout_ms` elapses.
    ///
    /// Success returns immediately (no residual sleep); a fatal outcome
    /// raises immediately. On timeout the error carries the condition
    /// description, the elapsed wall clock, and the last transient cause
    /// observed, so the failure is diagnosable without re-running.
    pub fn wait_for<C>(
        &self,
        session: &mut Session,
        condition: &mut C,
        options: WaitOptions,
    ) -> EsperarResult<C::Output>
    where
        C: WaitCondition,
    {
        let start = self.clock.now_ms();
        let mut last_cause: Option<String> = None;
        tracing::debug!(
            session = %session.id(),
            condition = %condition.describe(),
            timeout_ms = options.timeout_ms,
            "waiting"
        );
        loop {
            match condition.probe(session) {
                Outcome::Success(value) => {
                    tracing::debug!(
                        session = %session.id(),
                        condition = %condition.describe(),
                        elapsed_ms = self.clock.now_ms() - start,
                        "condition held"
                    );
                    return Ok(value);
                }
                Outcome::Fatal(err) => return Err(err),
                Outcome::NotYet(cause) => {
                    if let Some(cause) = cause {
                        last_cause = Some(cause.to_string());
                    }
                }
            }
            let elapsed = self.clock.now_ms() - start;
            if elapsed >= options.timeout_ms {
                return Err(EsperarError::Timeout {
                    condition: condition.describe(),
                    timeout_ms: options.timeout_ms,
                    elapsed_ms: elapsed,
                    last_cause,
                });
            }
            self.clock.sleep(options.poll_interval());
        }
    }
}

// =============================================================================
// BUILT-IN CONDITIONS
// =============================================================================

/// Element is attached to the DOM (visible or not).
#[derive(Debug)]
pub struct Presence {
    locator: Locator,
}

/// Element is attached and rendered visible.
#[derive(Debug)]
pub struct Visibility {
    locator: Locator,
}

/// Element is absent, hidden, or detached.
#[derive(Debug)]
pub struct Invisibility {
    locator: Locator,
}

/// Element is visible, enabled, and topmost at its center point.
#[derive(Debug)]
pub struct Clickable {
    locator: Locator,
}

/// Element's visible text equals `expected` exactly.
#[derive(Debug)]
pub struct TextEquals {
    locator: Locator,
    expected: String,
}

/// Element's visible text contains `needle`.
#[derive(Debug)]
pub struct TextContains {
    locator: Locator,
    needle: String,
}

/// Top-level URL equals `expected` exactly.
#[derive(Debug)]
pub struct UrlEquals {
    expected: String,
}

/// Element is attached to the DOM.
#[must_use]
pub fn presence(locator: Locator) -> Presence {
    Presence { locator }
}

/// Element is attached and visible.
#[must_use]
pub fn visibility(locator: Locator) -> Visibility {
    Visibility { locator }
}

/// Element is absent, hidden, or detached.
#[must_use]
pub fn invisibility(locator: Locator) -> Invisibility {
    Invisibility { locator }
}

/// Element is visible, enabled, and topmost at its center point.
#[must_use]
pub fn clickable(locator: Locator) -> Clickable {
    Clickable { locator }
}

/// Element text equals `expected` exactly.
#[must_use]
pub fn text_equals(locator: Locator, expected: impl Into<String>) -> TextEquals {
    TextEquals {
        locator,
        expected: expected.into(),
    }
}

/// Element text contains `needle`.
#[must_use]
pub fn text_contains(locator: Locator, needle: impl Into<String>) -> TextContains {
    TextContains {
        locator,
        needle: needle.into(),
    }
}

/// Top-level URL equals `expected` exactly.
#[must_use]
pub fn url_equals(expected: impl Into<String>) -> UrlEquals {
    UrlEquals {
        expected: expected.into(),
    }
}

impl WaitCondition for Presence {
    type Output = ElementHandle;

    fn probe(&mut self, session: &mut Session) -> Outcome<ElementHandle> {
        match session.resolve(&self.locator) {
            Ok(Some(handle)) => Outcome::Success(handle),
            Ok(None) => Outcome::NotYet(None),
            Err(err) => Outcome::from_err(err),
        }
    }

    fn describe(&self) -> String {
        format!("presence of {}", self.locator)
    }
}

impl WaitCondition for Visibility {
    type Output = ElementHandle;

    fn probe(&mut self, session: &mut Session) -> Outcome<ElementHandle> {
        let handle = match session.resolve(&self.locator) {
            Ok(Some(handle)) => handle,
            Ok(None) => return Outcome::NotYet(None),
            Err(err) => return Outcome::from_err(err),
        };
        match session.displayed(&handle) {
            Ok(true) => Outcome::Success(handle),
            Ok(false) => Outcome::NotYet(None),
            Err(err) => Outcome::from_err(err),
        }
    }

    fn describe(&self) -> String {
        format!("visibility of {}", self.locator)
    }
}

impl WaitCondition for Invisibility {
    type Output = ();

    fn probe(&mut self, session: &mut Session) -> Outcome<()> {
        let handle = match session.resolve(&self.locator) {
            Ok(Some(handle)) => handle,
            Ok(None) => return Outcome::Success(()),
            Err(err) => return Outcome::from_err(err),
        };
        match session.displayed(&handle) {
            Ok(true) => Outcome::NotYet(None),
            Ok(false) => Outcome::Success(()),
            // Detached between resolve and the visibility read means gone.
            Err(EsperarError::StaleReference { .. } | EsperarError::NotFound { .. }) => {
                Outcome::Success(())
            }
            Err(err) => Outcome::Fatal(err),
        }
    }

    fn describe(&self) -> String {
        format!("invisibility of {}", self.locator)
    }
}

impl WaitCondition for Clickable {
    type Output = ElementHandle;

    fn probe(&mut self, session: &mut Session) -> Outcome<ElementHandle> {
        let handle = match session.resolve(&self.locator) {
            Ok(Some(handle)) => handle,
            Ok(None) => return Outcome::NotYet(None),
            Err(err) => return Outcome::from_err(err),
        };
        match session.displayed(&handle) {
            Ok(true) => {}
            Ok(false) => return Outcome::NotYet(None),
            Err(err) => return Outcome::from_err(err),
        }
        match session.enabled(&handle) {
            Ok(true) => {}
            Ok(false) => return Outcome::NotYet(None),
            Err(err) => return Outcome::from_err(err),
        }
        let args = [serde_json::Value::from(handle.id.clone())];
        match session.execute_script(crate::action::scripts::TOP_AT_CENTER, &args) {
            Ok(serde_json::Value::Bool(true)) => Outcome::Success(handle),
            Ok(_) => Outcome::NotYet(None),
            Err(err) => Outcome::from_err(err),
        }
    }

    fn describe(&self) -> String {
        format!("clickability of {}", self.locator)
    }
}

impl WaitCondition for TextEquals {
    type Output = ();

    fn probe(&mut self, session: &mut Session) -> Outcome<()> {
        let handle = match session.resolve(&self.locator) {
            Ok(Some(handle)) => handle,
            Ok(None) => return Outcome::NotYet(None),
            Err(err) => return Outcome::from_err(err),
        };
        match session.text_of(&handle) {
            Ok(text) if text == self.expected => Outcome::Success(()),
            Ok(_) => Outcome::NotYet(None),
            Err(err) => Outcome::from_err(err),
        }
    }

    fn describe(&self) -> String {
        format!("text of {} equals {:?}", self.locator, self.expected)
    }
}

impl WaitCondition for TextContains {
    type Output = ();

    fn probe(&mut self, session: &mut Session) -> Outcome<()> {
        let handle = match session.resolve(&self.locator) {
            Ok(Some(handle)) => handle,
            Ok(None) => return Outcome::NotYet(None),
            Err(err) => return Outcome::from_err(err),
        };
        match session.text_of(&handle) {
            Ok(text) if text.contains(&self.needle) => Outcome::Success(()),
            Ok(_) => Outcome::NotYet(None),
            Err(err) => Outcome::from_err(err),
        }
    }

    fn describe(&self) -> String {
        format!("text of {} contains {:?}", self.locator, self.needle)
    }
}

impl WaitCondition for UrlEquals {
    type Output = ();

    fn probe(&mut self, session: &mut Session) -> Outcome<()> {
        match session.current_url() {
            Ok(url) if url == self.expected => Outcome::Success(()),
            Ok(_) => Outcome::NotYet(None),
            Err(err) => Outcome::from_err(err),
        }
    }

    fn describe(&self) -> String {
        format!("url equals {:?}", self.expected)
    }
}
