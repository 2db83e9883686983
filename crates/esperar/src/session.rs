//! Browser session lifetime and the resolver facade.
//!
//! A [`Session`] owns exactly one driver for the duration of one test.
//! It is created before the first interaction, never shared, and torn
//! down on every exit path: [`Session::close`] is idempotent and `Drop`
//! calls it, so a panicking test still releases the browser.

use serde_json::Value;
use uuid::Uuid;

use crate::driver::{DriverError, DriverErrorKind, ElementHandle, WebDriver};
use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};

/// Launch-time and timing configuration for a session.
///
/// The timing defaults are the productive baseline for a rendered web
/// app: a 10s default wait, 500ms polls, and a 30s page-load ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// URL opened right after launch (skipped when empty)
    pub base_url: String,
    /// Run the browser without a visible window
    pub headless: bool,
    /// Extra arguments passed through to the launcher
    pub launch_args: Vec<String>,
    /// Default wait timeout in milliseconds
    pub default_timeout_ms: u64,
    /// Pause between condition probes in milliseconds
    pub poll_interval_ms: u64,
    /// Ceiling for full page loads in milliseconds
    pub page_load_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            headless: true,
            launch_args: Vec::new(),
            default_timeout_ms: 10_000,
            poll_interval_ms: 500,
            page_load_timeout_ms: 30_000,
        }
    }
}

impl SessionConfig {
    /// Create a config with the default timings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the URL opened right after launch.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set headless mode.
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Append a launcher argument.
    #[must_use]
    pub fn with_launch_arg(mut self, arg: impl Into<String>) -> Self {
        self.launch_args.push(arg.into());
        self
    }

    /// Set the default wait timeout.
    #[must_use]
    pub const fn with_default_timeout_ms(mut self, ms: u64) -> Self {
        self.default_timeout_ms = ms;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the page-load ceiling.
    #[must_use]
    pub const fn with_page_load_timeout_ms(mut self, ms: u64) -> Self {
        self.page_load_timeout_ms = ms;
        self
    }
}

/// Translate a driver failure into the crate taxonomy, attaching the
/// locator or operation it occurred under. A mid-navigation document is
/// treated as staleness: the old DOM is gone and a fresh resolve is the
/// only way forward.
pub(crate) fn lift(context: &str, err: DriverError) -> EsperarError {
    match err.kind {
        DriverErrorKind::NotFound => EsperarError::NotFound {
            locator: context.to_string(),
        },
        DriverErrorKind::Stale | DriverErrorKind::Navigating => EsperarError::StaleReference {
            locator: context.to_string(),
            message: err.message,
        },
        DriverErrorKind::Intercepted => EsperarError::Intercepted {
            locator: context.to_string(),
            message: err.message,
        },
        DriverErrorKind::InvalidSelector => EsperarError::InvalidLocator {
            locator: context.to_string(),
            message: err.message,
        },
        DriverErrorKind::Script | DriverErrorKind::Session => EsperarError::Session {
            message: format!("{context}: {err}"),
        },
    }
}

/// One browser, one test.
///
/// All element access goes through the resolver methods, which render
/// the locator and query the live DOM fresh on every call. Handles are
/// parameters, never fields.
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    driver: Option<Box<dyn WebDriver>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("open", &self.driver.is_some())
            .finish()
    }
}

impl Session {
    /// Launch a browser via `launcher` and navigate to the base URL.
    ///
    /// A launch or initial-navigation failure is fatal and is never
    /// retried; the partially-launched driver is torn down before the
    /// error is returned.
    pub fn open<L>(config: SessionConfig, launcher: L) -> EsperarResult<Self>
    where
        L: FnOnce(&SessionConfig) -> Result<Box<dyn WebDriver>, DriverError>,
    {
        let id = Uuid::new_v4();
        tracing::info!(session = %id, headless = config.headless, "launching browser");
        let driver = launcher(&config).map_err(|e| EsperarError::Session {
            message: format!("browser launch failed: {e}"),
        })?;
        let mut session = Self {
            id,
            config,
            driver: Some(driver),
        };
        if !session.config.base_url.is_empty() {
            let base = session.config.base_url.clone();
            if let Err(e) = session.navigate(&base) {
                session.close();
                return Err(e);
            }
        }
        Ok(session)
    }

    /// Wrap an already-launched driver.
    #[must_use]
    pub fn attach(driver: Box<dyn WebDriver>, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            driver: Some(driver),
        }
    }

    /// Correlation id for log output.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the browser is still attached.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    fn driver_mut(&mut self) -> EsperarResult<&mut (dyn WebDriver + 'static)> {
        self.driver
            .as_deref_mut()
            .ok_or_else(|| EsperarError::Session {
                message: "session is closed".to_string(),
            })
    }

    /// Navigate to `url`.
    pub fn navigate(&mut self, url: &str) -> EsperarResult<()> {
        tracing::debug!(session = %self.id, url, "navigate");
        self.driver_mut()?
            .navigate(url)
            .map_err(|e| EsperarError::Session {
                message: format!("navigation to {url} failed: {e}"),
            })
    }

    /// Current top-level URL.
    pub fn current_url(&mut self) -> EsperarResult<String> {
        self.driver_mut()?
            .current_url()
            .map_err(|e| lift("current_url", e))
    }

    /// Current document title.
    pub fn title(&mut self) -> EsperarResult<String> {
        self.driver_mut()?.title().map_err(|e| lift("title", e))
    }

    /// Evaluate a script in page context.
    pub fn execute_script(&mut self, script: &str, args: &[Value]) -> EsperarResult<Value> {
        self.driver_mut()?
            .execute_script(script, args)
            .map_err(|e| lift("execute_script", e))
    }

    /// Resolve the first element matching `locator`, fresh from the live
    /// DOM. Absence is `Ok(None)`, not an error.
    pub fn resolve(&mut self, locator: &Locator) -> EsperarResult<Option<ElementHandle>> {
        let query = locator.render()?;
        let context = query.key();
        self.driver_mut()?
            .find_element(&query)
            .map_err(|e| lift(&context, e))
    }

    /// Resolve all elements matching `locator` (possibly empty).
    pub fn resolve_all(&mut self, locator: &Locator) -> EsperarResult<Vec<ElementHandle>> {
        let query = locator.render()?;
        let context = query.key();
        self.driver_mut()?
            .find_elements(&query)
            .map_err(|e| lift(&context, e))
    }

    /// Whether `handle` is rendered visible.
    pub fn displayed(&mut self, handle: &ElementHandle) -> EsperarResult<bool> {
        let context = handle.description.clone();
        self.driver_mut()?
            .is_displayed(handle)
            .map_err(|e| lift(&context, e))
    }

    /// Whether `handle` is enabled.
    pub fn enabled(&mut self, handle: &ElementHandle) -> EsperarResult<bool> {
        let context = handle.description.clone();
        self.driver_mut()?
            .is_enabled(handle)
            .map_err(|e| lift(&context, e))
    }

    /// Visible text of `handle`.
    pub fn text_of(&mut self, handle: &ElementHandle) -> EsperarResult<String> {
        let context = handle.description.clone();
        self.driver_mut()?
            .text(handle)
            .map_err(|e| lift(&context, e))
    }

    /// Native click on `handle`.
    pub fn click_native(&mut self, handle: &ElementHandle) -> EsperarResult<()> {
        let context = handle.description.clone();
        self.driver_mut()?
            .click(handle)
            .map_err(|e| lift(&context, e))
    }

    /// Send `text` to `handle`, preserving character order.
    pub fn send_keys(&mut self, handle: &ElementHandle, text: &str) -> EsperarResult<()> {
        let context = handle.description.clone();
        self.driver_mut()?
            .send_keys(handle, text)
            .map_err(|e| lift(&context, e))
    }

    /// Clear the current value of `handle`.
    pub fn clear_value(&mut self, handle: &ElementHandle) -> EsperarResult<()> {
        let context = handle.description.clone();
        self.driver_mut()?
            .clear(handle)
            .map_err(|e| lift(&context, e))
    }

    /// Tear the browser down. Safe to call any number of times; a
    /// driver-level close failure is logged, not raised.
    pub fn close(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            tracing::info!(session = %self.id, "closing browser");
            if let Err(e) = driver.close() {
                tracing::warn!(session = %self.id, error = %e, "browser close failed");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
