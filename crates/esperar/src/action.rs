//! Synchronized element interactions.
//!
//! Every interaction is await-then-act: wait for the element's readiness
//! condition, resolve it fresh, act on it. Two recoveries are built in,
//! each bounded to keep failures loud:
//!
//! - **Interception**: when a native click is blocked by an overlay that
//!   appeared after the clickability probe, exactly one programmatic
//!   click is dispatched in page context. If that also fails, the error
//!   surfaces.
//! - **Staleness**: when the handle detaches between resolution and use,
//!   the locator is re-resolved and the operation retried once. A second
//!   staleness in the same call surfaces [`EsperarError::StaleReference`].

use serde_json::Value;

use crate::driver::ElementHandle;
use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};
use crate::session::Session;
use crate::wait::{self, WaitOptions, Waiter};

/// Scripts evaluated in page context.
pub mod scripts {
    /// Programmatic click, bypassing hit-testing. The original escape
    /// hatch for overlays that swallow native clicks.
    pub const DISPATCH_CLICK: &str = "arguments[0].click();";

    /// Select the option whose visible text equals `arguments[1]`
    /// exactly. Returns the matched index, or -1 when no option matches.
    pub const SELECT_BY_VISIBLE_TEXT: &str = "\
        const select = arguments[0];\
        const wanted = arguments[1];\
        for (let i = 0; i < select.options.length; i++) {\
            if (select.options[i].text === wanted) {\
                select.selectedIndex = i;\
                select.dispatchEvent(new Event('change', { bubbles: true }));\
                return i;\
            }\
        }\
        return -1;";

    /// Whether the element (or a descendant) is topmost at the element's
    /// center point. False means a click there would land elsewhere.
    pub const TOP_AT_CENTER: &str = "\
        const r = arguments[0].getBoundingClientRect();\
        const el = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2);\
        return el === arguments[0] || arguments[0].contains(el);";
}

/// Synchronized interaction executor.
///
/// Stateless apart from its waiter; timing bounds come from the
/// session's configuration on every call.
#[derive(Debug)]
pub struct Actions {
    waiter: Waiter,
}

impl Default for Actions {
    fn default() -> Self {
        Self::new()
    }
}

impl Actions {
    /// Executor on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            waiter: Waiter::new(),
        }
    }

    /// Executor on an explicit waiter (and therefore clock).
    #[must_use]
    pub const fn with_waiter(waiter: Waiter) -> Self {
        Self { waiter }
    }

    /// Await clickability, then click.
    ///
    /// Waits until the element is visible, enabled, and topmost at its
    /// center, then clicks natively. Interception at click time gets one
    /// programmatic fallback; staleness gets one re-resolve and retry.
    pub fn click(&self, session: &mut Session, locator: &Locator) -> EsperarResult<()> {
        let options = WaitOptions::from_config(session.config());
        let handle =
            self.waiter
                .wait_for(session, &mut wait::clickable(locator.clone()), options)?;
        match self.click_once(session, &handle) {
            Err(EsperarError::StaleReference { .. }) => {
                tracing::warn!(
                    session = %session.id(),
                    locator = %locator,
                    "handle went stale during click, re-resolving once"
                );
                let handle = resolve_required(session, locator)?;
                self.click_once(session, &handle)
            }
            other => other,
        }
    }

    fn click_once(&self, session: &mut Session, handle: &ElementHandle) -> EsperarResult<()> {
        match session.click_native(handle) {
            Err(EsperarError::Intercepted { locator, message }) => {
                tracing::warn!(
                    session = %session.id(),
                    locator = %locator,
                    cause = %message,
                    "native click intercepted, dispatching programmatic click"
                );
                let args = [Value::from(handle.id.clone())];
                session
                    .execute_script(scripts::DISPATCH_CLICK, &args)
                    .map(|_| ())
            }
            other => other,
        }
    }

    /// Await visibility, clear the current value, then type `text`.
    ///
    /// Character order is preserved and nothing is submitted implicitly.
    pub fn type_text(
        &self,
        session: &mut Session,
        locator: &Locator,
        text: &str,
    ) -> EsperarResult<()> {
        let options = WaitOptions::from_config(session.config());
        let handle =
            self.waiter
                .wait_for(session, &mut wait::visibility(locator.clone()), options)?;
        match type_once(session, &handle, text) {
            Err(EsperarError::StaleReference { .. }) => {
                tracing::warn!(
                    session = %session.id(),
                    locator = %locator,
                    "handle went stale during type, re-resolving once"
                );
                let handle = resolve_required(session, locator)?;
                type_once(session, &handle, text)
            }
            other => other,
        }
    }

    /// Await visibility, then select the option whose visible text equals
    /// `text` exactly.
    ///
    /// No partial matching: a near-miss (wrong case, substring) is a
    /// [`EsperarError::NotFound`], never a silent no-op.
    pub fn select_by_text(
        &self,
        session: &mut Session,
        locator: &Locator,
        text: &str,
    ) -> EsperarResult<()> {
        let options = WaitOptions::from_config(session.config());
        let handle =
            self.waiter
                .wait_for(session, &mut wait::visibility(locator.clone()), options)?;
        match select_once(session, locator, &handle, text) {
            Err(EsperarError::StaleReference { .. }) => {
                tracing::warn!(
                    session = %session.id(),
                    locator = %locator,
                    "handle went stale during select, re-resolving once"
                );
                let handle = resolve_required(session, locator)?;
                select_once(session, locator, &handle, text)
            }
            other => other,
        }
    }

    /// Await presence, then return the element's visible text.
    pub fn read_text(&self, session: &mut Session, locator: &Locator) -> EsperarResult<String> {
        let options = WaitOptions::from_config(session.config());
        let handle =
            self.waiter
                .wait_for(session, &mut wait::presence(locator.clone()), options)?;
        match session.text_of(&handle) {
            Err(EsperarError::StaleReference { .. }) => {
                let handle = resolve_required(session, locator)?;
                session.text_of(&handle)
            }
            other => other,
        }
    }
}

fn resolve_required(session: &mut Session, locator: &Locator) -> EsperarResult<ElementHandle> {
    session
        .resolve(locator)?
        .ok_or_else(|| EsperarError::NotFound {
            locator: locator.to_string(),
        })
}

fn type_once(session: &mut Session, handle: &ElementHandle, text: &str) -> EsperarResult<()> {
    session.clear_value(handle)?;
    session.send_keys(handle, text)
}

fn select_once(
    session: &mut Session,
    locator: &Locator,
    handle: &ElementHandle,
    text: &str,
) -> EsperarResult<()> {
    let args = [Value::from(handle.id.clone()), Value::from(text)];
    let matched = session.execute_script(scripts::SELECT_BY_VISIBLE_TEXT, &args)?;
    let index: i64 = serde_json::from_value(matched)?;
    if index < 0 {
        return Err(EsperarError::NotFound {
            locator: format!("{locator} option with visible text {text:?}"),
        });
    }
    Ok(())
}
