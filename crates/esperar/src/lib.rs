//! Esperar: synchronization and interaction core for browser-driven tests
//!
//! Esperar (Spanish: "to wait") sits between test scenarios and a browser
//! driver, and owns the one hard problem of end-to-end testing: the test
//! thread races the browser's rendering pipeline, so an element that is
//! absent, invisible, or detached right now may be perfectly ready a few
//! hundred milliseconds later.
//!
//! # Model
//!
//! - A [`Locator`] is a semantic description of an element, optionally a
//!   template bound with runtime values. It is resolved fresh against the
//!   live DOM on every operation; resolved handles are never cached.
//! - A [`WaitCondition`] is probed repeatedly by the [`Waiter`]. Each
//!   probe yields an [`Outcome`]: not yet (sleep and retry), success
//!   (return immediately), or fatal (raise immediately). Transient
//!   misses are values, not exceptions.
//! - [`Actions`] perform await-then-act interactions with two bounded
//!   recoveries: one programmatic fallback for an intercepted click, and
//!   one re-resolve for a handle that went stale mid-operation.
//! - A [`Session`] owns one browser for one test and tears it down on
//!   every exit path.
//!
//! # Example
//!
//! ```
//! use esperar::{
//!     Actions, EsperarResult, FakeDriver, FakeElement, FakePage, Locator, Session,
//!     SessionConfig,
//! };
//!
//! fn main() -> EsperarResult<()> {
//!     let login = Locator::id("login-button");
//!     let page = FakePage::new("https://www.saucedemo.com/", "Swag Labs")
//!         .with_element(&login, FakeElement::new("button"));
//!     let driver = FakeDriver::with_page(page);
//!
//!     let mut session = Session::attach(Box::new(driver), SessionConfig::default());
//!     Actions::new().click(&mut session, &login)?;
//!     Ok(())
//! }
//! ```
//!
//! The driver boundary is the [`WebDriver`] trait; a protocol adapter
//! (CDP, WebDriver) implements it out of tree, and [`FakeDriver`]
//! implements it in memory for tests.

#![warn(missing_docs)]

mod action;
mod clock;
mod driver;
mod locator;
mod page;
mod result;
mod session;
#[cfg(not(target_arch = "wasm32"))]
mod trace;
mod wait;

pub use action::{scripts, Actions};
pub use clock::{Clock, FakeClock, SystemClock};
pub use driver::{
    DriverError, DriverErrorKind, DriverResult, ElementHandle, FakeDriver, FakeElement, FakePage,
    WebDriver,
};
pub use locator::{Locator, Query, Strategy};
pub use page::{Page, PageBuilder, PageFlow, PageObject, TransitionTable};
pub use result::{EsperarError, EsperarResult};
pub use session::{Session, SessionConfig};
#[cfg(not(target_arch = "wasm32"))]
pub use trace::{init_tracing, init_tracing_json};
pub use wait::{
    clickable, invisibility, presence, text_contains, text_equals, url_equals, visibility,
    Clickable, FnCondition, Invisibility, Outcome, Presence, TextContains, TextEquals, UrlEquals,
    Visibility, WaitCondition, WaitOptions, Waiter,
};
