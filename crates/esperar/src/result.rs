//! Result and error types for Esperar.
//!
//! The taxonomy distinguishes *transient* conditions (absorbed inside the
//! wait/retry loops and never seen by callers unless a deadline lapses)
//! from *fatal* ones (surfaced immediately with enough context to diagnose
//! without re-running the test).

use thiserror::Error;

/// Result type for Esperar operations
pub type EsperarResult<T> = Result<T, EsperarError>;

/// Errors that can occur while synchronizing with a browser
#[derive(Debug, Error)]
pub enum EsperarError {
    /// Locator resolved to zero elements outside a wait context
    #[error("element not found: {locator}")]
    NotFound {
        /// Locator that matched nothing
        locator: String,
    },

    /// Condition unmet within its deadline
    #[error(
        "waiting for {condition} timed out after {elapsed_ms}ms (limit {timeout_ms}ms); last transient cause: {}",
        last_cause.as_deref().unwrap_or("none")
    )]
    Timeout {
        /// Description of the condition, including its locator
        condition: String,
        /// Configured timeout in milliseconds
        timeout_ms: u64,
        /// Wall-clock actually spent waiting
        elapsed_ms: u64,
        /// Last transient error observed while polling
        last_cause: Option<String>,
    },

    /// Element handle detached between resolution and use
    #[error("stale element reference for {locator}: {message}")]
    StaleReference {
        /// Locator or handle the operation targeted
        locator: String,
        /// Driver-reported detail
        message: String,
    },

    /// Native interaction blocked by another element
    #[error("click intercepted on {locator}: {message}")]
    Intercepted {
        /// Locator of the intended click target
        locator: String,
        /// Driver-reported detail (usually names the obscuring element)
        message: String,
    },

    /// Session creation or navigation failure; always fatal, never retried
    #[error("session error: {message}")]
    Session {
        /// Error message
        message: String,
    },

    /// Malformed locator or unbound template parameters
    #[error("invalid locator {locator}: {message}")]
    InvalidLocator {
        /// The offending locator
        locator: String,
        /// What made it invalid
        message: String,
    },

    /// Page-flow authoring error (undeclared state or transition)
    #[error("page flow error: {message}")]
    PageFlow {
        /// Error message
        message: String,
    },

    /// JSON error (script argument/result decoding)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EsperarError {
    /// Whether a wait loop may absorb this error and keep polling.
    ///
    /// `NotFound` and `StaleReference` are expected races between the test
    /// thread and the rendering process; everything else propagates
    /// immediately.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::StaleReference { .. })
    }
}
