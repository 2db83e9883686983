//! Locator abstraction for element selection.
//!
//! A [`Locator`] is a semantic descriptor `{ strategy, value }`, optionally
//! a template with `{}` placeholders bound to runtime values (e.g. a
//! product name spliced into a structural XPath query). Resolving a
//! locator is a pure read against current page state; no handle is ever
//! cached across calls.
//!
//! Template substitution is plain string splicing. A bound value that
//! contains structural metacharacters (quotes, brackets) alters which
//! elements the rendered query matches. That is the source behavior and
//! it is preserved deliberately; callers own sanitization.

use serde::{Deserialize, Serialize};

use crate::result::{EsperarError, EsperarResult};

/// Strategy used to match elements within a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// CSS selector
    Css,
    /// XPath expression
    XPath,
    /// `id` attribute
    Id,
    /// `name` attribute
    Name,
    /// Single class name
    ClassName,
    /// Exact anchor text
    LinkText,
}

impl Strategy {
    /// Short lowercase tag used in diagnostics and query keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Id => "id",
            Self::Name => "name",
            Self::ClassName => "class",
            Self::LinkText => "link",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully rendered query ready to hand to the browser driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Matching strategy
    pub strategy: Strategy,
    /// Final query string, with any template parameters substituted
    pub value: String,
}

impl Query {
    /// Stable `strategy:value` key, used for diagnostics and by the fake
    /// driver's page model.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.strategy, self.value)
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.strategy, self.value)
    }
}

/// Semantic element descriptor, optionally parameterized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    strategy: Strategy,
    template: String,
    args: Vec<String>,
}

impl Locator {
    /// Create a locator with an explicit strategy.
    #[must_use]
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            template: value.into(),
            args: Vec::new(),
        }
    }

    /// CSS selector locator.
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Css, selector)
    }

    /// XPath locator.
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, expression)
    }

    /// `id` attribute locator.
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Strategy::Id, id)
    }

    /// `name` attribute locator.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::new(Strategy::Name, name)
    }

    /// Class-name locator.
    #[must_use]
    pub fn class_name(class: impl Into<String>) -> Self {
        Self::new(Strategy::ClassName, class)
    }

    /// Exact link-text locator.
    #[must_use]
    pub fn link_text(text: impl Into<String>) -> Self {
        Self::new(Strategy::LinkText, text)
    }

    /// Bind the next `{}` placeholder to a runtime value.
    ///
    /// Values are spliced verbatim; see the module docs for the matching
    /// hazard this carries.
    #[must_use]
    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Bind several placeholders at once, in order.
    #[must_use]
    pub fn bind_all<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Number of `{}` placeholders in the template.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.template.matches("{}").count()
    }

    /// The matching strategy.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Render the final query, substituting bound values.
    ///
    /// Fails with `InvalidLocator` when placeholders and bound values do
    /// not line up; the poller treats that as fatal, not retryable.
    pub fn render(&self) -> EsperarResult<Query> {
        let placeholders = self.placeholder_count();
        if placeholders != self.args.len() {
            return Err(EsperarError::InvalidLocator {
                locator: format!("{}:{}", self.strategy, self.template),
                message: format!(
                    "{placeholders} placeholder(s) but {} bound value(s)",
                    self.args.len()
                ),
            });
        }

        let mut value = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        for arg in &self.args {
            // placeholder_count() == args.len(), so the split always finds one
            let (head, tail) = rest
                .split_once("{}")
                .unwrap_or((rest, ""));
            value.push_str(head);
            value.push_str(arg);
            rest = tail;
        }
        value.push_str(rest);

        Ok(Query {
            strategy: self.strategy,
            value,
        })
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.render() {
            Ok(query) => write!(f, "{query}"),
            Err(_) => write!(f, "{}:{}", self.strategy, self.template),
        }
    }
}
