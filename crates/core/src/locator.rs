use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder substituted by [`Locator::fill`].
pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Immutable description used to (re-)find an element on demand.
///
/// Locators are the only thing that survives a wait; element handles are
/// re-resolved from them every time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "lowercase")]
pub enum Locator {
    Id(String),
    XPath(String),
    Css(String),
}

impl Locator {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Id(_) => "id",
            Self::XPath(_) => "xpath",
            Self::Css(_) => "css",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Id(v) | Self::XPath(v) | Self::Css(v) => v,
        }
    }

    /// Builds a concrete locator from a template containing `{text}`.
    ///
    /// For XPath templates the text is inserted as a quoted XPath literal, so
    /// the template should use the placeholder where a string literal belongs:
    /// `//tr[td[normalize-space()={text}]]`.
    pub fn fill(&self, text: &str) -> Self {
        match self {
            Self::Id(v) => Self::Id(v.replace(TEXT_PLACEHOLDER, text)),
            Self::Css(v) => Self::Css(v.replace(TEXT_PLACEHOLDER, text)),
            Self::XPath(v) => Self::XPath(v.replace(TEXT_PLACEHOLDER, &xpath_literal(text))),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// Quotes `text` as an XPath 1.0 string literal.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{}'", text);
    }
    if !text.contains('"') {
        return format!("\"{}\"", text);
    }
    let parts = text
        .split('\'')
        .map(|p| format!("'{}'", p))
        .collect::<Vec<_>>()
        .join(", \"'\", ");
    format!("concat({})", parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_strategy_and_value() {
        assert_eq!(Locator::id("LoginButton").to_string(), "id=LoginButton");
        assert_eq!(Locator::css(".AFBusyWait").to_string(), "css=.AFBusyWait");
    }

    #[test]
    fn fill_quotes_xpath_literals() {
        let row = Locator::xpath("//tr[td[normalize-space()={text}]]");
        assert_eq!(
            row.fill("Acme Corp"),
            Locator::xpath("//tr[td[normalize-space()='Acme Corp']]")
        );
        assert_eq!(
            row.fill("O'Brien"),
            Locator::xpath("//tr[td[normalize-space()=\"O'Brien\"]]")
        );
    }

    #[test]
    fn fill_handles_both_quote_kinds() {
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }

    #[test]
    fn fill_is_plain_substitution_for_css() {
        let cell = Locator::css("td[title='{text}']");
        assert_eq!(cell.fill("Acme"), Locator::css("td[title='Acme']"));
    }

    #[test]
    fn serializes_as_tagged_object() {
        let json = serde_json::to_value(Locator::id("username")).unwrap();
        assert_eq!(json, serde_json::json!({ "by": "id", "value": "username" }));
    }
}
