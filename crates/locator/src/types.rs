//! Core locator types
//!
//! `Locator` is what goes over the wire. `ElementDescription` is what a
//! scenario author writes. Only `resolve()` turns one into the other.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LocatorError;

/// Lookup strategy understood by the automation server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "xpath")]
    XPath,
    #[serde(rename = "-android uiautomator")]
    UiAutomator,
    #[serde(rename = "accessibility id")]
    AccessibilityId,
}

impl Strategy {
    /// Value of the `using` field in a find-element request
    pub fn as_wire(&self) -> &'static str {
        match self {
            Strategy::Id => "id",
            Strategy::XPath => "xpath",
            Strategy::UiAutomator => "-android uiautomator",
            Strategy::AccessibilityId => "accessibility id",
        }
    }
}

/// A resolved element query
///
/// Serializes directly into the WebDriver find-element body:
/// `{"using": "id", "value": "com.app:id/title"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Locator {
    #[serde(rename = "using")]
    strategy: Strategy,
    value: String,
}

impl Locator {
    pub(crate) fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy.as_wire(), self.value)
    }
}

/// Semantic description of a UI element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementDescription {
    /// Exact visible text
    Text(String),
    /// Stable, fully qualified element identifier
    Id(String),
    /// Resource id split into owning package and short name
    ResourceId { package: String, name: String },
    /// Any element whose text contains the substring
    TextContains(String),
    /// Raw structural (xpath) expression
    Expression(String),
    AccessibilityId(String),
    /// Matches whatever is on screen
    AnyElement,
}

impl ElementDescription {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn resource(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ResourceId {
            package: package.into(),
            name: name.into(),
        }
    }

    pub fn contains(fragment: impl Into<String>) -> Self {
        Self::TextContains(fragment.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::Expression(expression.into())
    }

    pub fn accessibility(label: impl Into<String>) -> Self {
        Self::AccessibilityId(label.into())
    }
}

/// Parses `kind=value` descriptions, e.g. `text=Play`, `id=com.app:id/title`,
/// `contains=Unavailable`, `xpath=//*`, `a11y=Close`, or the bare word `any`.
impl FromStr for ElementDescription {
    type Err = LocatorError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed == "any" {
            return Ok(Self::AnyElement);
        }

        let (kind, value) = trimmed
            .split_once('=')
            .ok_or_else(|| LocatorError::UnknownKind {
                kind: String::new(),
                input: input.to_string(),
            })?;

        match kind.trim() {
            "text" => Ok(Self::text(value)),
            "id" => Ok(Self::id(value)),
            "contains" => Ok(Self::contains(value)),
            "xpath" => Ok(Self::xpath(value)),
            "a11y" | "accessibility" => Ok(Self::accessibility(value)),
            other => Err(LocatorError::UnknownKind {
                kind: other.to_string(),
                input: input.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_wire_shape() {
        let locator = Locator::new(Strategy::UiAutomator, "new UiSelector().text(\"Play\")");
        let body = serde_json::to_value(&locator).unwrap();

        assert_eq!(body["using"], "-android uiautomator");
        assert_eq!(body["value"], "new UiSelector().text(\"Play\")");
    }

    #[test]
    fn test_parse_descriptions() {
        assert_eq!(
            "text=Play".parse::<ElementDescription>().unwrap(),
            ElementDescription::text("Play")
        );
        assert_eq!(
            "xpath=//*[@text='a=b']".parse::<ElementDescription>().unwrap(),
            ElementDescription::xpath("//*[@text='a=b']")
        );
        assert_eq!(
            " any ".parse::<ElementDescription>().unwrap(),
            ElementDescription::AnyElement
        );
    }

    #[test]
    fn test_parse_unknown_kind() {
        let err = "css=.button".parse::<ElementDescription>().unwrap_err();
        assert!(matches!(err, LocatorError::UnknownKind { ref kind, .. } if kind == "css"));

        assert!("Play".parse::<ElementDescription>().is_err());
    }
}
