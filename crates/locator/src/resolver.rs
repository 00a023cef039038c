//! Locator Resolver
//!
//! `resolve()` is the only way to build a `Locator`, so every query that
//! reaches the wire has been validated once, at the call site.

use crate::error::{LocatorError, Result};
use crate::types::{ElementDescription, Locator, Strategy};
use crate::utils::{ui_selector_literal, xpath_literal};

/// Resolve a semantic description into a server query
pub fn resolve(description: &ElementDescription) -> Result<Locator> {
    match description {
        ElementDescription::Text(text) => {
            non_empty(text, "text")?;
            Ok(Locator::new(
                Strategy::UiAutomator,
                format!("new UiSelector().text({})", ui_selector_literal(text)),
            ))
        }
        ElementDescription::Id(id) => {
            identifier(id, "identifier")?;
            Ok(Locator::new(Strategy::Id, id.as_str()))
        }
        ElementDescription::ResourceId { package, name } => {
            identifier(package, "package")?;
            identifier(name, "identifier")?;
            Ok(Locator::new(Strategy::Id, format!("{}:id/{}", package, name)))
        }
        ElementDescription::TextContains(fragment) => {
            non_empty(fragment, "text")?;
            Ok(Locator::new(
                Strategy::XPath,
                format!("//*[contains(@text, {})]", xpath_literal(fragment)),
            ))
        }
        ElementDescription::Expression(expression) => {
            let trimmed = expression.trim();
            non_empty(trimmed, "xpath")?;
            if !(trimmed.starts_with('/') || trimmed.starts_with('(')) {
                return Err(LocatorError::MalformedExpression(expression.clone()));
            }
            Ok(Locator::new(Strategy::XPath, trimmed))
        }
        ElementDescription::AccessibilityId(label) => {
            non_empty(label, "accessibility")?;
            Ok(Locator::new(Strategy::AccessibilityId, label.as_str()))
        }
        ElementDescription::AnyElement => Ok(any_element()),
    }
}

/// Matches whatever is on screen
pub fn any_element() -> Locator {
    Locator::new(Strategy::XPath, "//*")
}

fn non_empty(value: &str, what: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LocatorError::Empty(what));
    }
    Ok(())
}

fn identifier(value: &str, what: &'static str) -> Result<()> {
    non_empty(value, what)?;
    if value.chars().any(char::is_whitespace) {
        return Err(LocatorError::WhitespaceInIdentifier(value.to_string()));
    }
    Ok(())
}
