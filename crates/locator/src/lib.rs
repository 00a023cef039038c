//! Locator Resolution
//!
//! Turns a semantic element description (text, identifier, structural
//! expression) into a query the automation server understands.
//!
//! ```text
//! ElementDescription → resolve() → Locator { strategy, value } → {"using", "value"}
//! ```
//!
//! Pure functions only. Nothing here talks to a device.

pub mod error;
pub mod resolver;
pub mod types;
pub mod utils;

pub use error::{LocatorError, Result};
pub use resolver::{any_element, resolve};
pub use types::*;
