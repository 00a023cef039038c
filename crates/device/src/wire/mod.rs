//! WebDriver/Appium wire client
//!
//! Core principle: one HTTP transport per server, one remote session per device.
//! Everything above this module talks to `RemoteSession`, never to HTTP.

pub mod client;
pub mod protocol;
pub mod session;

pub use client::{HttpTransport, Transport, WireError};
pub use protocol::{ElementId, Method, SessionId};
pub use session::RemoteSession;
