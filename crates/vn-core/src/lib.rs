//! Shared primitives used across Veneer crates.

pub mod context;
pub mod logging;

use core::fmt;

pub use context::ProxyContext;
pub use context::ProxyEndpoint;
pub use context::ProxyProtocol;

/// Result alias used across the workspace.
pub type VeneerResult<T> = Result<T, VeneerError>;

/// Top-level error type.
///
/// Hot-path operations never surface this to page script; they log it and
/// fall back to pass-through. It is returned from configuration and from the
/// fallible internals the public entry points wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VeneerError {
    pub code: &'static str,
    pub message: String,
}

impl VeneerError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for VeneerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for VeneerError {}
