//! Backend traits and the result payload.
//!
//! A [`Backend`] knows how to build one [`Handle`]. The pool never touches a
//! handle itself: each handle is created, driven and released on the single
//! worker thread that owns it. `Handle` carries no `Send` bound, so a handle
//! that must not leave its thread cannot be moved out by mistake.

use std::fmt;

use bytes::Bytes;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Connection parameters handed to [`Backend::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackendConfig {
    /// Connection target understood by the backend (e.g. a connection string).
    pub connection: String,
    /// Backend entry-point identifier (e.g. the command handler to load).
    pub entry_point: String,
}

impl BackendConfig {
    /// Create a backend config from a connection target and entry point.
    pub fn new(connection: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            entry_point: entry_point.into(),
        }
    }
}

/// Factory for resource handles.
///
/// `initialize` runs on the worker thread that will own the returned handle
/// for its entire lifetime, so any thread-local setup the backend needs
/// belongs here.
pub trait Backend: Send + Sync + 'static {
    /// The resource handle type.
    type Handle: Handle;

    /// Error produced by a failed initialization.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Short identifier used in logs (e.g. "echo", "com").
    fn name(&self) -> &str {
        "backend"
    }

    /// Construct and initialize one resource instance.
    fn initialize(&self, config: &BackendConfig) -> std::result::Result<Self::Handle, Self::Error>;
}

/// An initialized resource, driven from exactly one thread.
pub trait Handle: Sized + 'static {
    /// Error produced by a failed command.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Execute one command against this resource.
    fn execute(
        &mut self,
        operation: &str,
        params: &str,
    ) -> std::result::Result<Payload, Self::Error>;

    /// Release everything the handle holds, in reverse acquisition order.
    ///
    /// Called exactly once, on the owning worker thread.
    fn release(self) {}
}

/// Dynamically typed value returned by a backend command.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Binary(Bytes),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// No value.
    Null,
}

impl Payload {
    /// Name of the variant, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Null => "null",
        }
    }

    /// Convert the payload into result bytes.
    ///
    /// Scalars are rendered in their display form; `Null` cannot be
    /// interpreted as a result and yields [`Error::ResultShape`].
    pub fn into_bytes(self, resource_id: u64) -> Result<Bytes> {
        match self {
            Self::Text(text) => Ok(Bytes::from(text)),
            Self::Binary(bytes) => Ok(bytes),
            Self::Integer(v) => Ok(Bytes::from(v.to_string())),
            Self::Float(v) => Ok(Bytes::from(v.to_string())),
            Self::Bool(v) => Ok(Bytes::from(v.to_string())),
            Self::Null => Err(Error::ResultShape {
                resource_id,
                found: "backend returned no value".to_string(),
            }),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self::Binary(value)
    }
}
