//! Structured error types shared across RETRO crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`RetroError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, offsets, engine return codes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the RETRO generator.
///
/// Rejections of tentative vertices are not errors: they are counted by the
/// sampling loop and never surface through this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum RetroError {
    /// Invalid run card or generation model parameters. Fatal at setup.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Failure reported by the topography service.
    #[error("topography error: {0}")]
    Topography(ErrorInfo),
    /// Failure reported by the tau decay engine.
    #[error("decay error: {0}")]
    Decay(ErrorInfo),
    /// Failure reported by the primary flux sampler.
    #[error("primary error: {0}")]
    Primary(ErrorInfo),
    /// Event log corruption or misuse.
    #[error("log error: {0}")]
    Log(ErrorInfo),
    /// File system and process errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl RetroError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            RetroError::Config(info)
            | RetroError::Topography(info)
            | RetroError::Decay(info)
            | RetroError::Primary(info)
            | RetroError::Log(info)
            | RetroError::Io(info)
            | RetroError::Serde(info) => info,
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        RetroError::Config(ErrorInfo::new(code, message))
    }

    /// Wraps an I/O failure on the given path.
    pub fn io(
        code: impl Into<String>,
        err: &std::io::Error,
        path: impl AsRef<std::path::Path>,
    ) -> Self {
        RetroError::Io(
            ErrorInfo::new(code, err.to_string())
                .with_context("path", path.as_ref().display().to_string()),
        )
    }
}
