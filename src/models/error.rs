// Instance Agent - Error Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared error types for the reconciliation engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for agent operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // Validation Errors
    // ========================================
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing '{key}' key for {context}")]
    MissingField { key: String, context: String },

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid netmask: {0}")]
    InvalidNetmask(String),

    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),

    #[error("Unknown interface MAC {0}")]
    UnknownMac(String),

    #[error("Unknown interface label {0}")]
    UnknownLabel(String),

    #[error("Multiple {family} default routes specified")]
    DuplicateGateway { family: &'static str },

    // ========================================
    // Render Errors
    // ========================================
    #[error("Couldn't render {family} configuration: {reason}")]
    RenderFailed { family: String, reason: String },

    #[error("Couldn't figure out my OS: {0}")]
    UnsupportedOs(String),

    // ========================================
    // Apply Errors
    // ========================================
    #[error("Failed to apply {}: {source}", path.display())]
    ApplyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ========================================
    // External Command Errors
    // ========================================
    #[error("Couldn't execute {command}: {reason}")]
    CommandSpawnFailed { command: String, reason: String },

    #[error("{command} exited with status {status}")]
    CommandFailed { command: String, status: i32 },

    #[error("Couldn't {action}: {reason}")]
    RestartFailed { action: String, reason: String },

    // ========================================
    // Configuration Errors
    // ========================================
    #[error("Failed to read configuration: {0}")]
    ConfigReadFailed(String),

    #[error("Failed to write configuration: {0}")]
    ConfigWriteFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationFailed(reason.into())
    }

    /// Create a new missing-field error.
    pub fn missing(key: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingField {
            key: key.into(),
            context: context.into(),
        }
    }

    /// Create a new render error for an OS family.
    pub fn render(family: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RenderFailed {
            family: family.into(),
            reason: reason.into(),
        }
    }

    /// Create a new apply error for a path.
    pub fn apply(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ApplyFailed {
            path: path.into(),
            source,
        }
    }

    /// Check if this error came from descriptor validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed(_)
                | Self::MissingField { .. }
                | Self::InvalidIpAddress(_)
                | Self::InvalidNetmask(_)
                | Self::InvalidHostname(_)
                | Self::InvalidMacAddress(_)
                | Self::UnknownMac(_)
                | Self::UnknownLabel(_)
                | Self::DuplicateGateway { .. }
        )
    }

    /// Check if this error came from a backend renderer.
    pub fn is_render(&self) -> bool {
        matches!(self, Self::RenderFailed { .. } | Self::UnsupportedOs(_))
    }

    /// Check if this error came from writing files.
    pub fn is_apply(&self) -> bool {
        matches!(self, Self::ApplyFailed { .. })
    }

    /// Check if this error came from an external program.
    pub fn is_external_command(&self) -> bool {
        matches!(
            self,
            Self::CommandSpawnFailed { .. }
                | Self::CommandFailed { .. }
                | Self::RestartFailed { .. }
        )
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from toml serialize errors
impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigWriteFailed(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}
