//! # Error Handling
//!
//! This module defines the centralized error type for `cfgweave`. It uses the
//! `thiserror` library to build a single `Error` enum that covers every
//! failure mode of the library, with contextual fields for diagnostics.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Variants carry the provider name, path, or
//!   operation that failed so messages are useful without a backtrace.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! The variants fall into a few groups:
//!
//! - Configuration problems (`ConfigParse`, `Validation`), raised before any
//!   file is touched.
//! - Registry problems (`EmptyProviderName`, `DuplicateProvider`,
//!   `ProviderNotFound`).
//! - Run failures wrapped with the provider that produced them (`Provider`).
//! - Backup and restore failures (`Backup`, `NotImplemented`).
//! - Merge and filesystem failures (`Merge`, `Filesystem`).
//! - Wrapped library errors (I/O, YAML, JSON, regex, glob, URL).

use thiserror::Error;

/// Main error type for cfgweave operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration file could not be parsed.
    ///
    /// Includes an optional hint about how to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A provider's configuration is invalid (empty or relative path,
    /// out-of-range port, empty host pattern, ...).
    #[error("Invalid configuration for provider '{provider}': {message}")]
    Validation { provider: String, message: String },

    /// A provider was registered with an empty name.
    #[error("Provider name must not be empty")]
    EmptyProviderName,

    /// A provider with the same name is already registered.
    #[error("Provider '{name}' is already registered")]
    DuplicateProvider { name: String },

    /// The requested provider does not exist.
    #[error("Provider '{name}' not found")]
    ProviderNotFound { name: String },

    /// An operation failed inside a specific provider.
    #[error("{operation} failed for provider '{provider}': {source}")]
    Provider {
        provider: String,
        operation: String,
        #[source]
        source: Box<Error>,
    },

    /// A backup could not be created, read or restored.
    #[error("Backup error for {path}: {message}")]
    Backup { path: String, message: String },

    /// An error occurred during a merge operation.
    #[error("Merge operation error: {operation} - {message}")]
    Merge { operation: String, message: String },

    /// An error occurred while writing or reading a target file.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// A mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// The requested feature is not supported.
    #[error("Feature not implemented: {feature}")]
    NotImplemented { feature: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Wrap this error with the provider and operation that produced it.
    pub fn in_provider(self, provider: &str, operation: &str) -> Self {
        Error::Provider {
            provider: provider.to_string(),
            operation: operation.to_string(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a [`Error::Validation`] error.
    pub fn validation(provider: &str, message: impl Into<String>) -> Self {
        Error::Validation {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
