//! Error types for resource dispatch and schema validation.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by `request()` or by forcing a lazy request.
///
/// Routing and configuration defects (`*NotFound`, `InvalidSchema`, `Config`)
/// are kept apart from data defects (`MissingParameter`, `InvalidArgument`,
/// `JsonSchemaValidation`) so callers can fail a deployment in one case and
/// answer with a 4xx in the other. See [`ResourceError::is_configuration_error`].
///
/// The type is `Clone` so one memoized failure can be handed to every caller
/// of the same lazy request.
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    #[error("invalid uri \"{uri}\": {message}")]
    UriSyntax { uri: String, message: String },

    #[error("no adapter bound for {scheme}://{host}")]
    AdapterNotFound { scheme: String, host: String },

    #[error("resource not found: {uri}")]
    ResourceNotFound { uri: String },

    #[error("{resource} does not support {verb} (no {method} method)")]
    MethodNotFound {
        resource: String,
        verb: String,
        method: &'static str,
    },

    #[error("missing parameter ${param} for {resource}::{method}")]
    MissingParameter {
        param: String,
        resource: String,
        method: &'static str,
    },

    #[error("invalid argument ${param}: {message}")]
    InvalidArgument { param: String, message: String },

    #[error("json schema not found: {path}")]
    JsonSchemaNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("invalid schema {path}: {message}")]
    InvalidSchema { path: PathBuf, message: String },

    #[error("json schema validation failed for {uri} with {} error(s)", errors.len())]
    JsonSchemaValidation { uri: String, errors: Vec<SchemaError> },

    #[error("invocation failed: {message}")]
    Invocation { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

/// Single constraint violation, in the order the validator reported it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SchemaError {
    /// Dotted property path (`name.firstName`); empty for the document root.
    pub property: String,
    /// Human-readable constraint message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.property.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "[{}] {}", self.property, self.message)
        }
    }
}

impl ResourceError {
    pub(crate) fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResourceError::ReadError { .. } => 3,
            ResourceError::MissingParameter { .. }
            | ResourceError::InvalidArgument { .. }
            | ResourceError::JsonSchemaValidation { .. } => 1,
            _ => 2,
        }
    }

    /// True for defects in wiring or deployment rather than in request data.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ResourceError::AdapterNotFound { .. }
                | ResourceError::ResourceNotFound { .. }
                | ResourceError::MethodNotFound { .. }
                | ResourceError::JsonSchemaNotFound { .. }
                | ResourceError::ReadError { .. }
                | ResourceError::InvalidSchema { .. }
                | ResourceError::Config { .. }
        )
    }

    /// Constraint violations carried by a validation failure, in order.
    ///
    /// Empty for every other kind of error.
    pub fn violations(&self) -> &[SchemaError] {
        match self {
            ResourceError::JsonSchemaValidation { errors, .. } => errors,
            _ => &[],
        }
    }
}
