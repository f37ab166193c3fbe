//! Typed errors for the resource commands.
//!
//! `ResourceError` is what every handler returns. Best-effort conditions
//! (missing handler, undecodable input, missing directory) are logged by the
//! context, which carries on. An undecodable request only surfaces as
//! `Request` once the handler fails on its default request.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::contract::{CommandResponse, ValidationError};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("unknown command {name:?}: {detail}")]
    UnknownCommand { name: String, detail: String },

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// The request could not be decoded, so the handler ran on defaults.
    #[error("failed to decode request: {0}")]
    Request(String),

    #[error("failed to {operation}: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error("failed to decode {kind} function error payload: {source}")]
    FunctionErrorDecode {
        kind: FunctionErrorKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write data to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to marshal JSON for writing to {path}: {source}")]
    EncodeFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode response: {0}")]
    EncodeResponse(#[source] serde_json::Error),

    #[error("failed to write response: {0}")]
    Output(#[source] std::io::Error),

    #[error("failed to build code archive: {0}")]
    Archive(#[from] ArchiveError),

    /// A later step failed after earlier steps already changed remote state.
    #[error("{source}")]
    PartiallyApplied {
        response: Box<CommandResponse>,
        source: Box<ResourceError>,
    },
}

impl ResourceError {
    pub fn api(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Api {
            operation,
            message: message.into(),
        }
    }

    pub fn partially_applied(response: CommandResponse, source: ResourceError) -> Self {
        Self::PartiallyApplied {
            response: Box::new(response),
            source: Box::new(source),
        }
    }

    /// The response built before the failure, if any remote change landed.
    pub fn partial_response(&self) -> Option<&CommandResponse> {
        match self {
            Self::PartiallyApplied { response, .. } => Some(response),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionErrorKind {
    /// The function reported the error itself.
    Handled,
    /// Runtime failures: syntax errors, uncaught exceptions, timeouts.
    Unhandled,
}

impl FunctionErrorKind {
    pub fn from_header(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("handled") {
            Self::Handled
        } else {
            Self::Unhandled
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handled => "Handled",
            Self::Unhandled => "Unhandled",
        }
    }
}

impl fmt::Display for FunctionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised inside the invoked function, as opposed to a failure to
/// reach it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("function failed to run because of a {kind} error: {message}")]
pub struct FunctionError {
    pub kind: FunctionErrorKind,
    pub message: String,
    pub error_type: Option<String>,
    pub stack_trace: Vec<String>,
}

#[derive(Deserialize)]
struct FunctionErrorPayload {
    #[serde(rename = "errorMessage", default)]
    message: Option<String>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(rename = "stackTrace", default)]
    stack_trace: Option<Vec<Value>>,
}

impl FunctionError {
    pub fn decode(kind: FunctionErrorKind, payload: &[u8]) -> Result<Self, serde_json::Error> {
        let payload: FunctionErrorPayload = serde_json::from_slice(payload)?;
        // Some runtimes report frames as nested arrays rather than strings.
        let stack_trace = payload
            .stack_trace
            .unwrap_or_default()
            .into_iter()
            .map(|frame| match frame {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect();

        Ok(Self {
            kind,
            message: payload.message.unwrap_or_default(),
            error_type: payload.error_type,
            stack_trace,
        })
    }
}
