//! Error taxonomies exposed by the facades.
//!
//! Each subsystem owns a small closed set of errors, backend failures are translated
//! by the `From<store::Error>` implementations below.

use log::debug;

use crate::store::{self, ErrorCode};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("unauthorized")]
    Unauthorized,
    /// The store refused the operation or the document does not exist.
    #[error("database error :: {0}")]
    Document(String),
    /// The store answered but the document shape does not match the expected type.
    #[error("parsing error :: {0}")]
    Parse(String),
    #[error("cancelled")]
    Cancelled,
    #[error("unknown error :: {0}")]
    Unknown(String),
}

impl DocumentError {
    pub fn not_found(path: impl std::fmt::Display) -> Self {
        Self::Document(format!("document `{path}` does not exist"))
    }
}

impl From<store::Error> for DocumentError {
    fn from(e: store::Error) -> Self {
        debug!("document store error: {}", e);
        match e.code {
            ErrorCode::PermissionDenied | ErrorCode::Unauthenticated => Self::Unauthorized,
            ErrorCode::Cancelled => Self::Cancelled,
            ErrorCode::Unknown => Self::Unknown(e.message),
            ErrorCode::NotFound
            | ErrorCode::ResourceExhausted
            | ErrorCode::InvalidArgument
            | ErrorCode::Unavailable
            | ErrorCode::Internal => Self::Document(e.message),
        }
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("object not found :: {0}")]
    ObjectNotFound(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("transfer cancelled")]
    Cancelled,
    #[error("unknown error :: {0}")]
    Unknown(String),
}

impl From<store::Error> for StorageError {
    fn from(e: store::Error) -> Self {
        debug!("object store error: {}", e);
        match e.code {
            ErrorCode::NotFound => Self::ObjectNotFound(e.message),
            ErrorCode::PermissionDenied | ErrorCode::Unauthenticated => Self::Unauthorized,
            ErrorCode::Cancelled => Self::Cancelled,
            _ => Self::Unknown(e.message),
        }
    }
}

/// Errors recorded by the remote flag cache, they are never returned to the caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FlagError {
    #[error("unable to fetch remote flags :: {0}")]
    Fetch(String),
    #[error("bad remote version :: {0}")]
    Version(String),
}

impl From<store::Error> for FlagError {
    fn from(e: store::Error) -> Self {
        Self::Fetch(e.to_string())
    }
}
