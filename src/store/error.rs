/// Failure category reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    PermissionDenied,
    Unauthenticated,
    Cancelled,
    ResourceExhausted,
    InvalidArgument,
    Unavailable,
    Internal,
    Unknown,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{code:?}: {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<object_store::Error> for Error {
    fn from(e: object_store::Error) -> Self {
        let code = match &e {
            object_store::Error::NotFound { .. } => ErrorCode::NotFound,
            object_store::Error::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            object_store::Error::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            object_store::Error::InvalidPath { .. } => ErrorCode::InvalidArgument,
            object_store::Error::AlreadyExists { .. }
            | object_store::Error::Precondition { .. }
            | object_store::Error::NotModified { .. } => ErrorCode::InvalidArgument,
            object_store::Error::NotSupported { .. } | object_store::Error::NotImplemented => {
                ErrorCode::Unavailable
            }
            _ => ErrorCode::Unknown,
        };
        Self::new(code, e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        let code = match e.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::Internal,
        };
        Self::new(code, e.to_string())
    }
}
