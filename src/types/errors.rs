//! Application error types.
//!
//! All errors use `thiserror` and map onto exactly one gRPC status code in
//! [`Error::to_grpc_status`], which is the only place the protocol mapping
//! happens.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the gateway.
#[derive(Error, Debug)]
pub enum Error {
    /// Client-caused request problems (map to gRPC INVALID_ARGUMENT).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown package or runtime (map to gRPC NOT_FOUND).
    #[error("not found: {0}")]
    NotFound(String),

    /// Engine failure while priming or running a job (map to gRPC INTERNAL).
    ///
    /// The engine text is logged but never sent to the client.
    #[error("execution error: {0}")]
    Execution(String),

    /// Engine failure while releasing a job's resources (map to gRPC INTERNAL).
    #[error("cleanup error: {0}")]
    Cleanup(String),

    /// Collaborator failures whose message is meant for the client (map to gRPC INTERNAL).
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// gRPC transport errors.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convert to gRPC status code.
    pub fn to_grpc_status(&self) -> tonic::Status {
        match self {
            Error::Validation(msg) => tonic::Status::invalid_argument(msg),
            Error::NotFound(msg) => tonic::Status::not_found(msg),
            Error::Execution(_) => tonic::Status::internal("Error executing job"),
            Error::Cleanup(_) => tonic::Status::internal("Error cleaning up job"),
            Error::Internal(msg) => tonic::Status::internal(msg),
            Error::Serialization(e) => {
                tonic::Status::internal(format!("serialization error: {}", e))
            }
            Error::Transport(e) => tonic::Status::internal(format!("transport error: {}", e)),
            Error::Io(e) => tonic::Status::internal(format!("io error: {}", e)),
        }
    }
}

// Convenience constructors
impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    pub fn cleanup(msg: impl Into<String>) -> Self {
        Self::Cleanup(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

// Implement From<Error> for Status to enable ? operator in gRPC handlers
impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        err.to_grpc_status()
    }
}
