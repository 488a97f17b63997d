//! Error types for the TraceKit SDK.

use crate::storage::StorageError;
use crate::transport::TransportError;
use thiserror::Error;

/// A specialised Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors that can occur in the SDK.
///
/// Capture-facing APIs never surface these to the caller; they are logged and
/// absorbed. The typed variants exist for the transport and storage layers and
/// for host applications that drive the SDK lifecycle directly.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration loading or parsing failed.
    #[error("configuration error")]
    Config(#[source] Box<figment::Error>),

    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Persistent storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<figment::Error> for SdkError {
    fn from(err: figment::Error) -> Self {
        SdkError::Config(Box::new(err))
    }
}
