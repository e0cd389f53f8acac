//! Error types for the Bytebase provider.
//!
//! Every variant maps onto one canonical status code (see [`ProviderError::kind`]).
//! Both wire protocols spoken by the Bytebase server (the JSON gateway and
//! Connect RPC) report failures with the gRPC code set, so the same
//! taxonomy is used end to end.

use thiserror::Error;
use tonic::Code;

/// Errors surfaced by handlers, the API client and the mapper.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A resource with the same name already exists.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// The request was rejected before or by the server as malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller lacks permission for the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The credentials are missing or were rejected.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The server could not be reached or is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The host cancelled the operation while a request was in flight.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A deadline elapsed before the server answered.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current server state.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not supported by the server or by this provider.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The provider has not been configured or the configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any other failure reported by the server.
    #[error("Unknown error: {0}")]
    Unknown(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP stack failed before a response was received.
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// Build the variant matching a canonical status code.
    pub fn from_code(code: Code, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            Code::NotFound => Self::NotFound(message),
            Code::AlreadyExists => Self::AlreadyExists(message),
            Code::InvalidArgument | Code::OutOfRange => Self::InvalidArgument(message),
            Code::PermissionDenied => Self::PermissionDenied(message),
            Code::Unauthenticated => Self::Unauthenticated(message),
            Code::Unavailable | Code::ResourceExhausted | Code::Aborted => {
                Self::Unavailable(message)
            },
            Code::Cancelled => Self::Cancelled(message),
            Code::DeadlineExceeded => Self::DeadlineExceeded(message),
            Code::FailedPrecondition => Self::FailedPrecondition(message),
            Code::Unimplemented => Self::Unimplemented(message),
            Code::Ok | Code::Unknown | Code::Internal | Code::DataLoss => Self::Unknown(message),
        }
    }

    /// The stable kind of this error.
    pub fn kind(&self) -> Code {
        match self {
            Self::NotFound(_) => Code::NotFound,
            Self::AlreadyExists(_) => Code::AlreadyExists,
            Self::InvalidArgument(_) => Code::InvalidArgument,
            Self::PermissionDenied(_) => Code::PermissionDenied,
            Self::Unauthenticated(_) => Code::Unauthenticated,
            Self::Unavailable(_) | Self::Http(_) => Code::Unavailable,
            Self::Cancelled(_) => Code::Cancelled,
            Self::DeadlineExceeded(_) => Code::DeadlineExceeded,
            Self::FailedPrecondition(_) | Self::Configuration(_) => Code::FailedPrecondition,
            Self::Unimplemented(_) => Code::Unimplemented,
            Self::Unknown(_) => Code::Unknown,
            Self::Serialization(_) => Code::InvalidArgument,
        }
    }

    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::AlreadyExists(msg)
            | Self::InvalidArgument(msg)
            | Self::PermissionDenied(msg)
            | Self::Unauthenticated(msg)
            | Self::Unavailable(msg)
            | Self::Cancelled(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::Unimplemented(msg)
            | Self::Configuration(msg)
            | Self::Unknown(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Http(_err) => "transport error (see Debug output)",
        }
    }

    /// True when the server reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Prefix the message with the canonical name of the resource involved.
    ///
    /// Wrapped errors keep their kind. Errors with a foreign source are
    /// flattened into the variant matching their kind.
    pub fn for_resource(self, name: &str) -> Self {
        if name.is_empty() {
            return self;
        }
        let kind = self.kind();
        let message = match &self {
            Self::Serialization(err) => err.to_string(),
            Self::Http(err) => err.to_string(),
            other => other.message().to_string(),
        };
        if message.starts_with(name) {
            return self;
        }
        match self {
            Self::Configuration(_) => Self::Configuration(format!("{}: {}", name, message)),
            _ => Self::from_code(kind, format!("{}: {}", name, message)),
        }
    }

    /// Shorthand for an invalid argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        let code = err.kind();
        tonic::Status::new(code, err.to_string())
    }
}
