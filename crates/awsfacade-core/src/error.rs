//! Error types shared by every facade.
//!
//! Provider errors arrive with a service-specific error code (`NoSuchBucket`,
//! `ResourceNotFoundException`, `AuthorizationError`, ...). They are folded
//! into a small [`ErrorKind`] taxonomy so callers can branch on the cause
//! without knowing which service produced it.

use std::fmt;

/// Coarse classification of a facade failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The bucket, object, table, log group or topic does not exist.
    NotFound,
    /// The resource already exists (or is in use under that name).
    AlreadyExists,
    /// The credential is not allowed to perform the operation.
    PermissionDenied,
    /// The provider rejected the request because of rate or capacity limits.
    Throttled,
    /// The request was malformed or violated a documented constraint.
    InvalidInput,
    /// Anything else, including transport and local I/O failures.
    Unknown,
}

impl ErrorKind {
    /// Classify a provider error code.
    ///
    /// Codes are compared verbatim; unknown or missing codes map to
    /// [`ErrorKind::Unknown`].
    #[must_use]
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some(
                "NoSuchBucket"
                | "NoSuchKey"
                | "NoSuchVersion"
                | "NotFound"
                | "NotFoundException"
                | "ResourceNotFoundException"
                | "TableNotFoundException",
            ) => Self::NotFound,
            Some(
                "BucketAlreadyExists"
                | "BucketAlreadyOwnedByYou"
                | "ResourceInUseException"
                | "ResourceAlreadyExistsException"
                | "TableAlreadyExistsException",
            ) => Self::AlreadyExists,
            Some(
                "AccessDenied"
                | "AccessDeniedException"
                | "AuthorizationError"
                | "UnrecognizedClientException"
                | "InvalidAccessKeyId"
                | "SignatureDoesNotMatch",
            ) => Self::PermissionDenied,
            Some(
                "SlowDown"
                | "Throttling"
                | "ThrottlingException"
                | "Throttled"
                | "ProvisionedThroughputExceededException"
                | "RequestLimitExceeded"
                | "LimitExceededException",
            ) => Self::Throttled,
            Some(
                "ValidationException"
                | "InvalidParameter"
                | "InvalidParameterException"
                | "InvalidArgument"
                | "InvalidBucketName"
                | "InvalidRequest"
                | "MalformedXML",
            ) => Self::InvalidInput,
            _ => Self::Unknown,
        }
    }

    /// Short lowercase label used in log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::Throttled => "throttled",
            Self::InvalidInput => "invalid_input",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every facade operation.
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    /// The target resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The target resource already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The credential lacks permission for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The provider throttled the request.
    #[error("throttled: {0}")]
    Throttled(String),

    /// The request was rejected before or by the provider as invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A provider-side state transition was not observed in time.
    #[error("gave up waiting for {resource}: {message}")]
    Wait {
        /// The resource being waited on.
        resource: String,
        /// Waiter failure description.
        message: String,
    },

    /// Local filesystem failure (upload source or download destination).
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other provider or transport failure.
    #[error("{message}")]
    Unknown {
        /// Provider error code, if one was reported.
        code: Option<String>,
        /// Human-readable description.
        message: String,
    },
}

impl FacadeError {
    /// Build an error from a provider error code and message.
    #[must_use]
    pub fn from_code(code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        match ErrorKind::from_code(code) {
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::AlreadyExists => Self::AlreadyExists(message),
            ErrorKind::PermissionDenied => Self::PermissionDenied(message),
            ErrorKind::Throttled => Self::Throttled(message),
            ErrorKind::InvalidInput => Self::InvalidInput(message),
            ErrorKind::Unknown => Self::Unknown {
                code: code.map(ToOwned::to_owned),
                message,
            },
        }
    }

    /// Shorthand for [`FacadeError::NotFound`].
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Shorthand for [`FacadeError::InvalidInput`].
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Shorthand for [`FacadeError::Wait`].
    #[must_use]
    pub fn wait(resource: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::Wait {
            resource: resource.into(),
            message: err.to_string(),
        }
    }

    /// The coarse kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Throttled(_) => ErrorKind::Throttled,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Wait { .. } | Self::Io(_) | Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Whether this error means the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Convenience result type for facade operations.
pub type FacadeResult<T> = Result<T, FacadeError>;
