use thiserror::Error;

/// Failures of a call to the resource service.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The client identity is anonymous; no request was sent.
    #[error("Not authenticated")]
    Unauthenticated,
    /// The caller dropped interest in the response.
    #[error("Request cancelled")]
    Cancelled,
    #[error("Config error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("Response error: {0}")]
    Parse(String),
    #[error("Request error: {0}")]
    Serialization(String),
}

/// How a failed call must be treated by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeClass {
    /// Not logged in (yet, or anymore). Redirect to login, do not report.
    ExpectedAuthorization,
    /// Silently discarded.
    Cancelled,
    /// Reported, never redirected.
    ApplicationFault,
}

impl ApiError {
    #[must_use]
    pub fn class(&self) -> OutcomeClass {
        match self {
            Self::Unauthenticated | Self::Http { status: 401, .. } => {
                OutcomeClass::ExpectedAuthorization
            }
            Self::Cancelled => OutcomeClass::Cancelled,
            _ => OutcomeClass::ApplicationFault,
        }
    }
}
