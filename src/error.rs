use thiserror::Error;

use crate::payments::validation::ValidationErrors;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// A request or notification broke one or more declared field rules.
    /// Raised before any network I/O takes place.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Transport error: {message}")]
    Transport { message: String, is_timeout: bool },

    /// The gateway answered, but the body lacks a field its own status requires.
    #[error("Malformed gateway response: {field} {message}")]
    MalformedResponse { field: String, message: String },

    #[error("Could not decode field: {field}")]
    Decode { field: String },

    #[error("Invalid notification: {reason}")]
    InvalidNotification { reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            is_timeout: false,
        }
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::Transport {
            message: format!("request timed out after {} seconds", seconds),
            is_timeout: true,
        }
    }

    pub fn malformed_response(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::malformed_response(field, "is required by the response status but was absent")
    }

    pub fn decode(field: impl Into<String>) -> Self {
        Self::Decode {
            field: field.into(),
        }
    }

    pub fn invalid_notification(reason: impl Into<String>) -> Self {
        Self::InvalidNotification {
            reason: reason.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Only transport failures are worth retrying, and only by the caller:
    /// a blind resend of a registration can duplicate a payment.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for GatewayError {
    fn from(errors: ValidationErrors) -> Self {
        GatewayError::Validation(errors)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Transport {
                message: format!("Request timed out: {}", err),
                is_timeout: true,
            }
        } else {
            GatewayError::transport(format!("Request error: {}", err))
        }
    }
}

impl From<serde_urlencoded::de::Error> for GatewayError {
    fn from(err: serde_urlencoded::de::Error) -> Self {
        GatewayError::decode(format!("body ({})", err))
    }
}
