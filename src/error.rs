use thiserror::Error;

/// Normalized failure of a single REST call.
///
/// Statuses that callers routinely branch on get their own variant, so a 403
/// from click tracking is matched on rather than dug out of a status code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    PermissionDenied { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("{message}")]
    Transport { message: String },
}

impl ApiError {
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => ApiError::Unauthorized { message },
            403 => ApiError::PermissionDenied { message },
            404 => ApiError::NotFound { message },
            _ => ApiError::Http { status, message },
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
        }
    }

    /// HTTP status, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::PermissionDenied { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::PermissionDenied { message }
            | ApiError::NotFound { message }
            | ApiError::Http { message, .. }
            | ApiError::Transport { message } => message,
        }
    }

    /// 401 and 403 both mean "this caller may not do that".
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::PermissionDenied { .. }
        )
    }
}

/// Failure of a call that validates its input before going to the network.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<validator::ValidationErrors> for RequestError {
    fn from(errors: validator::ValidationErrors) -> Self {
        RequestError::Validation(errors.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid or expired session: {0}")]
    MalformedToken(String),

    #[error("Token storage failed: {0}")]
    Storage(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("{0}")]
    Validation(String),

    #[error("Another request for appointment {0} is still in progress")]
    InFlight(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid channel URL: {0}")]
    InvalidUrl(String),

    #[error("Websocket transport failed: {0}")]
    Transport(String),

    #[error("STOMP protocol error: {0}")]
    Protocol(String),
}

/// Failure at the application context: session gating plus whatever the
/// delegated call failed with.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Please sign in first")]
    NotSignedIn,

    #[error("{role} accounts cannot {action}")]
    Forbidden { role: String, action: String },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),
}

impl From<ApiError> for PortalError {
    fn from(err: ApiError) -> Self {
        PortalError::Request(RequestError::Api(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ApiError::from_status(403, "nope".to_string());
        assert_eq!(err, ApiError::PermissionDenied { message: "nope".to_string() });
        assert_eq!(err.status(), Some(403));
        assert!(err.is_auth_rejection());

        let err = ApiError::from_status(500, "boom".to_string());
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.message(), "boom");
        assert!(!err.is_auth_rejection());
    }

    #[test]
    fn test_transport_has_no_status() {
        let err = ApiError::transport("connection refused");
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "connection refused");
    }

    #[test]
    fn test_portal_error_wraps_api_message() {
        let err: PortalError = ApiError::from_status(404, "Property not found".to_string()).into();
        assert_eq!(err.to_string(), "Property not found");

        let err = PortalError::Forbidden {
            role: "MEMBER".to_string(),
            action: "review appointments".to_string(),
        };
        assert_eq!(err.to_string(), "MEMBER accounts cannot review appointments");
    }
}
