use crate::transport::TransportError;
use std::sync::Arc;

/// Why a [`SessionManager`](crate::SessionManager) operation failed.
///
/// This is [`Clone`] because every caller waiting on the same refresh gets a
/// copy of its outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The server rejected the login. The message is the server's own and
    /// is meant to be shown to the user as-is.
    #[error("{}", message)]
    InvalidCredentials { message: String },
    /// We couldn't talk to the server.
    #[error("Authentication failed")]
    NetworkFailure(#[source] Arc<TransportError>),
    /// The refresh credential itself was rejected, so the user needs to log
    /// in again.
    #[error("The session has expired, please log in again")]
    RefreshRejected,
    /// The server said yes but we couldn't make sense of what it sent back.
    #[error("Authentication failed")]
    MalformedResponse(#[source] Arc<serde_json::Error>),
    #[error("The server couldn't process the request (HTTP {})", status)]
    ServerError { status: u16 },
    #[error("Not logged in")]
    NotAuthenticated,
    /// A logout or another login replaced the session while this request
    /// was in flight.
    #[error("The session changed while the request was in flight")]
    Superseded,
}

impl AuthError {
    pub(crate) fn invalid_credentials(message: impl Into<String>) -> Self {
        AuthError::InvalidCredentials {
            message: message.into(),
        }
    }

    /// Does this error end the session, meaning the user has to log in again?
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::RefreshRejected
                | AuthError::MalformedResponse(_)
                | AuthError::NotAuthenticated
                | AuthError::Superseded
        )
    }
}

impl From<TransportError> for AuthError {
    fn from(err: TransportError) -> AuthError {
        AuthError::NetworkFailure(Arc::new(err))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> AuthError {
        AuthError::MalformedResponse(Arc::new(err))
    }
}

/// Possible errors returned by the [`ApiClient`](crate::ApiClient).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A protected endpoint was requested while nobody is logged in. The
    /// request was never sent.
    #[error("You need to log in first")]
    NotLoggedIn,
    /// The server still rejected our credentials after a refresh.
    #[error("The server rejected our credentials")]
    Unauthorized,
    /// Getting a usable access credential failed.
    #[error("Unable to authenticate the request")]
    Auth(#[from] AuthError),
    #[error("Unable to send the request")]
    Transport(#[from] TransportError),
    #[error("The server responded with HTTP {}", status)]
    Status { status: u16, body: String },
    #[error("Unable to parse the response")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    /// Should the user be sent back to the login screen?
    pub fn requires_login(&self) -> bool {
        match self {
            ApiError::NotLoggedIn | ApiError::Unauthorized => true,
            ApiError::Auth(err) => err.requires_login(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_messages_are_shown_verbatim() {
        let err = AuthError::invalid_credentials("Invalid email or password.");

        assert_eq!(err.to_string(), "Invalid email or password.");
    }

    #[test]
    fn malformed_responses_look_like_network_failures_to_users() {
        let parse_error = serde_json::from_str::<u32>("nope").unwrap_err();
        let malformed = AuthError::from(parse_error);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let network = AuthError::from(TransportError::Io(io));

        assert_eq!(malformed.to_string(), network.to_string());
        assert!(malformed.requires_login());
        assert!(!network.requires_login());
    }

    #[test]
    fn auth_failures_bubble_up_through_the_gateway() {
        let err = ApiError::from(AuthError::RefreshRejected);

        assert!(err.requires_login());
        assert!(!ApiError::Status {
            status: 404,
            body: String::new()
        }
        .requires_login());
    }
}
