//! The Dojo API's authentication endpoints.

mod login;
mod logout;
mod refresh;

pub use login::{login, LoginOutcome};
pub use logout::logout;
pub use refresh::{refresh, RefreshOutcome};

use crate::{
    transport::{Request, Response, Transport, TransportError},
    AccessCredential,
};
use serde::Serialize;
use serde_derive::Deserialize;
use std::{collections::BTreeMap, fmt::Debug};

pub const LOGIN_PATH: &str = "login/";
pub const LOGOUT_PATH: &str = "logout/";
pub const REFRESH_PATH: &str = "api/token/refresh/";

/// The message shown when the server rejects a login without saying why.
pub const GENERIC_LOGIN_FAILURE: &str = "Authentication failed";

async fn send<T, D>(
    transport: &T,
    path: &str,
    bearer: Option<&AccessCredential>,
    data: &D,
) -> Result<Response, TransportError>
where
    T: Transport,
    D: Debug + Serialize,
{
    log::debug!("Sending a request to {}", path);

    let mut request = Request::post(path).json(data)?;
    request.bearer = bearer.cloned();

    let response = transport.execute(request).await?;
    log::trace!("Received HTTP {} from {}", response.status, path);

    Ok(response)
}

/// The different ways the backend reports an error.
///
/// Views return `{"error": true, "message": "..."}`, serializer validation
/// errors come back as `{"error": ["..."]}` or `{"field": ["..."]}`, and some
/// proxies wrap them as `{"errors": {"field": "..."}}`.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
struct ErrorPayload {
    message: Option<String>,
    error: Option<serde_json::Value>,
    errors: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(flatten)]
    fields: BTreeMap<String, serde_json::Value>,
}

/// Dig the most helpful human-readable message out of an error body.
pub(crate) fn server_message(body: &[u8]) -> Option<String> {
    let payload: ErrorPayload = serde_json::from_slice(body).ok()?;

    payload
        .message
        .filter(|msg| !msg.trim().is_empty())
        .or_else(|| payload.error.as_ref().and_then(first_string))
        .or_else(|| {
            payload
                .errors
                .as_ref()
                .and_then(|errors| errors.values().find_map(first_string))
        })
        .or_else(|| payload.fields.values().find_map(first_string))
}

fn first_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => {
            Some(s.clone())
        },
        serde_json::Value::Array(items) => items.iter().find_map(first_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefer_the_message_field() {
        let body = br#"{"error": true, "message": "Invalid email or password."}"#;

        let got = server_message(body);

        assert_eq!(got.as_deref(), Some("Invalid email or password."));
    }

    #[test]
    fn fall_back_to_a_list_of_errors() {
        let body = br#"{"error": ["This account is inactive."]}"#;

        let got = server_message(body);

        assert_eq!(got.as_deref(), Some("This account is inactive."));
    }

    #[test]
    fn fall_back_to_field_level_errors() {
        let body = br#"{"errors": {"email": ["Enter a valid email address."]}}"#;

        let got = server_message(body);

        assert_eq!(got.as_deref(), Some("Enter a valid email address."));
    }

    #[test]
    fn fall_back_to_top_level_field_errors() {
        let body = br#"{"password": ["This field may not be blank."]}"#;

        let got = server_message(body);

        assert_eq!(got.as_deref(), Some("This field may not be blank."));
    }

    #[test]
    fn html_error_pages_have_no_message() {
        assert_eq!(server_message(b"<h1>Bad Gateway</h1>"), None);
        assert_eq!(server_message(br#"{"error": true}"#), None);
    }
}
