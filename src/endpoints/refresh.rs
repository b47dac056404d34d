use super::REFRESH_PATH;
use crate::{
    transport::{Response, Transport},
    AccessCredential, AuthError, RefreshCredential,
};
use serde_derive::{Deserialize, Serialize};

/// The credentials minted by a successful refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub access: AccessCredential,
    /// Only present when the server rotates refresh credentials.
    pub refresh: Option<RefreshCredential>,
}

/// Trade a refresh credential for a new access credential.
pub async fn refresh<T: Transport>(
    transport: &T,
    refresh: &RefreshCredential,
) -> Result<RefreshOutcome, AuthError> {
    let data = Data {
        refresh: refresh.as_str(),
    };
    let response = super::send(transport, REFRESH_PATH, None, &data).await?;

    interpret_response(&response)
}

fn interpret_response(
    response: &Response,
) -> Result<RefreshOutcome, AuthError> {
    if response.is_server_error() {
        log::warn!("The refresh endpoint failed with HTTP {}", response.status);
        return Err(AuthError::ServerError {
            status: response.status,
        });
    }

    if !response.is_success() {
        log::warn!(
            "The refresh credential was rejected with HTTP {}",
            response.status
        );
        return Err(AuthError::RefreshRejected);
    }

    let body: RefreshResponse = response.json().map_err(|e| {
        log::error!("Unable to parse the refresh response: {}", e);
        e
    })?;

    log::debug!(
        "Received a new access credential (refresh rotated: {})",
        body.refresh.is_some()
    );

    Ok(RefreshOutcome {
        access: body.access,
        refresh: body.refresh,
    })
}

#[derive(Debug, Copy, Clone, Serialize)]
struct Data<'a> {
    refresh: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    access: AccessCredential,
    #[serde(alias = "refresh_token", default)]
    refresh: Option<RefreshCredential>,
}
