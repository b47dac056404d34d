use super::{server_message, LOGOUT_PATH};
use crate::{
    transport::Transport, AccessCredential, AuthError, RefreshCredential,
};
use serde_derive::Serialize;

/// Tell the server to invalidate a user's session, logging them out.
pub async fn logout<T: Transport>(
    transport: &T,
    access: Option<&AccessCredential>,
    refresh: &RefreshCredential,
) -> Result<(), AuthError> {
    let data = LogoutData {
        refresh_token: refresh.as_str(),
    };

    let response = super::send(transport, LOGOUT_PATH, access, &data).await?;

    if response.is_server_error() {
        return Err(AuthError::ServerError {
            status: response.status,
        });
    }
    if !response.is_success() {
        let message = server_message(&response.body)
            .unwrap_or_else(|| format!("HTTP {}", response.status));
        return Err(AuthError::invalid_credentials(message));
    }

    Ok(())
}

#[derive(Debug, Copy, Clone, Serialize)]
struct LogoutData<'a> {
    refresh_token: &'a str,
}
