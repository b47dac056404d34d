use super::{server_message, GENERIC_LOGIN_FAILURE, LOGIN_PATH};
use crate::{
    transport::{Response, Transport},
    AccessCredential, AuthError, CurrentUser, OrganizationalScope,
    RefreshCredential,
};
use serde_derive::{Deserialize, Serialize};

/// Everything the server hands back after a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub user: CurrentUser,
    pub access: AccessCredential,
    pub refresh: RefreshCredential,
    /// The server's greeting (e.g. "Login successful").
    pub message: Option<String>,
}

/// Exchange an email and password for a pair of credentials.
pub async fn login<T: Transport>(
    transport: &T,
    email: &str,
    password: &str,
) -> Result<LoginOutcome, AuthError> {
    let data = Data { email, password };
    let response = super::send(transport, LOGIN_PATH, None, &data).await?;

    interpret_response(&response)
}

fn interpret_response(response: &Response) -> Result<LoginOutcome, AuthError> {
    if response.is_server_error() {
        log::warn!("The login endpoint failed with HTTP {}", response.status);
        return Err(AuthError::ServerError {
            status: response.status,
        });
    }

    if !response.is_success() {
        let message = server_message(&response.body)
            .unwrap_or_else(|| String::from(GENERIC_LOGIN_FAILURE));
        log::warn!(
            "Login was rejected with HTTP {}: {}",
            response.status,
            message
        );

        return Err(AuthError::invalid_credentials(message));
    }

    let body: LoginResponse = response.json().map_err(|e| {
        log::error!("Unable to parse the login response: {}", e);
        e
    })?;

    log::info!("Logged in as {}", body.user.email);

    Ok(LoginOutcome {
        user: body.user.into(),
        access: body.access_token,
        refresh: body.refresh_token,
        message: body.message,
    })
}

#[derive(Debug, Copy, Clone, Serialize)]
struct Data<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct LoginResponse {
    message: Option<String>,
    access_token: AccessCredential,
    refresh_token: RefreshCredential,
    user: UserData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct UserData {
    email: String,
    first_name: String,
    last_name: String,
    #[serde(rename = "employeeid")]
    employee_id: String,
    role: String,
    hq: Option<String>,
    factory: Option<String>,
    department: Option<String>,
    #[serde(rename = "status", default = "active_by_default")]
    active: bool,
}

fn active_by_default() -> bool { true }

impl From<UserData> for CurrentUser {
    fn from(user: UserData) -> CurrentUser {
        let display_name = format!("{} {}", user.first_name, user.last_name)
            .trim()
            .to_string();

        CurrentUser {
            id: user.employee_id,
            email: user.email,
            display_name,
            role: user.role,
            scope: OrganizationalScope {
                hq: user.hq,
                factory: user.factory,
                department: user.department,
            },
            active: user.active,
        }
    }
}
