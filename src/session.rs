use serde_derive::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};

/// Where a [`SessionManager`](crate::SessionManager) is in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    /// Nobody is logged in.
    Anonymous,
    /// A login request is in flight.
    Authenticating,
    /// We hold credentials which haven't been rejected yet.
    Authenticated,
    /// The access credential was rejected and a refresh is in flight.
    Refreshing,
    /// The access credential was rejected and nobody has started a refresh
    /// yet.
    Expired,
}

impl Status {
    /// Is the current user's profile visible in this state?
    pub fn exposes_user(self) -> bool {
        matches!(self, Status::Authenticated | Status::Refreshing)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Anonymous => "anonymous",
            Status::Authenticating => "authenticating",
            Status::Authenticated => "authenticated",
            Status::Refreshing => "refreshing",
            Status::Expired => "expired",
        };

        f.write_str(name)
    }
}

/// A short-lived token attached to every authenticated request.
///
/// The contents are opaque. We never try to decode the token or predict when
/// it expires, the server tells us by rejecting a request.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessCredential(String);

/// A longer-lived token which can only be used to mint a new
/// [`AccessCredential`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshCredential(String);

macro_rules! opaque_token {
    ($name:ident) => {
        impl $name {
            pub fn new(token: impl Into<String>) -> Self { $name(token.into()) }

            pub fn as_str(&self) -> &str { &self.0 }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str { self.as_str() }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&"<redacted>").finish()
            }
        }
    };
}

opaque_token!(AccessCredential);
opaque_token!(RefreshCredential);

/// The person a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CurrentUser {
    /// The employee ID, used as the user's identifier.
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub scope: OrganizationalScope,
    /// Is the account enabled on the server?
    pub active: bool,
}

/// The part of the organization a user has access to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationalScope {
    pub hq: Option<String>,
    pub factory: Option<String>,
    pub department: Option<String>,
}
