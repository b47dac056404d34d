//! Authenticated session management for the Dojo operator-training API.
//!
//! A [`SessionManager`] owns the login session: it logs in and out, keeps the
//! credentials in a [`CredentialStore`] between runs, and refreshes the access
//! credential when the server rejects it. Most code will talk to the server
//! through an [`ApiClient`], which attaches the credential to every request
//! and deals with the refresh-and-retry dance.
//!
//! ```rust,no_run
//! use dojo_session::{
//!     Access, ApiClient, Config, FileStore, HttpTransport, SessionManager,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new("https://dojo.example.com/")?;
//! let transport = HttpTransport::new(config.clone())?;
//! let store = FileStore::new("session.json");
//! let api = ApiClient::new(SessionManager::init(config, transport, store));
//!
//! api.session().login("trainer@example.com", "hunter22").await?;
//! let _operators: serde_json::Value =
//!     api.get("operators/", Access::Protected).await?;
//! api.session().logout().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

mod config;
pub mod endpoints;
mod error;
mod gateway;
mod manager;
mod session;
pub mod store;
#[cfg(test)]
mod testing;
pub mod transport;

pub use config::{Config, DEFAULT_BASE_URL, DEFAULT_LOGOUT_TIMEOUT};
pub use error::{ApiError, AuthError};
pub use gateway::{Access, ApiClient};
pub use manager::{SessionManager, MISSING_CREDENTIALS};
pub use session::{
    AccessCredential, CurrentUser, OrganizationalScope, RefreshCredential,
    Status,
};
pub use store::{CredentialStore, FileStore, MemoryStore, StoredCredentials};
pub use transport::{HttpTransport, Request, Response, Transport};

/// The default user agent to use when communicating with the Dojo server.
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));
