//! Getting requests to the server and responses back.

use crate::{AccessCredential, Config};
use reqwest::{Client, Error as ReqwestError};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
};

/// Something which can send a [`Request`] to the Dojo API.
///
/// [`HttpTransport`] is what you'll want to use in practice. The trait
/// exists so the session logic can be driven by anything that speaks the
/// same request/response shapes.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

/// The HTTP verbs used by the Dojo API.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// An outgoing request, relative to [`Config::base_url`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    /// Sent as `Authorization: Bearer ...` when present.
    pub bearer: Option<AccessCredential>,
    pub body: Option<serde_json::Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Request {
            method,
            path: path.into(),
            bearer: None,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self { Request::new(Method::Get, path) }

    pub fn post(path: impl Into<String>) -> Self {
        Request::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self { Request::new(Method::Put, path) }

    pub fn delete(path: impl Into<String>) -> Self {
        Request::new(Method::Delete, path)
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize>(
        mut self,
        body: &B,
    ) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn bearer(mut self, credential: AccessCredential) -> Self {
        self.bearer = Some(credential);
        self
    }
}

/// A response with its body already read into memory.
#[derive(Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Response {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

    pub fn is_unauthorized(&self) -> bool { self.status == 401 }

    pub fn is_server_error(&self) -> bool { self.status >= 500 }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String { String::from_utf8_lossy(&self.body).into() }
}

impl Debug for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("body", &self.text())
            .finish()
    }
}

/// Errors that stop a request from reaching the server (or its response from
/// coming back).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client encountered an error.
    #[error("Unable to send the request")]
    HttpClient(#[from] ReqwestError),
    #[error("\"{}\" isn't a valid endpoint path", path)]
    BadPath {
        path: String,
        #[source]
        inner: url::ParseError,
    },
    #[error("Unable to encode the request body")]
    Encode(#[from] serde_json::Error),
    #[error("The request timed out")]
    TimedOut,
    #[error("An I/O error occurred")]
    Io(#[from] std::io::Error),
}

/// A [`Transport`] which talks to a real server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: Config,
}

impl HttpTransport {
    /// Create a transport using a fresh HTTP client.
    ///
    /// The client keeps cookies around so the server-side session created
    /// during login is sent back with later requests.
    pub fn new(config: Config) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .build()?;

        Ok(HttpTransport::with_client(client, config))
    }

    pub fn with_client(client: Client, config: Config) -> Self {
        HttpTransport { client, config }
    }

    pub fn config(&self) -> &Config { &self.config }

    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let url = self.config.endpoint(&request.path).map_err(|inner| {
            TransportError::BadPath {
                path: request.path.clone(),
                inner,
            }
        })?;

        // bodies may hold passwords or tokens, so only the URL gets logged
        log::debug!("Sending a {:?} request to {}", request.method, url);

        let mut builder = self.client.request(request.method.into(), url);

        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        log::trace!("Headers: {:#?}", response.headers());

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        log::trace!("Received HTTP {} ({} bytes)", status, body.len());

        Ok(Response::new(status, body.to_vec()))
    }
}

impl Transport for HttpTransport {
    fn execute(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send {
        self.send(request)
    }
}
