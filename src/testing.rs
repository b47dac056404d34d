//! A scripted [`Transport`] so the session logic can be tested without a
//! server.

use crate::{
    endpoints::{LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH},
    transport::{Request, Response, Transport, TransportError},
    AccessCredential,
};
use std::{
    future::Future,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

type Handler =
    dyn Fn(&Request) -> Result<Response, TransportError> + Send + Sync;

/// A fake server which answers every request with a closure.
#[derive(Clone)]
pub(crate) struct FakeTransport {
    handler: Arc<Handler>,
    delay: Duration,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl FakeTransport {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Result<Response, TransportError>
            + Send
            + Sync
            + 'static,
    {
        FakeTransport {
            handler: Arc::new(handler),
            delay: Duration::from_millis(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every response take a while, so concurrent callers overlap.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// How many requests were sent to `path`?
    pub(crate) fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

impl Transport for FakeTransport {
    fn execute(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send {
        let handler = Arc::clone(&self.handler);
        let requests = Arc::clone(&self.requests);
        let delay = self.delay;

        async move {
            requests.lock().unwrap().push(request.clone());

            if delay > Duration::from_millis(0) {
                tokio::time::sleep(delay).await;
            }

            handler(&request)
        }
    }
}

pub(crate) const EMAIL: &str = "trainer@dojo.example.com";
pub(crate) const PASSWORD: &str = "hunter22";

pub(crate) fn json(status: u16, value: serde_json::Value) -> Response {
    Response::new(status, value.to_string())
}

pub(crate) fn connection_refused() -> TransportError {
    TransportError::Io(io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

pub(crate) fn bearer_of(request: &Request) -> Option<&str> {
    request.bearer.as_ref().map(AccessCredential::as_str)
}

/// The happy-path answers for the three authentication endpoints.
///
/// Logging in with [`EMAIL`] and [`PASSWORD`] hands out `access-1` and
/// `refresh-1`, refreshing `refresh-1` hands out `access-2`, and any other
/// refresh credential is rejected.
pub(crate) fn auth_endpoints(
    request: &Request,
) -> Option<Result<Response, TransportError>> {
    let body = request.body.clone().unwrap_or_default();

    let response = match request.path.as_str() {
        LOGIN_PATH
            if body["email"] == EMAIL && body["password"] == PASSWORD =>
        {
            json(
                200,
                serde_json::json!({
                    "message": "Login successful",
                    "access_token": "access-1",
                    "refresh_token": "refresh-1",
                    "user": {
                        "email": EMAIL,
                        "first_name": "Asha",
                        "last_name": "Patil",
                        "employeeid": "EMP0042",
                        "role": "admin",
                        "hq": "Pune",
                        "factory": "Chakan",
                        "department": "Assembly",
                        "status": true,
                    },
                }),
            )
        },
        LOGIN_PATH => json(
            400,
            serde_json::json!({
                "error": true,
                "message": "Invalid email or password.",
            }),
        ),
        REFRESH_PATH if body["refresh"] == "refresh-1" => {
            json(200, serde_json::json!({ "access": "access-2" }))
        },
        REFRESH_PATH => json(
            401,
            serde_json::json!({
                "detail": "Token is invalid or expired",
                "code": "token_not_valid",
            }),
        ),
        LOGOUT_PATH => {
            json(200, serde_json::json!({ "message": "Logout successful" }))
        },
        _ => return None,
    };

    Some(Ok(response))
}
