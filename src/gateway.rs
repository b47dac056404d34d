//! Making authenticated requests to the rest of the Dojo API.

use crate::{
    store::CredentialStore,
    transport::{Request, Response, Transport, TransportError},
    AccessCredential, ApiError, AuthError, SessionManager,
};
use serde::{de::DeserializeOwned, Serialize};

/// Does an endpoint need a logged in user?
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    /// Sent with a credential when we have one, and without otherwise.
    Public,
    /// Never sent without a credential.
    Protected,
}

/// Sends requests on behalf of a [`SessionManager`], refreshing the access
/// credential when the server rejects it.
#[derive(Debug)]
pub struct ApiClient<T, S> {
    session: SessionManager<T, S>,
}

impl<T, S> ApiClient<T, S>
where
    T: Transport,
    S: CredentialStore,
{
    pub fn new(session: SessionManager<T, S>) -> Self { ApiClient { session } }

    pub fn session(&self) -> &SessionManager<T, S> { &self.session }

    /// Send a request, attaching the current access credential.
    ///
    /// If the server answers a request that carried a credential with
    /// `401 Unauthorized`, the credential is refreshed and the request is
    /// retried exactly once. A second rejection is returned as
    /// [`ApiError::Unauthorized`].
    pub async fn send(
        &self,
        access: Access,
        request: Request,
    ) -> Result<Response, ApiError> {
        let credential = match self.session.ensure_fresh_access().await {
            Ok(credential) => Some(credential),
            Err(AuthError::NotAuthenticated) if access == Access::Public => None,
            Err(AuthError::NotAuthenticated) => {
                log::debug!("Not sending {} without a login", request.path);
                return Err(ApiError::NotLoggedIn);
            },
            Err(e) => return Err(e.into()),
        };

        let response = self.dispatch(&request, credential.clone()).await?;

        let rejected = match credential {
            Some(credential) if response.is_unauthorized() => credential,
            _ => return check_status(response),
        };

        log::debug!("{} rejected our access credential", request.path);
        self.session.mark_expired(&rejected).await;
        let fresh = self.session.ensure_fresh_access().await?;

        let retried = self.dispatch(&request, Some(fresh)).await?;

        if retried.is_unauthorized() {
            log::warn!(
                "{} rejected a freshly refreshed access credential",
                request.path
            );
            return Err(ApiError::Unauthorized);
        }

        check_status(retried)
    }

    async fn dispatch(
        &self,
        request: &Request,
        bearer: Option<AccessCredential>,
    ) -> Result<Response, TransportError> {
        let request = Request {
            bearer,
            ..request.clone()
        };

        self.session.transport().execute(request).await
    }

    pub async fn get<R>(&self, path: &str, access: Access) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        let response = self.send(access, Request::get(path)).await?;
        response.json().map_err(ApiError::from)
    }

    pub async fn post<B, R>(
        &self,
        path: &str,
        access: Access,
        body: &B,
    ) -> Result<R, ApiError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let request = Request::post(path)
            .json(body)
            .map_err(TransportError::from)?;
        let response = self.send(access, request).await?;
        response.json().map_err(ApiError::from)
    }

    pub async fn put<B, R>(
        &self,
        path: &str,
        access: Access,
        body: &B,
    ) -> Result<R, ApiError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let request = Request::put(path)
            .json(body)
            .map_err(TransportError::from)?;
        let response = self.send(access, request).await?;
        response.json().map_err(ApiError::from)
    }

    pub async fn delete(
        &self,
        path: &str,
        access: Access,
    ) -> Result<(), ApiError> {
        self.send(access, Request::delete(path)).await?;
        Ok(())
    }
}

impl<T, S> Clone for ApiClient<T, S> {
    fn clone(&self) -> Self {
        ApiClient {
            session: self.session.clone(),
        }
    }
}

fn check_status(response: Response) -> Result<Response, ApiError> {
    if response.is_success() {
        Ok(response)
    } else if response.is_unauthorized() {
        Err(ApiError::Unauthorized)
    } else {
        Err(ApiError::Status {
            status: response.status,
            body: response.text(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        endpoints::REFRESH_PATH,
        store::{MemoryStore, StoredCredentials},
        testing::{
            auth_endpoints, bearer_of, json, FakeTransport, EMAIL, PASSWORD,
        },
        Config, RefreshCredential, Status,
    };
    use futures_util::future::join_all;
    use serde_json::Value;
    use std::time::Duration;

    const OPERATORS: &str = "operators/";

    /// Only `access-2` (the credential minted by a refresh) is accepted.
    fn backend() -> FakeTransport {
        FakeTransport::new(|req| {
            if let Some(reply) = auth_endpoints(req) {
                return reply;
            }

            match (req.path.as_str(), bearer_of(req)) {
                (OPERATORS, Some("access-2")) => {
                    Ok(json(200, serde_json::json!([{ "name": "Ravi" }])))
                },
                (OPERATORS, _) => Ok(json(401, serde_json::json!({}))),
                ("skills/", _) => Ok(json(200, serde_json::json!(["Welding"]))),
                _ => Ok(json(404, serde_json::json!({ "detail": "Not found." }))),
            }
        })
    }

    fn client(
        transport: FakeTransport,
        store: MemoryStore,
    ) -> ApiClient<FakeTransport, MemoryStore> {
        ApiClient::new(SessionManager::init(Config::default(), transport, store))
    }

    #[tokio::test]
    async fn retry_once_after_refreshing() {
        let transport = backend();
        let api = client(transport.clone(), MemoryStore::new());
        api.session().login(EMAIL, PASSWORD).await.unwrap();

        let got: Value = api.get(OPERATORS, Access::Protected).await.unwrap();

        assert_eq!(got, serde_json::json!([{ "name": "Ravi" }]));
        assert_eq!(transport.hits(OPERATORS), 2);
        assert_eq!(transport.hits(REFRESH_PATH), 1);
        assert_eq!(api.session().status().await, Status::Authenticated);
    }

    #[tokio::test]
    async fn give_up_when_the_retry_is_also_rejected() {
        let transport = FakeTransport::new(|req| {
            auth_endpoints(req)
                .unwrap_or_else(|| Ok(json(401, serde_json::json!({}))))
        });
        let api = client(transport.clone(), MemoryStore::new());
        api.session().login(EMAIL, PASSWORD).await.unwrap();

        let got = api.get::<Value>(OPERATORS, Access::Protected).await;

        assert!(matches!(got, Err(ApiError::Unauthorized)));
        assert_eq!(transport.hits(OPERATORS), 2);
        assert_eq!(transport.hits(REFRESH_PATH), 1);
    }

    #[tokio::test]
    async fn stale_rehydrated_credentials_end_in_an_anonymous_session() {
        let transport = backend();
        let store = MemoryStore::with_credentials(StoredCredentials {
            access: AccessCredential::new("stale"),
            refresh: RefreshCredential::new("stale-r"),
        });
        let api = client(transport.clone(), store.clone());
        assert_eq!(api.session().status().await, Status::Authenticated);

        let got = api.get::<Value>(OPERATORS, Access::Protected).await;

        assert!(matches!(got, Err(ApiError::Auth(AuthError::RefreshRejected))));
        assert!(got.unwrap_err().requires_login());
        let refresh = transport
            .requests()
            .into_iter()
            .find(|r| r.path == REFRESH_PATH)
            .unwrap();
        assert_eq!(
            refresh.body,
            Some(serde_json::json!({ "refresh": "stale-r" }))
        );
        assert_eq!(api.session().status().await, Status::Anonymous);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn protected_requests_are_not_sent_while_anonymous() {
        let transport = backend();
        let api = client(transport.clone(), MemoryStore::new());

        let got = api.get::<Value>(OPERATORS, Access::Protected).await;

        assert!(matches!(got, Err(ApiError::NotLoggedIn)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn public_requests_go_out_without_a_credential() {
        let transport = backend();
        let api = client(transport.clone(), MemoryStore::new());

        let got: Vec<String> = api.get("skills/", Access::Public).await.unwrap();

        assert_eq!(got, vec![String::from("Welding")]);
        assert_eq!(transport.requests()[0].bearer, None);
    }

    #[tokio::test]
    async fn unauthenticated_rejections_are_not_retried() {
        let transport = backend();
        let api = client(transport.clone(), MemoryStore::new());

        let got = api.get::<Value>(OPERATORS, Access::Public).await;

        assert!(matches!(got, Err(ApiError::Unauthorized)));
        assert_eq!(transport.hits(OPERATORS), 1);
        assert_eq!(transport.hits(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn other_errors_are_passed_through() {
        let transport = backend();
        let api = client(transport.clone(), MemoryStore::new());
        api.session().login(EMAIL, PASSWORD).await.unwrap();

        let got = api.delete("machines/7/", Access::Protected).await;

        match got {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Not found."));
            },
            other => panic!("Unexpected result: {:?}", other),
        }
        assert_eq!(transport.hits(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn simultaneous_rejections_trigger_one_refresh() {
        let transport = backend().with_delay(Duration::from_millis(10));
        let api = client(transport.clone(), MemoryStore::new());
        api.session().login(EMAIL, PASSWORD).await.unwrap();

        let results = join_all(
            (0..4).map(|_| api.get::<Value>(OPERATORS, Access::Protected)),
        )
        .await;

        assert_eq!(transport.hits(REFRESH_PATH), 1);
        assert_eq!(transport.hits(OPERATORS), 8);
        assert!(results.iter().all(Result::is_ok));
    }
}
