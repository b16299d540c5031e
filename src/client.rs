//! HTTP wrapper around the property API. Attaches bearer credentials,
//! normalizes every failure into [`Error`], and recovers from a 401 with
//! exactly one refresh-and-retry cycle per request attempt.
//!
//! The wrapper never navigates. Forced logout is signalled through
//! [`ClientEvent::SessionInvalidated`] and user-visible failures through
//! [`ClientEvent::Notice`]; observers decide what to do with them.

use crate::config::ApiConfig;
use crate::error::Error;
use crate::token::TokenStore;
use crate::types::AuthResponse;
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{Instrument, debug, info_span};

const USER_AGENT: &str = concat!("portero/", env!("CARGO_PKG_VERSION"));
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Out-of-band signals emitted by the wrapper. Notices never replace error
/// propagation; the caller still sees the failure in its own control flow.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The refresh path is irrecoverable and both tokens were cleared. The
    /// UI layer should send the user to the login entry point.
    SessionInvalidated,
    /// A transient, user-visible failure notification.
    Notice { kind: NoticeKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// 4xx: recoverable by correcting input.
    Client,
    /// 5xx: generic server failure.
    Server,
}

/// Cheap to clone; clones share the HTTP connection pool, token store,
/// refresh gate and event channel.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    config: ApiConfig,
    tokens: TokenStore,
    /// Serializes refresh attempts so concurrent 401s coalesce behind a
    /// single in-flight refresh call.
    refresh_gate: Mutex<()>,
    events: broadcast::Sender<ClientEvent>,
}

impl ApiClient {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: ApiConfig, tokens: TokenStore) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|err| Error::Config(format!("failed to build HTTP client: {err}")))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                config,
                tokens,
                refresh_gate: Mutex::new(()),
                events,
            }),
        })
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Subscribes to out-of-band client events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let value = self.request_value(Method::GET, path, None).await?;
        from_value(value)
    }

    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let body = to_value(body)?;
        let value = self.request_value(Method::POST, path, Some(body)).await?;
        from_value(value)
    }

    /// POST where the response body, if any, is discarded.
    ///
    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), Error> {
        let body = to_value(body)?;
        self.request_value(Method::POST, path, Some(body)).await?;
        Ok(())
    }

    /// POST with an empty body and discarded response.
    ///
    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn post_empty(&self, path: &str) -> Result<(), Error> {
        self.request_value(Method::POST, path, None).await?;
        Ok(())
    }

    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let body = to_value(body)?;
        let value = self.request_value(Method::PUT, path, Some(body)).await?;
        from_value(value)
    }

    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let body = to_value(body)?;
        let value = self.request_value(Method::PATCH, path, Some(body)).await?;
        from_value(value)
    }

    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let value = self.request_value(Method::DELETE, path, None).await?;
        from_value(value)
    }

    /// Exchanges the stored refresh token for a new pair and stores it.
    /// On any failure both tokens are cleared and `SessionInvalidated` is
    /// emitted before the error propagates.
    ///
    /// # Errors
    /// Returns an unauthorized error when no refresh token is stored, or the
    /// normalized error from the refresh call.
    pub async fn refresh(&self) -> Result<AuthResponse, Error> {
        let _gate = self.inner.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Sends a request, attaching the access token when one is stored and
    /// not expired. A 401 triggers a single refresh-and-retry; the retry
    /// decision is scoped to this attempt, never shared across requests.
    async fn request_value(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, Error> {
        let bearer = self.inner.tokens.valid_access();
        let attempt = self
            .send_once(method.clone(), path, body.as_ref(), bearer.clone())
            .await;

        match attempt {
            Err(ref err) if err.is_unauthorized() => {
                let replay_token = self.refresh_coalesced(bearer).await?;
                debug!(path, "replaying request with refreshed token");
                self.send_once(method, path, body.as_ref(), Some(replay_token))
                    .await
            }
            other => other,
        }
    }

    /// Refreshes behind the shared gate. A caller that waited on the gate
    /// while another request already refreshed reuses the newer token
    /// instead of issuing a redundant refresh call.
    async fn refresh_coalesced(&self, stale: Option<String>) -> Result<String, Error> {
        let _gate = self.inner.refresh_gate.lock().await;

        if let Some(current) = self.inner.tokens.valid_access() {
            if stale.as_deref() != Some(current.as_str()) {
                debug!("reusing token refreshed by a concurrent request");
                return Ok(current);
            }
        }

        self.refresh_locked().await.map(|auth| auth.token)
    }

    /// Must only be called while holding `refresh_gate`.
    async fn refresh_locked(&self) -> Result<AuthResponse, Error> {
        let Some(refresh) = self.inner.tokens.refresh_token() else {
            self.invalidate_session();
            return Err(Error::unauthorized("no refresh token available"));
        };

        let body = json!({ "refreshToken": refresh.expose_secret() });
        let result = self
            .send_once(Method::POST, "/auth/refresh", Some(&body), None)
            .await
            .and_then(from_value::<AuthResponse>);

        match result {
            Ok(auth) => {
                self.inner.tokens.set_pair(&auth.token, &auth.refresh_token);
                Ok(auth)
            }
            Err(err) => {
                debug!("token refresh failed: {err}");
                self.invalidate_session();
                Err(err)
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<String>,
    ) -> Result<Value, Error> {
        let url = self.inner.config.endpoint(path);
        let span = info_span!(
            "api.request",
            http.method = %method,
            url = %url
        );

        let mut builder = self.inner.http.request(method, &url);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .instrument(span)
            .await
            .map_err(|err| Error::from_reqwest(&err))?;

        self.read_response(response).await
    }

    async fn read_response(&self, response: reqwest::Response) -> Result<Value, Error> {
        let status = response.status();

        if status.is_success() {
            if status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            let text = response
                .text()
                .await
                .map_err(|err| Error::from_reqwest(&err))?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text)
                .map_err(|err| Error::Decode(err.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let err = Error::from_status(status.as_u16(), &body);
        // 401s are handled by the refresh path, not shown to the user.
        if status != StatusCode::UNAUTHORIZED {
            self.notify(&err);
        }
        Err(err)
    }

    fn invalidate_session(&self) {
        self.inner.tokens.clear();
        let _ = self.inner.events.send(ClientEvent::SessionInvalidated);
    }

    fn notify(&self, err: &Error) {
        if let Error::Http { status, message, .. } = err {
            let kind = if *status >= 500 {
                NoticeKind::Server
            } else {
                NoticeKind::Client
            };
            let _ = self.inner.events.send(ClientEvent::Notice {
                kind,
                message: message.clone(),
            });
        }
    }
}

fn to_value<B: Serialize>(body: &B) -> Result<Value, Error> {
    serde_json::to_value(body).map_err(|err| Error::Encode(err.to_string()))
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|err| Error::Decode(err.to_string()))
}
