//! HTTP clients for sibling services.
//!
//! A [`RemoteEndpoint`] spreads calls round-robin over the configured
//! instances of one service. Each instance sits behind its own circuit
//! breaker and rate limiter (see [`super::transport`]). What gets retried on
//! the next instance depends on the [`CallKind`]: a request the guards turned
//! away, or that never connected, is always safe to send elsewhere; a request
//! that may have reached the service is only resent when running it twice is
//! harmless. 4xx replies are domain rejections and come back immediately,
//! rebuilt from their wire code. The whole exchange runs under the request
//! context, so a cancelled or expired inbound request abandons the remote
//! call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gtd_core::auth::AuthError;
use gtd_core::auth::service::TokenPair;
use gtd_core::context::RequestContext;
use gtd_core::models::wire::{
    Credentials, ErrorResponse, LogoutResponse, TokensResponse, UserExistsRequest,
    UserExistsResponse, UserIdResponse, ValidateRequest, ValidateResponse,
};
use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::ServiceExt;
use tracing::{debug, warn};
use url::Url;

use super::transport::{ClientGuards, Transport, TransportError, transport};
use super::{TokenValidator, UserDirectory};

/// Retry budget for one remote call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts across all instances, including the first.
    pub max_attempts: u32,
    /// Timeout of a single attempt.
    pub attempt_timeout: Duration,
    /// Base pause between attempts; up to the same amount of jitter is added.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_millis(500),
            backoff: Duration::from_millis(25),
        }
    }
}

/// Whether a call may safely reach the remote service more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Read-only checks: retried after timeouts and 5xx replies too.
    Idempotent,
    /// Issues, rotates or revokes state: only retried when unsent.
    Mutating,
}

impl CallKind {
    /// Mutating unless the HTTP method is safe (GET, HEAD, OPTIONS, TRACE).
    pub fn of(method: &Method) -> Self {
        if method.is_safe() {
            CallKind::Idempotent
        } else {
            CallKind::Mutating
        }
    }

    fn retries(self, outcome: &Result<reqwest::Response, TransportError>) -> bool {
        match outcome {
            Ok(response) => response.status().is_server_error() && self == CallKind::Idempotent,
            Err(e) => e.is_unsent() || self == CallKind::Idempotent,
        }
    }
}

#[derive(Debug)]
struct Instance {
    base: Url,
    transport: Transport,
}

/// A set of interchangeable instances of one service.
#[derive(Debug)]
pub struct RemoteEndpoint {
    client: reqwest::Client,
    instances: Vec<Instance>,
    next: AtomicUsize,
    policy: RetryPolicy,
}

impl RemoteEndpoint {
    /// Build an endpoint over `instances` (service root URLs) with the
    /// default breaker and rate limit.
    pub fn new(instances: Vec<Url>, policy: RetryPolicy) -> Result<Self, AuthError> {
        Self::with_guards(instances, policy, ClientGuards::default())
    }

    pub fn with_guards(
        instances: Vec<Url>,
        policy: RetryPolicy,
        guards: ClientGuards,
    ) -> Result<Self, AuthError> {
        if instances.is_empty() {
            return Err(AuthError::Internal("no service instances configured".into()));
        }
        let client = reqwest::Client::new();
        let instances = instances
            .into_iter()
            .map(|base| Instance {
                base: as_directory(base),
                transport: transport(client.clone(), &guards),
            })
            .collect();
        Ok(Self {
            client,
            instances,
            next: AtomicUsize::new(0),
            policy,
        })
    }

    /// Parse a comma-separated list of instance URLs.
    pub fn parse_instances(list: &str) -> Result<Vec<Url>, url::ParseError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Url::parse)
            .collect()
    }

    pub fn instances(&self) -> Vec<&Url> {
        self.instances.iter().map(|i| &i.base).collect()
    }

    fn pick(&self) -> &Instance {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.instances.len();
        &self.instances[i]
    }

    /// POST `body` to `path` and decode the JSON reply.
    pub async fn post<B, R>(
        &self,
        ctx: &RequestContext,
        kind: CallKind,
        path: &str,
        bearer: Option<&str>,
        body: Option<&B>,
    ) -> Result<R, AuthError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .exchange(ctx, kind, Method::POST, path, |mut request| {
                if let Some(token) = bearer {
                    request = request.bearer_auth(token);
                }
                if let Some(body) = body {
                    request = request.json(body);
                }
                request
            })
            .await?;

        let status = response.status();
        let url = response.url().clone();
        if !status.is_success() {
            return Err(rejection(status, response).await);
        }
        debug!(%url, %status, "remote call succeeded");
        ctx.guard(response.json::<R>())
            .await?
            .map_err(|e| AuthError::Transport(format!("undecodable reply from {url}: {e}")))
    }

    /// Relay a request as is and hand back whatever the service answered.
    ///
    /// `path` is relative to the instance root and may carry a query string.
    pub async fn forward<B>(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: B,
    ) -> Result<reqwest::Response, AuthError>
    where
        B: Into<reqwest::Body> + Clone + Send + Sync,
    {
        let kind = CallKind::of(&method);
        self.exchange(ctx, kind, method, path, |request| {
            request.headers(headers.clone()).body(body.clone())
        })
        .await
    }

    /// Send one logical call, retrying as `kind` allows. The last reply is
    /// returned whatever its status; only a missing reply is an error.
    async fn exchange<F>(
        &self,
        ctx: &RequestContext,
        kind: CallKind,
        method: Method,
        path: &str,
        prepare: F,
    ) -> Result<reqwest::Response, AuthError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Sync,
    {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            ctx.check()?;
            let instance = self.pick();
            let url = instance.base.join(path.trim_start_matches('/')).map_err(|e| {
                AuthError::Internal(format!("bad url {} + {path}: {e}", instance.base))
            })?;
            let request = prepare(
                self.client
                    .request(method.clone(), url.clone())
                    .timeout(self.policy.attempt_timeout),
            )
            .build()
            .map_err(|e| AuthError::Internal(format!("cannot build request to {url}: {e}")))?;

            let outcome = ctx.guard(instance.transport.clone().oneshot(request)).await?;
            if attempt == attempts || !kind.retries(&outcome) {
                return outcome.map_err(|e| {
                    AuthError::Transport(format!("{url} after {attempt} attempt(s): {e}"))
                });
            }
            match &outcome {
                Ok(response) => warn!(
                    %url,
                    attempt,
                    max_attempts = attempts,
                    status = %response.status(),
                    "remote call failed"
                ),
                Err(e) => warn!(
                    %url,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "remote call failed"
                ),
            }

            let ceiling = self.policy.backoff.as_millis() as u64;
            let jitter = rand::rng().random_range(0..=ceiling);
            let pause = self.policy.backoff + Duration::from_millis(jitter);
            ctx.guard(tokio::time::sleep(pause)).await?;
        }

        Err(AuthError::Internal("retry loop ended without an outcome".into()))
    }
}

/// Make relative joins land under the URL's path instead of replacing its
/// last segment.
fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Rebuild the domain error carried by an unsuccessful reply.
async fn rejection(status: StatusCode, response: reqwest::Response) -> AuthError {
    match response.json::<ErrorResponse>().await {
        Ok(body) => AuthError::from_wire(&body.error, &body.message),
        Err(_) => AuthError::Transport(format!("unexpected status {status}")),
    }
}

/// Client for the auth service.
#[derive(Debug)]
pub struct HttpAuthClient {
    endpoint: RemoteEndpoint,
}

impl HttpAuthClient {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self { endpoint }
    }

    pub async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let reply: TokensResponse = self
            .endpoint
            .post(ctx, CallKind::Mutating, "login", None, Some(&body))
            .await?;
        Ok(reply.tokens)
    }

    /// Revoke the pair behind a signed access token.
    pub async fn logout(&self, ctx: &RequestContext, access_token: &str) -> Result<bool, AuthError> {
        let reply: LogoutResponse = self
            .endpoint
            .post::<(), _>(ctx, CallKind::Mutating, "logout", Some(access_token), None)
            .await?;
        Ok(reply.success)
    }

    /// Redeem a signed refresh token.
    pub async fn refresh(
        &self,
        ctx: &RequestContext,
        refresh_token: &str,
    ) -> Result<TokenPair, AuthError> {
        let reply: TokensResponse = self
            .endpoint
            .post::<(), _>(ctx, CallKind::Mutating, "refresh", Some(refresh_token), None)
            .await?;
        Ok(reply.tokens)
    }
}

#[async_trait]
impl TokenValidator for HttpAuthClient {
    async fn validate(&self, ctx: &RequestContext, access_uuid: &str) -> Result<bool, AuthError> {
        let body = ValidateRequest {
            access_uuid: access_uuid.to_string(),
        };
        let reply: ValidateResponse = self
            .endpoint
            .post(ctx, CallKind::Idempotent, "validate", None, Some(&body))
            .await?;
        Ok(reply.valid)
    }
}

/// Client for the user service.
#[derive(Debug)]
pub struct HttpUserClient {
    endpoint: RemoteEndpoint,
}

impl HttpUserClient {
    pub fn new(endpoint: RemoteEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl UserDirectory for HttpUserClient {
    async fn user_id(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<u64, AuthError> {
        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let reply: UserIdResponse = self
            .endpoint
            .post(ctx, CallKind::Idempotent, "user_id", None, Some(&body))
            .await?;
        Ok(reply.id)
    }

    async fn is_exists(&self, ctx: &RequestContext, id: u64) -> Result<bool, AuthError> {
        let reply: UserExistsResponse = self
            .endpoint
            .post(
                ctx,
                CallKind::Idempotent,
                "exists",
                None,
                Some(&UserExistsRequest { id }),
            )
            .await?;
        Ok(reply.exists)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::breaker::BreakerConfig;
    use super::super::limit::RateLimitConfig;
    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            attempt_timeout: Duration::from_secs(2),
            backoff: Duration::from_millis(1),
        }
    }

    fn endpoint(servers: &[&MockServer], policy: RetryPolicy) -> RemoteEndpoint {
        let urls = servers
            .iter()
            .map(|s| Url::parse(&s.uri()).unwrap())
            .collect();
        RemoteEndpoint::new(urls, policy).unwrap()
    }

    #[tokio::test]
    async fn validate_reads_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate"))
            .and(body_json(json!({"access_uuid": "abc"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpAuthClient::new(endpoint(&[&server], policy(3)));
        assert!(client.validate(&RequestContext::new(), "abc").await.unwrap());
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate"))
            .respond_with(ResponseTemplate::new(401).set_body_json(
                json!({"error": "key_not_found", "message": "key not found"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpAuthClient::new(endpoint(&[&server], policy(3)));
        let err = client
            .validate(&RequestContext::new(), "gone")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::KeyNotFound));
    }

    #[tokio::test]
    async fn server_error_moves_to_next_instance() {
        let failing = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exists"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&failing)
            .await;
        let healthy = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exists"))
            .and(body_json(json!({"id": 4})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"exists": true})))
            .expect(1)
            .mount(&healthy)
            .await;

        let client = HttpUserClient::new(endpoint(&[&failing, &healthy], policy(3)));
        assert!(client.is_exists(&RequestContext::new(), 4).await.unwrap());
    }

    #[tokio::test]
    async fn exhausted_budget_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user_id"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = HttpUserClient::new(endpoint(&[&server], policy(3)));
        let err = client
            .user_id(&RequestContext::new(), "alice", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
        assert!(!err.is_unauthenticated());
    }

    #[tokio::test]
    async fn unreachable_instance_is_a_transport_error() {
        let urls = vec![Url::parse("http://127.0.0.1:9/").unwrap()];
        let client = HttpUserClient::new(RemoteEndpoint::new(urls, policy(2)).unwrap());
        let err = client
            .is_exists(&RequestContext::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }

    #[tokio::test]
    async fn slow_attempts_time_out_and_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"valid": true}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let policy = RetryPolicy {
            max_attempts: 2,
            attempt_timeout: Duration::from_millis(100),
            backoff: Duration::from_millis(1),
        };
        let client = HttpAuthClient::new(endpoint(&[&server], policy));
        let err = client
            .validate(&RequestContext::new(), "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }

    #[tokio::test]
    async fn request_deadline_abandons_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"valid": true}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = HttpAuthClient::new(endpoint(&[&server], policy(3)));
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(100));
        let err = client.validate(&ctx, "abc").await.unwrap_err();
        assert!(matches!(err, AuthError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn logout_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .and(header("authorization", "Bearer signed.access.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpAuthClient::new(endpoint(&[&server], policy(1)));
        assert!(
            client
                .logout(&RequestContext::new(), "signed.access.token")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn refresh_is_sent_once_even_when_the_service_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(503).set_body_json(
                json!({"error": "store_unavailable", "message": "token store down"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpAuthClient::new(endpoint(&[&server], policy(3)));
        let err = client
            .refresh(&RequestContext::new(), "signed.refresh.token")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Store(ref m) if m == "token store down"));
        assert!(!err.is_unauthenticated());
    }

    #[tokio::test]
    async fn timed_out_login_is_not_resent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;

        let policy = RetryPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_millis(100),
            backoff: Duration::from_millis(1),
        };
        let client = HttpAuthClient::new(endpoint(&[&server], policy));
        let err = client
            .login(&RequestContext::new(), "alice", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }

    #[tokio::test]
    async fn unreachable_instance_is_skipped_for_mutations() {
        let healthy = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&healthy)
            .await;

        let urls = vec![
            Url::parse("http://127.0.0.1:9/").unwrap(),
            Url::parse(&healthy.uri()).unwrap(),
        ];
        let client = HttpAuthClient::new(RemoteEndpoint::new(urls, policy(2)).unwrap());
        assert!(
            client
                .logout(&RequestContext::new(), "signed.access.token")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn open_circuit_stops_calls_to_a_failing_instance() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user_id"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let guards = ClientGuards {
            breaker: BreakerConfig {
                failure_threshold: 2,
                open_for: Duration::from_secs(60),
            },
            ..ClientGuards::default()
        };
        let urls = vec![Url::parse(&server.uri()).unwrap()];
        let client =
            HttpUserClient::new(RemoteEndpoint::with_guards(urls, policy(1), guards).unwrap());
        let ctx = RequestContext::new();

        for _ in 0..2 {
            let err = client.user_id(&ctx, "alice", "pw").await.unwrap_err();
            assert!(matches!(err, AuthError::Transport(ref m) if m.contains("500")));
        }
        let err = client.user_id(&ctx, "alice", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(ref m) if m.contains("circuit open")));
    }

    #[tokio::test]
    async fn calls_beyond_the_rate_limit_are_refused_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
            .expect(2)
            .mount(&server)
            .await;

        let guards = ClientGuards {
            rate_limit: RateLimitConfig {
                burst: 2,
                refill_every: Duration::from_secs(3600),
            },
            ..ClientGuards::default()
        };
        let urls = vec![Url::parse(&server.uri()).unwrap()];
        let client =
            HttpAuthClient::new(RemoteEndpoint::with_guards(urls, policy(1), guards).unwrap());
        let ctx = RequestContext::new();

        assert!(client.validate(&ctx, "a").await.unwrap());
        assert!(client.validate(&ctx, "b").await.unwrap());
        let err = client.validate(&ctx, "c").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(ref m) if m.contains("rate limited")));
    }

    #[tokio::test]
    async fn base_path_without_trailing_slash_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
            .expect(1)
            .mount(&server)
            .await;

        let urls = vec![Url::parse(&format!("{}/auth", server.uri())).unwrap()];
        let endpoint = RemoteEndpoint::new(urls, policy(1)).unwrap();
        assert!(endpoint.instances()[0].path().ends_with("/auth/"));
        let client = HttpAuthClient::new(endpoint);
        assert!(client.validate(&RequestContext::new(), "abc").await.unwrap());
    }

    #[tokio::test]
    async fn forward_relays_the_reply_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .and(query_param("done", "false"))
            .and(header("authorization", "Bearer t"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": "task_not_found", "message": "gone"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = endpoint(&[&server], policy(3));
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer t".parse().unwrap());
        let response = endpoint
            .forward(
                &RequestContext::new(),
                Method::GET,
                "/tasks?done=false",
                headers,
                Vec::<u8>::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "task_not_found");
    }

    #[tokio::test]
    async fn forwarded_post_is_not_resent_after_a_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = endpoint(&[&server], policy(3));
        let response = endpoint
            .forward(
                &RequestContext::new(),
                Method::POST,
                "tasks",
                HeaderMap::new(),
                b"{}".to_vec(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn call_kind_follows_method_safety() {
        assert_eq!(CallKind::of(&Method::GET), CallKind::Idempotent);
        assert_eq!(CallKind::of(&Method::POST), CallKind::Mutating);
        assert_eq!(CallKind::of(&Method::DELETE), CallKind::Mutating);
    }

    #[test]
    fn instance_list_parsing() {
        let urls = RemoteEndpoint::parse_instances(" http://a:1 , ,http://b:2").unwrap();
        assert_eq!(urls.len(), 2);
        assert!(RemoteEndpoint::new(Vec::new(), RetryPolicy::default()).is_err());
    }
}
