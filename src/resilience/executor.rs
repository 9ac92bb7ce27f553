//! Resilient Executor
//!
//! Runs one logical authenticated call: token injection, per-attempt timeout,
//! failure classification, backoff retries and a single re-authentication on
//! 401.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use super::{RetryConfig, RetryStats};
use crate::core::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{is_retryable_status, parse_downstream_errors, CarrierError, ClientFailure, ProtocolError, TransportError};
use crate::token::TokenAcquirer;
use crate::types::{Credential, Grant, RequestContext};

/// What an operation receives for one attempt.
#[derive(Clone, Debug)]
pub struct AuthenticatedCall {
    credential: Arc<Credential>,
    context: RequestContext,
    attempt: u32,
    timeout: Duration,
}

impl AuthenticatedCall {
    pub fn access_token(&self) -> &str {
        self.credential.access_token()
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// 1-based attempt number within the logical call.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Add the bearer token and correlation headers to `request`.
    pub fn apply(&self, mut request: HttpRequest) -> HttpRequest {
        request = request.header("authorization", self.credential.authorization_header());
        for (name, value) in self.context.headers() {
            request = request.header(name, value);
        }
        if request.timeout.is_none() {
            request.timeout = Some(self.timeout);
        }
        request
    }
}

/// Successful downstream response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub correlation_id: String,
    /// Attempts the call took, including the successful one.
    pub attempts: u32,
}

impl ApiResponse {
    fn from_http(response: HttpResponse, context: &RequestContext, attempts: u32) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
            correlation_id: context.correlation_id().to_string(),
            attempts,
        }
    }

    /// Deserialize the body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, CarrierError> {
        serde_json::from_str(&self.body).map_err(|e| {
            CarrierError::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Retrying executor for authenticated calls.
pub struct ResilientExecutor {
    acquirer: Arc<TokenAcquirer>,
    transport: Arc<dyn HttpTransport>,
    retry: RetryConfig,
    timeout: Duration,
    stats: Mutex<RetryStats>,
}

impl ResilientExecutor {
    pub fn new(acquirer: Arc<TokenAcquirer>, transport: Arc<dyn HttpTransport>) -> Self {
        let retry = acquirer.config().retry.clone();
        let timeout = acquirer.config().timeout;
        Self {
            acquirer,
            transport,
            retry,
            timeout,
            stats: Mutex::new(RetryStats::default()),
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn stats(&self) -> RetryStats {
        self.stats.lock().clone()
    }

    /// Send `request` as one logical call.
    pub async fn send(
        &self,
        grant: &Grant,
        context: &RequestContext,
        request: HttpRequest,
    ) -> Result<ApiResponse, CarrierError> {
        self.execute(grant, context, |call| {
            let request = call.apply(request.clone());
            let transport = self.transport.clone();
            async move { transport.send(request).await }
        })
        .await
    }

    /// Run `operation` until it succeeds, fails terminally or runs out of
    /// retries.
    ///
    /// Every attempt sees the same `context`. A 401 re-acquires the token and
    /// retries once without touching the retry budget; a second 401 is
    /// returned as a [`ClientFailure`].
    #[instrument(
        skip(self, context, operation),
        fields(grant = grant.as_str(), correlation_id = %context.correlation_id())
    )]
    pub async fn execute<F, Fut>(
        &self,
        grant: &Grant,
        context: &RequestContext,
        operation: F,
    ) -> Result<ApiResponse, CarrierError>
    where
        F: Fn(AuthenticatedCall) -> Fut,
        Fut: Future<Output = Result<HttpResponse, CarrierError>>,
    {
        self.stats.lock().calls += 1;

        let mut budget = self.retry.budget();
        let mut reauthenticated = false;
        let mut attempts = 0u32;

        loop {
            let mut presented = None;
            let outcome = match self.acquirer.acquire_credential(grant).await {
                Ok(credential) => {
                    attempts += 1;
                    self.stats.lock().total_attempts += 1;
                    presented = Some(credential.clone());
                    let call = AuthenticatedCall {
                        credential,
                        context: context.clone(),
                        attempt: attempts,
                        timeout: self.timeout,
                    };
                    match tokio::time::timeout(self.timeout, operation(call)).await {
                        Ok(result) => result,
                        Err(_) => Err(CarrierError::Transport(TransportError::Timeout {
                            timeout: self.timeout,
                        })),
                    }
                }
                // A throttled or failing token endpoint is as transient as the API itself.
                Err(e) if e.is_retryable() => Err(e),
                Err(e) => return Err(e),
            };

            let (last_status, last_body, retry_after) = match outcome {
                Ok(response) if response.is_success() => {
                    tracing::debug!(status = response.status, attempts, "call succeeded");
                    return Ok(ApiResponse::from_http(response, context, attempts));
                }
                Ok(response) if response.status == 401 => {
                    if reauthenticated {
                        tracing::warn!("second 401, giving up");
                        return Err(client_failure(response, context));
                    }
                    reauthenticated = true;
                    self.stats.lock().reauthentications += 1;
                    tracing::info!("401 received, re-acquiring token");
                    if let Some(credential) = presented.as_ref() {
                        self.acquirer.invalidate(grant, credential);
                    }
                    continue;
                }
                Ok(response) if is_retryable_status(response.status) => {
                    let retry_after = response.retry_after();
                    (Some(response.status), Some(response.body), retry_after)
                }
                Ok(response) => {
                    tracing::debug!(status = response.status, "request rejected");
                    return Err(client_failure(response, context));
                }
                Err(e) if e.is_retryable() => {
                    let body = match &e {
                        CarrierError::Upstream { body, .. } => Some(body.clone()),
                        other => Some(other.to_string()),
                    };
                    (e.status(), body, e.retry_after())
                }
                Err(e) => return Err(e),
            };

            match budget.next_delay(retry_after) {
                Some(delay) => {
                    self.stats.lock().retries += 1;
                    tracing::warn!(
                        attempt = attempts,
                        status = ?last_status,
                        delay = ?delay,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    self.stats.lock().exhausted += 1;
                    tracing::warn!(attempts, status = ?last_status, "retry budget exhausted");
                    return Err(CarrierError::RetryExhausted {
                        status: last_status,
                        body: last_body,
                        attempts,
                        correlation_id: context.correlation_id().to_string(),
                    });
                }
            }
        }
    }
}

fn client_failure(response: HttpResponse, context: &RequestContext) -> CarrierError {
    CarrierError::Client(ClientFailure {
        status: response.status,
        errors: parse_downstream_errors(&response.body),
        correlation_id: context.correlation_id().to_string(),
        body: response.body,
    })
}
