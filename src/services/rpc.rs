//! JSON-RPC 1.1 client
//!
//! Requests are `{"version": "1.1", "method": "Service.method", "params": [...], "id": ...}`
//! posted to the service URL. A reply carries either a `result` array or an
//! `error` object; services report RPC errors with an HTTP 500 status, so the
//! body is inspected before the status code.

use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for one JSON-RPC service
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Service endpoint
    pub url: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Extra attempts after a transport failure
    pub retry_count: u32,

    /// Delay between attempts
    pub retry_delay: Duration,

    /// Token sent in the `Authorization` header
    pub auth_token: Option<String>,
}

impl RpcConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
            retry_count: 2,
            retry_delay: Duration::from_millis(500),
            auth_token: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, count: u32, delay: Duration) -> Self {
        self.retry_count = count;
        self.retry_delay = delay;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    version: &'static str,
    method: &'a str,
    params: &'a [Value],
    id: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

// ============================================================================
// Client
// ============================================================================

/// JSON-RPC client with retry on transport failures
#[derive(Debug, Clone)]
pub struct RpcClient {
    config: RpcConfig,
    http_client: Client,
}

impl RpcClient {
    pub fn new(config: RpcConfig) -> ServiceResult<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::Init(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Call `method` and return the `result` array
    ///
    /// Network failures and 5xx replies without an RPC error body are retried.
    /// RPC errors are returned immediately.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> ServiceResult<Vec<Value>> {
        let request = RpcRequest {
            version: "1.1",
            method,
            params: &params,
            id: Uuid::new_v4().to_string(),
        };

        let mut last_error = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                tracing::debug!(method, attempt, "Retrying RPC call");
                tokio::time::sleep(self.config.retry_delay).await;
            }

            match self.post(&request).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(method, attempt, error = %e, "RPC call failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ServiceError::Network("Unknown error".to_string())))
    }

    /// Call `method` and return the first element of the `result` array
    pub async fn call_single(&self, method: &str, params: Vec<Value>) -> ServiceResult<Value> {
        self.call(method, params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InvalidResponse(format!("{method} returned no result")))
    }

    async fn post(&self, request: &RpcRequest<'_>) -> ServiceResult<Vec<Value>> {
        let mut builder = self.http_client.post(&self.config.url).json(request);
        if let Some(token) = &self.config.auth_token {
            builder = builder.header(AUTHORIZATION, token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        match serde_json::from_str::<RpcResponse>(&body) {
            Ok(RpcResponse {
                error: Some(error), ..
            }) => Err(ServiceError::Rpc {
                code: error.code,
                message: match error.name {
                    Some(name) if !name.is_empty() => format!("{name}: {}", error.message),
                    _ => error.message,
                },
            }),
            _ if !status.is_success() => Err(ServiceError::Http {
                status: status.as_u16(),
                message: body,
            }),
            Ok(RpcResponse {
                result: Some(result),
                ..
            }) => Ok(result),
            // Methods without a return value may omit the result
            Ok(RpcResponse { result: None, .. }) => Ok(Vec::new()),
            Err(e) => Err(ServiceError::Parse(e.to_string())),
        }
    }
}
