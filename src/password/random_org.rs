//! random.org JSON-RPC password source.
//!
//! Requests `ceil(length / 2)` unique integers in `0..=255` rendered in base
//! 16, zero-pads each to two hex digits and truncates the concatenation to
//! `length` characters.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::check_length;
use crate::error::{CryptError, CryptResult};

pub const RANDOM_ORG_URL: &str = "https://api.random.org/json-rpc/1/invoke";

const JSON_RPC_VERSION: &str = "2.0";
const METHOD: &str = "generateIntegers";
const REQUEST_ID: u32 = 679;

/// Upper bound on one call, from connect until the body is read.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RandomOrgRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: RandomOrgParams,
    pub id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RandomOrgParams {
    pub api_key: String,
    pub n: usize,
    pub min: u32,
    pub max: u32,
    pub replacement: bool,
    pub base: u32,
}

impl RandomOrgRequest {
    /// `generateIntegers` call for `n` unique bytes in base 16.
    pub fn hex_bytes(api_key: &str, n: usize) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.into(),
            method: METHOD.into(),
            params: RandomOrgParams {
                api_key: api_key.into(),
                n,
                min: 0,
                max: 255,
                replacement: false,
                base: 16,
            },
            id: REQUEST_ID,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RandomOrgResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub result: Option<RpcResult>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcResult {
    pub random: RandomData,
    #[serde(default)]
    pub bits_used: Option<u64>,
    #[serde(default)]
    pub bits_left: Option<u64>,
    #[serde(default)]
    pub requests_left: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomData {
    pub data: Vec<Value>,
}

/// Carries one JSON-RPC call to random.org.
#[async_trait]
pub trait RandomOrgTransport: Send + Sync {
    async fn invoke(&self, request: &RandomOrgRequest) -> CryptResult<RandomOrgResponse>;
}

/// HTTPS transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
    timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::with_url(RANDOM_ORG_URL)
    }
}

impl HttpTransport {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl RandomOrgTransport for HttpTransport {
    async fn invoke(&self, request: &RandomOrgRequest) -> CryptResult<RandomOrgResponse> {
        debug!(url = %self.url, n = request.params.n, "calling random.org");
        let resp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| CryptError::remote_with("request failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CryptError::remote(format!(
                "unexpected response code {status}: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| CryptError::remote_with("malformed response", e))
    }
}

/// Generate a password of `length` hex characters from random.org.
///
/// Length validation and every transport, protocol and decoding failure are
/// reported through the returned result.
pub async fn generate_random_org_password(
    transport: &dyn RandomOrgTransport,
    length: usize,
    api_key: &str,
) -> CryptResult<Zeroizing<String>> {
    check_length(length)?;
    if api_key.trim().is_empty() {
        return Err(CryptError::InvalidParameter("random.org API key is blank".into()));
    }

    let n = length.div_ceil(2);
    let request = RandomOrgRequest::hex_bytes(api_key, n);
    let response = transport.invoke(&request).await?;

    if let Some(err) = response.error {
        return Err(CryptError::remote_with("service returned an error", err));
    }
    let result = response
        .result
        .ok_or_else(|| CryptError::remote("response carries neither result nor error"))?;

    if result.random.data.len() < n {
        return Err(CryptError::remote(format!(
            "expected {n} values, got {}",
            result.random.data.len()
        )));
    }

    let mut password = Zeroizing::new(String::with_capacity(2 * n));
    for value in &result.random.data[..n] {
        let byte = parse_hex_byte(value)?;
        password.push_str(&format!("{byte:02x}"));
    }
    password.truncate(length);

    info!(
        requests_left = result.requests_left,
        bits_left = result.bits_left,
        "random.org password generated"
    );
    Ok(password)
}

fn parse_hex_byte(value: &Value) -> CryptResult<u8> {
    let parsed = match value {
        Value::String(s) => u8::from_str_radix(s.trim(), 16).ok(),
        Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
        _ => None,
    };
    parsed.ok_or_else(|| CryptError::remote(format!("unexpected value in response: {value}")))
}
