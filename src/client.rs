use crate::error::{ProbeError, Result};
use crate::types::{HttpResponse, PreparedRequest};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Transport failures are `Err`; 4xx/5xx still come back as `Ok`.
    async fn send(&self, request: &PreparedRequest) -> Result<HttpResponse>;
}

pub struct ReqwestExecutor {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ReqwestExecutor {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn send(&self, request: &PreparedRequest) -> Result<HttpResponse> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| ProbeError::InvalidMethod(request.method.clone()))?;

        let mut request_builder = self.client.request(method, self.url(&request.path));

        if !request.query.is_empty() {
            request_builder = request_builder.query(&request.query);
        }

        if let Some(token) = &self.token {
            request_builder = request_builder.bearer_auth(token);
        }

        for (key, value) in &request.headers {
            request_builder = request_builder.header(key, value);
        }

        if let Some(body) = &request.body {
            request_builder = request_builder.json(body);
        }

        let started = Instant::now();
        let response = request_builder.send().await?;
        let status = response.status().as_u16();

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let bytes = response.bytes().await?;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        Ok(HttpResponse {
            status,
            body: parse_body(&bytes),
            headers,
            duration_ms: Some(duration_ms),
            size_bytes: bytes.len() as u64,
        })
    }
}

fn parse_body(bytes: &[u8]) -> serde_json::Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
