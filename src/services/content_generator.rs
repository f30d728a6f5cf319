//! Content generator client
//!
//! One generator call per job run. The call is long-running (minutes), so the
//! whole-request timeout is configured separately from the connect timeout.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::errors::{GeneratorError, GeneratorResult};
use crate::models::{GenerationRequest, GenerationResponse};

/// Header carrying the worker identity on every generation request
pub const WORKER_ID_HEADER: &str = "x-worker-id";

/// Body bytes kept from a non-2xx response for the failure record
const MAX_ERROR_BODY_LEN: usize = 2048;

/// Remote content generation capability
///
/// A response with `success: false` is returned as `Ok`; the caller decides
/// that it is a job failure. Transport and non-2xx failures are `Err`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> GeneratorResult<GenerationResponse>;
}

/// reqwest-backed generator client
#[derive(Debug, Clone)]
pub struct HttpContentGenerator {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpContentGenerator {
    pub fn new(config: &GeneratorConfig) -> GeneratorResult<Self> {
        let url = config.generation_url();
        reqwest::Url::parse(&url).map_err(|e| GeneratorError::Configuration {
            message: format!("Invalid generator URL '{url}': {e}"),
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| GeneratorError::Configuration {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self, request: &GenerationRequest) -> GeneratorResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let worker_id = HeaderValue::from_str(&request.worker_id).map_err(|e| {
            GeneratorError::Configuration {
                message: format!("Worker id is not a valid header value: {e}"),
            }
        })?;
        headers.insert(WORKER_ID_HEADER, worker_id);
        Ok(headers)
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate(&self, request: &GenerationRequest) -> GeneratorResult<GenerationResponse> {
        debug!(
            "POST {} for job {} (target date {})",
            self.url, request.job_id, request.target_date
        );

        let mut builder = self
            .client
            .post(&self.url)
            .headers(self.headers(request)?)
            .json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY_LEN {
                let mut cut = MAX_ERROR_BODY_LEN;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(GeneratorError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| GeneratorError::InvalidResponse {
            message: format!("Unparseable generator response: {e}"),
        })
    }
}
