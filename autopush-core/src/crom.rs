use reqwest::{redirect, Client, ClientBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::article::{window_from_data, Window};
use crate::config::UpstreamConfig;
use crate::error::PollError;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

/// GraphQL client for the page index, with ordered endpoint failover.
#[derive(Debug, Clone)]
pub struct CromClient {
    client: Client,
    endpoints: Vec<Url>,
    query: String,
}

impl CromClient {
    pub fn new(client: Client, endpoints: Vec<Url>, query: impl Into<String>) -> Self {
        Self {
            client,
            endpoints,
            query: query.into(),
        }
    }

    /// Builds the HTTP client too; the request timeout bounds a hung upstream.
    pub fn from_config(upstream: &UpstreamConfig) -> Result<Self, PollError> {
        let client = ClientBuilder::new()
            .redirect(redirect::Policy::limited(5))
            .user_agent(concat!("autopush/", env!("CARGO_PKG_VERSION")))
            .timeout(upstream.request_timeout())
            .build()?;
        Ok(Self::new(
            client,
            upstream.endpoints.clone(),
            upstream.query.clone(),
        ))
    }

    /// Fetches the newest pages under `base_url`.
    ///
    /// Endpoints are tried in order. A GraphQL error payload moves on to the
    /// next endpoint; a transport failure or non-success status aborts at once.
    pub async fn fetch(&self, base_url: &str) -> Result<Window, PollError> {
        if self.endpoints.is_empty() {
            return Err(PollError::NoEndpoints);
        }

        let any_base_url = if base_url.is_empty() {
            Value::Null
        } else {
            Value::from(base_url)
        };
        let body = json!({
            "query": self.query,
            "variables": {
                "anyBaseUrl": any_base_url,
                "baseUrl": base_url,
            },
        });

        let mut last_errors = Vec::new();
        for endpoint in &self.endpoints {
            let response = self
                .client
                .post(endpoint.clone())
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(PollError::Status {
                    endpoint: endpoint.to_string(),
                    status,
                });
            }

            let bytes = response.bytes().await?;
            let payload = match serde_json::from_slice::<GraphQlResponse>(&bytes) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(
                        endpoint = %endpoint,
                        error = %err,
                        "unreadable upstream body; treating as empty window"
                    );
                    return Ok(Window::new());
                }
            };

            match payload.errors {
                Some(errors) if !errors.is_empty() => {
                    warn!(
                        endpoint = %endpoint,
                        count = errors.len(),
                        "upstream reported errors, trying next endpoint"
                    );
                    last_errors = errors;
                }
                _ => {
                    let window = payload.data.map(window_from_data).unwrap_or_default();
                    debug!(endpoint = %endpoint, articles = window.len(), "fetched window");
                    return Ok(window);
                }
            }
        }

        Err(PollError::EndpointsExhausted {
            errors: Value::from(last_errors).to_string(),
        })
    }
}
