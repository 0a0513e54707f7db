use crate::error::{Error, Result};
use reqwest::{Client, StatusCode, header};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    base_delay_ms: u64,
}

impl HttpClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::http(e.to_string()))?;

        Ok(Self {
            client,
            max_retries: 3,
            base_delay_ms: 1000,
        })
    }

    /// GET a JSON document, with an optional bearer token.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<T> {
        let body = self
            .request_with_retry(|| {
                let mut req = self
                    .client
                    .get(url)
                    .header(header::ACCEPT, "application/json");
                if let Some(token) = token {
                    req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
                }
                req
            })
            .await?;
        serde_json::from_str(&body).map_err(|e| Error::parse(format!("JSON parse: {e}")))
    }

    async fn request_with_retry<F>(&self, build: F) -> Result<String>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = Error::http("no attempts made");
        let mut delay = self.base_delay_ms;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(attempt, delay_ms = delay, "retrying request");
                sleep(Duration::from_millis(delay)).await;
                delay = (delay * 2).min(30_000);
            }

            match build().send().await {
                Ok(resp) => return self.handle_response(resp).await,
                Err(e) => {
                    last_error = Error::http(e.to_string());
                    if e.is_timeout() || e.is_connect() {
                        warn!(attempt, "transient failure, will retry");
                        continue;
                    }
                    return Err(last_error);
                }
            }
        }

        Err(last_error)
    }

    async fn handle_response(&self, resp: reqwest::Response) -> Result<String> {
        let status = resp.status();
        let url = resp.url().to_string();

        match status {
            StatusCode::OK => resp.text().await.map_err(|e| Error::http(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                Err(Error::RateLimit {
                    platform: extract_domain(&url),
                    retry_after_secs: retry_after,
                })
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::api_with_status(
                    extract_domain(&url),
                    body,
                    status.as_u16(),
                ))
            }
        }
    }
}

fn extract_domain(url: &str) -> String {
    url.split("//")
        .nth(1)
        .and_then(|s| s.split('/').next())
        .unwrap_or("unknown")
        .to_string()
}
