//! HTTP client for the HSP service-details endpoint.

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

pub struct HspClient {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl HspClient {
    pub fn new(
        url: String,
        username: String,
        password: String,
        timeout_secs: f64,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent("darwinflow-hsp/0.1")
            .timeout(Duration::from_secs_f64(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url,
            username,
            password,
        })
    }

    /// Fetch the raw JSON for one service. Any failure (transport,
    /// non-200, invalid JSON) is logged and yields `None`; the caller
    /// accounts for the skip.
    pub async fn get_service_details_raw(&self, rid: &str) -> Option<Value> {
        let payload = serde_json::json!({ "rid": rid });

        let response = match self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(rid, error = %e, "HSP request failed");
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            // Keep it short; HSP error bodies can be huge.
            warn!(rid, status = %response.status(), "HSP non-200 response");
            return None;
        }

        match response.json::<Value>().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(rid, error = %e, "HSP returned invalid JSON");
                None
            }
        }
    }
}
