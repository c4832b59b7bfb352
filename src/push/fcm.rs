/*!
 * Firebase Cloud Messaging client.
 *
 * Posts a `PushMessage` to the legacy send endpoint with the server key in
 * the `Authorization` header. A non-success status, or a 200 whose body
 * reports that every target failed, becomes `PushError::ApiError`.
 */

use std::time::Duration;
use async_trait::async_trait;
use serde::Deserialize;
use reqwest::Client;
use log::{debug, error};

use crate::app_config::PushConfig;
use crate::errors::PushError;
use crate::push::{PushMessage, PushNotifier};

/// Client for the Firebase Cloud Messaging legacy HTTP endpoint
#[derive(Debug, Clone)]
pub struct FcmNotifier {
    /// HTTP client for API requests
    client: Client,
    /// Full send URL
    endpoint: String,
    /// Value of the `Authorization` header
    authorization: String,
}

/// Per-message delivery result
#[derive(Debug, Deserialize)]
struct FcmResult {
    #[serde(default)]
    error: Option<String>,
}

/// Response body of the send endpoint
#[derive(Debug, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    success: u32,
    #[serde(default)]
    failure: u32,
    #[serde(default)]
    results: Vec<FcmResult>,
}

impl FcmNotifier {
    /// Create a new client
    pub fn new(endpoint: impl Into<String>, server_key: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            authorization: format!("key={}", server_key),
        }
    }

    /// Create a client from the push section of the configuration
    pub fn from_config(config: &PushConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(config.timeout())
                .build()
                .unwrap_or_default(),
            endpoint: config.endpoint.clone(),
            authorization: config.authorization(),
        }
    }

    /// Endpoint messages are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PushNotifier for FcmNotifier {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        let response = self.client.post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", &self.authorization)
            .json(message)
            .send()
            .await
            .map_err(|e| PushError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await
            .unwrap_or_else(|_| "Failed to get response text".to_string());

        if !status.is_success() {
            error!("Push service error ({}): {}", status, body);
            return Err(PushError::ApiError {
                status_code: status.as_u16(),
                message: body,
            });
        }

        // A 200 can still carry a per-token failure such as NotRegistered
        if let Ok(parsed) = serde_json::from_str::<FcmResponse>(&body) {
            if parsed.failure > 0 && parsed.success == 0 {
                let reason = parsed.results.iter()
                    .find_map(|r| r.error.clone())
                    .unwrap_or_else(|| "unknown failure".to_string());
                return Err(PushError::ApiError {
                    status_code: status.as_u16(),
                    message: reason,
                });
            }
        }

        debug!("Push delivered to {}", message.to);
        Ok(())
    }
}
