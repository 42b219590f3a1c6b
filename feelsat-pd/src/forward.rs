//! Downstream forwarding of prediction results
//!
//! Every prediction is POSTed to the automation flow. The outcome is
//! reported to the caller and never fails the request.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

/// Longest downstream response body echoed back
const RESPONSE_TEXT_LIMIT: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ForwardStatus {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: None,
            response_text: None,
            error: Some(error.into()),
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

pub struct Forwarder {
    http_client: reqwest::Client,
    url: Option<String>,
}

impl Forwarder {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            url: url.filter(|u| !u.trim().is_empty()),
        })
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// POST `payload` as JSON to the configured URL
    pub async fn forward<T: Serialize + ?Sized>(&self, payload: &T) -> ForwardStatus {
        let Some(url) = &self.url else {
            return ForwardStatus::failed("forwarding disabled");
        };

        let response = match self.http_client.post(url).json(payload).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to forward prediction");
                return ForwardStatus::failed(e.to_string());
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        info!(url = %url, status = status.as_u16(), "Forwarded prediction");

        ForwardStatus {
            success: status.is_success(),
            status_code: Some(status.as_u16()),
            response_text: Some(truncate_chars(&text, RESPONSE_TEXT_LIMIT)),
            error: if status.is_success() {
                None
            } else {
                Some(format!("downstream returned {status}"))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_forwarder() {
        let forwarder = Forwarder::new(None, Duration::from_secs(1)).unwrap();
        let status = forwarder.forward(&serde_json::json!({"a": 1})).await;

        assert!(!status.success);
        assert_eq!(status.error.as_deref(), Some("forwarding disabled"));
        assert_eq!(status.status_code, None);
    }

    #[test]
    fn test_blank_url_disables() {
        let forwarder = Forwarder::new(Some("  ".to_string()), Duration::from_secs(1)).unwrap();
        assert_eq!(forwarder.url(), None);
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        let text = "é".repeat(300);
        assert_eq!(truncate_chars(&text, 200).chars().count(), 200);
        assert_eq!(truncate_chars("short", 200), "short");
    }

    #[test]
    fn test_status_serialization_omits_absent_fields() {
        let json = serde_json::to_value(ForwardStatus::failed("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "boom"}));
    }
}
