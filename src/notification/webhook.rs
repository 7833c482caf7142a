use anyhow::Result;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::request::SwapRequest;

// ── Webhook Event Types ───────────────────────────────────────

/// A swap lifecycle event mirrored to external webhook endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    /// "swap_request.created" or "swap_request.status_changed".
    pub event_type: String,
    /// RFC 3339 timestamp of when the event occurred.
    pub timestamp: String,
    /// The user the in-app notification was addressed to.
    pub user_id: Uuid,
    pub request_id: Uuid,
    pub details: serde_json::Value,
}

impl WebhookEvent {
    pub fn request_created(recipient: Uuid, request: &SwapRequest) -> Self {
        Self {
            event_type: "swap_request.created".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_id: recipient,
            request_id: request.id,
            details: serde_json::json!({
                "from_user_id": request.from_user_id,
                "to_user_id": request.to_user_id,
                "offered_skill": request.offered_skill,
                "wanted_skill": request.wanted_skill,
            }),
        }
    }

    pub fn request_status_changed(recipient: Uuid, request: &SwapRequest) -> Self {
        Self {
            event_type: "swap_request.status_changed".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_id: recipient,
            request_id: request.id,
            details: serde_json::json!({
                "status": request.status,
                "updated_by": request.updated_by,
            }),
        }
    }
}

// ── HMAC Signing ─────────────────────────────────────────────

/// HMAC-SHA256 of `payload`, formatted as "sha256=<lowercase hex>".
fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid webhook signing key: {}", e))?;
    mac.update(payload);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

// ── Webhook Notifier ──────────────────────────────────────────

const DEFAULT_BACKOFF_SECS: [u64; 4] = [0, 1, 5, 25];

/// Delivers webhook events to configured URLs.
///
/// Bodies are signed with HMAC-SHA256 (`x-skillswap-signature`) when a
/// secret is configured. Failed deliveries are retried three times with
/// back-off (1s, 5s, 25s).
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    backoff: Vec<Duration>,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("SkillSwap-Webhook/1.0")
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "falling back to default webhook HTTP client");
                reqwest::Client::new()
            });
        Self {
            client,
            backoff: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }

    /// Replace the retry schedule. The first entry is the delay before the
    /// first attempt.
    pub fn with_backoff(mut self, backoff: Vec<Duration>) -> Self {
        if !backoff.is_empty() {
            self.backoff = backoff;
        }
        self
    }

    /// Send one event to `url`, retrying on transport errors and non-2xx
    /// responses. Returns `Ok(())` as soon as any attempt succeeds.
    pub async fn send_signed(
        &self,
        url: &str,
        event: &WebhookEvent,
        signing_secret: Option<&str>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| anyhow::anyhow!("webhook serialize error: {}", e))?;
        let delivery_id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = signing_secret
            .map(|s| hmac_sha256_hex(s, &payload))
            .transpose()?;

        for (attempt, delay) in self.backoff.iter().enumerate() {
            if !delay.is_zero() {
                debug!(
                    url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    event_type = %event.event_type,
                    "retrying webhook delivery"
                );
                tokio::time::sleep(*delay).await;
            }

            let mut req = self
                .client
                .post(url)
                .header("content-type", "application/json")
                .header("x-skillswap-delivery-id", &delivery_id)
                .header("x-skillswap-timestamp", &timestamp)
                .header("x-skillswap-event", &event.event_type);

            if let Some(ref sig) = signature {
                req = req.header("x-skillswap-signature", sig.as_str());
            }

            match req.body(payload.clone()).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        status = %resp.status(),
                        "webhook delivered"
                    );
                    return Ok(());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        status = %status,
                        body = %body,
                        "webhook delivery failed (non-2xx)"
                    );
                }
                Err(e) => {
                    warn!(
                        url,
                        event_type = %event.event_type,
                        delivery_id = %delivery_id,
                        attempt,
                        error = %e,
                        "webhook request error"
                    );
                }
            }
        }

        Err(anyhow::anyhow!(
            "webhook delivery failed after {} attempts: {}",
            self.backoff.len(),
            url
        ))
    }

    /// Fire-and-forget delivery to every target. Each target is attempted
    /// independently; a failing endpoint never blocks the others.
    pub fn dispatch_signed(&self, targets: &[(String, Option<String>)], event: WebhookEvent) {
        if targets.is_empty() {
            debug!("dispatch_signed: no webhook targets, skipping");
            return;
        }

        let notifier = self.clone();
        let targets = targets.to_vec();

        tokio::spawn(async move {
            for (url, secret) in &targets {
                if let Err(e) = notifier.send_signed(url, &event, secret.as_deref()).await {
                    warn!(url, error = %e, "webhook dispatch ultimately failed");
                }
            }
        });
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::SwapStatus;
    use chrono::Utc;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request(status: SwapStatus) -> SwapRequest {
        let now = Utc::now();
        SwapRequest {
            id: Uuid::new_v4(),
            from_user_id: Uuid::new_v4(),
            from_user_name: "Ann".into(),
            from_user_avatar: None,
            to_user_id: Uuid::new_v4(),
            to_user_name: "Bob".into(),
            to_user_avatar: None,
            offered_skill: "Photoshop".into(),
            wanted_skill: "Python".into(),
            message: String::new(),
            status,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_created_event_details() {
        let req = sample_request(SwapStatus::Pending);
        let event = WebhookEvent::request_created(req.to_user_id, &req);
        assert_eq!(event.event_type, "swap_request.created");
        assert_eq!(event.user_id, req.to_user_id);
        assert_eq!(event.details["offered_skill"], "Photoshop");
    }

    #[test]
    fn test_status_changed_event_carries_status() {
        let req = sample_request(SwapStatus::Rejected);
        let event = WebhookEvent::request_status_changed(req.from_user_id, &req);
        assert_eq!(event.event_type, "swap_request.status_changed");
        assert_eq!(event.details["status"], "rejected");
    }

    #[test]
    fn test_hmac_signature_deterministic() {
        let sig1 = hmac_sha256_hex("secret123", b"payload").unwrap();
        let sig2 = hmac_sha256_hex("secret123", b"payload").unwrap();
        assert_eq!(sig1, sig2);
        assert!(sig1.starts_with("sha256="));
        assert_ne!(sig1, hmac_sha256_hex("secret124", b"payload").unwrap());
    }

    #[tokio::test]
    async fn test_send_signed_sets_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("x-skillswap-event", "swap_request.created"))
            .and(header_exists("x-skillswap-signature"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let req = sample_request(SwapStatus::Pending);
        let event = WebhookEvent::request_created(req.to_user_id, &req);
        WebhookNotifier::new()
            .send_signed(&format!("{}/hook", server.uri()), &event, Some("s3cret"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_signed_gives_up_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new().with_backoff(vec![
            Duration::ZERO,
            Duration::from_millis(10),
            Duration::from_millis(10),
        ]);
        let req = sample_request(SwapStatus::Accepted);
        let event = WebhookEvent::request_status_changed(req.from_user_id, &req);
        let result = notifier.send_signed(&server.uri(), &event, None).await;
        assert!(result.is_err());
    }
}
