//! In-app notifications for swap lifecycle events, with optional webhook
//! fan-out.
//!
//! Delivery is best-effort: a failed store write or webhook is logged and
//! never fails the operation that triggered it.

pub mod webhook;

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::metrics;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::request::SwapRequest;
use crate::store::{NotificationStore, Store};
use webhook::{WebhookEvent, WebhookNotifier};

pub fn new_request_message(from_user_name: &str) -> String {
    format!(
        "You received a new skill swap request from {}",
        from_user_name
    )
}

pub fn status_changed_message(request: &SwapRequest) -> String {
    format!("Your skill swap request has been {}", request.status)
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn Store>,
    webhook: WebhookNotifier,
    targets: Vec<(String, Option<String>)>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            webhook: WebhookNotifier::new(),
            targets: Vec::new(),
        }
    }

    /// Mirror every persisted notification to `urls`, signed with `secret`
    /// when one is given.
    pub fn with_webhooks(mut self, urls: &[String], secret: Option<String>) -> Self {
        self.targets = urls
            .iter()
            .map(|url| (url.clone(), secret.clone()))
            .collect();
        self
    }

    /// Persist a notification for `user_id`. Returns `None` when the write
    /// failed.
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        message: String,
        request: Option<&SwapRequest>,
    ) -> Option<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            kind,
            message,
            request_id: request.map(|r| r.id),
            status: match kind {
                NotificationKind::RequestStatusChanged => request.map(|r| r.status),
                NotificationKind::NewRequest => None,
            },
            read: false,
            read_at: None,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.store.insert_notification(&notification).await {
            tracing::warn!(
                user_id = %user_id,
                kind = kind.as_str(),
                error = %e,
                "failed to persist notification"
            );
            return None;
        }
        metrics::record_notification(kind);

        if let Some(request) = request {
            let event = match kind {
                NotificationKind::NewRequest => WebhookEvent::request_created(user_id, request),
                NotificationKind::RequestStatusChanged => {
                    WebhookEvent::request_status_changed(user_id, request)
                }
            };
            self.webhook.dispatch_signed(&self.targets, event);
        }

        Some(notification)
    }

    /// Tell the recipient a request arrived.
    pub async fn request_created(&self, request: &SwapRequest) -> Option<Notification> {
        self.notify(
            request.to_user_id,
            NotificationKind::NewRequest,
            new_request_message(&request.from_user_name),
            Some(request),
        )
        .await
    }

    /// Tell the participant who did not act about the new status.
    pub async fn status_changed(&self, request: &SwapRequest, actor: Uuid) -> Option<Notification> {
        self.notify(
            request.counterpart_of(actor),
            NotificationKind::RequestStatusChanged,
            status_changed_message(request),
            Some(request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::SwapStatus;
    use crate::store::memory::MemoryStore;
    use crate::store::NotificationStore;

    fn request(status: SwapStatus) -> SwapRequest {
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

    #[tokio::test]
    async fn test_request_created_goes_to_recipient() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(store.clone());
        let req = request(SwapStatus::Pending);

        let n = dispatcher.request_created(&req).await.unwrap();
        assert_eq!(n.user_id, req.to_user_id);
        assert_eq!(n.message, "You received a new skill swap request from Ann");
        assert_eq!(n.status, None);
        assert_eq!(store.count_unread(req.to_user_id).await.unwrap(), 1);
        assert_eq!(store.count_unread(req.from_user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_change_goes_to_counterpart() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(store.clone());
        let req = request(SwapStatus::Cancelled);

        let n = dispatcher
            .status_changed(&req, req.from_user_id)
            .await
            .unwrap();
        assert_eq!(n.user_id, req.to_user_id);
        assert_eq!(n.message, "Your skill swap request has been cancelled");
        assert_eq!(n.status, Some(SwapStatus::Cancelled));
        assert_eq!(n.request_id, Some(req.id));
    }
}
