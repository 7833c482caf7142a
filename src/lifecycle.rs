//! Swap request lifecycle: creation, status transitions and deletion.
//!
//! ```text
//!            ┌──────────► accepted   (recipient)
//!  pending ──┼──────────► rejected   (recipient)
//!            └──────────► cancelled  (sender)
//! ```
//!
//! Terminal states are final. Every successful write notifies the other
//! participant through the [`Dispatcher`].

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{Result, SwapError};
use crate::metrics;
use crate::models::request::{StatusPatch, SwapRequest, SwapStatus};
use crate::notification::Dispatcher;
use crate::store::{Store, StoreError, SwapStore, UserStore};

pub const DEFAULT_MAX_MESSAGE_LEN: usize = 500;

/// Input for [`SwapManager::create_request`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwap {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub offered_skill: String,
    pub wanted_skill: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone)]
pub struct SwapManager {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
    max_message_len: usize,
}

impl SwapManager {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }

    pub fn with_max_message_len(mut self, max: usize) -> Self {
        self.max_message_len = max;
        self
    }

    pub async fn create_request(&self, input: CreateSwap) -> Result<SwapRequest> {
        if input.from_user_id == input.to_user_id {
            return Err(SwapError::invalid("cannot send a swap request to yourself"));
        }
        let offered_skill = input.offered_skill.trim();
        let wanted_skill = input.wanted_skill.trim();
        if offered_skill.is_empty() || wanted_skill.is_empty() {
            return Err(SwapError::invalid("offered and wanted skills are required"));
        }
        let message = input.message.trim();
        if message.chars().count() > self.max_message_len {
            return Err(SwapError::invalid(format!(
                "message must be at most {} characters",
                self.max_message_len
            )));
        }

        let sender = self
            .store
            .get_user(input.from_user_id)
            .await
            .map_err(|e| e.entity("user"))?;
        let recipient = self
            .store
            .get_user(input.to_user_id)
            .await
            .map_err(|e| e.entity("user"))?;
        // Unverified registrations are purged, so they cannot receive requests.
        if !recipient.is_verified {
            return Err(SwapError::NotFound("user"));
        }

        // Fast path for the common case; the store re-checks atomically.
        if self
            .store
            .find_pending(sender.id, recipient.id)
            .await?
            .is_some()
        {
            return Err(SwapError::DuplicatePending);
        }

        let now = Utc::now();
        let request = SwapRequest {
            id: Uuid::new_v4(),
            from_user_id: sender.id,
            from_user_name: sender.name,
            from_user_avatar: sender.photo_url,
            to_user_id: recipient.id,
            to_user_name: recipient.name,
            to_user_avatar: recipient.photo_url,
            offered_skill: offered_skill.to_string(),
            wanted_skill: wanted_skill.to_string(),
            message: message.to_string(),
            status: SwapStatus::Pending,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_request(&request).await?;
        metrics::record_request_created();
        tracing::info!(
            request_id = %request.id,
            from = %request.from_user_id,
            to = %request.to_user_id,
            "swap request created"
        );

        self.dispatcher.request_created(&request).await;
        Ok(request)
    }

    /// Move a pending request to `to` on behalf of `actor`.
    ///
    /// Only the recipient may accept or reject; only the sender may cancel.
    pub async fn transition(&self, id: Uuid, to: SwapStatus, actor: Uuid) -> Result<SwapRequest> {
        let current = self
            .store
            .get_request(id)
            .await
            .map_err(|e| e.entity("swap request"))?;
        if !current.involves(actor) {
            return Err(SwapError::NotFound("swap request"));
        }

        let action = action_name(to);
        if to == SwapStatus::Pending {
            return Err(SwapError::invalid("a request cannot be moved back to pending"));
        }
        if !current.status.can_transition_to(to) {
            return Err(SwapError::InvalidTransition {
                status: current.status,
                action,
            });
        }
        let allowed = match to {
            SwapStatus::Cancelled => actor == current.from_user_id,
            _ => actor == current.to_user_id,
        };
        if !allowed {
            return Err(SwapError::Forbidden(format!(
                "only the {} can {} this request",
                if to == SwapStatus::Cancelled { "sender" } else { "recipient" },
                action
            )));
        }

        let patch = StatusPatch {
            from: current.status,
            to,
            updated_by: actor,
            updated_at: Utc::now(),
        };
        let updated = self
            .store
            .update_request_status(id, &patch)
            .await
            .map_err(|e| match e {
                // Someone else resolved it between our read and write.
                StoreError::StatusMismatch(status) => SwapError::InvalidTransition { status, action },
                other => other.entity("swap request"),
            })?;

        metrics::record_transition(to);
        tracing::info!(
            request_id = %id,
            actor = %actor,
            status = %to,
            "swap request status changed"
        );

        self.dispatcher.status_changed(&updated, actor).await;
        Ok(updated)
    }

    pub async fn accept(&self, id: Uuid, actor: Uuid) -> Result<SwapRequest> {
        self.transition(id, SwapStatus::Accepted, actor).await
    }

    pub async fn reject(&self, id: Uuid, actor: Uuid) -> Result<SwapRequest> {
        self.transition(id, SwapStatus::Rejected, actor).await
    }

    pub async fn cancel(&self, id: Uuid, actor: Uuid) -> Result<SwapRequest> {
        self.transition(id, SwapStatus::Cancelled, actor).await
    }

    /// Remove a resolved request. Pending requests must be cancelled first.
    pub async fn delete_request(&self, id: Uuid, actor: Uuid) -> Result<()> {
        let current = self
            .store
            .get_request(id)
            .await
            .map_err(|e| e.entity("swap request"))?;
        // Outsiders cannot tell the request exists.
        if !current.involves(actor) {
            return Err(SwapError::NotFound("swap request"));
        }
        if !current.status.is_terminal() {
            return Err(SwapError::InvalidTransition {
                status: current.status,
                action: "delete",
            });
        }
        self.store
            .delete_request(id)
            .await
            .map_err(|e| e.entity("swap request"))?;
        tracing::info!(request_id = %id, actor = %actor, "swap request deleted");
        Ok(())
    }
}

fn action_name(to: SwapStatus) -> &'static str {
    match to {
        SwapStatus::Accepted => "accept",
        SwapStatus::Rejected => "reject",
        SwapStatus::Cancelled => "cancel",
        SwapStatus::Pending => "reopen",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Credentials, User};
    use crate::store::memory::MemoryStore;
    use crate::store::{NotificationStore, UserStore};

    async fn setup() -> (Arc<MemoryStore>, SwapManager, User, User) {
        let store = Arc::new(MemoryStore::new());
        let manager = SwapManager::new(store.clone(), Dispatcher::new(store.clone()));
        let mut a = User::new("Ann", Some("ann@example.com".into()), None);
        a.photo_url = Some("https://img.example.com/ann.png".into());
        let mut b = User::new("Bob", Some("bob@example.com".into()), None);
        a.is_verified = true;
        b.is_verified = true;
        for user in [&a, &b] {
            let creds = Credentials {
                user_id: user.id,
                password_hash: String::new(),
                otp: None,
                otp_expires_at: None,
                otp_attempts: 0,
            };
            store.insert_user(user, &creds).await.unwrap();
        }
        (store, manager, a, b)
    }

    fn swap(from: &User, to: &User) -> CreateSwap {
        CreateSwap {
            from_user_id: from.id,
            to_user_id: to.id,
            offered_skill: " Photoshop ".into(),
            wanted_skill: "Python".into(),
            message: "Let's trade".into(),
        }
    }

    #[tokio::test]
    async fn test_create_copies_display_fields() {
        let (_, manager, a, b) = setup().await;
        let req = manager.create_request(swap(&a, &b)).await.unwrap();
        assert_eq!(req.status, SwapStatus::Pending);
        assert_eq!(req.from_user_name, "Ann");
        assert_eq!(req.from_user_avatar.as_deref(), Some("https://img.example.com/ann.png"));
        assert_eq!(req.to_user_name, "Bob");
        assert_eq!(req.offered_skill, "Photoshop");
        assert_eq!(req.created_at, req.updated_at);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_, manager, a, b) = setup().await;

        let err = manager.create_request(swap(&a, &a)).await.unwrap_err();
        assert!(matches!(err, SwapError::InvalidArgument(_)));

        let mut blank = swap(&a, &b);
        blank.wanted_skill = "   ".into();
        let err = manager.create_request(blank).await.unwrap_err();
        assert!(matches!(err, SwapError::InvalidArgument(_)));

        let mut long = swap(&a, &b);
        long.message = "x".repeat(DEFAULT_MAX_MESSAGE_LEN + 1);
        let err = manager.create_request(long).await.unwrap_err();
        assert!(matches!(err, SwapError::InvalidArgument(_)));

        let mut ghost = swap(&a, &b);
        ghost.to_user_id = Uuid::new_v4();
        let err = manager.create_request(ghost).await.unwrap_err();
        assert!(matches!(err, SwapError::NotFound("user")));
    }

    #[tokio::test]
    async fn test_reverse_direction_is_a_different_pair() {
        let (_, manager, a, b) = setup().await;
        manager.create_request(swap(&a, &b)).await.unwrap();
        manager.create_request(swap(&b, &a)).await.unwrap();
        let err = manager.create_request(swap(&a, &b)).await.unwrap_err();
        assert!(matches!(err, SwapError::DuplicatePending));
    }

    #[tokio::test]
    async fn test_actor_checks() {
        let (_, manager, a, b) = setup().await;
        let req = manager.create_request(swap(&a, &b)).await.unwrap();

        let err = manager.accept(req.id, a.id).await.unwrap_err();
        assert!(matches!(err, SwapError::Forbidden(_)));
        let err = manager.cancel(req.id, b.id).await.unwrap_err();
        assert!(matches!(err, SwapError::Forbidden(_)));

        let err = manager
            .transition(req.id, SwapStatus::Pending, b.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_outsider_sees_not_found_even_when_resolved() {
        let (_, manager, a, b) = setup().await;
        let req = manager.create_request(swap(&a, &b)).await.unwrap();
        let outsider = Uuid::new_v4();

        let err = manager.accept(req.id, outsider).await.unwrap_err();
        assert!(matches!(err, SwapError::NotFound("swap request")));

        manager.reject(req.id, b.id).await.unwrap();
        let err = manager.accept(req.id, outsider).await.unwrap_err();
        assert!(matches!(err, SwapError::NotFound("swap request")));
        let err = manager.cancel(req.id, outsider).await.unwrap_err();
        assert!(matches!(err, SwapError::NotFound("swap request")));
    }

    #[tokio::test]
    async fn test_unverified_recipient_not_found() {
        let (store, manager, a, _) = setup().await;
        let pending = User::new("Cat", Some("cat@example.com".into()), None);
        let creds = Credentials {
            user_id: pending.id,
            password_hash: String::new(),
            otp: None,
            otp_expires_at: None,
            otp_attempts: 0,
        };
        store.insert_user(&pending, &creds).await.unwrap();

        let err = manager.create_request(swap(&a, &pending)).await.unwrap_err();
        assert!(matches!(err, SwapError::NotFound("user")));
    }

    #[tokio::test]
    async fn test_cancel_notifies_recipient() {
        let (store, manager, a, b) = setup().await;
        let req = manager.create_request(swap(&a, &b)).await.unwrap();
        let cancelled = manager.cancel(req.id, a.id).await.unwrap();
        assert_eq!(cancelled.status, SwapStatus::Cancelled);
        assert_eq!(cancelled.updated_by, Some(a.id));

        let inbox = store.list_notifications(b.id, 10).await.unwrap();
        assert_eq!(inbox.len(), 2);
        assert!(inbox
            .iter()
            .any(|n| n.message == "Your skill swap request has been cancelled"));
        assert_eq!(store.count_unread(a.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let (_, manager, a, b) = setup().await;
        let req = manager.create_request(swap(&a, &b)).await.unwrap();

        let err = manager.delete_request(req.id, a.id).await.unwrap_err();
        assert!(matches!(
            err,
            SwapError::InvalidTransition { status: SwapStatus::Pending, action: "delete" }
        ));

        manager.reject(req.id, b.id).await.unwrap();
        let err = manager.delete_request(req.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SwapError::NotFound("swap request")));

        manager.delete_request(req.id, b.id).await.unwrap();
        let err = manager.delete_request(req.id, b.id).await.unwrap_err();
        assert!(matches!(err, SwapError::NotFound("swap request")));
    }
}
