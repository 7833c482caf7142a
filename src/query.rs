//! Read-side views over swap requests and notifications.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::errors::{Result, SwapError};
use crate::models::notification::Notification;
use crate::models::request::{Relationship, RelationshipKind, SwapRequest, SwapStatus};
use crate::models::user::PublicProfile;
use crate::store::{NotificationStore, Store, SwapStore, UserStore};

pub const DEFAULT_NOTIFICATION_LIMIT: usize = 50;

/// Filter for [`SwapQueries::browse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowseFilter {
    /// Users the viewer has no request with in either direction.
    #[default]
    All,
    Status(SwapStatus),
    /// No filtering at all.
    Any,
}

impl FromStr for BrowseFilter {
    type Err = SwapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(BrowseFilter::All),
            "any" => Ok(BrowseFilter::Any),
            other => other
                .parse::<SwapStatus>()
                .map(BrowseFilter::Status)
                .map_err(SwapError::InvalidArgument),
        }
    }
}

/// A public profile annotated with its request state relative to the viewer.
/// Contact details are never included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithRelationship {
    #[serde(flatten)]
    pub user: PublicProfile,
    pub request_status: Option<SwapStatus>,
    pub request_type: RelationshipKind,
    pub request: Option<SwapRequest>,
}

#[derive(Clone)]
pub struct SwapQueries {
    store: Arc<dyn Store>,
}

impl SwapQueries {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Requests `user_id` sent, oldest first.
    pub async fn sent_requests(&self, user_id: Uuid) -> Result<Vec<SwapRequest>> {
        let all = self.store.list_requests_for_user(user_id).await?;
        Ok(all.into_iter().filter(|r| r.from_user_id == user_id).collect())
    }

    pub async fn received_requests(&self, user_id: Uuid) -> Result<Vec<SwapRequest>> {
        let all = self.store.list_requests_for_user(user_id).await?;
        Ok(all.into_iter().filter(|r| r.to_user_id == user_id).collect())
    }

    pub async fn all_requests(&self, user_id: Uuid) -> Result<Vec<SwapRequest>> {
        Ok(self.store.list_requests_for_user(user_id).await?)
    }

    /// Fetch one request; only its participants may see it.
    pub async fn get_request(&self, id: Uuid, viewer: Uuid) -> Result<SwapRequest> {
        let request = self
            .store
            .get_request(id)
            .await
            .map_err(|e| e.entity("swap request"))?;
        if !request.involves(viewer) {
            return Err(SwapError::NotFound("swap request"));
        }
        Ok(request)
    }

    /// Request state between `user_id` and `other_user_id`.
    ///
    /// Looks at the most recent request in each direction. A request sent
    /// by `user_id` wins over one received from `other_user_id`.
    pub async fn relationship_status(
        &self,
        user_id: Uuid,
        other_user_id: Uuid,
    ) -> Result<Relationship> {
        let requests = self.store.list_requests_for_user(user_id).await?;
        Ok(relationship_from(user_id, other_user_id, &requests))
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64> {
        Ok(self.store.count_unread(user_id).await?)
    }

    pub async fn notifications(&self, user_id: Uuid, limit: usize) -> Result<Vec<Notification>> {
        Ok(self.store.list_notifications(user_id, limit).await?)
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        if self.store.mark_read(user_id, id, chrono::Utc::now()).await? {
            Ok(())
        } else {
            Err(SwapError::NotFound("notification"))
        }
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        Ok(self.store.mark_all_read(user_id, chrono::Utc::now()).await?)
    }

    pub async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        if self.store.delete_notification(user_id, id).await? {
            Ok(())
        } else {
            Err(SwapError::NotFound("notification"))
        }
    }

    /// Every other public user, annotated with the viewer's request state.
    pub async fn browse(
        &self,
        viewer: Uuid,
        filter: BrowseFilter,
    ) -> Result<Vec<UserWithRelationship>> {
        let users = self.store.list_public_users().await?;
        let requests = self.store.list_requests_for_user(viewer).await?;

        let mut by_other: HashMap<Uuid, Vec<SwapRequest>> = HashMap::new();
        for request in requests {
            by_other
                .entry(request.counterpart_of(viewer))
                .or_default()
                .push(request);
        }

        let out = users
            .into_iter()
            .filter(|u| u.id != viewer)
            .map(|user| {
                let rel = by_other
                    .get(&user.id)
                    .map(|reqs| relationship_from(viewer, user.id, reqs))
                    .unwrap_or_else(Relationship::none);
                UserWithRelationship {
                    user: user.into(),
                    request_status: rel.status,
                    request_type: rel.kind,
                    request: rel.request,
                }
            })
            .filter(|entry| match filter {
                BrowseFilter::Any => true,
                BrowseFilter::All => entry.request_type == RelationshipKind::None,
                BrowseFilter::Status(status) => entry.request_status == Some(status),
            })
            .collect();
        Ok(out)
    }
}

fn relationship_from(user_id: Uuid, other_user_id: Uuid, requests: &[SwapRequest]) -> Relationship {
    let latest = |from: Uuid, to: Uuid| {
        requests
            .iter()
            .filter(|r| r.from_user_id == from && r.to_user_id == to)
            .max_by_key(|r| r.created_at)
            .cloned()
    };

    if let Some(sent) = latest(user_id, other_user_id) {
        return Relationship::from_request(RelationshipKind::Sent, sent);
    }
    if let Some(received) = latest(other_user_id, user_id) {
        return Relationship::from_request(RelationshipKind::Received, received);
    }
    Relationship::none()
}
