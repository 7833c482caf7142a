use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{NotificationStore, StoreError, StoreResult, SwapStore, UserStore};
use crate::models::notification::Notification;
use crate::models::request::{StatusPatch, SwapRequest, SwapStatus};
use crate::models::user::{Credentials, User};

/// In-process store backed by concurrent maps.
///
/// `pending_pairs` indexes the single pending request of each ordered
/// `(from, to)` pair. Claiming a slot goes through the dashmap entry API, so
/// two concurrent creates for the same pair serialize on that shard and only
/// one of them wins. `contacts` does the same for registered emails
/// (lowercased) and mobile numbers.
///
/// No operation holds a guard on one map while locking another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    requests: Arc<DashMap<Uuid, SwapRequest>>,
    pending_pairs: Arc<DashMap<(Uuid, Uuid), Uuid>>,
    notifications: Arc<DashMap<Uuid, Notification>>,
    users: Arc<DashMap<Uuid, User>>,
    contacts: Arc<DashMap<String, Uuid>>,
    credentials: Arc<DashMap<Uuid, Credentials>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn release_pair(&self, request: &SwapRequest) {
        self.pending_pairs
            .remove_if(&(request.from_user_id, request.to_user_id), |_, id| {
                *id == request.id
            });
    }

    /// Claim every contact key of `user`. On a clash, keys claimed so far
    /// are released again.
    fn claim_contacts(&self, user: &User) -> StoreResult<()> {
        let mut claimed: Vec<String> = Vec::new();
        for key in contact_keys(user) {
            let taken = match self.contacts.entry(key.clone()) {
                Entry::Occupied(slot) => *slot.get() != user.id,
                Entry::Vacant(slot) => {
                    slot.insert(user.id);
                    claimed.push(key);
                    false
                }
            };
            if taken {
                self.release_contacts(user.id, &claimed);
                return Err(StoreError::DuplicateContact);
            }
        }
        Ok(())
    }

    fn release_contacts(&self, user_id: Uuid, keys: &[String]) {
        for key in keys {
            self.contacts.remove_if(key, |_, id| *id == user_id);
        }
    }

    fn lookup_contact(&self, key: &str) -> Option<Uuid> {
        self.contacts.get(key).map(|id| *id)
    }
}

fn email_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

fn mobile_key(mobile: &str) -> String {
    format!("mobile:{}", mobile)
}

fn contact_keys(user: &User) -> Vec<String> {
    user.email
        .as_deref()
        .map(email_key)
        .into_iter()
        .chain(user.mobile.as_deref().map(mobile_key))
        .collect()
}

#[async_trait]
impl SwapStore for MemoryStore {
    async fn insert_request(&self, request: &SwapRequest) -> StoreResult<()> {
        if request.status == SwapStatus::Pending {
            match self
                .pending_pairs
                .entry((request.from_user_id, request.to_user_id))
            {
                Entry::Occupied(_) => return Err(StoreError::DuplicatePending),
                Entry::Vacant(slot) => {
                    slot.insert(request.id);
                }
            }
        }
        self.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<SwapRequest> {
        self.requests
            .get(&id)
            .map(|r| r.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn find_pending(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> StoreResult<Option<SwapRequest>> {
        Ok(self
            .requests
            .iter()
            .find(|r| {
                r.from_user_id == from_user_id
                    && r.to_user_id == to_user_id
                    && r.status == SwapStatus::Pending
            })
            .map(|r| r.clone()))
    }

    async fn list_requests_for_user(&self, user_id: Uuid) -> StoreResult<Vec<SwapRequest>> {
        let mut out: Vec<SwapRequest> = self
            .requests
            .iter()
            .filter(|r| r.involves(user_id))
            .map(|r| r.clone())
            .collect();
        out.sort_by_key(|r| r.created_at);
        Ok(out)
    }

    async fn update_request_status(
        &self,
        id: Uuid,
        patch: &StatusPatch,
    ) -> StoreResult<SwapRequest> {
        let updated = {
            let mut entry = self.requests.get_mut(&id).ok_or(StoreError::NotFound)?;
            if entry.status != patch.from {
                return Err(StoreError::StatusMismatch(entry.status));
            }
            entry.status = patch.to;
            entry.updated_by = Some(patch.updated_by);
            entry.updated_at = patch.updated_at;
            entry.clone()
        };
        if patch.from == SwapStatus::Pending {
            self.release_pair(&updated);
        }
        Ok(updated)
    }

    async fn delete_request(&self, id: Uuid) -> StoreResult<()> {
        let (_, removed) = self.requests.remove(&id).ok_or(StoreError::NotFound)?;
        self.release_pair(&removed);
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.notifications
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<Notification>> {
        let mut out: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .map(|n| n.clone())
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(limit);
        Ok(out)
    }

    async fn count_unread(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(self
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as u64)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        match self.notifications.get_mut(&id) {
            Some(mut n) if n.user_id == user_id => {
                if !n.read {
                    n.read = true;
                    n.read_at = Some(at);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let mut changed = 0;
        for mut n in self.notifications.iter_mut() {
            if n.user_id == user_id && !n.read {
                n.read = true;
                n.read_at = Some(at);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool> {
        Ok(self
            .notifications
            .remove_if(&id, |_, n| n.user_id == user_id)
            .is_some())
    }

    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let before = self.notifications.len();
        self.notifications
            .retain(|_, n| !(n.read && n.timestamp < cutoff));
        Ok((before - self.notifications.len()) as u64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User, credentials: &Credentials) -> StoreResult<()> {
        self.claim_contacts(user)?;
        self.users.insert(user.id, user.clone());
        self.credentials.insert(user.id, credentials.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        self.users
            .get(&id)
            .map(|u| u.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_contact(
        &self,
        email: Option<&str>,
        mobile: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let id = email
            .and_then(|e| self.lookup_contact(&email_key(e)))
            .or_else(|| mobile.and_then(|m| self.lookup_contact(&mobile_key(m))));
        Ok(id.and_then(|id| self.users.get(&id).map(|u| u.clone())))
    }

    async fn list_public_users(&self) -> StoreResult<Vec<User>> {
        let mut out: Vec<User> = self
            .users
            .iter()
            .filter(|u| u.is_public() && u.is_verified)
            .map(|u| u.clone())
            .collect();
        out.sort_by_key(|u| u.created_at);
        Ok(out)
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let previous = self.get_user(user.id).await?;
        let old_keys = contact_keys(&previous);
        let new_keys = contact_keys(user);
        if old_keys != new_keys {
            self.claim_contacts(user)?;
            let dropped: Vec<String> = old_keys
                .into_iter()
                .filter(|k| !new_keys.contains(k))
                .collect();
            self.release_contacts(user.id, &dropped);
        }
        let mut entry = self.users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        *entry = user.clone();
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let (_, removed) = self.users.remove(&id).ok_or(StoreError::NotFound)?;
        self.credentials.remove(&id);
        self.release_contacts(id, &contact_keys(&removed));
        Ok(())
    }

    async fn get_credentials(&self, user_id: Uuid) -> StoreResult<Credentials> {
        self.credentials
            .get(&user_id)
            .map(|c| c.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn save_credentials(&self, credentials: &Credentials) -> StoreResult<()> {
        if !self.users.contains_key(&credentials.user_id) {
            return Err(StoreError::NotFound);
        }
        self.credentials
            .insert(credentials.user_id, credentials.clone());
        Ok(())
    }

    async fn record_otp_failure(&self, user_id: Uuid, max_attempts: i32) -> StoreResult<i32> {
        let mut creds = self
            .credentials
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        creds.otp_attempts += 1;
        if creds.otp_attempts >= max_attempts {
            creds.otp = None;
            creds.otp_expires_at = None;
        }
        Ok(creds.otp_attempts)
    }

    async fn purge_unverified_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let stale: Vec<Uuid> = self
            .users
            .iter()
            .filter(|u| !u.is_verified && u.created_at < cutoff)
            .map(|u| u.id)
            .collect();
        let mut purged = 0;
        for id in &stale {
            if let Some((_, removed)) = self.users.remove(id) {
                self.credentials.remove(id);
                self.release_contacts(*id, &contact_keys(&removed));
                purged += 1;
            }
        }
        Ok(purged)
    }
}
