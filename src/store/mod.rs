//! Persistence seam for swap requests, notifications and users.
//!
//! Implementations: [`memory::MemoryStore`] (dashmap-backed, used for tests and
//! database-less runs) and [`postgres::PgStore`].
//!
//! Both implementations enforce "at most one pending request per ordered
//! `(from, to)` pair" atomically on insert, so callers never rely on a
//! read-then-write check for correctness.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::notification::Notification;
use crate::models::request::{StatusPatch, SwapRequest, SwapStatus};
use crate::models::user::{Credentials, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("a pending request already exists for this pair")]
    DuplicatePending,

    /// Conditional update lost: the stored status is no longer the expected one.
    #[error("request status is '{0}'")]
    StatusMismatch(SwapStatus),

    #[error("contact already registered")]
    DuplicateContact,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SwapStore: Send + Sync {
    /// Fails with `DuplicatePending` if `request` is pending and another pending
    /// request exists for the same ordered pair.
    async fn insert_request(&self, request: &SwapRequest) -> StoreResult<()>;

    async fn get_request(&self, id: Uuid) -> StoreResult<SwapRequest>;

    async fn find_pending(&self, from_user_id: Uuid, to_user_id: Uuid)
        -> StoreResult<Option<SwapRequest>>;

    /// Requests where the user is sender or recipient, oldest first.
    async fn list_requests_for_user(&self, user_id: Uuid) -> StoreResult<Vec<SwapRequest>>;

    async fn update_request_status(&self, id: Uuid, patch: &StatusPatch)
        -> StoreResult<SwapRequest>;

    async fn delete_request(&self, id: Uuid) -> StoreResult<()>;

    /// Readiness probe for the backend.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()>;

    /// Newest first.
    async fn list_notifications(&self, user_id: Uuid, limit: usize)
        -> StoreResult<Vec<Notification>>;

    async fn count_unread(&self, user_id: Uuid) -> StoreResult<u64>;

    /// Returns false if the notification does not exist or belongs to someone else.
    async fn mark_read(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn mark_all_read(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64>;

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool>;

    /// Removes read notifications older than `cutoff`.
    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User, credentials: &Credentials) -> StoreResult<()>;

    async fn get_user(&self, id: Uuid) -> StoreResult<User>;

    /// Match on email (case-insensitive) or mobile, whichever is given.
    async fn find_by_contact(&self, email: Option<&str>, mobile: Option<&str>)
        -> StoreResult<Option<User>>;

    async fn list_public_users(&self) -> StoreResult<Vec<User>>;

    /// Replaces every mutable profile field of an existing user.
    async fn save_user(&self, user: &User) -> StoreResult<()>;

    /// Removes the user together with their credentials.
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    async fn get_credentials(&self, user_id: Uuid) -> StoreResult<Credentials>;

    async fn save_credentials(&self, credentials: &Credentials) -> StoreResult<()>;

    /// Count one wrong OTP guess and return the new total. Once it reaches
    /// `max_attempts` the pending OTP is cleared. Atomic per user.
    async fn record_otp_failure(&self, user_id: Uuid, max_attempts: i32) -> StoreResult<i32>;

    /// Removes never-verified registrations created before `cutoff`.
    async fn purge_unverified_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

/// Everything the service needs from persistence, as one object-safe bound.
pub trait Store: SwapStore + NotificationStore + UserStore {}

impl<T: SwapStore + NotificationStore + UserStore> Store for T {}
