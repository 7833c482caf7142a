use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{NotificationStore, StoreError, StoreResult, SwapStore, UserStore};
use crate::models::notification::Notification;
use crate::models::request::{StatusPatch, SwapRequest};
use crate::models::user::{AvailabilitySlot, Credentials, OfferedSkill, User, Visibility};

const REQUEST_COLUMNS: &str = "id, from_user_id, from_user_name, from_user_avatar, to_user_id, \
     to_user_name, to_user_avatar, offered_skill, wanted_skill, message, status, updated_by, \
     created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, mobile, is_verified, location, photo_url, \
     visibility, skills_offered, skills_wanted, availability, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Unique violations become the domain-level duplicate errors; everything
/// else is a backend failure.
fn map_insert_error(e: sqlx::Error, on_unique: StoreError, what: &'static str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => on_unique,
        _ => StoreError::Backend(anyhow::Error::new(e).context(what)),
    }
}

fn backend(e: sqlx::Error, what: &'static str) -> StoreError {
    StoreError::Backend(anyhow::Error::new(e).context(what))
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    mobile: Option<String>,
    is_verified: bool,
    location: Option<String>,
    photo_url: Option<String>,
    visibility: Visibility,
    skills_offered: Json<Vec<OfferedSkill>>,
    skills_wanted: Vec<String>,
    availability: Json<Vec<AvailabilitySlot>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            mobile: row.mobile,
            is_verified: row.is_verified,
            location: row.location,
            photo_url: row.photo_url,
            visibility: row.visibility,
            skills_offered: row.skills_offered.0,
            skills_wanted: row.skills_wanted,
            availability: row.availability.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    user_id: Uuid,
    password_hash: String,
    otp: Option<String>,
    otp_expires_at: Option<DateTime<Utc>>,
    otp_attempts: i32,
}

// -- Swap Request Operations --

#[async_trait]
impl SwapStore for PgStore {
    async fn insert_request(&self, request: &SwapRequest) -> StoreResult<()> {
        // The partial unique index `swap_requests_one_pending_per_pair` turns a
        // racing second insert into a unique violation.
        sqlx::query(
            r#"INSERT INTO swap_requests (id, from_user_id, from_user_name, from_user_avatar,
                   to_user_id, to_user_name, to_user_avatar, offered_skill, wanted_skill,
                   message, status, updated_by, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
        )
        .bind(request.id)
        .bind(request.from_user_id)
        .bind(&request.from_user_name)
        .bind(&request.from_user_avatar)
        .bind(request.to_user_id)
        .bind(&request.to_user_name)
        .bind(&request.to_user_avatar)
        .bind(&request.offered_skill)
        .bind(&request.wanted_skill)
        .bind(&request.message)
        .bind(request.status)
        .bind(request.updated_by)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, StoreError::DuplicatePending, "insert swap request"))?;
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<SwapRequest> {
        let sql = format!("SELECT {} FROM swap_requests WHERE id = $1", REQUEST_COLUMNS);
        sqlx::query_as::<_, SwapRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "get swap request"))?
            .ok_or(StoreError::NotFound)
    }

    async fn find_pending(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> StoreResult<Option<SwapRequest>> {
        let sql = format!(
            "SELECT {} FROM swap_requests \
             WHERE from_user_id = $1 AND to_user_id = $2 AND status = 'pending'",
            REQUEST_COLUMNS
        );
        sqlx::query_as::<_, SwapRequest>(&sql)
            .bind(from_user_id)
            .bind(to_user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "find pending swap request"))
    }

    async fn list_requests_for_user(&self, user_id: Uuid) -> StoreResult<Vec<SwapRequest>> {
        let sql = format!(
            "SELECT {} FROM swap_requests \
             WHERE from_user_id = $1 OR to_user_id = $1 ORDER BY created_at ASC",
            REQUEST_COLUMNS
        );
        sqlx::query_as::<_, SwapRequest>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend(e, "list swap requests"))
    }

    async fn update_request_status(
        &self,
        id: Uuid,
        patch: &StatusPatch,
    ) -> StoreResult<SwapRequest> {
        let sql = format!(
            "UPDATE swap_requests SET status = $1, updated_by = $2, updated_at = $3 \
             WHERE id = $4 AND status = $5 RETURNING {}",
            REQUEST_COLUMNS
        );
        let updated = sqlx::query_as::<_, SwapRequest>(&sql)
            .bind(patch.to)
            .bind(patch.updated_by)
            .bind(patch.updated_at)
            .bind(id)
            .bind(patch.from)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "update swap request status"))?;

        match updated {
            Some(row) => Ok(row),
            // Lost the compare-and-set: report why.
            None => {
                let current = self.get_request(id).await?;
                Err(StoreError::StatusMismatch(current.status))
            }
        }
    }

    async fn delete_request(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM swap_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| backend(e, "delete swap request"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| backend(e, "ping database"))?;
        Ok(())
    }
}

// -- Notification Operations --

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO notifications (id, user_id, type, message, request_id, status, read, read_at, timestamp)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.message)
        .bind(notification.request_id)
        .bind(notification.status)
        .bind(notification.read)
        .bind(notification.read_at)
        .bind(notification.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| backend(e, "insert notification"))?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            r#"SELECT id, user_id, type, message, request_id, status, read, read_at, timestamp
               FROM notifications
               WHERE user_id = $1
               ORDER BY timestamp DESC
               LIMIT $2"#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend(e, "list notifications"))
    }

    async fn count_unread(&self, user_id: Uuid) -> StoreResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| backend(e, "count unread notifications"))?;
        Ok(count.max(0) as u64)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"UPDATE notifications SET read = true, read_at = COALESCE(read_at, $3)
               WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend(e, "mark notification read"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = true, read_at = $2 WHERE user_id = $1 AND read = false",
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| backend(e, "mark all notifications read"))?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| backend(e, "delete notification"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM notifications WHERE read = true AND timestamp < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await
                .map_err(|e| backend(e, "purge read notifications"))?;
        Ok(result.rows_affected())
    }
}

// -- User Operations --

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &User, credentials: &Credentials) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin user insert")
            .map_err(StoreError::Backend)?;

        sqlx::query(
            r#"INSERT INTO users (id, name, email, mobile, is_verified, location, photo_url,
                   visibility, skills_offered, skills_wanted, availability, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.mobile)
        .bind(user.is_verified)
        .bind(&user.location)
        .bind(&user.photo_url)
        .bind(user.visibility)
        .bind(Json(&user.skills_offered))
        .bind(&user.skills_wanted)
        .bind(Json(&user.availability))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, StoreError::DuplicateContact, "insert user"))?;

        sqlx::query(
            r#"INSERT INTO user_credentials (user_id, password_hash, otp, otp_expires_at, otp_attempts)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(credentials.user_id)
        .bind(&credentials.password_hash)
        .bind(&credentials.otp)
        .bind(credentials.otp_expires_at)
        .bind(credentials.otp_attempts)
        .execute(&mut *tx)
        .await
        .map_err(|e| backend(e, "insert user credentials"))?;

        tx.commit()
            .await
            .context("commit user insert")
            .map_err(StoreError::Backend)?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "get user"))?
            .map(User::from)
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_contact(
        &self,
        email: Option<&str>,
        mobile: Option<&str>,
    ) -> StoreResult<Option<User>> {
        if email.is_none() && mobile.is_none() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT {} FROM users \
             WHERE ($1::TEXT IS NOT NULL AND lower(email) = lower($1)) \
                OR ($2::TEXT IS NOT NULL AND mobile = $2) \
             LIMIT 1",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .bind(mobile)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "find user by contact"))?;
        Ok(row.map(User::from))
    }

    async fn list_public_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE visibility = 'public' AND is_verified \
             ORDER BY created_at ASC",
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| backend(e, "list public users"))?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE users SET name = $2, email = $3, mobile = $4, is_verified = $5,
                   location = $6, photo_url = $7, visibility = $8, skills_offered = $9,
                   skills_wanted = $10, availability = $11, updated_at = $12
               WHERE id = $1"#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.mobile)
        .bind(user.is_verified)
        .bind(&user.location)
        .bind(&user.photo_url)
        .bind(user.visibility)
        .bind(Json(&user.skills_offered))
        .bind(&user.skills_wanted)
        .bind(Json(&user.availability))
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, StoreError::DuplicateContact, "save user"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        // user_credentials rows go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| backend(e, "delete user"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_credentials(&self, user_id: Uuid) -> StoreResult<Credentials> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            "SELECT user_id, password_hash, otp, otp_expires_at, otp_attempts \
             FROM user_credentials WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend(e, "get credentials"))?
        .ok_or(StoreError::NotFound)?;
        Ok(Credentials {
            user_id: row.user_id,
            password_hash: row.password_hash,
            otp: row.otp,
            otp_expires_at: row.otp_expires_at,
            otp_attempts: row.otp_attempts,
        })
    }

    async fn save_credentials(&self, credentials: &Credentials) -> StoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE user_credentials SET password_hash = $2, otp = $3, otp_expires_at = $4,
                   otp_attempts = $5
               WHERE user_id = $1"#,
        )
        .bind(credentials.user_id)
        .bind(&credentials.password_hash)
        .bind(&credentials.otp)
        .bind(credentials.otp_expires_at)
        .bind(credentials.otp_attempts)
        .execute(&self.pool)
        .await
        .map_err(|e| backend(e, "save credentials"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn record_otp_failure(&self, user_id: Uuid, max_attempts: i32) -> StoreResult<i32> {
        let attempts: Option<i32> = sqlx::query_scalar(
            r#"UPDATE user_credentials
               SET otp_attempts = otp_attempts + 1,
                   otp = CASE WHEN otp_attempts + 1 >= $2 THEN NULL ELSE otp END,
                   otp_expires_at = CASE WHEN otp_attempts + 1 >= $2 THEN NULL ELSE otp_expires_at END
               WHERE user_id = $1
               RETURNING otp_attempts"#,
        )
        .bind(user_id)
        .bind(max_attempts)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| backend(e, "record otp failure"))?;
        attempts.ok_or(StoreError::NotFound)
    }

    async fn purge_unverified_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM users WHERE is_verified = false AND created_at < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await
                .map_err(|e| backend(e, "purge unverified users"))?;
        Ok(result.rows_affected())
    }
}
