use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::otp::{generate_otp, otp_matches, OtpSender};
use super::password::{hash_password, verify_password};
use super::token::TokenIssuer;
use crate::errors::{Result, SwapError};
use crate::models::user::{Credentials, User};
use crate::store::{Store, StoreError, UserStore};

pub const DEFAULT_OTP_TTL_SECS: i64 = 600;

/// Wrong guesses allowed per issued OTP. The code is revoked on the last one.
pub const MAX_OTP_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    pub password: String,
}

/// Result of a successful register or login: an OTP is on its way.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: Uuid,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: TokenIssuer,
    sender: Arc<dyn OtpSender>,
    otp_ttl: Duration,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, tokens: TokenIssuer, sender: Arc<dyn OtpSender>) -> Self {
        Self {
            store,
            tokens,
            sender,
            otp_ttl: Duration::seconds(DEFAULT_OTP_TTL_SECS),
        }
    }

    pub fn with_otp_ttl(mut self, ttl: Duration) -> Self {
        self.otp_ttl = ttl;
        self
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn register(&self, input: RegisterInput) -> Result<LoginOutcome> {
        let email = normalize(input.email.as_deref()).map(|e| e.to_lowercase());
        let mobile = normalize(input.mobile.as_deref());
        if email.is_none() && mobile.is_none() {
            return Err(SwapError::invalid("email or mobile is required"));
        }
        if input.name.trim().is_empty() {
            return Err(SwapError::invalid("name is required"));
        }
        if input.password.is_empty() {
            return Err(SwapError::invalid("password is required"));
        }

        // Email and mobile may each belong to a different registration.
        // Resolve both before deleting anything.
        let mut existing: Vec<User> = Vec::new();
        for (by_email, by_mobile) in [(email.as_deref(), None), (None, mobile.as_deref())] {
            if by_email.is_none() && by_mobile.is_none() {
                continue;
            }
            if let Some(user) = self.store.find_by_contact(by_email, by_mobile).await? {
                if !existing.iter().any(|u| u.id == user.id) {
                    existing.push(user);
                }
            }
        }
        if existing.iter().any(|u| u.is_verified) {
            return Err(SwapError::Conflict("user already exists".into()));
        }
        for stale in existing {
            tracing::info!(user_id = %stale.id, "replacing unverified registration");
            match self.store.delete_user(stale.id).await {
                Ok(()) | Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let user = User::new(&input.name, email, mobile);
        let otp = generate_otp();
        let credentials = Credentials {
            user_id: user.id,
            password_hash: hash_password(&input.password).map_err(SwapError::Store)?,
            otp: Some(otp.clone()),
            otp_expires_at: Some(Utc::now() + self.otp_ttl),
            otp_attempts: 0,
        };
        self.store.insert_user(&user, &credentials).await?;
        tracing::info!(user_id = %user.id, "user registered");

        self.deliver_otp(&user, &otp).await;
        Ok(LoginOutcome { user_id: user.id })
    }

    /// Check the password and send a fresh OTP.
    pub async fn login(
        &self,
        email: Option<&str>,
        mobile: Option<&str>,
        password: &str,
    ) -> Result<LoginOutcome> {
        let email = normalize(email);
        let mobile = normalize(mobile);
        if email.is_none() && mobile.is_none() {
            return Err(SwapError::invalid("email or mobile is required"));
        }
        let user = self
            .store
            .find_by_contact(email.as_deref(), mobile.as_deref())
            .await?
            .ok_or(SwapError::NotFound("user"))?;

        let mut credentials = self
            .store
            .get_credentials(user.id)
            .await
            .map_err(|e| e.entity("user"))?;
        if !verify_password(password, &credentials.password_hash) {
            tracing::warn!(user_id = %user.id, "login failed: bad password");
            return Err(SwapError::Unauthorized("invalid password".into()));
        }

        let otp = generate_otp();
        credentials.otp = Some(otp.clone());
        credentials.otp_expires_at = Some(Utc::now() + self.otp_ttl);
        credentials.otp_attempts = 0;
        self.store
            .save_credentials(&credentials)
            .await
            .map_err(|e| e.entity("user"))?;

        self.deliver_otp(&user, &otp).await;
        Ok(LoginOutcome { user_id: user.id })
    }

    /// Consume a valid OTP, mark the user verified and return a session token.
    pub async fn verify_otp(&self, user_id: Uuid, otp: &str) -> Result<String> {
        let invalid = || SwapError::invalid("invalid or expired OTP");

        let mut credentials = match self.store.get_credentials(user_id).await {
            Ok(c) => c,
            Err(StoreError::NotFound) => return Err(invalid()),
            Err(e) => return Err(e.into()),
        };
        let valid = match (&credentials.otp, credentials.otp_expires_at) {
            (Some(expected), Some(expires_at)) => {
                expires_at > Utc::now() && otp_matches(expected, otp)
            }
            _ => false,
        };
        if !valid {
            if credentials.otp.is_some() {
                let attempts = self
                    .store
                    .record_otp_failure(user_id, MAX_OTP_ATTEMPTS)
                    .await?;
                if attempts >= MAX_OTP_ATTEMPTS {
                    tracing::warn!(user_id = %user_id, attempts, "OTP revoked after repeated failures");
                }
            }
            return Err(invalid());
        }

        credentials.otp = None;
        credentials.otp_expires_at = None;
        credentials.otp_attempts = 0;
        self.store.save_credentials(&credentials).await?;

        let mut user = self
            .store
            .get_user(user_id)
            .await
            .map_err(|e| e.entity("user"))?;
        if !user.is_verified {
            user.is_verified = true;
            user.updated_at = Utc::now();
            self.store.save_user(&user).await?;
        }

        self.tokens.issue(user_id)
    }

    async fn deliver_otp(&self, user: &User, otp: &str) {
        for destination in [&user.email, &user.mobile].into_iter().flatten() {
            if let Err(e) = self.sender.send(destination, otp).await {
                tracing::warn!(user_id = %user.id, error = %e, "failed to send OTP");
            }
        }
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
