use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::handlers::log_failure;
use super::parse_id;
use crate::auth::RegisterInput;
use crate::errors::Result;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpBody {
    pub user_id: String,
    pub otp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpSentResponse {
    pub message: &'static str,
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub message: &'static str,
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterInput>,
) -> Result<Json<OtpSentResponse>> {
    let outcome = state.auth.register(body).await.map_err(|e| {
        log_failure("register", &e);
        e
    })?;
    Ok(Json(OtpSentResponse {
        message: "OTP sent",
        user_id: outcome.user_id,
    }))
}

/// POST /api/v1/auth/login - checks the password and sends a fresh OTP
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginBody>,
) -> Result<Json<OtpSentResponse>> {
    let outcome = state
        .auth
        .login(body.email.as_deref(), body.mobile.as_deref(), &body.password)
        .await
        .map_err(|e| {
            log_failure("login", &e);
            e
        })?;
    Ok(Json(OtpSentResponse {
        message: "OTP sent",
        user_id: outcome.user_id,
    }))
}

/// POST /api/v1/auth/verify-otp
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyOtpBody>,
) -> Result<Json<SessionResponse>> {
    let user_id = parse_id(&body.user_id, "user")?;
    let token = state.auth.verify_otp(user_id, &body.otp).await?;
    Ok(Json(SessionResponse {
        token,
        message: "Login successful",
    }))
}
