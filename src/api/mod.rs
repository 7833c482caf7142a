use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Router,
};
use uuid::Uuid;

use crate::errors::SwapError;
use crate::AppState;

pub mod auth;
pub mod handlers;
pub mod users;

/// The authenticated caller, inserted by [`require_user`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// Build the public API router.
/// Routes are relative; the caller mounts this under `/api/v1`.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-otp", post(auth::verify_otp));

    let protected = Router::new()
        // Users
        .route("/users/public", get(users::list_public))
        .route("/users/browse", get(users::browse))
        .route("/users/me", get(users::get_me))
        .route("/users/me/location", patch(users::update_location))
        .route("/users/me/photo", patch(users::update_photo))
        .route("/users/me/visibility", patch(users::update_visibility))
        .route("/users/me/availability", put(users::update_availability))
        .route("/users/me/skills-offered", post(users::add_skill_offered))
        .route(
            "/users/me/skills-offered/:skill",
            delete(users::remove_skill_offered),
        )
        .route("/users/me/skills-wanted", post(users::add_skill_wanted))
        .route(
            "/users/me/skills-wanted/:skill",
            delete(users::remove_skill_wanted),
        )
        .route("/users/:id", get(users::get_user))
        // Swap requests
        .route(
            "/requests",
            get(handlers::list_requests).post(handlers::create_request),
        )
        .route(
            "/requests/:id",
            get(handlers::get_request).delete(handlers::delete_request),
        )
        .route("/requests/:id/accept", post(handlers::accept_request))
        .route("/requests/:id/reject", post(handlers::reject_request))
        .route("/requests/:id/cancel", post(handlers::cancel_request))
        .route(
            "/relationships/:other_user_id",
            get(handlers::get_relationship),
        )
        // Notifications
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/unread",
            get(handlers::count_unread_notifications),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
        .route(
            "/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
        .route(
            "/notifications/:id",
            delete(handlers::delete_notification),
        )
        .layer(middleware::from_fn_with_state(state, require_user));

    public.merge(protected).fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: validates the `Authorization: Bearer <jwt>` session token and
/// attaches the caller as an [`AuthUser`] extension.
async fn require_user(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim());

    let Some(token) = token else {
        tracing::warn!("api: missing bearer token");
        return SwapError::Unauthorized("missing bearer token".into()).into_response();
    };

    match state.auth.tokens().verify(token) {
        Ok(user_id) => {
            req.extensions_mut().insert(AuthUser(user_id));
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Parse a path id, answering 400 on garbage.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, SwapError> {
    Uuid::parse_str(raw).map_err(|_| {
        tracing::warn!("invalid {} id: {}", what, raw);
        SwapError::invalid(format!("invalid {} id", what))
    })
}
