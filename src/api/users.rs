use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use super::handlers::log_failure;
use super::{parse_id, AuthUser};
use crate::errors::Result;
use crate::models::user::{AvailabilitySlot, PublicProfile, User, Visibility};
use crate::query::{BrowseFilter, UserWithRelationship};
use crate::AppState;

#[derive(Deserialize)]
pub struct BrowseParams {
    pub filter: Option<String>,
}

#[derive(Deserialize)]
pub struct LocationBody {
    pub location: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoBody {
    pub photo_url: Option<String>,
}

#[derive(Deserialize)]
pub struct VisibilityBody {
    pub visibility: Visibility,
}

#[derive(Deserialize)]
pub struct AvailabilityBody {
    pub availability: Vec<AvailabilitySlot>,
}

#[derive(Deserialize)]
pub struct SkillBody {
    pub skill: String,
}

/// GET /api/v1/users/public
pub async fn list_public(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PublicProfile>>> {
    Ok(Json(state.users.list_public().await?))
}

/// GET /api/v1/users/browse?filter=all|pending|accepted|rejected|cancelled|any
pub async fn browse(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(params): Query<BrowseParams>,
) -> Result<Json<Vec<UserWithRelationship>>> {
    let filter: BrowseFilter = params.filter.as_deref().unwrap_or("all").parse()?;
    let users = state.queries.browse(user_id, filter).await.map_err(|e| {
        log_failure("browse", &e);
        e
    })?;
    Ok(Json(users))
}

/// GET /api/v1/users/me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<User>> {
    Ok(Json(state.users.get_profile(user_id, user_id).await?))
}

/// GET /api/v1/users/:id - contact details only via /users/me
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(viewer)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PublicProfile>> {
    let id = parse_id(&id, "user")?;
    let user = state.users.get_profile(id, viewer).await?;
    Ok(Json(user.into()))
}

/// PATCH /api/v1/users/me/location
pub async fn update_location(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<LocationBody>,
) -> Result<Json<User>> {
    Ok(Json(state.users.update_location(user_id, body.location).await?))
}

/// PATCH /api/v1/users/me/photo
pub async fn update_photo(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<PhotoBody>,
) -> Result<Json<User>> {
    Ok(Json(state.users.update_photo_url(user_id, body.photo_url).await?))
}

/// PATCH /api/v1/users/me/visibility
pub async fn update_visibility(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<VisibilityBody>,
) -> Result<Json<User>> {
    Ok(Json(
        state.users.update_visibility(user_id, body.visibility).await?,
    ))
}

/// PUT /api/v1/users/me/availability
pub async fn update_availability(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<AvailabilityBody>,
) -> Result<Json<User>> {
    Ok(Json(
        state
            .users
            .update_availability(user_id, body.availability)
            .await?,
    ))
}

/// POST /api/v1/users/me/skills-offered
pub async fn add_skill_offered(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<SkillBody>,
) -> Result<Json<User>> {
    Ok(Json(state.users.add_skill_offered(user_id, &body.skill).await?))
}

/// DELETE /api/v1/users/me/skills-offered/:skill
pub async fn remove_skill_offered(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(skill): Path<String>,
) -> Result<Json<User>> {
    Ok(Json(state.users.remove_skill_offered(user_id, &skill).await?))
}

/// POST /api/v1/users/me/skills-wanted
pub async fn add_skill_wanted(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<SkillBody>,
) -> Result<Json<User>> {
    Ok(Json(state.users.add_skill_wanted(user_id, &body.skill).await?))
}

/// DELETE /api/v1/users/me/skills-wanted/:skill
pub async fn remove_skill_wanted(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(skill): Path<String>,
) -> Result<Json<User>> {
    Ok(Json(state.users.remove_skill_wanted(user_id, &skill).await?))
}
