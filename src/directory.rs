//! User directory: profile reads and self-service profile edits.
//!
//! Edits go through [`UserDirectory::modify`], which loads the profile,
//! applies a closure and saves it back.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::{Result, SwapError};
use crate::models::user::{AvailabilitySlot, PublicProfile, User, Visibility};
use crate::store::{Store, UserStore};

const MAX_SKILL_LEN: usize = 100;

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn Store>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Private profiles are only visible to their owner.
    pub async fn get_profile(&self, user_id: Uuid, viewer: Uuid) -> Result<User> {
        let user = self
            .store
            .get_user(user_id)
            .await
            .map_err(|e| e.entity("user"))?;
        if !user.is_public() && user.id != viewer {
            return Err(SwapError::NotFound("user"));
        }
        Ok(user)
    }

    /// Verified public users, without contact details.
    pub async fn list_public(&self) -> Result<Vec<PublicProfile>> {
        let users = self.store.list_public_users().await?;
        Ok(users.into_iter().map(PublicProfile::from).collect())
    }

    async fn modify<F>(&self, user_id: Uuid, f: F) -> Result<User>
    where
        F: FnOnce(&mut User) -> Result<()>,
    {
        let mut user = self
            .store
            .get_user(user_id)
            .await
            .map_err(|e| e.entity("user"))?;
        f(&mut user)?;
        user.updated_at = Utc::now();
        self.store
            .save_user(&user)
            .await
            .map_err(|e| e.entity("user"))?;
        Ok(user)
    }

    pub async fn update_location(&self, user_id: Uuid, location: Option<String>) -> Result<User> {
        self.modify(user_id, |u| {
            u.location = non_blank(location);
            Ok(())
        })
        .await
    }

    pub async fn update_photo_url(&self, user_id: Uuid, photo_url: Option<String>) -> Result<User> {
        self.modify(user_id, |u| {
            u.photo_url = non_blank(photo_url);
            Ok(())
        })
        .await
    }

    pub async fn update_visibility(&self, user_id: Uuid, visibility: Visibility) -> Result<User> {
        self.modify(user_id, |u| {
            u.visibility = visibility;
            Ok(())
        })
        .await
    }

    pub async fn update_availability(
        &self,
        user_id: Uuid,
        availability: Vec<AvailabilitySlot>,
    ) -> Result<User> {
        self.modify(user_id, |u| {
            u.availability = availability;
            Ok(())
        })
        .await
    }

    /// No-op when the skill is already offered.
    pub async fn add_skill_offered(&self, user_id: Uuid, skill: &str) -> Result<User> {
        let skill = validate_skill(skill)?;
        self.modify(user_id, |u| {
            u.add_skill_offered(skill);
            Ok(())
        })
        .await
    }

    pub async fn remove_skill_offered(&self, user_id: Uuid, skill: &str) -> Result<User> {
        self.modify(user_id, |u| {
            if u.remove_skill_offered(skill) {
                Ok(())
            } else {
                Err(SwapError::NotFound("offered skill"))
            }
        })
        .await
    }

    pub async fn add_skill_wanted(&self, user_id: Uuid, skill: &str) -> Result<User> {
        let skill = validate_skill(skill)?;
        self.modify(user_id, |u| {
            u.add_skill_wanted(skill);
            Ok(())
        })
        .await
    }

    pub async fn remove_skill_wanted(&self, user_id: Uuid, skill: &str) -> Result<User> {
        self.modify(user_id, |u| {
            if u.remove_skill_wanted(skill) {
                Ok(())
            } else {
                Err(SwapError::NotFound("wanted skill"))
            }
        })
        .await
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_skill(skill: &str) -> Result<&str> {
    let skill = skill.trim();
    if skill.is_empty() {
        return Err(SwapError::invalid("skill is required"));
    }
    if skill.chars().count() > MAX_SKILL_LEN {
        return Err(SwapError::invalid(format!(
            "skill must be at most {} characters",
            MAX_SKILL_LEN
        )));
    }
    Ok(skill)
}
