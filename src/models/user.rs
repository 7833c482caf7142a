//! User profiles as kept by the user directory.
//!
//! Secrets (password hash, pending OTP) live in [`Credentials`] so that a
//! `User` can always be serialized straight into an API response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub is_verified: bool,
    pub location: Option<String>,
    pub photo_url: Option<String>,
    pub visibility: Visibility,
    pub skills_offered: Vec<OfferedSkill>,
    pub skills_wanted: Vec<String>,
    pub availability: Vec<AvailabilitySlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: &str, email: Option<String>, mobile: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email,
            mobile,
            is_verified: false,
            location: None,
            photo_url: None,
            visibility: Visibility::Public,
            skills_offered: Vec::new(),
            skills_wanted: Vec::new(),
            availability: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Returns false when the skill was already offered.
    pub fn add_skill_offered(&mut self, skill: &str) -> bool {
        if self.offers(skill) {
            return false;
        }
        self.skills_offered.push(OfferedSkill::new(skill));
        true
    }

    pub fn remove_skill_offered(&mut self, skill: &str) -> bool {
        let before = self.skills_offered.len();
        self.skills_offered
            .retain(|s| !s.skill.eq_ignore_ascii_case(skill.trim()));
        before != self.skills_offered.len()
    }

    /// Returns false when the skill was already wanted.
    pub fn add_skill_wanted(&mut self, skill: &str) -> bool {
        if self.wants(skill) {
            return false;
        }
        self.skills_wanted.push(skill.trim().to_string());
        true
    }

    pub fn remove_skill_wanted(&mut self, skill: &str) -> bool {
        let before = self.skills_wanted.len();
        self.skills_wanted
            .retain(|s| !s.eq_ignore_ascii_case(skill.trim()));
        before != self.skills_wanted.len()
    }

    pub fn offers(&self, skill: &str) -> bool {
        self.skills_offered
            .iter()
            .any(|s| s.skill.eq_ignore_ascii_case(skill.trim()))
    }

    pub fn wants(&self, skill: &str) -> bool {
        self.skills_wanted
            .iter()
            .any(|s| s.eq_ignore_ascii_case(skill.trim()))
    }
}

/// What other users see of a profile: no contact details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub photo_url: Option<String>,
    pub skills_offered: Vec<OfferedSkill>,
    pub skills_wanted: Vec<String>,
    pub availability: Vec<AvailabilitySlot>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            location: user.location,
            photo_url: user.photo_url,
            skills_offered: user.skills_offered,
            skills_wanted: user.skills_wanted,
            availability: user.availability,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferedSkill {
    pub skill: String,
    pub badge: Badge,
    pub verified_at: Option<DateTime<Utc>>,
    /// Set in the future after a failed skill test.
    pub test_cooldown_until: Option<DateTime<Utc>>,
}

impl OfferedSkill {
    pub fn new(skill: &str) -> Self {
        Self {
            skill: skill.trim().to_string(),
            badge: Badge::None,
            verified_at: None,
            test_cooldown_until: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Gold,
    Silver,
    Bronze,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub slot: SlotKind,
    /// Free text, e.g. "Mon-Fri 5-7PM".
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Weekdays,
    Weekends,
    Evenings,
    Mornings,
    Custom,
}

/// Login secrets for a user. Never serialized into API responses.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: Uuid,
    pub password_hash: String,
    pub otp: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    /// Wrong guesses against the current `otp`.
    pub otp_attempts: i32,
}
