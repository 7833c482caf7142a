use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A proposal to exchange one of the sender's offered skills for one of the
/// recipient's wanted skills.
///
/// Display fields (`*_user_name`, `*_user_avatar`) are copied from the user
/// directory when the request is created and are never refreshed afterwards,
/// so they can go stale if a participant later edits their profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub from_user_name: String,
    pub from_user_avatar: Option<String>,
    pub to_user_id: Uuid,
    pub to_user_name: String,
    pub to_user_avatar: Option<String>,
    pub offered_skill: String,
    pub wanted_skill: String,
    pub message: String,
    pub status: SwapStatus,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SwapRequest {
    /// Whether `user_id` is the sender or the recipient.
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.from_user_id == user_id || self.to_user_id == user_id
    }

    /// The other participant, seen from `user_id`.
    pub fn counterpart_of(&self, user_id: Uuid) -> Uuid {
        if user_id == self.from_user_id {
            self.to_user_id
        } else {
            self.from_user_id
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Pending => "pending",
            SwapStatus::Accepted => "accepted",
            SwapStatus::Rejected => "rejected",
            SwapStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SwapStatus::Pending)
    }

    /// Only `pending` has outgoing edges; every terminal state is final.
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        matches!(
            (self, next),
            (
                SwapStatus::Pending,
                SwapStatus::Accepted | SwapStatus::Rejected | SwapStatus::Cancelled
            )
        )
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(SwapStatus::Pending),
            "accepted" | "accept" => Ok(SwapStatus::Accepted),
            "rejected" | "reject" => Ok(SwapStatus::Rejected),
            "cancelled" | "canceled" | "cancel" => Ok(SwapStatus::Cancelled),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// Conditional status update applied by the store.
///
/// The store only applies the patch when the stored status still equals
/// `from`, which makes concurrent transitions on the same request race-free.
#[derive(Debug, Clone)]
pub struct StatusPatch {
    pub from: SwapStatus,
    pub to: SwapStatus,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// Which side of a request the viewing user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    Sent,
    Received,
    None,
}

/// Request state between the viewing user and another user.
#[derive(Debug, Clone, Serialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    pub status: Option<SwapStatus>,
    pub request: Option<SwapRequest>,
}

impl Relationship {
    pub fn none() -> Self {
        Self {
            kind: RelationshipKind::None,
            status: None,
            request: None,
        }
    }

    pub fn from_request(kind: RelationshipKind, request: SwapRequest) -> Self {
        Self {
            kind,
            status: Some(request.status),
            request: Some(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_can_transition() {
        let all = [
            SwapStatus::Pending,
            SwapStatus::Accepted,
            SwapStatus::Rejected,
            SwapStatus::Cancelled,
        ];
        for next in all {
            let expected = next != SwapStatus::Pending;
            assert_eq!(SwapStatus::Pending.can_transition_to(next), expected);
        }
        for terminal in &all[1..] {
            assert!(terminal.is_terminal());
            for next in all {
                assert!(
                    !terminal.can_transition_to(next),
                    "{} must not move to {}",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn test_status_parses_verbs_and_spellings() {
        assert_eq!("accept".parse::<SwapStatus>().unwrap(), SwapStatus::Accepted);
        assert_eq!("Rejected".parse::<SwapStatus>().unwrap(), SwapStatus::Rejected);
        assert_eq!("canceled".parse::<SwapStatus>().unwrap(), SwapStatus::Cancelled);
        assert!("done".parse::<SwapStatus>().is_err());
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let now = Utc::now();
        let req = SwapRequest {
            id: Uuid::new_v4(),
            from_user_id: Uuid::new_v4(),
            from_user_name: "Ann".into(),
            from_user_avatar: None,
            to_user_id: Uuid::new_v4(),
            to_user_name: "Bob".into(),
            to_user_avatar: None,
            offered_skill: "Photoshop".into(),
            wanted_skill: "Python".into(),
            message: "hi".into(),
            status: SwapStatus::Pending,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["offeredSkill"], "Photoshop");
        assert_eq!(json["status"], "pending");
        assert!(json.get("fromUserId").is_some());
    }

    #[test]
    fn test_counterpart() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let now = Utc::now();
        let req = SwapRequest {
            id: Uuid::new_v4(),
            from_user_id: a,
            from_user_name: String::new(),
            from_user_avatar: None,
            to_user_id: b,
            to_user_name: String::new(),
            to_user_avatar: None,
            offered_skill: "x".into(),
            wanted_skill: "y".into(),
            message: String::new(),
            status: SwapStatus::Pending,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(req.counterpart_of(a), b);
        assert_eq!(req.counterpart_of(b), a);
        assert!(req.involves(a) && req.involves(b));
        assert!(!req.involves(Uuid::new_v4()));
    }
}
