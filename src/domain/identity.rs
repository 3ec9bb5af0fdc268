//! Participant identity and role.

use serde::{Deserialize, Serialize};

/// Role of a workspace participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Anonymous,
}

impl Role {
    /// Drives the `is_teacher` flag on authored messages
    pub fn is_teacher(&self) -> bool {
        matches!(self, Self::Teacher)
    }
}

/// A resolved participant identity, used to stamp outgoing messages.
///
/// Resolved once per client session and cached by the
/// [`IdentityResolver`](crate::identity::IdentityResolver); destroyed only
/// by an explicit reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantIdentity {
    /// Member identifier within the workspace
    pub member_id: String,

    /// Participant role
    pub role: Role,

    /// Human-readable label shown next to messages
    pub display_label: String,
}
