/// Database row types for all tables.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.

/// Participant record in the participants table.
/// A participant is a user, a case manager, or an admin acting as one.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub assigned_case_manager: Option<String>,
    pub created_at: String,
}

/// Participant role. Admins may act as case managers for messaging purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    CaseManager,
    Admin,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "case_manager" => Some(Self::CaseManager),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::CaseManager => "case_manager",
            Self::Admin => "admin",
        }
    }

    /// Whether this role sits on the case-manager side of a conversation.
    pub fn is_case_manager_side(&self) -> bool {
        matches!(self, Self::CaseManager | Self::Admin)
    }
}

/// Message record in the messages table.
/// Immutable once created except for the read flag (unread -> read, one-way).
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub is_from_case_manager: bool,
    pub read: bool,
    /// Unix milliseconds
    pub created_at: i64,
}
