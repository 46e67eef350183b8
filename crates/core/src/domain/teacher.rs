use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Teacher,
    Hod,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeacherStatus {
    Active,
    Inactive,
}

/// A staff directory row. The engine only reads these; accounts are
/// provisioned by the out-of-scope identity collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: TeacherStatus,
}

/// Authenticated caller identity, supplied by the session collaborator and
/// trusted as authoritative at every engine entry point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self { user_id: UserId(user_id.into()), role }
    }
}
