use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque user identifier issued by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a user. Carries only the id; two refs are the same user
/// when their ids are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
}

impl UserRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: UserId::new(id) }
    }
}

impl From<UserId> for UserRef {
    fn from(id: UserId) -> Self {
        Self { id }
    }
}
