use serde::{Deserialize, Serialize};

use crate::db;

pub use crate::db::user::{Id, Role};

/// Identity projection handed to callers. Never carries the password.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub name: String,
    pub username: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

impl From<db::User> for User {
    fn from(user: db::User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            role: user.role,
            avatar_url: user.avatar_url,
        }
    }
}
