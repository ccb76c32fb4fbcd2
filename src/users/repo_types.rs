use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Permission level of a user. Persisted as an integer column.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Regular,
    Moderator,
}

impl Role {
    /// Any positive level counts as elevated.
    pub fn from_level(level: i32) -> Self {
        if level > 0 {
            Role::Moderator
        } else {
            Role::Regular
        }
    }

    pub fn level(self) -> i32 {
        match self {
            Role::Regular => 0,
            Role::Moderator => 1,
        }
    }

    pub fn is_moderator(self) -> bool {
        self == Role::Moderator
    }
}

/// User record as handed out by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String, // argon2 PHC string, never exposed in JSON
    pub role: Role,
}

/// Raw `users` row; the role column is a plain integer.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub password_hash: String,
    pub role: i32,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            password_hash: r.password_hash,
            role: Role::from_level(r.role),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

/// Profile fields a user may change on their own record.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.password_hash.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_positive_level_is_moderator() {
        assert_eq!(Role::from_level(0), Role::Regular);
        assert_eq!(Role::from_level(-3), Role::Regular);
        assert_eq!(Role::from_level(1), Role::Moderator);
        assert_eq!(Role::from_level(7), Role::Moderator);
        assert_eq!(Role::Moderator.level(), 1);
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let user = User {
            id: 4,
            name: "alice".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Moderator,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["name"], "alice");
        assert_eq!(json["role"], "moderator");
        assert!(json.get("password_hash").is_none());
    }
}
