use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Store, StoreError, StoreResult};
use crate::themes::repo_types::{NewTheme, Theme};
use crate::users::repo_types::{NewUser, Role, User, UserChanges};

/// Process-local store. Same contract as `PgStore`, including the unique
/// user name constraint and names held by themes of deleted users.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    themes: BTreeMap<i64, Theme>,
    last_user_id: i64,
    last_theme_id: i64,
}

impl Tables {
    /// A name is in use while a user carries it or any theme is filed under it.
    /// `except` is the user being renamed; keeping its own name is allowed.
    fn name_in_use(&self, name: &str, except: Option<i64>) -> bool {
        let own = except.and_then(|id| self.users.get(&id));
        if own.is_some_and(|u| u.name == name) {
            return false;
        }
        self.users.values().any(|u| u.name == name)
            || self.themes.values().any(|th| th.username == name)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.inner.read().await.users.values().cloned().collect())
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        let t = self.inner.read().await;
        Ok(t.users.values().find(|u| u.name == name).cloned())
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut t = self.inner.write().await;
        if t.name_in_use(&new.name, None) {
            return Err(StoreError::Conflict);
        }
        t.last_user_id += 1;
        let user = User {
            id: t.last_user_id,
            name: new.name,
            password_hash: new.password_hash,
            role: new.role,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut t = self.inner.write().await;
        if let Some(name) = &changes.name {
            if t.name_in_use(name, Some(id)) {
                return Err(StoreError::Conflict);
            }
        }
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(None);
        };
        let old_name = user.name.clone();
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        let updated = user.clone();

        if updated.name != old_name {
            for theme in t.themes.values_mut().filter(|th| th.username == old_name) {
                theme.username = updated.name.clone();
            }
        }
        Ok(Some(updated))
    }

    async fn set_role(&self, id: i64, role: Role) -> StoreResult<bool> {
        let mut t = self.inner.write().await;
        match t.users.get_mut(&id) {
            Some(user) => {
                user.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        Ok(self.inner.write().await.users.remove(&id).is_some())
    }

    async fn list_themes(&self, include_unapproved: bool) -> StoreResult<Vec<Theme>> {
        let t = self.inner.read().await;
        Ok(t.themes
            .values()
            .filter(|th| include_unapproved || th.approved)
            .cloned()
            .collect())
    }

    async fn find_theme(&self, id: i64) -> StoreResult<Option<Theme>> {
        Ok(self.inner.read().await.themes.get(&id).cloned())
    }

    async fn create_theme(&self, new: NewTheme) -> StoreResult<Theme> {
        let mut t = self.inner.write().await;
        t.last_theme_id += 1;
        let theme = new.into_theme(t.last_theme_id);
        t.themes.insert(theme.id, theme.clone());
        Ok(theme)
    }

    async fn approve_theme(&self, id: i64) -> StoreResult<bool> {
        let mut t = self.inner.write().await;
        match t.themes.get_mut(&id) {
            Some(theme) => {
                theme.approved = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_theme(&self, id: i64) -> StoreResult<bool> {
        Ok(self.inner.write().await.themes.remove(&id).is_some())
    }
}
