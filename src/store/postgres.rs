use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::{Store, StoreError, StoreResult};
use crate::themes::repo_types::{NewTheme, Theme};
use crate::users::repo_types::{NewUser, Role, User, UserChanges, UserRow};

const THEME_COLUMNS: &str =
    "id, title, username, config, screenshot, image_config, approved, uploaded";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, password_hash, role
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, name, password_hash, role FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, name, password_hash, role FROM users WHERE name = $1"#,
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        // no row back means themes are still filed under this name
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, password_hash, role)
            SELECT $1, $2, $3
             WHERE NOT EXISTS (SELECT 1 FROM themes WHERE username = $1)
            RETURNING id, name, password_hash, role
            "#,
        )
        .bind(&new.name)
        .bind(&new.password_hash)
        .bind(new.role.level())
        .fetch_optional(&self.db)
        .await?;
        row.map(User::from).ok_or(StoreError::Conflict)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let current = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, name, password_hash, role FROM users WHERE id = $1 FOR UPDATE"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = current else {
            return Ok(None);
        };

        if let Some(name) = changes.name.as_deref().filter(|n| *n != current.name) {
            let (held,): (bool,) =
                sqlx::query_as(r#"SELECT EXISTS (SELECT 1 FROM themes WHERE username = $1)"#)
                    .bind(name)
                    .fetch_one(&mut *tx)
                    .await?;
            if held {
                return Err(StoreError::Conflict);
            }
        }

        let updated = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   password_hash = COALESCE($3, password_hash)
             WHERE id = $1
            RETURNING id, name, password_hash, role
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.password_hash.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        if updated.name != current.name {
            sqlx::query(r#"UPDATE themes SET username = $1 WHERE username = $2"#)
                .bind(&updated.name)
                .bind(&current.name)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await.context("commit tx")?;
        Ok(Some(updated.into()))
    }

    async fn set_role(&self, id: i64, role: Role) -> StoreResult<bool> {
        let res = sqlx::query(r#"UPDATE users SET role = $2 WHERE id = $1"#)
            .bind(id)
            .bind(role.level())
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let res = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_themes(&self, include_unapproved: bool) -> StoreResult<Vec<Theme>> {
        // $1 = true lists every row
        let sql = format!(
            "SELECT {THEME_COLUMNS} FROM themes WHERE ($1 OR approved) ORDER BY id"
        );
        let rows = sqlx::query_as::<_, Theme>(&sql)
            .bind(include_unapproved)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn find_theme(&self, id: i64) -> StoreResult<Option<Theme>> {
        let sql = format!("SELECT {THEME_COLUMNS} FROM themes WHERE id = $1");
        let row = sqlx::query_as::<_, Theme>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn create_theme(&self, new: NewTheme) -> StoreResult<Theme> {
        let sql = format!(
            r#"
            INSERT INTO themes (title, username, config, screenshot, image_config, approved, uploaded)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6)
            RETURNING {THEME_COLUMNS}
            "#
        );
        let theme = sqlx::query_as::<_, Theme>(&sql)
            .bind(&new.title)
            .bind(&new.username)
            .bind(&new.config)
            .bind(&new.screenshot)
            .bind(&new.image_config)
            .bind(new.uploaded)
            .fetch_one(&self.db)
            .await?;
        Ok(theme)
    }

    async fn approve_theme(&self, id: i64) -> StoreResult<bool> {
        let res = sqlx::query(r#"UPDATE themes SET approved = TRUE WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_theme(&self, id: i64) -> StoreResult<bool> {
        let res = sqlx::query(r#"DELETE FROM themes WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
