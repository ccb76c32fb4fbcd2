use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Theme record. File fields hold blob paths relative to the server root.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub id: i64,
    pub title: String,
    pub username: String, // owner, copy of users.name
    pub config: String,
    pub screenshot: String,
    pub image_config: String, // empty when not uploaded
    pub approved: bool,
    pub uploaded: i64, // unix seconds
}

#[derive(Debug, Clone)]
pub struct NewTheme {
    pub title: String,
    pub username: String,
    pub config: String,
    pub screenshot: String,
    pub image_config: String,
    pub uploaded: i64,
}

impl NewTheme {
    /// Every theme starts out unapproved.
    pub fn into_theme(self, id: i64) -> Theme {
        Theme {
            id,
            title: self.title,
            username: self.username,
            config: self.config,
            screenshot: self.screenshot,
            image_config: self.image_config,
            approved: false,
            uploaded: self.uploaded,
        }
    }
}
