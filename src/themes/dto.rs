use bytes::Bytes;
use serde::Deserialize;

/// `GET /themes` query. `unapproved` is the older spelling of the flag.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListThemesQuery {
    #[serde(default, alias = "unapproved")]
    pub include_unapproved: bool,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<i64>,
}

/// JSON carried in the `data` multipart field.
#[derive(Debug, Deserialize)]
pub struct ThemeData {
    #[serde(default)]
    pub title: String,
}

/// One uploaded file part, fully buffered.
#[derive(Debug)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub body: Bytes,
}
