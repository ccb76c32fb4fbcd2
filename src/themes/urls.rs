use std::convert::Infallible;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::HOST, request::Parts},
};
use lazy_static::lazy_static;
use url::Url;

use super::repo_types::Theme;
use crate::state::AppState;

/// Origin of the current request, e.g. `http://localhost:8001`, no trailing slash.
#[derive(Debug, Clone)]
pub struct BaseUrl(pub String);

fn first_header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for BaseUrl {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Infallible> {
        if let Some(base) = &state.config.public_base_url {
            return Ok(BaseUrl(base.trim_end_matches('/').to_string()));
        }
        let scheme = first_header(parts, "x-forwarded-proto")
            .or_else(|| parts.uri.scheme_str())
            .unwrap_or("http");
        let host = first_header(parts, "x-forwarded-host")
            .or_else(|| first_header(parts, HOST.as_str()))
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");
        Ok(BaseUrl(format!("{scheme}://{host}")))
    }
}

/// Path part of a stored file reference. Scheme, host, query and fragment
/// are dropped; relative references are anchored at `/`.
fn path_component(stored: &str) -> String {
    lazy_static! {
        static ref ANCHOR: Url = Url::parse("http://localhost/").unwrap();
    }
    match ANCHOR.join(stored) {
        Ok(u) => u.path().to_string(),
        Err(_) => stored.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// Re-anchors a stored file path on `base`. Empty stays empty.
pub fn rewrite_url(base: &str, stored: &str) -> String {
    if stored.is_empty() {
        return String::new();
    }
    format!("{}{}", base.trim_end_matches('/'), path_component(stored))
}

/// Applies [`rewrite_url`] to every file field of a theme.
pub fn rewrite_theme(mut theme: Theme, base: &str) -> Theme {
    theme.config = rewrite_url(base, &theme.config);
    theme.image_config = rewrite_url(base, &theme.image_config);
    theme.screenshot = rewrite_url(base, &theme.screenshot);
    theme
}
