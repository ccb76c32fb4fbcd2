use std::path::PathBuf;

use anyhow::Context;
use axum::http::HeaderValue;
use serde::Deserialize;
use tracing::warn;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma separated list sent back as `Access-Control-Allow-Headers`.
    pub allow_headers: String,
    /// `*` or a comma separated list of origins.
    pub allow_origins: String,
}

impl CorsConfig {
    /// `None` means any origin. Entries that are not `http(s)://host[:port]`
    /// are skipped with a warning; a list with no usable entry is an error.
    pub fn origins(&self) -> anyhow::Result<Option<Vec<HeaderValue>>> {
        let raw = self.allow_origins.trim();
        if raw == "*" {
            return Ok(None);
        }
        let list: Vec<HeaderValue> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .filter_map(|o| match parse_origin(o) {
                Some(v) => Some(v),
                None => {
                    warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        if list.is_empty() {
            anyhow::bail!("CORS_ALLOW_ORIGINS has no valid origin: {raw:?}");
        }
        Ok(Some(list))
    }
}

fn parse_origin(origin: &str) -> Option<HeaderValue> {
    let url = Url::parse(origin).ok()?;
    let is_origin = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some()
        && url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none()
        && !origin.ends_with('/');
    if !is_origin {
        return None;
    }
    HeaderValue::from_str(origin).ok()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    pub files_dir: PathBuf,
    pub max_body_bytes: usize,
    pub cors: CorsConfig,
    /// Overrides the request derived origin used when rewriting file URLs.
    pub public_base_url: Option<String>,
    pub delete_blobs_with_theme: bool,
}

pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_CORS_ALLOW_HEADERS: &str = "Origin, Content-Type, Accept, Authorization";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "themehub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "themehub-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let cors = CorsConfig {
            allow_headers: std::env::var("CORS_ALLOW_HEADERS")
                .unwrap_or_else(|_| DEFAULT_CORS_ALLOW_HEADERS.into()),
            allow_origins: std::env::var("CORS_ALLOW_ORIGINS").unwrap_or_else(|_| "*".into()),
        };
        cors.origins()?;
        Ok(Self {
            database_url,
            jwt,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT", 8001),
            files_dir: std::env::var("FILES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./files")),
            max_body_bytes: env_parse("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            cors,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            delete_blobs_with_theme: env_parse("THEMES_DELETE_BLOBS", false),
        })
    }

    /// Config used by unit tests; no environment access.
    pub fn for_tests(files_dir: PathBuf) -> Self {
        Self {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            host: "127.0.0.1".into(),
            port: 0,
            files_dir,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            cors: CorsConfig {
                allow_headers: DEFAULT_CORS_ALLOW_HEADERS.into(),
                allow_origins: "*".into(),
            },
            public_base_url: None,
            delete_blobs_with_theme: false,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
