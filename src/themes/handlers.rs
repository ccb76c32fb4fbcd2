use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::{PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use super::{
    dto::{IdQuery, ListThemesQuery, ThemeData, Upload},
    repo_types::{NewTheme, Theme},
    urls::{rewrite_theme, BaseUrl},
};
use crate::{
    auth::{AuthUser, Moderator},
    error::{ok, AppError, AppResult},
    state::AppState,
};

pub fn theme_routes() -> Router<AppState> {
    Router::new()
        .route("/themes", get(list_themes))
        .route("/themes/:id", get(get_theme))
        .route("/themes/create", post(create_theme))
        .route("/themes/approve", post(approve_theme))
        .route("/themes/delete", delete(delete_theme))
}

#[instrument(skip(state, base, query))]
pub async fn list_themes(
    State(state): State<AppState>,
    BaseUrl(base): BaseUrl,
    query: Result<Query<ListThemesQuery>, QueryRejection>,
) -> AppResult<Json<Vec<Theme>>> {
    let Query(query) = query?;
    let themes = state.store.list_themes(query.include_unapproved).await?;
    Ok(Json(
        themes
            .into_iter()
            .map(|t| rewrite_theme(t, &base))
            .collect(),
    ))
}

#[instrument(skip(state, base, id))]
pub async fn get_theme(
    State(state): State<AppState>,
    BaseUrl(base): BaseUrl,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Theme>> {
    let Path(id) = id?;
    let theme = state
        .store
        .find_theme(id)
        .await?
        .ok_or_else(|| AppError::not_found("Theme not found!"))?;
    Ok(Json(rewrite_theme(theme, &base)))
}

async fn read_upload(field: Field<'_>) -> AppResult<Option<Upload>> {
    let file_name = field.file_name().map(str::to_string);
    let content_type = field
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| "application/octet-stream".into());
    let body = field.bytes().await?;
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(Upload {
        file_name,
        content_type,
        body,
    }))
}

/// Best effort; the theme row is what matters.
async fn discard_blobs(state: &AppState, paths: &[String]) {
    for path in paths.iter().filter(|p| !p.is_empty()) {
        if let Err(e) = state.blobs.delete(path).await {
            warn!(error = %e, %path, "failed to remove blob");
        }
    }
}

async fn save_upload(state: &AppState, saved: &mut Vec<String>, upload: Upload) -> AppResult<String> {
    match state
        .blobs
        .save(upload.file_name.as_deref(), &upload.content_type, upload.body)
        .await
    {
        Ok(path) => {
            saved.push(path.clone());
            Ok(path)
        }
        Err(e) => {
            discard_blobs(state, saved).await;
            Err(AppError::Internal(e))
        }
    }
}

/// Multipart parts: `screenshot`, `config`, optional `imageConfig`, and `data` (JSON).
#[instrument(skip(state, me, base, mp), fields(user = %me.name))]
pub async fn create_theme(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    BaseUrl(base): BaseUrl,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<Theme>)> {
    let mut mp = mp?;
    let mut screenshot = None;
    let mut config = None;
    let mut image_config = None;
    let mut data = None;

    while let Some(field) = mp.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "screenshot" => screenshot = read_upload(field).await?,
            "config" => config = read_upload(field).await?,
            "imageConfig" => image_config = read_upload(field).await?,
            "data" => data = Some(field.text().await?),
            _ => debug!(field = %name, "ignoring multipart field"),
        }
    }

    let screenshot = screenshot.ok_or_else(|| AppError::bad_request("Screenshot missing!"))?;
    let config = config.ok_or_else(|| AppError::bad_request("No config provided!"))?;
    let data = data
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Data can't be empty!"))?;
    let data: ThemeData =
        serde_json::from_str(&data).map_err(|e| AppError::bad_request(e.to_string()))?;
    let title = data.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::bad_request("Title can't be empty!"));
    }

    let mut saved = Vec::with_capacity(3);
    let config = save_upload(&state, &mut saved, config).await?;
    let screenshot = save_upload(&state, &mut saved, screenshot).await?;
    let image_config = match image_config {
        Some(upload) => save_upload(&state, &mut saved, upload).await?,
        None => String::new(),
    };

    let new = NewTheme {
        title,
        username: me.name.clone(),
        config,
        screenshot,
        image_config,
        uploaded: OffsetDateTime::now_utc().unix_timestamp(),
    };
    let theme = match state.store.create_theme(new).await {
        Ok(t) => t,
        Err(e) => {
            discard_blobs(&state, &saved).await;
            return Err(e.into());
        }
    };

    info!(theme_id = theme.id, title = %theme.title, "theme created");
    Ok((StatusCode::CREATED, Json(rewrite_theme(theme, &base))))
}

#[instrument(skip(state, me, query), fields(moderator_id = me.id))]
pub async fn approve_theme(
    State(state): State<AppState>,
    Moderator(me): Moderator,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Query(query) = query?;
    let id = query.id.ok_or_else(|| AppError::bad_request("Missing id!"))?;

    if !state.store.approve_theme(id).await? {
        return Err(AppError::not_found("Theme not found!"));
    }

    info!(theme_id = id, "theme approved");
    Ok(ok())
}

/// Owner or moderator only.
#[instrument(skip(state, me, query), fields(user_id = me.id))]
pub async fn delete_theme(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Query(query) = query?;
    let id = query.id.ok_or_else(|| AppError::bad_request("Missing id!"))?;

    let theme = state
        .store
        .find_theme(id)
        .await?
        .ok_or_else(|| AppError::not_found("Theme not found!"))?;

    if theme.username != me.name && !me.is_moderator() {
        warn!(theme_id = id, owner = %theme.username, "theme delete denied");
        return Err(AppError::forbidden("No permissions to delete the theme!"));
    }

    if !state.store.delete_theme(id).await? {
        return Err(AppError::not_found("Theme not found!"));
    }
    if state.config.delete_blobs_with_theme {
        discard_blobs(&state, &[theme.config, theme.screenshot, theme.image_config]).await;
    }

    info!(theme_id = id, "theme deleted");
    Ok(ok())
}
