use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRef, Query, State,
    },
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{
        is_valid_name, AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, TargetQuery,
        UpdateUserRequest,
    },
    repo_types::{NewUser, Role, User, UserChanges},
};
use crate::{
    auth::{
        password::{check_password_rules, hash_password, verify_password},
        AuthUser, JwtKeys, Moderator,
    },
    error::{ok, AppError, AppResult},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(get_users))
        .route("/users/account", get(get_account))
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/refresh", post(refresh))
        .route("/users/update", patch(update_user))
        .route("/users/promote", post(promote_user))
        .route("/users/delete", delete(delete_user))
}

#[instrument(skip(state))]
pub async fn get_users(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    let users = state.store.list_users().await?;
    Ok(Json(users))
}

#[instrument(skip(state, me), fields(user_id = me.id))]
pub async fn get_account(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<User>> {
    let user = state
        .store
        .find_user(me.id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<User>)> {
    let Json(payload) = payload?;
    let name = payload.name.trim().to_string();

    if !is_valid_name(&name) {
        warn!(name = %name, "invalid name");
        return Err(AppError::bad_request("Invalid name!"));
    }
    check_password_rules(&payload.password).map_err(AppError::bad_request)?;

    if state.store.find_user_by_name(&name).await?.is_some() {
        warn!(name = %name, "name already registered");
        return Err(AppError::Conflict("User already exists!".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .store
        .create_user(NewUser {
            name,
            password_hash,
            role: Role::Regular,
        })
        .await?;

    info!(user_id = user.id, name = %user.name, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(payload) = payload?;
    let name = payload.name.trim();

    let user = match state.store.find_user_by_name(name).await? {
        Some(u) => u,
        None => {
            warn!(name = %name, "login unknown name");
            return Err(AppError::unauthorized("Invalid credentials"));
        }
    };

    let ok = match verify_password(&payload.password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, user_id = user.id, "verify_password failed");
            return Err(AppError::Internal(e));
        }
    };
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let pair = JwtKeys::from_ref(&state).sign_pair(user.id)?;
    info!(user_id = user.id, name = %user.name, "user logged in");
    Ok(Json(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(payload) = payload?;
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::unauthorized(e.to_string()))?;

    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    let pair = keys.sign_pair(user.id)?;
    Ok(Json(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user,
    }))
}

#[instrument(skip(state, me, payload), fields(user_id = me.id))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> AppResult<Json<User>> {
    let Json(payload) = payload?;
    let mut changes = UserChanges::default();

    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if !is_valid_name(&name) {
            return Err(AppError::bad_request("Invalid name!"));
        }
        if name != me.name {
            changes.name = Some(name);
        }
    }
    if let Some(password) = payload.password {
        check_password_rules(&password).map_err(AppError::bad_request)?;
        changes.password_hash = Some(hash_password(&password)?);
    }
    if changes.is_empty() {
        return Err(AppError::bad_request("Nothing to update!"));
    }

    let user = state
        .store
        .update_user(me.id, changes)
        .await?
        .ok_or_else(|| AppError::not_found("User not found!"))?;

    info!(name = %user.name, "user updated");
    Ok(Json(user))
}

#[instrument(skip(state, me, query), fields(moderator_id = me.id))]
pub async fn promote_user(
    State(state): State<AppState>,
    Moderator(me): Moderator,
    query: Result<Query<TargetQuery>, QueryRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Query(query) = query?;
    let id = query.id.ok_or_else(|| AppError::bad_request("Missing id!"))?;

    if !state.store.set_role(id, Role::Moderator).await? {
        return Err(AppError::not_found("User not found!"));
    }

    info!(target_id = id, "user promoted");
    Ok(ok())
}

/// Deletes the caller, or with `?id=` another user (moderators only).
#[instrument(skip(state, me, query), fields(user_id = me.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(me): AuthUser,
    query: Result<Query<TargetQuery>, QueryRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Query(query) = query?;
    let target = query.id.unwrap_or(me.id);

    if target != me.id && !me.is_moderator() {
        warn!(target_id = target, "delete of another user denied");
        return Err(AppError::forbidden("No permissions!"));
    }
    if !state.store.delete_user(target).await? {
        return Err(AppError::not_found("User not found!"));
    }

    info!(target_id = target, "user deleted");
    Ok(ok())
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::test_support::{json_request, request, TestApp};
    use crate::users::repo_types::Role;

    fn creds(name: &str, password: &str) -> serde_json::Value {
        json!({ "name": name, "password": password })
    }

    #[tokio::test]
    async fn register_creates_regular_user() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(json_request(Method::POST, "/users/register", None, creds("  alice ", "password123")))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "alice");
        assert_eq!(body["role"], "regular");
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_fails_and_keeps_first_user() {
        let app = TestApp::new().await;
        let (status, first) = app
            .send(json_request(Method::POST, "/users/register", None, creds("alice", "password123")))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app
            .send(json_request(Method::POST, "/users/register", None, creds("alice", "otherpass99")))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "User already exists!");

        let (status, _) = app
            .send(json_request(Method::POST, "/users/login", None, creds("alice", "password123")))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, users) = app.send(request(Method::GET, "/users", None)).await;
        assert_eq!(users.as_array().unwrap().len(), 1);
        assert_eq!(users[0]["id"], first["id"]);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let app = TestApp::new().await;
        let (status, body) = app
            .send(json_request(Method::POST, "/users/register", None, creds("", "password123")))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid name!");

        let (status, body) = app
            .send(json_request(Method::POST, "/users/register", None, creds("bob", "short")))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Password too short!");

        let (status, _) = app
            .send(json_request(Method::POST, "/users/register", None, json!({ "name": "bob" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_issues_working_credential() {
        let app = TestApp::new().await;
        app.user("alice", Role::Regular).await;

        let (status, body) = app
            .send(json_request(Method::POST, "/users/login", None, creds("alice", "password123")))
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap().to_string();
        assert!(body["refresh_token"].as_str().is_some());

        let (status, me) = app
            .send(request(Method::GET, "/users/account", Some(&token)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["name"], "alice");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let app = TestApp::new().await;
        app.user("alice", Role::Regular).await;

        for payload in [creds("alice", "wrongpass1"), creds("nobody", "password123")] {
            let (status, body) = app
                .send(json_request(Method::POST, "/users/login", None, payload))
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "Invalid credentials");
        }
    }

    #[tokio::test]
    async fn refresh_returns_new_pair() {
        let app = TestApp::new().await;
        app.user("alice", Role::Regular).await;
        let (_, login) = app
            .send(json_request(Method::POST, "/users/login", None, creds("alice", "password123")))
            .await;

        let (status, body) = app
            .send(json_request(
                Method::POST,
                "/users/refresh",
                None,
                json!({ "refresh_token": login["refresh_token"] }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "alice");

        let (status, _) = app
            .send(json_request(
                Method::POST,
                "/users/refresh",
                None,
                json!({ "refresh_token": login["access_token"] }),
            ))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_routes_always_answer_401_without_credential() {
        let app = TestApp::new().await;
        for (method, uri) in [
            (Method::GET, "/users/account"),
            (Method::PATCH, "/users/update"),
            (Method::POST, "/users/promote?id=1"),
            (Method::DELETE, "/users/delete"),
        ] {
            let (status, body) = app.send(request(method, uri, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }

        let (status, _) = app
            .send(request(Method::GET, "/users/account", Some("garbage")))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn update_changes_own_profile() {
        let app = TestApp::new().await;
        let (_, token) = app.user("alice", Role::Regular).await;

        let (status, body) = app
            .send(json_request(
                Method::PATCH,
                "/users/update",
                Some(&token),
                json!({ "name": "alicia", "password": "newpassword1" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "alicia");

        let (status, _) = app
            .send(json_request(Method::POST, "/users/login", None, creds("alicia", "newpassword1")))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .send(json_request(Method::PATCH, "/users/update", Some(&token), json!({})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Nothing to update!");
    }

    #[tokio::test]
    async fn update_to_taken_name_conflicts() {
        let app = TestApp::new().await;
        let (_, token) = app.user("alice", Role::Regular).await;
        app.user("bob", Role::Regular).await;

        let (status, _) = app
            .send(json_request(Method::PATCH, "/users/update", Some(&token), json!({ "name": "bob" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn promote_requires_moderator() {
        let app = TestApp::new().await;
        let (alice, alice_token) = app.user("alice", Role::Regular).await;
        let (_, mod_token) = app.user("moddy", Role::Moderator).await;

        let uri = format!("/users/promote?id={alice}");
        let (status, body) = app.send(request(Method::POST, &uri, Some(&alice_token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "No permissions!");

        let (status, _) = app.send(request(Method::POST, &uri, Some(&mod_token))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, me) = app
            .send(request(Method::GET, "/users/account", Some(&alice_token)))
            .await;
        assert_eq!(me["role"], "moderator");

        let (status, _) = app
            .send(request(Method::POST, "/users/promote?id=999", Some(&mod_token)))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app
            .send(request(Method::POST, "/users/promote", Some(&mod_token)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_self_and_others() {
        let app = TestApp::new().await;
        let (alice, alice_token) = app.user("alice", Role::Regular).await;
        let (bob, bob_token) = app.user("bob", Role::Regular).await;
        let (_, mod_token) = app.user("moddy", Role::Moderator).await;

        let (status, _) = app
            .send(request(Method::DELETE, &format!("/users/delete?id={bob}"), Some(&alice_token)))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send(request(Method::DELETE, &format!("/users/delete?id={bob}"), Some(&mod_token)))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .send(request(Method::GET, "/users/account", Some(&bob_token)))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .send(request(Method::DELETE, "/users/delete", Some(&alice_token)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.state.store.find_user(alice).await.unwrap().is_none());
    }
}
