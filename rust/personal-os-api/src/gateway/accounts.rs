//! Signup, login and the current-user endpoint.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::auth::{AuthenticatedUser, generate_jwt, hash_password, verify_password};
use crate::AppState;
use crate::database::{self, UserRecord, UserRepository};
use crate::domain::User;
use crate::error::{AppError, AppResult};

/// Minimum password length in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/signup", post(signup))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::validation("A valid email address is required")),
    }
}

fn issue(state: &AppState, user: User) -> AppResult<SessionResponse> {
    let gateway = &state.config.gateway;
    let secret = gateway
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("JWT secret not configured")))?;
    let token = generate_jwt(&user, secret, gateway.jwt_expiry_secs)?;
    Ok(SessionResponse { token, user })
}

/// Argon2 is CPU-bound; keep it off the async workers.
async fn hash_blocking(password: String) -> AppResult<String> {
    Ok(tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(anyhow::Error::from)??)
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    let email = normalize_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let record = UserRecord {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        name,
        password_hash: hash_blocking(req.password).await?,
        created_at: database::now(),
    };
    if !state.db.insert_user(&record).await? {
        return Err(AppError::conflict("An account with this email already exists"));
    }

    state.store.ensure_core_documents(&record.id).await?;
    tracing::info!(user_id = %record.id, "Account created");

    let session = issue(&state, record.to_user())?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let email = req.email.trim().to_lowercase();
    let Some(record) = state.db.find_user_by_email(&email).await? else {
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    let hash = record.password_hash.clone();
    let password = req.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(anyhow::Error::from)?;
    if !verified {
        tracing::info!(user_id = %record.id, "Login rejected");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    Ok(Json(issue(&state, record.to_user())?))
}

async fn me(user: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
        name: user.name,
    })
}
