// rest/routes/accounts.rs — registration, login, and profile routes.

use axum::{extract::State, Form, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth;
use crate::rest::error::ApiError;
use crate::rest::extract::CurrentUser;
use crate::rest::routes::books::BookResponse;
use crate::storage::{BookFilter, UserRow};
use crate::AppContext;

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let username_len = self.username.chars().count();
        if username_len < 3 || username_len > 50 {
            return Err(ApiError::Validation(
                "username must be 3-50 characters".to_string(),
            ));
        }
        let password_len = self.password.chars().count();
        if password_len < 6 || password_len > 50 {
            return Err(ApiError::Validation(
                "password must be 6-50 characters".to_string(),
            ));
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }
}

/// OAuth2 password-flow shape: urlencoded form with `username` and `password`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserUpdateRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
}

impl UserUpdateRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub created_at: String,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            created_at: row.created_at,
        }
    }
}

/// Profile view: user fields flattened alongside the whole catalog.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub books_count: usize,
    pub books: Vec<BookResponse>,
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 6 {
        return Err(ApiError::Validation(
            "password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    let well_formed = !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !email.contains(char::is_whitespace);
    if !well_formed {
        return Err(ApiError::Validation(
            "email is not a valid email address".to_string(),
        ));
    }
    Ok(())
}

// ─── bcrypt off the async runtime ────────────────────────────────────────────

// A cost-12 bcrypt round takes hundreds of milliseconds; it runs on the
// blocking pool so request threads keep serving.

async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
    let hashed = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(hashed)
}

async fn verify_password_blocking(password: String, hashed: String) -> Result<bool, ApiError> {
    let ok = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hashed))
        .await
        .map_err(anyhow::Error::from)?;
    Ok(ok)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

pub async fn register(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    body.validate()?;

    if ctx
        .storage
        .get_user_by_username(&body.username)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest("Username already exists"));
    }
    if let Some(email) = &body.email {
        if ctx.storage.get_user_by_email(email).await?.is_some() {
            return Err(ApiError::BadRequest("Email already registered"));
        }
    }

    let hashed = hash_password_blocking(body.password).await?;
    ctx.storage
        .create_user(
            &body.username,
            &hashed,
            body.email.as_deref(),
            body.full_name.as_deref(),
        )
        .await?;

    let access_token = auth::create_access_token(
        &body.username,
        &ctx.config.secret_key,
        ctx.config.token_ttl_minutes,
    )?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = ctx.storage.get_user_by_username(&form.username).await?;

    // One failure path for unknown user and wrong password — no enumeration.
    let ok = match &user {
        Some(user) => {
            verify_password_blocking(form.password, user.hashed_password.clone()).await?
        }
        None => false,
    };
    if !ok {
        return Err(ApiError::Unauthorized("Invalid username or password"));
    }

    let access_token = auth::create_access_token(
        &form.username,
        &ctx.config.secret_key,
        ctx.config.token_ttl_minutes,
    )?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

pub async fn update_me(
    State(ctx): State<Arc<AppContext>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<UserUpdateRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    body.validate()?;

    // Merge: absent fields keep their current value.
    let mut email = user.email.clone();
    if let Some(new_email) = &body.email {
        if user.email.as_deref() != Some(new_email.as_str()) {
            if ctx.storage.get_user_by_email(new_email).await?.is_some() {
                return Err(ApiError::BadRequest("Email already registered"));
            }
            email = Some(new_email.clone());
        }
    }
    let full_name = body.full_name.or(user.full_name);
    let hashed = match body.password {
        Some(password) => hash_password_blocking(password).await?,
        None => user.hashed_password,
    };

    let updated = ctx
        .storage
        .update_user_profile(user.id, email.as_deref(), full_name.as_deref(), &hashed)
        .await?;
    Ok(Json(updated.into()))
}

pub async fn profile(
    State(ctx): State<Arc<AppContext>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let books: Vec<BookResponse> = ctx
        .storage
        .list_books(user.id, &BookFilter::all())
        .await?
        .into_iter()
        .map(BookResponse::from)
        .collect();

    Ok(Json(ProfileResponse {
        user: user.into(),
        books_count: books.len(),
        books,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.org").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@").is_err());
        assert!(validate_email("alice@nodot").is_err());
        assert!(validate_email("ali ce@example.com").is_err());
        assert!(validate_email("a@b@example.com").is_err());
    }

    #[test]
    fn register_bounds() {
        let req = |username: &str, password: &str, email: Option<&str>| RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            email: email.map(str::to_string),
            full_name: None,
        };
        assert!(req("alice", "hunter2x", None).validate().is_ok());
        assert!(req("al", "hunter2x", None).validate().is_err());
        assert!(req(&"u".repeat(51), "hunter2x", None).validate().is_err());
        assert!(req("alice", "short", None).validate().is_err());
        assert!(req("alice", &"p".repeat(51), None).validate().is_err());
        assert!(req("alice", "hunter2x", Some("bad-email")).validate().is_err());
    }
}
