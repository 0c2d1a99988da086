use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use std::sync::Arc;

use crate::auth;
use crate::rest::error::ApiError;
use crate::storage::UserRow;
use crate::AppContext;

/// Extractor for the authenticated user behind a `Bearer` access token.
///
/// A missing, malformed, tampered, or expired token is a 401. A valid token
/// whose user has since disappeared is a 404 — the token outlived the row.
pub struct CurrentUser(pub UserRow);

impl FromRequestParts<Arc<AppContext>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized("Invalid token"))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid token"))?;

        let claims = auth::verify_token(token, &ctx.config.secret_key)
            .ok_or(ApiError::Unauthorized("Invalid token"))?;
        if claims.sub.is_empty() {
            return Err(ApiError::Unauthorized("Invalid token"));
        }

        let user = ctx
            .storage
            .get_user_by_username(&claims.sub)
            .await?
            .ok_or(ApiError::NotFound("User not found"))?;

        Ok(CurrentUser(user))
    }
}
