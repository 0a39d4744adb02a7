/// API routes and handlers
pub mod admin;
pub mod public;

use crate::{context::AppContext, error::DeskError};
use axum::{extract::FromRequestParts, http::request::Parts, Router};

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(public::routes())
        .merge(admin::routes())
}

/// Admin authentication context, validated against the configured API
/// token. The admin surface is disabled entirely when no token is set.
#[derive(Debug, Clone)]
pub struct AdminAuth;

#[async_trait::async_trait]
impl FromRequestParts<AppContext> for AdminAuth {
    type Rejection = DeskError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.config.admin.api_token.as_deref().ok_or_else(|| {
            DeskError::Authentication("Admin API is disabled".to_string())
        })?;

        let presented = extract_bearer_token(parts)
            .ok_or_else(|| DeskError::Authentication("Missing authorization header".to_string()))?;

        if presented != expected {
            return Err(DeskError::Authentication("Invalid admin token".to_string()));
        }

        Ok(AdminAuth)
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
