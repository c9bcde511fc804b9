use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorMessage, HttpError},
    utils::token,
    AppState,
};

pub const ADMIN_ROLE: &str = "admin";

/// The authenticated caller, taken from the token claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminIdentity {
    pub id: i32,
    pub email: Option<String>,
    pub role: String,
}

pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let cookies = cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(str::to_owned)
        });

    let token = cookies.ok_or_else(|| {
        HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string())
    })?;

    let claims = match token::decode_token(token, app_state.env.jwt_secret.as_bytes()) {
        Ok(claims) => claims,
        Err(_) => {
            return Err(HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()));
        }
    };

    let admin_id = claims
        .sub
        .parse::<i32>()
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    req.extensions_mut().insert(AdminIdentity {
        id: admin_id,
        email: claims.email.filter(|email| !email.is_empty()),
        role: claims.role,
    });

    Ok(next.run(req).await)
}

pub async fn role_check(
    req: Request,
    next: Next,
    required_roles: &'static [&'static str],
) -> Result<impl IntoResponse, HttpError> {
    let identity = req
        .extensions()
        .get::<AdminIdentity>()
        .ok_or_else(|| {
            HttpError::unauthorized(ErrorMessage::UserNotAuthenticated.to_string())
        })?;

    if !required_roles.contains(&identity.role.as_str()) {
        tracing::warn!("Admin route refused for user {} with role '{}'", identity.id, identity.role);
        return Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()));
    }

    Ok(next.run(req).await)
}

pub async fn admin_only(req: Request, next: Next) -> Result<impl IntoResponse, HttpError> {
    role_check(req, next, &[ADMIN_ROLE]).await
}
