use crate::{
    error::AppError,
    services::credentials::{AdminUser, SharedCredentialStore},
};
use axum::{
    extract::{FromRequestParts, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
    Extension,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Admin authentication middleware
///
/// Checks `Authorization: Basic` credentials against the configured
/// credential store and adds the authenticated [`AdminUser`] to request
/// extensions. Runs before the handler, so a rejected request never reaches
/// any moderation logic.
pub async fn admin_auth_middleware(
    Extension(store): Extension<SharedCredentialStore>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (username, secret) = extract_basic_credentials(&headers).ok_or_else(|| {
        tracing::warn!(path = %request.uri().path(), "Admin request without credentials");
        AppError::Unauthorized
    })?;

    let admin = store.authenticate(&username, &secret).ok_or_else(|| {
        tracing::warn!(path = %request.uri().path(), "Admin authentication failed");
        AppError::Unauthorized
    })?;

    request.extensions_mut().insert(admin);

    Ok(next.run(request).await)
}

/// Decode `Authorization: Basic base64(user:secret)`.
pub fn extract_basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let (scheme, encoded) = auth_header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, secret) = decoded.split_once(':')?;

    Some((username.to_string(), secret.to_string()))
}

/// Extractor for AdminUser from request extensions
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
