use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub id: String,
}

#[derive(Deserialize)]
struct JwtPayload {
    sub: String,
}

/// Reads the caller from the identity provider's JWT. The gateway in front of
/// this service has already verified the signature.
pub async fn require_auth(mut request: Request, next: Next) -> Response {
    match bearer_token(request.headers())
        .or_else(|| cookie_token(request.headers()))
        .and_then(|token| subject_of(&token))
    {
        Some(id) => {
            request.extensions_mut().insert(AuthenticatedUser { id });
            next.run(request).await
        }
        None => unauthorized(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|hv| hv.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|c| c.trim().strip_prefix("access_token="))
        .map(|t| t.to_string())
        .filter(|t| !t.is_empty())
}

// Payload is the middle segment, base64url without padding.
fn subject_of(token: &str) -> Option<String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
    let payload = serde_json::from_slice::<JwtPayload>(&payload_bytes).ok()?;
    Some(payload.sub).filter(|sub| !sub.is_empty())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "statusCode": 401,
            "error": "unauthorized",
            "message": "Unauthorized",
        })),
    )
        .into_response()
}
