//! Basic-auth gate for the import endpoints.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::AppState;
use crate::error::{AuthError, ImportError};
use crate::types::Requester;

/// Checks credentials before any other processing and records the [`Requester`].
///
/// When `BASIC_AUTH_USER` and `BASIC_AUTH_PASSWORD` are not both configured,
/// every request passes as [`Requester::Anonymous`].
pub async fn require_basic_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ImportError> {
    let requester = match state.config.basic_auth() {
        None => Requester::Anonymous,
        Some((user, password)) => {
            let header = request
                .headers()
                .get(header::AUTHORIZATION)
                .ok_or(AuthError::Missing)?;

            let (request_user, request_password) = decode_basic(header).map_err(|e| {
                warn!(error = %e, "Problem parsing authorization header");
                e
            })?;

            let supplied = (request_user.as_str(), request_password.as_str());
            if !credentials_match((user, password), supplied) {
                warn!(user = %request_user, "Rejected credentials");
                return Err(AuthError::InvalidCredentials.into());
            }
            Requester::User(request_user)
        }
    };

    debug!(requester = %requester, "Request authorized");
    request.extensions_mut().insert(requester);
    Ok(next.run(request).await)
}

/// Decode a `Basic <base64(user:password)>` header value.
pub fn decode_basic(header: &HeaderValue) -> Result<(String, String), AuthError> {
    let value = header
        .to_str()
        .map_err(|_| AuthError::Malformed("header is not valid ASCII".to_string()))?
        .trim();

    let (scheme, encoded) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::Malformed("expected 'Basic <credentials>'".to_string()))?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::Malformed(format!("unsupported scheme '{}'", scheme)));
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| AuthError::Malformed(format!("invalid base64: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| AuthError::Malformed("credentials are not UTF-8".to_string()))?;

    let (user, password) = decoded
        .split_once(':')
        .ok_or_else(|| AuthError::Malformed("credentials missing ':' separator".to_string()))?;

    Ok((user.to_string(), password.to_string()))
}

/// Compare credentials through fixed-length digests so the time taken does
/// not depend on where the supplied values first differ.
fn credentials_match(expected: (&str, &str), supplied: (&str, &str)) -> bool {
    fn digest((user, password): (&str, &str)) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(user.as_bytes());
        hasher.update([0u8]);
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }

    digest(expected)
        .iter()
        .zip(digest(supplied).iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
