use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// Identity of the caller, taken from the `X-User-Id` header.
///
/// There is no account system behind this yet; the header is trusted as-is
/// and only has to parse as a UUID. Handlers that need to know who is
/// calling take a `CallerId` argument, which rejects the request with a 401
/// before the handler body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub Uuid);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .ok_or_else(|| AppError::AuthenticationError("missing X-User-Id header".to_string()))?;

        let raw = header.to_str().map_err(|_| {
            AppError::AuthenticationError("invalid X-User-Id header".to_string())
        })?;

        let user_id = Uuid::parse_str(raw).map_err(|_| {
            AppError::AuthenticationError("invalid X-User-Id header".to_string())
        })?;

        Ok(CallerId(user_id))
    }
}
