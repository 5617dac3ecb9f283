pub mod orders;
pub mod returns;

use crate::errors::ServiceError;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Identity resolved by the upstream gateway and forwarded as trusted
/// headers. Authentication itself is an external collaborator; these
/// headers are only honoured behind it.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Caller {
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "administrator role required".to_string(),
            ))
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("missing or malformed x-user-id header".to_string())
            })?;

        let is_admin = parts
            .headers
            .get("x-user-role")
            .and_then(|value| value.to_str().ok())
            .map(|role| role.eq_ignore_ascii_case("admin"))
            .unwrap_or(false);

        Ok(Caller { user_id, is_admin })
    }
}
