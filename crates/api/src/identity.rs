//! Caller identity forwarded by the upstream authentication layer.
//!
//! Authentication happens before requests reach this service. The
//! authenticated user arrives as two headers:
//! - `X-User-Id`: the user's integer id
//! - `X-User-Role`: `Admin` or `Customer`, case-insensitive

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use domain::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    /// Anything other than `admin` is treated as a customer.
    fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(role) if role.trim().eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Customer,
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER)
            .and_then(|id| id.trim().parse::<i64>().ok())
            .map(UserId::new)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required.".to_string()))?;

        Ok(Self {
            user_id,
            role: Role::from_header(header_value(parts, USER_ROLE_HEADER)),
        })
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
}

/// An authenticated caller holding the `Admin` role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.user_id, "admin route denied");
            return Err(ApiError::Forbidden("Admin role is required.".to_string()));
        }
        Ok(Self(user))
    }
}
