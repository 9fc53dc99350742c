//! Principal extraction.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! principal as `x-user-id` (UUID) and `x-user-role` headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Customer
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

        let id = uuid::Uuid::parse_str(raw.trim())
            .map(UserId::from_uuid)
            .map_err(|_| ApiError::Unauthorized("Invalid principal id".to_string()))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(Role::parse)
            .unwrap_or(Role::Customer);

        Ok(Principal { id, role })
    }
}

/// A principal holding the admin role.
#[derive(Debug, Clone, Copy)]
pub struct Admin(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            tracing::warn!(user_id = %principal.id, "admin route denied");
            return Err(ApiError::AdminOnly);
        }
        Ok(Admin(principal))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/cart");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let mut parts = parts(&[]);
        let result = Principal::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_invalid_id_is_unauthorized() {
        let mut parts = parts(&[(USER_ID_HEADER, "not-a-uuid")]);
        let result = Principal::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_role_defaults_to_customer() {
        let id = uuid::Uuid::new_v4();
        let mut parts = parts(&[(USER_ID_HEADER, &id.to_string())]);
        let principal = Principal::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(principal.id, UserId::from_uuid(id));
        assert_eq!(principal.role, Role::Customer);
    }

    #[tokio::test]
    async fn test_admin_extractor() {
        let id = uuid::Uuid::new_v4().to_string();

        let mut customer = parts(&[(USER_ID_HEADER, &id)]);
        let denied = Admin::from_request_parts(&mut customer, &()).await;
        assert!(matches!(denied, Err(ApiError::AdminOnly)));

        let mut admin = parts(&[(USER_ID_HEADER, &id), (USER_ROLE_HEADER, "ADMIN")]);
        let Admin(principal) = Admin::from_request_parts(&mut admin, &()).await.unwrap();
        assert!(principal.is_admin());
    }
}
