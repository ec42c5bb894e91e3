use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::claims::TokenKind;
use super::cookies::{cookie_value, ACCESS_COOKIE};
use super::jwt::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::{Role, User};

/// Validates the bearer/cookie access token and re-confirms the user row
/// still exists, catching deleted-but-not-yet-expired tokens.
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::to_string)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_value(&parts.headers, ACCESS_COOKIE))
            .ok_or_else(|| ApiError::Auth("Missing access token".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired access token");
            ApiError::Auth("Invalid or expired token".into())
        })?;

        if claims.kind != TokenKind::Access {
            return Err(ApiError::Auth("Access token required".into()));
        }
        let role = claims
            .role
            .ok_or_else(|| ApiError::Auth("Invalid or expired token".into()))?;

        if !User::exists(&state.db, claims.sub).await? {
            warn!(user_id = %claims.sub, "token for deleted user");
            return Err(ApiError::Auth("User no longer exists".into()));
        }

        Ok(AuthUser {
            id: claims.sub,
            role,
        })
    }
}

/// Route-level role rules are predicates over the same decoded claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePolicy {
    AdminOnly,
    NonAdmin,
    DriverOnly,
}

impl RolePolicy {
    pub fn allows(self, role: Role) -> bool {
        match self {
            RolePolicy::AdminOnly => role == Role::Admin,
            RolePolicy::NonAdmin => role != Role::Admin,
            RolePolicy::DriverOnly => role == Role::Driver,
        }
    }
}

fn authorize(user: AuthUser, policy: RolePolicy) -> Result<AuthUser, ApiError> {
    if policy.allows(user.role) {
        Ok(user)
    } else {
        Err(ApiError::Forbidden(
            "You are not allowed to access this resource".into(),
        ))
    }
}

pub struct AdminUser(pub AuthUser);
pub struct NonAdminUser(pub AuthUser);
pub struct DriverUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        authorize(user, RolePolicy::AdminOnly).map(AdminUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for NonAdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        authorize(user, RolePolicy::NonAdmin).map(NonAdminUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for DriverUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        authorize(user, RolePolicy::DriverOnly).map(DriverUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_only_admits_admins() {
        assert!(RolePolicy::AdminOnly.allows(Role::Admin));
        assert!(!RolePolicy::AdminOnly.allows(Role::User));
        assert!(!RolePolicy::AdminOnly.allows(Role::Driver));
    }

    #[test]
    fn non_admin_admits_everyone_else() {
        assert!(!RolePolicy::NonAdmin.allows(Role::Admin));
        assert!(RolePolicy::NonAdmin.allows(Role::User));
        assert!(RolePolicy::NonAdmin.allows(Role::Driver));
    }

    #[test]
    fn driver_only_admits_drivers() {
        assert!(RolePolicy::DriverOnly.allows(Role::Driver));
        assert!(!RolePolicy::DriverOnly.allows(Role::User));
        assert!(!RolePolicy::DriverOnly.allows(Role::Admin));
    }

    #[test]
    fn authorize_maps_mismatch_to_forbidden() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            role: Role::User,
        };
        let err = authorize(user, RolePolicy::AdminOnly).err().unwrap();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
