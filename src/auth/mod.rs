pub mod jwt;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization, Cookie};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

pub const SESSION_COOKIE_NAME: &str = "session_token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub username: String,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }

    /// Admins act on any case, everyone else only on their own.
    pub fn can_modify(&self, owner_id: i32) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

/// Accepts either a Bearer token or the browser session cookie. A missing
/// or invalid token sends the caller to the login page rather than an error
/// status, since the main surface is HTML views.
#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|TypedHeader(Authorization(bearer))| bearer.token().to_owned());

        let token = match bearer {
            Some(token) => token,
            None => TypedHeader::<Cookie>::from_request_parts(parts, state)
                .await
                .ok()
                .and_then(|TypedHeader(cookies)| {
                    cookies.get(SESSION_COOKIE_NAME).map(str::to_owned)
                })
                .ok_or_else(AppError::login_redirect)?,
        };

        let claims = state
            .jwt
            .verify_token(&token)
            .map_err(|_| AppError::login_redirect())?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::AuthenticatedUser;

    fn user(id: i32, role: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: id,
            username: "someone".to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn admin_check_is_case_insensitive() {
        assert!(user(1, "admin").is_admin());
        assert!(user(1, "Admin").is_admin());
        assert!(user(1, "ADMIN").is_admin());
        assert!(!user(1, "user").is_admin());
    }

    #[test]
    fn owner_or_admin_can_modify() {
        assert!(user(1, "user").can_modify(1));
        assert!(!user(1, "user").can_modify(2));
        assert!(user(1, "admin").can_modify(2));
    }
}
