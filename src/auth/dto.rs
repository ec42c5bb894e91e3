use serde::{Deserialize, Serialize};

use crate::users::dto::PublicUser;

/// Request body for sign-in.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh. The token may also arrive via cookie,
/// so the body is optional end to end.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Request body for verify-email and forgot-password.
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub email: String,
    #[serde(rename = "currentPassword")]
    pub current_password: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

/// Payload returned after sign-in and refresh.
#[derive(Debug, Serialize)]
pub struct AuthData {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_requests_use_camel_case_field_names() {
        let req: ResetPasswordRequest =
            serde_json::from_str(r#"{"email":"a@x.com","newPassword":"Secret123"}"#).unwrap();
        assert_eq!(req.new_password, "Secret123");

        let req: ChangePasswordRequest = serde_json::from_str(
            r#"{"email":"a@x.com","currentPassword":"old","newPassword":"new"}"#,
        )
        .unwrap();
        assert_eq!(req.current_password, "old");
        assert_eq!(req.new_password, "new");
    }

    #[test]
    fn refresh_request_tolerates_empty_body() {
        let req: RefreshRequest = serde_json::from_str("{}").unwrap();
        assert!(req.refresh_token.is_none());
    }
}
