use axum::{
    extract::{FromRef, Multipart, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};

use super::cookies::{clear_token_cookies, cookie_value, set_token_cookies, REFRESH_COOKIE};
use super::dto::{
    AuthData, ChangePasswordRequest, EmailRequest, RefreshRequest, ResetPasswordRequest,
    SignInRequest, VerifyOtpRequest,
};
use super::extractors::AuthUser;
use super::jwt::JwtKeys;
use super::password::{hash_password, verify_password};
use crate::email::{reset_password_body, verify_email_body, welcome_body};
use crate::error::ApiError;
use crate::otp::{generate::generate_code, repo::OtpCode};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::storage;
use crate::users::dto::PublicUser;
use crate::users::repo::{NewUser, Role, User};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

// --- sign-up ---

#[derive(Debug)]
struct AvatarPart {
    body: Bytes,
    content_type: String,
}

#[derive(Debug)]
struct SignUpForm {
    firstname: String,
    lastname: String,
    email: String,
    password: String,
    role: String,
    avatar: Option<AvatarPart>,
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::Validation(format!("{name} is required"))),
    }
}

async fn read_sign_up_form(mut mp: Multipart) -> Result<SignUpForm, ApiError> {
    let mut firstname = None;
    let mut lastname = None;
    let mut email = None;
    let mut password = None;
    let mut role = None;
    let mut avatar = None;

    while let Some(field) = mp.next_field().await.map_err(malformed)? {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        match name.as_str() {
            "firstname" => firstname = Some(field.text().await.map_err(malformed)?),
            "lastname" => lastname = Some(field.text().await.map_err(malformed)?),
            "email" => email = Some(field.text().await.map_err(malformed)?),
            "password" => password = Some(field.text().await.map_err(malformed)?),
            "role" => role = Some(field.text().await.map_err(malformed)?),
            "avatar" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(malformed)?;
                if !body.is_empty() {
                    avatar = Some(AvatarPart { body, content_type });
                }
            }
            _ => {}
        }
    }

    Ok(SignUpForm {
        firstname: required(firstname, "firstname")?,
        lastname: required(lastname, "lastname")?,
        email: required(email, "email")?,
        password: required(password, "password")?,
        role: required(role, "role")?,
        avatar,
    })
}

fn malformed(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Validation(format!("malformed multipart body: {e}"))
}

#[instrument(skip(state, mp))]
pub async fn sign_up(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), ApiError> {
    let mut form = read_sign_up_form(mp).await?;
    form.email = form.email.trim().to_lowercase();

    if !is_valid_email(&form.email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if form.password.len() < 8 {
        return Err(ApiError::Validation("Password too short".into()));
    }
    let role = Role::parse(form.role.trim())
        .ok_or_else(|| ApiError::Validation("role must be one of user, driver, admin".into()))?;

    if User::find_by_email(&state.db, &form.email).await?.is_some() {
        warn!(email = %form.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&form.password)?;

    // The unique index on email is the real duplicate guard; a concurrent
    // sign-up surfaces here as ConflictError.
    let mut user = User::create(
        &state.db,
        NewUser {
            firstname: form.firstname.trim(),
            lastname: form.lastname.trim(),
            email: &form.email,
            password_hash: &hash,
            role,
        },
    )
    .await?;

    // Upload failure leaves the account without an avatar instead of
    // failing the whole sign-up.
    if let Some(a) = form.avatar {
        match storage::upload_avatar(state.storage.as_ref(), user.id, a.body, &a.content_type)
            .await
        {
            Ok(url) => {
                User::set_avatar(&state.db, user.id, Some(&url)).await?;
                user.avatar = Some(url);
            }
            Err(e) => {
                warn!(error = %e, user_id = %user.id, "avatar upload failed, continuing without avatar");
            }
        }
    }

    if let Err(e) = state
        .mailer
        .send(&user.email, "Welcome aboard", &welcome_body(&user.firstname))
        .await
    {
        warn!(error = %e, user_id = %user.id, "welcome email failed");
    }

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(PublicUser::from(user), "Account created"),
    ))
}

// --- sign-in / sign-out / refresh ---

/// The verified-account check runs before the password check; an unverified
/// account never has its credentials evaluated.
fn authenticate(user: &User, password: &str) -> Result<(), ApiError> {
    if !user.is_verified {
        return Err(ApiError::State("Account is not verified".into()));
    }
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "sign-in invalid password");
        return Err(ApiError::Auth("Invalid credentials".into()));
    }
    Ok(())
}

/// Only the most recently issued refresh token, as stored on the user row,
/// is valid. Anything else is a rotated-out or revoked token.
fn refresh_is_current(stored: Option<&str>, presented: &str) -> bool {
    stored == Some(presented)
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(mut payload): Json<SignInRequest>,
) -> Result<(HeaderMap, Json<ApiResponse<AuthData>>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    if payload.password.is_empty() {
        return Err(ApiError::Validation("email and password are required".into()));
    }
    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "sign-in unknown email");
            ApiError::NotFound("No account found for this email".into())
        })?;

    authenticate(&user, &payload.password)?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id, user.role)?;
    let refresh_token = keys.sign_refresh(user.id)?;

    // Overwrites any prior value, invalidating earlier sessions.
    User::set_refresh_token(&state.db, user.id, Some(&refresh_token)).await?;

    let mut headers = HeaderMap::new();
    set_token_cookies(&mut headers, &keys, &access_token, &refresh_token);

    info!(user_id = %user.id, "user signed in");
    Ok((
        headers,
        ApiResponse::ok(
            AuthData {
                access_token,
                refresh_token,
                user: PublicUser::from(user),
            },
            "Signed in",
        ),
    ))
}

#[instrument(skip(state, user))]
pub async fn sign_out(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<(HeaderMap, Json<ApiResponse<serde_json::Value>>), ApiError> {
    // Idempotent: clearing an already-null token is a no-op.
    User::set_refresh_token(&state.db, user.id, None).await?;

    let mut headers = HeaderMap::new();
    clear_token_cookies(&mut headers);

    info!(user_id = %user.id, "user signed out");
    Ok((headers, ApiResponse::ok(serde_json::Value::Null, "Signed out")))
}

#[instrument(skip(state, headers, body))]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<(HeaderMap, Json<ApiResponse<AuthData>>), ApiError> {
    let presented = cookie_value(&headers, REFRESH_COOKIE)
        .or_else(|| body.and_then(|Json(b)| b.refresh_token))
        .ok_or_else(|| ApiError::Auth("Refresh token required".into()))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&presented)
        .map_err(|_| ApiError::Auth("Invalid or expired refresh token".into()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Auth("Invalid or expired refresh token".into()))?;

    // Rotation-on-use: only the latest issued token is stored on the row.
    if !refresh_is_current(user.refresh_token.as_deref(), &presented) {
        warn!(user_id = %user.id, "refresh token reuse detected");
        return Err(ApiError::Auth("Refresh token no longer valid".into()));
    }

    let access_token = keys.sign_access(user.id, user.role)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    User::set_refresh_token(&state.db, user.id, Some(&refresh_token)).await?;

    let mut out = HeaderMap::new();
    set_token_cookies(&mut out, &keys, &access_token, &refresh_token);

    info!(user_id = %user.id, "tokens rotated");
    Ok((
        out,
        ApiResponse::ok(
            AuthData {
                access_token,
                refresh_token,
                user: PublicUser::from(user),
            },
            "Tokens refreshed",
        ),
    ))
}

// --- OTP flows ---

enum OtpPurpose {
    VerifyEmail,
    PasswordReset,
}

async fn issue_otp(state: &AppState, email: &str, purpose: OtpPurpose) -> Result<(), ApiError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::Validation("email is required".into()));
    }

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No account found for this email".into()))?;

    let cfg = &state.config.otp;
    let code = generate_code(cfg);
    let expiry = OffsetDateTime::now_utc() + TimeDuration::minutes(cfg.ttl_minutes);
    OtpCode::create(&state.db, user.id, &code, expiry).await?;

    let (subject, body) = match purpose {
        OtpPurpose::VerifyEmail => (
            "Verify your email",
            verify_email_body(&user.firstname, &code, cfg.ttl_minutes),
        ),
        OtpPurpose::PasswordReset => (
            "Reset your password",
            reset_password_body(&user.firstname, &code, cfg.ttl_minutes),
        ),
    };
    state.mailer.send(&user.email, subject, &body).await?;

    info!(user_id = %user.id, "otp issued");
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    issue_otp(&state, &payload.email, OtpPurpose::VerifyEmail).await?;
    Ok(ApiResponse::ok(
        serde_json::Value::Null,
        "Verification code sent",
    ))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    issue_otp(&state, &payload.email, OtpPurpose::PasswordReset).await?;
    Ok(ApiResponse::ok(
        serde_json::Value::Null,
        "Password reset code sent",
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let otp = payload.otp.trim();
    if email.is_empty() || otp.is_empty() {
        return Err(ApiError::Validation("email and otp are required".into()));
    }

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No account found for this email".into()))?;

    let row = OtpCode::latest_for_user(&state.db, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No OTP found".into()))?;

    // One message for both failure causes; do not leak which check failed.
    if !row.accepts(otp, OffsetDateTime::now_utc()) {
        return Err(ApiError::Validation("Invalid or expired OTP".into()));
    }

    OtpCode::delete(&state.db, row.id).await?;
    if !user.is_verified {
        User::mark_verified(&state.db, user.id).await?;
    }

    info!(user_id = %user.id, "otp verified");
    Ok(ApiResponse::ok(serde_json::Value::Null, "OTP verified"))
}

// --- password reset / change ---

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::Validation("email and newPassword are required".into()));
    }

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No account found for this email".into()))?;
    if !user.is_verified {
        return Err(ApiError::State("Account is not verified".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    User::set_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(ApiResponse::ok(serde_json::Value::Null, "Password reset"))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::Validation(
            "email, currentPassword and newPassword are required".into(),
        ));
    }

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No account found for this email".into()))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(user_id = %user.id, "change-password current password mismatch");
        return Err(ApiError::Auth("Current password is incorrect".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    User::set_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password changed");
    Ok(ApiResponse::ok(serde_json::Value::Null, "Password changed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("jane@x.com"));
        assert!(is_valid_email("a.b+c@sub.domain.io"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("spaces in@x.com"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn required_rejects_missing_and_blank_fields() {
        assert!(required(None, "firstname").is_err());
        assert!(required(Some("  ".into()), "firstname").is_err());
        assert_eq!(required(Some("Jane".into()), "firstname").unwrap(), "Jane");
    }

    fn account(password: &str, verified: bool) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: uuid::Uuid::new_v4(),
            firstname: "Jane".into(),
            lastname: "Doe".into(),
            email: "jane@x.com".into(),
            password_hash: hash_password(password).unwrap(),
            avatar: None,
            phone_number: None,
            role: Role::User,
            is_verified: verified,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unverified_account_is_rejected_before_the_password_is_checked() {
        let user = account("Secret123", false);
        let err = authenticate(&user, "Secret123").unwrap_err();
        assert!(matches!(err, ApiError::State(_)));
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let user = account("Secret123", true);
        let err = authenticate(&user, "wrong-password").unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[test]
    fn verified_account_with_correct_password_signs_in() {
        let user = account("Secret123", true);
        assert!(authenticate(&user, "Secret123").is_ok());
    }

    #[test]
    fn rotated_out_refresh_token_is_not_current() {
        assert!(refresh_is_current(Some("latest.jwt"), "latest.jwt"));
        assert!(!refresh_is_current(Some("latest.jwt"), "previous.jwt"));
    }

    #[test]
    fn signed_out_user_has_no_current_refresh_token() {
        assert!(!refresh_is_current(None, "any.jwt"));
    }

    #[tokio::test]
    async fn sign_in_rejects_malformed_email_before_lookup() {
        let state = AppState::fake();
        let err = sign_in(
            State(state),
            Json(SignInRequest {
                email: "not-an-email".into(),
                password: "Secret123".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn non_multipart_body_is_reported_as_malformed() {
        use axum::extract::FromRequest;

        let req = axum::http::Request::builder()
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(axum::body::Body::from("this is not a multipart body"))
            .unwrap();
        let mp = Multipart::from_request(req, &()).await.unwrap();

        let err = read_sign_up_form(mp).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(m) if m.contains("malformed multipart")));
    }
}
