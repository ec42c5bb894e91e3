use axum::{extract::DefaultBodyLimit, routing::post, Router};

use crate::state::AppState;

pub mod claims;
pub mod cookies;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(handlers::sign_up))
        .route("/auth/sign-in", post(handlers::sign_in))
        .route("/auth/sign-out", post(handlers::sign_out))
        .route("/auth/refresh-token", post(handlers::refresh_token))
        .route("/auth/verify-email", post(handlers::verify_email))
        .route("/auth/verify-otp", post(handlers::verify_otp))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password", post(handlers::reset_password))
        .route("/auth/change-password", post(handlers::change_password))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB, sign-up carries an avatar
}
