use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/all-users", get(handlers::all_users))
        .route(
            "/user/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB, profile update carries an avatar
}
