use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::PublicUser;
use super::repo::User;
use crate::auth::extractors::{AdminUser, AuthUser, NonAdminUser};
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::storage;

#[instrument(skip(state, _admin))]
pub async fn all_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<PublicUser>>>, ApiError> {
    let users = User::list_all(&state.db).await?;
    let items = users.into_iter().map(PublicUser::from).collect();
    Ok(ApiResponse::ok(items, "Users fetched"))
}

#[instrument(skip(state, _user))]
pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PublicUser>>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(ApiResponse::ok(PublicUser::from(user), "User fetched"))
}

struct UpdateForm {
    firstname: String,
    lastname: String,
    phone_number: String,
    avatar: Option<(Bytes, String)>,
}

async fn read_update_form(mut mp: Multipart) -> Result<UpdateForm, ApiError> {
    let mut firstname = None;
    let mut lastname = None;
    let mut phone_number = None;
    let mut avatar = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        match name.as_str() {
            "firstname" => firstname = Some(text(field).await?),
            "lastname" => lastname = Some(text(field).await?),
            "phone_number" => phone_number = Some(text(field).await?),
            "avatar" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?;
                if !body.is_empty() {
                    avatar = Some((body, content_type));
                }
            }
            _ => {}
        }
    }

    let require = |v: Option<String>, name: &str| match v {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ApiError::Validation(format!("{name} is required"))),
    };

    Ok(UpdateForm {
        firstname: require(firstname, "firstname")?,
        lastname: require(lastname, "lastname")?,
        phone_number: require(phone_number, "phone_number")?,
        avatar,
    })
}

async fn text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))
}

#[instrument(skip(state, _user, mp))]
pub async fn update_user(
    State(state): State<AppState>,
    _user: NonAdminUser,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> Result<Json<ApiResponse<PublicUser>>, ApiError> {
    let form = read_update_form(mp).await?;

    let existing = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if let Some((body, content_type)) = form.avatar {
        // Drop the old remote asset before uploading the replacement so
        // nothing is orphaned in the bucket.
        if let Some(old) = existing.avatar.as_deref() {
            if let Err(e) = storage::delete_avatar_by_url(state.storage.as_ref(), old).await {
                warn!(error = %e, user_id = %id, "failed to delete previous avatar");
            }
        }
        let url = storage::upload_avatar(state.storage.as_ref(), id, body, &content_type)
            .await
            .map_err(ApiError::Internal)?;
        User::set_avatar(&state.db, id, Some(&url)).await?;
    }

    let updated = User::update_profile(
        &state.db,
        id,
        form.firstname.trim(),
        form.lastname.trim(),
        form.phone_number.trim(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %id, "profile updated");
    Ok(ApiResponse::ok(PublicUser::from(updated), "User updated"))
}

#[instrument(skip(state, _user))]
pub async fn delete_user(
    State(state): State<AppState>,
    _user: NonAdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let existing = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if let Some(url) = existing.avatar.as_deref() {
        if let Err(e) = storage::delete_avatar_by_url(state.storage.as_ref(), url).await {
            warn!(error = %e, user_id = %id, "failed to delete avatar during account deletion");
        }
    }

    // OTP rows go with the user via ON DELETE CASCADE.
    User::delete(&state.db, id).await?;

    info!(user_id = %id, "account deleted");
    Ok(ApiResponse::ok(serde_json::Value::Null, "User deleted"))
}
