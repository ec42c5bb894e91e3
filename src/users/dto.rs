use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Role, User};

/// Public part of the user returned to the client. Password hash and
/// refresh token never leave the server.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub avatar: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            firstname: u.firstname,
            lastname: u.lastname,
            email: u.email,
            avatar: u.avatar,
            phone_number: u.phone_number,
            role: u.role,
            is_verified: u.is_verified,
            created_at: u.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_has_no_password_field() {
        let user = User {
            id: Uuid::new_v4(),
            firstname: "Jane".into(),
            lastname: "Doe".into(),
            email: "jane@x.com".into(),
            password_hash: "hash".into(),
            avatar: Some("https://cdn/avatars/a.jpg".into()),
            phone_number: None,
            role: Role::Driver,
            is_verified: true,
            refresh_token: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("refresh_token"));
        assert!(json.contains("\"role\":\"driver\""));
        assert!(json.contains("jane@x.com"));
    }
}
