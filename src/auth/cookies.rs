use std::time::Duration;

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};

use super::jwt::JwtKeys;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn cookie(name: &str, value: &str, max_age: Duration) -> HeaderValue {
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=Strict",
        name,
        value,
        max_age.as_secs()
    )
    .parse()
    .expect("cookie header value")
}

/// Mirror freshly issued tokens into HttpOnly cookies.
pub fn set_token_cookies(headers: &mut HeaderMap, keys: &JwtKeys, access: &str, refresh: &str) {
    headers.append(SET_COOKIE, cookie(ACCESS_COOKIE, access, keys.access_ttl));
    headers.append(SET_COOKIE, cookie(REFRESH_COOKIE, refresh, keys.refresh_ttl));
}

pub fn clear_token_cookies(headers: &mut HeaderMap) {
    headers.append(SET_COOKIE, cookie(ACCESS_COOKIE, "", Duration::ZERO));
    headers.append(SET_COOKIE, cookie(REFRESH_COOKIE, "", Duration::ZERO));
}

/// Look up a cookie value in the request `Cookie` header(s).
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}
