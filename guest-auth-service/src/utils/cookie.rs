use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config::SessionConfig;

/// `HttpOnly; SameSite=Lax; Path=/` cookie whose Max-Age matches the
/// session lifetime.
pub fn session_cookie(config: &SessionConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookie)
        .max_age(time::Duration::hours(config.ttl_hours))
        .build()
}

/// Same attributes with an empty value and `Max-Age=0`.
pub fn expired_session_cookie(config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), String::new()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookie)
        .max_age(time::Duration::ZERO)
        .build()
}
