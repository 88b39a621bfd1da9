//! Cookie construction for the session and CSRF state cookies.

use std::time::Duration as StdDuration;

use cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::CookieConfig;

fn build(config: &CookieConfig, name: &str, value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::from(config.same_site))
        .path(config.path.clone())
        .max_age(max_age)
        .build()
}

/// Session cookie living as long as the token it carries.
pub(crate) fn session_cookie(config: &CookieConfig, token: &str, ttl_seconds: i64) -> Cookie<'static> {
    build(
        config,
        &config.session_name,
        token.to_string(),
        Duration::seconds(ttl_seconds),
    )
}

/// CSRF state cookie for the login round trip. Always `SameSite=Lax` so the
/// provider's top-level redirect back to the callback carries it.
pub(crate) fn state_cookie(config: &CookieConfig, state: &str, max_age: StdDuration) -> Cookie<'static> {
    let mut cookie = build(
        config,
        &config.state_name,
        state.to_string(),
        Duration::seconds(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX)),
    );
    cookie.set_same_site(SameSite::Lax);
    cookie
}

/// Removal cookie; path must match the one the cookie was set with.
pub(crate) fn removal(config: &CookieConfig, name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), "")).path(config.path.clone()).build()
}
