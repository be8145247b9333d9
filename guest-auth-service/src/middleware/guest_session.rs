use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    services::{AuthError, GuestContext},
    AppState,
};

/// Require a live `guest_session` cookie for guest-only routes.
///
/// The resolved [`GuestContext`] is stored in request extensions for
/// [`CurrentGuest`].
pub async fn guest_session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = jar
        .get(&state.config.session.cookie_name)
        .map(|c| c.value().to_string())
        .ok_or(AuthError::MissingSession)?;

    let context = state.auth_service.validate_session(&token).await?;

    tracing::debug!(guest_id = %context.guest.id, "Guest session validated");
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

/// Extractor for the guest resolved by [`guest_session_middleware`].
pub struct CurrentGuest(pub GuestContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentGuest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<GuestContext>()
            .cloned()
            .map(CurrentGuest)
            .ok_or_else(|| AuthError::MissingSession.into())
    }
}
