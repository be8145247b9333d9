//! Guest authentication endpoints.
//!
//! API clients get the JSON envelope. Browser form posts get `303` redirects
//! to the portal pages, carrying `error`/`message` query parameters on
//! failure.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{
            EmailMatchResponse, EmailRequest, MagicLinkRequestResponse, MagicLinkVerifyResponse,
            MessageResponse, VerifyRequest,
        },
        ApiResponse,
    },
    utils::{expired_session_cookie, session_cookie, ClientInfo, SubmissionKind, ValidatedPayload},
    AppState,
};

const DASHBOARD_PATH: &str = "/guest/dashboard";
const LOGIN_PATH: &str = "/auth/guest-login";
const VERIFY_PAGE_PATH: &str = "/auth/guest-login/verify";

/// POST /api/guest-auth/email-match
pub async fn email_match(
    State(state): State<AppState>,
    kind: SubmissionKind,
    client: ClientInfo,
    jar: CookieJar,
    payload: Result<ValidatedPayload<EmailRequest>, AppError>,
) -> Response {
    let result = match payload {
        Ok(ValidatedPayload(req)) => state
            .auth_service
            .authenticate_by_email(&req.email, &client)
            .await
            .map_err(AppError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(issued) => {
            let jar = jar.add(session_cookie(&state.config.session, issued.session_token.clone()));
            if kind.is_form() {
                (jar, Redirect::to(DASHBOARD_PATH)).into_response()
            } else {
                (jar, Json(ApiResponse::ok(EmailMatchResponse::from(&issued)))).into_response()
            }
        }
        Err(e) if kind.is_form() => login_error_redirect(&e).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/guest-auth/magic-link/request
pub async fn request_magic_link(
    State(state): State<AppState>,
    kind: SubmissionKind,
    client: ClientInfo,
    payload: Result<ValidatedPayload<EmailRequest>, AppError>,
) -> Response {
    let result = match payload {
        Ok(ValidatedPayload(req)) => state
            .auth_service
            .request_magic_link(&req.email, &client)
            .await
            .map_err(AppError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(_) if kind.is_form() => {
            let message = format!(
                "Check your email for a login link. It will expire in {} minutes.",
                state.auth_service.settings().magic_link_ttl_minutes
            );
            redirect_with(LOGIN_PATH, &[("success", "magic_link_sent"), ("message", &message)])
                .into_response()
        }
        Ok(issued) => Json(ApiResponse::ok(MagicLinkRequestResponse::from(&issued))).into_response(),
        Err(e) if kind.is_form() => login_error_redirect(&e).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/guest-auth/magic-link/verify?token=...
pub async fn verify_magic_link_query(
    State(state): State<AppState>,
    client: ClientInfo,
    jar: CookieJar,
    query: Option<Query<VerifyRequest>>,
) -> Response {
    let token = query.and_then(|Query(q)| q.token);
    verify(&state, SubmissionKind::Json, &client, jar, token).await
}

/// POST /api/guest-auth/magic-link/verify
pub async fn verify_magic_link_form(
    State(state): State<AppState>,
    kind: SubmissionKind,
    client: ClientInfo,
    jar: CookieJar,
    payload: Result<ValidatedPayload<VerifyRequest>, AppError>,
) -> Response {
    let token = match payload {
        Ok(ValidatedPayload(req)) => req.token,
        Err(e) if !kind.is_form() => return e.into_response(),
        Err(_) => None,
    };
    verify(&state, kind, &client, jar, token).await
}

async fn verify(
    state: &AppState,
    kind: SubmissionKind,
    client: &ClientInfo,
    jar: CookieJar,
    token: Option<String>,
) -> Response {
    match state
        .auth_service
        .verify_magic_link(token.as_deref(), client)
        .await
    {
        Ok(issued) => {
            let jar = jar.add(session_cookie(&state.config.session, issued.session_token.clone()));
            if kind.is_form() {
                (jar, Redirect::to(DASHBOARD_PATH)).into_response()
            } else {
                (jar, Json(ApiResponse::ok(MagicLinkVerifyResponse::from(&issued)))).into_response()
            }
        }
        Err(e) if kind.is_form() => {
            let code = e.verify_page_code();
            let message = AppError::from(e).public_message();
            redirect_with(VERIFY_PAGE_PATH, &[("error", code), ("message", &message)])
                .into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

/// POST /api/guest-auth/logout
///
/// Always succeeds and always expires the cookie.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let token = jar
        .get(&state.config.session.cookie_name)
        .map(|c| c.value().to_string());

    if let Err(e) = state.auth_service.logout(token.as_deref()).await {
        tracing::error!(error = %e, "Failed to delete guest session on logout");
    }

    let jar = jar.add(expired_session_cookie(&state.config.session));
    (
        jar,
        Json(ApiResponse::ok(MessageResponse {
            message: "Logged out successfully".to_string(),
        })),
    )
        .into_response()
}

fn login_error_redirect(err: &AppError) -> Redirect {
    let (code, message) = match err {
        AppError::ValidationError(_) | AppError::BadRequest(_) => {
            ("invalid_email", "Invalid email format".to_string())
        }
        AppError::NotFound(_) => ("not_found", err.public_message()),
        AppError::TooManyRequests(msg, _) => ("rate_limited", msg.clone()),
        _ => ("server_error", "An unexpected error occurred".to_string()),
    };
    redirect_with(LOGIN_PATH, &[("error", code), ("message", &message)])
}

fn redirect_with(path: &str, params: &[(&str, &str)]) -> Redirect {
    match serde_urlencoded::to_string(params) {
        Ok(query) => Redirect::to(&format!("{}?{}", path, query)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode redirect parameters");
            Redirect::to(path)
        }
    }
}
