use axum::Json;

use crate::{
    dtos::{auth::SessionResponse, ApiResponse},
    middleware::CurrentGuest,
};

/// Current guest for a valid session cookie.
pub async fn current_session(
    CurrentGuest(context): CurrentGuest,
) -> Json<ApiResponse<SessionResponse>> {
    Json(ApiResponse::ok(SessionResponse::from(&context)))
}
