use axum::{
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::{header, request::Parts, HeaderMap},
    Form, Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use std::collections::HashSet;
use std::convert::Infallible;
use validator::Validate;

/// Whether the caller is a browser form post or an API client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Json,
    Form,
}

impl SubmissionKind {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if content_type.starts_with("application/x-www-form-urlencoded")
            || content_type.starts_with("multipart/form-data")
        {
            SubmissionKind::Form
        } else {
            SubmissionKind::Json
        }
    }

    pub fn is_form(&self) -> bool {
        matches!(self, SubmissionKind::Form)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for SubmissionKind
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SubmissionKind::from_headers(&parts.headers))
    }
}

/// Body extractor accepting JSON, an urlencoded form or multipart form
/// data, then running `validator` rules. Every failure is a
/// `VALIDATION_ERROR`.
pub struct ValidatedPayload<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedPayload<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value = match SubmissionKind::from_headers(req.headers()) {
            SubmissionKind::Form if is_multipart(req.headers()) => {
                let multipart = Multipart::from_request(req, state).await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Invalid form body: {}", e.body_text()))
                })?;
                multipart_fields(multipart).await?
            }
            SubmissionKind::Form => {
                let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Invalid form body: {}", e.body_text()))
                })?;
                value
            }
            SubmissionKind::Json => {
                let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Invalid JSON body: {}", e.body_text()))
                })?;
                value
            }
        };

        value.validate()?;

        Ok(ValidatedPayload(value))
    }
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

/// Collects the named text fields of a multipart body into `T`. File parts
/// and repeated names are ignored after the first value.
async fn multipart_fields<T: DeserializeOwned>(mut multipart: Multipart) -> Result<T, AppError> {
    let mut fields = serde_json::Map::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid form body: {}", e.body_text())))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() || fields.contains_key(&name) {
            continue;
        }
        let text = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid form body: {}", e.body_text())))?;
        fields.insert(name, serde_json::Value::String(text));
    }

    serde_json::from_value(serde_json::Value::Object(fields))
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid form body: {}", e)))
}

/// Strip all markup and control characters, then trim.
///
/// No tags survive. `script` and `style` elements are dropped with their
/// content; other tags keep their text. The result is HTML-safe text.
pub fn sanitize_input(input: &str) -> String {
    let text: String = input.chars().filter(|c| !c.is_control()).collect();

    ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(&text)
        .to_string()
        .trim()
        .to_string()
}

/// Canonical form used for guest lookups.
pub fn normalize_email(email: &str) -> String {
    sanitize_input(&email.trim().to_lowercase())
}
