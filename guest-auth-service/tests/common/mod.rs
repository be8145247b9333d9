//! Shared setup for guest-auth-service integration tests.
//!
//! Routers are driven in-process with `tower::ServiceExt::oneshot` against
//! an [`InMemoryStore`] and a [`MockMailer`].

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use guest_auth_service::{
    build_router,
    config::GuestAuthConfig,
    models::{AuthMethod, Group, Guest},
    services::{GuestAuthStore, InMemoryStore, MockMailer},
    AppState,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: InMemoryStore,
    pub mailer: MockMailer,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: GuestAuthConfig) -> Self {
        Self::with_mailer(config, MockMailer::new()).await
    }

    pub async fn with_mailer(config: GuestAuthConfig, mailer: MockMailer) -> Self {
        let store = InMemoryStore::new();
        Self::with_backend(config, store.clone(), Arc::new(store), mailer).await
    }

    /// Serve from `backend` while seeding and inspecting through `store`,
    /// for backends that wrap the in-memory store.
    pub async fn with_backend(
        config: GuestAuthConfig,
        store: InMemoryStore,
        backend: Arc<dyn GuestAuthStore>,
        mailer: MockMailer,
    ) -> Self {
        let state = AppState::new(config, backend, Arc::new(mailer.clone()));
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            store,
            mailer,
        }
    }

    /// Seed a group with one guest.
    pub fn seed_guest(
        &self,
        group_name: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        method: AuthMethod,
    ) -> Guest {
        let group = Group::new(group_name);
        self.store.insert_group(&group).expect("insert group");
        self.add_guest(&group, first_name, last_name, email, method)
    }

    pub fn add_guest(
        &self,
        group: &Group,
        first_name: &str,
        last_name: &str,
        email: &str,
        method: AuthMethod,
    ) -> Guest {
        let guest = Guest::new(group.id, first_name, last_name, email, method);
        self.store.insert_guest(&guest).expect("insert guest");
        guest
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(json_request("POST", uri, body)).await
    }

    pub async fn post_form(&self, uri: &str, body: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_multipart(&self, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
        const BOUNDARY: &str = "----guest-portal-boundary";
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_with_cookie(&self, uri: &str, cookie: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Request a magic link for `email` and return the mailed token.
    pub async fn issue_magic_link(&self, email: &str) -> String {
        let res = self
            .post_json(
                "/api/guest-auth/magic-link/request",
                serde_json::json!({ "email": email }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        self.mailer
            .last_token_for(email)
            .expect("magic link was mailed")
    }

    /// Log in with email matching and return the `name=value` cookie pair.
    pub async fn login_by_email(&self, email: &str) -> String {
        let res = self
            .post_json(
                "/api/guest-auth/email-match",
                serde_json::json!({ "email": email }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        session_cookie_pair(&res).expect("session cookie set")
    }
}

/// Development defaults with limits wide enough for multi-request tests.
pub fn test_config() -> GuestAuthConfig {
    let mut config = GuestAuthConfig::default();
    config.log_level = "error".to_string();
    config.magic_link.public_base_url = "https://portal.test".to_string();
    config
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

/// Raw `Set-Cookie` header for the session cookie, if any.
pub fn set_cookie_header(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("guest_session="))
        .map(str::to_string)
}

/// `guest_session=<value>` suitable for a `Cookie` request header.
pub fn session_cookie_pair(response: &Response<Body>) -> Option<String> {
    set_cookie_header(response)
        .and_then(|h| h.split(';').next().map(str::to_string))
        .filter(|pair| pair != "guest_session=")
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
