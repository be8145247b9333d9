//! Guest authentication against a live service.

mod common;

use chrono::{Duration, Utc};
use common::PROPAGATION_TIMEOUT;
use guest_auth_service::models::AuthMethod;
use portal_e2e_tests::wait_for;
use reqwest::StatusCode;
use serde_json::Value;
use serial_test::serial;
use std::time::Duration as StdDuration;

#[tokio::test]
#[serial]
async fn email_match_login_sets_session_cookie() {
    let ctx = skip_if_no_environment!();
    let guest = ctx.db.create_household(AuthMethod::EmailMatching).await.unwrap();
    let client = ctx.client();

    let started = Utc::now();
    let res = client.email_match(&guest.email.to_uppercase()).await.unwrap();
    let finished = Utc::now();
    assert_eq!(res.status(), StatusCode::OK);

    let set_cookie = res
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Max-Age=86400"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["guestId"], guest.id.to_string());
    assert!(client.session_cookie().is_some());

    let expiries = ctx.db.session_expiries(guest.id).await.unwrap();
    assert_eq!(expiries.len(), 1);
    assert!(expiries[0] >= started + Duration::hours(24) - Duration::seconds(1));
    assert!(expiries[0] <= finished + Duration::hours(24) + Duration::seconds(1));

    let res = client.current_session().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let db = &ctx.db;
    let guest_id = guest.id;
    let audit = wait_for(PROPAGATION_TIMEOUT, StdDuration::from_millis(100), || async move {
        let rows = db.audit_details(guest_id, "guest_login").await?;
        Ok((!rows.is_empty()).then_some(rows))
    })
    .await
    .unwrap();
    assert_eq!(audit[0]["auth_method"], "email_matching");

    ctx.db.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn method_mismatch_is_not_found_on_both_endpoints() {
    let ctx = skip_if_no_environment!();
    let email_guest = ctx.db.create_household(AuthMethod::EmailMatching).await.unwrap();
    let link_guest = ctx.db.create_household(AuthMethod::MagicLink).await.unwrap();
    let client = ctx.client();

    let res = client.email_match(&link_guest.email).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.request_magic_link(&email_guest.email).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(ctx
        .db
        .latest_magic_link_token(email_guest.id)
        .await
        .unwrap()
        .is_none());

    ctx.db.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn magic_link_request_verify_and_reuse() {
    let ctx = skip_if_no_environment!();
    let guest = ctx.db.create_household(AuthMethod::MagicLink).await.unwrap();
    let client = ctx.client();

    let res = client.request_magic_link(&guest.email).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["message"], "Magic link sent to your email");
    assert_eq!(body["data"]["expiresIn"], 900);

    let row = ctx
        .db
        .latest_magic_link_token(guest.id)
        .await
        .unwrap()
        .expect("token stored");
    assert_eq!(row.token.len(), 64);
    assert!(!row.used);
    assert_eq!(row.expires_at - row.created_at, Duration::minutes(15));

    let res = client.verify_magic_link(&row.token).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(client.session_cookie().is_some());

    let used = ctx.db.token_row(&row.token).await.unwrap().unwrap();
    assert!(used.used);
    assert!(used.used_at.is_some());

    let second = ctx.client();
    let res = second.verify_magic_link(&row.token).await.unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "TOKEN_USED");
    assert!(second.session_cookie().is_none());

    ctx.db.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn expired_magic_link_is_gone() {
    let ctx = skip_if_no_environment!();
    let guest = ctx.db.create_household(AuthMethod::MagicLink).await.unwrap();
    let token = ctx
        .db
        .insert_magic_link_token(guest.id, Utc::now() - Duration::minutes(5))
        .await
        .unwrap();
    let client = ctx.client();

    let res = client.verify_magic_link(&token).await.unwrap();
    assert_eq!(res.status(), StatusCode::GONE);
    assert!(client.session_cookie().is_none());
    assert!(ctx.db.session_expiries(guest.id).await.unwrap().is_empty());

    let db = &ctx.db;
    let guest_id = guest.id;
    let failures = wait_for(PROPAGATION_TIMEOUT, StdDuration::from_millis(100), || async move {
        let rows = db
            .audit_details(guest_id, "magic_link_verification_failed")
            .await?;
        Ok((!rows.is_empty()).then_some(rows))
    })
    .await
    .unwrap();
    assert_eq!(failures[0]["reason"], "token_expired");

    ctx.db.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn concurrent_verification_has_one_winner() {
    let ctx = skip_if_no_environment!();
    let guest = ctx.db.create_household(AuthMethod::MagicLink).await.unwrap();
    let token = ctx.db.insert_valid_magic_link_token(guest.id).await.unwrap();

    let clients: Vec<_> = (0..5).map(|_| ctx.client()).collect();
    let mut handles = Vec::new();
    for client in clients {
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            client.verify_magic_link(&token).await.map(|r| r.status())
        }));
    }

    let mut ok = 0;
    for handle in handles {
        let status = handle.await.unwrap().unwrap();
        if status == StatusCode::OK {
            ok += 1;
        } else {
            assert_eq!(status, StatusCode::CONFLICT);
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(ctx.db.session_expiries(guest.id).await.unwrap().len(), 1);

    ctx.db.cleanup().await.unwrap();
}

#[tokio::test]
#[serial]
async fn logout_ends_the_session() {
    let ctx = skip_if_no_environment!();
    let guest = ctx.db.create_household(AuthMethod::EmailMatching).await.unwrap();
    let client = ctx.client();

    assert_eq!(
        client.email_match(&guest.email).await.unwrap().status(),
        StatusCode::OK
    );
    assert_eq!(client.logout().await.unwrap().status(), StatusCode::OK);
    assert!(client.session_cookie().is_none());
    assert_eq!(
        client.current_session().await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );
    assert!(ctx.db.session_expiries(guest.id).await.unwrap().is_empty());

    ctx.db.cleanup().await.unwrap();
}
