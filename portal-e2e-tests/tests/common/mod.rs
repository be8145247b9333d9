//! Common setup for the end-to-end suites.

#![allow(dead_code)]

use portal_e2e_tests::{init_tracing, wait_for_service, DbTiers, E2eEndpoints, PortalClient, TestDb};
use std::time::Duration;

/// Default timeout for waiting on the service.
pub const SERVICE_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for asynchronously visible rows such as audit entries.
pub const PROPAGATION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct E2eContext {
    pub endpoints: E2eEndpoints,
    pub db: TestDb,
}

impl E2eContext {
    pub fn client(&self) -> PortalClient {
        PortalClient::new(&self.endpoints).expect("Failed to build portal client")
    }
}

/// `None` when the live environment is not configured.
pub async fn setup() -> Option<E2eContext> {
    let endpoints = E2eEndpoints::from_env()?;
    init_tracing();

    wait_for_service(&endpoints, SERVICE_TIMEOUT)
        .await
        .expect("guest-auth-service not healthy");

    let tiers = DbTiers::connect(&endpoints.database_url)
        .await
        .expect("Failed to connect to portal database");

    Some(E2eContext {
        endpoints,
        db: TestDb::new(tiers),
    })
}

/// Return early from a test when the live environment is not configured.
#[macro_export]
macro_rules! skip_if_no_environment {
    () => {
        match common::setup().await {
            Some(ctx) => ctx,
            None => {
                eprintln!(
                    "Skipping e2e test (PORTAL_E2E_BASE_URL / PORTAL_E2E_DATABASE_URL not set)"
                );
                return;
            }
        }
    };
}
