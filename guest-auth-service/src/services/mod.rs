//! Services layer for guest-auth-service.
//!
//! Business rules live in [`GuestAuthService`]; storage and mail delivery
//! sit behind the [`GuestAuthStore`] and [`MagicLinkMailer`] traits.

mod auth;
mod database;
pub mod email;
pub mod error;
mod memory;
pub mod metrics;
mod store;
pub mod token;

pub use auth::{AuthSettings, GuestAuthService, GuestContext, IssuedSession, MagicLinkIssued};
pub use database::Database;
pub use email::{LogMailer, MagicLinkEmail, MagicLinkMailer, MockMailer, SmtpMailer};
pub use error::AuthError;
pub use memory::InMemoryStore;
pub use store::GuestAuthStore;
