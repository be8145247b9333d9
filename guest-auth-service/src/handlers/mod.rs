pub mod auth;
pub mod metrics;
pub mod session;

pub use auth::{email_match, logout, request_magic_link, verify_magic_link_form, verify_magic_link_query};
pub use session::current_session;
