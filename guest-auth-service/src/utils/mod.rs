pub mod client;
pub mod cookie;
pub mod validation;

pub use client::ClientInfo;
pub use cookie::{expired_session_cookie, session_cookie};
pub use validation::{normalize_email, sanitize_input, SubmissionKind, ValidatedPayload};
