//! Domain entities persisted by the guest authentication store.

mod audit_log;
mod guest;
mod magic_link_token;
mod session;

pub use audit_log::{AuditAction, AuditLogEntry};
pub use guest::{AuthMethod, Group, Guest};
pub use magic_link_token::MagicLinkToken;
pub use session::GuestSession;
