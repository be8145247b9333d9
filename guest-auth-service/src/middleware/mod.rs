pub mod guest_session;

pub use guest_session::{guest_session_middleware, CurrentGuest};
