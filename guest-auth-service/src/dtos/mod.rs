pub mod auth;

pub use service_core::error::ApiResponse;
