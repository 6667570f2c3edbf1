//! API Middleware
//!
//! Admin token authentication and instance hostname detection.

pub mod auth;
pub mod hostname;

pub use auth::{require_admin, AdminToken};
pub use hostname::detect_hostname;
