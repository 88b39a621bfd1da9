//! Axum integration: error rendering and session extractors.
//!
//! # Example
//!
//! ```ignore
//! use agrisafe_auth::middleware::SessionAuth;
//!
//! async fn me(SessionAuth(claims): SessionAuth) -> String {
//!     format!("Hello, {}!", claims.email)
//! }
//! ```

pub mod error;
pub mod session;

pub use error::status_for;
pub use session::{AuthState, SessionAuth, SessionTokenString, extract_session_token};
