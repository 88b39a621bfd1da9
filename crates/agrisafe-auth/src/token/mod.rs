//! Session token issuance, validation, and refresh.
//!
//! This module provides:
//!
//! - Strongly typed session claims
//! - HS256 encoding and decoding with explicit expiry checks
//! - Refresh within the trailing half of a token's lifetime

pub mod claims;
pub mod codec;

pub use claims::{SessionClaims, SessionToken};
pub use codec::TokenCodec;
