//! Storage traits for identity data.
//!
//! This module defines storage interfaces for:
//!
//! - User accounts
//! - Email verification tokens
//!
//! # Implementations
//!
//! - [`MemoryAuthStorage`] - in-process backend for tests and development
//! - `agrisafe-auth-postgres` - PostgreSQL storage backend

pub mod memory;
pub mod user;
pub mod verification;

pub use memory::MemoryAuthStorage;
pub use user::{PublicUser, Role, User, UserStorage};
pub use verification::{EmailVerificationToken, VerificationTokenStorage};
