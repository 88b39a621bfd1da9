//! Authentication error types.
//!
//! Every failure produced by the token codec, the verification store, the OIDC
//! federator, the identity resolver and the orchestrator is an [`AuthError`].
//! Each kind is a distinct variant so callers can tell them apart without
//! string matching.

use std::fmt;

/// Errors that can occur during identity and token lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The session token signature did not verify, or it was signed with an
    /// algorithm other than the expected one.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The session token is structurally invalid or has missing/mistyped claims.
    #[error("Malformed token: {message}")]
    MalformedToken {
        /// Description of what is wrong with the token.
        message: String,
    },

    /// The session token has expired.
    #[error("Token expired")]
    Expired,

    /// The session token is outside the refresh window.
    #[error("Token is not eligible for refresh yet")]
    NotEligibleForRefresh,

    /// The state returned by the provider does not match the stored state.
    #[error("CSRF state mismatch")]
    CsrfStateMismatch,

    /// Exchanging the authorization code with the provider failed.
    #[error("Code exchange failed: {message}")]
    CodeExchangeFailed {
        /// Transport or provider-side reason.
        message: String,
    },

    /// The provider token response did not carry an ID token.
    #[error("Token response did not contain an ID token")]
    MissingIdToken,

    /// The ID token failed cryptographic or claim verification.
    #[error("ID token verification failed: {message}")]
    IdTokenVerificationFailed {
        /// Description of the verification failure.
        message: String,
    },

    /// The verified ID token lacks required profile claims.
    #[error("Malformed profile claims: {message}")]
    MalformedProfileClaims {
        /// Description of the missing or invalid claim.
        message: String,
    },

    /// A user with the given email already exists.
    #[error("Email is already registered")]
    EmailAlreadyRegistered,

    /// No email verification token matches.
    #[error("Verification token not found")]
    TokenNotFound,

    /// The email verification token has expired.
    #[error("Verification token expired")]
    TokenExpired,

    /// The email verification token has already been consumed.
    #[error("Verification token already used")]
    TokenAlreadyUsed,

    /// The persistence layer failed.
    #[error("Persistence error: {message}")]
    Persistence {
        /// Description of the storage failure.
        message: String,
    },

    /// Request input failed shape validation.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the invalid field.
        message: String,
    },

    /// The request carried no session token.
    #[error("Unauthenticated: {message}")]
    Unauthenticated {
        /// Description of what was missing.
        message: String,
    },

    /// Federated login was requested but no provider is configured.
    #[error("OIDC provider is not configured")]
    OidcNotConfigured,

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    /// Creates a new `CodeExchangeFailed` error.
    #[must_use]
    pub fn code_exchange_failed(message: impl Into<String>) -> Self {
        Self::CodeExchangeFailed {
            message: message.into(),
        }
    }

    /// Creates a new `IdTokenVerificationFailed` error.
    #[must_use]
    pub fn id_token_verification_failed(message: impl Into<String>) -> Self {
        Self::IdTokenVerificationFailed {
            message: message.into(),
        }
    }

    /// Creates a new `MalformedProfileClaims` error.
    #[must_use]
    pub fn malformed_profile_claims(message: impl Into<String>) -> Self {
        Self::MalformedProfileClaims {
            message: message.into(),
        }
    }

    /// Creates a new `Persistence` error.
    #[must_use]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthenticated` error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the failure was caused by the caller's input (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature
                | Self::MalformedToken { .. }
                | Self::Expired
                | Self::NotEligibleForRefresh
                | Self::CsrfStateMismatch
                | Self::EmailAlreadyRegistered
                | Self::TokenNotFound
                | Self::TokenExpired
                | Self::TokenAlreadyUsed
                | Self::InvalidInput { .. }
                | Self::Unauthenticated { .. }
        )
    }

    /// Returns `true` if the failure originates on the server or upstream (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns `true` if this is a session token error.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature
                | Self::MalformedToken { .. }
                | Self::Expired
                | Self::NotEligibleForRefresh
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSignature
            | Self::MalformedToken { .. }
            | Self::Expired
            | Self::NotEligibleForRefresh => ErrorCategory::Token,
            Self::CsrfStateMismatch | Self::Unauthenticated { .. } => ErrorCategory::Authentication,
            Self::CodeExchangeFailed { .. }
            | Self::MissingIdToken
            | Self::IdTokenVerificationFailed { .. }
            | Self::MalformedProfileClaims { .. }
            | Self::OidcNotConfigured => ErrorCategory::Federation,
            Self::EmailAlreadyRegistered | Self::InvalidInput { .. } => ErrorCategory::Validation,
            Self::TokenNotFound | Self::TokenExpired | Self::TokenAlreadyUsed => {
                ErrorCategory::Verification
            }
            Self::Persistence { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns a stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid_signature",
            Self::MalformedToken { .. } => "malformed_token",
            Self::Expired => "token_expired",
            Self::NotEligibleForRefresh => "not_eligible_for_refresh",
            Self::CsrfStateMismatch => "csrf_state_mismatch",
            Self::CodeExchangeFailed { .. } => "code_exchange_failed",
            Self::MissingIdToken => "missing_id_token",
            Self::IdTokenVerificationFailed { .. } => "id_token_verification_failed",
            Self::MalformedProfileClaims { .. } => "malformed_profile_claims",
            Self::EmailAlreadyRegistered => "email_already_registered",
            Self::TokenNotFound => "verification_token_not_found",
            Self::TokenExpired => "verification_token_expired",
            Self::TokenAlreadyUsed => "verification_token_used",
            Self::Persistence { .. } => "persistence_error",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Unauthenticated { .. } => "unauthenticated",
            Self::OidcNotConfigured => "oidc_not_configured",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

/// Categories of authentication errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Session token validation and refresh.
    Token,
    /// Caller identity checks.
    Authentication,
    /// External identity provider federation.
    Federation,
    /// Email verification token lifecycle.
    Verification,
    /// Request validation.
    Validation,
    /// Storage failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Authentication => write!(f, "authentication"),
            Self::Federation => write!(f, "federation"),
            Self::Verification => write!(f, "verification"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
