//! Verification mail delivery seam.
//!
//! The orchestrator hands each new verification link to a
//! [`VerificationMailer`]. Delivery failures are logged by the caller and
//! never fail the registration.

use async_trait::async_trait;
use url::Url;

use crate::storage::User;

/// Errors raised while delivering mail.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// The mailer is misconfigured (bad sender or recipient address, relay).
    #[error("Invalid mail configuration: {0}")]
    InvalidConfig(String),

    /// The message could not be sent.
    #[error("Failed to send mail: {0}")]
    SendFailed(String),
}

/// Delivers verification links to users.
#[async_trait]
pub trait VerificationMailer: Send + Sync {
    /// Sends `link` to `user`.
    ///
    /// # Errors
    ///
    /// Returns a [`MailError`] if delivery fails.
    async fn send_verification(&self, user: &User, link: &Url) -> Result<(), MailError>;
}

/// Mailer that only records the delivery in the log. The link itself is
/// never logged because it carries the token.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl VerificationMailer for LogMailer {
    async fn send_verification(&self, user: &User, link: &Url) -> Result<(), MailError> {
        tracing::info!(
            user_id = %user.id,
            email = %user.email,
            host = link.host_str().unwrap_or_default(),
            "Verification mail delivery skipped (no SMTP configured)"
        );
        Ok(())
    }
}

/// Builds `{base}?token={token}`, keeping any query already on `base`.
///
/// # Errors
///
/// Returns a parse error if `base` is not an absolute URL.
pub fn verification_link(base: &str, token: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}
