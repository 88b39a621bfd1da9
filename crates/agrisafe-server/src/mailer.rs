//! SMTP delivery of verification mail.

use agrisafe_auth::{MailError, User, VerificationMailer};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use url::Url;

use crate::config::MailConfig;

const SUBJECT: &str = "Confirm your AgriSafe email address";

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the relay transport. No connection is opened until the first send.
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| MailError::InvalidConfig(format!("Invalid from: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| MailError::InvalidConfig(e.to_string()))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn message(&self, user: &User, link: &Url) -> Result<Message, MailError> {
        let to: Mailbox = user
            .email
            .parse()
            .map_err(|e| MailError::InvalidConfig(format!("Invalid recipient: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(verification_body(&user.name, link))
            .map_err(|e| MailError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl VerificationMailer for SmtpMailer {
    async fn send_verification(&self, user: &User, link: &Url) -> Result<(), MailError> {
        let message = self.message(user, link)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        tracing::info!(user_id = %user.id, "Verification mail sent");
        Ok(())
    }
}

fn verification_body(name: &str, link: &Url) -> String {
    format!(
        r#"Hello {name},

Welcome to AgriSafe. Please confirm your email address by opening the link below:

{link}

If you did not create an account, you can ignore this message.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn config(from: &str) -> MailConfig {
        MailConfig {
            host: "smtp.example.org".into(),
            port: 587,
            username: Some("user".into()),
            password: Some("pass".into()),
            from: from.into(),
        }
    }

    #[test]
    fn test_rejects_bad_sender() {
        assert!(matches!(
            SmtpMailer::new(&config("not an address")),
            Err(MailError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_builds_message() {
        let mailer = SmtpMailer::new(&config("AgriSafe <no-reply@agrisafe.example>")).unwrap();
        let user = User::new_federated("Alice", "alice@example.com", false, OffsetDateTime::now_utc());
        let link = Url::parse("https://app.example/verify-email?token=abc").unwrap();

        let message = mailer.message(&user, &link).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: alice@example.com"));
        assert!(raw.contains(SUBJECT));
        assert!(raw.contains("https://app.example/verify-email?token=abc"));
    }
}
