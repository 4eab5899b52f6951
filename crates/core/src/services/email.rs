//! Verification email delivery.

use async_trait::async_trait;
use democrasite_common::{
    AppError, AppResult,
    config::{EmailConfig, RegistrationConfig},
};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use tracing::{info, warn};

/// Sends account verification emails.
///
/// Delivery is fire-and-forget: failures are reported as `false` and never
/// surface transport details to the caller.
#[async_trait]
pub trait VerificationMailer: Send + Sync {
    /// Send a verification link for `token` to `to`.
    async fn send_verification_email(&self, to: &str, username: &str, token: &str) -> bool;
}

/// Build the verification link the user follows.
#[must_use]
pub fn verification_link(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/verify-email?token={}",
        frontend_url.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}

fn render_text(username: &str, link: &str) -> String {
    format!(
        "Hello {username},\n\n\
         Thanks for signing up. Confirm your email address by opening this link:\n\n\
         {link}\n\n\
         If you did not create an account, you can ignore this message.\n"
    )
}

fn render_html(username: &str, link: &str) -> String {
    format!(
        "<p>Hello {username},</p>\
         <p>Thanks for signing up. Confirm your email address by clicking the link below:</p>\
         <p><a href=\"{link}\">Verify email</a></p>\
         <p>If you did not create an account, you can ignore this message.</p>"
    )
}

/// SMTP delivery over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    frontend_url: String,
}

impl SmtpMailer {
    /// Build a mailer from configuration.
    pub fn new(email: &EmailConfig, registration: &RegistrationConfig) -> AppResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&email.smtp_host)
            .map_err(|e| AppError::Config(format!("Invalid SMTP host: {e}")))?
            .port(email.smtp_port);

        if let (Some(username), Some(password)) = (&email.username, &email.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = format!("{} <{}>", email.from_name, email.from_address)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid from address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
            frontend_url: registration.frontend_url.clone(),
        })
    }

    fn build_message(&self, to: &str, username: &str, token: &str) -> AppResult<Message> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Validation(format!("Invalid recipient: {e}")))?;
        let link = verification_link(&self.frontend_url, token);

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("Verify your email address")
            .multipart(MultiPart::alternative_plain_html(
                render_text(username, &link),
                render_html(username, &link),
            ))
            .map_err(|e| AppError::Internal(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl VerificationMailer for SmtpMailer {
    async fn send_verification_email(&self, to: &str, username: &str, token: &str) -> bool {
        let message = match self.build_message(to, username, token) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, to = %to, "Failed to build verification email");
                return false;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %to, username = %username, "Sent verification email");
                true
            }
            Err(e) => {
                warn!(error = %e, to = %to, "Failed to send verification email");
                false
            }
        }
    }
}

/// Mailer used when no SMTP server is configured.
pub struct NoOpMailer {
    frontend_url: String,
}

impl NoOpMailer {
    /// Create a mailer that only logs the verification link.
    #[must_use]
    pub fn new(registration: &RegistrationConfig) -> Self {
        Self {
            frontend_url: registration.frontend_url.clone(),
        }
    }
}

#[async_trait]
impl VerificationMailer for NoOpMailer {
    async fn send_verification_email(&self, to: &str, username: &str, token: &str) -> bool {
        let link = verification_link(&self.frontend_url, token);
        info!(to = %to, username = %username, link = %link, "Email delivery disabled; verification link logged");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_link_encodes_token() {
        assert_eq!(
            verification_link("http://localhost:3000/", "a+b/c"),
            "http://localhost:3000/verify-email?token=a%2Bb%2Fc"
        );
    }

    #[test]
    fn test_rendered_bodies_contain_link() {
        let link = verification_link("https://vote.example", "tok");
        assert!(render_text("alice", &link).contains(&link));
        assert!(render_html("alice", &link).contains(&link));
    }

    #[tokio::test]
    async fn test_noop_mailer_reports_success() {
        let mailer = NoOpMailer::new(&RegistrationConfig::default());
        assert!(
            mailer
                .send_verification_email("alice@example.com", "alice", "tok")
                .await
        );
    }
}
