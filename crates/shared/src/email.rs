//! Transactional e-mail over SMTP.
//!
//! Uses `lettre` with the tokio executor. Without SMTP credentials the
//! service talks plain SMTP, which is what local mail catchers expect.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;

use crate::config::EmailConfig;

/// Lifetime of a password-reset link, as stated in the mail body.
pub const PASSWORD_RESET_TTL_MINUTES: i64 = 60;

/// Email service errors.
#[derive(Debug, Error)]
pub enum EmailError {
    /// Failed to build email message.
    #[error("Failed to build email: {0}")]
    BuildError(String),
    /// Failed to send email.
    #[error("Failed to send email: {0}")]
    SendError(String),
    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Email service for sending transactional emails.
#[derive(Debug, Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    /// Creates a new email service.
    #[must_use]
    pub const fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn create_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
        if self.config.smtp_username.is_empty() {
            return Ok(
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
                    .port(self.config.smtp_port)
                    .build(),
            );
        }

        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| EmailError::SendError(e.to_string()))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();
        Ok(transport)
    }

    /// Link the user follows to reset their password.
    #[must_use]
    pub fn password_reset_url(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={}",
            self.config.frontend_url.trim_end_matches('/'),
            token
        )
    }

    /// Builds the password-reset message without sending it.
    ///
    /// # Errors
    ///
    /// Returns an error if an address does not parse.
    pub fn password_reset_message(
        &self,
        to_email: &str,
        to_name: &str,
        token: &str,
    ) -> Result<Message, EmailError> {
        let reset_url = self.password_reset_url(token);
        let body = format!(
            r"Hi {to_name},

We received a request to reset the password of your Apotik account.
Use the link below to choose a new password:

{reset_url}

This link expires in {PASSWORD_RESET_TTL_MINUTES} minutes and can be used once.

If you did not ask for a reset, you can ignore this email.

Apotik"
        );

        self.build_message(to_email, "Reset your Apotik password", &body)
    }

    /// Sends the password-reset mail.
    ///
    /// # Errors
    ///
    /// Returns an error if the email cannot be built or sent.
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let message = self.password_reset_message(to_email, to_name, token)?;
        self.deliver(message).await
    }

    fn build_message(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<Message, EmailError> {
        let from = format!("{} <{}>", self.config.from_name, self.config.from_email);

        Message::builder()
            .from(
                from.parse()
                    .map_err(|e| EmailError::InvalidAddress(format!("{e}")))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| EmailError::InvalidAddress(format!("{e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EmailError::BuildError(e.to_string()))
    }

    async fn deliver(&self, message: Message) -> Result<(), EmailError> {
        let transport = self.create_transport()?;
        transport
            .send(message)
            .await
            .map_err(|e| EmailError::SendError(e.to_string()))?;
        Ok(())
    }
}
