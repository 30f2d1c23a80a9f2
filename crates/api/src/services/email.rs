//! Transactional email over SMTP.
//!
//! Uses lettre for delivery with Askama templates (HTML plus a plain text
//! alternative).

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

const PASSWORD_RESET_SUBJECT: &str = "Your password reset token (valid for 10 min)";

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    reset_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    reset_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// Port 465 uses implicit TLS, 587 uses STARTTLS, anything else talks
    /// plain SMTP (local relays and mail catchers).
    ///
    /// # Errors
    ///
    /// Returns error if the TLS relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let mut builder = match config.smtp_port {
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?,
            587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?,
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host),
        }
        .port(config.smtp_port);

        if let Some(username) = &config.smtp_username {
            let password = config
                .smtp_password
                .as_ref()
                .map(|p| p.expose_secret().to_string())
                .unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(Self {
            mailer: builder.build(),
            from_address: config.from_address.clone(),
        })
    }

    /// Send the password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        reset_url: &str,
    ) -> Result<(), EmailError> {
        let html = PasswordResetHtml { name, reset_url }.render()?;
        let text = PasswordResetText { name, reset_url }.render()?;

        self.send_multipart_email(to, PASSWORD_RESET_SUBJECT, &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_reset_templates_include_link() {
        let reset_url = "http://127.0.0.1:4000/api/v1/users/reset-password/abc123";
        let html = PasswordResetHtml {
            name: "Ann",
            reset_url,
        }
        .render()
        .unwrap();
        let text = PasswordResetText {
            name: "Ann",
            reset_url,
        }
        .render()
        .unwrap();

        assert!(html.contains(&format!("href=\"{reset_url}\"")));
        assert!(text.contains(reset_url));
        assert!(text.starts_with("Hi Ann,"));
    }

    #[test]
    fn test_html_escapes_name() {
        let html = PasswordResetHtml {
            name: "<b>Ann</b>",
            reset_url: "http://x",
        }
        .render()
        .unwrap();
        assert!(!html.contains("<b>Ann</b>"));
    }

    #[tokio::test]
    async fn test_new_without_credentials() {
        let config = EmailConfig {
            smtp_host: "localhost".into(),
            smtp_port: 1025,
            smtp_username: None,
            smtp_password: None,
            from_address: "Shop <noreply@example.com>".into(),
        };
        assert!(EmailService::new(&config).is_ok());
    }
}
