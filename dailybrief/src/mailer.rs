use anyhow::{Context, Result};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

/// A fully rendered digest ready for delivery
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl OutgoingEmail {
    /// multipart/alternative message with text and HTML bodies
    pub fn to_message(&self) -> Result<Message> {
        let from: Mailbox = self
            .from
            .parse()
            .with_context(|| format!("Invalid from address: {}", self.from))?;
        let to: Mailbox = self
            .to
            .parse()
            .with_context(|| format!("Invalid to address: {}", self.to))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                self.text.clone(),
                self.html.clone(),
            ))
            .context("Failed to build email")
    }
}

/// Delivery seam; the SMTP implementation is the only production one
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// One authenticated SMTP session per send.
/// Port 465 uses implicit TLS, any other port STARTTLS.
pub struct SmtpMailer {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl SmtpMailer {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let creds = Credentials::new(self.username.clone(), self.password.clone());
        let builder = if self.port == 465 {
            SmtpTransport::relay(&self.host)
        } else {
            SmtpTransport::starttls_relay(&self.host)
        }
        .with_context(|| format!("SMTP relay error for {}", self.host))?;

        Ok(builder.port(self.port).credentials(creds).build())
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = email.to_message()?;
        let transport = self.transport()?;

        // lettre's SmtpTransport blocks; keep it off the async executor
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .context("SMTP send task panicked")?
            .context("SMTP send failed")?;

        info!("Email sent to {}", email.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            from: "brief@example.com".to_string(),
            to: "reader@example.com".to_string(),
            subject: "Daily Brief: 1 Articles, 0 Contracts".to_string(),
            html: "<h2>Daily Brief</h2>".to_string(),
            text: "Daily Brief".to_string(),
        }
    }

    #[test]
    fn builds_multipart_alternative_message() {
        let message = email().to_message().expect("build message");
        let raw = String::from_utf8(message.formatted()).expect("utf8");

        assert!(raw.contains("From: brief@example.com"));
        assert!(raw.contains("To: reader@example.com"));
        assert!(raw.contains("Subject: Daily Brief: 1 Articles, 0 Contracts"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("<h2>Daily Brief</h2>"));
    }

    #[test]
    fn invalid_address_is_an_error() {
        let mut bad = email();
        bad.to = "not an address".to_string();
        let err = bad.to_message().unwrap_err();
        assert!(err.to_string().contains("Invalid to address"));
    }
}
