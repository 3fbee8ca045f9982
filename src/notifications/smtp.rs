//! SMTP email provider implementation.
//!
//! Talks plain SMTP to a relay (a local MTA or mail sidecar) that takes
//! care of onward delivery.

use super::{EmailContent, EmailError, EmailProvider};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// SMTP email provider.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpProvider {
    /// Create a new SMTP provider.
    pub fn new(
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        from: &str,
    ) -> Result<Self, EmailError> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| EmailError::InvalidConfig(format!("Invalid from address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, to: &str, content: &EmailContent) -> Result<(), EmailError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| EmailError::SendFailed(format!("Invalid to address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(content.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(content.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(content.html.clone()),
                    ),
            )
            .map_err(|e| EmailError::SendFailed(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provider_creation_with_credentials() {
        let provider = SmtpProvider::new(
            "localhost",
            2525,
            Some("user".to_string()),
            Some("pass".to_string()),
            "Anemi Meets <noreply@anemimeets.local>",
        );
        assert!(provider.is_ok());
    }

    #[tokio::test]
    async fn bad_sender_is_a_config_error() {
        let provider = SmtpProvider::new("localhost", 25, None, None, "not an address");
        assert!(matches!(provider, Err(EmailError::InvalidConfig(_))));
    }
}
