/// One-time code delivery by email
use crate::{config::EmailConfig, error::DeliveryError};
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, Message, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};

/// Why a code is being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Login,
    Registration,
}

impl Purpose {
    pub fn subject(&self) -> &'static str {
        match self {
            Purpose::Login => "Your sign-in code",
            Purpose::Registration => "Your registration code",
        }
    }

    pub fn body_text(&self) -> &'static str {
        match self {
            Purpose::Login => {
                "We sent you this code to confirm signing in to your account. \
                 Please use it to finish the process"
            }
            Purpose::Registration => {
                "We sent you this code to complete your registration. \
                 Please use it to continue"
            }
        }
    }
}

/// A rendered message, ready for any transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMessage {
    pub subject: String,
    pub plain: String,
    pub html: String,
}

impl CodeMessage {
    pub fn compose(code: &str, purpose: Purpose) -> Self {
        let title = purpose.subject();
        let body_text = purpose.body_text();

        let html = format!(
            r#"<!DOCTYPE html>
<html>
  <body style="font-family: Arial, sans-serif; background: #f4f4f7; padding: 24px;">
    <div style="max-width: 480px; margin: 0 auto; background: #ffffff; border-radius: 8px; padding: 32px;">
      <h2 style="margin-top: 0;">{title}</h2>
      <p>{body_text}.</p>
      <p style="font-size: 32px; letter-spacing: 8px; font-weight: bold; text-align: center;">{code}</p>
      <p style="color: #888888; font-size: 12px;">If you did not request this code, ignore this email.</p>
    </div>
  </body>
</html>
"#
        );

        Self {
            subject: title.to_string(),
            plain: format!("{}: {}", body_text, code),
            html,
        }
    }
}

/// Sends codes to a destination address
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_code(
        &self,
        destination: &str,
        code: &str,
        purpose: Purpose,
    ) -> Result<(), DeliveryError>;
}

/// SMTP mailer
///
/// Configuration problems do not fail startup; they come back from every send.
#[derive(Clone)]
pub struct Mailer {
    from: Result<Mailbox, DeliveryError>,
    transport: Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError>,
}

impl Mailer {
    /// Create a new mailer
    pub fn new(config: &EmailConfig) -> Self {
        let from = match &config.from_address {
            Some(addr) => addr
                .parse::<Mailbox>()
                .map_err(|e| DeliveryError::InvalidAddress(format!("{}: {}", addr, e))),
            None => Err(DeliveryError::Misconfigured(
                "sender address is not set".to_string(),
            )),
        };

        let transport = Self::build_transport(config);
        if let Err(e) = &transport {
            tracing::warn!("Email transport unavailable: {}", e);
        }

        Self { from, transport }
    }

    fn build_transport(
        config: &EmailConfig,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| DeliveryError::Misconfigured("SMTP host is not set".to_string()))?;
        let username = config.username.clone().ok_or_else(|| {
            DeliveryError::Misconfigured("SMTP username is not set".to_string())
        })?;
        let password = config.password.clone().ok_or_else(|| {
            DeliveryError::Misconfigured("SMTP password is not set".to_string())
        })?;

        let port = config.port.unwrap_or(587);
        // 465 is implicit TLS, everything else upgrades with STARTTLS
        let builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| DeliveryError::Misconfigured(format!("SMTP setup failed: {}", e)))?;

        Ok(builder
            .port(port)
            .credentials(Credentials::new(username, password))
            .build())
    }

    /// Check if email is fully configured
    pub fn is_configured(&self) -> bool {
        self.from.is_ok() && self.transport.is_ok()
    }
}

/// Split SMTP failures into credential problems and everything else
fn classify(e: lettre::transport::smtp::Error) -> DeliveryError {
    // 530/534/535: authentication required, mechanism too weak, credentials invalid
    let auth_failure = e
        .status()
        .map(|code| matches!(code.to_string().as_str(), "530" | "534" | "535"))
        .unwrap_or(false);

    if auth_failure {
        DeliveryError::Authentication(format!(
            "{}. Check the SMTP username and password; some providers require an app password",
            e
        ))
    } else {
        DeliveryError::Transport(format!(
            "{}. Check the SMTP host and port and that outbound connections are allowed",
            e
        ))
    }
}

#[async_trait]
impl Notifier for Mailer {
    async fn send_code(
        &self,
        destination: &str,
        code: &str,
        purpose: Purpose,
    ) -> Result<(), DeliveryError> {
        let transport = self.transport.as_ref().map_err(Clone::clone)?;
        let from = self.from.clone()?;
        let to = destination
            .parse::<Mailbox>()
            .map_err(|e| DeliveryError::InvalidAddress(format!("{}: {}", destination, e)))?;

        let rendered = CodeMessage::compose(code, purpose);
        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(rendered.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(rendered.plain, rendered.html))
            .map_err(|e| DeliveryError::Transport(format!("Failed to build email: {}", e)))?;

        transport.send(email).await.map_err(classify)?;

        tracing::info!(to = destination, subject = %rendered.subject, "Sent code email");
        Ok(())
    }
}
