use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError>;
}

pub const LOGIN_CODE_SUBJECT: &str = "Your brand login code";

const CODE_STYLE: &str = "font-size: x-large; font-weight: bold; font-family: monospace;";

/// HTML body carrying the login code.
pub fn login_code_html(code: &str, ttl_minutes: i64) -> String {
    let unit = if ttl_minutes == 1 { "minute" } else { "minutes" };

    format!(
        r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Your login code</h2>
        <p>Use this code to sign in to your brand account:</p>
        <p style="{CODE_STYLE}">{code}</p>
        <p>The code is valid for {ttl_minutes} {unit} and can be used once.</p>
        <p>If you did not ask for this code, you can ignore this email.</p>
    </body>
</html>"###
    )
}

#[derive(Clone)]
pub struct SmtpEmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig, timeout: Duration) -> Result<Self, AppError> {
        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Failed to create SMTP relay: {}", e)))?
            .port(config.port)
            .credentials(creds)
            .timeout(Some(timeout))
            .build();

        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid from address: {}", e)))?;

        tracing::info!(host = %config.host, port = config.port, "SMTP email service initialized");

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?;

        match self.transport.send(message).await {
            Ok(_) => {
                tracing::debug!(to = %to, subject = %subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, subject = %subject, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

/// An email captured by [`MockEmailService`].
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

impl SentEmail {
    /// The code inside the login code paragraph, if this is a login email.
    pub fn code(&self) -> Option<String> {
        let marker = format!(r#"<p style="{CODE_STYLE}">"#);
        let start = self.html_body.find(&marker)? + marker.len();
        let rest = &self.html_body[start..];
        let code = rest[..rest.find("</p>")?].trim();
        (!code.is_empty()).then(|| code.to_string())
    }
}

/// Records messages instead of sending them.
#[derive(Default)]
pub struct MockEmailService {
    sent: Mutex<Vec<SentEmail>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long before every send.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_sent_to(&self, to: &str) -> Option<SentEmail> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::EmailError("mock email failure".to_string()));
        }

        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
            });

        tracing::info!(subject = %subject, "[MOCK] Email would be sent");
        Ok(())
    }
}
