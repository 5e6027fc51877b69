//! Alert transports — SMTP and SMS handoff
//!
//! Transports are external collaborators behind [`AlertTransport`]; the
//! dispatcher only cares that a send either succeeded or failed. Failures
//! never block the pipeline.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, warn};

use crate::config::{SmsConfig, SmtpConfig};

use super::Alert;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport not configured: {0}")]
    NotConfigured(&'static str),
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("SMS API error: {0}")]
    Http(String),
}

/// One delivery channel for alerts.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, alert: &Alert) -> Result<(), TransportError>;
}

// ============================================================================
// SMTP (email)
// ============================================================================

/// Email delivery over SMTP.
pub struct SmtpAlertTransport {
    config: SmtpConfig,
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpAlertTransport {
    pub fn new(config: SmtpConfig) -> Self {
        let mailer = if config.is_configured() {
            match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host) {
                Ok(builder) => Some(
                    builder
                        .port(config.port)
                        .credentials(Credentials::new(
                            config.user.clone(),
                            config.password.clone(),
                        ))
                        .build(),
                ),
                Err(e) => {
                    warn!(error = %e, host = %config.host, "Failed to build SMTP transport");
                    None
                }
            }
        } else {
            None
        };
        Self { config, mailer }
    }
}

#[async_trait]
impl AlertTransport for SmtpAlertTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, alert: &Alert) -> Result<(), TransportError> {
        let Some(mailer) = &self.mailer else {
            return Err(TransportError::NotConfigured("smtp"));
        };

        let subject = format!(
            "[{}] {} — {}",
            alert.level, alert.truck_id, alert.alert_type
        );
        let body = match &alert.action {
            Some(action) => format!("{}\n\nAcción recomendada: {}", alert.message, action),
            None => alert.message.clone(),
        };

        for to in &self.config.to_emails {
            let message = Message::builder()
                .from(
                    self.config
                        .from_email
                        .parse()
                        .map_err(|e| TransportError::Smtp(format!("bad from address: {e}")))?,
                )
                .to(to
                    .parse()
                    .map_err(|e| TransportError::Smtp(format!("bad to address: {e}")))?)
                .subject(&subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| TransportError::Smtp(e.to_string()))?;

            mailer
                .send(message)
                .await
                .map_err(|e| TransportError::Smtp(e.to_string()))?;
            debug!(to = %to, subject = %subject, "Alert email sent");
        }
        Ok(())
    }
}

// ============================================================================
// SMS (HTTP API)
// ============================================================================

/// SMS delivery through an HTTP gateway.
pub struct SmsAlertTransport {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsAlertTransport {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertTransport for SmsAlertTransport {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn send(&self, alert: &Alert) -> Result<(), TransportError> {
        if !self.config.is_configured() {
            return Err(TransportError::NotConfigured("sms"));
        }

        let text = format!("[{}] {}: {}", alert.level, alert.truck_id, alert.message);
        for to in &self.config.to_numbers {
            let response = self
                .client
                .post(&self.config.api_url)
                .header("x-api-key", &self.config.api_key)
                .json(&serde_json::json!({ "to": to, "message": text }))
                .send()
                .await
                .map_err(|e| TransportError::Http(e.to_string()))?;

            if !response.status().is_success() {
                return Err(TransportError::Http(format!(
                    "SMS gateway returned {}",
                    response.status()
                )));
            }
            debug!(to = %to, "Alert SMS sent");
        }
        Ok(())
    }
}

// ============================================================================
// Test double
// ============================================================================

/// In-memory transport that records every alert it receives.
#[derive(Debug, Default)]
pub struct CaptureTransport {
    pub sent: std::sync::Mutex<Vec<Alert>>,
    /// When set, every send fails (for retry-path tests)
    pub fail: std::sync::atomic::AtomicBool,
}

impl CaptureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AlertTransport for CaptureTransport {
    fn name(&self) -> &'static str {
        "capture"
    }

    async fn send(&self, alert: &Alert) -> Result<(), TransportError> {
        if self.fail.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(TransportError::Http("simulated failure".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(alert.clone());
        }
        Ok(())
    }
}
