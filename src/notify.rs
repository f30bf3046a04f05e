use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use failsafe::futures::CircuitBreaker;
use failsafe::{backoff, failure_policy, Config};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::models::{LeadSubmission, WebhookNotification};

/// SMTP transport settings. Present only when every value was configured.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

/// Everything the dispatcher knows about its channels.
///
/// Assembled once from the environment by `Config::delivery`; the dispatcher
/// itself never reads the environment.
#[derive(Debug, Clone, Default)]
pub struct DeliveryConfig {
    pub webhook_url: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub to_address: Option<String>,
}

/// Outcome of one delivery attempt on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    WebhookDelivered,
    WebhookFailed { reason: String },
    WebhookSkipped,
    EmailSent,
    EmailFailed { reason: String },
    EmailSkipped { missing: Vec<&'static str> },
}

/// Receives delivery outcomes.
///
/// Production wires `TracingSink`; tests inject a recording sink instead of
/// scraping log output.
pub trait DeliverySink: Send + Sync {
    fn record(&self, event: DeliveryEvent);
}

/// Logs each delivery outcome through `tracing`.
pub struct TracingSink;

impl DeliverySink for TracingSink {
    fn record(&self, event: DeliveryEvent) {
        match event {
            DeliveryEvent::WebhookDelivered => tracing::info!("✓ Webhook delivered"),
            DeliveryEvent::WebhookFailed { reason } => {
                tracing::error!("Webhook failed: {}", reason)
            }
            DeliveryEvent::WebhookSkipped => tracing::debug!("Webhook not configured, skipping"),
            DeliveryEvent::EmailSent => tracing::info!("✓ Email sent"),
            DeliveryEvent::EmailFailed { reason } => tracing::error!("Email failed: {}", reason),
            DeliveryEvent::EmailSkipped { missing } => {
                tracing::warn!("Email configuration missing, skipping send: {:?}", missing)
            }
        }
    }
}

/// Channel-internal failure detail. Recorded and logged, never surfaced to
/// the HTTP caller.
#[derive(Debug)]
enum DeliveryError {
    /// The circuit breaker is open; no call was made.
    CircuitOpen,
    /// The request could not be sent, or the destination returned non-success.
    Http(String),
    /// The email message could not be built (bad mailbox, body encoding).
    Message(String),
    /// The SMTP conversation failed.
    Smtp(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::CircuitOpen => write!(f, "circuit open, call not attempted"),
            DeliveryError::Http(msg) => write!(f, "{}", msg),
            DeliveryError::Message(msg) => write!(f, "message build failed: {}", msg),
            DeliveryError::Smtp(msg) => write!(f, "SMTP send failed: {}", msg),
        }
    }
}

/// Concrete breaker type so it can live in a struct field.
type WebhookBreaker =
    failsafe::StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates the circuit breaker guarding the webhook destination.
///
/// 5 consecutive failures open the circuit; recovery probes back off
/// exponentially from 10s to 60s. While open, dispatches record a failure
/// without issuing the HTTP call.
fn create_webhook_circuit_breaker() -> WebhookBreaker {
    let backoff_strategy = backoff::exponential(Duration::from_secs(10), Duration::from_secs(60));
    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// SMTP transport plus the from-address derived from the SMTP user.
#[derive(Clone)]
struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

/// Fans a validated lead out to the configured delivery channels.
///
/// Both channels are best effort: every failure is recorded through the sink
/// and contained here, so intake never fails because a destination is down.
pub struct NotificationDispatcher {
    http: reqwest::Client,
    breaker: WebhookBreaker,
    email: Option<EmailChannel>,
    config: DeliveryConfig,
    sink: Arc<dyn DeliverySink>,
}

impl NotificationDispatcher {
    /// Builds the dispatcher and its channel clients.
    ///
    /// The HTTP client and SMTP transport are constructed once, each with a
    /// 10 second timeout so a stalled destination cannot pin intake requests.
    pub fn new(config: DeliveryConfig, sink: Arc<dyn DeliverySink>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let email = match &config.smtp {
            Some(smtp) => {
                let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
                    .port(smtp.port)
                    .credentials(Credentials::new(smtp.user.clone(), smtp.pass.clone()))
                    .timeout(Some(Duration::from_secs(10)))
                    .build();
                Some(EmailChannel {
                    mailer,
                    from: smtp.user.clone(),
                })
            }
            None => None,
        };

        Ok(Self {
            http,
            breaker: create_webhook_circuit_breaker(),
            email,
            config,
            sink,
        })
    }

    /// Delivers `lead` on every configured channel concurrently.
    ///
    /// Completion does not imply either channel succeeded; outcomes are
    /// reported through the sink.
    pub async fn dispatch(&self, lead: &LeadSubmission, now: DateTime<Utc>) {
        tokio::join!(self.deliver_webhook(lead, now), self.deliver_email(lead, now));
    }

    async fn deliver_webhook(&self, lead: &LeadSubmission, now: DateTime<Utc>) {
        let Some(url) = self.config.webhook_url.as_deref() else {
            self.sink.record(DeliveryEvent::WebhookSkipped);
            return;
        };

        let notification = WebhookNotification::new(lead, now);
        match self.post_webhook(url, &notification).await {
            Ok(()) => self.sink.record(DeliveryEvent::WebhookDelivered),
            Err(e) => self.sink.record(DeliveryEvent::WebhookFailed {
                reason: e.to_string(),
            }),
        }
    }

    async fn post_webhook(
        &self,
        url: &str,
        notification: &WebhookNotification,
    ) -> Result<(), DeliveryError> {
        let call = async {
            let response = self
                .http
                .post(url)
                .json(notification)
                .send()
                .await
                .map_err(|e| DeliveryError::Http(format!("webhook request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(DeliveryError::Http(format!(
                    "webhook returned {}: {}",
                    status, error_text
                )));
            }

            Ok(())
        };

        match self.breaker.call(call).await {
            Ok(()) => Ok(()),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(DeliveryError::CircuitOpen),
        }
    }

    async fn deliver_email(&self, lead: &LeadSubmission, now: DateTime<Utc>) {
        let (channel, to_address) = match (&self.email, &self.config.to_address) {
            (Some(channel), Some(to_address)) => (channel, to_address),
            (channel, to_address) => {
                let mut missing = Vec::new();
                if channel.is_none() {
                    missing.push("smtp");
                }
                if to_address.is_none() {
                    missing.push("to_address");
                }
                self.sink.record(DeliveryEvent::EmailSkipped { missing });
                return;
            }
        };

        match self.send_email(channel, to_address, lead, now).await {
            Ok(()) => self.sink.record(DeliveryEvent::EmailSent),
            Err(e) => self.sink.record(DeliveryEvent::EmailFailed {
                reason: e.to_string(),
            }),
        }
    }

    async fn send_email(
        &self,
        channel: &EmailChannel,
        to_address: &str,
        lead: &LeadSubmission,
        now: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        let from: Mailbox = channel
            .from
            .parse()
            .map_err(|e| DeliveryError::Message(format!("invalid from address: {}", e)))?;
        let to: Mailbox = to_address
            .parse()
            .map_err(|e| DeliveryError::Message(format!("invalid to address: {}", e)))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(format!("פנייה חדשה מ-{}", lead.full_name))
            .header(ContentType::TEXT_HTML)
            .body(render_email_html(lead, now))
            .map_err(|e| DeliveryError::Message(e.to_string()))?;

        channel
            .mailer
            .send(message)
            .await
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;

        Ok(())
    }
}

/// Renders the notification email: right-to-left HTML with the lead's
/// details. Optional rows appear only when the field was submitted, and all
/// interpolated values are HTML-escaped.
fn render_email_html(lead: &LeadSubmission, now: DateTime<Utc>) -> String {
    let mut rows = String::new();
    rows.push_str(&format!(
        "<p><strong>שם מלא:</strong> {}</p>",
        escape_html(&lead.full_name)
    ));
    rows.push_str(&format!(
        "<p><strong>טלפון:</strong> {}</p>",
        escape_html(&lead.phone)
    ));
    rows.push_str(&format!(
        "<p><strong>אימייל:</strong> {}</p>",
        escape_html(&lead.email)
    ));
    if let Some(message) = &lead.message {
        rows.push_str(&format!(
            "<p><strong>הודעה:</strong> {}</p>",
            escape_html(message)
        ));
    }
    // utm_medium rides the webhook payload only
    if let Some(source) = &lead.utm_source {
        rows.push_str(&format!(
            "<p><strong>מקור:</strong> {}</p>",
            escape_html(source)
        ));
    }
    if let Some(campaign) = &lead.utm_campaign {
        rows.push_str(&format!(
            "<p><strong>קמפיין:</strong> {}</p>",
            escape_html(campaign)
        ));
    }

    format!(
        r#"<div dir="rtl" style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #2563eb;">פנייה חדשה</h2>
  <div style="background: #f8fafc; padding: 20px; border-radius: 8px; margin: 20px 0;">
    {}
  </div>
  <p style="color: #64748b; font-size: 14px;">נשלח ב-{}</p>
</div>"#,
        rows,
        now.format("%-d.%-m.%Y, %H:%M:%S")
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
