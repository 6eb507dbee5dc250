//! Invoice email delivery.
//!
//! [`Mailer`] is the seam the runner sends through; [`HttpMailer`] posts a
//! JSON message to a Resend-compatible endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::MailerConfig;
use crate::error::{Error, Result};

const TEST_PREFIX: &str = "[TEST] ";

/// One invoice email
#[derive(Debug, Clone, PartialEq)]
pub struct EmailRequest {
    pub customer: String,
    pub start_date: String,
    pub end_date: String,
    pub formatted_text: String,
    pub total_hours: f64,
    pub recipients: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: Option<String>,
    pub from_name: Option<String>,
    pub test_mode: bool,
}

impl EmailRequest {
    pub fn subject_line(&self) -> String {
        let subject = self.subject.clone().unwrap_or_else(|| {
            format!(
                "Invoice: {} ({} - {})",
                self.customer, self.start_date, self.end_date
            )
        });
        if self.test_mode {
            format!("{TEST_PREFIX}{subject}")
        } else {
            subject
        }
    }
}

/// Outcome reported by a mailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub success: bool,
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(Error::Delivery(
                self.error.unwrap_or_else(|| "unknown delivery failure".to_string()),
            ))
        }
    }
}

/// Sends invoice emails
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, request: &EmailRequest) -> DeliveryResult;
}

#[derive(Debug, Serialize, PartialEq)]
struct MessagePayload {
    from: String,
    to: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<String>,
    subject: String,
    text: String,
    html: String,
}

/// Mailer posting to an HTTP mail API with a bearer key
pub struct HttpMailer {
    endpoint: String,
    api_key: String,
    from_email: String,
    http: reqwest::Client,
}

impl HttpMailer {
    pub fn new(config: &MailerConfig, from_email: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let from_email = from_email.into();
        if from_email.trim().is_empty() {
            return Err(Error::Config(
                "a sender address is required (global.defaultFromEmail or mailer.from_email)"
                    .to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            from_email,
            http,
        })
    }

    fn payload(&self, request: &EmailRequest) -> MessagePayload {
        let from = match request.from_name.as_deref() {
            Some(name) if !name.trim().is_empty() => format!("{} <{}>", name, self.from_email),
            _ => self.from_email.clone(),
        };

        let (to, cc, bcc) = if request.test_mode {
            (vec![self.from_email.clone()], vec![], vec![])
        } else {
            (
                request.recipients.clone(),
                request.cc.clone(),
                request.bcc.clone(),
            )
        };

        MessagePayload {
            from,
            to,
            cc,
            bcc,
            subject: request.subject_line(),
            text: request.formatted_text.clone(),
            html: render_html(&request.formatted_text),
        }
    }

    async fn post(&self, payload: &MessagePayload) -> Result<()> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("mail request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Delivery(format!(
                "mail API returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, request: &EmailRequest) -> DeliveryResult {
        if !request.test_mode && request.recipients.is_empty() {
            return DeliveryResult::failed("no recipients configured");
        }

        let payload = self.payload(request);
        tracing::info!(
            customer = %request.customer,
            to = ?payload.to,
            test_mode = request.test_mode,
            "Sending invoice email"
        );

        match self.post(&payload).await {
            Ok(()) => DeliveryResult::ok(),
            Err(e) => {
                tracing::warn!(customer = %request.customer, error = %e, "Invoice email failed");
                DeliveryResult::failed(e.to_string())
            }
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_html(text: &str) -> String {
    format!(
        "<pre style=\"font-family: monospace\">{}</pre>",
        escape_html(text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> HttpMailer {
        HttpMailer::new(
            &MailerConfig {
                endpoint: "http://127.0.0.1:9/emails".to_string(),
                api_key: Some("re_test".to_string()),
                from_email: None,
                timeout_secs: 5,
            },
            "billing@example.com",
        )
        .unwrap()
    }

    fn request(test_mode: bool) -> EmailRequest {
        EmailRequest {
            customer: "Acme".to_string(),
            start_date: "January 7, 2024".to_string(),
            end_date: "January 13, 2024".to_string(),
            formatted_text: "January 7 - January 13, 2024 ----- 10hrs\n10hr - R&D <core>".to_string(),
            total_hours: 10.0,
            recipients: vec!["ap@acme.test".to_string()],
            cc: vec!["cto@acme.test".to_string()],
            bcc: vec!["archive@example.com".to_string()],
            subject: None,
            from_name: Some("Jo Dev".to_string()),
            test_mode,
        }
    }

    #[test]
    fn test_default_subject() {
        assert_eq!(
            request(false).subject_line(),
            "Invoice: Acme (January 7, 2024 - January 13, 2024)"
        );

        let mut custom = request(true);
        custom.subject = Some("Weekly hours".to_string());
        assert_eq!(custom.subject_line(), "[TEST] Weekly hours");
    }

    #[test]
    fn test_payload_addresses_recipients() {
        let payload = mailer().payload(&request(false));
        assert_eq!(payload.from, "Jo Dev <billing@example.com>");
        assert_eq!(payload.to, vec!["ap@acme.test"]);
        assert_eq!(payload.cc, vec!["cto@acme.test"]);
        assert_eq!(payload.bcc, vec!["archive@example.com"]);
        assert!(payload.html.contains("R&amp;D &lt;core&gt;"));
        assert!(payload.text.contains("R&D <core>"));
    }

    #[test]
    fn test_test_mode_goes_only_to_sender() {
        let payload = mailer().payload(&request(true));
        assert_eq!(payload.to, vec!["billing@example.com"]);
        assert!(payload.cc.is_empty());
        assert!(payload.bcc.is_empty());
        assert!(payload.subject.starts_with("[TEST] "));

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("cc").is_none());
    }

    #[test]
    fn test_new_requires_key_and_sender() {
        let config = MailerConfig {
            endpoint: "https://api.resend.com/emails".to_string(),
            api_key: None,
            from_email: None,
            timeout_secs: 5,
        };
        assert!(HttpMailer::new(&config, "a@b.c").is_err());

        let config = MailerConfig {
            api_key: Some("k".to_string()),
            ..config
        };
        assert!(HttpMailer::new(&config, " ").is_err());
    }

    #[test]
    fn test_delivery_result_into_result() {
        assert!(DeliveryResult::ok().into_result().is_ok());
        assert!(matches!(
            DeliveryResult::failed("boom").into_result(),
            Err(Error::Delivery(msg)) if msg == "boom"
        ));
    }

    #[tokio::test]
    async fn test_no_recipients_fails_without_network() {
        let mut req = request(false);
        req.recipients.clear();
        let result = mailer().send(&req).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no recipients configured"));
    }
}
