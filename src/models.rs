use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Origin tag attached to every outbound webhook notification.
pub const WEBHOOK_SOURCE: &str = "contact-form";

/// Raw lead submission as posted by the landing-page form.
///
/// Every field is optional at the wire level so that an absent required field
/// surfaces as a per-field validation error instead of a deserialization
/// failure. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LeadForm {
    #[serde(rename = "fullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Hidden anti-spam field. Humans leave it empty; bots fill it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub honeypot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
}

/// A lead that passed schema validation.
///
/// Serializes with the same wire names the form uses, omitting absent
/// optionals, so downstream consumers see exactly what was submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadSubmission {
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub phone: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub honeypot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
}

impl LeadSubmission {
    /// True when the honeypot field came back non-empty.
    pub fn is_spam(&self) -> bool {
        self.honeypot.as_deref().is_some_and(|value| !value.is_empty())
    }
}

/// Outbound webhook body: the submission plus delivery metadata.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookNotification {
    #[serde(flatten)]
    pub lead: LeadSubmission,
    /// ISO-8601 timestamp with millisecond precision (`2024-05-17T12:30:45.000Z`).
    pub timestamp: String,
    pub source: &'static str,
}

impl WebhookNotification {
    pub fn new(lead: &LeadSubmission, now: DateTime<Utc>) -> Self {
        Self {
            lead: lead.clone(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            source: WEBHOOK_SOURCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_submission() -> LeadSubmission {
        LeadSubmission {
            full_name: "דנה לוי".to_string(),
            phone: "050-1234567".to_string(),
            email: "dana@example.com".to_string(),
            message: Some("מעוניינת בפרטים נוספים".to_string()),
            honeypot: None,
            utm_source: Some("google".to_string()),
            utm_medium: None,
            utm_campaign: Some("spring_sale".to_string()),
        }
    }

    #[test]
    fn deserializes_full_form_payload() {
        let json = r#"{
            "fullName": "דנה לוי",
            "phone": "050-1234567",
            "email": "dana@example.com",
            "message": "מעוניינת בפרטים נוספים",
            "honeypot": "",
            "utm_source": "google",
            "utm_medium": "cpc",
            "utm_campaign": "spring_sale"
        }"#;

        let form: LeadForm = serde_json::from_str(json).unwrap();
        assert_eq!(form.full_name.as_deref(), Some("דנה לוי"));
        assert_eq!(form.phone.as_deref(), Some("050-1234567"));
        assert_eq!(form.honeypot.as_deref(), Some(""));
        assert_eq!(form.utm_medium.as_deref(), Some("cpc"));
    }

    #[test]
    fn absent_fields_deserialize_to_none() {
        let form: LeadForm = serde_json::from_str(r#"{"fullName": "דנה"}"#).unwrap();
        assert_eq!(form.full_name.as_deref(), Some("דנה"));
        assert!(form.phone.is_none());
        assert!(form.email.is_none());
        assert!(form.honeypot.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let form: LeadForm =
            serde_json::from_str(r#"{"fullName": "דנה", "extra_field": 42}"#).unwrap();
        assert_eq!(form.full_name.as_deref(), Some("דנה"));
    }

    #[test]
    fn spam_detection_requires_non_empty_honeypot() {
        let mut lead = sample_submission();
        assert!(!lead.is_spam());

        lead.honeypot = Some(String::new());
        assert!(!lead.is_spam());

        lead.honeypot = Some("filled by a bot".to_string());
        assert!(lead.is_spam());
    }

    #[test]
    fn webhook_notification_flattens_lead_fields() {
        let lead = sample_submission();
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 45).unwrap();

        let notification = WebhookNotification::new(&lead, now);
        let value = serde_json::to_value(&notification).unwrap();

        assert_eq!(value["fullName"], "דנה לוי");
        assert_eq!(value["phone"], "050-1234567");
        assert_eq!(value["email"], "dana@example.com");
        assert_eq!(value["source"], "contact-form");
        assert_eq!(value["timestamp"], "2024-05-17T12:30:45.000Z");
    }

    #[test]
    fn webhook_notification_omits_absent_optionals() {
        let lead = LeadSubmission {
            full_name: "דנה לוי".to_string(),
            phone: "0501234567".to_string(),
            email: "dana@example.com".to_string(),
            message: None,
            honeypot: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
        };
        let value = serde_json::to_value(WebhookNotification::new(&lead, Utc::now())).unwrap();

        assert!(value.get("message").is_none());
        assert!(value.get("honeypot").is_none());
        assert!(value.get("utm_source").is_none());
        assert!(value.get("utm_campaign").is_none());
    }

    #[test]
    fn empty_honeypot_passes_through_to_webhook_payload() {
        let mut lead = sample_submission();
        lead.honeypot = Some(String::new());

        let value = serde_json::to_value(WebhookNotification::new(&lead, Utc::now())).unwrap();
        assert_eq!(value["honeypot"], "");
    }
}
