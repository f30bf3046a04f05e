use std::fmt;

use regex::Regex;

use crate::models::{LeadForm, LeadSubmission};

/// One failed field with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field failure found in one submission.
///
/// Validation never short-circuits: all fields are checked so the log carries
/// the complete picture. Clients only ever see the generic 400 message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// Wraps a body-level parse failure (malformed JSON) as a validation error.
    pub fn malformed_body(detail: String) -> Self {
        let mut errors = Self::default();
        errors.push("body", &format!("invalid JSON: {}", detail));
        errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", rendered.join("; "))
    }
}

/// Validates email syntax.
///
/// Cheap structural checks first, then a simplified RFC 5322 pattern
/// (local part, `@`, dotted domain).
pub fn is_valid_email(email: &str) -> bool {
    // Basic checks
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // RFC 5322 simplified email regex
    // Matches: local@domain.tld
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    email_regex.is_match(email)
}

/// Validates the local mobile phone format: `05X` prefix, optional dash,
/// seven more digits (`050-1234567` or `0501234567`).
pub fn is_valid_phone(phone: &str) -> bool {
    let phone_regex = Regex::new(r"^05\d-?\d{7}$").unwrap();
    phone_regex.is_match(phone)
}

/// Validates a raw form submission against the lead schema.
///
/// Returns the normalized submission, or the full list of field failures.
/// Optional fields (`message`, `honeypot`, `utm_*`) pass through unchecked.
pub fn validate_lead(form: &LeadForm) -> Result<LeadSubmission, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let full_name = match form.full_name.as_deref() {
        Some(name) if name.chars().count() >= 2 => Some(name.to_string()),
        Some(_) => {
            errors.push("fullName", "שם מלא חייב להכיל לפחות 2 תווים");
            None
        }
        None => {
            errors.push("fullName", "שדה חובה");
            None
        }
    };

    let phone = match form.phone.as_deref() {
        Some(value) if is_valid_phone(value) => Some(value.to_string()),
        Some(_) => {
            errors.push("phone", "מספר טלפון חייב להיות בפורמט 050-1234567");
            None
        }
        None => {
            errors.push("phone", "שדה חובה");
            None
        }
    };

    let email = match form.email.as_deref() {
        Some(value) if is_valid_email(value) => Some(value.to_string()),
        Some(_) => {
            errors.push("email", "כתובת אימייל לא תקינה");
            None
        }
        None => {
            errors.push("email", "שדה חובה");
            None
        }
    };

    match (full_name, phone, email) {
        (Some(full_name), Some(phone), Some(email)) => Ok(LeadSubmission {
            full_name,
            phone,
            email,
            message: form.message.clone(),
            honeypot: form.honeypot.clone(),
            utm_source: form.utm_source.clone(),
            utm_medium: form.utm_medium.clone(),
            utm_campaign: form.utm_campaign.clone(),
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failing_field() {
        let form = LeadForm {
            full_name: Some("א".to_string()),
            phone: Some("123".to_string()),
            email: Some("not-an-email".to_string()),
            ..Default::default()
        };

        let errors = validate_lead(&form).unwrap_err();
        let fields: Vec<&str> = errors.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["fullName", "phone", "email"]);
    }

    #[test]
    fn missing_required_fields_are_reported_individually() {
        let errors = validate_lead(&LeadForm::default()).unwrap_err();
        assert_eq!(errors.errors.len(), 3);
        assert!(errors.errors.iter().all(|e| e.message == "שדה חובה"));
    }

    #[test]
    fn display_joins_field_reports() {
        let form = LeadForm {
            full_name: Some("דנה לוי".to_string()),
            phone: Some("abc".to_string()),
            email: None,
            ..Default::default()
        };

        let rendered = validate_lead(&form).unwrap_err().to_string();
        assert!(rendered.contains("phone: "));
        assert!(rendered.contains("; email: "));
        assert!(!rendered.contains("fullName"));
    }

    #[test]
    fn malformed_body_is_a_single_body_error() {
        let errors = ValidationErrors::malformed_body("expected value at line 1".to_string());
        assert_eq!(errors.errors.len(), 1);
        assert_eq!(errors.errors[0].field, "body");
    }
}
