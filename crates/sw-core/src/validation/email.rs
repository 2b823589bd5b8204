//! Email sender configuration schema.

use serde::{Deserialize, Serialize};

use super::{ContentCheck, Field, FieldErrors, TextRule};

/// Maximum characters in the sender display name.
pub const SENDER_NAME_MAX: usize = 100;

/// Maximum characters in the business postal address.
pub const BUSINESS_ADDRESS_MAX: usize = 500;

const SENDER_NAME: TextRule = TextRule {
    field: Field::SenderName,
    max_chars: SENDER_NAME_MAX,
    content: ContentCheck::DisplayName,
};

const BUSINESS_ADDRESS: TextRule = TextRule {
    field: Field::BusinessAddress,
    max_chars: BUSINESS_ADDRESS_MAX,
    content: ContentCheck::FreeText,
};

/// Unvalidated email sender form payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEmailConfig {
    pub sender_name: String,
    pub business_address: String,
}

impl RawEmailConfig {
    pub fn new(sender_name: impl Into<String>, business_address: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            business_address: business_address.into(),
        }
    }
}

/// Validated email sender settings.
///
/// Only [`validate_email_config`] constructs this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    sender_name: String,
    business_address: String,
}

impl EmailConfig {
    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub fn business_address(&self) -> &str {
        &self.business_address
    }
}

impl From<EmailConfig> for RawEmailConfig {
    fn from(config: EmailConfig) -> Self {
        Self {
            sender_name: config.sender_name,
            business_address: config.business_address,
        }
    }
}

/// Validate an email sender form.
///
/// `senderName` must be 1-100 characters from `[A-Za-z0-9 ._-]`.
/// `businessAddress` must be 1-500 characters and free of `<script`,
/// `javascript:`, `data:` and `vbscript:` in any letter case.
///
/// Both fields are always checked; the error set lists every violation.
/// Values are returned exactly as given.
pub fn validate_email_config(raw: &RawEmailConfig) -> Result<EmailConfig, FieldErrors> {
    let mut errors = FieldErrors::default();
    SENDER_NAME.check(&raw.sender_name, &mut errors);
    BUSINESS_ADDRESS.check(&raw.business_address, &mut errors);

    errors.into_result(|| EmailConfig {
        sender_name: raw.sender_name.clone(),
        business_address: raw.business_address.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldErrorKind;

    fn validate(name: &str, address: &str) -> Result<EmailConfig, FieldErrors> {
        validate_email_config(&RawEmailConfig::new(name, address))
    }

    #[test]
    fn test_valid_config_is_returned_unchanged() {
        let raw = RawEmailConfig::new("  Acme Co. ", " 123 Main St\nSpringfield ");
        let config = validate_email_config(&raw).unwrap();
        assert_eq!(config.sender_name(), raw.sender_name);
        assert_eq!(config.business_address(), raw.business_address);
        assert_eq!(RawEmailConfig::from(config), raw);
    }

    #[test]
    fn test_empty_sender_name_only() {
        let errors = validate("", "123 Main St").unwrap_err();
        assert!(errors.has(Field::SenderName, FieldErrorKind::EmptyField));
        assert_eq!(errors.fields(), vec![Field::SenderName]);
    }

    #[test]
    fn test_script_address_rejected() {
        let errors = validate("Acme Co.", "<script>alert(1)</script>").unwrap_err();
        assert!(errors.has(Field::BusinessAddress, FieldErrorKind::InjectionDetected));
        assert_eq!(errors.fields(), vec![Field::BusinessAddress]);
    }

    #[test]
    fn test_hash_in_sender_name_rejected() {
        let errors = validate("Acme#1", "123 Main St").unwrap_err();
        assert!(errors.has(Field::SenderName, FieldErrorKind::InvalidCharset));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_length_limits() {
        assert!(validate(&"a".repeat(SENDER_NAME_MAX), &"b".repeat(BUSINESS_ADDRESS_MAX)).is_ok());

        let errors = validate(
            &"a".repeat(SENDER_NAME_MAX + 1),
            &"b".repeat(BUSINESS_ADDRESS_MAX + 1),
        )
        .unwrap_err();
        assert!(errors.has(Field::SenderName, FieldErrorKind::TooLong));
        assert!(errors.has(Field::BusinessAddress, FieldErrorKind::TooLong));
    }

    #[test]
    fn test_errors_aggregate_across_fields() {
        let errors = validate("", "").unwrap_err();
        assert!(errors.has(Field::SenderName, FieldErrorKind::EmptyField));
        assert!(errors.has(Field::BusinessAddress, FieldErrorKind::EmptyField));

        let errors = validate("Bad<Name>", "see vbscript:run").unwrap_err();
        assert!(errors.has(Field::SenderName, FieldErrorKind::InvalidCharset));
        assert!(errors.has(Field::BusinessAddress, FieldErrorKind::InjectionDetected));
    }

    #[test]
    fn test_address_allows_punctuation() {
        assert!(validate("Joe's", "x").is_err());
        assert!(validate("Joes Pizza", "Unit #4, 12 O'Neil Ave. (rear)").is_ok());
    }

    #[test]
    fn test_whitespace_only_name_is_not_empty() {
        assert!(validate("   ", "123 Main St").is_ok());
    }

    #[test]
    fn test_deserializes_camel_case_payload() {
        let raw: RawEmailConfig = serde_json::from_str(
            r#"{"senderName":"Acme","businessAddress":"1 Road"}"#,
        )
        .unwrap();
        assert_eq!(raw, RawEmailConfig::new("Acme", "1 Road"));

        let missing = serde_json::from_str::<RawEmailConfig>(r#"{"senderName":"Acme"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_serializes_camel_case() {
        let config = validate("Acme", "1 Road").unwrap();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["senderName"], "Acme");
        assert_eq!(value["businessAddress"], "1 Road");
    }
}
