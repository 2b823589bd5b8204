//! SMS sender configuration schema.

use serde::{Deserialize, Serialize};

use super::{ContentCheck, Field, FieldErrors, TextRule};

/// Maximum characters in the SMS brand label.
pub const FROM_BRAND_MAX: usize = 50;

const FROM_BRAND: TextRule = TextRule {
    field: Field::FromBrand,
    max_chars: FROM_BRAND_MAX,
    content: ContentCheck::DisplayName,
};

/// Unvalidated SMS sender form payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSmsConfig {
    pub from_brand: String,
}

impl RawSmsConfig {
    pub fn new(from_brand: impl Into<String>) -> Self {
        Self {
            from_brand: from_brand.into(),
        }
    }
}

/// Validated SMS sender settings. Only [`validate_sms_config`] builds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsConfig {
    from_brand: String,
}

impl SmsConfig {
    pub fn from_brand(&self) -> &str {
        &self.from_brand
    }
}

impl From<SmsConfig> for RawSmsConfig {
    fn from(config: SmsConfig) -> Self {
        Self {
            from_brand: config.from_brand,
        }
    }
}

/// Validate an SMS sender form: `fromBrand` must be 1-50 characters from
/// `[A-Za-z0-9 ._-]`.
pub fn validate_sms_config(raw: &RawSmsConfig) -> Result<SmsConfig, FieldErrors> {
    let mut errors = FieldErrors::default();
    FROM_BRAND.check(&raw.from_brand, &mut errors);

    errors.into_result(|| SmsConfig {
        from_brand: raw.from_brand.clone(),
    })
}
