//! Schema validation for the sender configuration forms.
//!
//! Each form field is described by a [`TextRule`] (length bound plus a content
//! check) and every rule is evaluated, so one call reports every violation on
//! every field instead of stopping at the first failure.
//!
//! Validators never trim or rewrite input. Free text that should be cleaned
//! goes through [`crate::security::sanitize::sanitize`] first, at the caller's
//! discretion.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

pub mod email;
pub mod sms;

pub use email::{validate_email_config, EmailConfig, RawEmailConfig};
pub use sms::{validate_sms_config, RawSmsConfig, SmsConfig};

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// Any character outside the display-name allowlist `[A-Za-z0-9 ._-]`.
static DISALLOWED_NAME_CHAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9 ._-]").unwrap());

/// Script openers and dangerous URL schemes, matched case-insensitively.
static INJECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<script|javascript:|data:|vbscript:").unwrap());

// ---------------------------------------------------------------------------
// Field errors
// ---------------------------------------------------------------------------

/// A form field that can fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    SenderName,
    BusinessAddress,
    FromBrand,
}

impl Field {
    /// Wire name of the field, as used by the form payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SenderName => "senderName",
            Self::BusinessAddress => "businessAddress",
            Self::FromBrand => "fromBrand",
        }
    }

    /// Human-readable label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SenderName => "Sender name",
            Self::BusinessAddress => "Business address",
            Self::FromBrand => "From brand",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rule a field value violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldErrorKind {
    /// The value has zero length.
    EmptyField,
    /// The value has more characters than the field allows.
    TooLong,
    /// The value contains a character outside `[A-Za-z0-9 ._-]`.
    InvalidCharset,
    /// The value contains a script tag or a dangerous URL scheme.
    InjectionDetected,
}

/// One violated rule on one field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: Field,
    pub kind: FieldErrorKind,
    pub message: String,
}

/// Every rule violated during a single validation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("validation failed: {}", summarize(.errors))]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl FieldErrors {
    pub fn push(&mut self, field: Field, kind: FieldErrorKind, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            kind,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Errors reported against a single field, in rule order.
    pub fn for_field(&self, field: Field) -> impl Iterator<Item = &FieldError> {
        self.errors.iter().filter(move |e| e.field == field)
    }

    /// Whether `field` failed with `kind`.
    pub fn has(&self, field: Field, kind: FieldErrorKind) -> bool {
        self.errors.iter().any(|e| e.field == field && e.kind == kind)
    }

    /// Distinct fields with at least one error, in first-reported order.
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        for e in &self.errors {
            if !fields.contains(&e.field) {
                fields.push(e.field);
            }
        }
        fields
    }

    /// Map from wire field name to its messages, the shape forms render.
    pub fn to_map(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut map: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for e in &self.errors {
            map.entry(e.field.as_str())
                .or_default()
                .push(e.message.clone());
        }
        map
    }

    /// Merge another error set into this one.
    pub fn extend(&mut self, other: FieldErrors) {
        self.errors.extend(other.errors);
    }

    /// `Ok(build())` when nothing was reported, otherwise `Err(self)`.
    pub fn into_result<T>(self, build: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(build())
        } else {
            Err(self)
        }
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// What a field's content is checked against, beyond its length.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ContentCheck {
    /// Allowlist `[A-Za-z0-9 ._-]`.
    DisplayName,
    /// Free text that must not carry script or protocol injection.
    FreeText,
}

/// Declarative constraints for one text field.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextRule {
    pub field: Field,
    pub max_chars: usize,
    pub content: ContentCheck,
}

impl TextRule {
    /// Evaluate every constraint and append each violation to `errors`.
    ///
    /// Lengths count Unicode scalar values, not bytes.
    pub(crate) fn check(&self, value: &str, errors: &mut FieldErrors) {
        let label = self.field.label();
        let chars = value.chars().count();

        if chars == 0 {
            errors.push(
                self.field,
                FieldErrorKind::EmptyField,
                format!("{label} is required"),
            );
        }

        if chars > self.max_chars {
            errors.push(
                self.field,
                FieldErrorKind::TooLong,
                format!(
                    "{label} must be at most {} characters (got {chars})",
                    self.max_chars
                ),
            );
        }

        match self.content {
            ContentCheck::DisplayName => {
                if let Some(m) = DISALLOWED_NAME_CHAR_RE.find(value) {
                    errors.push(
                        self.field,
                        FieldErrorKind::InvalidCharset,
                        format!(
                            "{label} may only contain letters, digits, spaces, '.', '_' and '-' (found {:?})",
                            m.as_str()
                        ),
                    );
                }
            }
            ContentCheck::FreeText => {
                if let Some(m) = INJECTION_RE.find(value) {
                    errors.push(
                        self.field,
                        FieldErrorKind::InjectionDetected,
                        format!(
                            "{label} contains a disallowed pattern: {}",
                            m.as_str().to_ascii_lowercase()
                        ),
                    );
                }
            }
        }
    }
}
