//! Sender settings persisted in a `key = value` file.
//!
//! ```text
//! # Sendwell sender settings
//! email.sender_name = Acme Co.
//! email.business_address = 12 Main St\nSpringfield
//! sms.from_brand = ACME
//! ```
//!
//! Values are escaped on write: `\\` backslash, `\n` newline, `\r` carriage
//! return, `\t` tab, and `\s` for a space at either end of the value. Every
//! value read back goes through the form validators again, so a hand-edited
//! file cannot smuggle in something the forms would reject.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::parser::{parse_settings, ParseError, SettingsDocument, SettingsLine};
use crate::fs::atomic::{self, AtomicWriteError, SETTINGS_MODE};
use crate::validation::{
    validate_email_config, validate_sms_config, EmailConfig, FieldErrors, RawEmailConfig,
    RawSmsConfig, SmsConfig,
};

/// Default location of the settings file.
pub const SETTINGS_PATH: &str = "/var/lib/sendwell/settings.conf";

pub const KEY_SENDER_NAME: &str = "email.sender_name";
pub const KEY_BUSINESS_ADDRESS: &str = "email.business_address";
pub const KEY_FROM_BRAND: &str = "sms.from_brand";

const HEADER: &str = "# Sendwell sender settings. Escapes: \\\\ \\n \\r \\t, \\s for edge spaces.";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("{key} is set but {missing} is missing")]
    Incomplete {
        key: &'static str,
        missing: &'static str,
    },
    #[error("Bad escape in {key}: {detail}")]
    Escape { key: &'static str, detail: String },
    #[error("Stored settings are invalid: {0}")]
    Invalid(#[from] FieldErrors),
    #[error("Failed to write settings: {0}")]
    Write(#[from] AtomicWriteError),
}

/// Everything the settings file holds. Either section may be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SenderSettings {
    pub email: Option<EmailConfig>,
    pub sms: Option<SmsConfig>,
}

/// Reads and writes [`SenderSettings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and re-validate the stored settings. A missing file is empty
    /// settings, not an error.
    pub fn load(&self) -> Result<SenderSettings, SettingsError> {
        let doc = self.read_document()?;
        settings_from_document(&doc)
    }

    pub fn save_email(&self, config: &EmailConfig) -> Result<(), SettingsError> {
        self.update(|doc| {
            doc.set(KEY_SENDER_NAME, &escape_value(config.sender_name()));
            doc.set(KEY_BUSINESS_ADDRESS, &escape_value(config.business_address()));
        })
    }

    pub fn save_sms(&self, config: &SmsConfig) -> Result<(), SettingsError> {
        self.update(|doc| doc.set(KEY_FROM_BRAND, &escape_value(config.from_brand())))
    }

    /// Write both sections; an unset section is removed from the file.
    pub fn save(&self, settings: &SenderSettings) -> Result<(), SettingsError> {
        self.update(|doc| {
            match &settings.email {
                Some(email) => {
                    doc.set(KEY_SENDER_NAME, &escape_value(email.sender_name()));
                    doc.set(KEY_BUSINESS_ADDRESS, &escape_value(email.business_address()));
                }
                None => {
                    doc.remove(KEY_SENDER_NAME);
                    doc.remove(KEY_BUSINESS_ADDRESS);
                }
            }
            match &settings.sms {
                Some(sms) => doc.set(KEY_FROM_BRAND, &escape_value(sms.from_brand())),
                None => doc.remove(KEY_FROM_BRAND),
            }
        })
    }

    fn read_document(&self) -> Result<SettingsDocument, SettingsError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings file yet");
                return Ok(SettingsDocument {
                    lines: vec![SettingsLine::Comment(HEADER.to_string())],
                });
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        parse_settings(&content).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Read-modify-write that keeps the operator's comments and ordering.
    fn update(&self, edit: impl FnOnce(&mut SettingsDocument)) -> Result<(), SettingsError> {
        let mut doc = self.read_document()?;
        edit(&mut doc);
        atomic::atomic_write_with_backup(
            &self.path,
            doc.serialize().as_bytes(),
            Some(SETTINGS_MODE),
        )?;
        info!(path = %self.path.display(), "Saved sender settings");
        Ok(())
    }
}

/// Rebuild validated settings from a parsed document.
///
/// Validation errors from both sections are reported together.
pub fn settings_from_document(doc: &SettingsDocument) -> Result<SenderSettings, SettingsError> {
    let name = read_key(doc, KEY_SENDER_NAME)?;
    let address = read_key(doc, KEY_BUSINESS_ADDRESS)?;
    let brand = read_key(doc, KEY_FROM_BRAND)?;

    let email = match (name, address) {
        (None, None) => None,
        (Some(_), None) => {
            return Err(SettingsError::Incomplete {
                key: KEY_SENDER_NAME,
                missing: KEY_BUSINESS_ADDRESS,
            })
        }
        (None, Some(_)) => {
            return Err(SettingsError::Incomplete {
                key: KEY_BUSINESS_ADDRESS,
                missing: KEY_SENDER_NAME,
            })
        }
        (Some(sender_name), Some(business_address)) => {
            Some(validate_email_config(&RawEmailConfig {
                sender_name,
                business_address,
            }))
        }
    };
    let sms = brand.map(|from_brand| validate_sms_config(&RawSmsConfig { from_brand }));

    let mut errors = FieldErrors::default();
    let email = match email {
        Some(Ok(config)) => Some(config),
        Some(Err(e)) => {
            errors.extend(e);
            None
        }
        None => None,
    };
    let sms = match sms {
        Some(Ok(config)) => Some(config),
        Some(Err(e)) => {
            errors.extend(e);
            None
        }
        None => None,
    };

    if !errors.is_empty() {
        return Err(SettingsError::Invalid(errors));
    }
    Ok(SenderSettings { email, sms })
}

fn read_key(doc: &SettingsDocument, key: &'static str) -> Result<Option<String>, SettingsError> {
    doc.get(key).map(|v| unescape_value(key, v)).transpose()
}

/// Escape a value so it survives one line of the settings file intact.
pub fn escape_value(value: &str) -> String {
    let lead = value.len() - value.trim_start_matches(' ').len();
    let trail = value.trim_end_matches(' ').len().max(lead);

    let mut out = String::with_capacity(value.len() + 8);
    for (i, c) in value.char_indices() {
        match c {
            ' ' if i < lead || i >= trail => out.push_str("\\s"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_value`].
pub fn unescape_value(key: &'static str, stored: &str) -> Result<String, SettingsError> {
    let mut out = String::with_capacity(stored.len());
    let mut chars = stored.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('s') => out.push(' '),
            Some(other) => {
                return Err(SettingsError::Escape {
                    key,
                    detail: format!("unknown escape \\{other}"),
                })
            }
            None => {
                return Err(SettingsError::Escape {
                    key,
                    detail: "trailing backslash".to_string(),
                })
            }
        }
    }
    Ok(out)
}
