use std::sync::Arc;

use sw_core::config::settings::{SenderSettings, SettingsError, SettingsStore};
use sw_core::security::audit::{AuditAction, AuditEvent, AuditLogger};
use sw_core::security::sanitize::sanitize;
use sw_core::validation::{
    validate_email_config, validate_sms_config, EmailConfig, FieldErrors, RawEmailConfig,
    RawSmsConfig, SmsConfig,
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SettingsServiceError {
    #[error("{0}")]
    Validation(FieldErrors),
    #[error("Settings store error: {0}")]
    Store(#[from] SettingsError),
}

/// Form-facing entry point for the sender settings.
///
/// Free text (the business address) is sanitized before validation; display
/// names are validated as typed, since their allowlist already excludes
/// markup. Every update attempt lands in the audit trail.
pub struct SettingsService {
    store: SettingsStore,
    audit: Arc<dyn AuditLogger>,
    actor: String,
}

impl SettingsService {
    pub fn new(store: SettingsStore, audit: Arc<dyn AuditLogger>, actor: impl Into<String>) -> Self {
        Self {
            store,
            audit,
            actor: actor.into(),
        }
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Sanitize and validate without saving.
    pub fn check_email_config(&self, raw: &RawEmailConfig) -> Result<EmailConfig, FieldErrors> {
        let business_address = sanitize(&raw.business_address);
        if business_address != raw.business_address {
            debug!(
                before = raw.business_address.len(),
                after = business_address.len(),
                "Sanitizer changed business address"
            );
        }
        validate_email_config(&RawEmailConfig {
            sender_name: raw.sender_name.clone(),
            business_address,
        })
    }

    pub fn check_sms_config(&self, raw: &RawSmsConfig) -> Result<SmsConfig, FieldErrors> {
        validate_sms_config(raw)
    }

    /// Validate and persist the email sender settings.
    ///
    /// Returns the stored values, which may differ from `raw` by sanitization.
    pub fn update_email_config(
        &self,
        raw: &RawEmailConfig,
    ) -> Result<EmailConfig, SettingsServiceError> {
        let action = AuditAction::EmailConfigUpdate;
        let config = self
            .check_email_config(raw)
            .map_err(|errors| self.rejected(action, errors))?;

        self.store
            .save_email(&config)
            .map_err(|e| self.failed(action, e))?;

        self.audit.log_event(&AuditEvent::success(
            action,
            &self.actor,
            self.target(),
        ));
        info!(actor = %self.actor, sender_name = %config.sender_name(), "Email sender settings updated");
        Ok(config)
    }

    /// Validate and persist the SMS sender settings.
    pub fn update_sms_config(&self, raw: &RawSmsConfig) -> Result<SmsConfig, SettingsServiceError> {
        let action = AuditAction::SmsConfigUpdate;
        let config = self
            .check_sms_config(raw)
            .map_err(|errors| self.rejected(action, errors))?;

        self.store
            .save_sms(&config)
            .map_err(|e| self.failed(action, e))?;

        self.audit.log_event(&AuditEvent::success(
            action,
            &self.actor,
            self.target(),
        ));
        info!(actor = %self.actor, from_brand = %config.from_brand(), "SMS sender settings updated");
        Ok(config)
    }

    pub fn current(&self) -> Result<SenderSettings, SettingsServiceError> {
        Ok(self.store.load()?)
    }

    fn target(&self) -> String {
        self.store.path().display().to_string()
    }

    fn rejected(&self, action: AuditAction, errors: FieldErrors) -> SettingsServiceError {
        warn!(actor = %self.actor, %action, fields = ?errors.fields(), "Rejected settings update");
        self.audit.log_event(&AuditEvent::failure(
            action,
            &self.actor,
            self.target(),
            &errors,
        ));
        SettingsServiceError::Validation(errors)
    }

    fn failed(&self, action: AuditAction, error: SettingsError) -> SettingsServiceError {
        warn!(actor = %self.actor, %action, error = %error, "Settings update failed");
        self.audit.log_event(&AuditEvent::failure(
            action,
            &self.actor,
            self.target(),
            &error,
        ));
        SettingsServiceError::Store(error)
    }
}
