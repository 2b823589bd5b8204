//! Audit trail for sender settings changes.
//!
//! Every attempt to change the email or SMS sender settings, accepted or
//! rejected, is written as one JSON object per line. Rejected attempts carry
//! the rendered field errors in `details`.
//!
//! Writing the trail is best effort: a backend that cannot persist an event
//! logs the problem through `tracing` and lets the settings change proceed.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

/// Default location of the audit log.
pub const AUDIT_LOG_PATH: &str = "/var/lib/sendwell/audit.log";

/// Size at which [`FileAuditLogger`] rotates the current file (5 MB).
pub const DEFAULT_ROTATE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Settings operations recorded in the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Change of the email sender name or business address.
    EmailConfigUpdate,
    /// Change of the SMS brand label.
    SmsConfigUpdate,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EmailConfigUpdate => "email_config_update",
            Self::SmsConfigUpdate => "sms_config_update",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failure,
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failure => "failure",
        })
    }
}

/// One recorded settings change attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    /// Operator or integration that made the change.
    pub actor: String,
    /// Settings file the change was aimed at.
    pub target: String,
    pub result: AuditResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditEvent {
    pub fn success(
        action: AuditAction,
        actor: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            actor: actor.into(),
            target: target.into(),
            result: AuditResult::Success,
            details: None,
        }
    }

    /// A failed attempt, with the reason rendered into `details`.
    pub fn failure(
        action: AuditAction,
        actor: impl Into<String>,
        target: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            actor: actor.into(),
            target: target.into(),
            result: AuditResult::Failure,
            details: Some(reason.to_string()),
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} on {} ({})",
            self.timestamp.to_rfc3339(),
            self.actor,
            self.action,
            self.target,
            self.result,
        )?;
        if let Some(details) = &self.details {
            write!(f, ": {details}")?;
        }
        Ok(())
    }
}

/// Sink for audit events. Must not fail or block the audited operation.
pub trait AuditLogger: Send + Sync {
    fn log_event(&self, event: &AuditEvent);
}

// ---------------------------------------------------------------------------
// FileAuditLogger
// ---------------------------------------------------------------------------

/// JSON-lines audit file with size-based rotation.
///
/// When the file reaches the rotation size it is renamed to
/// `<path>.<UTC timestamp>[.<n>]` and a fresh file is started. Archives are
/// never overwritten.
pub struct FileAuditLogger {
    log_path: PathBuf,
    rotate_bytes: u64,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileAuditLogger {
    /// Open `log_path` for appending, creating missing parent directories.
    pub fn new(log_path: &Path) -> Result<Self, AuditError> {
        Self::with_rotation(log_path, DEFAULT_ROTATE_BYTES)
    }

    pub fn with_rotation(log_path: &Path, rotate_bytes: u64) -> Result<Self, AuditError> {
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                info!(path = %parent.display(), "Created audit log directory");
            }
        }

        let writer = BufWriter::new(Self::open(log_path)?);
        Ok(Self {
            log_path: log_path.to_path_buf(),
            rotate_bytes,
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    fn open(path: &Path) -> Result<File, AuditError> {
        Ok(OpenOptions::new().create(true).append(true).open(path)?)
    }

    fn rotate_if_full(&self, slot: &mut Option<BufWriter<File>>) -> Result<(), AuditError> {
        let len = match fs::metadata(&self.log_path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if len < self.rotate_bytes {
            return Ok(());
        }

        if let Some(w) = slot.as_mut() {
            let _ = w.flush();
        }
        *slot = None;

        let rotated = self.archive_path();
        fs::rename(&self.log_path, &rotated)?;
        info!(rotated = %rotated.display(), "Rotated audit log");

        *slot = Some(BufWriter::new(Self::open(&self.log_path)?));
        Ok(())
    }

    /// `<path>.<UTC timestamp>`, with `.1`, `.2`, ... appended when an
    /// archive from the same millisecond already exists.
    fn archive_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let base = format!("{}.{stamp}", self.log_path.display());
        let mut candidate = PathBuf::from(&base);
        let mut n = 1u32;
        while candidate.exists() {
            candidate = PathBuf::from(format!("{base}.{n}"));
            n += 1;
        }
        candidate
    }

    fn append(writer: &mut BufWriter<File>, event: &AuditEvent) -> Result<(), AuditError> {
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl AuditLogger for FileAuditLogger {
    fn log_event(&self, event: &AuditEvent) {
        let mut slot = self.writer.lock().unwrap_or_else(|poisoned| {
            error!("Audit logger mutex poisoned, recovering");
            poisoned.into_inner()
        });

        if let Err(e) = self.rotate_if_full(&mut slot) {
            warn!(error = %e, "Audit log rotation failed");
        }

        if slot.is_none() {
            match Self::open(&self.log_path) {
                Ok(file) => *slot = Some(BufWriter::new(file)),
                Err(e) => {
                    error!(error = %e, event = %event, "Cannot open audit log, event lost");
                    return;
                }
            }
        }

        if let Some(writer) = slot.as_mut() {
            if let Err(e) = Self::append(writer, event) {
                error!(error = %e, event = %event, "Failed to write audit event");
            }
        }
    }
}

impl fmt::Debug for FileAuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAuditLogger")
            .field("log_path", &self.log_path)
            .field("rotate_bytes", &self.rotate_bytes)
            .finish()
    }
}

/// Discards every event. Used when auditing is switched off.
#[derive(Debug, Clone, Default)]
pub struct NullAuditLogger;

impl AuditLogger for NullAuditLogger {
    fn log_event(&self, _event: &AuditEvent) {}
}

/// Keeps events in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct InMemoryAuditLogger {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLogger for InMemoryAuditLogger {
    fn log_event(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_success_event_has_no_details() {
        let event = AuditEvent::success(AuditAction::SmsConfigUpdate, "cli", "/tmp/s.conf");
        assert_eq!(event.result, AuditResult::Success);
        assert!(event.details.is_none());

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["action"], "sms_config_update");
        assert_eq!(value["result"], "success");
        assert!(!value.as_object().unwrap().contains_key("details"));
    }

    #[test]
    fn test_failure_event_renders_reason() {
        let event = AuditEvent::failure(
            AuditAction::EmailConfigUpdate,
            "alice",
            "settings.conf",
            "senderName: Sender name is required",
        );
        assert_eq!(event.result, AuditResult::Failure);
        let display = event.to_string();
        assert!(display.contains("alice email_config_update on settings.conf (failure)"));
        assert!(display.ends_with(": senderName: Sender name is required"));
    }

    #[test]
    fn test_event_json_roundtrip() {
        let event = AuditEvent::failure(AuditAction::EmailConfigUpdate, "a", "t", "boom");
        let json = serde_json::to_string(&event).unwrap();
        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, event.action);
        assert_eq!(back.details.as_deref(), Some("boom"));
        assert_eq!(back.timestamp, event.timestamp);
    }

    #[test]
    fn test_file_logger_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("audit.log");
        let logger = FileAuditLogger::new(&path).unwrap();

        logger.log_event(&AuditEvent::success(AuditAction::SmsConfigUpdate, "cli", "x"));
        logger.log_event(&AuditEvent::failure(AuditAction::EmailConfigUpdate, "cli", "x", "bad"));

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["action"], "sms_config_update");
        assert_eq!(lines[1]["result"], "failure");
        assert_eq!(lines[1]["details"], "bad");
    }

    #[test]
    fn test_file_logger_reopens_existing_file_in_append_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");

        FileAuditLogger::new(&path)
            .unwrap()
            .log_event(&AuditEvent::success(AuditAction::SmsConfigUpdate, "a", "t"));
        FileAuditLogger::new(&path)
            .unwrap()
            .log_event(&AuditEvent::success(AuditAction::SmsConfigUpdate, "b", "t"));

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["actor"], "b");
    }

    #[test]
    fn test_file_logger_rotates_when_full() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let logger = FileAuditLogger::with_rotation(&path, 1).unwrap();

        logger.log_event(&AuditEvent::success(AuditAction::SmsConfigUpdate, "a", "t"));
        logger.log_event(&AuditEvent::success(AuditAction::SmsConfigUpdate, "b", "t"));

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["actor"], "b");

        let rotated = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("audit.log."))
            .count();
        assert_eq!(rotated, 1);
    }

    #[test]
    fn test_back_to_back_rotations_keep_every_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let logger = FileAuditLogger::with_rotation(&path, 1).unwrap();

        for actor in ["a", "b", "c", "d"] {
            logger.log_event(&AuditEvent::success(AuditAction::SmsConfigUpdate, actor, "t"));
        }

        let files: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .collect();
        assert_eq!(files.len(), 4);

        let mut actors: Vec<String> = files
            .iter()
            .flat_map(|f| read_lines(f))
            .map(|v| v["actor"].as_str().unwrap().to_string())
            .collect();
        actors.sort();
        assert_eq!(actors, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_io_error_is_not_repeated_in_chain() {
        let err = AuditError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.to_string(), "gone");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_in_memory_logger() {
        let logger = InMemoryAuditLogger::new();
        assert!(logger.is_empty());
        logger.log_event(&AuditEvent::success(AuditAction::EmailConfigUpdate, "a", "t"));
        assert_eq!(logger.len(), 1);
        assert_eq!(logger.events()[0].actor, "a");
    }

    #[test]
    fn test_null_logger_accepts_events() {
        NullAuditLogger.log_event(&AuditEvent::success(AuditAction::EmailConfigUpdate, "a", "t"));
    }
}
