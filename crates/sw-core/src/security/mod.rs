//! Security utilities: free-text sanitization and audit logging.
//!
//! Sanitization strips script blocks and dangerous URL schemes from text that
//! ends up rendered in outgoing email footers. Auditing records every attempt
//! to change the sender settings.

pub mod audit;
pub mod sanitize;
