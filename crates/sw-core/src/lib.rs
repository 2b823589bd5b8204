//! Core building blocks for Sendwell sender settings: form validation,
//! free-text sanitization, the settings file store, and the audit trail.

pub mod config;
pub mod fs;
pub mod security;
pub mod validation;
