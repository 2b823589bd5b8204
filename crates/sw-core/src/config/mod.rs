//! Persistent sender settings.
//!
//! [`parser`] reads and writes the `key = value` document format, and
//! [`settings`] maps validated sender configs onto it.

pub mod parser;
pub mod settings;
