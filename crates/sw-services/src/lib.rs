//! Application services for Sendwell sender settings.

pub mod settings;
