//! Line-oriented `key = value` document format for the settings file.
//!
//! Comments, blank lines and key order are kept, so an operator's notes in
//! the file survive a programmatic update. Values lose surrounding spaces and
//! tabs and are otherwise stored verbatim; escaping is the caller's business
//! (see [`super::settings`]).

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, line_ending, space0},
    combinator::eof,
    multi::many0,
    sequence::{delimited, terminated},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: expected `key = value`, a comment or a blank line: {snippet:?}")]
    Malformed { line: usize, snippet: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsLine {
    Entry { key: String, value: String },
    /// Full comment text, `#` included.
    Comment(String),
    Blank,
}

/// A parsed settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsDocument {
    pub lines: Vec<SettingsLine>,
}

impl SettingsDocument {
    /// Value of the first entry named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            SettingsLine::Entry { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Replace the first entry named `key` in place, or append a new one.
    pub fn set(&mut self, key: &str, value: &str) {
        let existing = self.lines.iter_mut().find_map(|line| match line {
            SettingsLine::Entry { key: k, value: v } if k == key => Some(v),
            _ => None,
        });
        match existing {
            Some(v) => *v = value.to_string(),
            None => self.lines.push(SettingsLine::Entry {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Drop every entry named `key`.
    pub fn remove(&mut self, key: &str) {
        self.lines
            .retain(|line| !matches!(line, SettingsLine::Entry { key: k, .. } if k == key));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            SettingsLine::Entry { key, .. } => Some(key.as_str()),
            _ => None,
        })
    }

    /// Render back to text; every line ends with `\n`.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                SettingsLine::Entry { key, value } if value.is_empty() => {
                    out.push_str(key);
                    out.push_str(" =");
                }
                SettingsLine::Entry { key, value } => {
                    out.push_str(key);
                    out.push_str(" = ");
                    out.push_str(value);
                }
                SettingsLine::Comment(text) => out.push_str(text),
                SettingsLine::Blank => {}
            }
            out.push('\n');
        }
        out
    }
}

// nom parsers

fn rest_of_line(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c != '\n' && c != '\r')(input)
}

fn line_end(input: &str) -> IResult<&str, ()> {
    let (input, _) = alt((line_ending, eof))(input)?;
    Ok((input, ()))
}

fn comment(input: &str) -> IResult<&str, SettingsLine> {
    let (input, _) = space0(input)?;
    let (input, text) = terminated(rest_of_line, line_end)(input)?;
    if !text.starts_with('#') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    }
    Ok((input, SettingsLine::Comment(text.trim_end().to_string())))
}

fn blank(input: &str) -> IResult<&str, SettingsLine> {
    let (input, _) = terminated(space0, line_ending)(input)?;
    Ok((input, SettingsLine::Blank))
}

fn key(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))(input)
}

fn entry(input: &str) -> IResult<&str, SettingsLine> {
    let (input, k) = delimited(space0, key, space0)(input)?;
    let (input, _) = char('=')(input)?;
    let (input, _) = space0(input)?;
    let (input, value) = terminated(rest_of_line, line_end)(input)?;
    Ok((
        input,
        SettingsLine::Entry {
            key: k.to_string(),
            value: value.trim_end_matches([' ', '\t']).to_string(),
        },
    ))
}

fn settings_line(input: &str) -> IResult<&str, SettingsLine> {
    // Each branch consumes input or fails; `many0` errors on empty successes.
    alt((blank, comment, entry))(input)
}

/// Parse a whole settings document.
pub fn parse_settings(input: &str) -> Result<SettingsDocument, ParseError> {
    let (remaining, lines) = many0(settings_line)(input).map_err(|e| ParseError::Malformed {
        line: 1,
        snippet: e.to_string(),
    })?;

    if !remaining.trim().is_empty() {
        let consumed = &input[..input.len() - remaining.len()];
        let line = consumed.matches('\n').count() + 1;
        let snippet: String = remaining
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(80)
            .collect();
        return Err(ParseError::Malformed { line, snippet });
    }

    Ok(SettingsDocument { lines })
}
