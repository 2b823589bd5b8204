//! Defense-in-depth filter for free text such as the business address.
//!
//! This is deliberately not an HTML sanitizer. It removes exactly four
//! things, case-insensitively: `<script>...</script>` blocks, the
//! `javascript:`, `data:` and `vbscript:` scheme prefixes, and any `<script`
//! opener left without a closing tag. Everything else passes through.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// A script block up to the first closing tag, across newlines.
static SCRIPT_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").unwrap());

/// A `<script` opener with no matching close.
static SCRIPT_OPENER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<script").unwrap());

/// Scheme prefixes, anywhere in the text.
static PROTOCOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:|data:|vbscript:").unwrap());

/// Strip script blocks and dangerous scheme prefixes, then trim.
///
/// Script blocks go first so a scheme hidden inside one disappears with it.
/// Passes repeat until nothing matches, so fragments that join into a new
/// pattern after a removal (`javajavascript:script:`) are caught too and the
/// result is a fixed point: `sanitize(&sanitize(s)) == sanitize(s)`.
pub fn sanitize(input: &str) -> String {
    let mut text = input.to_owned();
    while strip(&SCRIPT_BLOCK_RE, &mut text)
        || strip(&SCRIPT_OPENER_RE, &mut text)
        || strip(&PROTOCOL_RE, &mut text)
    {}
    text.trim().to_owned()
}

/// Remove every match of `re` from `text`. Returns whether anything changed.
fn strip(re: &Regex, text: &mut String) -> bool {
    let stripped = match re.replace_all(text.as_str(), "") {
        Cow::Borrowed(_) => return false,
        Cow::Owned(s) => s,
    };
    *text = stripped;
    true
}
