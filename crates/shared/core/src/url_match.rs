//! URL match predicate
//!
//! A [`UrlPattern`] is classified once, when it is built, into one of the
//! recognised kinds. Matching then only dispatches on the stored variant.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use url::Url;

/// Characters that turn a text pattern into a glob
const GLOB_METACHARACTERS: [char; 3] = ['*', '?', '{'];

/// URL pattern errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("unsupported url pattern kind: {0} (expected null, string, {{\"regex\": string}} or predicate)")]
    UnsupportedKind(String),

    #[error("invalid regex: {0}")]
    InvalidRegex(String),
}

/// A URL-match specifier
#[derive(Clone)]
pub enum UrlPattern {
    /// Matches every URL
    Any,
    /// Glob text, compiled to an anchored regex
    Glob(Regex),
    /// Regex tested against the full URL string
    Regex(Regex),
    /// Exact URL, falling back to the URL's path component
    Exact(String),
    /// Caller-supplied predicate over the parsed URL
    Predicate(Rc<dyn Fn(&Url) -> bool>),
}

impl UrlPattern {
    /// Classify a text pattern as `Any`, `Glob` or `Exact`
    pub fn from_text(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Ok(UrlPattern::Any);
        }
        if pattern.contains(GLOB_METACHARACTERS) {
            let regex = Regex::new(&glob_to_regex(pattern))
                .map_err(|e| PatternError::InvalidRegex(e.to_string()))?;
            return Ok(UrlPattern::Glob(regex));
        }
        Ok(UrlPattern::Exact(pattern.to_string()))
    }

    pub fn regex(regex: Regex) -> Self {
        UrlPattern::Regex(regex)
    }

    pub fn predicate(predicate: impl Fn(&Url) -> bool + 'static) -> Self {
        UrlPattern::Predicate(Rc::new(predicate))
    }

    /// Classify a dynamically typed pattern
    ///
    /// `null` is `Any`, a string goes through [`UrlPattern::from_text`] and
    /// `{"regex": "..."}` compiles to `Regex`. Anything else is rejected.
    pub fn from_value(value: &Value) -> Result<Self, PatternError> {
        match value {
            Value::Null => Ok(UrlPattern::Any),
            Value::String(text) => Self::from_text(text),
            Value::Object(map) if map.len() == 1 => match map.get("regex") {
                Some(Value::String(source)) => Regex::new(source)
                    .map(UrlPattern::Regex)
                    .map_err(|e| PatternError::InvalidRegex(e.to_string())),
                _ => Err(PatternError::UnsupportedKind(value.to_string())),
            },
            other => Err(PatternError::UnsupportedKind(other.to_string())),
        }
    }

    /// Evaluate this pattern against a concrete URL string
    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Any => true,
            UrlPattern::Glob(regex) | UrlPattern::Regex(regex) => regex.is_match(url),
            UrlPattern::Exact(text) => {
                if text == url {
                    return true;
                }
                Url::parse(url).is_ok_and(|parsed| parsed.path() == text.as_str())
            }
            UrlPattern::Predicate(predicate) => {
                Url::parse(url).is_ok_and(|parsed| predicate(&parsed))
            }
        }
    }
}

impl fmt::Debug for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Any => write!(f, "Any"),
            UrlPattern::Glob(regex) => f.debug_tuple("Glob").field(&regex.as_str()).finish(),
            UrlPattern::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            UrlPattern::Exact(text) => f.debug_tuple("Exact").field(text).finish(),
            UrlPattern::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// Whether `url` satisfies `pattern`; an absent pattern always matches
pub fn url_matches(url: &str, pattern: Option<&UrlPattern>) -> bool {
    pattern.is_none_or(|pattern| pattern.matches(url))
}

/// Convert glob text into an anchored regex source
///
/// `**` spans path separators, `*` does not, `?` is any single character
/// and a closed `{a,b}` is an alternation. Brackets and unclosed braces are
/// literal so IPv6 hosts and query values keep matching themselves.
fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::with_capacity(glob.len() * 2 + 2);
    regex.push('^');

    let mut in_group = false;
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => regex.push_str(&regex::escape(&escaped.to_string())),
                None => regex.push_str("\\\\"),
            },
            '*' => {
                if chars.peek() == Some(&'*') {
                    while chars.peek() == Some(&'*') {
                        chars.next();
                    }
                    regex.push_str(".*");
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push('.'),
            '{' if !in_group && chars.clone().any(|rest| rest == '}') => {
                in_group = true;
                regex.push('(');
            }
            '}' if in_group => {
                in_group = false;
                regex.push(')');
            }
            ',' if in_group => regex.push('|'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }

    regex.push('$');
    regex
}
