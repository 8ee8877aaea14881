use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::TemplateError;

/// A pattern object: raw body text plus mode flags.
///
/// The body is never interpreted here; it may contain placeholder markers or
/// syntax the regex engine would reject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    source: String,
    flags: String,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        Pattern {
            source: source.into(),
            flags: String::new(),
        }
    }

    pub fn with_flags(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Pattern {
            source: source.into(),
            flags: flags.into(),
        }
    }

    /// Parse the delimited `/body/flags` form. The body ends at the last slash,
    /// so slashes inside the body need no escaping.
    pub fn from_delimited(text: &str) -> Result<Self, TemplateError> {
        let inner = text
            .strip_prefix('/')
            .ok_or_else(|| TemplateError::InvalidDelimitedPattern(text.to_string()))?;
        let (source, flags) = inner
            .rsplit_once('/')
            .ok_or_else(|| TemplateError::InvalidDelimitedPattern(text.to_string()))?;
        if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TemplateError::InvalidDelimitedPattern(text.to_string()));
        }
        Ok(Pattern::with_flags(source, flags))
    }

    /// The body text, without delimiters or flags.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn into_source(self) -> String {
        self.source
    }

    /// Build a `regex::Regex` from the body, mapping the flags the engine
    /// understands (`i`, `m`, `s`, `x`, `U`).
    pub fn to_regex(&self) -> Result<Regex, TemplateError> {
        let mut builder = RegexBuilder::new(&self.source);
        for flag in self.flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'U' => builder.swap_greed(true),
                other => {
                    tracing::debug!(flag = %other, "ignoring pattern flag");
                    &mut builder
                }
            };
        }
        Ok(builder.build()?)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl From<&Regex> for Pattern {
    fn from(regex: &Regex) -> Self {
        Pattern::new(regex.as_str())
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Pattern::from(&regex)
    }
}
