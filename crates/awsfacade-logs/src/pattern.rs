//! Plain-text filter patterns.
//!
//! Supported syntax: an empty pattern matches everything; space separated
//! terms must all appear; `"double quoted"` phrases match verbatim; `?term`
//! terms are alternatives of which at least one must appear; `-term` terms
//! must not appear. Matching is case-sensitive. JSON (`{ ... }`) and
//! space-delimited field (`[ ... ]`) patterns are not supported.

use awsfacade_core::{FacadeError, FacadeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermKind {
    Required,
    Optional,
    Excluded,
}

/// A parsed filter pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPattern {
    required: Vec<String>,
    optional: Vec<String>,
    excluded: Vec<String>,
}

impl FilterPattern {
    /// Parse a pattern.
    ///
    /// # Errors
    /// Returns [`FacadeError::InvalidInput`] for structured patterns,
    /// unterminated quotes and bare `?` / `-` operators.
    pub fn parse(pattern: &str) -> FacadeResult<Self> {
        let trimmed = pattern.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            return Err(FacadeError::invalid_input(format!(
                "structured filter pattern not supported: {trimmed}"
            )));
        }

        let mut parsed = Self::default();
        let mut chars = trimmed.chars().peekable();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
                continue;
            }
            let kind = match c {
                '?' => {
                    chars.next();
                    TermKind::Optional
                }
                '-' => {
                    chars.next();
                    TermKind::Excluded
                }
                _ => TermKind::Required,
            };

            let term = if chars.peek() == Some(&'"') {
                chars.next();
                let mut phrase = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(ch) => phrase.push(ch),
                        None => {
                            return Err(FacadeError::invalid_input(format!(
                                "unterminated quote in filter pattern: {trimmed}"
                            )));
                        }
                    }
                }
                phrase
            } else {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                word
            };

            if term.is_empty() {
                return Err(FacadeError::invalid_input(format!(
                    "empty term in filter pattern: {trimmed}"
                )));
            }
            match kind {
                TermKind::Required => parsed.required.push(term),
                TermKind::Optional => parsed.optional.push(term),
                TermKind::Excluded => parsed.excluded.push(term),
            }
        }
        Ok(parsed)
    }

    /// Whether the pattern matches every message.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty() && self.excluded.is_empty()
    }

    /// Test a message.
    #[must_use]
    pub fn matches(&self, message: &str) -> bool {
        self.required.iter().all(|t| message.contains(t.as_str()))
            && (self.optional.is_empty() || self.optional.iter().any(|t| message.contains(t.as_str())))
            && !self.excluded.iter().any(|t| message.contains(t.as_str()))
    }
}
