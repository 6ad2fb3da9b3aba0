//! Pattern matching utilities: prompt detection and rewrite rules.
//!
//! All patterns are compiled once, when a model is loaded, and shared
//! read-only between sessions afterwards.

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};

/// Trait for prompt matching - regex by default, extensible for custom parsers.
pub trait PromptMatcher: Send + Sync {
    /// Returns byte offset where match ends, or None if no match.
    fn find_match(&self, data: &str) -> Option<usize>;

    /// Check if the data matches the pattern.
    fn is_match(&self, data: &str) -> bool {
        self.find_match(data).is_some()
    }
}

impl PromptMatcher for Regex {
    fn find_match(&self, data: &str) -> Option<usize> {
        self.find(data).map(|m| m.end())
    }
}

/// A compiled prompt pattern.
///
/// `^` and `$` anchor at line boundaries (CRLF aware), so a pattern such as
/// `^.+[#>]$` recognises the prompt line at the end of a multi-line capture.
#[derive(Debug, Clone)]
pub struct PromptPattern {
    pattern: Regex,
}

impl PromptPattern {
    /// Compile a prompt pattern string.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern)
            .multi_line(true)
            .crlf(true)
            .build()?;
        Ok(Self { pattern })
    }

    /// Get a reference to the underlying regex.
    pub fn regex(&self) -> &Regex {
        &self.pattern
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl PromptMatcher for PromptPattern {
    fn find_match(&self, data: &str) -> Option<usize> {
        self.pattern.find(data).map(|m| m.end())
    }
}

/// A compiled regex paired with a substitution template.
///
/// The template follows `regex` replacement syntax, so `$1` or `${name}`
/// refer to capture groups.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pattern: Regex,
    replacement: String,
}

impl PatternRule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    pub fn regex(&self) -> &Regex {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Substitute every match in `text` with the template.
    pub fn replace_all<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern.replace_all(text, self.replacement.as_str())
    }
}

/// A redaction rule applied to captured output before it is persisted.
#[derive(Debug, Clone)]
pub struct SecretRule {
    rule: PatternRule,
}

impl SecretRule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            rule: PatternRule::new(pattern, replacement)?,
        })
    }

    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.rule.replace_all(text)
    }
}

/// A condition that may show up while a read is in progress, such as a
/// pager prompt.
///
/// When it matches, `send` is written to the device and/or the matched
/// text is rewritten with `replace`. A rule with a send action but no
/// replacement strips its matches.
#[derive(Debug, Clone)]
pub struct InterruptRule {
    pattern: Regex,
    send: Option<String>,
    replace: Option<String>,
}

impl InterruptRule {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            send: None,
            replace: None,
        })
    }

    /// Text written to the stream when the rule fires.
    pub fn with_send(mut self, send: impl Into<String>) -> Self {
        self.send = Some(send.into());
        self
    }

    /// Text substituted for each match.
    pub fn with_replace(mut self, replace: impl Into<String>) -> Self {
        self.replace = Some(replace.into());
        self
    }

    pub fn regex(&self) -> &Regex {
        &self.pattern
    }

    pub fn send(&self) -> Option<&str> {
        self.send.as_deref()
    }

    pub fn replace(&self) -> Option<&str> {
        self.replace.as_deref()
    }

    /// Number of non-overlapping matches in `text`.
    pub fn count_matches(&self, text: &str) -> usize {
        self.pattern.find_iter(text).count()
    }

    /// Whether the rule rewrites the buffer when it matches during a read.
    pub fn rewrites(&self) -> bool {
        self.replace.is_some() || self.send.is_some()
    }

    /// Substitute every match with the replacement (empty when unset).
    pub fn replace_all<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern
            .replace_all(text, self.replace.as_deref().unwrap_or(""))
    }
}
