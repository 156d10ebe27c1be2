use std::fmt;
use std::hash::{Hash, Hasher};

use regex_lite::Regex;
use thiserror::Error;

/// Errors produced when compiling route patterns.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The supplied pattern text is not a valid regular expression.
    #[error("invalid route pattern {source_text:?}: {message}")]
    InvalidPattern {
        source_text: String,
        message: String,
    },
}

/// A compiled matcher over URL paths.
///
/// Built either from an ordered set of canonical root paths
/// ([`RoutePattern::compile`]) or from caller-supplied regex text
/// ([`RoutePattern::new`], used by rewrite rules). Identity is by
/// compiled source text: two patterns compiling to the same text collide
/// in a [`crate::RouteTable`] and the last one stored wins.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    re: Regex,
    source: String,
}

impl RoutePattern {
    /// Compile an ordered set of canonical roots into a prefix matcher.
    ///
    /// The resulting pattern matches any path beginning with one of the
    /// roots and captures everything after the matched root as group 1.
    pub fn compile<'a, I>(roots: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let alternation = roots
            .into_iter()
            .map(regex_lite::escape)
            .collect::<Vec<_>>()
            .join("|");
        let source = format!("^(?:{alternation})(.*)$");
        // Escaped literals always compile.
        let re = Regex::new(&source).expect("escaped alternation is a valid pattern");
        Self { re, source }
    }

    /// Compile caller-supplied regex text (rewrite rules).
    pub fn new(source: &str) -> Result<Self, PatternError> {
        let re = Regex::new(source).map_err(|e| PatternError::InvalidPattern {
            source_text: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            re,
            source: source.to_string(),
        })
    }

    /// The compiled pattern text. Used for display and for the
    /// longest-source-first traversal order.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match a request path, returning the captured groups on success.
    pub fn matches(&self, path: &str) -> Option<PatternMatch> {
        self.re.captures(path).map(|caps| {
            let groups = (1..caps.len())
                .map(|i| {
                    caps.get(i)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default()
                })
                .collect();
            PatternMatch { groups }
        })
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RoutePattern {}

impl Hash for RoutePattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Captured groups from a successful pattern match.
///
/// Unmatched optional groups are represented as empty strings, so
/// downstream code never has to distinguish "absent" from "empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    groups: Vec<String>,
}

impl PatternMatch {
    /// The path remainder after the matched root (capture group 1).
    pub fn remainder(&self) -> &str {
        self.groups.first().map(String::as_str).unwrap_or("")
    }

    /// All captured groups, in order.
    pub fn captures(&self) -> &[String] {
        &self.groups
    }

    /// Consume the match, yielding the captured groups.
    pub fn into_captures(self) -> Vec<String> {
        self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_matches_root_and_captures_remainder() {
        let pattern = RoutePattern::compile(["/forum/topics"]);

        let m = pattern.matches("/forum/topics/42").expect("should match");
        assert_eq!(m.remainder(), "/42");

        let m = pattern.matches("/forum/topics").expect("should match");
        assert_eq!(m.remainder(), "");
    }

    #[test]
    fn compile_rejects_unrelated_paths() {
        let pattern = RoutePattern::compile(["/forum/topics"]);
        assert!(pattern.matches("/blog").is_none());
        assert!(pattern.matches("/forum").is_none());
    }

    #[test]
    fn compile_alternates_over_canonical_roots() {
        let pattern = RoutePattern::compile(["/some-url", "/some-canonical/some-url"]);

        let m = pattern.matches("/some-url/x").expect("primary root");
        assert_eq!(m.remainder(), "/x");

        let m = pattern
            .matches("/some-canonical/some-url/x")
            .expect("canonical root");
        assert_eq!(m.remainder(), "/x");
    }

    #[test]
    fn compile_escapes_regex_metacharacters() {
        let pattern = RoutePattern::compile(["/v1.0/items"]);
        assert!(pattern.matches("/v1.0/items").is_some());
        assert!(pattern.matches("/v1X0/items").is_none());
    }

    #[test]
    fn identity_is_by_compiled_source() {
        let a = RoutePattern::compile(["/forum"]);
        let b = RoutePattern::compile(["/forum"]);
        let c = RoutePattern::compile(["/blog"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn new_rejects_invalid_regex() {
        assert!(RoutePattern::new("^(/unclosed$").is_err());
    }

    #[test]
    fn new_exposes_all_captures() {
        let pattern = RoutePattern::new("^/old/(\\d+)/(\\w+)$").expect("valid");
        let m = pattern.matches("/old/7/news").expect("should match");
        assert_eq!(m.captures(), &["7".to_string(), "news".to_string()]);
    }
}
