//! Ant-style URL path patterns.
//!
//! Supported syntax, per `/`-separated segment:
//!
//! - `?` matches exactly one character
//! - `*` matches zero or more characters
//! - `**` as a whole segment matches zero or more segments
//! - `{name}` matches the rest of the segment
//! - `{name:regex}` matches the segment part against `regex`
//!
//! Everything else is literal and case-sensitive. Empty segments are ignored,
//! so `/a//b` and `/a/b` are equivalent. A pattern ending in a lone `*`
//! segment also matches the bare directory with a trailing slash, so
//! `/a/*` covers `/a/`.

use regex::Regex;
use std::fmt;

/// A pattern could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    /// The offending pattern.
    pub pattern: String,
    /// Error details.
    pub reason: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid path pattern '{}': {}", self.pattern, self.reason)
    }
}

impl std::error::Error for PatternError {}

#[derive(Debug, Clone)]
enum Segment {
    /// `**`
    AnyDepth,
    /// `*` as a whole segment
    AnyName,
    Literal(String),
    Glob(Regex),
}

impl Segment {
    fn matches(&self, part: &str) -> bool {
        match self {
            Self::AnyDepth | Self::AnyName => true,
            Self::Literal(literal) => literal == part,
            Self::Glob(regex) => regex.is_match(part),
        }
    }
}

/// A compiled Ant-style path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    absolute: bool,
    trailing_slash: bool,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `PatternError` for unbalanced braces or an invalid variable regex.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let segments = split(pattern)
            .map(|part| compile_segment(pattern, part))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            absolute: pattern.starts_with('/'),
            trailing_slash: pattern.ends_with('/'),
            segments,
        })
    }

    /// Returns the pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if `path` matches the whole pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        if path.starts_with('/') != self.absolute {
            return false;
        }
        let parts: Vec<&str> = split(path).collect();
        if self.matches_directory(path, &parts) {
            return true;
        }
        if !match_segments(&self.segments, &parts) {
            return false;
        }
        // `/a/**` covers `/a/` too; otherwise the trailing slash must agree.
        matches!(self.segments.last(), Some(Segment::AnyDepth))
            || path.ends_with('/') == self.trailing_slash
    }

    /// `/a/*` against `/a/`: the path stops one segment short of a final
    /// lone `*`, and ends in a slash.
    fn matches_directory(&self, path: &str, parts: &[&str]) -> bool {
        match self.segments.split_last() {
            Some((Segment::AnyName, init)) => {
                path.ends_with('/')
                    && init.len() == parts.len()
                    && !init.iter().any(|segment| matches!(segment, Segment::AnyDepth))
                    && match_segments(init, parts)
            }
            _ => false,
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=parts.len()).any(|skip| match_segments(rest, &parts[skip..]))
        }
        Some((segment, rest)) => match parts.split_first() {
            Some((part, remaining)) => segment.matches(part) && match_segments(rest, remaining),
            None => false,
        },
    }
}

fn compile_segment(pattern: &str, part: &str) -> Result<Segment, PatternError> {
    if part == "**" {
        return Ok(Segment::AnyDepth);
    }
    if part == "*" {
        return Ok(Segment::AnyName);
    }
    if !part.contains(['?', '*', '{', '}']) {
        return Ok(Segment::Literal(part.to_string()));
    }

    let error = |reason: String| PatternError {
        pattern: pattern.to_string(),
        reason,
    };

    let mut regex = String::from("^(?s:");
    let mut literal = String::new();
    let mut chars = part.chars();
    while let Some(c) = chars.next() {
        match c {
            '?' | '*' | '{' => {
                regex.push_str(&regex::escape(&literal));
                literal.clear();
            }
            '}' => return Err(error("unmatched '}'".to_string())),
            _ => {
                literal.push(c);
                continue;
            }
        }
        match c {
            '?' => regex.push('.'),
            '*' => regex.push_str(".*"),
            _ => {
                let variable = take_variable(&mut chars)
                    .ok_or_else(|| error("unclosed '{'".to_string()))?;
                match variable.split_once(':') {
                    Some((_, custom)) => {
                        regex.push('(');
                        regex.push_str(custom);
                        regex.push(')');
                    }
                    None => regex.push_str("(.*)"),
                }
            }
        }
    }
    regex.push_str(&regex::escape(&literal));
    regex.push_str(")$");

    Regex::new(&regex)
        .map(Segment::Glob)
        .map_err(|e| error(e.to_string()))
}

/// Consumes a `{...}` body after the opening brace, allowing nested braces
/// such as regex quantifiers.
fn take_variable(chars: &mut std::str::Chars<'_>) -> Option<String> {
    let mut depth = 1usize;
    let mut body = String::new();
    for c in chars.by_ref() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(body);
                }
            }
            _ => {}
        }
        body.push(c);
    }
    None
}
