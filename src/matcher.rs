//! Entry selection predicates
//!
//! A [`Matcher`] decides whether a leaf entry, identified by its full virtual
//! path, takes part in a read traversal. Nested archives are never matched
//! themselves; traversal always descends into them.
//!
//! # Glob syntax
//!
//! [`GlobMatcher`] understands:
//!
//! - `*` - zero or more characters, but not `/`
//! - `**` - zero or more characters, including `/`
//! - `?` - exactly one character, but not `/`
//!
//! The nesting separator `#/` is an ordinary `#` followed by `/`, so
//! `**/ra.xml` finds descriptors at every nesting level while
//! `META-INF/*.xml` only matches the top level.
//!
//! # Examples
//!
//! ```
//! use earpatch::matcher::{GlobMatcher, Matcher, SuffixMatcher};
//!
//! assert!(SuffixMatcher::new("ra.xml").matches("lib/x.rar#/META-INF/ra.xml"));
//! assert!(GlobMatcher::new("**/*.xml").matches("lib/x.rar#/META-INF/ra.xml"));
//! assert!(!GlobMatcher::new("*.xml").matches("META-INF/ra.xml"));
//! ```

/// Predicate over a fully-qualified virtual path.
pub trait Matcher {
    fn matches(&self, path: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Matcher for F {
    fn matches(&self, path: &str) -> bool {
        self(path)
    }
}

/// Accepts paths ending with a fixed suffix. A suffix equal to the whole
/// virtual path behaves as an exact match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixMatcher {
    suffix: String,
}

impl SuffixMatcher {
    /// Match virtual paths ending in `suffix`.
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Matcher for SuffixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.ends_with(&self.suffix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Byte(u8),
    AnyByte,
    Star,
    DoubleStar,
}

/// Glob pattern over virtual paths, compiled once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobMatcher {
    pattern: String,
    tokens: Vec<Token>,
}

impl GlobMatcher {
    /// Compile `pattern`; `**` also crosses `#/` boundaries.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let tokens = compile(pattern.as_bytes());
        Self { pattern, tokens }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Matcher for GlobMatcher {
    fn matches(&self, path: &str) -> bool {
        match_tokens(&self.tokens, path.as_bytes())
    }
}

fn compile(pattern: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut i = 0;
    while i < pattern.len() {
        match pattern[i] {
            b'*' if pattern.get(i + 1) == Some(&b'*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
                // `**/` also matches an empty directory prefix
                if pattern.get(i) == Some(&b'/') {
                    i += 1;
                }
            },
            b'*' => {
                tokens.push(Token::Star);
                i += 1;
            },
            b'?' => {
                tokens.push(Token::AnyByte);
                i += 1;
            },
            c => {
                tokens.push(Token::Byte(c));
                i += 1;
            },
        }
    }
    tokens
}

fn match_tokens(tokens: &[Token], text: &[u8]) -> bool {
    let Some((first, rest)) = tokens.split_first() else {
        return text.is_empty();
    };

    match *first {
        Token::Byte(c) => text.first() == Some(&c) && match_tokens(rest, &text[1..]),
        Token::AnyByte => {
            matches!(text.first(), Some(&c) if c != b'/') && match_tokens(rest, &text[1..])
        },
        Token::Star => {
            // Try every split point up to the next `/`
            let limit = text.iter().position(|&c| c == b'/').unwrap_or(text.len());
            (0..=limit).any(|n| match_tokens(rest, &text[n..]))
        },
        Token::DoubleStar => {
            rest.is_empty() || (0..=text.len()).any(|n| match_tokens(rest, &text[n..]))
        },
    }
}

/// Whether `path` is selected by `matchers`: an empty set selects everything,
/// otherwise any single match is enough.
pub fn any_matches(matchers: &[&dyn Matcher], path: &str) -> bool {
    matchers.is_empty() || matchers.iter().any(|m| m.matches(path))
}
