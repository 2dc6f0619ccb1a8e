//! Route pattern compilation.
//!
//! A pattern is literal text with two kinds of tokens:
//!
//! - `:name` (or `*name`) captures one path segment, i.e. any run of characters except `/`
//! - a bare `*` matches any remaining characters without capturing
//!
//! The compiled matcher is anchored at the end only: `/user/:id` matches `/user/42` and
//! `/api/user/42`, but not `/user/42/edit`.

use super::RouteError;
use crate::request::PathParams;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
}

impl Pattern {
    pub fn compile(pattern: &str) -> Result<Self, RouteError> {
        let mut expr = String::with_capacity(pattern.len() + 16);
        let mut names = Vec::new();
        let mut literal = String::new();

        let mut chars = pattern.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if c != ':' && c != '*' {
                literal.push(c);
                continue;
            }

            let mut end = start + c.len_utf8();
            while let Some(&(index, next)) = chars.peek() {
                if !(next.is_alphanumeric() || next == '_') {
                    break;
                }
                end = index + next.len_utf8();
                chars.next();
            }
            let name = &pattern[start + c.len_utf8()..end];

            if name.is_empty() && c == ':' {
                // a colon without a name is plain text
                literal.push(c);
                continue;
            }

            expr.push_str(&regex::escape(&literal));
            literal.clear();

            if name.is_empty() {
                expr.push_str("(?:.*)");
            } else {
                names.push(name.to_owned());
                expr.push_str("([^/]+)");
            }
        }

        expr.push_str(&regex::escape(&literal));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source| RouteError::InvalidPattern { pattern: pattern.to_owned(), source })?;
        Ok(Self { source: pattern.to_owned(), regex, names })
    }

    /// Matches a path, returning the captured parameters in the order their tokens appear.
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let captures = self.regex.captures(path)?;
        let params = self
            .names
            .iter()
            .zip(captures.iter().skip(1))
            .filter_map(|(name, value)| value.map(|value| (name.as_str(), value.as_str())))
            .collect();
        Some(params)
    }

    #[inline]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Parameter names in encounter order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}
