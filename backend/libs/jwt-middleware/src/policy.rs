//! Path based enforcement policy
//!
//! An exempt path admits anonymous traffic, but a client that does present a
//! credential must present a valid one: only "no credential supplied" is
//! tolerated there.

use crate::error::AuthError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExemptPaths {
    prefixes: Vec<String>,
}

impl ExemptPaths {
    /// Parse a comma separated prefix list. Blank entries are dropped so a
    /// trailing comma never exempts every path.
    pub fn parse(list: &str) -> Self {
        let prefixes = list
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Whether `err` on `path` lets the request through unauthenticated
    pub fn tolerates(&self, path: &str, err: &AuthError) -> bool {
        err.is_empty_credential() && self.is_exempt(path)
    }
}
