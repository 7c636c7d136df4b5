//! Route matching logic.
//!
//! # Responsibilities
//! - Match a request path against a route prefix (case-sensitive)
//! - Produce the backend path with the prefix stripped or replaced
//!
//! # Design Decisions
//! - Prefixes match on path-segment boundaries: `/users` matches `/users`
//!   and `/users/42`, never `/usersx`
//! - A trailing `/*` is accepted as glob syntax and means the same as the
//!   bare prefix
//! - No regex to guarantee O(n) matching

/// Compiled prefix-match/replace rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatcher {
    prefix: String,
    replacement: String,
}

impl PrefixMatcher {
    /// Compile a prefix. `replacement` is substituted for the matched
    /// prefix; `None` strips it.
    pub fn new(prefix: &str, replacement: Option<&str>) -> Self {
        let prefix = prefix.strip_suffix("/*").unwrap_or(prefix);
        let prefix = prefix.trim_end_matches('/');
        let replacement = replacement.unwrap_or("").trim_end_matches('/');
        Self {
            prefix: prefix.to_string(),
            replacement: replacement.to_string(),
        }
    }

    /// Normalized prefix; empty for the root route.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The rewritten path if `path` falls under this prefix.
    pub fn replace(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if !rest.is_empty() && !rest.starts_with('/') && !self.prefix.is_empty() {
            return None;
        }
        let rest = rest.trim_start_matches('/');
        Some(format!("{}/{}", self.replacement, rest))
    }
}
