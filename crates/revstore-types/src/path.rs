//! Hierarchical storage paths.
//!
//! Valid paths:
//! - Must start with `/`
//! - Must contain at least one component
//! - Components are separated by a single `/` and must be non-empty
//! - Components may only contain ASCII letters, digits, `_` and `-`
//! - Must not end with `/`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A validated, `/`-delimited key into a file's path namespace.
///
/// Paths order lexicographically by their string form, which keeps snapshot
/// iteration deterministic.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoragePath(String);

impl StoragePath {
    /// Parse and validate a path.
    ///
    /// # Examples
    ///
    /// ```
    /// use revstore_types::StoragePath;
    ///
    /// assert!(StoragePath::parse("/bakery/muffin").is_ok());
    /// assert!(StoragePath::parse("/foo/12").is_ok());
    /// assert!(StoragePath::parse("bakery").is_err());
    /// assert!(StoragePath::parse("/a//b").is_err());
    /// ```
    pub fn parse(path: &str) -> Result<Self, TypeError> {
        validate_path(path)?;
        Ok(Self(path.to_string()))
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path's components (without slashes).
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split('/')
    }

    /// Append a single component, producing a child path.
    pub fn join(&self, component: &str) -> Result<Self, TypeError> {
        Self::parse(&format!("{}/{}", self.0, component))
    }

    /// Returns `true` if `prefix` is this path or one of its ancestors.
    ///
    /// Matching is component-wise: `/bakery` is a prefix of `/bakery/muffin`
    /// but not of `/bakeryx`.
    pub fn is_prefix_or_same(&self, prefix: &StoragePath) -> bool {
        match self.0.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// If this path is exactly `<prefix>/<n>` with `n` a canonical decimal
    /// number, return `n`.
    pub fn numeric_child_of(&self, prefix: &StoragePath) -> Option<u64> {
        let rest = self.0.strip_prefix(prefix.as_str())?.strip_prefix('/')?;
        parse_canonical_number(rest)
    }

    /// Returns `true` if this path is `<prefix>/<n>` with `start <= n < end`.
    pub fn in_numeric_range(&self, prefix: &StoragePath, start: u64, end: u64) -> bool {
        self.numeric_child_of(prefix)
            .is_some_and(|n| n >= start && n < end)
    }
}

/// `0` or a run of digits without a leading zero.
fn parse_canonical_number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

fn validate_path(path: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let Some(rest) = path.strip_prefix('/') else {
        return Err(invalid("must start with '/'"));
    };
    if rest.is_empty() {
        return Err(invalid("must contain at least one component"));
    }
    for component in rest.split('/') {
        if component.is_empty() {
            return Err(invalid("components must not be empty"));
        }
        if let Some(ch) = component
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(invalid(&format!("contains forbidden character: {ch:?}")));
        }
    }
    Ok(())
}

impl FromStr for StoragePath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StoragePath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_path(&value)?;
        Ok(Self(value))
    }
}

impl From<StoragePath> for String {
    fn from(path: StoragePath) -> Self {
        path.0
    }
}

impl AsRef<str> for StoragePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoragePath({})", self.0)
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    #[test]
    fn valid_paths() {
        assert!(StoragePath::parse("/abc").is_ok());
        assert!(StoragePath::parse("/a/b/c").is_ok());
        assert!(StoragePath::parse("/foo/10").is_ok());
        assert!(StoragePath::parse("/snake_case/kebab-case").is_ok());
    }

    #[test]
    fn reject_malformed_paths() {
        assert!(StoragePath::parse("").is_err());
        assert!(StoragePath::parse("/").is_err());
        assert!(StoragePath::parse("abc").is_err());
        assert!(StoragePath::parse("/abc/").is_err());
        assert!(StoragePath::parse("/a//b").is_err());
        assert!(StoragePath::parse("/a b").is_err());
        assert!(StoragePath::parse("/a.b").is_err());
        assert!(StoragePath::parse("/../etc").is_err());
    }

    #[test]
    fn components_skip_leading_slash() {
        let path = p("/users/alice/0");
        let parts: Vec<&str> = path.components().collect();
        assert_eq!(parts, vec!["users", "alice", "0"]);
    }

    #[test]
    fn prefix_is_component_wise() {
        let prefix = p("/bakery");
        assert!(p("/bakery").is_prefix_or_same(&prefix));
        assert!(p("/bakery/muffin").is_prefix_or_same(&prefix));
        assert!(p("/bakery/muffin/blueberry").is_prefix_or_same(&prefix));
        assert!(!p("/bakeryx").is_prefix_or_same(&prefix));
        assert!(!p("/baker").is_prefix_or_same(&prefix));
    }

    #[test]
    fn numeric_children() {
        let prefix = p("/foo");
        assert_eq!(p("/foo/0").numeric_child_of(&prefix), Some(0));
        assert_eq!(p("/foo/12").numeric_child_of(&prefix), Some(12));
        assert_eq!(p("/foo/012").numeric_child_of(&prefix), None);
        assert_eq!(p("/foo/1/2").numeric_child_of(&prefix), None);
        assert_eq!(p("/foo/x1").numeric_child_of(&prefix), None);
        assert_eq!(p("/foox/1").numeric_child_of(&prefix), None);
        assert_eq!(p("/foo").numeric_child_of(&prefix), None);
    }

    #[test]
    fn numeric_range_is_half_open() {
        let prefix = p("/foo");
        assert!(!p("/foo/1").in_numeric_range(&prefix, 2, 12));
        assert!(p("/foo/2").in_numeric_range(&prefix, 2, 12));
        assert!(p("/foo/11").in_numeric_range(&prefix, 2, 12));
        assert!(!p("/foo/12").in_numeric_range(&prefix, 2, 12));
    }

    #[test]
    fn join_validates_component() {
        assert_eq!(p("/a").join("b").unwrap(), p("/a/b"));
        assert!(p("/a").join("b/").is_err());
        assert!(p("/a").join("").is_err());
    }

    #[test]
    fn serde_revalidates() {
        let json = serde_json::to_string(&p("/x/y")).unwrap();
        assert_eq!(json, "\"/x/y\"");
        assert_eq!(serde_json::from_str::<StoragePath>(&json).unwrap(), p("/x/y"));
        assert!(serde_json::from_str::<StoragePath>("\"no-slash\"").is_err());
    }
}
