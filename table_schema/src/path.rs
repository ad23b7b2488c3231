use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Location of a value inside a state tree, e.g. `/players/7/stack`.
///
/// Segments are map keys or decimal list indices. The textual form uses
/// JSON-pointer escaping (`~0` for `~`, `~1` for `/`).
///
/// Paths order segment by segment, so every prefix sorts before the paths
/// it covers. Canonical list indices compare numerically and sort before
/// any other key, which keeps `/board/2` ahead of `/board/10`.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct PropertyPath(Vec<String>);

/// Error raised when a path cannot be resolved against a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path {0} does not resolve")]
    Unresolved(PropertyPath),
    #[error("parent of {0} is not a map or list")]
    NotAContainer(PropertyPath),
    #[error("list index at {0} is out of range")]
    IndexOutOfRange(PropertyPath),
    #[error("the root of a tree cannot be removed")]
    RootRemoval,
}

impl PropertyPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parses `/a/b/c`. Empty segments are ignored, so `""` and `"/"` are
    /// both the root.
    pub fn parse(text: &str) -> Self {
        Self(
            text.split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// True when `prefix` equals this path or is one of its ancestors.
    pub fn starts_with(&self, prefix: &PropertyPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn is_ancestor_of(&self, other: &PropertyPath) -> bool {
        self.0.len() < other.0.len() && other.starts_with(self)
    }

    /// Path of `self` relative to `prefix`, if `prefix` covers it.
    pub fn strip_prefix(&self, prefix: &PropertyPath) -> Option<PropertyPath> {
        if self.starts_with(prefix) {
            Some(Self(self.0[prefix.0.len()..].to_vec()))
        } else {
            None
        }
    }

    /// Strict ancestors, nearest first. The root is included for any
    /// non-root path.
    pub fn ancestors(&self) -> impl Iterator<Item = PropertyPath> + '_ {
        (0..self.0.len()).rev().map(|len| Self(self.0[..len].to_vec()))
    }
}

fn list_index(segment: &str) -> Option<u64> {
    if segment.len() > 1 && segment.starts_with('0') {
        return None;
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn compare_segments(left: &str, right: &str) -> Ordering {
    match (list_index(left), list_index(right)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.cmp(right),
    }
}

impl Ord for PropertyPath {
    fn cmp(&self, other: &Self) -> Ordering {
        for (left, right) in self.0.iter().zip(&other.0) {
            match compare_segments(left, right) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for PropertyPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyPath({self})")
    }
}

impl FromStr for PropertyPath {
    type Err = Infallible;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(text))
    }
}

impl From<&str> for PropertyPath {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl Serialize for PropertyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PropertyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let path = PropertyPath::parse("/players/7/stack");
        assert_eq!(path.segments(), ["players", "7", "stack"]);
        assert_eq!(path.to_string(), "/players/7/stack");
        assert_eq!(PropertyPath::parse("/").to_string(), "/");
        assert!(PropertyPath::parse("").is_root());
    }

    #[test]
    fn escaped_segments() {
        let path = PropertyPath::new(["a/b", "c~d"]);
        assert_eq!(path.to_string(), "/a~1b/c~0d");
        assert_eq!(PropertyPath::parse(&path.to_string()), path);
    }

    #[test]
    fn prefix_relations() {
        let player = PropertyPath::parse("/players/7");
        let stack = player.child("stack");
        assert!(stack.starts_with(&player));
        assert!(player.is_ancestor_of(&stack));
        assert!(!stack.is_ancestor_of(&player));
        assert!(!player.is_ancestor_of(&player));
        assert!(PropertyPath::root().is_ancestor_of(&player));
        assert_eq!(
            stack.strip_prefix(&player),
            Some(PropertyPath::parse("/stack"))
        );
        assert_eq!(stack.parent(), Some(player));
        assert_eq!(
            stack.ancestors().map(|p| p.to_string()).collect::<Vec<_>>(),
            ["/players/7", "/players", "/"]
        );
    }

    #[test]
    fn prefixes_sort_first() {
        let mut paths = vec![
            PropertyPath::parse("/players/7/stack"),
            PropertyPath::parse("/board"),
            PropertyPath::parse("/players/7"),
            PropertyPath::root(),
        ];
        paths.sort();
        let rendered: Vec<_> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["/", "/board", "/players/7", "/players/7/stack"]);
    }

    #[test]
    fn list_indices_sort_numerically() {
        let mut paths: Vec<_> = ["/board/10", "/board/2", "/board/x", "/board/02", "/board/1"]
            .into_iter()
            .map(PropertyPath::parse)
            .collect();
        paths.sort();
        let rendered: Vec<_> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            ["/board/1", "/board/2", "/board/10", "/board/02", "/board/x"]
        );
    }
}
