use std::fmt::{Display, Formatter};
use std::ops::Deref;

/// Collapses a slash-separated path: empty segments (leading, trailing or
/// doubled slashes) are dropped and the rest is rejoined with single `/`.
///
/// ```
/// use firestore_admin_core::firestore::model::normalize;
///
/// assert_eq!(normalize("/rooms//eros/"), "rooms/eros");
/// assert_eq!(normalize(&normalize("//a/b")), normalize("//a/b"));
/// ```
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments.into_iter().map(Into::into).collect();
        Self::new(segments)
    }

    /// Parses a slash-separated path, silently dropping empty segments.
    pub fn from_string(path: &str) -> Self {
        Self::from_segments(
            path.split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
        )
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(|s| s.as_str())
    }

    /// Document paths alternate collection/document and end on a document,
    /// so they always hold an even number of segments.
    pub fn is_document_path(&self) -> bool {
        !self.is_empty() && self.len() % 2 == 0
    }

    /// Collection paths hold an odd number of segments.
    pub fn is_collection_path(&self) -> bool {
        self.len() % 2 == 1
    }

    pub fn child<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut new_segments = self.segments.clone();
        new_segments.extend(segments.into_iter().map(Into::into));
        Self::new(new_segments)
    }

    pub fn append(&self, other: &ResourcePath) -> Self {
        self.child(other.segments.iter().cloned())
    }

    pub fn pop_last(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self::new(segments))
    }

    pub fn without_last(&self) -> Self {
        self.pop_last().unwrap_or_else(Self::root)
    }

    pub fn pop_first_n(&self, count: usize) -> Self {
        if count >= self.segments.len() {
            return Self::root();
        }
        Self::new(self.segments[count..].to_vec())
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    pub fn canonical_string(&self) -> String {
        self.segments.join("/")
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.segments.iter().zip(other.segments.iter()).all(|(l, r)| l == r)
    }
}

impl Display for ResourcePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_string())
    }
}

impl Deref for ResourcePath {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render_path() {
        let path = ResourcePath::from_string("cities/sf/neighborhoods/downtown");
        assert_eq!(path.len(), 4);
        assert_eq!(path.last_segment(), Some("downtown"));
        assert_eq!(path.canonical_string(), "cities/sf/neighborhoods/downtown");
        assert!(path.is_document_path());
    }

    #[test]
    fn handles_root_path() {
        let path = ResourcePath::from_string("");
        assert!(path.is_empty());
        assert!(!path.is_document_path());
        assert!(!path.is_collection_path());
    }

    #[test]
    fn drops_empty_segments() {
        let path = ResourcePath::from_string("/cities//sf/");
        assert_eq!(path.canonical_string(), "cities/sf");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["", "/", "a", "/a//b/", "a/b/c", "///x///y"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "input {raw:?}");
        }
        assert_eq!(normalize("/a//b/"), "a/b");
    }
}
