use crate::firestore::error::{invalid_path, FirestoreResult};
use crate::firestore::model::ResourcePath;

/// Validated path of a single document, relative to the documents root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    path: ResourcePath,
}

impl DocumentKey {
    pub fn from_path(path: ResourcePath) -> FirestoreResult<Self> {
        if !path.is_document_path() {
            return Err(invalid_path(format!(
                "Document paths must have an even number of segments, but '{}' has {}",
                path.canonical_string(),
                path.len()
            )));
        }
        Ok(Self { path })
    }

    pub fn from_string(path: &str) -> FirestoreResult<Self> {
        Self::from_path(ResourcePath::from_string(path))
    }

    pub fn collection_path(&self) -> ResourcePath {
        self.path.without_last()
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn id(&self) -> &str {
        // Non-empty by construction.
        self.path.last_segment().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_even_segments() {
        let err = DocumentKey::from_string("cities").unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-path");
        let err = DocumentKey::from_string("").unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-path");
    }

    #[test]
    fn parses_valid_path() {
        let key = DocumentKey::from_string("/cities//sf").unwrap();
        assert_eq!(key.id(), "sf");
        assert_eq!(key.collection_path().canonical_string(), "cities");
    }
}
