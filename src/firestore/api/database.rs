use crate::firestore::error::{invalid_path, FirestoreResult};
use crate::firestore::model::{DatabaseId, ResourcePath};
use crate::firestore::remote::JsonProtoSerializer;

use super::query::Query;
use super::reference::{CollectionReference, DocumentReference};
use super::write_batch::WriteBatch;

/// Root handle for one Firestore database.
///
/// Holds nothing but the [`DatabaseId`]; it is cheap to clone and is passed
/// explicitly to whatever performs network calls.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Firestore {
    database_id: DatabaseId,
}

impl Firestore {
    pub fn new(database_id: DatabaseId) -> Self {
        Self { database_id }
    }

    /// Handle for the `(default)` database of `project_id`.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self::new(DatabaseId::default(project_id))
    }

    /// The fully qualified database identifier (project + database name).
    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    pub fn project_id(&self) -> &str {
        self.database_id.project_id()
    }

    /// Returns the logical database name (usually `"(default)"`).
    pub fn database(&self) -> &str {
        self.database_id.database()
    }

    /// Creates a `CollectionReference` pointing at `path`.
    ///
    /// The path is interpreted relative to the documents root using forward
    /// slashes to separate segments (e.g. `"users/alovelace/repos"`).
    pub fn collection(&self, path: &str) -> FirestoreResult<CollectionReference> {
        let resource = ResourcePath::from_string(path);
        if resource.is_empty() {
            return Err(invalid_path("Collection path cannot be empty"));
        }
        CollectionReference::new(self.database_id.clone(), resource)
    }

    /// Creates a `DocumentReference` pointing at `path`.
    ///
    /// The path must contain an even number of segments (collection/doc pairs).
    pub fn doc(&self, path: &str) -> FirestoreResult<DocumentReference> {
        DocumentReference::new(self.database_id.clone(), ResourcePath::from_string(path))
    }

    /// Creates a query over every collection named `collection_id`, whatever
    /// its parent document.
    pub fn collection_group(&self, collection_id: &str) -> FirestoreResult<Query> {
        Query::collection_group(self.database_id.clone(), collection_id)
    }

    /// Starts an empty batch of writes against this database.
    pub fn batch(&self) -> WriteBatch {
        WriteBatch::new(self)
    }

    /// REST JSON serializer bound to this database.
    pub fn serializer(&self) -> JsonProtoSerializer {
        JsonProtoSerializer::new(self.database_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firestore() -> Firestore {
        Firestore::for_project("demo")
    }

    #[test]
    fn builds_references_from_paths() {
        let db = firestore();
        let users = db.collection("/users/").unwrap();
        assert_eq!(users.path().canonical_string(), "users");
        let doc = db.doc("users//alice").unwrap();
        assert_eq!(doc.id(), "alice");
        assert_eq!(db.database(), "(default)");
    }

    #[test]
    fn rejects_wrong_parity() {
        let db = firestore();
        assert_eq!(
            db.collection("users/alice").unwrap_err().code_str(),
            "firestore/invalid-path"
        );
        assert_eq!(db.collection("").unwrap_err().code_str(), "firestore/invalid-path");
        assert_eq!(db.doc("users").unwrap_err().code_str(), "firestore/invalid-path");
    }

    #[test]
    fn collection_group_scans_descendants() {
        let query = firestore().collection_group("landmarks").unwrap();
        assert!(query.all_descendants());
        assert_eq!(query.collection_id(), "landmarks");
        assert!(firestore().collection_group("a/b").is_err());
    }
}
