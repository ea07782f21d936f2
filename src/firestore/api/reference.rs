use std::fmt::{Display, Formatter};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::firestore::error::{invalid_path, FirestoreResult};
use crate::firestore::model::{AutoId, DatabaseId, DocumentKey, IntoFieldPath, ResourcePath};
use crate::firestore::value::markers;

use super::query::{FilterOperator, OrderDirection, Query, QueryPredicate};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CollectionReference {
    database_id: DatabaseId,
    path: ResourcePath,
}

impl CollectionReference {
    pub(crate) fn new(database_id: DatabaseId, path: ResourcePath) -> FirestoreResult<Self> {
        if !path.is_collection_path() {
            return Err(invalid_path(format!(
                "Collection paths must have an odd number of segments, but '{}' has {}",
                path.canonical_string(),
                path.len()
            )));
        }
        Ok(Self { database_id, path })
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    /// The full path of the collection (e.g. `rooms/eros/messages`).
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// The last segment of the collection path.
    pub fn id(&self) -> &str {
        // Odd length, so never empty.
        self.path.last_segment().unwrap_or_default()
    }

    /// Fully-qualified resource name of the collection.
    pub fn name(&self) -> String {
        self.database_id.resource_name(&self.path)
    }

    /// Returns the document that logically contains this collection, or
    /// `None` for a root collection.
    pub fn parent(&self) -> Option<DocumentReference> {
        let parent_path = self.path.without_last();
        if parent_path.is_empty() {
            return None;
        }
        DocumentReference::new(self.database_id.clone(), parent_path).ok()
    }

    /// Returns a reference to the document identified by `document_id`.
    ///
    /// `document_id` may span several segments (`"alice/posts/p1"`). When it
    /// is `None` or normalizes to nothing, a 20-character auto-ID is used.
    pub fn doc(&self, document_id: Option<&str>) -> FirestoreResult<DocumentReference> {
        let relative = document_id
            .map(ResourcePath::from_string)
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| ResourcePath::from_segments([AutoId::generate()]));
        DocumentReference::new(self.database_id.clone(), self.path.append(&relative))
    }

    /// Creates a query that targets this collection.
    pub fn query(&self) -> Query {
        Query::for_collection(self)
    }

    pub fn where_field<F, V>(&self, field: F, op: FilterOperator, value: V) -> FirestoreResult<Query>
    where
        F: IntoFieldPath,
        V: Serialize,
    {
        self.query().where_field(field, op, value)
    }

    pub fn where_document_id(&self, op: FilterOperator, id: &str) -> FirestoreResult<Query> {
        self.query().where_document_id(op, id)
    }

    pub fn where_document_ids<I, S>(&self, op: FilterOperator, ids: I) -> FirestoreResult<Query>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query().where_document_ids(op, ids)
    }

    pub fn or(&self, predicates: Vec<QueryPredicate>) -> FirestoreResult<Query> {
        self.query().or(predicates)
    }

    pub fn and(&self, predicates: Vec<QueryPredicate>) -> FirestoreResult<Query> {
        self.query().and(predicates)
    }

    pub fn order_by<F: IntoFieldPath>(
        &self,
        field: F,
        direction: OrderDirection,
    ) -> FirestoreResult<Query> {
        self.query().order_by(field, direction)
    }

    pub fn limit(&self, limit: i32) -> FirestoreResult<Query> {
        self.query().limit(limit)
    }

    pub fn limit_to_last(&self, limit: i32) -> FirestoreResult<Query> {
        self.query().limit_to_last(limit)
    }
}

impl Display for CollectionReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CollectionReference({})", self.path.canonical_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentReference {
    database_id: DatabaseId,
    key: DocumentKey,
}

impl DocumentReference {
    pub(crate) fn new(database_id: DatabaseId, path: ResourcePath) -> FirestoreResult<Self> {
        let key = DocumentKey::from_path(path)?;
        Ok(Self { database_id, key })
    }

    /// Parses a fully-qualified name such as
    /// `projects/p/databases/(default)/documents/users/alice`.
    pub fn from_resource_name(name: &str) -> FirestoreResult<Self> {
        let (database_id, path) = DatabaseId::parse_resource_name(name)?;
        Self::new(database_id, path)
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// The document identifier (the last segment of its path).
    pub fn id(&self) -> &str {
        self.key.id()
    }

    /// The path to the document, relative to the documents root.
    pub fn path(&self) -> &ResourcePath {
        self.key.path()
    }

    /// The resource name used on the wire.
    pub fn name(&self) -> String {
        self.database_id.resource_name(self.key.path())
    }

    /// The collection containing this document.
    pub fn parent(&self) -> CollectionReference {
        CollectionReference {
            database_id: self.database_id.clone(),
            path: self.key.collection_path(),
        }
    }

    /// Returns a reference to a subcollection rooted at this document.
    ///
    /// `collection_path` may span several segments (`"posts/p1/comments"`)
    /// as long as it ends on a collection.
    pub fn collection(&self, collection_path: &str) -> FirestoreResult<CollectionReference> {
        let relative = ResourcePath::from_string(collection_path);
        if relative.is_empty() {
            return Err(invalid_path("Collection ID cannot be empty"));
        }
        CollectionReference::new(self.database_id.clone(), self.key.path().append(&relative))
    }
}

impl Display for DocumentReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DocumentReference({})",
            self.key.path().canonical_string()
        )
    }
}

impl Serialize for DocumentReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        markers::serialize_reference(&self.name(), serializer)
    }
}

impl<'de> Deserialize<'de> for DocumentReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = markers::deserialize_reference(deserializer)?;
        DocumentReference::from_resource_name(&name).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::value::{from_value, to_value, ValueKind};

    fn users() -> CollectionReference {
        CollectionReference::new(DatabaseId::default("demo"), ResourcePath::from_string("users"))
            .unwrap()
    }

    #[test]
    fn document_parent_round_trip() {
        let doc = users().doc(Some("alice")).unwrap();
        assert_eq!(doc.parent().doc(Some(doc.id())).unwrap(), doc);
        assert_eq!(doc.parent(), users());
    }

    #[test]
    fn nested_collections() {
        let posts = users().doc(Some("alice")).unwrap().collection("posts").unwrap();
        assert_eq!(posts.path().canonical_string(), "users/alice/posts");
        assert_eq!(posts.parent().unwrap().id(), "alice");
        assert!(users().parent().is_none());

        let err = users().doc(Some("alice")).unwrap().collection("posts/p1").unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-path");
        let err = users().doc(Some("alice")).unwrap().collection("//").unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-path");
    }

    #[test]
    fn multi_segment_document_ids() {
        let doc = users().doc(Some("alice/posts/p1")).unwrap();
        assert_eq!(doc.path().canonical_string(), "users/alice/posts/p1");
        let err = users().doc(Some("alice/posts")).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-path");
    }

    #[test]
    fn auto_ids_when_missing_or_empty() {
        let generated = users().doc(None).unwrap();
        assert_eq!(generated.id().len(), 20);
        assert_eq!(users().doc(Some("")).unwrap().id().len(), 20);
    }

    #[test]
    fn resource_names_round_trip() {
        let doc = users().doc(Some("alice")).unwrap();
        assert_eq!(
            doc.name(),
            "projects/demo/databases/(default)/documents/users/alice"
        );
        assert_eq!(DocumentReference::from_resource_name(&doc.name()).unwrap(), doc);
    }

    #[test]
    fn encodes_as_reference_value() {
        let doc = users().doc(Some("alice")).unwrap();
        let value = to_value(&doc).unwrap();
        assert!(matches!(value.kind(), ValueKind::Reference(name) if name == &doc.name()));
        let decoded: DocumentReference = from_value(&value).unwrap();
        assert_eq!(decoded, doc);
    }
}
