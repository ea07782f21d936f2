use serde::de::DeserializeOwned;

use crate::firestore::error::FirestoreResult;
use crate::firestore::model::{IntoFieldPath, Timestamp};
use crate::firestore::value::{from_map, from_value, FirestoreValue, MapValue};

use super::query::Query;
use super::reference::DocumentReference;

/// A document read from the backend, or the absence of one.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    reference: DocumentReference,
    data: Option<MapValue>,
    create_time: Option<Timestamp>,
    update_time: Option<Timestamp>,
}

impl DocumentSnapshot {
    pub fn new(
        reference: DocumentReference,
        data: Option<MapValue>,
        create_time: Option<Timestamp>,
        update_time: Option<Timestamp>,
    ) -> Self {
        Self {
            reference,
            data,
            create_time,
            update_time,
        }
    }

    /// Snapshot of a document that does not exist.
    pub fn missing(reference: DocumentReference) -> Self {
        Self::new(reference, None, None, None)
    }

    /// Returns whether the document exists on the backend.
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    pub fn reference(&self) -> &DocumentReference {
        &self.reference
    }

    /// The raw document fields, if the document exists.
    pub fn data(&self) -> Option<&MapValue> {
        self.data.as_ref()
    }

    pub fn create_time(&self) -> Option<Timestamp> {
        self.create_time
    }

    pub fn update_time(&self) -> Option<Timestamp> {
        self.update_time
    }

    /// Decodes the whole document into `T`. Returns `Ok(None)` when the
    /// document does not exist.
    pub fn data_as<T>(&self) -> FirestoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.data.as_ref().map(from_map::<T>).transpose()
    }

    /// Returns the raw value stored at `field`, if any.
    pub fn get_value<F: IntoFieldPath>(&self, field: F) -> FirestoreResult<Option<&FirestoreValue>> {
        let path = field.into_field_path()?;
        Ok(self.data.as_ref().and_then(|data| data.get_path(&path)))
    }

    /// Decodes a single (possibly nested) field into `T`.
    ///
    /// Both a missing document and a missing field yield `Ok(None)`; errors
    /// are reported relative to the field's own position in the document.
    pub fn get<T, F>(&self, field: F) -> FirestoreResult<Option<T>>
    where
        T: DeserializeOwned,
        F: IntoFieldPath,
    {
        let path = field.into_field_path()?;
        let Some(value) = self.data.as_ref().and_then(|data| data.get_path(&path)) else {
            return Ok(None);
        };
        from_value(value).map(Some).map_err(|err| {
            path.segments()
                .iter()
                .rev()
                .fold(err, |err, segment| err.within(segment.clone()))
        })
    }
}

/// The documents returned by running a [`Query`].
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySnapshot {
    query: Query,
    documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn new(query: Query, documents: Vec<DocumentSnapshot>) -> Self {
        Self { query, documents }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<DocumentSnapshot> {
        self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentSnapshot> {
        self.documents.iter()
    }

    /// Decodes every existing document into `T`, in result order.
    pub fn documents_as<T>(&self) -> FirestoreResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.documents
            .iter()
            .filter_map(|snapshot| snapshot.data_as::<T>().transpose())
            .collect()
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

impl<'a> IntoIterator for &'a QuerySnapshot {
    type Item = &'a DocumentSnapshot;
    type IntoIter = std::slice::Iter<'a, DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}
