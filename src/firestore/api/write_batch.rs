use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::firestore::api::operations::{self, SetOptions};
use crate::firestore::constants::MAX_BATCH_WRITES;
use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::DatabaseId;
use crate::firestore::remote::{JsonProtoSerializer, WriteOperation};
use crate::firestore::value::to_map;

use super::database::Firestore;
use super::reference::DocumentReference;

/// Aggregates write operations into a single atomic `commit` request.
///
/// The batch only renders the request body; sending it is up to the caller.
#[derive(Clone, Debug)]
pub struct WriteBatch {
    database_id: DatabaseId,
    writes: Vec<WriteOperation>,
}

impl WriteBatch {
    pub fn new(firestore: &Firestore) -> Self {
        Self {
            database_id: firestore.database_id().clone(),
            writes: Vec::new(),
        }
    }

    /// Queues a write that replaces the document with `data`, or merges into
    /// it when `options` asks for a merge.
    pub fn set<T>(
        &mut self,
        reference: &DocumentReference,
        data: &T,
        options: Option<SetOptions>,
    ) -> FirestoreResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_capacity()?;
        self.ensure_same_database(reference)?;
        let options = options.unwrap_or_default();
        let encoded = operations::encode_set_data(&to_map(data)?, &options)?;
        self.writes
            .push(WriteOperation::set(reference.key().clone(), encoded));
        Ok(self)
    }

    /// Queues an update of an existing document. Keys of `data` are dotted
    /// field paths.
    pub fn update<T>(&mut self, reference: &DocumentReference, data: &T) -> FirestoreResult<&mut Self>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_capacity()?;
        self.ensure_same_database(reference)?;
        let encoded = operations::encode_update_data(&to_map(data)?)?;
        self.writes
            .push(WriteOperation::update(reference.key().clone(), encoded));
        Ok(self)
    }

    pub fn delete(&mut self, reference: &DocumentReference) -> FirestoreResult<&mut Self> {
        self.ensure_capacity()?;
        self.ensure_same_database(reference)?;
        self.writes
            .push(WriteOperation::delete(reference.key().clone()));
        Ok(self)
    }

    pub fn writes(&self) -> &[WriteOperation] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Renders the body of a `documents:commit` request for the queued writes.
    pub fn commit_body(&self) -> FirestoreResult<JsonValue> {
        JsonProtoSerializer::new(self.database_id.clone()).encode_commit_body(&self.writes)
    }

    fn ensure_same_database(&self, reference: &DocumentReference) -> FirestoreResult<()> {
        if &self.database_id != reference.database_id() {
            return Err(invalid_argument(format!(
                "{reference} belongs to {}, but this batch writes to {}",
                reference.database_id(),
                self.database_id
            )));
        }
        Ok(())
    }

    fn ensure_capacity(&self) -> FirestoreResult<()> {
        if self.writes.len() >= MAX_BATCH_WRITES {
            return Err(invalid_argument(format!(
                "A write batch cannot contain more than {MAX_BATCH_WRITES} operations"
            )));
        }
        Ok(())
    }
}
