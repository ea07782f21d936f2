use crate::firestore::api::{EncodedSetData, EncodedUpdateData, FieldTransform};
use crate::firestore::model::{DocumentKey, FieldPath};
use crate::firestore::value::MapValue;

/// A single write queued in a batch, ready to be rendered for `commit`.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOperation {
    /// Overwrites the document, or merges into it when `mask` is present.
    Set {
        key: DocumentKey,
        data: MapValue,
        mask: Option<Vec<FieldPath>>,
        transforms: Vec<FieldTransform>,
    },
    /// Patches the listed fields of an existing document.
    Update {
        key: DocumentKey,
        data: MapValue,
        field_paths: Vec<FieldPath>,
        transforms: Vec<FieldTransform>,
    },
    Delete {
        key: DocumentKey,
    },
}

impl WriteOperation {
    pub fn set(key: DocumentKey, encoded: EncodedSetData) -> Self {
        WriteOperation::Set {
            key,
            data: encoded.map,
            mask: encoded.mask,
            transforms: encoded.transforms,
        }
    }

    pub fn update(key: DocumentKey, encoded: EncodedUpdateData) -> Self {
        WriteOperation::Update {
            key,
            data: encoded.map,
            field_paths: encoded.field_paths,
            transforms: encoded.transforms,
        }
    }

    pub fn delete(key: DocumentKey) -> Self {
        WriteOperation::Delete { key }
    }

    /// The document this write targets.
    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOperation::Set { key, .. }
            | WriteOperation::Update { key, .. }
            | WriteOperation::Delete { key } => key,
        }
    }

    pub fn transforms(&self) -> &[FieldTransform] {
        match self {
            WriteOperation::Set { transforms, .. } | WriteOperation::Update { transforms, .. } => {
                transforms
            }
            WriteOperation::Delete { .. } => &[],
        }
    }
}
