mod database;
pub(crate) mod operations;
pub(crate) mod query;
mod reference;
mod snapshot;
mod write_batch;

pub use database::Firestore;
pub use operations::{
    encode_set_data, encode_update_data, extract_transforms, EncodedSetData, EncodedUpdateData,
    FieldTransform, SetOptions, TransformOperation,
};
pub use query::{FilterOperator, OrderDirection, Query, QueryPredicate};
pub use reference::{CollectionReference, DocumentReference};
pub use snapshot::{DocumentSnapshot, QuerySnapshot};
pub use write_batch::WriteBatch;
