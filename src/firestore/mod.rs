pub mod api;
mod constants;
pub mod error;
pub mod model;
pub mod remote;
pub mod value;

pub use api::{
    CollectionReference, DocumentReference, DocumentSnapshot, FilterOperator, Firestore,
    OrderDirection, Query, QuerySnapshot, SetOptions, WriteBatch,
};
pub use error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
pub use model::{DatabaseId, FieldPath, GeoPoint, Timestamp};
pub use value::{from_value, to_value, BytesValue, FieldValue, FirestoreValue, MapValue};
