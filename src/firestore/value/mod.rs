mod array_value;
mod bytes_value;
pub mod datetime;
mod decoder;
mod encoder;
mod field_value;
mod map_value;
pub(crate) mod markers;
mod value;

pub use array_value::ArrayValue;
pub use bytes_value::BytesValue;
pub use decoder::{from_map, from_value, ValueDeserializer};
pub use encoder::{to_map, to_value, ValueSerializer};
pub use field_value::FieldValue;
pub use map_value::MapValue;
pub use value::{FirestoreValue, ValueKind};
