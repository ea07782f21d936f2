mod mutation;
pub mod serializer;
pub mod structured_query;

pub use mutation::WriteOperation;
pub use serializer::JsonProtoSerializer;
pub use structured_query::{
    compile, encode_structured_query, CollectionSelector, CompositeOperator, Filter, Order,
    StructuredQuery, UnaryOperator,
};
