use crate::firestore::value::FirestoreValue;

/// Marker values that ask the backend to mutate a field instead of storing a
/// literal.
///
/// A `FieldValue` can sit anywhere in a record that is being written (a
/// struct field of type `FieldValue`, or a raw [`FirestoreValue`]); the write
/// path pulls it out as a field transform keyed by its dotted path.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Removes the field. Valid in updates and merge sets only.
    Delete,
    /// Sets the field to the commit time.
    ServerTimestamp,
    /// Adds the operand to the current numeric value.
    Increment(Box<FirestoreValue>),
    /// Appends every element not already present.
    ArrayUnion(Vec<FirestoreValue>),
    /// Removes every instance of each element.
    ArrayRemove(Vec<FirestoreValue>),
}

impl FieldValue {
    pub fn delete() -> Self {
        FieldValue::Delete
    }

    pub fn server_timestamp() -> Self {
        FieldValue::ServerTimestamp
    }

    pub fn increment(operand: impl Into<FirestoreValue>) -> Self {
        FieldValue::Increment(Box::new(operand.into()))
    }

    pub fn array_union<I, V>(elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FirestoreValue>,
    {
        FieldValue::ArrayUnion(elements.into_iter().map(Into::into).collect())
    }

    pub fn array_remove<I, V>(elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FirestoreValue>,
    {
        FieldValue::ArrayRemove(elements.into_iter().map(Into::into).collect())
    }

    /// Stable tag used when a sentinel travels through serde.
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            FieldValue::Delete => "delete",
            FieldValue::ServerTimestamp => "serverTimestamp",
            FieldValue::Increment(_) => "increment",
            FieldValue::ArrayUnion(_) => "arrayUnion",
            FieldValue::ArrayRemove(_) => "arrayRemove",
        }
    }

    pub(crate) fn operands(&self) -> Vec<FirestoreValue> {
        match self {
            FieldValue::Delete | FieldValue::ServerTimestamp => Vec::new(),
            FieldValue::Increment(operand) => vec![operand.as_ref().clone()],
            FieldValue::ArrayUnion(elements) | FieldValue::ArrayRemove(elements) => elements.clone(),
        }
    }

    pub(crate) fn from_parts(tag: &str, mut operands: Vec<FirestoreValue>) -> Option<Self> {
        match tag {
            "delete" => Some(FieldValue::Delete),
            "serverTimestamp" => Some(FieldValue::ServerTimestamp),
            "increment" if operands.len() == 1 => operands.pop().map(FieldValue::increment),
            "arrayUnion" => Some(FieldValue::ArrayUnion(operands)),
            "arrayRemove" => Some(FieldValue::ArrayRemove(operands)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_roundtrip() {
        for sentinel in [
            FieldValue::delete(),
            FieldValue::server_timestamp(),
            FieldValue::increment(3),
            FieldValue::array_union(["a", "b"]),
            FieldValue::array_remove([1.5]),
        ] {
            let rebuilt = FieldValue::from_parts(sentinel.tag(), sentinel.operands());
            assert_eq!(rebuilt, Some(sentinel));
        }
        assert_eq!(FieldValue::from_parts("increment", Vec::new()), None);
    }
}
