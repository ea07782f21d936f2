use crate::firestore::value::FirestoreValue;

/// Ordered list of values. Arrays may not directly contain other arrays on
/// the backend; that restriction is enforced server-side.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrayValue {
    values: Vec<FirestoreValue>,
}

impl ArrayValue {
    pub fn new(values: Vec<FirestoreValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[FirestoreValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<FirestoreValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<FirestoreValue> for ArrayValue {
    fn from_iter<I: IntoIterator<Item = FirestoreValue>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_values() {
        let array: ArrayValue = [1, 2].into_iter().map(FirestoreValue::from).collect();
        assert_eq!(array.len(), 2);
        assert_eq!(array.values()[1].as_i64(), Some(2));
        assert!(ArrayValue::default().is_empty());
    }
}
