use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};

use crate::firestore::error::{type_mismatch, FirestoreError, FirestoreResult};
use crate::firestore::value::markers;
use crate::firestore::value::{FirestoreValue, MapValue, ValueKind};

/// Converts a [`FirestoreValue`] into any deserializable type.
///
/// Null and absent fields decode as `None` for `Option` targets; integers
/// widen into floating-point targets. A failure reports the field trail of
/// the value that did not fit, e.g. `address.zip`.
pub fn from_value<T>(value: &FirestoreValue) -> FirestoreResult<T>
where
    T: DeserializeOwned,
{
    T::deserialize(ValueDeserializer::new(value.clone()))
}

/// Decodes document fields into `T`.
pub fn from_map<T>(map: &MapValue) -> FirestoreResult<T>
where
    T: DeserializeOwned,
{
    T::deserialize(ValueDeserializer::new(FirestoreValue::from(map.clone())))
}

/// The serde [`de::Deserializer`] behind [`from_value`].
#[derive(Debug)]
pub struct ValueDeserializer {
    value: FirestoreValue,
}

impl ValueDeserializer {
    pub fn new(value: FirestoreValue) -> Self {
        Self { value }
    }

    fn mismatch(&self, expected: &str) -> FirestoreError {
        type_mismatch(expected, self.value.kind().type_name())
    }
}

fn pair(first: FirestoreValue, second: FirestoreValue) -> ValueDeserializer {
    ValueDeserializer::new(FirestoreValue::from_array(vec![first, second]))
}

fn marker_entry(marker: &str, payload: FirestoreValue) -> MapDeserializer {
    MapDeserializer::new(BTreeMap::from([(marker.to_string(), payload)]))
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = FirestoreError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        match self.value.into_kind() {
            ValueKind::Null => visitor.visit_unit(),
            ValueKind::Boolean(value) => visitor.visit_bool(value),
            ValueKind::Integer(value) => visitor.visit_i64(value),
            ValueKind::Double(value) => visitor.visit_f64(value),
            ValueKind::String(value) => visitor.visit_string(value),
            ValueKind::Bytes(value) => visitor.visit_byte_buf(value.into_vec()),
            ValueKind::Array(array) => visitor.visit_seq(SeqDeserializer::new(array.into_values())),
            // A map whose first key collides with a marker is wrapped so it
            // cannot be mistaken for a leaf.
            ValueKind::Map(map) if starts_with_reserved_key(&map) => {
                visitor.visit_map(marker_entry(markers::LITERAL_MAP, FirestoreValue::from(map)))
            }
            ValueKind::Map(map) => visitor.visit_map(MapDeserializer::new(map.into_fields())),
            ValueKind::Timestamp(ts) => visitor.visit_map(marker_entry(
                markers::TIMESTAMP,
                FirestoreValue::from_array(vec![
                    FirestoreValue::from_integer(ts.seconds),
                    FirestoreValue::from_integer(ts.nanos.into()),
                ]),
            )),
            ValueKind::GeoPoint(point) => visitor.visit_map(marker_entry(
                markers::GEO_POINT,
                FirestoreValue::from_array(vec![
                    FirestoreValue::from_double(point.latitude()),
                    FirestoreValue::from_double(point.longitude()),
                ]),
            )),
            ValueKind::Reference(name) => visitor.visit_map(marker_entry(
                markers::REFERENCE,
                FirestoreValue::from_string(name),
            )),
            ValueKind::Sentinel(field_value) => visitor.visit_map(marker_entry(
                markers::FIELD_VALUE,
                FirestoreValue::from_array(vec![
                    FirestoreValue::from_string(field_value.tag()),
                    FirestoreValue::from_array(field_value.operands()),
                ]),
            )),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        match self.value.kind() {
            ValueKind::Boolean(value) => visitor.visit_bool(*value),
            _ => Err(self.mismatch("a boolean")),
        }
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_i64(visitor)
    }

    // The primitive visitors range-check narrower targets themselves.
    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        match self.value.kind() {
            ValueKind::Integer(value) => visitor.visit_i64(*value),
            _ => Err(self.mismatch("an integer")),
        }
    }

    fn deserialize_i128<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_u128<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_i64(visitor)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_f64(visitor)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        match self.value.kind() {
            ValueKind::Double(value) => visitor.visit_f64(*value),
            ValueKind::Integer(value) => visitor.visit_f64(*value as f64),
            _ => Err(self.mismatch("a number")),
        }
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        match self.value.into_kind() {
            ValueKind::String(value) => visitor.visit_string(value),
            other => Err(type_mismatch("a string", other.type_name())),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        match self.value.into_kind() {
            ValueKind::Bytes(bytes) => visitor.visit_byte_buf(bytes.into_vec()),
            ValueKind::Array(array) => visitor.visit_seq(SeqDeserializer::new(array.into_values())),
            other => Err(type_mismatch("bytes", other.type_name())),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        if self.value.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        match self.value.kind() {
            ValueKind::Null => visitor.visit_unit(),
            _ => Err(self.mismatch("null")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> FirestoreResult<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> FirestoreResult<V::Value> {
        if !markers::is_marker(name) {
            return visitor.visit_newtype_struct(self);
        }
        match (name, self.value.into_kind()) {
            (markers::TIMESTAMP, ValueKind::Timestamp(ts)) => visitor.visit_newtype_struct(pair(
                FirestoreValue::from_integer(ts.seconds),
                FirestoreValue::from_integer(ts.nanos.into()),
            )),
            (markers::GEO_POINT, ValueKind::GeoPoint(point)) => {
                visitor.visit_newtype_struct(pair(
                    FirestoreValue::from_double(point.latitude()),
                    FirestoreValue::from_double(point.longitude()),
                ))
            }
            (markers::BYTES, kind @ ValueKind::Bytes(_)) => {
                visitor.visit_newtype_struct(ValueDeserializer::new(FirestoreValue::from_kind(kind)))
            }
            (markers::REFERENCE, ValueKind::Reference(name) | ValueKind::String(name)) => visitor.visit_newtype_struct(
                ValueDeserializer::new(FirestoreValue::from_string(name)),
            ),
            (markers::FIELD_VALUE, ValueKind::Sentinel(field_value)) => {
                visitor.visit_newtype_struct(pair(
                    FirestoreValue::from_string(field_value.tag()),
                    FirestoreValue::from_array(field_value.operands()),
                ))
            }
            (marker, other) => Err(type_mismatch(marker_description(marker), other.type_name())),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        match self.value.into_kind() {
            ValueKind::Array(array) => visitor.visit_seq(SeqDeserializer::new(array.into_values())),
            other => Err(type_mismatch("an array", other.type_name())),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> FirestoreResult<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> FirestoreResult<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        match self.value.into_kind() {
            ValueKind::Map(map) => visitor.visit_map(MapDeserializer::new(map.into_fields())),
            other => Err(type_mismatch("a map", other.type_name())),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> FirestoreResult<V::Value> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> FirestoreResult<V::Value> {
        match self.value.into_kind() {
            ValueKind::String(variant) => visitor.visit_enum(EnumDeserializer {
                variant,
                payload: None,
            }),
            ValueKind::Map(map) if map.len() == 1 => {
                let mut fields = map.into_fields().into_iter();
                match fields.next() {
                    Some((variant, payload)) => visitor.visit_enum(EnumDeserializer {
                        variant,
                        payload: Some(payload),
                    }),
                    None => Err(type_mismatch("an enum variant", "empty map")),
                }
            }
            other => Err(type_mismatch(
                "a variant name or single-entry map",
                other.type_name(),
            )),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> FirestoreResult<V::Value> {
        visitor.visit_unit()
    }
}

fn starts_with_reserved_key(map: &MapValue) -> bool {
    map.fields()
        .keys()
        .next()
        .is_some_and(|key| markers::is_reserved_key(key))
}

fn marker_description(marker: &str) -> &'static str {
    match marker {
        markers::TIMESTAMP => "a timestamp",
        markers::GEO_POINT => "a geo point",
        markers::BYTES => "bytes",
        markers::REFERENCE => "a document reference",
        _ => "a field transform",
    }
}

struct SeqDeserializer {
    iter: std::iter::Enumerate<std::vec::IntoIter<FirestoreValue>>,
}

impl SeqDeserializer {
    fn new(values: Vec<FirestoreValue>) -> Self {
        Self {
            iter: values.into_iter().enumerate(),
        }
    }
}

impl<'de> SeqAccess<'de> for SeqDeserializer {
    type Error = FirestoreError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> FirestoreResult<Option<T::Value>> {
        match self.iter.next() {
            Some((index, value)) => seed
                .deserialize(ValueDeserializer::new(value))
                .map(Some)
                .map_err(|err| err.within(index.to_string())),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapDeserializer {
    iter: btree_map::IntoIter<String, FirestoreValue>,
    pending: Option<(String, FirestoreValue)>,
}

impl MapDeserializer {
    fn new(fields: BTreeMap<String, FirestoreValue>) -> Self {
        Self {
            iter: fields.into_iter(),
            pending: None,
        }
    }
}

impl<'de> MapAccess<'de> for MapDeserializer {
    type Error = FirestoreError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> FirestoreResult<Option<K::Value>> {
        match self.iter.next() {
            Some((key, value)) => {
                let decoded = seed.deserialize(IntoDeserializer::<FirestoreError>::into_deserializer(
                    key.clone(),
                ))?;
                self.pending = Some((key, value));
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> FirestoreResult<V::Value> {
        let (key, value) = self
            .pending
            .take()
            .ok_or_else(|| de::Error::custom("map value requested before its key"))?;
        seed.deserialize(ValueDeserializer::new(value))
            .map_err(|err| err.within(key))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer {
    variant: String,
    payload: Option<FirestoreValue>,
}

impl<'de> EnumAccess<'de> for EnumDeserializer {
    type Error = FirestoreError;
    type Variant = VariantDeserializer;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> FirestoreResult<(V::Value, VariantDeserializer)> {
        let variant = seed.deserialize(IntoDeserializer::<FirestoreError>::into_deserializer(
            self.variant.clone(),
        ))?;
        Ok((
            variant,
            VariantDeserializer {
                name: self.variant,
                payload: self.payload,
            },
        ))
    }
}

struct VariantDeserializer {
    name: String,
    payload: Option<FirestoreValue>,
}

impl VariantDeserializer {
    fn payload(self, expected: &str) -> FirestoreResult<(String, FirestoreValue)> {
        match self.payload {
            Some(payload) => Ok((self.name, payload)),
            None => Err(type_mismatch(expected, "unit variant")),
        }
    }
}

impl<'de> VariantAccess<'de> for VariantDeserializer {
    type Error = FirestoreError;

    fn unit_variant(self) -> FirestoreResult<()> {
        match self.payload {
            None => Ok(()),
            Some(payload) if payload.is_null() => Ok(()),
            Some(payload) => Err(type_mismatch("a unit variant", payload.kind().type_name())),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> FirestoreResult<T::Value> {
        let (name, payload) = self.payload("a newtype variant")?;
        seed.deserialize(ValueDeserializer::new(payload))
            .map_err(|err| err.within(name))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> FirestoreResult<V::Value> {
        let (name, payload) = self.payload("a tuple variant")?;
        de::Deserializer::deserialize_seq(ValueDeserializer::new(payload), visitor)
            .map_err(|err| err.within(name))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> FirestoreResult<V::Value> {
        let (name, payload) = self.payload("a struct variant")?;
        de::Deserializer::deserialize_map(ValueDeserializer::new(payload), visitor)
            .map_err(|err| err.within(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::error::FirestoreErrorCode;
    use crate::firestore::model::{GeoPoint, Timestamp};
    use crate::firestore::value::{to_value, BytesValue, FieldValue};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Address {
        city: String,
        zip: Option<u32>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: u8,
        weight: f64,
        nickname: Option<String>,
        address: Address,
        visits: Vec<Timestamp>,
        home: GeoPoint,
        avatar: BytesValue,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Status {
        Active,
        Suspended { days: u32 },
    }

    fn sample() -> Person {
        Person {
            name: "Grace".into(),
            age: 85,
            weight: 60.0,
            nickname: None,
            address: Address {
                city: "Arlington".into(),
                zip: Some(22201),
            },
            visits: vec![Timestamp::new(10, 5)],
            home: GeoPoint::new(38.8, -77.1).unwrap(),
            avatar: BytesValue::new(vec![9, 8, 7]),
        }
    }

    #[test]
    fn decodes_what_was_encoded() {
        let value = to_value(&sample()).unwrap();
        let decoded: Person = from_value(&value).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn absent_optional_field_is_none() {
        let value = FirestoreValue::from_map(BTreeMap::from([(
            "city".to_string(),
            FirestoreValue::from_string("Oslo"),
        )]));
        let address: Address = from_value(&value).unwrap();
        assert_eq!(address.zip, None);
    }

    #[test]
    fn integer_widens_into_float() {
        let value = FirestoreValue::from_integer(3);
        let decoded: f64 = from_value(&value).unwrap();
        assert_eq!(decoded, 3.0);
    }

    #[test]
    fn mismatch_reports_field_trail() {
        let value = to_value(&sample()).unwrap();
        let mut map = value.as_map().cloned().unwrap();
        let mut address = map.get("address").and_then(|v| v.as_map()).cloned().unwrap();
        address.insert("zip", FirestoreValue::from_string("22201"));
        map.insert("address", address.into());
        let value: FirestoreValue = map.into();
        let err = from_value::<Person>(&value).unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::TypeMismatch);
        assert_eq!(err.path_string(), "address.zip");
    }

    #[test]
    fn out_of_range_integer_is_rejected() {
        let err = from_value::<u8>(&FirestoreValue::from_integer(300)).unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::TypeMismatch);
        assert!(from_value::<u32>(&FirestoreValue::from_integer(-1)).is_err());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let value = FirestoreValue::from_map(BTreeMap::new());
        let err = from_value::<Address>(&value).unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::MissingField);
        assert_eq!(err.path_string(), "city");
    }

    #[test]
    fn decodes_enum_variants() {
        let active: Status = from_value(&FirestoreValue::from_string("Active")).unwrap();
        assert_eq!(active, Status::Active);
        let suspended = to_value(&Status::Suspended { days: 3 }).unwrap();
        assert_eq!(
            from_value::<Status>(&suspended).unwrap(),
            Status::Suspended { days: 3 }
        );
    }

    #[test]
    fn raw_values_survive_any_decoding() {
        let raw = FirestoreValue::from_array(vec![
            Timestamp::new(1, 2).into(),
            GeoPoint::new(0.5, 0.5).unwrap().into(),
            FirestoreValue::from_reference("projects/p/databases/(default)/documents/a/b"),
            FieldValue::array_union([1]).into(),
            BytesValue::new(vec![1]).into(),
        ]);
        let decoded: FirestoreValue = from_value(&raw).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn maps_with_marker_named_keys_stay_maps() {
        for key in [markers::REFERENCE, markers::TIMESTAMP, markers::LITERAL_MAP] {
            let raw = FirestoreValue::from_map(BTreeMap::from([
                (key.to_string(), FirestoreValue::from_string("x")),
                ("other".to_string(), FirestoreValue::from_integer(1)),
            ]));
            let decoded: FirestoreValue = from_value(&raw).unwrap();
            assert_eq!(decoded, raw, "key {key}");
        }
    }

    #[test]
    fn wide_integers_decode_within_range() {
        assert_eq!(from_value::<i128>(&FirestoreValue::from_integer(-5)).unwrap(), -5);
        assert_eq!(from_value::<u128>(&FirestoreValue::from_integer(7)).unwrap(), 7);
        assert!(from_value::<u128>(&FirestoreValue::from_integer(-1)).is_err());
        let err = from_value::<i128>(&FirestoreValue::from_string("5")).unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::TypeMismatch);
    }

    #[test]
    fn native_leaf_requires_matching_kind() {
        let err = from_value::<Timestamp>(&FirestoreValue::from_string("yesterday")).unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::TypeMismatch);
    }
}
