use std::collections::BTreeMap;

use serde::ser::{self, Impossible, Serialize};

use crate::firestore::error::{
    invalid_argument, unsupported_value, FirestoreError, FirestoreResult,
};
use crate::firestore::model::{GeoPoint, Timestamp};
use crate::firestore::value::markers;
use crate::firestore::value::{FieldValue, FirestoreValue, MapValue, ValueKind};

/// Converts any serializable value into a [`FirestoreValue`].
///
/// Struct fields become map entries, sequences become arrays and `None`
/// becomes null. [`Timestamp`], [`GeoPoint`], byte blobs, document references
/// and [`FieldValue`] sentinels keep their Firestore-native kind. Errors carry
/// the field trail of the offending value.
///
/// ```
/// use firestore_admin_core::firestore::value::{to_value, ValueKind};
///
/// let value = to_value(&vec![1, 2, 3]).unwrap();
/// assert!(matches!(value.kind(), ValueKind::Array(array) if array.len() == 3));
/// ```
pub fn to_value<T>(value: &T) -> FirestoreResult<FirestoreValue>
where
    T: ?Sized + Serialize,
{
    value.serialize(ValueSerializer)
}

/// Like [`to_value`] but requires the result to be a map, as document data
/// must be.
pub fn to_map<T>(value: &T) -> FirestoreResult<MapValue>
where
    T: ?Sized + Serialize,
{
    match to_value(value)?.into_kind() {
        ValueKind::Map(map) => Ok(map),
        other => Err(invalid_argument(format!(
            "Document data must encode to a map, got {}",
            other.type_name()
        ))),
    }
}

/// The serde [`ser::Serializer`] behind [`to_value`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = FirestoreValue;
    type Error = FirestoreError;

    type SerializeSeq = SerializeArray;
    type SerializeTuple = SerializeArray;
    type SerializeTupleStruct = SerializeArray;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_bool(v))
    }

    fn serialize_i8(self, v: i8) -> FirestoreResult<FirestoreValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_i16(self, v: i16) -> FirestoreResult<FirestoreValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_i32(self, v: i32) -> FirestoreResult<FirestoreValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_i64(self, v: i64) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_integer(v))
    }

    fn serialize_i128(self, v: i128) -> FirestoreResult<FirestoreValue> {
        i64::try_from(v)
            .map(FirestoreValue::from_integer)
            .map_err(|_| integer_out_of_range(v))
    }

    fn serialize_u8(self, v: u8) -> FirestoreResult<FirestoreValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_u16(self, v: u16) -> FirestoreResult<FirestoreValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_u32(self, v: u32) -> FirestoreResult<FirestoreValue> {
        self.serialize_i64(v.into())
    }

    fn serialize_u64(self, v: u64) -> FirestoreResult<FirestoreValue> {
        i64::try_from(v)
            .map(FirestoreValue::from_integer)
            .map_err(|_| integer_out_of_range(v))
    }

    fn serialize_u128(self, v: u128) -> FirestoreResult<FirestoreValue> {
        i64::try_from(v)
            .map(FirestoreValue::from_integer)
            .map_err(|_| integer_out_of_range(v))
    }

    fn serialize_f32(self, v: f32) -> FirestoreResult<FirestoreValue> {
        self.serialize_f64(v.into())
    }

    fn serialize_f64(self, v: f64) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_double(v))
    }

    fn serialize_char(self, v: char) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_string(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_string(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_bytes(v.into()))
    }

    fn serialize_none(self) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::null())
    }

    fn serialize_some<T>(self, value: &T) -> FirestoreResult<FirestoreValue>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::null())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::null())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_string(variant))
    }

    fn serialize_newtype_struct<T>(
        self,
        name: &'static str,
        value: &T,
    ) -> FirestoreResult<FirestoreValue>
    where
        T: ?Sized + Serialize,
    {
        let inner = value.serialize(self)?;
        if markers::is_marker(name) {
            native_leaf(name, inner)
        } else {
            Ok(inner)
        }
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> FirestoreResult<FirestoreValue>
    where
        T: ?Sized + Serialize,
    {
        let payload = value.serialize(self).map_err(|err| err.within(variant))?;
        Ok(single_entry(variant, payload))
    }

    fn serialize_seq(self, len: Option<usize>) -> FirestoreResult<SerializeArray> {
        Ok(SerializeArray {
            values: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> FirestoreResult<SerializeArray> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> FirestoreResult<SerializeArray> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> FirestoreResult<SerializeTupleVariant> {
        Ok(SerializeTupleVariant {
            variant,
            values: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> FirestoreResult<SerializeMap> {
        Ok(SerializeMap {
            fields: BTreeMap::new(),
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> FirestoreResult<SerializeMap> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> FirestoreResult<SerializeStructVariant> {
        Ok(SerializeStructVariant {
            variant,
            fields: BTreeMap::new(),
        })
    }
}

fn integer_out_of_range(value: impl std::fmt::Display) -> FirestoreError {
    unsupported_value(format!(
        "Integer {value} does not fit in a 64-bit signed integer"
    ))
}

fn single_entry(key: &str, value: FirestoreValue) -> FirestoreValue {
    FirestoreValue::from_map(BTreeMap::from([(key.to_string(), value)]))
}

/// Rebuilds a native leaf from the payload its marker newtype wrapped.
fn native_leaf(marker: &str, inner: FirestoreValue) -> FirestoreResult<FirestoreValue> {
    let malformed = || unsupported_value(format!("Malformed payload for {marker}"));
    match (marker, inner.into_kind()) {
        (markers::TIMESTAMP, ValueKind::Array(parts)) => match parts.values() {
            [seconds, nanos] => {
                let seconds = seconds.as_i64().ok_or_else(malformed)?;
                let nanos = nanos
                    .as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .ok_or_else(malformed)?;
                Ok(FirestoreValue::from_timestamp(Timestamp::new(seconds, nanos)))
            }
            _ => Err(malformed()),
        },
        (markers::GEO_POINT, ValueKind::Array(parts)) => match parts.values() {
            [latitude, longitude] => {
                let latitude = latitude.as_f64().ok_or_else(malformed)?;
                let longitude = longitude.as_f64().ok_or_else(malformed)?;
                Ok(FirestoreValue::from_geo_point(GeoPoint::new(latitude, longitude)?))
            }
            _ => Err(malformed()),
        },
        (markers::BYTES, kind @ ValueKind::Bytes(_)) => Ok(FirestoreValue::from_kind(kind)),
        (markers::REFERENCE, ValueKind::String(name)) => Ok(FirestoreValue::from_reference(name)),
        (markers::FIELD_VALUE, ValueKind::Array(parts)) => {
            let mut parts = parts.into_values().into_iter();
            let (Some(tag), Some(operands), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(malformed());
            };
            let tag = tag.as_str().map(str::to_string).ok_or_else(malformed)?;
            let operands = match operands.into_kind() {
                ValueKind::Array(array) => array.into_values(),
                _ => return Err(malformed()),
            };
            FieldValue::from_parts(&tag, operands)
                .map(FirestoreValue::from_field_value)
                .ok_or_else(malformed)
        }
        _ => Err(malformed()),
    }
}

pub struct SerializeArray {
    values: Vec<FirestoreValue>,
}

impl SerializeArray {
    fn push<T>(&mut self, value: &T) -> FirestoreResult<()>
    where
        T: ?Sized + Serialize,
    {
        let index = self.values.len();
        let value = value
            .serialize(ValueSerializer)
            .map_err(|err| err.within(index.to_string()))?;
        self.values.push(value);
        Ok(())
    }
}

impl ser::SerializeSeq for SerializeArray {
    type Ok = FirestoreValue;
    type Error = FirestoreError;

    fn serialize_element<T>(&mut self, value: &T) -> FirestoreResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_array(self.values))
    }
}

impl ser::SerializeTuple for SerializeArray {
    type Ok = FirestoreValue;
    type Error = FirestoreError;

    fn serialize_element<T>(&mut self, value: &T) -> FirestoreResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_array(self.values))
    }
}

impl ser::SerializeTupleStruct for SerializeArray {
    type Ok = FirestoreValue;
    type Error = FirestoreError;

    fn serialize_field<T>(&mut self, value: &T) -> FirestoreResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_array(self.values))
    }
}

pub struct SerializeTupleVariant {
    variant: &'static str,
    values: Vec<FirestoreValue>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = FirestoreValue;
    type Error = FirestoreError;

    fn serialize_field<T>(&mut self, value: &T) -> FirestoreResult<()>
    where
        T: ?Sized + Serialize,
    {
        let index = self.values.len();
        let value = value
            .serialize(ValueSerializer)
            .map_err(|err| err.within(index.to_string()).within(self.variant))?;
        self.values.push(value);
        Ok(())
    }

    fn end(self) -> FirestoreResult<FirestoreValue> {
        Ok(single_entry(
            self.variant,
            FirestoreValue::from_array(self.values),
        ))
    }
}

pub struct SerializeMap {
    fields: BTreeMap<String, FirestoreValue>,
    pending_key: Option<String>,
}

impl SerializeMap {
    fn insert<T>(&mut self, key: String, value: &T) -> FirestoreResult<()>
    where
        T: ?Sized + Serialize,
    {
        let value = value
            .serialize(ValueSerializer)
            .map_err(|err| err.within(key.clone()))?;
        self.fields.insert(key, value);
        Ok(())
    }
}

impl ser::SerializeMap for SerializeMap {
    type Ok = FirestoreValue;
    type Error = FirestoreError;

    fn serialize_key<T>(&mut self, key: &T) -> FirestoreResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.pending_key = Some(key.serialize(MapKeySerializer)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> FirestoreResult<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| invalid_argument("Map value serialized before its key"))?;
        self.insert(key, value)
    }

    fn end(self) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_map(self.fields))
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = FirestoreValue;
    type Error = FirestoreError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> FirestoreResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> FirestoreResult<FirestoreValue> {
        Ok(FirestoreValue::from_map(self.fields))
    }
}

pub struct SerializeStructVariant {
    variant: &'static str,
    fields: BTreeMap<String, FirestoreValue>,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = FirestoreValue;
    type Error = FirestoreError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> FirestoreResult<()>
    where
        T: ?Sized + Serialize,
    {
        let value = value
            .serialize(ValueSerializer)
            .map_err(|err| err.within(key).within(self.variant))?;
        self.fields.insert(key.to_string(), value);
        Ok(())
    }

    fn end(self) -> FirestoreResult<FirestoreValue> {
        Ok(single_entry(
            self.variant,
            FirestoreValue::from_map(self.fields),
        ))
    }
}

/// Map keys must be strings; chars and integers are stringified.
struct MapKeySerializer;

fn key_must_be_string() -> FirestoreError {
    unsupported_value("Map keys must be strings")
}

macro_rules! stringify_key {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, v: $ty) -> FirestoreResult<String> {
                Ok(v.to_string())
            }
        )*
    };
}

macro_rules! reject_key {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> FirestoreResult<String> {
                Err(key_must_be_string())
            }
        )*
    };
}

impl ser::Serializer for MapKeySerializer {
    type Ok = String;
    type Error = FirestoreError;

    type SerializeSeq = Impossible<String, FirestoreError>;
    type SerializeTuple = Impossible<String, FirestoreError>;
    type SerializeTupleStruct = Impossible<String, FirestoreError>;
    type SerializeTupleVariant = Impossible<String, FirestoreError>;
    type SerializeMap = Impossible<String, FirestoreError>;
    type SerializeStruct = Impossible<String, FirestoreError>;
    type SerializeStructVariant = Impossible<String, FirestoreError>;

    stringify_key! {
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_char: char,
    }

    reject_key! {
        serialize_bool: bool,
        serialize_f32: f32,
        serialize_f64: f64,
        serialize_bytes: &[u8],
    }

    fn serialize_str(self, v: &str) -> FirestoreResult<String> {
        Ok(v.to_string())
    }

    fn serialize_none(self) -> FirestoreResult<String> {
        Err(key_must_be_string())
    }

    fn serialize_some<T>(self, _value: &T) -> FirestoreResult<String>
    where
        T: ?Sized + Serialize,
    {
        Err(key_must_be_string())
    }

    fn serialize_unit(self) -> FirestoreResult<String> {
        Err(key_must_be_string())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> FirestoreResult<String> {
        Err(key_must_be_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> FirestoreResult<String> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> FirestoreResult<String>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> FirestoreResult<String>
    where
        T: ?Sized + Serialize,
    {
        Err(key_must_be_string())
    }

    fn serialize_seq(self, _len: Option<usize>) -> FirestoreResult<Self::SerializeSeq> {
        Err(key_must_be_string())
    }

    fn serialize_tuple(self, _len: usize) -> FirestoreResult<Self::SerializeTuple> {
        Err(key_must_be_string())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> FirestoreResult<Self::SerializeTupleStruct> {
        Err(key_must_be_string())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> FirestoreResult<Self::SerializeTupleVariant> {
        Err(key_must_be_string())
    }

    fn serialize_map(self, _len: Option<usize>) -> FirestoreResult<Self::SerializeMap> {
        Err(key_must_be_string())
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> FirestoreResult<Self::SerializeStruct> {
        Err(key_must_be_string())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> FirestoreResult<Self::SerializeStructVariant> {
        Err(key_must_be_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::error::FirestoreErrorCode;
    use crate::firestore::value::BytesValue;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Address {
        city: String,
        zip: Option<u32>,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Profile {
        display_name: String,
        age: u8,
        score: f64,
        address: Address,
        tags: Vec<String>,
        joined: Timestamp,
        avatar: BytesValue,
        updated: FieldValue,
    }

    #[derive(Serialize)]
    enum Shape {
        Empty,
        Circle(f64),
        Rect { w: i32, h: i32 },
    }

    #[test]
    fn encodes_records_with_native_leaves() {
        let profile = Profile {
            display_name: "Ada".into(),
            age: 36,
            score: 9.5,
            address: Address {
                city: "London".into(),
                zip: None,
            },
            tags: vec!["math".into()],
            joined: Timestamp::new(1_700_000_000, 12),
            avatar: BytesValue::new(vec![1, 2]),
            updated: FieldValue::server_timestamp(),
        };

        let map = to_map(&profile).unwrap();
        assert_eq!(map.get("displayName").and_then(|v| v.as_str()), Some("Ada"));
        assert_eq!(map.get("age").and_then(FirestoreValue::as_i64), Some(36));
        let address = map.get("address").and_then(FirestoreValue::as_map).unwrap();
        assert!(address.get("zip").unwrap().is_null());
        assert!(matches!(
            map.get("joined").unwrap().kind(),
            ValueKind::Timestamp(ts) if ts.seconds == 1_700_000_000 && ts.nanos == 12
        ));
        assert!(matches!(map.get("avatar").unwrap().kind(), ValueKind::Bytes(_)));
        assert!(matches!(
            map.get("updated").unwrap().kind(),
            ValueKind::Sentinel(FieldValue::ServerTimestamp)
        ));
    }

    #[test]
    fn encodes_enums() {
        assert_eq!(to_value(&Shape::Empty).unwrap(), FirestoreValue::from_string("Empty"));
        let circle = to_value(&Shape::Circle(2.0)).unwrap();
        let circle = circle.as_map().unwrap();
        assert_eq!(circle.get("Circle").and_then(FirestoreValue::as_f64), Some(2.0));
        let rect = to_value(&Shape::Rect { w: 1, h: 2 }).unwrap();
        let inner = rect.as_map().unwrap().get("Rect").unwrap().as_map().unwrap();
        assert_eq!(inner.get("h").and_then(FirestoreValue::as_i64), Some(2));
    }

    #[test]
    fn integer_keys_are_stringified() {
        let map: HashMap<u32, &str> = HashMap::from([(7, "seven")]);
        let value = to_map(&map).unwrap();
        assert_eq!(value.get("7").and_then(|v| v.as_str()), Some("seven"));
    }

    #[test]
    fn rejects_out_of_range_integers_with_trail() {
        #[derive(Serialize)]
        struct Counter {
            hits: Vec<u64>,
        }
        let err = to_value(&Counter {
            hits: vec![1, u64::MAX],
        })
        .unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::UnsupportedValue);
        assert_eq!(err.path_string(), "hits.1");
    }

    #[test]
    fn rejects_non_string_keys() {
        let map: BTreeMap<bool, i32> = BTreeMap::from([(true, 1)]);
        let err = to_value(&map).unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::UnsupportedValue);
    }

    #[test]
    fn top_level_scalar_is_not_a_document() {
        let err = to_map(&42).unwrap_err();
        assert_eq!(err.code, FirestoreErrorCode::InvalidArgument);
    }

    #[test]
    fn raw_values_pass_through_unchanged() {
        let raw = FirestoreValue::from_map(BTreeMap::from([
            ("ref".to_string(), FirestoreValue::from_reference("projects/p/databases/(default)/documents/a/b")),
            ("point".to_string(), GeoPoint::new(1.0, 2.0).unwrap().into()),
            ("inc".to_string(), FieldValue::increment(2).into()),
        ]));
        assert_eq!(to_value(&raw).unwrap(), raw);
    }
}
