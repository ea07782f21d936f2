//! Serde plumbing that lets Firestore-native leaf types survive a trip through
//! a plain serde data model.
//!
//! Each leaf serializes as a newtype struct carrying a reserved name. The
//! value encoder and decoder recognise those names and map them onto the
//! matching [`ValueKind`]; any other serde format just sees the inner payload.
//! When a leaf is reached through `deserialize_any` the decoder hands out a
//! single-entry map keyed by the marker name instead; a genuine map that
//! starts with a marker-named key travels under `LITERAL_MAP`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::firestore::model::{GeoPoint, Timestamp};
use crate::firestore::value::{BytesValue, FieldValue, FirestoreValue, ValueKind};

pub(crate) const TIMESTAMP: &str = "$__firestore_timestamp";
pub(crate) const GEO_POINT: &str = "$__firestore_geo_point";
pub(crate) const BYTES: &str = "$__firestore_bytes";
pub(crate) const REFERENCE: &str = "$__firestore_reference";
pub(crate) const FIELD_VALUE: &str = "$__firestore_field_value";

/// Wraps a plain map whose keys would otherwise read as a marker entry.
pub(crate) const LITERAL_MAP: &str = "$__firestore_map";

pub(crate) fn is_marker(name: &str) -> bool {
    matches!(name, TIMESTAMP | GEO_POINT | BYTES | REFERENCE | FIELD_VALUE)
}

/// Map keys that [`FirestoreValue`]'s deserializer treats specially.
pub(crate) fn is_reserved_key(key: &str) -> bool {
    is_marker(key) || key == LITERAL_MAP
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(TIMESTAMP, &(self.seconds, self.nanos))
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl<'de> Visitor<'de> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a timestamp")
            }

            fn visit_newtype_struct<D: Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<Self::Value, D::Error> {
                let (seconds, nanos) = <(i64, i32)>::deserialize(deserializer)?;
                Ok(Timestamp::new(seconds, nanos))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
                let (seconds, nanos) =
                    <(i64, i32)>::deserialize(de::value::SeqAccessDeserializer::new(seq))?;
                Ok(Timestamp::new(seconds, nanos))
            }
        }

        deserializer.deserialize_newtype_struct(TIMESTAMP, TimestampVisitor)
    }
}

impl Serialize for GeoPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(GEO_POINT, &(self.latitude(), self.longitude()))
    }
}

impl<'de> Deserialize<'de> for GeoPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GeoPointVisitor;

        impl<'de> Visitor<'de> for GeoPointVisitor {
            type Value = GeoPoint;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a geo point")
            }

            fn visit_newtype_struct<D: Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<Self::Value, D::Error> {
                let (latitude, longitude) = <(f64, f64)>::deserialize(deserializer)?;
                GeoPoint::new(latitude, longitude).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_newtype_struct(GEO_POINT, GeoPointVisitor)
    }
}

struct RawBytes<'a>(&'a [u8]);

impl Serialize for RawBytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

impl Serialize for BytesValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(BYTES, &RawBytes(self.as_slice()))
    }
}

struct ByteBufVisitor;

impl<'de> Visitor<'de> for ByteBufVisitor {
    type Value = BytesValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("bytes")
    }

    fn visit_bytes<E: de::Error>(self, value: &[u8]) -> Result<Self::Value, E> {
        Ok(BytesValue::from(value))
    }

    fn visit_byte_buf<E: de::Error>(self, value: Vec<u8>) -> Result<Self::Value, E> {
        Ok(BytesValue::new(value))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.push(byte);
        }
        Ok(BytesValue::new(bytes))
    }
}

impl<'de> Deserialize<'de> for BytesValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BytesValueVisitor;

        impl<'de> Visitor<'de> for BytesValueVisitor {
            type Value = BytesValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("bytes")
            }

            fn visit_newtype_struct<D: Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<Self::Value, D::Error> {
                deserializer.deserialize_byte_buf(ByteBufVisitor)
            }
        }

        deserializer.deserialize_newtype_struct(BYTES, BytesValueVisitor)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(FIELD_VALUE, &(self.tag(), self.operands()))
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldValueVisitor;

        impl<'de> Visitor<'de> for FieldValueVisitor {
            type Value = FieldValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a field transform")
            }

            fn visit_newtype_struct<D: Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<Self::Value, D::Error> {
                let (tag, operands) = <(String, Vec<FirestoreValue>)>::deserialize(deserializer)?;
                field_value_from_parts::<D::Error>(&tag, operands)
            }
        }

        deserializer.deserialize_newtype_struct(FIELD_VALUE, FieldValueVisitor)
    }
}

fn field_value_from_parts<E: de::Error>(
    tag: &str,
    operands: Vec<FirestoreValue>,
) -> Result<FieldValue, E> {
    FieldValue::from_parts(tag, operands)
        .ok_or_else(|| E::custom(format!("unknown field transform '{tag}'")))
}

struct ReferenceName<'a>(&'a str);

impl Serialize for ReferenceName<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(REFERENCE, self.0)
    }
}

/// Serializes a document resource name so that the value encoder stores it
/// as a reference rather than a string.
pub(crate) fn serialize_reference<S: Serializer>(
    name: &str,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    ReferenceName(name).serialize(serializer)
}

/// Reads back a resource name written by [`serialize_reference`].
pub(crate) fn deserialize_reference<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    struct ReferenceVisitor;

    impl<'de> Visitor<'de> for ReferenceVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a document reference")
        }

        fn visit_newtype_struct<D: Deserializer<'de>>(
            self,
            deserializer: D,
        ) -> Result<Self::Value, D::Error> {
            String::deserialize(deserializer)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_newtype_struct(REFERENCE, ReferenceVisitor)
}

impl Serialize for FirestoreValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.kind() {
            ValueKind::Null => serializer.serialize_unit(),
            ValueKind::Boolean(value) => serializer.serialize_bool(*value),
            ValueKind::Integer(value) => serializer.serialize_i64(*value),
            ValueKind::Double(value) => serializer.serialize_f64(*value),
            ValueKind::Timestamp(value) => value.serialize(serializer),
            ValueKind::String(value) => serializer.serialize_str(value),
            ValueKind::Bytes(value) => value.serialize(serializer),
            ValueKind::Reference(name) => serialize_reference(name, serializer),
            ValueKind::GeoPoint(value) => value.serialize(serializer),
            ValueKind::Array(array) => {
                let mut seq = serializer.serialize_seq(Some(array.len()))?;
                for value in array.values() {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            ValueKind::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.fields() {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            ValueKind::Sentinel(field_value) => field_value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FirestoreValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FirestoreValueVisitor)
    }
}

struct FirestoreValueVisitor;

impl<'de> Visitor<'de> for FirestoreValueVisitor {
    type Value = FirestoreValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any Firestore value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FirestoreValue::null())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FirestoreValue::null())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        FirestoreValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
        Ok(FirestoreValue::from_bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(FirestoreValue::from_integer(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        i64::try_from(value)
            .map(FirestoreValue::from_integer)
            .map_err(|_| E::custom(format!("integer {value} does not fit in 64-bit signed range")))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Ok(FirestoreValue::from_double(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(FirestoreValue::from_string(value))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(FirestoreValue::from_string(value))
    }

    fn visit_bytes<E: de::Error>(self, value: &[u8]) -> Result<Self::Value, E> {
        Ok(FirestoreValue::from_bytes(BytesValue::from(value)))
    }

    fn visit_byte_buf<E: de::Error>(self, value: Vec<u8>) -> Result<Self::Value, E> {
        Ok(FirestoreValue::from_bytes(BytesValue::new(value)))
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<Self::Value, D::Error> {
        FirestoreValue::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(value) = seq.next_element()? {
            values.push(value);
        }
        Ok(FirestoreValue::from_array(values))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut fields = BTreeMap::new();
        let Some(first) = map.next_key::<String>()? else {
            return Ok(FirestoreValue::from_map(fields));
        };
        match first.as_str() {
            TIMESTAMP => {
                let (seconds, nanos): (i64, i32) = map.next_value()?;
                return Ok(FirestoreValue::from_timestamp(Timestamp::new(seconds, nanos)));
            }
            GEO_POINT => {
                let (latitude, longitude): (f64, f64) = map.next_value()?;
                let point = GeoPoint::new(latitude, longitude).map_err(de::Error::custom)?;
                return Ok(FirestoreValue::from_geo_point(point));
            }
            BYTES => {
                let bytes: Vec<u8> = map.next_value()?;
                return Ok(FirestoreValue::from_bytes(BytesValue::new(bytes)));
            }
            REFERENCE => {
                let name: String = map.next_value()?;
                return Ok(FirestoreValue::from_reference(name));
            }
            FIELD_VALUE => {
                let (tag, operands): (String, Vec<FirestoreValue>) = map.next_value()?;
                let field_value = field_value_from_parts::<A::Error>(&tag, operands)?;
                return Ok(FirestoreValue::from_field_value(field_value));
            }
            LITERAL_MAP => {
                let fields: BTreeMap<String, FirestoreValue> = map.next_value()?;
                return Ok(FirestoreValue::from_map(fields));
            }
            _ => {}
        }
        fields.insert(first, map.next_value()?);
        while let Some((key, value)) = map.next_entry::<String, FirestoreValue>()? {
            fields.insert(key, value);
        }
        Ok(FirestoreValue::from_map(fields))
    }
}
