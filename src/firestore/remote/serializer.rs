use std::collections::BTreeMap;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value as JsonValue};

use crate::firestore::api::{
    DocumentReference, DocumentSnapshot, FieldTransform, Query, QuerySnapshot, TransformOperation,
};
use crate::firestore::error::{internal_error, invalid_argument, FirestoreResult};
use crate::firestore::model::{DatabaseId, DocumentKey, FieldPath, GeoPoint, Timestamp};
use crate::firestore::remote::mutation::WriteOperation;
use crate::firestore::remote::structured_query::encode_structured_query;
use crate::firestore::value::{BytesValue, FirestoreValue, MapValue, ValueKind};

/// Converts between [`FirestoreValue`]s and the Firestore REST JSON encoding.
#[derive(Clone, Debug)]
pub struct JsonProtoSerializer {
    database_id: DatabaseId,
}

impl JsonProtoSerializer {
    pub fn new(database_id: DatabaseId) -> Self {
        Self { database_id }
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    pub fn document_name(&self, key: &DocumentKey) -> String {
        self.database_id.resource_name(key.path())
    }

    /// Encodes a single value. Sentinels are write-only and must have been
    /// extracted as field transforms beforehand.
    pub fn encode_value(&self, value: &FirestoreValue) -> FirestoreResult<JsonValue> {
        encode_value(value)
    }

    pub fn decode_value(&self, value: &JsonValue) -> FirestoreResult<FirestoreValue> {
        decode_value(value)
    }

    /// Encodes document fields as the contents of a `fields` object.
    pub fn encode_fields(&self, map: &MapValue) -> FirestoreResult<JsonValue> {
        encode_map_fields(map)
    }

    /// Decodes the `fields` of a REST document; a document without user
    /// fields decodes to an empty map.
    pub fn decode_fields(&self, document: &JsonValue) -> FirestoreResult<MapValue> {
        decode_map_value(document)
    }

    pub fn encode_write(&self, write: &WriteOperation) -> FirestoreResult<JsonValue> {
        match write {
            WriteOperation::Set {
                key,
                data,
                mask,
                transforms,
            } => {
                let mut encoded = self.build_update_write(key, data, transforms)?;
                if let Some(mask) = mask {
                    encoded.insert("updateMask".to_string(), encode_mask(mask));
                }
                Ok(JsonValue::Object(encoded))
            }
            WriteOperation::Update {
                key,
                data,
                field_paths,
                transforms,
            } => {
                let mut encoded = self.build_update_write(key, data, transforms)?;
                // An absent mask would replace the whole document.
                encoded.insert("updateMask".to_string(), encode_mask(field_paths));
                encoded.insert("currentDocument".to_string(), json!({ "exists": true }));
                Ok(JsonValue::Object(encoded))
            }
            WriteOperation::Delete { key } => Ok(json!({ "delete": self.document_name(key) })),
        }
    }

    /// Body of a `documents:commit` request.
    pub fn encode_commit_body(&self, writes: &[WriteOperation]) -> FirestoreResult<JsonValue> {
        let writes = writes
            .iter()
            .map(|write| self.encode_write(write))
            .collect::<FirestoreResult<Vec<_>>>()?;
        Ok(json!({ "writes": writes }))
    }

    /// Body of a `runQuery` request posted to [`Query::parent_resource_name`].
    pub fn encode_run_query_body(&self, query: &Query) -> FirestoreResult<JsonValue> {
        Ok(json!({ "structuredQuery": encode_structured_query(self, query)? }))
    }

    /// Decodes a REST `Document` (`name`, `fields`, `createTime`,
    /// `updateTime`).
    pub fn decode_document(&self, document: &JsonValue) -> FirestoreResult<DocumentSnapshot> {
        let name = document
            .get("name")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| invalid_argument("Document is missing its 'name'"))?;
        let reference = DocumentReference::from_resource_name(name)?;
        if reference.database_id() != &self.database_id {
            return Err(invalid_argument(format!(
                "Document '{name}' does not belong to {}",
                self.database_id
            )));
        }
        let data = decode_map_value(document)?;
        let create_time = optional_timestamp(document, "createTime")?;
        let update_time = optional_timestamp(document, "updateTime")?;
        Ok(DocumentSnapshot::new(
            reference,
            Some(data),
            create_time,
            update_time,
        ))
    }

    /// Decodes the streamed array returned by `runQuery`. Entries without a
    /// `document` (progress and read-time markers) are skipped.
    pub fn decode_run_query_response(
        &self,
        query: &Query,
        response: &JsonValue,
    ) -> FirestoreResult<QuerySnapshot> {
        let entries = response
            .as_array()
            .ok_or_else(|| invalid_argument("runQuery response must be an array"))?;
        let documents = entries
            .iter()
            .filter_map(|entry| entry.get("document"))
            .map(|document| self.decode_document(document))
            .collect::<FirestoreResult<Vec<_>>>()?;
        Ok(QuerySnapshot::new(query.clone(), documents))
    }

    fn build_update_write(
        &self,
        key: &DocumentKey,
        data: &MapValue,
        transforms: &[FieldTransform],
    ) -> FirestoreResult<serde_json::Map<String, JsonValue>> {
        let mut write = serde_json::Map::new();
        write.insert(
            "update".to_string(),
            json!({
                "name": self.document_name(key),
                "fields": encode_map_fields(data)?,
            }),
        );
        if !transforms.is_empty() {
            let encoded = transforms
                .iter()
                .map(encode_field_transform)
                .collect::<FirestoreResult<Vec<_>>>()?;
            write.insert("updateTransforms".to_string(), JsonValue::Array(encoded));
        }
        Ok(write)
    }
}

fn encode_mask(field_paths: &[FieldPath]) -> JsonValue {
    let paths: Vec<String> = field_paths.iter().map(FieldPath::server_format).collect();
    json!({ "fieldPaths": paths })
}

fn encode_field_transform(transform: &FieldTransform) -> FirestoreResult<JsonValue> {
    let field_path = transform.field_path().server_format();
    let encoded = match transform.operation() {
        TransformOperation::ServerTimestamp => json!({
            "fieldPath": field_path,
            "setToServerValue": "REQUEST_TIME",
        }),
        TransformOperation::NumericIncrement(operand) => json!({
            "fieldPath": field_path,
            "increment": encode_value(operand)?,
        }),
        TransformOperation::ArrayUnion(elements) => json!({
            "fieldPath": field_path,
            "appendMissingElements": { "values": encode_values(elements)? },
        }),
        TransformOperation::ArrayRemove(elements) => json!({
            "fieldPath": field_path,
            "removeAllFromArray": { "values": encode_values(elements)? },
        }),
        TransformOperation::Delete => {
            return Err(internal_error(format!(
                "Delete at '{field_path}' belongs in the update mask, not in updateTransforms"
            )))
        }
    };
    Ok(encoded)
}

fn encode_values(values: &[FirestoreValue]) -> FirestoreResult<Vec<JsonValue>> {
    values.iter().map(encode_value).collect()
}

fn encode_map_fields(map: &MapValue) -> FirestoreResult<JsonValue> {
    let mut fields = serde_json::Map::new();
    for (key, value) in map.fields() {
        let encoded = encode_value(value).map_err(|err| err.within(key.clone()))?;
        fields.insert(key.clone(), encoded);
    }
    Ok(JsonValue::Object(fields))
}

fn encode_value(value: &FirestoreValue) -> FirestoreResult<JsonValue> {
    Ok(match value.kind() {
        ValueKind::Null => json!({ "nullValue": JsonValue::Null }),
        ValueKind::Boolean(boolean) => json!({ "booleanValue": boolean }),
        ValueKind::Integer(integer) => json!({ "integerValue": integer.to_string() }),
        ValueKind::Double(double) => json!({ "doubleValue": encode_double(*double) }),
        ValueKind::Timestamp(timestamp) => {
            json!({ "timestampValue": encode_timestamp(timestamp)? })
        }
        ValueKind::String(string) => json!({ "stringValue": string }),
        ValueKind::Bytes(bytes) => {
            json!({ "bytesValue": BASE64_STANDARD.encode(bytes.as_slice()) })
        }
        ValueKind::Reference(reference) => json!({ "referenceValue": reference }),
        ValueKind::GeoPoint(point) => json!({
            "geoPointValue": {
                "latitude": point.latitude(),
                "longitude": point.longitude(),
            }
        }),
        ValueKind::Array(array) => {
            let mut values = Vec::with_capacity(array.len());
            for (index, element) in array.values().iter().enumerate() {
                values.push(encode_value(element).map_err(|err| err.within(index.to_string()))?);
            }
            json!({ "arrayValue": { "values": values } })
        }
        ValueKind::Map(map) => json!({ "mapValue": { "fields": encode_map_fields(map)? } }),
        ValueKind::Sentinel(sentinel) => {
            return Err(invalid_argument(format!(
                "FieldValue.{}() is a write-time transform and cannot be sent as a value",
                sentinel.tag()
            )))
        }
    })
}

/// JSON numbers cannot carry non-finite doubles; the REST API accepts them
/// as strings.
fn encode_double(value: f64) -> JsonValue {
    if value.is_nan() {
        json!("NaN")
    } else if value.is_infinite() {
        json!(if value > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        json!(value)
    }
}

fn decode_map_value(value: &JsonValue) -> FirestoreResult<MapValue> {
    let map = value
        .as_object()
        .ok_or_else(|| invalid_argument("Expected object for map value"))?;
    let fields_object = match map.get("fields") {
        Some(fields_value) => fields_value
            .as_object()
            .ok_or_else(|| invalid_argument("Expected 'fields' to be an object"))?,
        None => return Ok(MapValue::default()),
    };

    let mut fields = BTreeMap::new();
    for (key, value) in fields_object {
        let decoded = decode_value(value).map_err(|err| err.within(key.clone()))?;
        fields.insert(key.clone(), decoded);
    }
    Ok(MapValue::new(fields))
}

fn decode_value(value: &JsonValue) -> FirestoreResult<FirestoreValue> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid_argument("Expected Firestore value object"))?;
    if object.contains_key("nullValue") {
        return Ok(FirestoreValue::null());
    }
    if let Some(bool_value) = object.get("booleanValue") {
        let value = bool_value
            .as_bool()
            .ok_or_else(|| invalid_argument("booleanValue must be bool"))?;
        return Ok(FirestoreValue::from_bool(value));
    }
    if let Some(integer_value) = object.get("integerValue") {
        let parsed = match integer_value {
            JsonValue::String(value) => i64::from_str(value)
                .map_err(|err| invalid_argument(format!("Invalid integerValue: {err}")))?,
            JsonValue::Number(number) => number
                .as_i64()
                .ok_or_else(|| invalid_argument("Integer out of range"))?,
            _ => return Err(invalid_argument("integerValue must be a string or number")),
        };
        return Ok(FirestoreValue::from_integer(parsed));
    }
    if let Some(double_value) = object.get("doubleValue") {
        let parsed = match double_value {
            JsonValue::Number(number) => number
                .as_f64()
                .ok_or_else(|| invalid_argument("Invalid doubleValue"))?,
            JsonValue::String(value) => value
                .parse::<f64>()
                .map_err(|err| invalid_argument(format!("Invalid doubleValue: {err}")))?,
            _ => return Err(invalid_argument("doubleValue must be a number or string")),
        };
        return Ok(FirestoreValue::from_double(parsed));
    }
    if let Some(timestamp_value) = object.get("timestampValue") {
        let timestamp_str = timestamp_value
            .as_str()
            .ok_or_else(|| invalid_argument("timestampValue must be string"))?;
        return Ok(FirestoreValue::from_timestamp(parse_timestamp(
            timestamp_str,
        )?));
    }
    if let Some(string_value) = object.get("stringValue") {
        let str_value = string_value
            .as_str()
            .ok_or_else(|| invalid_argument("stringValue must be string"))?;
        return Ok(FirestoreValue::from_string(str_value));
    }
    if let Some(bytes_value) = object.get("bytesValue") {
        let str_value = bytes_value
            .as_str()
            .ok_or_else(|| invalid_argument("bytesValue must be base64 string"))?;
        let decoded = BASE64_STANDARD
            .decode(str_value)
            .map_err(|err| invalid_argument(format!("Invalid bytesValue: {err}")))?;
        return Ok(FirestoreValue::from_bytes(BytesValue::from(decoded)));
    }
    if let Some(reference_value) = object.get("referenceValue") {
        let str_value = reference_value
            .as_str()
            .ok_or_else(|| invalid_argument("referenceValue must be string"))?;
        return Ok(FirestoreValue::from_reference(str_value));
    }
    if let Some(geo_point) = object.get("geoPointValue") {
        // Zero coordinates are omitted from the JSON encoding.
        let coordinate = |name: &str| -> FirestoreResult<f64> {
            match geo_point.get(name) {
                None => Ok(0.0),
                Some(value) => value
                    .as_f64()
                    .ok_or_else(|| invalid_argument(format!("geoPointValue.{name} must be f64"))),
            }
        };
        let point = GeoPoint::new(coordinate("latitude")?, coordinate("longitude")?)?;
        return Ok(FirestoreValue::from_geo_point(point));
    }
    if let Some(array_value) = object.get("arrayValue") {
        let mut decoded = Vec::new();
        if let Some(entries) = array_value.get("values").and_then(JsonValue::as_array) {
            for (index, entry) in entries.iter().enumerate() {
                decoded.push(decode_value(entry).map_err(|err| err.within(index.to_string()))?);
            }
        }
        return Ok(FirestoreValue::from_array(decoded));
    }
    if let Some(map_value) = object.get("mapValue") {
        return Ok(FirestoreValue::from(decode_map_value(map_value)?));
    }

    Err(invalid_argument("Unknown Firestore value type"))
}

fn encode_timestamp(timestamp: &Timestamp) -> FirestoreResult<String> {
    let datetime = timestamp.to_datetime().ok_or_else(|| {
        invalid_argument(format!(
            "Timestamp {}s {}ns is outside the supported range",
            timestamp.seconds, timestamp.nanos
        ))
    })?;
    Ok(datetime.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

fn parse_timestamp(value: &str) -> FirestoreResult<Timestamp> {
    let datetime = DateTime::parse_from_rfc3339(value)
        .map_err(|err| invalid_argument(format!("Invalid timestamp: {err}")))?;
    Ok(Timestamp::from(datetime.with_timezone(&Utc)))
}

fn optional_timestamp(document: &JsonValue, field: &str) -> FirestoreResult<Option<Timestamp>> {
    match document.get(field) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => {
            let text = value
                .as_str()
                .ok_or_else(|| invalid_argument(format!("{field} must be a string")))?;
            parse_timestamp(text).map(Some)
        }
    }
}
