use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use firestore_admin_core::firestore::value::{from_map, to_map, ValueKind};
use firestore_admin_core::firestore::{
    from_value, to_value, BytesValue, DocumentReference, FieldValue, Firestore, FirestoreValue,
    GeoPoint, Timestamp,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Address {
    street: String,
    zip: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    Admin,
    Member,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    age: i64,
    lifetime_views: i128,
    badges: u128,
    score: f64,
    active: bool,
    role: Role,
    tags: Vec<String>,
    address: Address,
    nickname: Option<String>,
    joined: Timestamp,
    home: GeoPoint,
    avatar: BytesValue,
    manager: Option<DocumentReference>,
    #[serde(with = "firestore_admin_core::firestore::value::datetime")]
    last_login: DateTime<Utc>,
}

fn profile() -> Profile {
    let firestore = Firestore::for_project("demo");
    Profile {
        name: "Ada".into(),
        age: 36,
        lifetime_views: -12,
        badges: 7,
        score: 99.5,
        active: true,
        role: Role::Admin,
        tags: vec!["math".into(), "engines".into()],
        address: Address {
            street: "St James's Square".into(),
            zip: 1815,
        },
        nickname: None,
        joined: Timestamp::new(1_600_000_000, 42),
        home: GeoPoint::new(51.5, -0.12).unwrap(),
        avatar: BytesValue::from(vec![0u8, 1, 2, 255]),
        manager: Some(firestore.doc("users/babbage").unwrap()),
        last_login: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
    }
}

#[test]
fn records_round_trip() {
    let original = profile();
    let map = to_map(&original).unwrap();
    let decoded: Profile = from_map(&map).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn leaf_types_pass_through() {
    let map = to_map(&profile()).unwrap();
    assert!(matches!(map.get("joined").unwrap().kind(), ValueKind::Timestamp(ts) if ts.nanos == 42));
    assert!(matches!(map.get("home").unwrap().kind(), ValueKind::GeoPoint(_)));
    assert!(matches!(map.get("avatar").unwrap().kind(), ValueKind::Bytes(_)));
    assert!(matches!(
        map.get("manager").unwrap().kind(),
        ValueKind::Reference(name) if name == "projects/demo/databases/(default)/documents/users/babbage"
    ));
    assert!(matches!(map.get("role").unwrap().kind(), ValueKind::String(role) if role == "admin"));
    assert!(map.get("nickname").unwrap().is_null());
}

#[test]
fn scalars_and_sequences_round_trip() {
    assert_eq!(from_value::<i64>(&to_value(&-7i64).unwrap()).unwrap(), -7);
    assert_eq!(from_value::<String>(&to_value("hi").unwrap()).unwrap(), "hi");
    assert_eq!(
        from_value::<Vec<Option<bool>>>(&to_value(&vec![Some(true), None]).unwrap()).unwrap(),
        vec![Some(true), None]
    );
    let mut counts = BTreeMap::new();
    counts.insert("a".to_string(), 1u8);
    counts.insert("b".to_string(), 2u8);
    assert_eq!(
        from_value::<BTreeMap<String, u8>>(&to_value(&counts).unwrap()).unwrap(),
        counts
    );
}

#[test]
fn mismatches_report_the_field_trail() {
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Wrapper {
        nested: Nested,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Nested {
        items: Vec<i64>,
    }

    let value = to_value(&serde_json::json!({ "nested": { "items": [1, "two", 3] } })).unwrap();
    let err = from_value::<Wrapper>(&value).unwrap_err();
    assert_eq!(err.code_str(), "firestore/type-mismatch");
    assert_eq!(err.path_string(), "nested.items.1");
}

#[test]
fn missing_required_field_is_reported() {
    let value = to_value(&serde_json::json!({ "street": "Main" })).unwrap();
    let err = from_value::<Address>(&value).unwrap_err();
    assert_eq!(err.code_str(), "firestore/missing-field");
}

#[test]
fn unsigned_overflow_is_rejected() {
    let err = to_value(&u64::MAX).unwrap_err();
    assert_eq!(err.code_str(), "firestore/unsupported-value");
}

#[test]
fn sentinels_encode_and_decode_as_values() {
    #[derive(Serialize)]
    struct Counter {
        hits: FieldValue,
    }

    let value = to_value(&Counter {
        hits: FieldValue::increment(2),
    })
    .unwrap();
    let hits = value.as_map().and_then(|map| map.get("hits")).unwrap();
    assert!(hits.is_sentinel());

    let raw: FirestoreValue = from_value(&value).unwrap();
    assert_eq!(raw, value);
}

#[test]
fn maps_keyed_like_native_leaves_decode_as_maps() {
    let mut fields = BTreeMap::new();
    fields.insert(
        "$__firestore_reference".to_string(),
        FirestoreValue::from_string("x"),
    );
    let value = to_value(&fields).unwrap();
    assert!(matches!(value.kind(), ValueKind::Map(_)));

    let decoded: FirestoreValue = from_value(&value).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(
        from_value::<BTreeMap<String, String>>(&value).unwrap()["$__firestore_reference"],
        "x"
    );
}
