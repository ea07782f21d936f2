use log::debug;
use serde_json::{json, Value as JsonValue};

use crate::firestore::api::{FilterOperator, OrderDirection, Query, QueryPredicate};
use crate::firestore::error::{internal_error, invalid_path, FirestoreResult};
use crate::firestore::model::{FieldPath, ResourcePath};
use crate::firestore::remote::serializer::JsonProtoSerializer;
use crate::firestore::value::{FirestoreValue, ValueKind};

/// Backend-ready form of a [`Query`], as sent inside a `runQuery` request.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredQuery {
    pub from: CollectionSelector,
    pub filter: Option<Filter>,
    pub order_by: Vec<Order>,
    pub limit: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionSelector {
    pub collection_id: String,
    pub all_descendants: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Field {
        field: FieldPath,
        op: FilterOperator,
        value: FirestoreValue,
    },
    Unary {
        field: FieldPath,
        op: UnaryOperator,
    },
    Composite {
        op: CompositeOperator,
        filters: Vec<Filter>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    IsNull,
    IsNotNull,
    IsNan,
    IsNotNan,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::IsNull => "IS_NULL",
            UnaryOperator::IsNotNull => "IS_NOT_NULL",
            UnaryOperator::IsNan => "IS_NAN",
            UnaryOperator::IsNotNan => "IS_NOT_NAN",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositeOperator {
    And,
    Or,
}

impl CompositeOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositeOperator::And => "AND",
            CompositeOperator::Or => "OR",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub field: FieldPath,
    pub direction: OrderDirection,
}

/// Lowers the accumulated predicates of `query` into a [`StructuredQuery`].
///
/// Order clauses keep their encounter order. `limit_to_last` is expressed
/// as a plain limit plus a trailing `__name__` descending order.
pub fn compile(query: &Query) -> FirestoreResult<StructuredQuery> {
    let mut filters = Vec::new();
    let mut order_by = Vec::new();
    let mut limit = None;
    let mut reversed = false;

    for predicate in query.predicates() {
        match predicate {
            QueryPredicate::OrderBy { field, direction } => order_by.push(Order {
                field: field.clone(),
                direction: *direction,
            }),
            QueryPredicate::LimitTo(count) => limit = Some(*count),
            QueryPredicate::LimitToLast(count) => {
                limit = Some(*count);
                reversed = true;
            }
            filter => filters.push(compile_filter(query, filter)?),
        }
    }

    if reversed {
        debug!(
            "limit_to_last on '{}' appends a descending __name__ order",
            query.collection_id()
        );
        order_by.push(Order {
            field: FieldPath::document_id(),
            direction: OrderDirection::Descending,
        });
    }

    let filter = match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Filter::Composite {
            op: CompositeOperator::And,
            filters,
        }),
    };

    Ok(StructuredQuery {
        from: CollectionSelector {
            collection_id: query.collection_id().to_string(),
            all_descendants: query.all_descendants(),
        },
        filter,
        order_by,
        limit,
    })
}

/// Compiles `query` and renders it as REST JSON (`from`, `where`, `orderBy`,
/// `limit`).
pub fn encode_structured_query(
    serializer: &JsonProtoSerializer,
    query: &Query,
) -> FirestoreResult<JsonValue> {
    compile(query)?.to_json(serializer)
}

fn compile_filter(query: &Query, predicate: &QueryPredicate) -> FirestoreResult<Filter> {
    match predicate {
        QueryPredicate::Field { field, op, value } => Ok(field_filter(field, *op, value)),
        QueryPredicate::DocumentId { op, ids } => {
            let mut references = ids
                .iter()
                .map(|id| document_reference_value(query, id))
                .collect::<FirestoreResult<Vec<_>>>()?;
            let value = if op.is_list_operator() {
                FirestoreValue::from_array(references)
            } else {
                references.pop().unwrap_or_else(FirestoreValue::null)
            };
            Ok(Filter::Field {
                field: FieldPath::document_id(),
                op: *op,
                value,
            })
        }
        QueryPredicate::And(children) => composite(query, CompositeOperator::And, children),
        QueryPredicate::Or(children) => composite(query, CompositeOperator::Or, children),
        QueryPredicate::OrderBy { .. } | QueryPredicate::LimitTo(_) | QueryPredicate::LimitToLast(_) => {
            Err(internal_error(format!("{predicate:?} is not a filter")))
        }
    }
}

fn composite(
    query: &Query,
    op: CompositeOperator,
    children: &[QueryPredicate],
) -> FirestoreResult<Filter> {
    let filters = children
        .iter()
        .map(|child| compile_filter(query, child))
        .collect::<FirestoreResult<Vec<_>>>()?;
    Ok(Filter::Composite { op, filters })
}

fn field_filter(field: &FieldPath, op: FilterOperator, value: &FirestoreValue) -> Filter {
    let unary = match (op, value.kind()) {
        (FilterOperator::Equal, ValueKind::Null) => Some(UnaryOperator::IsNull),
        (FilterOperator::NotEqual, ValueKind::Null) => Some(UnaryOperator::IsNotNull),
        (FilterOperator::Equal, _) if value.is_nan() => Some(UnaryOperator::IsNan),
        (FilterOperator::NotEqual, _) if value.is_nan() => Some(UnaryOperator::IsNotNan),
        _ => None,
    };
    match unary {
        Some(op) => Filter::Unary {
            field: field.clone(),
            op,
        },
        None => Filter::Field {
            field: field.clone(),
            op,
            value: value.clone(),
        },
    }
}

fn document_reference_value(query: &Query, id: &str) -> FirestoreResult<FirestoreValue> {
    let base = if query.all_descendants() {
        ResourcePath::root()
    } else {
        query.collection_path()
    };
    let path = base.append(&ResourcePath::from_string(id));
    if !path.is_document_path() {
        return Err(invalid_path(format!(
            "Document id '{id}' does not resolve to a document (got '{}')",
            path.canonical_string()
        )));
    }
    Ok(FirestoreValue::from_reference(
        query.database_id().resource_name(&path),
    ))
}

impl StructuredQuery {
    pub fn to_json(&self, serializer: &JsonProtoSerializer) -> FirestoreResult<JsonValue> {
        let mut structured = serde_json::Map::new();
        structured.insert(
            "from".to_string(),
            json!([{
                "collectionId": self.from.collection_id,
                "allDescendants": self.from.all_descendants,
            }]),
        );

        if let Some(filter) = &self.filter {
            structured.insert("where".to_string(), filter.to_json(serializer)?);
        }

        if !self.order_by.is_empty() {
            let orders: Vec<_> = self
                .order_by
                .iter()
                .map(|order| {
                    json!({
                        "field": { "fieldPath": order.field.server_format() },
                        "direction": order.direction.as_str(),
                    })
                })
                .collect();
            structured.insert("orderBy".to_string(), JsonValue::Array(orders));
        }

        if let Some(limit) = self.limit {
            structured.insert("limit".to_string(), json!(limit));
        }

        Ok(JsonValue::Object(structured))
    }
}

impl Filter {
    pub fn to_json(&self, serializer: &JsonProtoSerializer) -> FirestoreResult<JsonValue> {
        Ok(match self {
            Filter::Field { field, op, value } => json!({
                "fieldFilter": {
                    "field": { "fieldPath": field.server_format() },
                    "op": op.as_str(),
                    "value": serializer.encode_value(value)?,
                }
            }),
            Filter::Unary { field, op } => json!({
                "unaryFilter": {
                    "op": op.as_str(),
                    "field": { "fieldPath": field.server_format() },
                }
            }),
            Filter::Composite { op, filters } => json!({
                "compositeFilter": {
                    "op": op.as_str(),
                    "filters": filters
                        .iter()
                        .map(|filter| filter.to_json(serializer))
                        .collect::<FirestoreResult<Vec<_>>>()?,
                }
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::api::Firestore;

    fn firestore() -> Firestore {
        Firestore::for_project("demo")
    }

    fn users() -> Query {
        firestore().collection("users").unwrap().query()
    }

    #[test]
    fn empty_query_only_selects_collection() {
        let compiled = compile(&users()).unwrap();
        assert_eq!(
            compiled.from,
            CollectionSelector {
                collection_id: "users".into(),
                all_descendants: false,
            }
        );
        assert!(compiled.filter.is_none());
        assert!(compiled.order_by.is_empty());
        assert_eq!(compiled.limit, None);
    }

    #[test]
    fn null_and_nan_equality_become_unary_filters() {
        let query = users()
            .where_field("nickname", FilterOperator::Equal, Option::<String>::None)
            .unwrap();
        let compiled = compile(&query).unwrap();
        assert!(matches!(
            compiled.filter,
            Some(Filter::Unary { op: UnaryOperator::IsNull, .. })
        ));

        let query = users()
            .where_field("score", FilterOperator::NotEqual, f64::NAN)
            .unwrap();
        let compiled = compile(&query).unwrap();
        assert!(matches!(
            compiled.filter,
            Some(Filter::Unary { op: UnaryOperator::IsNotNan, .. })
        ));
    }

    #[test]
    fn merged_filters_compile_to_and_composite() {
        let query = users()
            .where_field("age", FilterOperator::GreaterThan, 18)
            .unwrap()
            .where_field("city", FilterOperator::Equal, "Paris")
            .unwrap();
        let Some(Filter::Composite { op, filters }) = compile(&query).unwrap().filter else {
            panic!("expected a composite filter");
        };
        assert_eq!(op, CompositeOperator::And);
        assert_eq!(filters.len(), 2);
    }

    #[test]
    fn limit_to_last_appends_descending_name_order() {
        let query = users()
            .order_by("age", OrderDirection::Ascending)
            .unwrap()
            .limit_to_last(3)
            .unwrap();
        let compiled = compile(&query).unwrap();
        assert_eq!(compiled.limit, Some(3));
        assert_eq!(compiled.order_by.len(), 2);
        assert_eq!(compiled.order_by[0].field.canonical_string(), "age");
        assert_eq!(compiled.order_by[1].field, FieldPath::document_id());
        assert_eq!(compiled.order_by[1].direction, OrderDirection::Descending);
    }

    #[test]
    fn document_id_filters_resolve_against_collection() {
        let query = users()
            .where_document_id(FilterOperator::Equal, "alice")
            .unwrap();
        let Some(Filter::Field { field, value, .. }) = compile(&query).unwrap().filter else {
            panic!("expected a field filter");
        };
        assert!(field.is_document_id());
        assert_eq!(
            value,
            FirestoreValue::from_reference("projects/demo/databases/(default)/documents/users/alice")
        );

        let query = users()
            .where_document_ids(FilterOperator::In, ["a", "b"])
            .unwrap();
        let Some(Filter::Field { value, .. }) = compile(&query).unwrap().filter else {
            panic!("expected a field filter");
        };
        assert_eq!(value.as_array().map(|array| array.len()), Some(2));
    }

    #[test]
    fn document_id_filters_must_name_a_document() {
        let query = users()
            .where_document_id(FilterOperator::Equal, "alice/posts")
            .unwrap();
        let err = compile(&query).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-path");

        let group = firestore().collection_group("posts").unwrap();
        let query = group
            .where_document_id(FilterOperator::Equal, "users/alice/posts/p1")
            .unwrap();
        assert!(compile(&query).is_ok());
        let query = group
            .where_document_id(FilterOperator::Equal, "p1")
            .unwrap();
        assert_eq!(
            compile(&query).unwrap_err().code_str(),
            "firestore/invalid-path"
        );
    }

    #[test]
    fn renders_rest_json() {
        let query = users()
            .where_field("age", FilterOperator::GreaterThanOrEqual, 21)
            .unwrap()
            .order_by("age", OrderDirection::Descending)
            .unwrap()
            .limit(10)
            .unwrap();
        let json = encode_structured_query(&firestore().serializer(), &query).unwrap();
        assert_eq!(
            json,
            json!({
                "from": [{ "collectionId": "users", "allDescendants": false }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": "age" },
                        "op": "GREATER_THAN_OR_EQUAL",
                        "value": { "integerValue": "21" }
                    }
                },
                "orderBy": [{ "field": { "fieldPath": "age" }, "direction": "DESCENDING" }],
                "limit": 10
            })
        );
    }
}
