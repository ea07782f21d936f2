use log::debug;
use serde::Serialize;

use crate::firestore::error::{invalid_argument, invalid_path, FirestoreResult};
use crate::firestore::model::{normalize, DatabaseId, FieldPath, IntoFieldPath, ResourcePath};
use crate::firestore::value::{to_value, FirestoreValue};

use super::reference::CollectionReference;

/// Comparison operators accepted by field and document-id filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "EQUAL",
            FilterOperator::NotEqual => "NOT_EQUAL",
            FilterOperator::LessThan => "LESS_THAN",
            FilterOperator::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            FilterOperator::GreaterThan => "GREATER_THAN",
            FilterOperator::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            FilterOperator::ArrayContains => "ARRAY_CONTAINS",
            FilterOperator::ArrayContainsAny => "ARRAY_CONTAINS_ANY",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT_IN",
        }
    }

    /// Operators whose operand is a list of candidates.
    pub fn is_list_operator(&self) -> bool {
        matches!(
            self,
            FilterOperator::In | FilterOperator::NotIn | FilterOperator::ArrayContainsAny
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum OrderDirection {
    #[default]
    Ascending,
    Descending,
}

impl OrderDirection {
    pub fn from_descending(descending: bool) -> Self {
        if descending {
            OrderDirection::Descending
        } else {
            OrderDirection::Ascending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Ascending => "ASCENDING",
            OrderDirection::Descending => "DESCENDING",
        }
    }
}

/// One accumulated step of a query.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryPredicate {
    Field {
        field: FieldPath,
        op: FilterOperator,
        value: FirestoreValue,
    },
    /// Compares the document's own key. `ids` holds a single entry unless
    /// `op` is a list operator.
    DocumentId {
        op: FilterOperator,
        ids: Vec<String>,
    },
    And(Vec<QueryPredicate>),
    Or(Vec<QueryPredicate>),
    OrderBy {
        field: FieldPath,
        direction: OrderDirection,
    },
    LimitTo(i32),
    LimitToLast(i32),
}

impl QueryPredicate {
    /// Field comparison. The operand is encoded with the value codec; list
    /// operators require it to encode to an array.
    pub fn field<F, V>(field: F, op: FilterOperator, value: V) -> FirestoreResult<Self>
    where
        F: IntoFieldPath,
        V: Serialize,
    {
        let field = field.into_field_path()?;
        let value = to_value(&value)?;
        if value.contains_sentinel() {
            return Err(invalid_argument(format!(
                "Field transforms cannot be used as a filter value (field '{field}')"
            )));
        }
        if op.is_list_operator() && value.as_array().map_or(true, |array| array.is_empty()) {
            return Err(invalid_argument(format!(
                "'{}' filters require a non-empty array value (field '{field}')",
                op.as_str()
            )));
        }
        Ok(QueryPredicate::Field { field, op, value })
    }

    /// Document-identity comparison against a single document id.
    pub fn document_id(op: FilterOperator, id: impl Into<String>) -> FirestoreResult<Self> {
        if op.is_list_operator() {
            return Err(invalid_argument(format!(
                "'{}' document-id filters require a list of ids",
                op.as_str()
            )));
        }
        if op == FilterOperator::ArrayContains {
            return Err(invalid_argument(
                "ARRAY_CONTAINS cannot be used on the document id",
            ));
        }
        let id = id.into();
        validate_document_id(&id)?;
        Ok(QueryPredicate::DocumentId { op, ids: vec![id] })
    }

    /// Document-identity comparison against a list of ids (`In`, `NotIn`,
    /// `ArrayContainsAny`).
    pub fn document_ids<I, S>(op: FilterOperator, ids: I) -> FirestoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !op.is_list_operator() {
            return Err(invalid_argument(format!(
                "'{}' document-id filters take a single id",
                op.as_str()
            )));
        }
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(invalid_argument(format!(
                "'{}' document-id filters require at least one id",
                op.as_str()
            )));
        }
        for id in &ids {
            validate_document_id(id)?;
        }
        Ok(QueryPredicate::DocumentId { op, ids })
    }

    pub fn and(predicates: Vec<QueryPredicate>) -> FirestoreResult<Self> {
        validate_composite("AND", &predicates)?;
        Ok(QueryPredicate::And(predicates))
    }

    pub fn or(predicates: Vec<QueryPredicate>) -> FirestoreResult<Self> {
        validate_composite("OR", &predicates)?;
        Ok(QueryPredicate::Or(predicates))
    }

    /// Field, document-id and composite predicates.
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            QueryPredicate::Field { .. }
                | QueryPredicate::DocumentId { .. }
                | QueryPredicate::And(_)
                | QueryPredicate::Or(_)
        )
    }

    fn is_composite(&self) -> bool {
        matches!(self, QueryPredicate::And(_) | QueryPredicate::Or(_))
    }
}

fn validate_document_id(id: &str) -> FirestoreResult<()> {
    if normalize(id).is_empty() {
        return Err(invalid_path(format!(
            "Document id filters require a non-empty id, got '{id}'"
        )));
    }
    Ok(())
}

fn validate_composite(op: &str, predicates: &[QueryPredicate]) -> FirestoreResult<()> {
    if predicates.is_empty() {
        return Err(invalid_argument(format!(
            "{op} filters require at least one nested filter"
        )));
    }
    if let Some(other) = predicates.iter().find(|p| !p.is_filter()) {
        return Err(invalid_argument(format!(
            "{op} filters may only contain filters, got {other:?}"
        )));
    }
    Ok(())
}

/// An immutable query over one collection (or, with `all_descendants`, every
/// collection sharing its id). Builder methods return a new `Query`.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    database_id: DatabaseId,
    parent_path: ResourcePath,
    collection_id: String,
    all_descendants: bool,
    predicates: Vec<QueryPredicate>,
}

impl Query {
    pub(crate) fn for_collection(collection: &CollectionReference) -> Self {
        Self {
            database_id: collection.database_id().clone(),
            parent_path: collection.path().without_last(),
            collection_id: collection.id().to_string(),
            all_descendants: false,
            predicates: Vec::new(),
        }
    }

    pub(crate) fn collection_group(
        database_id: DatabaseId,
        collection_id: &str,
    ) -> FirestoreResult<Self> {
        if collection_id.is_empty() || collection_id.contains('/') {
            return Err(invalid_argument(format!(
                "Collection group id '{collection_id}' must be a single non-empty segment"
            )));
        }
        Ok(Self {
            database_id,
            parent_path: ResourcePath::root(),
            collection_id: collection_id.to_string(),
            all_descendants: true,
            predicates: Vec::new(),
        })
    }

    pub fn database_id(&self) -> &DatabaseId {
        &self.database_id
    }

    /// Path of the document the collection hangs off; empty for root
    /// collections and collection groups.
    pub fn parent_path(&self) -> &ResourcePath {
        &self.parent_path
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    /// Returns the full path to the targeted collection.
    pub fn collection_path(&self) -> ResourcePath {
        self.parent_path.child([self.collection_id.as_str()])
    }

    pub fn all_descendants(&self) -> bool {
        self.all_descendants
    }

    pub fn predicates(&self) -> &[QueryPredicate] {
        &self.predicates
    }

    /// Resource name a `runQuery` request for this query is posted to.
    pub fn parent_resource_name(&self) -> String {
        self.database_id.resource_name(&self.parent_path)
    }

    pub fn where_field<F, V>(&self, field: F, op: FilterOperator, value: V) -> FirestoreResult<Query>
    where
        F: IntoFieldPath,
        V: Serialize,
    {
        Ok(self.with_filter(QueryPredicate::field(field, op, value)?))
    }

    pub fn where_document_id(&self, op: FilterOperator, id: &str) -> FirestoreResult<Query> {
        Ok(self.with_filter(QueryPredicate::document_id(op, id)?))
    }

    pub fn where_document_ids<I, S>(&self, op: FilterOperator, ids: I) -> FirestoreResult<Query>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.with_filter(QueryPredicate::document_ids(op, ids)?))
    }

    /// Replaces every accumulated predicate with a single `OR` composite.
    pub fn or(&self, predicates: Vec<QueryPredicate>) -> FirestoreResult<Query> {
        Ok(self.with_fresh_composite(QueryPredicate::or(predicates)?))
    }

    /// Replaces every accumulated predicate with a single `AND` composite.
    pub fn and(&self, predicates: Vec<QueryPredicate>) -> FirestoreResult<Query> {
        Ok(self.with_fresh_composite(QueryPredicate::and(predicates)?))
    }

    pub fn order_by<F: IntoFieldPath>(
        &self,
        field: F,
        direction: OrderDirection,
    ) -> FirestoreResult<Query> {
        let field = field.into_field_path()?;
        Ok(self.with_predicate(QueryPredicate::OrderBy { field, direction }))
    }

    pub fn limit(&self, limit: i32) -> FirestoreResult<Query> {
        validate_limit(limit)?;
        Ok(self.with_predicate(QueryPredicate::LimitTo(limit)))
    }

    /// Keeps the last `limit` results. Compiles to a descending scan on the
    /// document key, appended after any explicit ordering.
    pub fn limit_to_last(&self, limit: i32) -> FirestoreResult<Query> {
        validate_limit(limit)?;
        Ok(self.with_predicate(QueryPredicate::LimitToLast(limit)))
    }

    fn with_predicate(&self, predicate: QueryPredicate) -> Query {
        let mut next = self.clone();
        next.predicates.push(predicate);
        next
    }

    fn with_fresh_composite(&self, composite: QueryPredicate) -> Query {
        if !self.predicates.is_empty() {
            debug!(
                "Explicit composite filter on '{}' discards {} earlier predicate(s)",
                self.collection_id,
                self.predicates.len()
            );
        }
        let mut next = self.clone();
        next.predicates = vec![composite];
        next
    }

    /// At most one filter predicate is kept: a new filter joins an existing
    /// `AND`, or is combined with the existing filter under a new `AND`.
    fn with_filter(&self, filter: QueryPredicate) -> Query {
        let mut next = self.clone();
        let slot = next
            .predicates
            .iter()
            .position(QueryPredicate::is_composite)
            .or_else(|| next.predicates.iter().position(QueryPredicate::is_filter));

        match slot {
            Some(index) => {
                let existing = &mut next.predicates[index];
                if let QueryPredicate::And(children) = existing {
                    children.push(filter);
                } else {
                    let prior = std::mem::replace(existing, QueryPredicate::And(Vec::new()));
                    *existing = QueryPredicate::And(vec![prior, filter]);
                }
            }
            None => next.predicates.push(filter),
        }
        next
    }
}

fn validate_limit(limit: i32) -> FirestoreResult<()> {
    if limit <= 0 {
        return Err(invalid_argument(format!(
            "Query limit must be positive, got {limit}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::api::Firestore;

    fn cities() -> CollectionReference {
        Firestore::for_project("demo").collection("cities").unwrap()
    }

    fn eq(field: &str, value: &str) -> QueryPredicate {
        QueryPredicate::field(field, FilterOperator::Equal, value).unwrap()
    }

    #[test]
    fn first_filter_is_stored_alone() {
        let query = cities().where_field("state", FilterOperator::Equal, "CA").unwrap();
        assert_eq!(query.predicates(), &[eq("state", "CA")]);
    }

    #[test]
    fn two_filters_merge_into_and() {
        let query = cities()
            .where_field("state", FilterOperator::Equal, "CA")
            .unwrap()
            .where_field("country", FilterOperator::Equal, "USA")
            .unwrap();
        assert_eq!(
            query.predicates(),
            &[QueryPredicate::And(vec![eq("state", "CA"), eq("country", "USA")])]
        );
    }

    #[test]
    fn and_composite_is_extended() {
        let query = cities()
            .where_field("a", FilterOperator::Equal, "1")
            .unwrap()
            .where_field("b", FilterOperator::Equal, "2")
            .unwrap()
            .where_field("c", FilterOperator::Equal, "3")
            .unwrap();
        assert_eq!(
            query.predicates(),
            &[QueryPredicate::And(vec![eq("a", "1"), eq("b", "2"), eq("c", "3")])]
        );
    }

    #[test]
    fn or_composite_is_wrapped_in_and() {
        let query = cities()
            .or(vec![eq("a", "1"), eq("b", "2")])
            .unwrap()
            .where_field("c", FilterOperator::Equal, "3")
            .unwrap();
        assert_eq!(
            query.predicates(),
            &[QueryPredicate::And(vec![
                QueryPredicate::Or(vec![eq("a", "1"), eq("b", "2")]),
                eq("c", "3"),
            ])]
        );
    }

    #[test]
    fn explicit_composite_starts_fresh() {
        let query = cities()
            .where_field("a", FilterOperator::Equal, "1")
            .unwrap()
            .limit(3)
            .unwrap()
            .and(vec![eq("b", "2")])
            .unwrap();
        assert_eq!(query.predicates(), &[QueryPredicate::And(vec![eq("b", "2")])]);
    }

    #[test]
    fn ordering_and_limits_do_not_merge() {
        let query = cities()
            .order_by("population", OrderDirection::Descending)
            .unwrap()
            .where_field("a", FilterOperator::Equal, "1")
            .unwrap()
            .limit_to_last(5)
            .unwrap();
        assert_eq!(query.predicates().len(), 3);
        assert!(matches!(query.predicates()[2], QueryPredicate::LimitToLast(5)));
    }

    #[test]
    fn builders_leave_original_untouched() {
        let base = cities().query();
        let _ = base.limit(1).unwrap();
        assert!(base.predicates().is_empty());
    }

    #[test]
    fn list_operators_require_arrays() {
        let err = cities()
            .where_field("state", FilterOperator::In, "CA")
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
        assert!(cities()
            .where_field("state", FilterOperator::In, ["CA", "WA"])
            .is_ok());
        assert!(cities()
            .where_field("state", FilterOperator::NotIn, Vec::<String>::new())
            .is_err());
        assert!(cities()
            .where_document_id(FilterOperator::In, "sf")
            .is_err());
        assert!(cities()
            .where_document_ids(FilterOperator::Equal, ["sf"])
            .is_err());
    }

    #[test]
    fn empty_document_ids_fail_at_construction() {
        let err = cities()
            .where_document_id(FilterOperator::Equal, "")
            .unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-path");
        assert!(cities()
            .where_document_ids(FilterOperator::In, ["sf", "/"])
            .is_err());
        assert!(QueryPredicate::document_id(FilterOperator::NotEqual, "sf").is_ok());
    }

    #[test]
    fn rejects_bad_limits_and_empty_composites() {
        assert!(cities().limit(0).is_err());
        assert!(cities().or(Vec::new()).is_err());
        let order = QueryPredicate::OrderBy {
            field: FieldPath::from_dot_separated("a").unwrap(),
            direction: OrderDirection::Ascending,
        };
        assert!(cities().and(vec![order]).is_err());
    }

    #[test]
    fn nested_collection_query_keeps_parent() {
        let posts = Firestore::for_project("demo")
            .collection("users/alice/posts")
            .unwrap()
            .query();
        assert_eq!(posts.parent_path().canonical_string(), "users/alice");
        assert_eq!(
            posts.parent_resource_name(),
            "projects/demo/databases/(default)/documents/users/alice"
        );
        assert_eq!(posts.collection_path().canonical_string(), "users/alice/posts");
    }
}
