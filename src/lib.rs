//! Server-side building blocks for Cloud Firestore.
//!
//! The crate covers everything between a Rust value and a Firestore REST
//! request body: document and collection references, a serde codec to and
//! from [`firestore::FirestoreValue`], field transform extraction for writes,
//! and a query builder that compiles to a `StructuredQuery`. It performs no
//! network I/O; callers send the rendered JSON with the HTTP client of their
//! choice.
//!
//! ```
//! use firestore_admin_core::firestore::{FilterOperator, Firestore, OrderDirection};
//!
//! let firestore = Firestore::for_project("demo");
//! let query = firestore
//!     .collection("cities")?
//!     .where_field("population", FilterOperator::GreaterThan, 1_000_000)?
//!     .order_by("population", OrderDirection::Descending)?
//!     .limit(5)?;
//! let body = firestore.serializer().encode_run_query_body(&query)?;
//! assert_eq!(body["structuredQuery"]["limit"], 5);
//! # Ok::<(), firestore_admin_core::firestore::FirestoreError>(())
//! ```

pub mod firestore;
