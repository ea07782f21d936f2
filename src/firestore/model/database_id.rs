use std::fmt::{Display, Formatter};

use crate::firestore::constants::DEFAULT_DATABASE_ID;
use crate::firestore::error::{invalid_argument, invalid_path, FirestoreResult};
use crate::firestore::model::ResourcePath;

/// Identifies one Firestore database (`projects/{project}/databases/{database}`).
///
/// This is the only piece of connection context the translation layer needs;
/// it is supplied by whoever owns credentials and transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatabaseId {
    project_id: String,
    database: String,
}

impl DatabaseId {
    pub fn new(project_id: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: database.into(),
        }
    }

    pub fn default(project_id: impl Into<String>) -> Self {
        Self::new(project_id, DEFAULT_DATABASE_ID)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self::new(self.project_id.clone(), database)
    }

    pub fn is_default_database(&self) -> bool {
        self.database == DEFAULT_DATABASE_ID
    }

    /// `projects/{project}/databases/{database}`
    pub fn database_name(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database)
    }

    /// `projects/{project}/databases/{database}/documents`
    pub fn documents_root(&self) -> String {
        format!("{}/documents", self.database_name())
    }

    /// Fully-qualified resource name for a path relative to the documents root.
    pub fn resource_name(&self, path: &ResourcePath) -> String {
        if path.is_empty() {
            self.documents_root()
        } else {
            format!("{}/{}", self.documents_root(), path.canonical_string())
        }
    }

    /// Splits a fully-qualified resource name into its database and the path
    /// below `documents`.
    pub fn parse_resource_name(name: &str) -> FirestoreResult<(DatabaseId, ResourcePath)> {
        let path = ResourcePath::from_string(name);
        let well_formed = path.len() >= 5
            && path.get(0) == Some("projects")
            && path.get(2) == Some("databases")
            && path.get(4) == Some("documents");
        if !well_formed {
            return Err(invalid_path(format!(
                "'{name}' is not a Firestore resource name (projects/{{p}}/databases/{{d}}/documents/...)"
            )));
        }
        let project = path.get(1).unwrap_or_default();
        let database = path.get(3).unwrap_or_default();
        if project.is_empty() || database.is_empty() {
            return Err(invalid_argument("Resource name has an empty project or database"));
        }
        Ok((DatabaseId::new(project, database), path.pop_first_n(5)))
    }
}

impl Display for DatabaseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.database_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_resource_names() {
        let db = DatabaseId::default("project");
        assert_eq!(db.database(), DEFAULT_DATABASE_ID);
        assert_eq!(db.database_name(), "projects/project/databases/(default)");
        assert_eq!(
            db.resource_name(&ResourcePath::from_string("cities/sf")),
            "projects/project/databases/(default)/documents/cities/sf"
        );
    }

    #[test]
    fn parses_resource_name() {
        let (db, path) =
            DatabaseId::parse_resource_name("projects/p/databases/other/documents/rooms/eros")
                .unwrap();
        assert_eq!(db, DatabaseId::new("p", "other"));
        assert_eq!(path.canonical_string(), "rooms/eros");
    }

    #[test]
    fn rejects_foreign_names() {
        let err = DatabaseId::parse_resource_name("rooms/eros").unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-path");
    }
}
