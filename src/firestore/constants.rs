pub(crate) const DEFAULT_DATABASE_ID: &str = "(default)";

/// Reserved field path that addresses a document's own resource name.
pub(crate) const DOCUMENT_ID_FIELD: &str = "__name__";

pub(crate) const AUTO_ID_LENGTH: usize = 20;

pub(crate) const MAX_BATCH_WRITES: usize = 500;
