use std::error::Error;
use std::fmt::{self, Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FirestoreErrorCode {
    InvalidPath,
    TypeMismatch,
    MissingField,
    UnsupportedValue,
    InvalidArgument,
    Internal,
}

impl FirestoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirestoreErrorCode::InvalidPath => "firestore/invalid-path",
            FirestoreErrorCode::TypeMismatch => "firestore/type-mismatch",
            FirestoreErrorCode::MissingField => "firestore/missing-field",
            FirestoreErrorCode::UnsupportedValue => "firestore/unsupported-value",
            FirestoreErrorCode::InvalidArgument => "firestore/invalid-argument",
            FirestoreErrorCode::Internal => "firestore/internal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct FirestoreError {
    pub code: FirestoreErrorCode,
    message: String,
    /// Field trail (outermost first) of the value that caused the error.
    path: Vec<String>,
}

impl FirestoreError {
    pub fn new(code: FirestoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: Vec::new(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Dotted rendering of [`FirestoreError::path`], e.g. `nested.items.1`.
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }

    /// Prefixes the error's field trail with `segment`.
    ///
    /// Called by the codec while an error unwinds out of a nested map or array
    /// so the final trail reads from the document root.
    pub(crate) fn within(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }
}

impl Display for FirestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} ({})", self.message, self.code_str())
        } else {
            write!(
                f,
                "{} at '{}' ({})",
                self.message,
                self.path_string(),
                self.code_str()
            )
        }
    }
}

impl Error for FirestoreError {}

impl serde::ser::Error for FirestoreError {
    fn custom<T: Display>(msg: T) -> Self {
        invalid_argument(msg.to_string())
    }
}

impl serde::de::Error for FirestoreError {
    fn custom<T: Display>(msg: T) -> Self {
        invalid_argument(msg.to_string())
    }

    fn invalid_type(unexpected: serde::de::Unexpected, expected: &dyn serde::de::Expected) -> Self {
        type_mismatch(expected.to_string(), unexpected.to_string())
    }

    fn invalid_value(unexpected: serde::de::Unexpected, expected: &dyn serde::de::Expected) -> Self {
        type_mismatch(expected.to_string(), unexpected.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        missing_field(field)
    }
}

pub type FirestoreResult<T> = Result<T, FirestoreError>;

pub fn invalid_path(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::InvalidPath, message)
}

pub fn type_mismatch(expected: impl Display, found: impl Display) -> FirestoreError {
    FirestoreError::new(
        FirestoreErrorCode::TypeMismatch,
        format!("Expected {expected}, found {found}"),
    )
}

pub fn missing_field(field: impl Into<String>) -> FirestoreError {
    let field = field.into();
    FirestoreError::new(
        FirestoreErrorCode::MissingField,
        format!("Missing required field '{field}'"),
    )
    .within(field)
}

pub fn unsupported_value(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::UnsupportedValue, message)
}

pub fn invalid_argument(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::Internal, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_trail_and_code() {
        let err = type_mismatch("a boolean", "string \"x\"")
            .within("flag")
            .within("settings");
        assert_eq!(err.path_string(), "settings.flag");
        assert_eq!(
            err.to_string(),
            "Expected a boolean, found string \"x\" at 'settings.flag' (firestore/type-mismatch)"
        );
    }

    #[test]
    fn missing_field_starts_trail_at_field() {
        let err = missing_field("name").within("owner");
        assert_eq!(err.code, FirestoreErrorCode::MissingField);
        assert_eq!(err.path(), ["owner", "name"]);
    }
}
