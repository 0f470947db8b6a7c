//! Error types for the schema model and its mutation engine

use std::fmt;

use thiserror::Error;

use crate::naming::NamingConvention;

/// Result type for schema and entity operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// The kind of schema or data object an error talks about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Attribute,
    AssociatedData,
    Reference,
    SortableAttributeCompound,
    EntitySchema,
    CatalogSchema,
    Price,
    Entity,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ObjectKind::Attribute => "attribute",
            ObjectKind::AssociatedData => "associated data",
            ObjectKind::Reference => "reference",
            ObjectKind::SortableAttributeCompound => "sortable attribute compound",
            ObjectKind::EntitySchema => "entity schema",
            ObjectKind::CatalogSchema => "catalog schema",
            ObjectKind::Price => "price",
            ObjectKind::Entity => "entity",
        };
        f.write_str(label)
    }
}

/// Schema model errors
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A create-style mutation hit an existing object with a different definition.
    #[error("{kind} `{name}` already exists with a different definition")]
    Conflict { kind: ObjectKind, name: String },

    /// A modify-style mutation targets an object that doesn't exist.
    #[error("{kind} `{name}` not found")]
    NotFound { kind: ObjectKind, name: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Type mismatch for `{name}`: expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("{kind} name `{name}` conflicts with existing `{existing}` in {convention} convention")]
    NameConflict {
        kind: ObjectKind,
        name: String,
        existing: String,
        convention: NamingConvention,
    },

    #[error("Invalid name `{name}`: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Entity schema `{entity_type}` version {requested} is not available (latest is {latest})")]
    VersionUnavailable {
        entity_type: String,
        requested: u32,
        latest: u32,
    },

    #[error("Entity collection `{0}` not found")]
    EntityTypeNotFound(String),

    #[error("Schema fetch failed: {0}")]
    Fetch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The version following `version`, failing once the counter is exhausted
pub(crate) fn next_version(kind: ObjectKind, name: impl fmt::Display, version: u32) -> Result<u32> {
    version
        .checked_add(1)
        .ok_or_else(|| SchemaError::invariant(format!("{kind} `{name}` cannot move past version {version}")))
}

impl SchemaError {
    pub(crate) fn conflict(kind: ObjectKind, name: impl Into<String>) -> Self {
        SchemaError::Conflict {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        SchemaError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        SchemaError::InvariantViolation(message.into())
    }

    pub(crate) fn type_mismatch(
        name: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        SchemaError::TypeMismatch {
            name: name.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SchemaError::Conflict { .. } | SchemaError::NameConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchemaError::NotFound { .. } | SchemaError::EntityTypeNotFound(_)
        )
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, SchemaError::InvariantViolation(_))
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, SchemaError::TypeMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SchemaError::conflict(ObjectKind::Attribute, "ean");
        assert_eq!(
            err.to_string(),
            "attribute `ean` already exists with a different definition"
        );
        assert!(err.is_conflict());
        assert!(!err.is_not_found());

        let err = SchemaError::not_found(ObjectKind::Reference, "brand");
        assert_eq!(err.to_string(), "reference `brand` not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = SchemaError::type_mismatch("code", "String", "Integer");
        assert!(err.is_type_mismatch());
        assert_eq!(
            err.to_string(),
            "Type mismatch for `code`: expected String, got Integer"
        );
    }
}
