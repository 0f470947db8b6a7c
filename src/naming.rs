//! Naming Conventions
//!
//! Every named schema object is reachable under several casing variants of its name, so
//! that generated API surfaces (GraphQL, REST, client code) can use their native casing
//! and still resolve to the canonical object:
//! - Variant generation for all supported conventions
//! - Name validation (shape and reserved keywords)
//! - Collision detection between two names that share a variant
//!
//! Indexes are built once per schema instance; schemas are queried far more often than
//! they are built.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ObjectKind, Result, SchemaError};

// =============================================================================
// Naming Convention
// =============================================================================

/// A casing convention a name can be rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NamingConvention {
    /// `codeName`
    CamelCase,
    /// `CodeName`
    PascalCase,
    /// `code_name`
    SnakeCase,
    /// `CODE_NAME`
    UpperSnakeCase,
    /// `code-name`
    KebabCase,
}

impl NamingConvention {
    pub const ALL: [NamingConvention; 5] = [
        NamingConvention::CamelCase,
        NamingConvention::PascalCase,
        NamingConvention::SnakeCase,
        NamingConvention::UpperSnakeCase,
        NamingConvention::KebabCase,
    ];

    /// Render a name in this convention
    pub fn apply(&self, name: &str) -> String {
        match self {
            NamingConvention::CamelCase => name.to_lower_camel_case(),
            NamingConvention::PascalCase => name.to_upper_camel_case(),
            NamingConvention::SnakeCase => name.to_snake_case(),
            NamingConvention::UpperSnakeCase => name.to_shouty_snake_case(),
            NamingConvention::KebabCase => name.to_kebab_case(),
        }
    }
}

impl fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NamingConvention::CamelCase => "camelCase",
            NamingConvention::PascalCase => "PascalCase",
            NamingConvention::SnakeCase => "snake_case",
            NamingConvention::UpperSnakeCase => "UPPER_SNAKE_CASE",
            NamingConvention::KebabCase => "kebab-case",
        };
        f.write_str(label)
    }
}

// =============================================================================
// Name Variants
// =============================================================================

/// All casing variants of a single name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameVariants {
    variants: BTreeMap<NamingConvention, String>,
}

impl NameVariants {
    pub fn generate(name: &str) -> Self {
        let variants = NamingConvention::ALL
            .iter()
            .map(|convention| (*convention, convention.apply(name)))
            .collect();
        Self { variants }
    }

    /// Get the variant for a convention
    pub fn get(&self, convention: NamingConvention) -> &str {
        self.variants
            .get(&convention)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NamingConvention, &str)> {
        self.variants.iter().map(|(c, v)| (*c, v.as_str()))
    }
}

// =============================================================================
// Name Validation
// =============================================================================

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_\-.:]*$").expect("name pattern is a valid regex")
});

/// Names (compared in camelCase) that collide with built-in query and API constructs.
const RESERVED_KEYWORDS: &[&str] = &[
    "primaryKey",
    "locale",
    "locales",
    "entity",
    "entities",
    "catalog",
    "attribute",
    "attributes",
    "associatedData",
    "reference",
    "references",
    "price",
    "prices",
    "priceForSale",
    "hierarchy",
    "parent",
    "facet",
    "version",
    "scope",
];

/// Validate a schema object name.
pub fn validate_name(kind: ObjectKind, name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(SchemaError::InvalidName {
            name: name.to_string(),
            reason: format!("{kind} names {reason}"),
        })
    };

    if name.is_empty() {
        return invalid("must not be empty");
    }
    if name.trim() != name {
        return invalid("must not start or end with whitespace");
    }
    if !NAME_PATTERN.is_match(name) {
        return invalid("must start with a letter and contain only letters, digits, `_`, `-`, `.` or `:`");
    }
    let camel = name.to_lower_camel_case();
    if RESERVED_KEYWORDS.contains(&camel.as_str()) {
        return invalid("must not be a reserved keyword");
    }
    Ok(())
}

/// Fail if `name` shares a variant with any other name in `existing`.
///
/// The same canonical name is not a conflict: replacing an object with itself is handled
/// by the create/modify logic, not here.
pub fn ensure_no_conflict<'a>(
    kind: ObjectKind,
    name: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let variants = NameVariants::generate(name);
    for other in existing {
        if other == name {
            continue;
        }
        let other_variants = NameVariants::generate(other);
        for (convention, variant) in variants.iter() {
            if other_variants.get(convention) == variant {
                return Err(SchemaError::NameConflict {
                    kind,
                    name: name.to_string(),
                    existing: other.to_string(),
                    convention,
                });
            }
        }
    }
    Ok(())
}

// =============================================================================
// Name Index
// =============================================================================

/// Lookup from (convention, variant) to canonical name
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    by_variant: HashMap<(NamingConvention, String), String>,
}

impl NameIndex {
    pub fn build<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut by_variant = HashMap::new();
        for name in names {
            for (convention, variant) in NameVariants::generate(name).iter() {
                by_variant.insert((convention, variant.to_string()), name.to_string());
            }
        }
        Self { by_variant }
    }

    /// Resolve a variant in a convention back to the canonical name
    pub fn resolve(&self, variant: &str, convention: NamingConvention) -> Option<&str> {
        self.by_variant
            .get(&(convention, variant.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_variant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_variant.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants() {
        let variants = NameVariants::generate("codeName");
        assert_eq!(variants.get(NamingConvention::CamelCase), "codeName");
        assert_eq!(variants.get(NamingConvention::PascalCase), "CodeName");
        assert_eq!(variants.get(NamingConvention::SnakeCase), "code_name");
        assert_eq!(variants.get(NamingConvention::UpperSnakeCase), "CODE_NAME");
        assert_eq!(variants.get(NamingConvention::KebabCase), "code-name");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name(ObjectKind::Attribute, "code").is_ok());
        assert!(validate_name(ObjectKind::Attribute, "code-name").is_ok());
        assert!(validate_name(ObjectKind::Attribute, "").is_err());
        assert!(validate_name(ObjectKind::Attribute, " code").is_err());
        assert!(validate_name(ObjectKind::Attribute, "1code").is_err());
        assert!(validate_name(ObjectKind::Attribute, "primary_key").is_err());
        assert!(validate_name(ObjectKind::Attribute, "Locale").is_err());
    }

    #[test]
    fn test_conflict_detection() {
        let err = ensure_no_conflict(ObjectKind::Attribute, "code-name", ["codeName", "ean"])
            .unwrap_err();
        assert!(matches!(err, SchemaError::NameConflict { ref existing, .. } if existing == "codeName"));

        assert!(ensure_no_conflict(ObjectKind::Attribute, "codeName", ["codeName"]).is_ok());
        assert!(ensure_no_conflict(ObjectKind::Attribute, "title", ["codeName"]).is_ok());
    }

    #[test]
    fn test_index_resolution() {
        let index = NameIndex::build(["codeName", "ean"]);
        assert_eq!(index.resolve("CODE_NAME", NamingConvention::UpperSnakeCase), Some("codeName"));
        assert_eq!(index.resolve("code-name", NamingConvention::KebabCase), Some("codeName"));
        assert_eq!(index.resolve("code-name", NamingConvention::SnakeCase), None);
        assert_eq!(index.resolve("Ean", NamingConvention::PascalCase), Some("ean"));
    }
}
