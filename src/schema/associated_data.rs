//! Associated data schema

use serde::{Deserialize, Serialize};

use crate::error::{ObjectKind, Result};
use crate::memo::Memo;
use crate::naming::{validate_name, NameVariants, NamingConvention};
use crate::types::ValueType;

/// Definition of one associated data slot
///
/// Associated data is never indexed; its type may be a [`crate::types::ComplexDataObject`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedDataSchema {
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) deprecation_notice: Option<String>,
    #[serde(rename = "type")]
    pub(crate) data_type: ValueType,
    #[serde(default)]
    pub(crate) localized: bool,
    #[serde(default)]
    pub(crate) nullable: bool,
    #[serde(skip)]
    variants: Memo<NameVariants>,
}

impl AssociatedDataSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<ValueType>) -> Self {
        Self {
            name: name.into(),
            description: None,
            deprecation_notice: None,
            data_type: data_type.into(),
            localized: false,
            nullable: false,
            variants: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn deprecation_notice(&self) -> Option<&str> {
        self.deprecation_notice.as_deref()
    }

    pub fn data_type(&self) -> ValueType {
        self.data_type
    }

    pub fn is_localized(&self) -> bool {
        self.localized
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn name_variants(&self) -> &NameVariants {
        self.variants.get_or_init(|| NameVariants::generate(&self.name))
    }

    pub fn name_variant(&self, convention: NamingConvention) -> &str {
        self.name_variants().get(convention)
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Memo::new(),
            ..self
        }
    }

    pub fn with_description(self, description: Option<String>) -> Self {
        Self { description, ..self }
    }

    pub fn with_deprecation_notice(self, deprecation_notice: Option<String>) -> Self {
        Self {
            deprecation_notice,
            ..self
        }
    }

    pub fn with_type(self, data_type: ValueType) -> Self {
        Self { data_type, ..self }
    }

    pub fn with_localized(self, localized: bool) -> Self {
        Self { localized, ..self }
    }

    pub fn with_nullable(self, nullable: bool) -> Self {
        Self { nullable, ..self }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(ObjectKind::AssociatedData, &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarType;

    #[test]
    fn test_complex_type_allowed() {
        let schema = AssociatedDataSchema::new("technicalSheet", ScalarType::ComplexDataObject)
            .with_localized(true);
        assert!(schema.validate().is_ok());
        assert!(schema.data_type().is_complex());
        assert!(schema.is_localized());
    }

    #[test]
    fn test_reserved_name_rejected() {
        let schema = AssociatedDataSchema::new("locale", ScalarType::String);
        assert!(matches!(
            schema.validate(),
            Err(crate::error::SchemaError::InvalidName { .. })
        ));
    }
}
