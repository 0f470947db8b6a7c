//! Attribute schema
//!
//! One record describes attributes in all three places they can be defined: on an entity
//! type, on a reference, and catalog-wide (global). Scope specific settings live in
//! optional extensions instead of a type hierarchy.

use serde::{Deserialize, Serialize};

use crate::error::{ObjectKind, Result, SchemaError};
use crate::memo::Memo;
use crate::naming::{validate_name, NameVariants, NamingConvention};
use crate::types::{ScalarType, Value, ValueType};

/// Uniqueness of an attribute within one entity collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeUniquenessType {
    #[default]
    NotUnique,
    UniqueWithinCollection,
    /// Unique among values of the same locale
    UniqueWithinCollectionLocale,
}

/// Uniqueness of a global attribute across the whole catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GlobalAttributeUniquenessType {
    #[default]
    NotUnique,
    UniqueWithinCatalog,
    UniqueWithinCatalogLocale,
}

/// Where an attribute schema is defined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeScope {
    Entity,
    /// Attributes of a reference; `indexed` tells whether the owning reference is indexed
    Reference { indexed: bool },
    Catalog,
}

/// Settings only entity-level (and global) attributes have
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityAttributeExtension {
    /// Representative attributes identify the entity in human readable listings
    pub representative: bool,
}

/// Settings only catalog-level (global) attributes have
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalAttributeExtension {
    pub global_uniqueness: GlobalAttributeUniquenessType,
}

/// Definition of one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) deprecation_notice: Option<String>,
    #[serde(rename = "type")]
    pub(crate) attribute_type: ValueType,
    #[serde(default)]
    pub(crate) uniqueness: AttributeUniquenessType,
    #[serde(default)]
    pub(crate) filterable: bool,
    #[serde(default)]
    pub(crate) sortable: bool,
    #[serde(default)]
    pub(crate) localized: bool,
    #[serde(default)]
    pub(crate) nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) default_value: Option<Value>,
    #[serde(default)]
    pub(crate) indexed_decimal_places: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) entity_scope: Option<EntityAttributeExtension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) global_scope: Option<GlobalAttributeExtension>,
    #[serde(skip)]
    variants: Memo<NameVariants>,
}

impl AttributeSchema {
    /// Create a plain attribute: not unique, not filterable, not sortable, not localized,
    /// not nullable, no default
    pub fn new(name: impl Into<String>, attribute_type: impl Into<ValueType>) -> Self {
        Self {
            name: name.into(),
            description: None,
            deprecation_notice: None,
            attribute_type: attribute_type.into(),
            uniqueness: AttributeUniquenessType::NotUnique,
            filterable: false,
            sortable: false,
            localized: false,
            nullable: false,
            default_value: None,
            indexed_decimal_places: 0,
            entity_scope: None,
            global_scope: None,
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

    pub fn attribute_type(&self) -> ValueType {
        self.attribute_type
    }

    pub fn uniqueness(&self) -> AttributeUniquenessType {
        self.uniqueness
    }

    pub fn is_unique(&self) -> bool {
        self.uniqueness != AttributeUniquenessType::NotUnique
    }

    pub fn is_unique_within_locale(&self) -> bool {
        self.uniqueness == AttributeUniquenessType::UniqueWithinCollectionLocale
    }

    pub fn is_filterable(&self) -> bool {
        self.filterable
    }

    pub fn is_sortable(&self) -> bool {
        self.sortable
    }

    pub fn is_localized(&self) -> bool {
        self.localized
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn indexed_decimal_places(&self) -> u32 {
        self.indexed_decimal_places
    }

    pub fn is_representative(&self) -> bool {
        self.entity_scope.is_some_and(|e| e.representative)
    }

    /// Global attributes are defined at catalog level
    pub fn is_global(&self) -> bool {
        self.global_scope.is_some()
    }

    pub fn global_uniqueness(&self) -> Option<GlobalAttributeUniquenessType> {
        self.global_scope.map(|g| g.global_uniqueness)
    }

    pub fn is_globally_unique(&self) -> bool {
        self.global_uniqueness()
            .is_some_and(|u| u != GlobalAttributeUniquenessType::NotUnique)
    }

    /// Whether the attribute participates in any index
    pub fn is_indexed(&self) -> bool {
        self.filterable || self.sortable || self.is_unique() || self.is_globally_unique()
    }

    pub fn name_variants(&self) -> &NameVariants {
        self.variants.get_or_init(|| NameVariants::generate(&self.name))
    }

    pub fn name_variant(&self, convention: NamingConvention) -> &str {
        self.name_variants().get(convention)
    }

    // --- Copy-on-write setters ---

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

    pub fn with_type(self, attribute_type: ValueType, indexed_decimal_places: u32) -> Self {
        Self {
            attribute_type,
            indexed_decimal_places,
            ..self
        }
    }

    pub fn with_uniqueness(self, uniqueness: AttributeUniquenessType) -> Self {
        Self { uniqueness, ..self }
    }

    pub fn with_filterable(self, filterable: bool) -> Self {
        Self { filterable, ..self }
    }

    pub fn with_sortable(self, sortable: bool) -> Self {
        Self { sortable, ..self }
    }

    pub fn with_localized(self, localized: bool) -> Self {
        Self { localized, ..self }
    }

    pub fn with_nullable(self, nullable: bool) -> Self {
        Self { nullable, ..self }
    }

    pub fn with_default_value(self, default_value: Option<Value>) -> Self {
        Self {
            default_value,
            ..self
        }
    }

    pub fn with_indexed_decimal_places(self, indexed_decimal_places: u32) -> Self {
        Self {
            indexed_decimal_places,
            ..self
        }
    }

    pub fn with_representative(self, representative: bool) -> Self {
        Self {
            entity_scope: (representative || self.global_scope.is_some())
                .then_some(EntityAttributeExtension { representative }),
            ..self
        }
    }

    /// Turn the attribute into a global (catalog-level) one
    pub fn with_global_uniqueness(self, global_uniqueness: GlobalAttributeUniquenessType) -> Self {
        Self {
            entity_scope: Some(self.entity_scope.unwrap_or_default()),
            global_scope: Some(GlobalAttributeExtension { global_uniqueness }),
            ..self
        }
    }

    /// Check the attribute's own invariants
    pub fn validate(&self) -> Result<()> {
        validate_name(ObjectKind::Attribute, &self.name)?;

        if self.attribute_type.is_complex() {
            return Err(SchemaError::invariant(format!(
                "attribute `{}` cannot be of type {}; use associated data instead",
                self.name, self.attribute_type
            )));
        }
        if self.sortable && self.attribute_type.is_array() {
            return Err(SchemaError::invariant(format!(
                "attribute `{}` is an array ({}) and cannot be sortable",
                self.name, self.attribute_type
            )));
        }
        if self.sortable
            && self.attribute_type.scalar_type() == ScalarType::BigDecimal
            && self.indexed_decimal_places == 0
        {
            return Err(SchemaError::invariant(format!(
                "sortable decimal attribute `{}` must specify indexed decimal places",
                self.name
            )));
        }
        if self.is_unique_within_locale() && !self.localized {
            return Err(SchemaError::invariant(format!(
                "attribute `{}` is unique within locale but not localized",
                self.name
            )));
        }
        if self.global_uniqueness() == Some(GlobalAttributeUniquenessType::UniqueWithinCatalogLocale)
            && !self.localized
        {
            return Err(SchemaError::invariant(format!(
                "attribute `{}` is globally unique within locale but not localized",
                self.name
            )));
        }
        if let Some(default) = &self.default_value {
            default.check_supported()?;
            if !default.conforms_to(&self.attribute_type) {
                return Err(SchemaError::type_mismatch(
                    &self.name,
                    self.attribute_type,
                    default.type_label(),
                ));
            }
        }
        Ok(())
    }

    /// Check invariants that depend on where the attribute is defined
    pub fn validate_in(&self, scope: AttributeScope) -> Result<()> {
        self.validate()?;
        match scope {
            AttributeScope::Reference { indexed } => {
                if self.entity_scope.is_some() || self.global_scope.is_some() {
                    return Err(SchemaError::invariant(format!(
                        "reference attribute `{}` cannot be representative or global",
                        self.name
                    )));
                }
                if !indexed && self.is_indexed() {
                    return Err(SchemaError::invariant(format!(
                        "attribute `{}` cannot be filterable, sortable or unique on a non-indexed reference",
                        self.name
                    )));
                }
            }
            AttributeScope::Entity => {}
            AttributeScope::Catalog => {
                if self.global_scope.is_none() {
                    return Err(SchemaError::invariant(format!(
                        "catalog attribute `{}` must be global",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_plain_attribute() {
        let attr = AttributeSchema::new("code", ScalarType::String);
        assert!(attr.validate().is_ok());
        assert!(!attr.is_indexed());
        assert!(!attr.is_global());
        assert_eq!(attr.name_variant(NamingConvention::UpperSnakeCase), "CODE");
    }

    #[test]
    fn test_array_cannot_be_sortable() {
        let attr = AttributeSchema::new("tags", ValueType::array_of(ScalarType::String)).with_sortable(true);
        assert!(attr.validate().unwrap_err().is_invariant_violation());
    }

    #[test]
    fn test_sortable_decimal_requires_places() {
        let attr = AttributeSchema::new("weight", ScalarType::BigDecimal).with_sortable(true);
        assert!(attr.validate().is_err());
        assert!(attr.with_indexed_decimal_places(2).validate().is_ok());
    }

    #[test]
    fn test_default_value_type_checked() {
        let attr = AttributeSchema::new("priority", ScalarType::Long).with_default_value(Some(Value::from("x")));
        assert!(attr.validate().unwrap_err().is_type_mismatch());

        let attr = AttributeSchema::new("ratio", ScalarType::BigDecimal)
            .with_default_value(Some(Value::from(Decimal::new(15, 1))));
        assert!(attr.validate().is_ok());
    }

    #[test]
    fn test_locale_uniqueness_requires_localized() {
        let attr = AttributeSchema::new("url", ScalarType::String)
            .with_uniqueness(AttributeUniquenessType::UniqueWithinCollectionLocale);
        assert!(attr.validate().is_err());
        assert!(attr.with_localized(true).validate().is_ok());
    }

    #[test]
    fn test_scope_rules() {
        let filterable = AttributeSchema::new("order", ScalarType::Integer).with_filterable(true);
        assert!(filterable.validate_in(AttributeScope::Reference { indexed: false }).is_err());
        assert!(filterable.validate_in(AttributeScope::Reference { indexed: true }).is_ok());
        assert!(filterable.validate_in(AttributeScope::Catalog).is_err());

        let global = filterable.with_global_uniqueness(GlobalAttributeUniquenessType::UniqueWithinCatalog);
        assert!(global.is_global());
        assert!(global.is_globally_unique());
        assert!(global.validate_in(AttributeScope::Catalog).is_ok());
    }

    #[test]
    fn test_rename_refreshes_variants() {
        let attr = AttributeSchema::new("code", ScalarType::String);
        assert_eq!(attr.name_variant(NamingConvention::PascalCase), "Code");
        let renamed = attr.with_name("codeName");
        assert_eq!(renamed.name_variant(NamingConvention::PascalCase), "CodeName");
    }
}
