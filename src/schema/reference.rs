//! Reference schema: a typed relation from an entity to other entities

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::attribute::{AttributeSchema, AttributeScope};
use super::compound::SortableAttributeCompoundSchema;
use super::{check_attribute_namespace, index_names, lookup_by_variant};
use crate::error::{ObjectKind, Result, SchemaError};
use crate::memo::Memo;
use crate::naming::{validate_name, NameIndex, NameVariants, NamingConvention};

/// How many references of one kind an entity may hold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    ZeroOrOne,
    ExactlyOne,
    #[default]
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    pub fn allows_many(&self) -> bool {
        matches!(self, Cardinality::ZeroOrMore | Cardinality::OneOrMore)
    }

    pub fn is_mandatory(&self) -> bool {
        matches!(self, Cardinality::ExactlyOne | Cardinality::OneOrMore)
    }
}

#[derive(Debug, Clone, Default)]
struct ReferenceIndexes {
    attributes: NameIndex,
    compounds: NameIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSchema {
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) deprecation_notice: Option<String>,
    #[serde(default)]
    pub(crate) cardinality: Cardinality,
    pub(crate) referenced_entity_type: String,
    /// Managed types are entity collections of the same catalog; external ones are not
    #[serde(default)]
    pub(crate) referenced_entity_type_managed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) referenced_group_type: Option<String>,
    #[serde(default)]
    pub(crate) referenced_group_type_managed: bool,
    #[serde(default)]
    pub(crate) indexed: bool,
    #[serde(default)]
    pub(crate) faceted: bool,
    #[serde(default)]
    pub(crate) attributes: BTreeMap<String, AttributeSchema>,
    #[serde(default)]
    pub(crate) sortable_attribute_compounds: BTreeMap<String, SortableAttributeCompoundSchema>,
    #[serde(skip)]
    variants: Memo<NameVariants>,
    #[serde(skip)]
    entity_type_variants: Memo<NameVariants>,
    #[serde(skip)]
    indexes: Memo<ReferenceIndexes>,
}

impl ReferenceSchema {
    pub fn new(
        name: impl Into<String>,
        referenced_entity_type: impl Into<String>,
        referenced_entity_type_managed: bool,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            deprecation_notice: None,
            cardinality,
            referenced_entity_type: referenced_entity_type.into(),
            referenced_entity_type_managed,
            referenced_group_type: None,
            referenced_group_type_managed: false,
            indexed: false,
            faceted: false,
            attributes: BTreeMap::new(),
            sortable_attribute_compounds: BTreeMap::new(),
            variants: Memo::new(),
            entity_type_variants: Memo::new(),
            indexes: Memo::ready(ReferenceIndexes::default()),
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

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn referenced_entity_type(&self) -> &str {
        &self.referenced_entity_type
    }

    pub fn is_referenced_entity_type_managed(&self) -> bool {
        self.referenced_entity_type_managed
    }

    pub fn referenced_group_type(&self) -> Option<&str> {
        self.referenced_group_type.as_deref()
    }

    pub fn is_referenced_group_type_managed(&self) -> bool {
        self.referenced_group_type_managed
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_faceted(&self) -> bool {
        self.faceted
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeSchema> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    pub fn attribute_by_name(&self, variant: &str, convention: NamingConvention) -> Option<&AttributeSchema> {
        lookup_by_variant(&self.attributes, &self.indexes().attributes, variant, convention)
    }

    pub fn sortable_attribute_compounds(&self) -> &BTreeMap<String, SortableAttributeCompoundSchema> {
        &self.sortable_attribute_compounds
    }

    pub fn sortable_attribute_compound(&self, name: &str) -> Option<&SortableAttributeCompoundSchema> {
        self.sortable_attribute_compounds.get(name)
    }

    pub fn sortable_attribute_compound_by_name(
        &self,
        variant: &str,
        convention: NamingConvention,
    ) -> Option<&SortableAttributeCompoundSchema> {
        lookup_by_variant(
            &self.sortable_attribute_compounds,
            &self.indexes().compounds,
            variant,
            convention,
        )
    }

    pub fn name_variants(&self) -> &NameVariants {
        self.variants.get_or_init(|| NameVariants::generate(&self.name))
    }

    pub fn name_variant(&self, convention: NamingConvention) -> &str {
        self.name_variants().get(convention)
    }

    /// Variants of the referenced entity type, used for generated accessors
    pub fn entity_type_name_variants(&self) -> &NameVariants {
        self.entity_type_variants
            .get_or_init(|| NameVariants::generate(&self.referenced_entity_type))
    }

    fn indexes(&self) -> &ReferenceIndexes {
        self.indexes.get_or_init(|| ReferenceIndexes {
            attributes: index_names(&self.attributes),
            compounds: index_names(&self.sortable_attribute_compounds),
        })
    }

    /// Whether `requested` describes this reference. Its own settings must be equal, and every
    /// nested attribute or compound it carries must exist here unchanged. Nested objects that
    /// `requested` leaves out are not compared.
    pub(crate) fn same_definition(&self, requested: &Self) -> bool {
        self.same_settings(requested)
            && requested
                .attributes
                .iter()
                .all(|(name, attribute)| self.attributes.get(name) == Some(attribute))
            && requested
                .sortable_attribute_compounds
                .iter()
                .all(|(name, compound)| self.sortable_attribute_compounds.get(name) == Some(compound))
    }

    fn same_settings(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.deprecation_notice == other.deprecation_notice
            && self.cardinality == other.cardinality
            && self.referenced_entity_type == other.referenced_entity_type
            && self.referenced_entity_type_managed == other.referenced_entity_type_managed
            && self.referenced_group_type == other.referenced_group_type
            && self.referenced_group_type_managed == other.referenced_group_type_managed
            && self.indexed == other.indexed
            && self.faceted == other.faceted
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

    pub fn with_cardinality(self, cardinality: Cardinality) -> Self {
        Self { cardinality, ..self }
    }

    pub fn with_referenced_entity_type(self, entity_type: impl Into<String>, managed: bool) -> Self {
        Self {
            referenced_entity_type: entity_type.into(),
            referenced_entity_type_managed: managed,
            entity_type_variants: Memo::new(),
            ..self
        }
    }

    pub fn with_referenced_group_type(self, group_type: Option<String>, managed: bool) -> Self {
        Self {
            referenced_group_type_managed: managed && group_type.is_some(),
            referenced_group_type: group_type,
            ..self
        }
    }

    pub fn with_indexed(self, indexed: bool) -> Self {
        Self { indexed, ..self }
    }

    pub fn with_faceted(self, faceted: bool) -> Self {
        Self { faceted, ..self }
    }

    pub fn with_attributes(self, attributes: BTreeMap<String, AttributeSchema>) -> Self {
        Self {
            attributes,
            indexes: Memo::new(),
            ..self
        }
    }

    pub fn with_attribute(self, attribute: AttributeSchema) -> Self {
        let mut attributes = self.attributes.clone();
        attributes.insert(attribute.name().to_string(), attribute);
        self.with_attributes(attributes)
    }

    pub fn with_sortable_attribute_compounds(
        self,
        sortable_attribute_compounds: BTreeMap<String, SortableAttributeCompoundSchema>,
    ) -> Self {
        Self {
            sortable_attribute_compounds,
            indexes: Memo::new(),
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(ObjectKind::Reference, &self.name)?;
        if self.referenced_entity_type.trim().is_empty() {
            return Err(SchemaError::invariant(format!(
                "reference `{}` must name the referenced entity type",
                self.name
            )));
        }
        if self.faceted && !self.indexed {
            return Err(SchemaError::invariant(format!(
                "reference `{}` cannot be faceted without being indexed",
                self.name
            )));
        }
        for attribute in self.attributes.values() {
            attribute.validate_in(AttributeScope::Reference { indexed: self.indexed })?;
        }
        for compound in self.sortable_attribute_compounds.values() {
            compound.validate(&self.attributes)?;
        }
        check_attribute_namespace(&self.attributes, &self.sortable_attribute_compounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compound::AttributeElement;
    use crate::types::ScalarType;

    fn brand() -> ReferenceSchema {
        ReferenceSchema::new("brand", "Brand", true, Cardinality::ZeroOrOne)
    }

    #[test]
    fn test_faceted_requires_indexed() {
        assert!(brand().with_faceted(true).validate().is_err());
        assert!(brand().with_indexed(true).with_faceted(true).validate().is_ok());
    }

    #[test]
    fn test_indexed_attributes_require_indexed_reference() {
        let order = AttributeSchema::new("order", ScalarType::Integer).with_sortable(true);
        assert!(brand().with_attribute(order.clone()).validate().is_err());
        assert!(brand().with_indexed(true).with_attribute(order).validate().is_ok());
    }

    #[test]
    fn test_lookup_by_variant() {
        let reference = brand()
            .with_indexed(true)
            .with_attribute(AttributeSchema::new("brandPriority", ScalarType::Long).with_sortable(true))
            .with_attribute(AttributeSchema::new("code", ScalarType::String));
        let found = reference.attribute_by_name("brand_priority", NamingConvention::SnakeCase);
        assert_eq!(found.map(AttributeSchema::name), Some("brandPriority"));
        assert_eq!(reference.entity_type_name_variants().get(NamingConvention::SnakeCase), "brand");
    }

    #[test]
    fn test_compound_validated_against_reference_attributes() {
        let compounds = BTreeMap::from([(
            "codeOrder".to_string(),
            SortableAttributeCompoundSchema::new(
                "codeOrder",
                vec![AttributeElement::asc("code"), AttributeElement::asc("order")],
            ),
        )]);
        let reference = brand()
            .with_attribute(AttributeSchema::new("code", ScalarType::String))
            .with_sortable_attribute_compounds(compounds.clone());
        assert!(reference.validate().unwrap_err().is_not_found());

        let reference = reference.with_attribute(AttributeSchema::new("order", ScalarType::Integer));
        assert!(reference.validate().is_ok());
        assert!(reference
            .sortable_attribute_compound_by_name("CodeOrder", NamingConvention::PascalCase)
            .is_some());
    }

    #[test]
    fn test_same_definition_checks_requested_attributes() {
        let plain = brand();
        let with_attribute = brand().with_attribute(AttributeSchema::new("code", ScalarType::String));
        assert!(with_attribute.same_definition(&plain));
        assert!(with_attribute.same_definition(&with_attribute.clone()));
        assert!(!plain.same_definition(&with_attribute));
        assert!(!with_attribute
            .same_definition(&brand().with_attribute(AttributeSchema::new("code", ScalarType::Integer))));
        assert!(!plain.same_definition(&brand().with_cardinality(Cardinality::ExactlyOne)));
    }
}
