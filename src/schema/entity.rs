//! Entity schema: the structure of one entity collection

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::associated_data::AssociatedDataSchema;
use super::attribute::{AttributeSchema, AttributeScope};
use super::compound::SortableAttributeCompoundSchema;
use super::reference::ReferenceSchema;
use super::{check_attribute_namespace, index_names, lookup_by_variant, AttributeSchemaProvider};
use crate::error::{next_version, ObjectKind, Result, SchemaError};
use crate::memo::Memo;
use crate::naming::{validate_name, NameIndex, NameVariants, NamingConvention};
use crate::types::{Currency, Locale};

/// Permission to extend the schema implicitly when unknown data arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionMode {
    /// Switch to generated primary keys when an entity arrives without one
    AdaptPrimaryKeyGeneration,
    AddingAttributes,
    AddingAssociatedData,
    AddingReferences,
    AddingPrices,
    AddingLocales,
    AddingCurrencies,
    AddingHierarchy,
}

impl EvolutionMode {
    pub const ALL: [EvolutionMode; 8] = [
        EvolutionMode::AdaptPrimaryKeyGeneration,
        EvolutionMode::AddingAttributes,
        EvolutionMode::AddingAssociatedData,
        EvolutionMode::AddingReferences,
        EvolutionMode::AddingPrices,
        EvolutionMode::AddingLocales,
        EvolutionMode::AddingCurrencies,
        EvolutionMode::AddingHierarchy,
    ];
}

/// Default number of decimal places prices are indexed with
pub const DEFAULT_INDEXED_PRICE_PLACES: u32 = 2;

fn default_indexed_price_places() -> u32 {
    DEFAULT_INDEXED_PRICE_PLACES
}

#[derive(Debug, Clone, Default)]
struct EntityIndexes {
    attributes: NameIndex,
    associated_data: NameIndex,
    references: NameIndex,
    compounds: NameIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub(crate) version: u32,
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) deprecation_notice: Option<String>,
    #[serde(default)]
    pub(crate) with_generated_primary_key: bool,
    #[serde(default)]
    pub(crate) with_hierarchy: bool,
    #[serde(default)]
    pub(crate) with_price: bool,
    #[serde(default = "default_indexed_price_places")]
    pub(crate) indexed_price_places: u32,
    #[serde(default)]
    pub(crate) locales: BTreeSet<Locale>,
    #[serde(default)]
    pub(crate) currencies: BTreeSet<Currency>,
    #[serde(default)]
    pub(crate) attributes: BTreeMap<String, AttributeSchema>,
    #[serde(default)]
    pub(crate) associated_data: BTreeMap<String, AssociatedDataSchema>,
    #[serde(default)]
    pub(crate) references: BTreeMap<String, ReferenceSchema>,
    #[serde(default)]
    pub(crate) evolution_mode: BTreeSet<EvolutionMode>,
    #[serde(default)]
    pub(crate) sortable_attribute_compounds: BTreeMap<String, SortableAttributeCompoundSchema>,
    #[serde(skip)]
    variants: Memo<NameVariants>,
    #[serde(skip)]
    indexes: Memo<EntityIndexes>,
}

impl EntitySchema {
    /// An empty schema at version 1 that allows every evolution mode
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_evolution(name, EvolutionMode::ALL)
    }

    /// An empty schema at version 1 with the given evolution modes
    pub fn with_evolution(name: impl Into<String>, modes: impl IntoIterator<Item = EvolutionMode>) -> Self {
        let name = name.into();
        Self {
            version: 1,
            variants: Memo::ready(NameVariants::generate(&name)),
            name,
            description: None,
            deprecation_notice: None,
            with_generated_primary_key: false,
            with_hierarchy: false,
            with_price: false,
            indexed_price_places: DEFAULT_INDEXED_PRICE_PLACES,
            locales: BTreeSet::new(),
            currencies: BTreeSet::new(),
            attributes: BTreeMap::new(),
            associated_data: BTreeMap::new(),
            references: BTreeMap::new(),
            evolution_mode: modes.into_iter().collect(),
            sortable_attribute_compounds: BTreeMap::new(),
            indexes: Memo::ready(EntityIndexes::default()),
        }
    }

    /// Derive the next version: clone, apply `change`, bump the version, rebuild indexes.
    pub(crate) fn evolve(&self, change: impl FnOnce(&mut EntitySchema)) -> Result<EntitySchema> {
        let version = next_version(ObjectKind::EntitySchema, &self.name, self.version)?;
        let mut next = self.clone();
        change(&mut next);
        next.version = version;
        next.variants = Memo::ready(NameVariants::generate(&next.name));
        next.indexes = Memo::ready(next.build_indexes());
        Ok(next)
    }

    pub fn version(&self) -> u32 {
        self.version
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

    pub fn with_generated_primary_key(&self) -> bool {
        self.with_generated_primary_key
    }

    pub fn with_hierarchy(&self) -> bool {
        self.with_hierarchy
    }

    pub fn with_price(&self) -> bool {
        self.with_price
    }

    pub fn indexed_price_places(&self) -> u32 {
        self.indexed_price_places
    }

    pub fn locales(&self) -> &BTreeSet<Locale> {
        &self.locales
    }

    pub fn currencies(&self) -> &BTreeSet<Currency> {
        &self.currencies
    }

    pub fn evolution_modes(&self) -> &BTreeSet<EvolutionMode> {
        &self.evolution_mode
    }

    pub fn allows(&self, mode: EvolutionMode) -> bool {
        self.evolution_mode.contains(&mode)
    }

    pub fn supports_locale(&self, locale: &Locale) -> bool {
        self.locales.contains(locale)
    }

    pub fn supports_currency(&self, currency: &Currency) -> bool {
        self.currencies.contains(currency)
    }

    /// Supported, or may be added implicitly
    pub fn locale_allowed(&self, locale: &Locale) -> bool {
        self.supports_locale(locale) || self.allows(EvolutionMode::AddingLocales)
    }

    pub fn currency_allowed(&self, currency: &Currency) -> bool {
        self.supports_currency(currency) || self.allows(EvolutionMode::AddingCurrencies)
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

    /// Attributes whose value must be present on every entity
    pub fn non_nullable_attributes(&self) -> impl Iterator<Item = &AttributeSchema> {
        self.attributes.values().filter(|a| !a.is_nullable())
    }

    pub fn associated_data(&self) -> &BTreeMap<String, AssociatedDataSchema> {
        &self.associated_data
    }

    pub fn associated_data_schema(&self, name: &str) -> Option<&AssociatedDataSchema> {
        self.associated_data.get(name)
    }

    pub fn associated_data_by_name(
        &self,
        variant: &str,
        convention: NamingConvention,
    ) -> Option<&AssociatedDataSchema> {
        lookup_by_variant(&self.associated_data, &self.indexes().associated_data, variant, convention)
    }

    pub fn references(&self) -> &BTreeMap<String, ReferenceSchema> {
        &self.references
    }

    pub fn reference(&self, name: &str) -> Option<&ReferenceSchema> {
        self.references.get(name)
    }

    pub fn reference_by_name(&self, variant: &str, convention: NamingConvention) -> Option<&ReferenceSchema> {
        lookup_by_variant(&self.references, &self.indexes().references, variant, convention)
    }

    /// References pointing at an entity type
    pub fn references_to<'a>(&'a self, entity_type: &'a str) -> impl Iterator<Item = &'a ReferenceSchema> {
        self.references
            .values()
            .filter(move |r| r.referenced_entity_type() == entity_type)
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

    fn indexes(&self) -> &EntityIndexes {
        self.indexes.get_or_init(|| self.build_indexes())
    }

    fn build_indexes(&self) -> EntityIndexes {
        EntityIndexes {
            attributes: index_names(&self.attributes),
            associated_data: index_names(&self.associated_data),
            references: index_names(&self.references),
            compounds: index_names(&self.sortable_attribute_compounds),
        }
    }

    /// Deep structural comparison, version included
    pub fn differs_from(&self, other: &EntitySchema) -> bool {
        self != other
    }

    /// Check every invariant of the schema and its nested definitions
    pub fn validate(&self) -> Result<()> {
        validate_name(ObjectKind::EntitySchema, &self.name)?;
        if self.version == 0 {
            return Err(SchemaError::invariant(format!(
                "entity schema `{}` version must be positive",
                self.name
            )));
        }
        for attribute in self.attributes.values() {
            attribute.validate_in(AttributeScope::Entity)?;
        }
        for associated_data in self.associated_data.values() {
            associated_data.validate()?;
        }
        for reference in self.references.values() {
            reference.validate()?;
        }
        for compound in self.sortable_attribute_compounds.values() {
            compound.validate(&self.attributes)?;
        }
        check_attribute_namespace(&self.attributes, &self.sortable_attribute_compounds)
    }
}

impl AttributeSchemaProvider for EntitySchema {
    fn attribute_schema(&self, name: &str) -> Option<&AttributeSchema> {
        self.attribute(name)
    }

    fn allows_implicit_attributes(&self) -> bool {
        self.allows(EvolutionMode::AddingAttributes)
    }

    fn locale_allowed(&self, locale: &Locale) -> bool {
        EntitySchema::locale_allowed(self, locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarType;

    #[test]
    fn test_new_schema_defaults() {
        let schema = EntitySchema::new("Product");
        assert_eq!(schema.version(), 1);
        assert_eq!(schema.indexed_price_places(), 2);
        assert!(schema.allows(EvolutionMode::AddingAttributes));
        assert!(!schema.with_price());
        assert_eq!(schema.name_variant(NamingConvention::SnakeCase), "product");
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_evolve_bumps_version_and_reindexes() {
        let schema = EntitySchema::with_evolution("Product", []);
        let next = schema.evolve(|s| {
            let attr = AttributeSchema::new("productCode", ScalarType::String);
            s.attributes.insert(attr.name().to_string(), attr);
        })
        .unwrap();
        assert_eq!(schema.version(), 1);
        assert!(schema.attribute("productCode").is_none());
        assert_eq!(next.version(), 2);
        assert!(next
            .attribute_by_name("PRODUCT_CODE", NamingConvention::UpperSnakeCase)
            .is_some());
        assert!(next.differs_from(&schema));
    }

    #[test]
    fn test_locale_and_currency_membership() {
        let en = Locale::new("en").unwrap();
        let eur = Currency::new("EUR").unwrap();
        let closed = EntitySchema::with_evolution("Product", []).evolve(|s| {
            s.locales.insert(en.clone());
        })
        .unwrap();
        assert!(closed.supports_locale(&en));
        assert!(!closed.locale_allowed(&Locale::new("de").unwrap()));
        assert!(!closed.currency_allowed(&eur));

        let open = EntitySchema::new("Product");
        assert!(!open.supports_currency(&eur));
        assert!(open.currency_allowed(&eur));
    }

    #[test]
    fn test_serde_round_trip_rebuilds_indexes() {
        let schema = EntitySchema::new("Product").evolve(|s| {
            let attr = AttributeSchema::new("ean", ScalarType::String).with_filterable(true);
            s.attributes.insert(attr.name().to_string(), attr);
        })
        .unwrap();
        let json = serde_json::to_string(&schema).unwrap();
        let restored: EntitySchema = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, schema);
        assert!(restored.attribute_by_name("Ean", NamingConvention::PascalCase).is_some());
    }
}
