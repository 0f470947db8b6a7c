//! The entity snapshot: aggregate root of all data containers

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::associated_data::AssociatedData;
use super::attributes::Attributes;
use super::key::{AttributeKey, ReferenceKey};
use super::prices::{PriceForSale, Prices};
use super::reference::Reference;
use crate::error::{Result, SchemaError};
use crate::schema::{EntitySchema, EvolutionMode, ReferenceAttributeScope};
use crate::types::{Currency, Locale, Value};

/// Immutable snapshot of one entity
///
/// Containers are shared between versions: a merge that leaves a container untouched
/// hands the same instance to the next version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EntityRepr", into = "EntityRepr")]
pub struct Entity {
    entity_type: String,
    version: u32,
    primary_key: Option<i32>,
    parent: Option<i32>,
    attributes: Arc<Attributes>,
    associated_data: Arc<AssociatedData>,
    prices: Arc<Prices>,
    references: Arc<BTreeMap<ReferenceKey, Reference>>,
    locales: BTreeSet<Locale>,
    dropped: bool,
}

/// Owned parts of an entity, used to assemble one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityParts {
    pub entity_type: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<i32>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub associated_data: AssociatedData,
    #[serde(default)]
    pub prices: Prices,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub dropped: bool,
}

type EntityRepr = EntityParts;

impl Entity {
    /// An empty, not yet persisted entity at version 1
    pub fn new(entity_type: impl Into<String>, primary_key: Option<i32>) -> Self {
        Self {
            entity_type: entity_type.into(),
            version: 1,
            primary_key,
            parent: None,
            attributes: Arc::default(),
            associated_data: Arc::default(),
            prices: Arc::default(),
            references: Arc::default(),
            locales: BTreeSet::new(),
            dropped: false,
        }
    }

    /// Assemble an entity, rejecting duplicate reference keys
    pub fn from_parts(parts: EntityParts) -> Result<Self> {
        let mut references = BTreeMap::new();
        for reference in parts.references {
            let key = reference.key().clone();
            if references.insert(key.clone(), reference).is_some() {
                return Err(SchemaError::invariant(format!("duplicate reference {key}")));
            }
        }
        if parts.version == 0 {
            return Err(SchemaError::invariant(format!(
                "entity `{}` version must be positive",
                parts.entity_type
            )));
        }
        Ok(Self::assemble(
            parts.entity_type,
            parts.version,
            parts.primary_key,
            parts.parent,
            Arc::new(parts.attributes),
            Arc::new(parts.associated_data),
            Arc::new(parts.prices),
            Arc::new(references),
            parts.dropped,
        ))
    }

    /// Assemble and validate against `schema`
    pub fn with_schema(schema: &EntitySchema, parts: EntityParts) -> Result<Self> {
        let entity = Self::from_parts(parts)?;
        entity.validate(schema)?;
        Ok(entity)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        entity_type: String,
        version: u32,
        primary_key: Option<i32>,
        parent: Option<i32>,
        attributes: Arc<Attributes>,
        associated_data: Arc<AssociatedData>,
        prices: Arc<Prices>,
        references: Arc<BTreeMap<ReferenceKey, Reference>>,
        dropped: bool,
    ) -> Self {
        let locales = attributes
            .locales()
            .chain(associated_data.locales())
            .cloned()
            .collect();
        Self {
            entity_type,
            version,
            primary_key,
            parent,
            attributes,
            associated_data,
            prices,
            references,
            locales,
            dropped,
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn primary_key(&self) -> Option<i32> {
        self.primary_key
    }

    pub fn parent(&self) -> Option<i32> {
        self.parent
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn associated_data(&self) -> &AssociatedData {
        &self.associated_data
    }

    pub fn prices(&self) -> &Prices {
        &self.prices
    }

    pub(crate) fn attributes_shared(&self) -> &Arc<Attributes> {
        &self.attributes
    }

    pub(crate) fn associated_data_shared(&self) -> &Arc<AssociatedData> {
        &self.associated_data
    }

    pub(crate) fn prices_shared(&self) -> &Arc<Prices> {
        &self.prices
    }

    pub(crate) fn references_shared(&self) -> &Arc<BTreeMap<ReferenceKey, Reference>> {
        &self.references
    }

    /// Shortcut for the non-localized attribute value
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn localized_attribute(&self, name: &str, locale: &Locale) -> Option<&Value> {
        self.attributes.get_localized(name, locale)
    }

    /// Live references
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.references.values().filter(|r| !r.is_dropped())
    }

    /// Live references of one name
    pub fn references_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Reference> {
        self.references().filter(move |r| r.reference_name() == name)
    }

    pub fn reference(&self, name: &str, primary_key: i32) -> Option<&Reference> {
        self.references
            .get(&ReferenceKey::new(name, primary_key))
            .filter(|r| !r.is_dropped())
    }

    /// Reference records, tombstones included
    pub fn reference_records(&self) -> impl Iterator<Item = &Reference> {
        self.references.values()
    }

    /// Locales used by attributes and associated data
    pub fn locales(&self) -> &BTreeSet<Locale> {
        &self.locales
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    pub fn price_for_sale(
        &self,
        currency: &Currency,
        moment: Option<DateTime<FixedOffset>>,
        price_lists: &[&str],
    ) -> Option<PriceForSale> {
        self.prices.price_for_sale(currency, moment, price_lists)
    }

    /// Content comparison ignoring versions
    pub fn differs_from(&self, other: &Entity) -> bool {
        self.entity_type != other.entity_type
            || self.primary_key != other.primary_key
            || self.parent != other.parent
            || self.dropped != other.dropped
            || self.attributes.differs_from(&other.attributes)
            || self.associated_data.differs_from(&other.associated_data)
            || self.prices.differs_from(&other.prices)
            || self.references.len() != other.references.len()
            || self
                .references
                .values()
                .zip(other.references.values())
                .any(|(a, b)| a.differs_from(b))
    }

    /// Non-nullable attributes without a default that have no live value. Localized
    /// attributes must have a value in every locale the entity uses.
    pub fn missing_mandatory_attributes(&self, schema: &EntitySchema) -> Vec<AttributeKey> {
        let mut missing = Vec::new();
        for attribute in schema.non_nullable_attributes() {
            if attribute.default_value().is_some() {
                continue;
            }
            let name = attribute.name();
            if attribute.is_localized() {
                for locale in &self.locales {
                    let key = AttributeKey::localized(name, locale.clone());
                    if self.attributes.value(&key).is_none() {
                        missing.push(key);
                    }
                }
            } else if self.attributes.get_value(name).is_none() {
                missing.push(AttributeKey::global(name));
            }
        }
        missing
    }

    /// Check the entity against its schema
    pub fn validate(&self, schema: &EntitySchema) -> Result<()> {
        if self.entity_type != schema.name() {
            return Err(SchemaError::invariant(format!(
                "entity of type `{}` cannot be validated against schema `{}`",
                self.entity_type,
                schema.name()
            )));
        }
        if self.parent.is_some() && !schema.with_hierarchy() && !schema.allows(EvolutionMode::AddingHierarchy) {
            return Err(SchemaError::invariant(format!(
                "entity type `{}` is not hierarchical and cannot have a parent",
                self.entity_type
            )));
        }
        self.attributes.validate(schema)?;
        self.associated_data.validate(schema)?;
        self.validate_prices(schema)?;
        self.validate_references(schema)
    }

    fn validate_prices(&self, schema: &EntitySchema) -> Result<()> {
        if self.prices.prices().next().is_none() {
            return Ok(());
        }
        if !schema.with_price() && !schema.allows(EvolutionMode::AddingPrices) {
            return Err(SchemaError::invariant(format!(
                "entity type `{}` has no prices",
                self.entity_type
            )));
        }
        match self.prices.currencies().into_iter().find(|c| !schema.currency_allowed(c)) {
            Some(currency) => Err(SchemaError::invariant(format!(
                "entity type `{}` doesn't support currency {currency}",
                self.entity_type
            ))),
            None => Ok(()),
        }
    }

    fn validate_references(&self, schema: &EntitySchema) -> Result<()> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for reference in self.references() {
            let name = reference.reference_name();
            *counts.entry(name).or_default() += 1;

            let Some(definition) = schema.reference(name) else {
                if !schema.allows(EvolutionMode::AddingReferences) {
                    return Err(SchemaError::invariant(format!(
                        "reference `{name}` is not defined and the schema doesn't allow adding references"
                    )));
                }
                continue;
            };
            if let Some(group) = reference.group() {
                if definition.referenced_group_type() != Some(group.group_type()) {
                    return Err(SchemaError::invariant(format!(
                        "reference `{name}` groups by {}, not `{}`",
                        definition.referenced_group_type().unwrap_or("nothing"),
                        group.group_type()
                    )));
                }
            }
            let scope = ReferenceAttributeScope {
                entity: schema,
                reference: definition,
            };
            reference.attributes().validate(&scope)?;
        }
        for (name, count) in counts {
            let allows_many = schema.reference(name).map_or(true, |r| r.cardinality().allows_many());
            if count > 1 && !allows_many {
                return Err(SchemaError::invariant(format!(
                    "reference `{name}` admits at most one entity, {count} are referenced"
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<EntityRepr> for Entity {
    type Error = SchemaError;

    fn try_from(repr: EntityRepr) -> Result<Self> {
        Self::from_parts(repr)
    }
}

impl From<Entity> for EntityRepr {
    fn from(entity: Entity) -> Self {
        EntityParts {
            entity_type: entity.entity_type,
            version: entity.version,
            primary_key: entity.primary_key,
            parent: entity.parent,
            attributes: Arc::unwrap_or_clone(entity.attributes),
            associated_data: Arc::unwrap_or_clone(entity.associated_data),
            prices: Arc::unwrap_or_clone(entity.prices),
            references: Arc::unwrap_or_clone(entity.references).into_values().collect(),
            dropped: entity.dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::attributes::AttributeValue;
    use crate::data::prices::{Price, PriceInnerRecordHandling};
    use crate::data::key::PriceKey;
    use crate::schema::{AttributeSchema, Cardinality, ReferenceSchema};
    use crate::types::ScalarType;
    use rust_decimal::Decimal;

    fn locale(tag: &str) -> Locale {
        Locale::new(tag).unwrap()
    }

    fn schema() -> EntitySchema {
        EntitySchema::with_evolution("Product", []).evolve(|s| {
            for attribute in [
                AttributeSchema::new("code", ScalarType::String),
                AttributeSchema::new("name", ScalarType::String).with_localized(true),
            ] {
                s.attributes.insert(attribute.name().to_string(), attribute);
            }
            let brand = ReferenceSchema::new("brand", "Brand", true, Cardinality::ZeroOrOne);
            s.references.insert(brand.name().to_string(), brand);
            s.locales.insert(locale("en"));
            s.locales.insert(locale("cs"));
        })
        .unwrap()
    }

    fn parts() -> EntityParts {
        EntityParts {
            entity_type: "Product".into(),
            version: 1,
            primary_key: Some(1),
            attributes: Attributes::new([
                AttributeValue::new(AttributeKey::global("code"), "A-1"),
                AttributeValue::new(AttributeKey::localized("name", locale("en")), "Phone"),
            ])
            .unwrap(),
            ..EntityParts::default()
        }
    }

    #[test]
    fn test_locales_derived_from_containers() {
        let entity = Entity::from_parts(parts()).unwrap();
        assert_eq!(entity.locales(), &BTreeSet::from([locale("en")]));
        assert_eq!(entity.attribute("code"), Some(&Value::from("A-1")));
    }

    #[test]
    fn test_validation_against_schema() {
        assert!(Entity::with_schema(&schema(), parts()).is_ok());

        let with_parent = EntityParts {
            parent: Some(7),
            ..parts()
        };
        assert!(Entity::with_schema(&schema(), with_parent).is_err());

        let key = PriceKey::new(1, "basic", Currency::new("EUR").unwrap());
        let price = Price::new(key, None, Decimal::ONE, Decimal::ZERO, Decimal::ONE, None, true).unwrap();
        let with_price = EntityParts {
            prices: Prices::new(1, PriceInnerRecordHandling::None, [price]).unwrap(),
            ..parts()
        };
        assert!(Entity::with_schema(&schema(), with_price).is_err());
    }

    #[test]
    fn test_reference_cardinality() {
        let two_brands = EntityParts {
            references: vec![
                Reference::new(ReferenceKey::new("brand", 1)),
                Reference::new(ReferenceKey::new("brand", 2)),
            ],
            ..parts()
        };
        let err = Entity::with_schema(&schema(), two_brands).unwrap_err();
        assert!(err.is_invariant_violation());

        let one_live = EntityParts {
            references: vec![
                Reference::new(ReferenceKey::new("brand", 1)),
                Reference::new(ReferenceKey::new("brand", 2)).tombstone().unwrap(),
            ],
            ..parts()
        };
        assert!(Entity::with_schema(&schema(), one_live).is_ok());
    }

    #[test]
    fn test_missing_mandatory_attributes() {
        let entity = Entity::from_parts(EntityParts {
            attributes: Attributes::new([
                AttributeValue::new(AttributeKey::localized("name", locale("en")), "Phone"),
                AttributeValue::new(AttributeKey::localized("name", locale("cs")), "Telefon"),
            ])
            .unwrap(),
            ..parts()
        })
        .unwrap();
        assert_eq!(entity.missing_mandatory_attributes(&schema()), vec![AttributeKey::global("code")]);
    }

    #[test]
    fn test_serde_round_trip() {
        let entity = Entity::from_parts(parts()).unwrap();
        let json = serde_json::to_string(&entity).unwrap();
        let restored: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, entity);
        assert!(!restored.differs_from(&entity));
    }
}
