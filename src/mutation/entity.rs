//! Entity schema mutations

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::associated_data::AssociatedDataSchemaMutation;
use super::attribute::{AttributeSchemaMutation, AttributeTarget};
use super::compound::SortableAttributeCompoundSchemaMutation;
use super::reference::ReferenceSchemaMutation;
use crate::error::{Result, SchemaError};
use crate::schema::{AttributeScope, CatalogSchema, EntitySchema, EvolutionMode};
use crate::types::{Currency, Locale};

/// Highest number of decimal places a price can be indexed with
const MAX_INDEXED_PRICE_PLACES: u32 = 28;

/// One atomic change of an entity schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntitySchemaMutation {
    ModifyDescription {
        description: Option<String>,
    },
    ModifyDeprecationNotice {
        deprecation_notice: Option<String>,
    },
    AllowEvolutionModes {
        modes: BTreeSet<EvolutionMode>,
    },
    DisallowEvolutionModes {
        modes: BTreeSet<EvolutionMode>,
    },
    AllowLocales {
        locales: BTreeSet<Locale>,
    },
    DisallowLocales {
        locales: BTreeSet<Locale>,
    },
    AllowCurrencies {
        currencies: BTreeSet<Currency>,
    },
    DisallowCurrencies {
        currencies: BTreeSet<Currency>,
    },
    SetWithGeneratedPrimaryKey {
        with_generated_primary_key: bool,
    },
    SetWithHierarchy {
        with_hierarchy: bool,
    },
    SetWithPrice {
        with_price: bool,
        indexed_price_places: u32,
    },
    Attribute(AttributeSchemaMutation),
    AssociatedData(AssociatedDataSchemaMutation),
    Reference(ReferenceSchemaMutation),
    SortableAttributeCompound(SortableAttributeCompoundSchemaMutation),
}

impl EntitySchemaMutation {
    /// Produce the next schema version, or `None` when the schema already reflects the change
    pub fn mutate(&self, catalog: &CatalogSchema, schema: &EntitySchema) -> Result<Option<EntitySchema>> {
        match self {
            EntitySchemaMutation::ModifyDescription { description } => (schema.description != *description)
                .then(|| schema.evolve(|s| s.description = description.clone()))
                .transpose(),
            EntitySchemaMutation::ModifyDeprecationNotice { deprecation_notice } => {
                (schema.deprecation_notice != *deprecation_notice)
                    .then(|| schema.evolve(|s| s.deprecation_notice = deprecation_notice.clone()))
                    .transpose()
            }
            EntitySchemaMutation::AllowEvolutionModes { modes } => (!modes.is_subset(&schema.evolution_mode))
                .then(|| schema.evolve(|s| s.evolution_mode.extend(modes.iter().copied())))
                .transpose(),
            EntitySchemaMutation::DisallowEvolutionModes { modes } => (!modes.is_disjoint(&schema.evolution_mode))
                .then(|| schema.evolve(|s| s.evolution_mode.retain(|m| !modes.contains(m))))
                .transpose(),
            EntitySchemaMutation::AllowLocales { locales } => (!locales.is_subset(&schema.locales))
                .then(|| schema.evolve(|s| s.locales.extend(locales.iter().cloned())))
                .transpose(),
            EntitySchemaMutation::DisallowLocales { locales } => (!locales.is_disjoint(&schema.locales))
                .then(|| schema.evolve(|s| s.locales.retain(|l| !locales.contains(l))))
                .transpose(),
            EntitySchemaMutation::AllowCurrencies { currencies } => (!currencies.is_subset(&schema.currencies))
                .then(|| schema.evolve(|s| s.currencies.extend(currencies.iter().cloned())))
                .transpose(),
            EntitySchemaMutation::DisallowCurrencies { currencies } => (!currencies.is_disjoint(&schema.currencies))
                .then(|| schema.evolve(|s| s.currencies.retain(|c| !currencies.contains(c))))
                .transpose(),
            EntitySchemaMutation::SetWithGeneratedPrimaryKey {
                with_generated_primary_key,
            } => (schema.with_generated_primary_key != *with_generated_primary_key)
                .then(|| schema.evolve(|s| s.with_generated_primary_key = *with_generated_primary_key))
                .transpose(),
            EntitySchemaMutation::SetWithHierarchy { with_hierarchy } => (schema.with_hierarchy != *with_hierarchy)
                .then(|| schema.evolve(|s| s.with_hierarchy = *with_hierarchy))
                .transpose(),
            EntitySchemaMutation::SetWithPrice {
                with_price,
                indexed_price_places,
            } => {
                if *indexed_price_places > MAX_INDEXED_PRICE_PLACES {
                    return Err(SchemaError::invariant(format!(
                        "prices cannot be indexed with {indexed_price_places} decimal places (at most {MAX_INDEXED_PRICE_PLACES})"
                    )));
                }
                let unchanged = schema.with_price == *with_price
                    && schema.indexed_price_places == *indexed_price_places;
                (!unchanged)
                    .then(|| {
                        schema.evolve(|s| {
                            s.with_price = *with_price;
                            s.indexed_price_places = *indexed_price_places;
                        })
                    })
                    .transpose()
            }
            EntitySchemaMutation::Attribute(mutation) => {
                let target = AttributeTarget {
                    scope: AttributeScope::Entity,
                    catalog: Some(catalog),
                    attributes: &schema.attributes,
                    compounds: &schema.sortable_attribute_compounds,
                };
                mutation
                    .mutate(&target)?
                    .map(|attributes| schema.evolve(|s| s.attributes = attributes))
                    .transpose()
            }
            EntitySchemaMutation::AssociatedData(mutation) => mutation
                .mutate(&schema.associated_data)?
                .map(|associated_data| schema.evolve(|s| s.associated_data = associated_data))
                .transpose(),
            EntitySchemaMutation::Reference(mutation) => mutation
                .mutate(catalog, &schema.references)?
                .map(|references| schema.evolve(|s| s.references = references))
                .transpose(),
            EntitySchemaMutation::SortableAttributeCompound(mutation) => mutation
                .mutate(&schema.attributes, &schema.sortable_attribute_compounds)?
                .map(|compounds| schema.evolve(|s| s.sortable_attribute_compounds = compounds))
                .transpose(),
        }
    }

    /// Apply to a shared schema; an unchanged schema comes back as the same `Arc`
    pub fn apply(&self, catalog: &CatalogSchema, schema: Arc<EntitySchema>) -> Result<Arc<EntitySchema>> {
        match self.mutate(catalog, &schema)? {
            Some(next) => {
                debug!(entity_type = %next.name(), version = next.version(), "entity schema evolved");
                Ok(Arc::new(next))
            }
            None => {
                trace!(entity_type = %schema.name(), version = schema.version(), "entity schema mutation is a no-op");
                Ok(schema)
            }
        }
    }
}

/// All mutations of one entity schema, applied atomically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyEntitySchemaMutation {
    pub entity_type: String,
    pub mutations: Vec<EntitySchemaMutation>,
}

impl ModifyEntitySchemaMutation {
    pub fn new(entity_type: impl Into<String>, mutations: Vec<EntitySchemaMutation>) -> Self {
        Self {
            entity_type: entity_type.into(),
            mutations,
        }
    }

    /// Fold every mutation in order. Either all succeed or the input schema is kept and the
    /// error returned.
    ///
    /// Each effective mutation bumps the version by one.
    pub fn apply(&self, catalog: &CatalogSchema, schema: Arc<EntitySchema>) -> Result<Arc<EntitySchema>> {
        if schema.name() != self.entity_type {
            return Err(SchemaError::invariant(format!(
                "mutations of `{}` cannot be applied to entity schema `{}`",
                self.entity_type,
                schema.name()
            )));
        }
        self.mutations
            .iter()
            .try_fold(schema, |schema, mutation| mutation.apply(catalog, schema))
    }
}
