//! Catalog schema mutations

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::attribute::{AttributeSchemaMutation, AttributeTarget};
use crate::error::Result;
use crate::schema::{AttributeScope, CatalogEvolutionMode, CatalogSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CatalogSchemaMutation {
    ModifyDescription {
        description: Option<String>,
    },
    AllowEvolutionModes {
        modes: BTreeSet<CatalogEvolutionMode>,
    },
    DisallowEvolutionModes {
        modes: BTreeSet<CatalogEvolutionMode>,
    },
    /// Global attribute mutation
    Attribute(AttributeSchemaMutation),
}

impl CatalogSchemaMutation {
    pub fn mutate(&self, catalog: &CatalogSchema) -> Result<Option<CatalogSchema>> {
        match self {
            CatalogSchemaMutation::ModifyDescription { description } => (catalog.description != *description)
                .then(|| catalog.evolve(|c| c.description = description.clone()))
                .transpose(),
            CatalogSchemaMutation::AllowEvolutionModes { modes } => {
                (!modes.is_subset(&catalog.catalog_evolution_mode))
                    .then(|| catalog.evolve(|c| c.catalog_evolution_mode.extend(modes.iter().copied())))
                    .transpose()
            }
            CatalogSchemaMutation::DisallowEvolutionModes { modes } => {
                (!modes.is_disjoint(&catalog.catalog_evolution_mode))
                    .then(|| catalog.evolve(|c| c.catalog_evolution_mode.retain(|m| !modes.contains(m))))
                    .transpose()
            }
            CatalogSchemaMutation::Attribute(mutation) => {
                let no_compounds = BTreeMap::new();
                let target = AttributeTarget {
                    scope: AttributeScope::Catalog,
                    catalog: Some(catalog),
                    attributes: &catalog.attributes,
                    compounds: &no_compounds,
                };
                mutation
                    .mutate(&target)?
                    .map(|attributes| catalog.evolve(|c| c.attributes = attributes))
                    .transpose()
            }
        }
    }

    /// Apply to a shared schema; an unchanged schema comes back as the same `Arc`
    pub fn apply(&self, catalog: Arc<CatalogSchema>) -> Result<Arc<CatalogSchema>> {
        match self.mutate(&catalog)? {
            Some(next) => {
                debug!(catalog = %next.name(), version = next.version(), "catalog schema evolved");
                Ok(Arc::new(next))
            }
            None => {
                trace!(catalog = %catalog.name(), version = catalog.version(), "catalog schema mutation is a no-op");
                Ok(catalog)
            }
        }
    }
}

/// All mutations of the catalog schema, applied atomically
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifyCatalogSchemaMutation {
    pub mutations: Vec<CatalogSchemaMutation>,
}

impl ModifyCatalogSchemaMutation {
    pub fn new(mutations: Vec<CatalogSchemaMutation>) -> Self {
        Self { mutations }
    }

    pub fn apply(&self, catalog: Arc<CatalogSchema>) -> Result<Arc<CatalogSchema>> {
        self.mutations
            .iter()
            .try_fold(catalog, |catalog, mutation| mutation.apply(catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, GlobalAttributeUniquenessType};
    use crate::types::ScalarType;

    fn url() -> AttributeSchema {
        AttributeSchema::new("url", ScalarType::String)
            .with_global_uniqueness(GlobalAttributeUniquenessType::UniqueWithinCatalog)
    }

    #[test]
    fn test_global_attribute_lifecycle() {
        let catalog = Arc::new(CatalogSchema::new("shop"));
        let create = CatalogSchemaMutation::Attribute(AttributeSchemaMutation::Create(url()));
        let v2 = create.apply(catalog).unwrap();
        assert_eq!(v2.version(), 2);
        assert!(Arc::ptr_eq(&create.apply(v2.clone()).unwrap(), &v2));

        let set = CatalogSchemaMutation::Attribute(AttributeSchemaMutation::SetGloballyUnique {
            name: "url".into(),
            uniqueness: GlobalAttributeUniquenessType::NotUnique,
        });
        let v3 = set.apply(v2).unwrap();
        assert!(!v3.attribute("url").unwrap().is_globally_unique());
        assert!(v3.attribute("url").unwrap().is_global());
    }

    #[test]
    fn test_non_global_rejected() {
        let catalog = CatalogSchema::new("shop");
        let create = CatalogSchemaMutation::Attribute(AttributeSchemaMutation::Create(AttributeSchema::new(
            "code",
            ScalarType::String,
        )));
        assert!(create.mutate(&catalog).unwrap_err().is_invariant_violation());
    }

    #[test]
    fn test_evolution_modes() {
        let catalog = Arc::new(CatalogSchema::new("shop"));
        let envelope = ModifyCatalogSchemaMutation::new(vec![
            CatalogSchemaMutation::DisallowEvolutionModes {
                modes: BTreeSet::from([CatalogEvolutionMode::AddingEntityTypes]),
            },
            CatalogSchemaMutation::ModifyDescription {
                description: Some("Main shop".into()),
            },
        ]);
        let next = envelope.apply(catalog).unwrap();
        assert_eq!(next.version(), 3);
        assert!(!next.allows(CatalogEvolutionMode::AddingEntityTypes));
        assert_eq!(next.description(), Some("Main shop"));
    }
}
