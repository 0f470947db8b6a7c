//! Catalog schema: catalog-wide settings and global attributes

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::attribute::{AttributeSchema, AttributeScope};
use super::{index_names, lookup_by_variant};
use crate::error::{next_version, ObjectKind, Result, SchemaError};
use crate::memo::Memo;
use crate::naming::{validate_name, NameIndex, NameVariants, NamingConvention};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogEvolutionMode {
    /// Create entity collections implicitly when data for an unknown type arrives
    AddingEntityTypes,
}

impl CatalogEvolutionMode {
    pub const ALL: [CatalogEvolutionMode; 1] = [CatalogEvolutionMode::AddingEntityTypes];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSchema {
    pub(crate) version: u32,
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    /// Global attributes, visible to every entity schema of the catalog
    #[serde(default)]
    pub(crate) attributes: BTreeMap<String, AttributeSchema>,
    #[serde(default)]
    pub(crate) catalog_evolution_mode: BTreeSet<CatalogEvolutionMode>,
    #[serde(skip)]
    variants: Memo<NameVariants>,
    #[serde(skip)]
    attribute_index: Memo<NameIndex>,
}

impl CatalogSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_evolution(name, CatalogEvolutionMode::ALL)
    }

    pub fn with_evolution(
        name: impl Into<String>,
        modes: impl IntoIterator<Item = CatalogEvolutionMode>,
    ) -> Self {
        let name = name.into();
        Self {
            version: 1,
            variants: Memo::ready(NameVariants::generate(&name)),
            name,
            description: None,
            attributes: BTreeMap::new(),
            catalog_evolution_mode: modes.into_iter().collect(),
            attribute_index: Memo::ready(NameIndex::default()),
        }
    }

    /// Derive the next version: clone, apply `change`, bump the version, rebuild indexes.
    pub(crate) fn evolve(&self, change: impl FnOnce(&mut CatalogSchema)) -> Result<CatalogSchema> {
        let version = next_version(ObjectKind::CatalogSchema, &self.name, self.version)?;
        let mut next = self.clone();
        change(&mut next);
        next.version = version;
        next.variants = Memo::ready(NameVariants::generate(&next.name));
        next.attribute_index = Memo::ready(index_names(&next.attributes));
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

    pub fn catalog_evolution_modes(&self) -> &BTreeSet<CatalogEvolutionMode> {
        &self.catalog_evolution_mode
    }

    pub fn allows(&self, mode: CatalogEvolutionMode) -> bool {
        self.catalog_evolution_mode.contains(&mode)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeSchema> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    pub fn attribute_by_name(&self, variant: &str, convention: NamingConvention) -> Option<&AttributeSchema> {
        let index = self.attribute_index.get_or_init(|| index_names(&self.attributes));
        lookup_by_variant(&self.attributes, index, variant, convention)
    }

    pub fn name_variants(&self) -> &NameVariants {
        self.variants.get_or_init(|| NameVariants::generate(&self.name))
    }

    pub fn name_variant(&self, convention: NamingConvention) -> &str {
        self.name_variants().get(convention)
    }

    pub fn differs_from(&self, other: &CatalogSchema) -> bool {
        self != other
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(ObjectKind::CatalogSchema, &self.name)?;
        if self.version == 0 {
            return Err(SchemaError::invariant(format!(
                "catalog schema `{}` version must be positive",
                self.name
            )));
        }
        self.attributes
            .values()
            .try_for_each(|attribute| attribute.validate_in(AttributeScope::Catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::attribute::GlobalAttributeUniquenessType;
    use crate::types::ScalarType;

    #[test]
    fn test_global_attribute_lookup() {
        let catalog = CatalogSchema::new("shop").evolve(|c| {
            let url = AttributeSchema::new("urlPath", ScalarType::String)
                .with_localized(true)
                .with_global_uniqueness(GlobalAttributeUniquenessType::UniqueWithinCatalogLocale);
            c.attributes.insert(url.name().to_string(), url);
        })
        .unwrap();
        assert_eq!(catalog.version(), 2);
        assert!(catalog.validate().is_ok());
        let url = catalog.attribute_by_name("url-path", NamingConvention::KebabCase).unwrap();
        assert!(url.is_globally_unique());
        assert!(catalog.allows(CatalogEvolutionMode::AddingEntityTypes));
    }

    #[test]
    fn test_non_global_attribute_rejected() {
        let catalog = CatalogSchema::new("shop").evolve(|c| {
            let code = AttributeSchema::new("code", ScalarType::String);
            c.attributes.insert(code.name().to_string(), code);
        })
        .unwrap();
        assert!(catalog.validate().unwrap_err().is_invariant_violation());
    }
}
