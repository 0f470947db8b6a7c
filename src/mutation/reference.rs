//! Reference schema mutations

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::attribute::{AttributeSchemaMutation, AttributeTarget};
use super::compound::SortableAttributeCompoundSchemaMutation;
use crate::error::{ObjectKind, Result, SchemaError};
use crate::naming::{ensure_no_conflict, validate_name};
use crate::schema::{AttributeScope, Cardinality, CatalogSchema, ReferenceSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceSchemaMutation {
    /// Create a reference; replaying it against an existing reference compares its own
    /// settings only, never nested attributes or compounds
    Create(ReferenceSchema),
    ModifyName {
        name: String,
        new_name: String,
    },
    ModifyDescription {
        name: String,
        description: Option<String>,
    },
    ModifyDeprecationNotice {
        name: String,
        deprecation_notice: Option<String>,
    },
    ModifyCardinality {
        name: String,
        cardinality: Cardinality,
    },
    ModifyReferencedEntityType {
        name: String,
        referenced_entity_type: String,
        managed: bool,
    },
    ModifyReferencedGroupType {
        name: String,
        referenced_group_type: Option<String>,
        managed: bool,
    },
    SetIndexed {
        name: String,
        indexed: bool,
    },
    SetFaceted {
        name: String,
        faceted: bool,
    },
    Attribute {
        name: String,
        mutation: AttributeSchemaMutation,
    },
    SortableAttributeCompound {
        name: String,
        mutation: SortableAttributeCompoundSchemaMutation,
    },
    Remove {
        name: String,
    },
}

type ReferenceMap = BTreeMap<String, ReferenceSchema>;

impl ReferenceSchemaMutation {
    pub fn name(&self) -> &str {
        match self {
            ReferenceSchemaMutation::Create(reference) => reference.name(),
            ReferenceSchemaMutation::ModifyName { name, .. }
            | ReferenceSchemaMutation::ModifyDescription { name, .. }
            | ReferenceSchemaMutation::ModifyDeprecationNotice { name, .. }
            | ReferenceSchemaMutation::ModifyCardinality { name, .. }
            | ReferenceSchemaMutation::ModifyReferencedEntityType { name, .. }
            | ReferenceSchemaMutation::ModifyReferencedGroupType { name, .. }
            | ReferenceSchemaMutation::SetIndexed { name, .. }
            | ReferenceSchemaMutation::SetFaceted { name, .. }
            | ReferenceSchemaMutation::Attribute { name, .. }
            | ReferenceSchemaMutation::SortableAttributeCompound { name, .. }
            | ReferenceSchemaMutation::Remove { name } => name,
        }
    }

    pub(crate) fn mutate(&self, catalog: &CatalogSchema, references: &ReferenceMap) -> Result<Option<ReferenceMap>> {
        match self {
            ReferenceSchemaMutation::Create(reference) => {
                let name = reference.name();
                if let Some(existing) = references.get(name) {
                    return if existing.same_definition(reference) {
                        Ok(None)
                    } else {
                        Err(SchemaError::conflict(ObjectKind::Reference, name))
                    };
                }
                reference.validate()?;
                ensure_no_conflict(ObjectKind::Reference, name, references.keys().map(String::as_str))?;
                Ok(Some(with(references, reference.clone())))
            }
            ReferenceSchemaMutation::ModifyName { name, new_name } => {
                let existing = lookup(references, name)?;
                if name == new_name {
                    return Ok(None);
                }
                validate_name(ObjectKind::Reference, new_name)?;
                if references.contains_key(new_name) {
                    return Err(SchemaError::conflict(ObjectKind::Reference, new_name));
                }
                ensure_no_conflict(
                    ObjectKind::Reference,
                    new_name,
                    references.keys().map(String::as_str).filter(|n| *n != name.as_str()),
                )?;
                let mut updated = references.clone();
                updated.remove(name);
                updated.insert(new_name.clone(), existing.clone().with_name(new_name));
                Ok(Some(updated))
            }
            ReferenceSchemaMutation::ModifyDescription { name, description } => {
                replace(references, name, |r| Ok(r.with_description(description.clone())))
            }
            ReferenceSchemaMutation::ModifyDeprecationNotice {
                name,
                deprecation_notice,
            } => replace(references, name, |r| {
                Ok(r.with_deprecation_notice(deprecation_notice.clone()))
            }),
            ReferenceSchemaMutation::ModifyCardinality { name, cardinality } => {
                replace(references, name, |r| Ok(r.with_cardinality(*cardinality)))
            }
            ReferenceSchemaMutation::ModifyReferencedEntityType {
                name,
                referenced_entity_type,
                managed,
            } => replace(references, name, |r| {
                Ok(r.with_referenced_entity_type(referenced_entity_type.clone(), *managed))
            }),
            ReferenceSchemaMutation::ModifyReferencedGroupType {
                name,
                referenced_group_type,
                managed,
            } => replace(references, name, |r| {
                Ok(r.with_referenced_group_type(referenced_group_type.clone(), *managed))
            }),
            ReferenceSchemaMutation::SetIndexed { name, indexed } => replace(references, name, |r| {
                if !indexed {
                    ensure_can_unindex(&r)?;
                }
                Ok(r.with_indexed(*indexed))
            }),
            ReferenceSchemaMutation::SetFaceted { name, faceted } => {
                replace(references, name, |r| Ok(r.with_faceted(*faceted)))
            }
            ReferenceSchemaMutation::Attribute { name, mutation } => replace(references, name, |r| {
                let target = AttributeTarget {
                    scope: AttributeScope::Reference { indexed: r.is_indexed() },
                    catalog: Some(catalog),
                    attributes: r.attributes(),
                    compounds: r.sortable_attribute_compounds(),
                };
                Ok(match mutation.mutate(&target)? {
                    Some(attributes) => r.with_attributes(attributes),
                    None => r,
                })
            }),
            ReferenceSchemaMutation::SortableAttributeCompound { name, mutation } => {
                replace(references, name, |r| {
                    Ok(match mutation.mutate(r.attributes(), r.sortable_attribute_compounds())? {
                        Some(compounds) => r.with_sortable_attribute_compounds(compounds),
                        None => r,
                    })
                })
            }
            ReferenceSchemaMutation::Remove { name } => {
                if !references.contains_key(name) {
                    return Ok(None);
                }
                let mut updated = references.clone();
                updated.remove(name);
                Ok(Some(updated))
            }
        }
    }
}

/// A reference can stop being indexed only when nothing depends on its index
fn ensure_can_unindex(reference: &ReferenceSchema) -> Result<()> {
    if reference.is_faceted() {
        return Err(SchemaError::invariant(format!(
            "reference `{}` is faceted and must stay indexed",
            reference.name()
        )));
    }
    if let Some(attribute) = reference.attributes().values().find(|a| a.is_indexed()) {
        return Err(SchemaError::invariant(format!(
            "reference `{}` must stay indexed: attribute `{}` is filterable, sortable or unique",
            reference.name(),
            attribute.name()
        )));
    }
    Ok(())
}

fn lookup<'a>(references: &'a ReferenceMap, name: &str) -> Result<&'a ReferenceSchema> {
    references
        .get(name)
        .ok_or_else(|| SchemaError::not_found(ObjectKind::Reference, name))
}

fn with(references: &ReferenceMap, reference: ReferenceSchema) -> ReferenceMap {
    let mut updated = references.clone();
    updated.insert(reference.name().to_string(), reference);
    updated
}

fn replace(
    references: &ReferenceMap,
    name: &str,
    change: impl FnOnce(ReferenceSchema) -> Result<ReferenceSchema>,
) -> Result<Option<ReferenceMap>> {
    let existing = lookup(references, name)?;
    let updated = change(existing.clone())?;
    if &updated == existing {
        return Ok(None);
    }
    updated.validate()?;
    Ok(Some(with(references, updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeSchema;
    use crate::types::ScalarType;

    fn brand() -> ReferenceSchema {
        ReferenceSchema::new("brand", "Brand", true, Cardinality::ZeroOrOne)
    }

    fn references(reference: ReferenceSchema) -> ReferenceMap {
        BTreeMap::from([(reference.name().to_string(), reference)])
    }

    #[test]
    fn test_create_compares_own_settings() {
        let catalog = CatalogSchema::new("shop");
        let existing = references(brand().with_attribute(AttributeSchema::new("code", ScalarType::String)));
        let replay = ReferenceSchemaMutation::Create(brand());
        assert!(replay.mutate(&catalog, &existing).unwrap().is_none());

        let conflicting = ReferenceSchemaMutation::Create(brand().with_cardinality(Cardinality::ZeroOrMore));
        assert!(conflicting.mutate(&catalog, &existing).unwrap_err().is_conflict());
    }

    #[test]
    fn test_create_compares_nested_definitions() {
        let catalog = CatalogSchema::new("shop");
        let code = AttributeSchema::new("code", ScalarType::String);
        let existing = references(brand().with_attribute(code.clone()));

        let same = ReferenceSchemaMutation::Create(brand().with_attribute(code));
        assert!(same.mutate(&catalog, &existing).unwrap().is_none());

        let retyped = ReferenceSchemaMutation::Create(
            brand().with_attribute(AttributeSchema::new("code", ScalarType::Integer)),
        );
        assert!(retyped.mutate(&catalog, &existing).unwrap_err().is_conflict());

        let extra = ReferenceSchemaMutation::Create(
            brand().with_attribute(AttributeSchema::new("label", ScalarType::String)),
        );
        assert!(extra.mutate(&catalog, &existing).unwrap_err().is_conflict());
    }

    #[test]
    fn test_filterable_attribute_needs_indexed_reference() {
        let catalog = CatalogSchema::new("shop");
        let existing = references(brand().with_attribute(AttributeSchema::new("order", ScalarType::Integer)));
        let set = ReferenceSchemaMutation::Attribute {
            name: "brand".into(),
            mutation: AttributeSchemaMutation::SetFilterable {
                name: "order".into(),
                filterable: true,
            },
        };
        assert!(set.mutate(&catalog, &existing).unwrap_err().is_invariant_violation());

        let indexed = ReferenceSchemaMutation::SetIndexed {
            name: "brand".into(),
            indexed: true,
        }
        .mutate(&catalog, &existing)
        .unwrap()
        .unwrap();
        let updated = set.mutate(&catalog, &indexed).unwrap().unwrap();
        assert!(updated["brand"].attribute("order").unwrap().is_filterable());
    }

    #[test]
    fn test_unindex_guard() {
        let catalog = CatalogSchema::new("shop");
        let faceted = references(brand().with_indexed(true).with_faceted(true));
        let unindex = ReferenceSchemaMutation::SetIndexed {
            name: "brand".into(),
            indexed: false,
        };
        assert!(unindex.mutate(&catalog, &faceted).unwrap_err().is_invariant_violation());

        let sortable = references(
            brand()
                .with_indexed(true)
                .with_attribute(AttributeSchema::new("order", ScalarType::Integer).with_sortable(true)),
        );
        assert!(unindex.mutate(&catalog, &sortable).is_err());
    }

    #[test]
    fn test_faceted_requires_indexed() {
        let catalog = CatalogSchema::new("shop");
        let facet = ReferenceSchemaMutation::SetFaceted {
            name: "brand".into(),
            faceted: true,
        };
        assert!(facet.mutate(&catalog, &references(brand())).is_err());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let catalog = CatalogSchema::new("shop");
        let remove = ReferenceSchemaMutation::Remove { name: "category".into() };
        assert!(remove.mutate(&catalog, &references(brand())).unwrap().is_none());
    }
}
