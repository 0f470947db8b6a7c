//! Attribute schema mutations
//!
//! The same mutation set applies to entity attributes, reference attributes and global
//! (catalog) attributes. The owning schema decides the [`AttributeScope`] and hands over its
//! attribute map; the mutation returns the new map, or `None` when nothing changed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ObjectKind, Result, SchemaError};
use crate::naming::{ensure_no_conflict, validate_name};
use crate::schema::{
    ensure_not_in_compound, AttributeSchema, AttributeScope, AttributeUniquenessType, CatalogSchema,
    GlobalAttributeUniquenessType, SortableAttributeCompoundSchema,
};
use crate::types::{Value, ValueType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeSchemaMutation {
    Create(AttributeSchema),
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
    /// Change the type; a default value is converted to the new type or the mutation fails
    ModifyType {
        name: String,
        attribute_type: ValueType,
        indexed_decimal_places: u32,
    },
    ModifyDefaultValue {
        name: String,
        default_value: Option<Value>,
    },
    SetFilterable {
        name: String,
        filterable: bool,
    },
    SetSortable {
        name: String,
        sortable: bool,
    },
    SetUnique {
        name: String,
        uniqueness: AttributeUniquenessType,
    },
    SetGloballyUnique {
        name: String,
        uniqueness: GlobalAttributeUniquenessType,
    },
    SetNullable {
        name: String,
        nullable: bool,
    },
    SetLocalized {
        name: String,
        localized: bool,
    },
    SetRepresentative {
        name: String,
        representative: bool,
    },
    /// Link a catalog global attribute into an entity schema
    UseGlobal {
        name: String,
    },
    Remove {
        name: String,
    },
}

/// The attribute set a mutation works on, with what it needs to validate
pub(crate) struct AttributeTarget<'a> {
    pub scope: AttributeScope,
    pub catalog: Option<&'a CatalogSchema>,
    pub attributes: &'a BTreeMap<String, AttributeSchema>,
    pub compounds: &'a BTreeMap<String, SortableAttributeCompoundSchema>,
}

impl AttributeTarget<'_> {
    fn existing(&self, name: &str) -> Result<&AttributeSchema> {
        self.attributes
            .get(name)
            .ok_or_else(|| SchemaError::not_found(ObjectKind::Attribute, name))
    }

    /// Names sharing the attribute namespace
    fn taken_names(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .keys()
            .chain(self.compounds.keys())
            .map(String::as_str)
    }

    fn global(&self, name: &str) -> Option<&AttributeSchema> {
        self.catalog.and_then(|c| c.attribute(name))
    }

    fn with(&self, attribute: AttributeSchema) -> BTreeMap<String, AttributeSchema> {
        let mut attributes = self.attributes.clone();
        attributes.insert(attribute.name().to_string(), attribute);
        attributes
    }
}

impl AttributeSchemaMutation {
    /// Name of the attribute the mutation targets
    pub fn name(&self) -> &str {
        match self {
            AttributeSchemaMutation::Create(attribute) => attribute.name(),
            AttributeSchemaMutation::ModifyName { name, .. }
            | AttributeSchemaMutation::ModifyDescription { name, .. }
            | AttributeSchemaMutation::ModifyDeprecationNotice { name, .. }
            | AttributeSchemaMutation::ModifyType { name, .. }
            | AttributeSchemaMutation::ModifyDefaultValue { name, .. }
            | AttributeSchemaMutation::SetFilterable { name, .. }
            | AttributeSchemaMutation::SetSortable { name, .. }
            | AttributeSchemaMutation::SetUnique { name, .. }
            | AttributeSchemaMutation::SetGloballyUnique { name, .. }
            | AttributeSchemaMutation::SetNullable { name, .. }
            | AttributeSchemaMutation::SetLocalized { name, .. }
            | AttributeSchemaMutation::SetRepresentative { name, .. }
            | AttributeSchemaMutation::UseGlobal { name }
            | AttributeSchemaMutation::Remove { name } => name,
        }
    }

    pub(crate) fn mutate(&self, target: &AttributeTarget<'_>) -> Result<Option<BTreeMap<String, AttributeSchema>>> {
        match self {
            AttributeSchemaMutation::Create(attribute) => create(target, attribute),
            AttributeSchemaMutation::ModifyName { name, new_name } => rename(target, name, new_name),
            AttributeSchemaMutation::ModifyDescription { name, description } => {
                replace(target, name, |a| a.with_description(description.clone()))
            }
            AttributeSchemaMutation::ModifyDeprecationNotice {
                name,
                deprecation_notice,
            } => replace(target, name, |a| a.with_deprecation_notice(deprecation_notice.clone())),
            AttributeSchemaMutation::ModifyType {
                name,
                attribute_type,
                indexed_decimal_places,
            } => {
                let existing = target.existing(name)?;
                let default_value = existing
                    .default_value()
                    .map(|d| d.convert_to(attribute_type))
                    .transpose()
                    .map_err(|_| {
                        SchemaError::type_mismatch(
                            name,
                            attribute_type,
                            existing.default_value().map(Value::type_label).unwrap_or_default(),
                        )
                    })?;
                replace(target, name, |a| {
                    a.with_type(*attribute_type, *indexed_decimal_places)
                        .with_default_value(default_value)
                })
            }
            AttributeSchemaMutation::ModifyDefaultValue { name, default_value } => {
                replace(target, name, |a| a.with_default_value(default_value.clone()))
            }
            AttributeSchemaMutation::SetFilterable { name, filterable } => {
                replace(target, name, |a| a.with_filterable(*filterable))
            }
            AttributeSchemaMutation::SetSortable { name, sortable } => {
                replace(target, name, |a| a.with_sortable(*sortable))
            }
            AttributeSchemaMutation::SetUnique { name, uniqueness } => {
                replace(target, name, |a| a.with_uniqueness(*uniqueness))
            }
            AttributeSchemaMutation::SetGloballyUnique { name, uniqueness } => {
                if target.scope != AttributeScope::Catalog {
                    return Err(SchemaError::invariant(format!(
                        "global uniqueness of attribute `{name}` can only be set on the catalog schema"
                    )));
                }
                replace(target, name, |a| a.with_global_uniqueness(*uniqueness))
            }
            AttributeSchemaMutation::SetNullable { name, nullable } => {
                replace(target, name, |a| a.with_nullable(*nullable))
            }
            AttributeSchemaMutation::SetLocalized { name, localized } => {
                replace(target, name, |a| a.with_localized(*localized))
            }
            AttributeSchemaMutation::SetRepresentative { name, representative } => {
                if matches!(target.scope, AttributeScope::Reference { .. }) {
                    return Err(SchemaError::invariant(format!(
                        "reference attribute `{name}` cannot be representative"
                    )));
                }
                replace(target, name, |a| a.with_representative(*representative))
            }
            AttributeSchemaMutation::UseGlobal { name } => use_global(target, name),
            AttributeSchemaMutation::Remove { name } => {
                if !target.attributes.contains_key(name) {
                    return Ok(None);
                }
                ensure_not_in_compound(name, target.compounds)?;
                let mut attributes = target.attributes.clone();
                attributes.remove(name);
                Ok(Some(attributes))
            }
        }
    }
}

fn create(target: &AttributeTarget<'_>, attribute: &AttributeSchema) -> Result<Option<BTreeMap<String, AttributeSchema>>> {
    let name = attribute.name();
    if let Some(existing) = target.attributes.get(name) {
        return if existing == attribute {
            Ok(None)
        } else {
            Err(SchemaError::conflict(ObjectKind::Attribute, name))
        };
    }
    match target.scope {
        AttributeScope::Entity => {
            if attribute.is_global() {
                return Err(SchemaError::invariant(format!(
                    "attribute `{name}` cannot be global outside the catalog schema"
                )));
            }
            if target.global(name).is_some() {
                return Err(SchemaError::invariant(format!(
                    "attribute `{name}` is defined globally in the catalog; link it with UseGlobal"
                )));
            }
        }
        AttributeScope::Reference { .. } | AttributeScope::Catalog => {}
    }
    attribute.validate_in(target.scope)?;
    ensure_no_conflict(ObjectKind::Attribute, name, target.taken_names())?;
    Ok(Some(target.with(attribute.clone())))
}

fn rename(target: &AttributeTarget<'_>, name: &str, new_name: &str) -> Result<Option<BTreeMap<String, AttributeSchema>>> {
    let existing = target.existing(name)?;
    if name == new_name {
        return Ok(None);
    }
    ensure_writable(target, existing)?;
    validate_name(ObjectKind::Attribute, new_name)?;
    if target.attributes.contains_key(new_name) || target.compounds.contains_key(new_name) {
        return Err(SchemaError::conflict(ObjectKind::Attribute, new_name));
    }
    ensure_not_in_compound(name, target.compounds)?;
    ensure_no_conflict(
        ObjectKind::Attribute,
        new_name,
        target.taken_names().filter(|n| *n != name),
    )?;

    let mut attributes = target.attributes.clone();
    let renamed = existing.clone().with_name(new_name);
    attributes.remove(name);
    attributes.insert(new_name.to_string(), renamed);
    Ok(Some(attributes))
}

fn use_global(target: &AttributeTarget<'_>, name: &str) -> Result<Option<BTreeMap<String, AttributeSchema>>> {
    if target.scope != AttributeScope::Entity {
        return Err(SchemaError::invariant(format!(
            "global attribute `{name}` can only be linked into an entity schema"
        )));
    }
    let global = target
        .global(name)
        .ok_or_else(|| SchemaError::not_found(ObjectKind::Attribute, name))?;
    if let Some(existing) = target.attributes.get(name) {
        return if existing == global {
            Ok(None)
        } else {
            Err(SchemaError::conflict(ObjectKind::Attribute, name))
        };
    }
    ensure_no_conflict(ObjectKind::Attribute, name, target.taken_names())?;
    Ok(Some(target.with(global.clone())))
}

/// Linked global attributes are changed on the catalog, not on the entity
fn ensure_writable(target: &AttributeTarget<'_>, existing: &AttributeSchema) -> Result<()> {
    if target.scope == AttributeScope::Entity && existing.is_global() {
        return Err(SchemaError::invariant(format!(
            "attribute `{}` is a global attribute and is read-only in entity schemas",
            existing.name()
        )));
    }
    Ok(())
}

/// Replace an existing attribute with its changed copy, if the copy differs
fn replace(
    target: &AttributeTarget<'_>,
    name: &str,
    change: impl FnOnce(AttributeSchema) -> AttributeSchema,
) -> Result<Option<BTreeMap<String, AttributeSchema>>> {
    let existing = target.existing(name)?;
    let updated = change(existing.clone());
    if &updated == existing {
        return Ok(None);
    }
    ensure_writable(target, existing)?;
    updated.validate_in(target.scope)?;
    Ok(Some(target.with(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeElement;
    use crate::types::ScalarType;

    fn map(attributes: impl IntoIterator<Item = AttributeSchema>) -> BTreeMap<String, AttributeSchema> {
        attributes
            .into_iter()
            .map(|a| (a.name().to_string(), a))
            .collect()
    }

    fn entity<'a>(
        attributes: &'a BTreeMap<String, AttributeSchema>,
        compounds: &'a BTreeMap<String, SortableAttributeCompoundSchema>,
    ) -> AttributeTarget<'a> {
        AttributeTarget {
            scope: AttributeScope::Entity,
            catalog: None,
            attributes,
            compounds,
        }
    }

    #[test]
    fn test_create_is_idempotent() {
        let ean = AttributeSchema::new("ean", ScalarType::String);
        let attributes = map([ean.clone()]);
        let compounds = BTreeMap::new();
        let result = AttributeSchemaMutation::Create(ean).mutate(&entity(&attributes, &compounds)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_create_conflict() {
        let attributes = map([AttributeSchema::new("ean", ScalarType::String)]);
        let compounds = BTreeMap::new();
        let err = AttributeSchemaMutation::Create(AttributeSchema::new("ean", ScalarType::Integer))
            .mutate(&entity(&attributes, &compounds))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_create_variant_conflict() {
        let attributes = map([AttributeSchema::new("productCode", ScalarType::String)]);
        let compounds = BTreeMap::new();
        let err = AttributeSchemaMutation::Create(AttributeSchema::new("product_code", ScalarType::String))
            .mutate(&entity(&attributes, &compounds))
            .unwrap_err();
        assert!(matches!(err, SchemaError::NameConflict { .. }));
    }

    #[test]
    fn test_modify_missing_attribute() {
        let attributes = BTreeMap::new();
        let compounds = BTreeMap::new();
        let err = AttributeSchemaMutation::SetFilterable {
            name: "code".into(),
            filterable: true,
        }
        .mutate(&entity(&attributes, &compounds))
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_set_flag_only_when_different() {
        let attributes = map([AttributeSchema::new("code", ScalarType::String).with_filterable(true)]);
        let compounds = BTreeMap::new();
        let target = entity(&attributes, &compounds);
        let same = AttributeSchemaMutation::SetFilterable {
            name: "code".into(),
            filterable: true,
        };
        assert!(same.mutate(&target).unwrap().is_none());

        let changed = AttributeSchemaMutation::SetSortable {
            name: "code".into(),
            sortable: true,
        };
        let result = changed.mutate(&target).unwrap().unwrap();
        assert!(result["code"].is_sortable());
        assert!(!attributes["code"].is_sortable());
    }

    #[test]
    fn test_modify_type_converts_default() {
        let attributes = map([
            AttributeSchema::new("priority", ScalarType::Integer).with_default_value(Some(Value::from(5i32)))
        ]);
        let compounds = BTreeMap::new();
        let target = entity(&attributes, &compounds);
        let to_long = AttributeSchemaMutation::ModifyType {
            name: "priority".into(),
            attribute_type: ScalarType::Long.into(),
            indexed_decimal_places: 0,
        };
        let result = to_long.mutate(&target).unwrap().unwrap();
        assert_eq!(result["priority"].default_value(), Some(&Value::Long(5)));

        let to_boolean = AttributeSchemaMutation::ModifyType {
            name: "priority".into(),
            attribute_type: ScalarType::Boolean.into(),
            indexed_decimal_places: 0,
        };
        assert!(to_boolean.mutate(&target).unwrap_err().is_type_mismatch());
    }

    #[test]
    fn test_reference_scope_requires_indexed_reference() {
        let attributes = map([AttributeSchema::new("order", ScalarType::Integer)]);
        let compounds = BTreeMap::new();
        let target = AttributeTarget {
            scope: AttributeScope::Reference { indexed: false },
            catalog: None,
            attributes: &attributes,
            compounds: &compounds,
        };
        let err = AttributeSchemaMutation::SetFilterable {
            name: "order".into(),
            filterable: true,
        }
        .mutate(&target)
        .unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_compound_attributes_locked() {
        let attributes = map([
            AttributeSchema::new("code", ScalarType::String),
            AttributeSchema::new("priority", ScalarType::Long),
        ]);
        let compounds = BTreeMap::from([(
            "codePriority".to_string(),
            SortableAttributeCompoundSchema::new(
                "codePriority",
                vec![AttributeElement::asc("code"), AttributeElement::asc("priority")],
            ),
        )]);
        let target = entity(&attributes, &compounds);
        let remove = AttributeSchemaMutation::Remove { name: "code".into() };
        assert!(remove.mutate(&target).is_err());
        let rename = AttributeSchemaMutation::ModifyName {
            name: "code".into(),
            new_name: "sku".into(),
        };
        assert!(rename.mutate(&target).is_err());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let attributes = BTreeMap::new();
        let compounds = BTreeMap::new();
        let remove = AttributeSchemaMutation::Remove { name: "code".into() };
        assert!(remove.mutate(&entity(&attributes, &compounds)).unwrap().is_none());
    }

    #[test]
    fn test_global_attributes() {
        let url = AttributeSchema::new("url", ScalarType::String)
            .with_global_uniqueness(GlobalAttributeUniquenessType::UniqueWithinCatalog);
        let catalog = CatalogSchema::new("shop").evolve(|c| {
            c.attributes.insert(url.name().to_string(), url.clone());
        })
        .unwrap();
        let attributes = BTreeMap::new();
        let compounds = BTreeMap::new();
        let target = AttributeTarget {
            scope: AttributeScope::Entity,
            catalog: Some(&catalog),
            attributes: &attributes,
            compounds: &compounds,
        };

        let shadow = AttributeSchemaMutation::Create(AttributeSchema::new("url", ScalarType::String));
        assert!(shadow.mutate(&target).unwrap_err().is_invariant_violation());

        let linked = AttributeSchemaMutation::UseGlobal { name: "url".into() }
            .mutate(&target)
            .unwrap()
            .unwrap();
        assert!(linked["url"].is_global());

        let target = AttributeTarget {
            attributes: &linked,
            ..target
        };
        let set = AttributeSchemaMutation::SetFilterable {
            name: "url".into(),
            filterable: true,
        };
        assert!(set.mutate(&target).unwrap_err().is_invariant_violation());

        let missing = AttributeSchemaMutation::UseGlobal { name: "other".into() };
        assert!(missing.mutate(&target).unwrap_err().is_not_found());
    }
}
