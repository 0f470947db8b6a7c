//! Immutable schema definitions
//!
//! Schemas describe what an entity type or a catalog allows, not what exists. They are
//! never changed in place: the [`crate::mutation`] engine produces a new instance for every
//! structural change and leaves the old one valid for anyone still holding it.
//!
//! Every schema object answers lookups by canonical name and by any naming-convention
//! variant of it (see [`crate::naming`]).

pub mod associated_data;
pub mod attribute;
pub mod builder;
pub mod catalog;
pub mod compound;
pub mod entity;
pub mod reference;

pub use associated_data::AssociatedDataSchema;
pub use attribute::{
    AttributeSchema, AttributeScope, AttributeUniquenessType, EntityAttributeExtension,
    GlobalAttributeExtension, GlobalAttributeUniquenessType,
};
pub use builder::{CatalogSchemaBuilder, EntitySchemaBuilder, ReferenceSchemaEditor};
pub use catalog::{CatalogEvolutionMode, CatalogSchema};
pub use compound::{AttributeElement, OrderBehaviour, OrderDirection, SortableAttributeCompoundSchema};
pub use entity::{EntitySchema, EvolutionMode};
pub use reference::{Cardinality, ReferenceSchema};

use std::collections::BTreeMap;

use crate::error::{ObjectKind, Result, SchemaError};
use crate::naming::{ensure_no_conflict, NameIndex, NamingConvention};
use crate::types::Locale;

/// Resolves attribute definitions for values being stored in a container
pub trait AttributeSchemaProvider {
    fn attribute_schema(&self, name: &str) -> Option<&AttributeSchema>;

    /// Whether attributes without a definition may be stored (and later added to the schema)
    fn allows_implicit_attributes(&self) -> bool;

    /// Whether values in this locale may be stored
    fn locale_allowed(&self, locale: &Locale) -> bool;
}

/// Attributes of one reference, resolved within its entity schema
#[derive(Debug, Clone, Copy)]
pub struct ReferenceAttributeScope<'a> {
    pub entity: &'a EntitySchema,
    pub reference: &'a ReferenceSchema,
}

impl AttributeSchemaProvider for ReferenceAttributeScope<'_> {
    fn attribute_schema(&self, name: &str) -> Option<&AttributeSchema> {
        self.reference.attribute(name)
    }

    fn allows_implicit_attributes(&self) -> bool {
        self.entity.allows(EvolutionMode::AddingAttributes)
    }

    fn locale_allowed(&self, locale: &Locale) -> bool {
        self.entity.locale_allowed(locale)
    }
}

/// Lookup by the variant of a name in `convention`
pub(crate) fn lookup_by_variant<'a, T>(
    map: &'a BTreeMap<String, T>,
    index: &NameIndex,
    variant: &str,
    convention: NamingConvention,
) -> Option<&'a T> {
    index.resolve(variant, convention).and_then(|canonical| map.get(canonical))
}

pub(crate) fn index_names<T>(map: &BTreeMap<String, T>) -> NameIndex {
    NameIndex::build(map.keys().map(String::as_str))
}

/// Attributes and sortable attribute compounds share one namespace
pub(crate) fn check_attribute_namespace(
    attributes: &BTreeMap<String, AttributeSchema>,
    compounds: &BTreeMap<String, SortableAttributeCompoundSchema>,
) -> Result<()> {
    for name in compounds.keys() {
        if attributes.contains_key(name) {
            return Err(SchemaError::invariant(format!(
                "sortable attribute compound `{name}` clashes with an attribute of the same name"
            )));
        }
        ensure_no_conflict(
            ObjectKind::SortableAttributeCompound,
            name,
            attributes.keys().map(String::as_str),
        )?;
    }
    Ok(())
}

/// Fail unless no compound uses the attribute
pub(crate) fn ensure_not_in_compound(
    attribute_name: &str,
    compounds: &BTreeMap<String, SortableAttributeCompoundSchema>,
) -> Result<()> {
    match compounds.values().find(|c| c.uses_attribute(attribute_name)) {
        Some(compound) => Err(SchemaError::invariant(format!(
            "attribute `{attribute_name}` is used by sortable attribute compound `{}`",
            compound.name()
        ))),
        None => Ok(()),
    }
}
