//! Schema mutation engine
//!
//! Every structural change is one variant of a closed mutation enum. Applying a mutation
//! is a pure function from one schema to the next:
//!
//! - create: appends the definition; an identical existing definition is a no-op and a
//!   different one is a [`crate::SchemaError::Conflict`]
//! - modify / set: fails with [`crate::SchemaError::NotFound`] when the target is missing and
//!   bumps the version only if the definition actually changes
//! - remove: removing something absent is a no-op
//!
//! No-ops return the input unchanged (the same `Arc` for the `apply` entry points), so a
//! mutation log can be replayed safely.

pub mod associated_data;
pub mod attribute;
pub mod catalog;
pub mod compound;
pub mod entity;
pub mod reference;

pub use associated_data::AssociatedDataSchemaMutation;
pub use attribute::AttributeSchemaMutation;
pub use catalog::{CatalogSchemaMutation, ModifyCatalogSchemaMutation};
pub use compound::SortableAttributeCompoundSchemaMutation;
pub use entity::{EntitySchemaMutation, ModifyEntitySchemaMutation};
pub use reference::ReferenceSchemaMutation;

use serde::{Deserialize, Serialize};

/// A committed schema change, as handed to the transport and to the schema cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaChange {
    Catalog(ModifyCatalogSchemaMutation),
    Entity(ModifyEntitySchemaMutation),
    EntityRemoved { entity_type: String },
}

impl SchemaChange {
    /// The entity type affected, if any
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            SchemaChange::Catalog(_) => None,
            SchemaChange::Entity(modify) => Some(&modify.entity_type),
            SchemaChange::EntityRemoved { entity_type } => Some(entity_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let change = SchemaChange::Entity(ModifyEntitySchemaMutation::new(
            "Product",
            vec![EntitySchemaMutation::Attribute(AttributeSchemaMutation::Remove {
                name: "code".into(),
            })],
        ));
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["entity"]["entity_type"], "Product");
        assert_eq!(
            json["entity"]["mutations"][0]["attribute"]["remove"]["name"],
            "code"
        );
        let restored: SchemaChange = serde_json::from_value(json).unwrap();
        assert_eq!(restored, change);
        assert_eq!(restored.entity_type(), Some("Product"));
    }
}
