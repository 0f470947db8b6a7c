//! Entity data: versioned value containers, the entity snapshot and its mutations
//!
//! Records are never removed physically. Removal leaves a tombstone one version above the
//! removed record, so incremental changes can be replicated and replayed.

mod container;

pub mod associated_data;
pub mod attributes;
pub mod builder;
pub mod entity;
pub mod key;
pub mod merge;
pub mod mutation;
pub mod prices;
pub mod reference;

pub use associated_data::{AssociatedData, AssociatedDataPayload, AssociatedDataValue};
pub use attributes::{AttributeValue, Attributes};
pub use builder::EntityBuilder;
pub use container::{Keyed, Versioned};
pub use entity::{Entity, EntityParts};
pub use key::{AssociatedDataKey, AttributeKey, LocalizedKey, PriceKey, ReferenceKey};
pub use merge::merge;
pub use mutation::{
    AssociatedDataMutation, AttributeMutation, EntityMutation, LocalMutation, ParentMutation, PriceMutation,
    ReferenceMutation,
};
pub use prices::{Price, PriceForSale, PriceInnerRecordHandling, Prices};
pub use reference::{GroupEntityReference, Reference};
