//! Editable surface over an entity snapshot

use std::sync::Arc;

use super::associated_data::AssociatedDataPayload;
use super::entity::Entity;
use super::key::{AssociatedDataKey, AttributeKey, PriceKey, ReferenceKey};
use super::merge::merge;
use super::mutation::{
    AssociatedDataMutation, AttributeMutation, EntityMutation, LocalMutation, ParentMutation, PriceMutation,
    ReferenceMutation,
};
use super::prices::{Price, PriceInnerRecordHandling};
use crate::error::Result;
use crate::schema::EntitySchema;
use crate::types::{Locale, Value};

/// Accumulates local mutations against an entity snapshot
///
/// Every mutation is applied as it is added, so invalid ones fail right away. Mutations
/// that change nothing are not recorded. The base snapshot is never touched: [`build`]
/// folds the recorded mutations onto it and [`to_mutation`] hands them out for
/// replication.
///
/// [`build`]: EntityBuilder::build
/// [`to_mutation`]: EntityBuilder::to_mutation
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    entity_type: String,
    primary_key: Option<i32>,
    base: Option<Arc<Entity>>,
    current: Arc<Entity>,
    schema: Option<Arc<EntitySchema>>,
    mutations: Vec<LocalMutation>,
}

impl EntityBuilder {
    /// Start a new entity
    pub fn new(entity_type: impl Into<String>, primary_key: Option<i32>) -> Self {
        let entity_type = entity_type.into();
        Self {
            current: Arc::new(Entity::new(entity_type.clone(), primary_key)),
            entity_type,
            primary_key,
            base: None,
            schema: None,
            mutations: Vec::new(),
        }
    }

    /// Open an existing entity for write
    pub fn open(entity: Arc<Entity>) -> Self {
        Self {
            entity_type: entity.entity_type().to_string(),
            primary_key: entity.primary_key(),
            current: Arc::clone(&entity),
            base: Some(entity),
            schema: None,
            mutations: Vec::new(),
        }
    }

    /// Validate the built entity against `schema`
    pub fn with_schema(self, schema: Arc<EntitySchema>) -> Self {
        Self {
            schema: Some(schema),
            ..self
        }
    }

    /// The entity as it would look if built now
    pub fn current(&self) -> &Entity {
        &self.current
    }

    pub fn mutations(&self) -> &[LocalMutation] {
        &self.mutations
    }

    /// Apply one mutation eagerly, recording it only if it changed something
    pub fn mutate(&mut self, mutation: impl Into<LocalMutation>) -> Result<&mut Self> {
        let mutation = mutation.into();
        let next = merge(
            Some(&self.current),
            &self.entity_type,
            self.primary_key,
            std::slice::from_ref(&mutation),
        )?;
        if !Arc::ptr_eq(&next, &self.current) {
            self.current = next;
            self.mutations.push(mutation);
        }
        Ok(self)
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.mutate(AttributeMutation::Upsert {
            key: AttributeKey::global(name),
            value: value.into(),
        })
    }

    pub fn set_localized_attribute(&mut self, name: &str, locale: Locale, value: impl Into<Value>) -> Result<&mut Self> {
        self.mutate(AttributeMutation::Upsert {
            key: AttributeKey::localized(name, locale),
            value: value.into(),
        })
    }

    pub fn remove_attribute(&mut self, name: &str) -> Result<&mut Self> {
        self.mutate(AttributeMutation::Remove {
            key: AttributeKey::global(name),
        })
    }

    pub fn remove_localized_attribute(&mut self, name: &str, locale: Locale) -> Result<&mut Self> {
        self.mutate(AttributeMutation::Remove {
            key: AttributeKey::localized(name, locale),
        })
    }

    pub fn apply_attribute_delta(&mut self, name: &str, delta: impl Into<Value>) -> Result<&mut Self> {
        self.mutate(AttributeMutation::ApplyDelta {
            key: AttributeKey::global(name),
            delta: delta.into(),
            required_range: None,
        })
    }

    pub fn set_associated_data(&mut self, name: &str, value: impl Into<AssociatedDataPayload>) -> Result<&mut Self> {
        self.mutate(AssociatedDataMutation::Upsert {
            key: AssociatedDataKey::global(name),
            value: value.into(),
        })
    }

    pub fn set_localized_associated_data(
        &mut self,
        name: &str,
        locale: Locale,
        value: impl Into<AssociatedDataPayload>,
    ) -> Result<&mut Self> {
        self.mutate(AssociatedDataMutation::Upsert {
            key: AssociatedDataKey::localized(name, locale),
            value: value.into(),
        })
    }

    pub fn remove_associated_data(&mut self, name: &str) -> Result<&mut Self> {
        self.mutate(AssociatedDataMutation::Remove {
            key: AssociatedDataKey::global(name),
        })
    }

    pub fn remove_localized_associated_data(&mut self, name: &str, locale: Locale) -> Result<&mut Self> {
        self.mutate(AssociatedDataMutation::Remove {
            key: AssociatedDataKey::localized(name, locale),
        })
    }

    pub fn set_price(&mut self, price: &Price) -> Result<&mut Self> {
        self.mutate(PriceMutation::upsert(price))
    }

    pub fn remove_price(&mut self, key: PriceKey) -> Result<&mut Self> {
        self.mutate(PriceMutation::Remove { key })
    }

    pub fn set_price_inner_record_handling(&mut self, handling: PriceInnerRecordHandling) -> Result<&mut Self> {
        self.mutate(PriceMutation::SetInnerRecordHandling { handling })
    }

    pub fn set_reference(&mut self, name: &str, primary_key: i32) -> Result<&mut Self> {
        self.mutate(ReferenceMutation::Insert {
            key: ReferenceKey::new(name, primary_key),
        })
    }

    pub fn remove_reference(&mut self, name: &str, primary_key: i32) -> Result<&mut Self> {
        self.mutate(ReferenceMutation::Remove {
            key: ReferenceKey::new(name, primary_key),
        })
    }

    pub fn set_reference_group(
        &mut self,
        name: &str,
        primary_key: i32,
        group_type: &str,
        group_primary_key: i32,
    ) -> Result<&mut Self> {
        self.mutate(ReferenceMutation::SetGroup {
            key: ReferenceKey::new(name, primary_key),
            group_type: group_type.to_string(),
            primary_key: group_primary_key,
        })
    }

    pub fn remove_reference_group(&mut self, name: &str, primary_key: i32) -> Result<&mut Self> {
        self.mutate(ReferenceMutation::RemoveGroup {
            key: ReferenceKey::new(name, primary_key),
        })
    }

    /// Mutate an attribute of an existing reference
    pub fn mutate_reference_attribute(
        &mut self,
        name: &str,
        primary_key: i32,
        mutation: AttributeMutation,
    ) -> Result<&mut Self> {
        self.mutate(ReferenceMutation::Attribute {
            key: ReferenceKey::new(name, primary_key),
            mutation,
        })
    }

    pub fn set_reference_attribute(
        &mut self,
        name: &str,
        primary_key: i32,
        attribute: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.mutate_reference_attribute(
            name,
            primary_key,
            AttributeMutation::Upsert {
                key: AttributeKey::global(attribute),
                value: value.into(),
            },
        )
    }

    pub fn set_parent(&mut self, parent: i32) -> Result<&mut Self> {
        self.mutate(ParentMutation::Set { parent })
    }

    pub fn remove_parent(&mut self) -> Result<&mut Self> {
        self.mutate(ParentMutation::Remove)
    }

    /// Fold the recorded mutations onto the base snapshot
    ///
    /// The result is one version above the base however many mutations were recorded.
    pub fn build(&self) -> Result<Arc<Entity>> {
        let entity = merge(self.base.as_ref(), &self.entity_type, self.primary_key, &self.mutations)?;
        if let Some(schema) = &self.schema {
            entity.validate(schema)?;
        }
        Ok(entity)
    }

    /// The recorded mutations as an entity mutation, `None` when nothing changed
    pub fn to_mutation(&self) -> Option<EntityMutation> {
        (!self.mutations.is_empty()).then(|| EntityMutation::Upsert {
            entity_type: self.entity_type.clone(),
            primary_key: self.primary_key,
            mutations: self.mutations.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeSchema;
    use crate::types::{Currency, ScalarType};
    use rust_decimal::Decimal;

    #[test]
    fn test_build_bumps_version_once() {
        let mut builder = EntityBuilder::new("Product", Some(1));
        builder
            .set_attribute("code", "P-1")
            .unwrap()
            .set_attribute("code", "P-2")
            .unwrap()
            .set_reference("brand", 3)
            .unwrap()
            .set_reference_attribute("brand", 3, "order", 1i32)
            .unwrap();
        let first = builder.build().unwrap();
        assert_eq!(first.version(), 1);
        assert_eq!(first.attribute("code"), Some(&Value::from("P-2")));

        let mut builder = EntityBuilder::open(Arc::clone(&first));
        builder
            .set_attribute("code", "P-3")
            .unwrap()
            .remove_reference("brand", 3)
            .unwrap()
            .set_parent(9)
            .unwrap();
        let second = builder.build().unwrap();
        assert_eq!(second.version(), 2);
        assert_eq!(second.references().count(), 0);
        assert_eq!(first.attribute("code"), Some(&Value::from("P-2")));
    }

    #[test]
    fn test_noops_not_recorded() {
        let mut builder = EntityBuilder::new("Product", Some(1));
        builder
            .remove_attribute("absent")
            .unwrap()
            .set_attribute("code", "P-1")
            .unwrap()
            .set_attribute("code", "P-1")
            .unwrap();
        assert_eq!(builder.mutations().len(), 1);
        assert!(EntityBuilder::new("Product", None).to_mutation().is_none());
    }

    #[test]
    fn test_to_mutation_replays_to_same_entity() {
        let key = PriceKey::new(1, "basic", Currency::new("EUR").unwrap());
        let price = Price::new(key, None, Decimal::TEN, Decimal::ZERO, Decimal::TEN, None, true).unwrap();
        let mut builder = EntityBuilder::new("Product", Some(5));
        builder
            .set_price(&price)
            .unwrap()
            .set_price_inner_record_handling(PriceInnerRecordHandling::LowestPrice)
            .unwrap()
            .set_associated_data("manual", "m.pdf")
            .unwrap();
        let built = builder.build().unwrap();
        let replayed = builder.to_mutation().unwrap().apply(None).unwrap();
        assert_eq!(built, replayed);
    }

    #[test]
    fn test_schema_validation_on_build() {
        let schema = EntitySchema::with_evolution("Product", []).evolve(|s| {
            let code = AttributeSchema::new("code", ScalarType::String);
            s.attributes.insert(code.name().to_string(), code);
        })
        .unwrap();
        let mut builder = EntityBuilder::new("Product", Some(1)).with_schema(Arc::new(schema));
        builder.set_attribute("code", 10i32).unwrap();
        assert!(builder.build().unwrap_err().is_type_mismatch());
    }
}
