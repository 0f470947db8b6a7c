//! Folding local mutations onto an entity snapshot
//!
//! Mutated records are accumulated per container, keyed like the container itself. A
//! mutated record is kept only when its version is strictly greater than the record held
//! for the key so far (accumulated, else the base entity's), so replayed or out of order
//! mutations are dropped. Containers nothing touched are shared with the base entity.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use super::associated_data::AssociatedDataValue;
use super::attributes::{AttributeValue, Attributes};
use super::entity::Entity;
use super::key::{AssociatedDataKey, AttributeKey, PriceKey, ReferenceKey};
use super::mutation::{EntityMutation, LocalMutation, PriceMutation};
use super::prices::{Price, PriceInnerRecordHandling, Prices};
use super::reference::Reference;
use crate::error::{next_version, ObjectKind, Result, SchemaError};
use crate::schema::EntitySchema;

#[derive(Default)]
struct Accumulator {
    attributes: BTreeMap<AttributeKey, AttributeValue>,
    associated_data: BTreeMap<AssociatedDataKey, AssociatedDataValue>,
    prices: BTreeMap<PriceKey, Price>,
    price_handling: Option<PriceInnerRecordHandling>,
    references: BTreeMap<ReferenceKey, Reference>,
    parent: Option<Option<i32>>,
}

/// Keep `next` under `key` when it is newer than the record held so far
fn keep_newer<K: Ord + std::fmt::Display, V>(
    accumulated: &mut BTreeMap<K, V>,
    key: K,
    held: Option<u32>,
    next: Option<(u32, V)>,
) {
    let Some((version, record)) = next else {
        return;
    };
    match held {
        Some(held) if version <= held => {
            trace!(%key, version, held, "dropping stale local mutation");
        }
        _ => {
            accumulated.insert(key, record);
        }
    }
}

/// Fold `mutations` in order onto `base`, or onto a fresh entity when there is none
///
/// Returns `base` itself (or a fresh empty entity) when nothing changed. Otherwise the
/// result is one version above `base`, or version 1 for a new entity.
pub fn merge(
    base: Option<&Arc<Entity>>,
    entity_type: &str,
    primary_key: Option<i32>,
    mutations: &[LocalMutation],
) -> Result<Arc<Entity>> {
    if let Some(base) = base {
        if base.entity_type() != entity_type {
            return Err(SchemaError::invariant(format!(
                "mutations for `{entity_type}` cannot be applied to an entity of type `{}`",
                base.entity_type()
            )));
        }
        if primary_key.is_some() && base.primary_key() != primary_key {
            return Err(SchemaError::invariant(format!(
                "mutations for `{entity_type}` {primary_key:?} cannot be applied to entity {:?}",
                base.primary_key()
            )));
        }
    }
    let empty = Entity::new(entity_type, primary_key);
    let snapshot: &Entity = base.map_or(&empty, |b| b.as_ref());

    let mut acc = Accumulator::default();
    for mutation in mutations {
        match mutation {
            LocalMutation::Attribute(m) => {
                let key = m.key();
                let existing = acc.attributes.get(key).or_else(|| snapshot.attributes().record(key));
                let held = existing.map(AttributeValue::version);
                let next = m.mutate(existing)?.map(|v| (v.version(), v));
                keep_newer(&mut acc.attributes, key.clone(), held, next);
            }
            LocalMutation::AssociatedData(m) => {
                let key = m.key();
                let existing = acc
                    .associated_data
                    .get(key)
                    .or_else(|| snapshot.associated_data().record(key));
                let held = existing.map(AssociatedDataValue::version);
                let next = m.mutate(existing)?.map(|v| (v.version(), v));
                keep_newer(&mut acc.associated_data, key.clone(), held, next);
            }
            LocalMutation::Price(m) => match m.key() {
                Some(key) => {
                    let existing = acc.prices.get(key).or_else(|| snapshot.prices().record(key));
                    let held = existing.map(Price::version);
                    let next = m.mutate(existing)?.map(|p| (p.version(), p));
                    keep_newer(&mut acc.prices, key.clone(), held, next);
                }
                None => {
                    if let PriceMutation::SetInnerRecordHandling { handling } = m {
                        let current = acc
                            .price_handling
                            .unwrap_or_else(|| snapshot.prices().price_inner_record_handling());
                        if *handling != current {
                            acc.price_handling = Some(*handling);
                        }
                    }
                }
            },
            LocalMutation::Reference(m) => {
                let key = m.key();
                let existing = acc
                    .references
                    .get(key)
                    .or_else(|| snapshot.references_shared().get(key));
                let held = existing.map(Reference::version);
                let next = m.mutate(existing)?.map(|r| (r.version(), r));
                keep_newer(&mut acc.references, key.clone(), held, next);
            }
            LocalMutation::Parent(m) => {
                let current = acc.parent.unwrap_or(snapshot.parent());
                if let Some(next) = m.mutate(current) {
                    acc.parent = Some(next);
                }
            }
        }
    }

    let parent = acc.parent.unwrap_or(snapshot.parent());
    let parent_changed = parent != snapshot.parent();
    let attributes = rebuild_attributes(snapshot, &mut acc)?;
    let associated_data = if acc.associated_data.is_empty() {
        None
    } else {
        Some(Arc::new(
            snapshot
                .associated_data()
                .merged(std::mem::take(&mut acc.associated_data).into_values())?,
        ))
    };
    let prices = rebuild_prices(snapshot, base.is_some(), &mut acc)?;
    let references = if acc.references.is_empty() {
        None
    } else {
        let mut merged = snapshot.references_shared().as_ref().clone();
        merged.extend(std::mem::take(&mut acc.references));
        Some(Arc::new(merged))
    };

    let changed =
        parent_changed || attributes.is_some() || associated_data.is_some() || prices.is_some() || references.is_some();
    if !changed {
        trace!(entity_type, ?primary_key, "local mutations changed nothing");
        return Ok(match base {
            Some(base) => Arc::clone(base),
            None => Arc::new(empty),
        });
    }

    let version = match base {
        Some(base) => next_version(ObjectKind::Entity, entity_type, base.version())?,
        None => 1,
    };
    debug!(entity_type, ?primary_key, version, "entity merged");
    Ok(Arc::new(Entity::assemble(
        entity_type.to_string(),
        version,
        snapshot.primary_key().or(primary_key),
        parent,
        attributes.unwrap_or_else(|| Arc::clone(snapshot.attributes_shared())),
        associated_data.unwrap_or_else(|| Arc::clone(snapshot.associated_data_shared())),
        prices.unwrap_or_else(|| Arc::clone(snapshot.prices_shared())),
        references.unwrap_or_else(|| Arc::clone(snapshot.references_shared())),
        false,
    )))
}

fn rebuild_attributes(snapshot: &Entity, acc: &mut Accumulator) -> Result<Option<Arc<Attributes>>> {
    if acc.attributes.is_empty() {
        return Ok(None);
    }
    let updates = std::mem::take(&mut acc.attributes).into_values();
    Ok(Some(Arc::new(snapshot.attributes().merged(updates)?)))
}

fn rebuild_prices(snapshot: &Entity, has_base: bool, acc: &mut Accumulator) -> Result<Option<Arc<Prices>>> {
    if acc.prices.is_empty() && acc.price_handling.is_none() {
        return Ok(None);
    }
    let (version, handling, mut prices) = snapshot.prices().clone().into_parts();
    prices.extend(std::mem::take(&mut acc.prices));
    let version = if has_base {
        next_version(ObjectKind::Price, "prices", version)?
    } else {
        version
    };
    Ok(Some(Arc::new(Prices::new(
        version,
        acc.price_handling.unwrap_or(handling),
        prices.into_values(),
    )?)))
}

impl EntityMutation {
    /// Apply to the current snapshot of the entity, `None` when it doesn't exist yet
    pub fn apply(&self, base: Option<&Arc<Entity>>) -> Result<Arc<Entity>> {
        match self {
            EntityMutation::Upsert {
                entity_type,
                primary_key,
                mutations,
            } => merge(base, entity_type, *primary_key, mutations),
            EntityMutation::Remove {
                entity_type,
                primary_key,
            } => {
                let base = base
                    .filter(|b| b.entity_type() == entity_type && b.primary_key() == Some(*primary_key))
                    .ok_or_else(|| SchemaError::not_found(ObjectKind::Entity, format!("{entity_type}:{primary_key}")))?;
                if base.is_dropped() {
                    return Ok(Arc::clone(base));
                }
                debug!(entity_type = %entity_type, primary_key, "entity removed");
                Ok(Arc::new(Entity::assemble(
                    entity_type.clone(),
                    next_version(ObjectKind::Entity, entity_type, base.version())?,
                    base.primary_key(),
                    base.parent(),
                    Arc::clone(base.attributes_shared()),
                    Arc::clone(base.associated_data_shared()),
                    Arc::clone(base.prices_shared()),
                    Arc::clone(base.references_shared()),
                    true,
                )))
            }
        }
    }

    /// Apply and validate a changed result against `schema`
    pub fn apply_with_schema(&self, schema: &EntitySchema, base: Option<&Arc<Entity>>) -> Result<Arc<Entity>> {
        let next = self.apply(base)?;
        let unchanged = base.is_some_and(|b| Arc::ptr_eq(b, &next));
        if !unchanged && !next.is_dropped() {
            next.validate(schema)?;
        }
        Ok(next)
    }
}
