//! Local (data level) entity mutations
//!
//! Each local mutation targets one record of one container and computes the next record
//! from the record currently held for its key. Versions are assigned here: a new record
//! starts at 1 and a replacement is one above the record it replaces. Replicated records
//! carry the version they were produced with, which is what lets a merge drop stale ones.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::associated_data::{AssociatedDataPayload, AssociatedDataValue};
use super::attributes::{AttributeValue, Attributes};
use super::key::{AssociatedDataKey, AttributeKey, LocalizedKey, PriceKey, ReferenceKey};
use super::prices::{Price, PriceInnerRecordHandling};
use super::reference::{GroupEntityReference, Reference};
use crate::error::{next_version, ObjectKind, Result, SchemaError};
use crate::types::{DateTimeRange, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeMutation {
    Upsert {
        key: AttributeKey,
        value: Value,
    },
    Remove {
        key: AttributeKey,
    },
    /// Add a numeric delta to the current value, optionally requiring the result to stay
    /// within a range of the same numeric type
    ApplyDelta {
        key: AttributeKey,
        delta: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        required_range: Option<Value>,
    },
    /// A record produced elsewhere, applied as is
    Replicated(AttributeValue),
}

impl AttributeMutation {
    pub fn key(&self) -> &AttributeKey {
        match self {
            AttributeMutation::Upsert { key, .. }
            | AttributeMutation::Remove { key }
            | AttributeMutation::ApplyDelta { key, .. } => key,
            AttributeMutation::Replicated(value) => value.key(),
        }
    }

    /// The record replacing `existing`, or `None` when the mutation changes nothing
    pub fn mutate(&self, existing: Option<&AttributeValue>) -> Result<Option<AttributeValue>> {
        let live = existing.filter(|v| !v.is_dropped());
        match self {
            AttributeMutation::Upsert { key, value } => {
                value.check_supported()?;
                Ok(match (existing, live) {
                    (_, Some(current)) if current.value() == value => None,
                    (Some(current), _) => Some(current.replaced(value.clone())?),
                    (None, _) => Some(AttributeValue::new(key.clone(), value.clone())),
                })
            }
            AttributeMutation::Remove { .. } => live.map(AttributeValue::tombstone).transpose(),
            AttributeMutation::ApplyDelta {
                key,
                delta,
                required_range,
            } => {
                let current = live.ok_or_else(|| SchemaError::not_found(ObjectKind::Attribute, key.to_string()))?;
                let next = current.value().checked_add(delta)?;
                if let Some(range) = required_range {
                    match next.within(range) {
                        Some(true) => {}
                        Some(false) => {
                            return Err(SchemaError::invariant(format!(
                                "attribute `{key}` would become {next}, outside the required range {range}"
                            )))
                        }
                        None => {
                            return Err(SchemaError::type_mismatch(
                                key.name(),
                                range.type_label(),
                                next.type_label(),
                            ))
                        }
                    }
                }
                Ok(Some(current.replaced(next)?))
            }
            AttributeMutation::Replicated(value) => Ok(Some(value.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssociatedDataMutation {
    Upsert {
        key: AssociatedDataKey,
        value: AssociatedDataPayload,
    },
    Remove {
        key: AssociatedDataKey,
    },
}

impl AssociatedDataMutation {
    pub fn key(&self) -> &AssociatedDataKey {
        match self {
            AssociatedDataMutation::Upsert { key, .. } | AssociatedDataMutation::Remove { key } => key,
        }
    }

    pub fn mutate(&self, existing: Option<&AssociatedDataValue>) -> Result<Option<AssociatedDataValue>> {
        let live = existing.filter(|v| !v.is_dropped());
        match self {
            AssociatedDataMutation::Upsert { key, value } => {
                if let AssociatedDataPayload::Value(value) = value {
                    value.check_supported()?;
                }
                Ok(match (existing, live) {
                    (_, Some(current)) if current.value() == value => None,
                    (Some(current), _) => Some(current.replaced(value.clone())?),
                    (None, _) => Some(AssociatedDataValue::new(key.clone(), value.clone())),
                })
            }
            AssociatedDataMutation::Remove { .. } => live.map(AssociatedDataValue::tombstone).transpose(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriceMutation {
    Upsert {
        key: PriceKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inner_record_id: Option<i32>,
        price_without_tax: Decimal,
        tax_rate: Decimal,
        price_with_tax: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validity: Option<DateTimeRange>,
        sellable: bool,
    },
    Remove {
        key: PriceKey,
    },
    SetInnerRecordHandling {
        handling: PriceInnerRecordHandling,
    },
}

impl PriceMutation {
    /// Upsert of an existing price definition
    pub fn upsert(price: &Price) -> Self {
        PriceMutation::Upsert {
            key: price.key().clone(),
            inner_record_id: price.inner_record_id(),
            price_without_tax: price.price_without_tax(),
            tax_rate: price.tax_rate(),
            price_with_tax: price.price_with_tax(),
            validity: price.validity().cloned(),
            sellable: price.is_sellable(),
        }
    }

    /// Key of the targeted price; `None` for container level mutations
    pub fn key(&self) -> Option<&PriceKey> {
        match self {
            PriceMutation::Upsert { key, .. } | PriceMutation::Remove { key } => Some(key),
            PriceMutation::SetInnerRecordHandling { .. } => None,
        }
    }

    /// The price replacing `existing`; container level mutations return `None`
    pub fn mutate(&self, existing: Option<&Price>) -> Result<Option<Price>> {
        let live = existing.filter(|p| !p.is_dropped());
        match self {
            PriceMutation::Upsert {
                key,
                inner_record_id,
                price_without_tax,
                tax_rate,
                price_with_tax,
                validity,
                sellable,
            } => {
                let price = Price::new(
                    key.clone(),
                    *inner_record_id,
                    *price_without_tax,
                    *tax_rate,
                    *price_with_tax,
                    validity.clone(),
                    *sellable,
                )?;
                Ok(match (existing, live) {
                    (_, Some(current)) if !current.differs_from(&price) => None,
                    (Some(current), _) => Some(price.with_version(next_version(ObjectKind::Price, key, current.version())?)),
                    (None, _) => Some(price),
                })
            }
            PriceMutation::Remove { .. } => live.map(Price::tombstone).transpose(),
            PriceMutation::SetInnerRecordHandling { .. } => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceMutation {
    Insert {
        key: ReferenceKey,
    },
    Remove {
        key: ReferenceKey,
    },
    SetGroup {
        key: ReferenceKey,
        group_type: String,
        primary_key: i32,
    },
    RemoveGroup {
        key: ReferenceKey,
    },
    /// Mutate an attribute of an existing reference
    Attribute {
        key: ReferenceKey,
        mutation: AttributeMutation,
    },
}

impl ReferenceMutation {
    pub fn key(&self) -> &ReferenceKey {
        match self {
            ReferenceMutation::Insert { key }
            | ReferenceMutation::Remove { key }
            | ReferenceMutation::SetGroup { key, .. }
            | ReferenceMutation::RemoveGroup { key }
            | ReferenceMutation::Attribute { key, .. } => key,
        }
    }

    pub fn mutate(&self, existing: Option<&Reference>) -> Result<Option<Reference>> {
        let live = existing.filter(|r| !r.is_dropped());
        match self {
            ReferenceMutation::Insert { key } => Ok(match (existing, live) {
                (_, Some(_)) => None,
                (Some(dropped), None) => Some(
                    Reference::new(key.clone()).with_version(next_version(ObjectKind::Reference, key, dropped.version())?),
                ),
                (None, None) => Some(Reference::new(key.clone())),
            }),
            ReferenceMutation::Remove { .. } => live.map(Reference::tombstone).transpose(),
            ReferenceMutation::SetGroup {
                key,
                group_type,
                primary_key,
            } => {
                let current = require_live(key, live)?;
                if let Some(group) = current.group() {
                    if group.group_type() == group_type && group.primary_key() == *primary_key {
                        return Ok(None);
                    }
                }
                let version = match current.group_record() {
                    Some(held) => next_version(ObjectKind::Reference, held.group_type(), held.version())?,
                    None => 1,
                };
                let group = GroupEntityReference::new(group_type.clone(), *primary_key).with_version(version);
                Ok(Some(bumped(current)?.with_group(Some(group))))
            }
            ReferenceMutation::RemoveGroup { key } => {
                let current = require_live(key, live)?;
                current
                    .group()
                    .map(|group| -> Result<Reference> { Ok(bumped(current)?.with_group(Some(group.tombstone()?))) })
                    .transpose()
            }
            ReferenceMutation::Attribute { key, mutation } => {
                let current = require_live(key, live)?;
                let held = current.attributes().record(mutation.key());
                let Some(next) = mutation.mutate(held)? else {
                    return Ok(None);
                };
                if held.is_some_and(|h| next.version() <= h.version()) {
                    return Ok(None);
                }
                let attributes: Attributes = current.attributes().merged([next])?;
                Ok(Some(bumped(current)?.with_attributes(attributes)))
            }
        }
    }
}

fn require_live<'a>(key: &ReferenceKey, live: Option<&'a Reference>) -> Result<&'a Reference> {
    live.ok_or_else(|| SchemaError::not_found(ObjectKind::Reference, key.to_string()))
}

fn bumped(reference: &Reference) -> Result<Reference> {
    let version = next_version(ObjectKind::Reference, reference.key(), reference.version())?;
    Ok(reference.clone().with_version(version))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParentMutation {
    Set { parent: i32 },
    Remove,
}

impl ParentMutation {
    /// The parent after the mutation, or `None` when it stays as it is
    pub fn mutate(&self, existing: Option<i32>) -> Option<Option<i32>> {
        let next = match self {
            ParentMutation::Set { parent } => Some(*parent),
            ParentMutation::Remove => None,
        };
        (next != existing).then_some(next)
    }
}

/// One data level change of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocalMutation {
    Attribute(AttributeMutation),
    AssociatedData(AssociatedDataMutation),
    Price(PriceMutation),
    Reference(ReferenceMutation),
    Parent(ParentMutation),
}

impl From<AttributeMutation> for LocalMutation {
    fn from(mutation: AttributeMutation) -> Self {
        LocalMutation::Attribute(mutation)
    }
}

impl From<AssociatedDataMutation> for LocalMutation {
    fn from(mutation: AssociatedDataMutation) -> Self {
        LocalMutation::AssociatedData(mutation)
    }
}

impl From<PriceMutation> for LocalMutation {
    fn from(mutation: PriceMutation) -> Self {
        LocalMutation::Price(mutation)
    }
}

impl From<ReferenceMutation> for LocalMutation {
    fn from(mutation: ReferenceMutation) -> Self {
        LocalMutation::Reference(mutation)
    }
}

impl From<ParentMutation> for LocalMutation {
    fn from(mutation: ParentMutation) -> Self {
        LocalMutation::Parent(mutation)
    }
}

/// Entity level change envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityMutation {
    Upsert {
        entity_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        primary_key: Option<i32>,
        mutations: Vec<LocalMutation>,
    },
    Remove {
        entity_type: String,
        primary_key: i32,
    },
}

impl EntityMutation {
    pub fn entity_type(&self) -> &str {
        match self {
            EntityMutation::Upsert { entity_type, .. } | EntityMutation::Remove { entity_type, .. } => entity_type,
        }
    }

    pub fn primary_key(&self) -> Option<i32> {
        match self {
            EntityMutation::Upsert { primary_key, .. } => *primary_key,
            EntityMutation::Remove { primary_key, .. } => Some(*primary_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Currency, Locale, NumberRange};

    fn sku() -> AttributeKey {
        AttributeKey::global("sku")
    }

    #[test]
    fn test_attribute_upsert_versions() {
        let upsert = AttributeMutation::Upsert {
            key: sku(),
            value: "A-1".into(),
        };
        let created = upsert.mutate(None).unwrap().unwrap();
        assert_eq!(created.version(), 1);
        assert!(upsert.mutate(Some(&created)).unwrap().is_none());

        let changed = AttributeMutation::Upsert {
            key: sku(),
            value: "A-2".into(),
        }
        .mutate(Some(&created))
        .unwrap()
        .unwrap();
        assert_eq!(changed.version(), 2);

        let revived = upsert.mutate(Some(&created.tombstone().unwrap())).unwrap().unwrap();
        assert_eq!(revived.version(), 3);
        assert!(!revived.is_dropped());
    }

    #[test]
    fn test_exhausted_version_counter() {
        let held = AttributeValue::with_version(u32::MAX, sku(), "A-1");
        let upsert = AttributeMutation::Upsert {
            key: sku(),
            value: "A-2".into(),
        };
        assert!(upsert.mutate(Some(&held)).unwrap_err().is_invariant_violation());
        let remove = AttributeMutation::Remove { key: sku() };
        assert!(remove.mutate(Some(&held)).unwrap_err().is_invariant_violation());
    }

    #[test]
    fn test_attribute_remove_absent_is_noop() {
        let remove = AttributeMutation::Remove { key: sku() };
        assert!(remove.mutate(None).unwrap().is_none());
        let value = AttributeValue::new(sku(), "A-1");
        let tombstone = remove.mutate(Some(&value)).unwrap().unwrap();
        assert!(tombstone.is_dropped());
        assert!(remove.mutate(Some(&tombstone)).unwrap().is_none());
    }

    #[test]
    fn test_apply_delta() {
        let key = AttributeKey::global("stock");
        let current = AttributeValue::new(key.clone(), 5i32);
        let delta = AttributeMutation::ApplyDelta {
            key: key.clone(),
            delta: Value::Integer(-3),
            required_range: Some(Value::IntegerNumberRange(NumberRange::at_least(0))),
        };
        let next = delta.mutate(Some(&current)).unwrap().unwrap();
        assert_eq!(next.value(), &Value::Integer(2));

        let err = delta.mutate(Some(&next)).unwrap_err();
        assert!(err.is_invariant_violation());
        assert!(delta.mutate(None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_price_upsert_ignores_identical() {
        let key = PriceKey::new(1, "basic", Currency::new("EUR").unwrap());
        let upsert = PriceMutation::Upsert {
            key,
            inner_record_id: None,
            price_without_tax: Decimal::new(100, 0),
            tax_rate: Decimal::new(21, 0),
            price_with_tax: Decimal::new(121, 0),
            validity: None,
            sellable: true,
        };
        let price = upsert.mutate(None).unwrap().unwrap();
        assert!(upsert.mutate(Some(&price)).unwrap().is_none());
        assert_eq!(PriceMutation::upsert(&price), upsert);
    }

    #[test]
    fn test_reference_mutations() {
        let key = ReferenceKey::new("brand", 3);
        let inserted = ReferenceMutation::Insert { key: key.clone() }.mutate(None).unwrap().unwrap();

        let grouped = ReferenceMutation::SetGroup {
            key: key.clone(),
            group_type: "BrandGroup".into(),
            primary_key: 1,
        }
        .mutate(Some(&inserted))
        .unwrap()
        .unwrap();
        assert_eq!(grouped.version(), 2);
        assert_eq!(grouped.group().map(GroupEntityReference::primary_key), Some(1));

        let attributed = ReferenceMutation::Attribute {
            key: key.clone(),
            mutation: AttributeMutation::Upsert {
                key: AttributeKey::localized("label", Locale::new("en").unwrap()),
                value: "Official".into(),
            },
        }
        .mutate(Some(&grouped))
        .unwrap()
        .unwrap();
        assert_eq!(attributed.version(), 3);
        assert_eq!(attributed.attributes().len(), 1);

        let ungrouped = ReferenceMutation::RemoveGroup { key: key.clone() }
            .mutate(Some(&attributed))
            .unwrap()
            .unwrap();
        assert!(ungrouped.group().is_none());
        assert!(ReferenceMutation::RemoveGroup { key: key.clone() }
            .mutate(Some(&ungrouped))
            .unwrap()
            .is_none());

        let missing = ReferenceMutation::SetGroup {
            key: ReferenceKey::new("brand", 4),
            group_type: "BrandGroup".into(),
            primary_key: 1,
        };
        assert!(missing.mutate(None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_serde_shape() {
        let mutation = LocalMutation::from(AttributeMutation::Remove { key: sku() });
        let json = serde_json::to_value(&mutation).unwrap();
        assert_eq!(json, serde_json::json!({"attribute": {"remove": {"key": {"name": "sku"}}}}));
    }
}
