//! References from an entity to other entities

use serde::{Deserialize, Serialize};

use super::attributes::Attributes;
use super::key::ReferenceKey;
use crate::error::{next_version, ObjectKind, Result};

/// Group the referenced entity belongs to (e.g. the parameter type of a parameter value)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntityReference {
    version: u32,
    group_type: String,
    primary_key: i32,
    #[serde(default)]
    dropped: bool,
}

impl GroupEntityReference {
    pub fn new(group_type: impl Into<String>, primary_key: i32) -> Self {
        Self {
            version: 1,
            group_type: group_type.into(),
            primary_key,
            dropped: false,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn group_type(&self) -> &str {
        &self.group_type
    }

    pub fn primary_key(&self) -> i32 {
        self.primary_key
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    pub(crate) fn with_version(self, version: u32) -> Self {
        Self { version, ..self }
    }

    pub(crate) fn tombstone(&self) -> Result<Self> {
        Ok(Self {
            version: next_version(ObjectKind::Reference, &self.group_type, self.version)?,
            dropped: true,
            ..self.clone()
        })
    }

    fn differs_from(&self, other: &GroupEntityReference) -> bool {
        self.group_type != other.group_type
            || self.primary_key != other.primary_key
            || self.dropped != other.dropped
    }
}

/// One relation instance, carrying its own attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    version: u32,
    key: ReferenceKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<GroupEntityReference>,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    dropped: bool,
}

impl Reference {
    pub fn new(key: ReferenceKey) -> Self {
        Self {
            version: 1,
            key,
            group: None,
            attributes: Attributes::default(),
            dropped: false,
        }
    }

    pub fn with_group(self, group: Option<GroupEntityReference>) -> Self {
        Self { group, ..self }
    }

    pub fn with_attributes(self, attributes: Attributes) -> Self {
        Self { attributes, ..self }
    }

    pub(crate) fn with_version(self, version: u32) -> Self {
        Self { version, ..self }
    }

    pub(crate) fn tombstone(&self) -> Result<Self> {
        Ok(Self {
            version: next_version(ObjectKind::Reference, &self.key, self.version)?,
            dropped: true,
            ..self.clone()
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn key(&self) -> &ReferenceKey {
        &self.key
    }

    pub fn reference_name(&self) -> &str {
        &self.key.reference_name
    }

    pub fn referenced_primary_key(&self) -> i32 {
        self.key.primary_key
    }

    /// Live group, if any
    pub fn group(&self) -> Option<&GroupEntityReference> {
        self.group.as_ref().filter(|g| !g.dropped)
    }

    /// Group record, tombstone included
    pub fn group_record(&self) -> Option<&GroupEntityReference> {
        self.group.as_ref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    /// Content comparison ignoring versions
    pub fn differs_from(&self, other: &Reference) -> bool {
        let groups_differ = match (&self.group, &other.group) {
            (None, None) => false,
            (Some(a), Some(b)) => a.differs_from(b),
            _ => true,
        };
        self.key != other.key
            || self.dropped != other.dropped
            || groups_differ
            || self.attributes.differs_from(&other.attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::attributes::AttributeValue;
    use crate::data::key::AttributeKey;

    #[test]
    fn test_group_tombstone_hidden() {
        let group = GroupEntityReference::new("ParameterType", 4);
        let reference = Reference::new(ReferenceKey::new("parameter", 10)).with_group(Some(group.tombstone().unwrap()));
        assert!(reference.group().is_none());
        assert_eq!(reference.group_record().map(GroupEntityReference::version), Some(2));
    }

    #[test]
    fn test_differs_from() {
        let attributes = Attributes::new([AttributeValue::new(AttributeKey::global("order"), 1i32)]).unwrap();
        let a = Reference::new(ReferenceKey::new("brand", 1)).with_attributes(attributes.clone());
        let b = Reference::new(ReferenceKey::new("brand", 1))
            .with_attributes(attributes)
            .with_version(3);
        assert!(!a.differs_from(&b));
        assert!(a.differs_from(&a.clone().with_group(Some(GroupEntityReference::new("BrandGroup", 1)))));
        assert!(a.differs_from(&a.tombstone().unwrap()));
    }
}
