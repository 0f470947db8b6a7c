//! Attribute values and the attribute container

use serde::{Deserialize, Serialize};

use super::container::{Keyed, LocalizedValues, Versioned};
use super::key::{AttributeKey, LocalizedKey};
use crate::error::{next_version, ObjectKind, Result, SchemaError};
use crate::schema::AttributeSchemaProvider;
use crate::types::{Locale, Value};

/// One versioned attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    version: u32,
    key: AttributeKey,
    value: Value,
    #[serde(default)]
    dropped: bool,
}

impl AttributeValue {
    /// A fresh value at version 1
    pub fn new(key: AttributeKey, value: impl Into<Value>) -> Self {
        Self::with_version(1, key, value)
    }

    pub fn with_version(version: u32, key: AttributeKey, value: impl Into<Value>) -> Self {
        Self {
            version,
            key,
            value: value.into(),
            dropped: false,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn key(&self) -> &AttributeKey {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    /// The same key with a new value, one version up
    pub(crate) fn replaced(&self, value: Value) -> Result<Self> {
        Ok(Self {
            version: next_version(ObjectKind::Attribute, &self.key, self.version)?,
            key: self.key.clone(),
            value,
            dropped: false,
        })
    }

    /// Tombstone of this value, one version up
    pub(crate) fn tombstone(&self) -> Result<Self> {
        Ok(Self {
            version: next_version(ObjectKind::Attribute, &self.key, self.version)?,
            dropped: true,
            ..self.clone()
        })
    }
}

impl Versioned for AttributeValue {
    fn version(&self) -> u32 {
        self.version
    }

    fn dropped(&self) -> bool {
        self.dropped
    }

    fn differs_from(&self, other: &Self) -> bool {
        self.value != other.value || self.dropped != other.dropped
    }
}

impl Keyed for AttributeValue {
    type Key = AttributeKey;

    fn key(&self) -> &AttributeKey {
        &self.key
    }
}

/// Attribute values of an entity or a reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AttributeValue>", into = "Vec<AttributeValue>")]
pub struct Attributes {
    values: LocalizedValues<AttributeKey, AttributeValue>,
}

impl Attributes {
    /// Build without a schema; only keys and value types are checked
    pub fn new(values: impl IntoIterator<Item = AttributeValue>) -> Result<Self> {
        let values = LocalizedValues::new(ObjectKind::Attribute, values)?;
        for value in values.live_records() {
            value.value.check_supported()?;
        }
        Ok(Self { values })
    }

    /// Build and validate against the attribute definitions of `schema`
    pub fn with_schema(
        schema: &impl AttributeSchemaProvider,
        values: impl IntoIterator<Item = AttributeValue>,
    ) -> Result<Self> {
        let attributes = Self::new(values)?;
        attributes.validate(schema)?;
        Ok(attributes)
    }

    /// Check every live value against the attribute definitions of `schema`
    pub fn validate(&self, schema: &impl AttributeSchemaProvider) -> Result<()> {
        self.values
            .live_records()
            .try_for_each(|value| validate_value(schema, value))
    }

    /// Copy with `updates` superseding the records under the same keys
    pub(crate) fn merged(&self, updates: impl IntoIterator<Item = AttributeValue>) -> Result<Self> {
        let updates: Vec<AttributeValue> = updates.into_iter().collect();
        for update in updates.iter().filter(|u| !u.dropped) {
            update.value.check_supported()?;
        }
        Ok(Self {
            values: self.values.merged(updates),
        })
    }

    /// Live value under an exact key
    pub fn value(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.values.record(key).filter(|v| !v.dropped)
    }

    /// Record under an exact key, tombstones included
    pub fn record(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.values.record(key)
    }

    /// The non-localized value of an attribute. Localized variants are never picked.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.get_value(name).map(AttributeValue::value)
    }

    /// The value in `locale`, falling back to the non-localized value
    pub fn get_localized(&self, name: &str, locale: &Locale) -> Option<&Value> {
        self.get_value_localized(name, locale).map(AttributeValue::value)
    }

    pub fn get_value(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn get_value_localized(&self, name: &str, locale: &Locale) -> Option<&AttributeValue> {
        self.values.get_localized(name, locale)
    }

    /// Every live variant of an attribute: the non-localized value and one per locale
    pub fn variants(&self, name: &str) -> Vec<&AttributeValue> {
        self.values.variants(name)
    }

    /// Names of attributes with at least one live value
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.names().iter().map(String::as_str)
    }

    pub fn locales(&self) -> impl Iterator<Item = &Locale> {
        self.values.locales().iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &AttributeValue> {
        self.values.live_records()
    }

    /// All records, tombstones included
    pub fn records(&self) -> impl Iterator<Item = &AttributeValue> {
        self.values.records()
    }

    /// Number of records, tombstones included
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn differs_from(&self, other: &Attributes) -> bool {
        self.values.differs_from(&other.values)
    }
}

fn validate_value(schema: &impl AttributeSchemaProvider, value: &AttributeValue) -> Result<()> {
    let key = value.key();
    let name = key.name();
    if let Some(locale) = key.locale() {
        if !schema.locale_allowed(locale) {
            return Err(SchemaError::invariant(format!(
                "attribute `{name}` uses locale {locale} which the schema doesn't support"
            )));
        }
    }
    match schema.attribute_schema(name) {
        Some(attribute) => {
            if !value.value().conforms_to(&attribute.attribute_type()) {
                return Err(SchemaError::type_mismatch(
                    name,
                    attribute.attribute_type(),
                    value.value().type_label(),
                ));
            }
            if attribute.is_localized() && !key.is_localized() {
                return Err(SchemaError::invariant(format!(
                    "attribute `{name}` is localized and its values must carry a locale"
                )));
            }
            if !attribute.is_localized() && key.is_localized() {
                return Err(SchemaError::invariant(format!(
                    "attribute `{name}` is not localized but a value in {} was given",
                    key.locale().map(Locale::as_str).unwrap_or_default()
                )));
            }
            Ok(())
        }
        None if schema.allows_implicit_attributes() => Ok(()),
        None => Err(SchemaError::invariant(format!(
            "attribute `{name}` is not defined and the schema doesn't allow adding attributes"
        ))),
    }
}

impl TryFrom<Vec<AttributeValue>> for Attributes {
    type Error = SchemaError;

    fn try_from(values: Vec<AttributeValue>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<Attributes> for Vec<AttributeValue> {
    fn from(attributes: Attributes) -> Self {
        attributes.values.into_records().collect()
    }
}
