//! Associated data values and their container

use serde::{Deserialize, Serialize};

use super::container::{Keyed, LocalizedValues, Versioned};
use super::key::{AssociatedDataKey, LocalizedKey};
use crate::error::{next_version, ObjectKind, Result, SchemaError};
use crate::schema::{EntitySchema, EvolutionMode};
use crate::types::{ComplexDataObject, Locale, Value};

/// Payload of associated data: a supported value or a generic tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociatedDataPayload {
    Value(Value),
    Complex(ComplexDataObject),
}

impl AssociatedDataPayload {
    fn type_label(&self) -> String {
        match self {
            AssociatedDataPayload::Value(value) => value.type_label(),
            AssociatedDataPayload::Complex(_) => "ComplexDataObject".to_string(),
        }
    }
}

impl From<Value> for AssociatedDataPayload {
    fn from(value: Value) -> Self {
        AssociatedDataPayload::Value(value)
    }
}

impl From<ComplexDataObject> for AssociatedDataPayload {
    fn from(object: ComplexDataObject) -> Self {
        AssociatedDataPayload::Complex(object)
    }
}

impl From<&str> for AssociatedDataPayload {
    fn from(value: &str) -> Self {
        AssociatedDataPayload::Value(value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedDataValue {
    version: u32,
    key: AssociatedDataKey,
    value: AssociatedDataPayload,
    #[serde(default)]
    dropped: bool,
}

impl AssociatedDataValue {
    pub fn new(key: AssociatedDataKey, value: impl Into<AssociatedDataPayload>) -> Self {
        Self::with_version(1, key, value)
    }

    pub fn with_version(version: u32, key: AssociatedDataKey, value: impl Into<AssociatedDataPayload>) -> Self {
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

    pub fn key(&self) -> &AssociatedDataKey {
        &self.key
    }

    pub fn value(&self) -> &AssociatedDataPayload {
        &self.value
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    pub(crate) fn replaced(&self, value: AssociatedDataPayload) -> Result<Self> {
        Ok(Self {
            version: next_version(ObjectKind::AssociatedData, &self.key, self.version)?,
            key: self.key.clone(),
            value,
            dropped: false,
        })
    }

    pub(crate) fn tombstone(&self) -> Result<Self> {
        Ok(Self {
            version: next_version(ObjectKind::AssociatedData, &self.key, self.version)?,
            dropped: true,
            ..self.clone()
        })
    }
}

impl Versioned for AssociatedDataValue {
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

impl Keyed for AssociatedDataValue {
    type Key = AssociatedDataKey;

    fn key(&self) -> &AssociatedDataKey {
        &self.key
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AssociatedDataValue>", into = "Vec<AssociatedDataValue>")]
pub struct AssociatedData {
    values: LocalizedValues<AssociatedDataKey, AssociatedDataValue>,
}

impl AssociatedData {
    pub fn new(values: impl IntoIterator<Item = AssociatedDataValue>) -> Result<Self> {
        let values = LocalizedValues::new(ObjectKind::AssociatedData, values)?;
        for record in values.live_records() {
            if let AssociatedDataPayload::Value(value) = &record.value {
                value.check_supported()?;
            }
        }
        Ok(Self { values })
    }

    /// Build and validate against the associated data definitions of `schema`
    pub fn with_schema(schema: &EntitySchema, values: impl IntoIterator<Item = AssociatedDataValue>) -> Result<Self> {
        let data = Self::new(values)?;
        data.validate(schema)?;
        Ok(data)
    }

    pub fn validate(&self, schema: &EntitySchema) -> Result<()> {
        self.values
            .live_records()
            .try_for_each(|record| validate_value(schema, record))
    }

    /// Copy with `updates` superseding the records under the same keys
    pub(crate) fn merged(&self, updates: impl IntoIterator<Item = AssociatedDataValue>) -> Result<Self> {
        let updates: Vec<AssociatedDataValue> = updates.into_iter().collect();
        for update in updates.iter().filter(|u| !u.dropped) {
            if let AssociatedDataPayload::Value(value) = &update.value {
                value.check_supported()?;
            }
        }
        Ok(Self {
            values: self.values.merged(updates),
        })
    }

    pub fn value(&self, key: &AssociatedDataKey) -> Option<&AssociatedDataValue> {
        self.values.record(key).filter(|v| !v.dropped)
    }

    pub fn record(&self, key: &AssociatedDataKey) -> Option<&AssociatedDataValue> {
        self.values.record(key)
    }

    /// The non-localized payload
    pub fn get(&self, name: &str) -> Option<&AssociatedDataPayload> {
        self.get_value(name).map(AssociatedDataValue::value)
    }

    /// The payload in `locale`, falling back to the non-localized payload
    pub fn get_localized(&self, name: &str, locale: &Locale) -> Option<&AssociatedDataPayload> {
        self.get_value_localized(name, locale).map(AssociatedDataValue::value)
    }

    pub fn get_value(&self, name: &str) -> Option<&AssociatedDataValue> {
        self.values.get(name)
    }

    pub fn get_value_localized(&self, name: &str, locale: &Locale) -> Option<&AssociatedDataValue> {
        self.values.get_localized(name, locale)
    }

    pub fn variants(&self, name: &str) -> Vec<&AssociatedDataValue> {
        self.values.variants(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.names().iter().map(String::as_str)
    }

    pub fn locales(&self) -> impl Iterator<Item = &Locale> {
        self.values.locales().iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &AssociatedDataValue> {
        self.values.live_records()
    }

    pub fn records(&self) -> impl Iterator<Item = &AssociatedDataValue> {
        self.values.records()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn differs_from(&self, other: &AssociatedData) -> bool {
        self.values.differs_from(&other.values)
    }
}

fn validate_value(schema: &EntitySchema, record: &AssociatedDataValue) -> Result<()> {
    let key = record.key();
    let name = key.name();
    if let Some(locale) = key.locale() {
        if !schema.locale_allowed(locale) {
            return Err(SchemaError::invariant(format!(
                "associated data `{name}` uses locale {locale} which the schema doesn't support"
            )));
        }
    }
    let Some(definition) = schema.associated_data_schema(name) else {
        return if schema.allows(EvolutionMode::AddingAssociatedData) {
            Ok(())
        } else {
            Err(SchemaError::invariant(format!(
                "associated data `{name}` is not defined and the schema doesn't allow adding associated data"
            )))
        };
    };
    let conforms = match &record.value {
        AssociatedDataPayload::Complex(_) => definition.data_type().is_complex(),
        AssociatedDataPayload::Value(value) => value.conforms_to(&definition.data_type()),
    };
    if !conforms {
        return Err(SchemaError::type_mismatch(
            name,
            definition.data_type(),
            record.value.type_label(),
        ));
    }
    if definition.is_localized() != key.is_localized() {
        return Err(SchemaError::invariant(if definition.is_localized() {
            format!("associated data `{name}` is localized and its values must carry a locale")
        } else {
            format!("associated data `{name}` is not localized but a localized value was given")
        }));
    }
    Ok(())
}

impl TryFrom<Vec<AssociatedDataValue>> for AssociatedData {
    type Error = SchemaError;

    fn try_from(values: Vec<AssociatedDataValue>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<AssociatedData> for Vec<AssociatedDataValue> {
    fn from(data: AssociatedData) -> Self {
        data.values.into_records().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AssociatedDataSchema;
    use crate::types::ScalarType;

    fn locale(tag: &str) -> Locale {
        Locale::new(tag).unwrap()
    }

    fn complex() -> ComplexDataObject {
        ComplexDataObject::from_json(&serde_json::json!({"width": 10})).unwrap()
    }

    #[test]
    fn test_locale_fallback() {
        let data = AssociatedData::new([
            AssociatedDataValue::new(AssociatedDataKey::global("manual"), "generic.pdf"),
            AssociatedDataValue::new(AssociatedDataKey::localized("manual", locale("de")), "de.pdf"),
        ])
        .unwrap();
        assert_eq!(
            data.get_localized("manual", &locale("de")),
            Some(&AssociatedDataPayload::from("de.pdf"))
        );
        assert_eq!(
            data.get_localized("manual", &locale("fr")),
            Some(&AssociatedDataPayload::from("generic.pdf"))
        );
    }

    #[test]
    fn test_unsupported_values_rejected() {
        let nested = Value::Array(vec![Value::Array(vec![])]);
        let result = AssociatedData::new([AssociatedDataValue::new(AssociatedDataKey::global("x"), nested)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_schema_validation() {
        let schema = EntitySchema::with_evolution("Product", []).evolve(|s| {
            let dims = AssociatedDataSchema::new("dimensions", ScalarType::ComplexDataObject);
            s.associated_data.insert(dims.name().to_string(), dims);
        })
        .unwrap();
        let ok = AssociatedData::with_schema(
            &schema,
            [AssociatedDataValue::new(AssociatedDataKey::global("dimensions"), complex())],
        );
        assert!(ok.is_ok());

        let wrong = AssociatedData::with_schema(
            &schema,
            [AssociatedDataValue::new(AssociatedDataKey::global("dimensions"), "10x20")],
        );
        assert!(wrong.unwrap_err().is_type_mismatch());

        let unknown = AssociatedData::with_schema(
            &schema,
            [AssociatedDataValue::new(AssociatedDataKey::global("gallery"), "a.png")],
        );
        assert!(unknown.is_err());
    }

    #[test]
    fn test_differs_from() {
        let a = AssociatedData::new([AssociatedDataValue::new(AssociatedDataKey::global("dimensions"), complex())])
            .unwrap();
        let b = AssociatedData::new([AssociatedDataValue::with_version(
            7,
            AssociatedDataKey::global("dimensions"),
            complex(),
        )])
        .unwrap();
        assert!(!a.differs_from(&b));

        let dropped = AssociatedData::new([a.get_value("dimensions").unwrap().tombstone().unwrap()]).unwrap();
        assert!(a.differs_from(&dropped));
    }
}
