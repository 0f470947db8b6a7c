//! Generic nested values for associated data that doesn't fit the scalar type set

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Value;
use crate::error::{Result, SchemaError};

/// One node of a complex data tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataItem {
    Null,
    Value(Value),
    Array(Vec<DataItem>),
    Map(BTreeMap<String, DataItem>),
}

impl DataItem {
    fn check_supported(&self) -> Result<()> {
        match self {
            DataItem::Null => Ok(()),
            DataItem::Value(value) => value.check_supported(),
            DataItem::Array(items) => items.iter().try_for_each(DataItem::check_supported),
            DataItem::Map(entries) => entries.values().try_for_each(DataItem::check_supported),
        }
    }

    fn from_json(json: &serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => DataItem::Null,
            serde_json::Value::Bool(b) => DataItem::Value(Value::Boolean(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => DataItem::Value(Value::Long(i)),
                None => {
                    let decimal: Decimal = n.to_string().parse().map_err(|_| {
                        SchemaError::InvalidValue(format!("number {n} cannot be represented as a decimal"))
                    })?;
                    DataItem::Value(Value::BigDecimal(decimal))
                }
            },
            serde_json::Value::String(s) => DataItem::Value(Value::String(s.clone())),
            serde_json::Value::Array(items) => {
                DataItem::Array(items.iter().map(DataItem::from_json).collect::<Result<_>>()?)
            }
            serde_json::Value::Object(entries) => DataItem::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), DataItem::from_json(v)?)))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            DataItem::Null => serde_json::Value::Null,
            DataItem::Value(value) => value.to_json(),
            DataItem::Array(items) => serde_json::Value::Array(items.iter().map(DataItem::to_json).collect()),
            DataItem::Map(entries) => serde_json::Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Arbitrarily nested tree of maps, arrays and scalars
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplexDataObject {
    root: DataItem,
}

impl ComplexDataObject {
    pub fn new(root: DataItem) -> Result<Self> {
        root.check_supported()?;
        Ok(Self { root })
    }

    /// Build from arbitrary JSON; integers become `Long`, other numbers `BigDecimal`
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        Self::new(DataItem::from_json(json)?)
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.root.to_json()
    }

    pub fn root(&self) -> &DataItem {
        &self.root
    }

    /// Follow a path of map keys from the root
    pub fn get_path(&self, path: &[&str]) -> Option<&DataItem> {
        path.iter().try_fold(&self.root, |node, key| match node {
            DataItem::Map(entries) => entries.get(*key),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        match &self.root {
            DataItem::Null => true,
            DataItem::Array(items) => items.is_empty(),
            DataItem::Map(entries) => entries.is_empty(),
            DataItem::Value(_) => false,
        }
    }
}
