//! Keyed container shared by attributes and associated data

use std::collections::{BTreeMap, BTreeSet};

use super::key::LocalizedKey;
use crate::error::{ObjectKind, Result, SchemaError};
use crate::memo::Memo;
use crate::types::Locale;

/// A versioned record stored in an entity container
pub trait Versioned {
    fn version(&self) -> u32;

    /// Tombstone flag: logically absent, physically kept for replication
    fn dropped(&self) -> bool;

    /// Content comparison: payload and tombstone flag, never the version
    fn differs_from(&self, other: &Self) -> bool;
}

/// A record that carries its own key
pub trait Keyed {
    type Key: Ord + Clone;

    fn key(&self) -> &Self::Key;
}

/// Records by name and locale, with derived name and locale sets
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocalizedValues<K, V> {
    values: BTreeMap<K, V>,
    names: Memo<BTreeSet<String>>,
    locales: Memo<BTreeSet<Locale>>,
}

impl<K, V> Default for LocalizedValues<K, V> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            names: Memo::new(),
            locales: Memo::new(),
        }
    }
}

impl<K, V> LocalizedValues<K, V>
where
    K: LocalizedKey,
    V: Versioned + Keyed<Key = K>,
{
    /// Collect records, rejecting duplicate keys
    pub(crate) fn new(kind: ObjectKind, records: impl IntoIterator<Item = V>) -> Result<Self> {
        let mut values = BTreeMap::new();
        for record in records {
            let key = record.key().clone();
            if values.insert(key.clone(), record).is_some() {
                return Err(SchemaError::invariant(format!(
                    "duplicate {kind} key `{}`{}",
                    key.name(),
                    key.locale().map(|l| format!(" in locale {l}")).unwrap_or_default()
                )));
            }
        }
        Ok(Self {
            values,
            ..Self::default()
        })
    }

    /// Copy with `updates` replacing the records under the same keys
    pub(crate) fn merged(&self, updates: impl IntoIterator<Item = V>) -> Self
    where
        V: Clone,
    {
        let mut values = self.values.clone();
        for record in updates {
            values.insert(record.key().clone(), record);
        }
        Self {
            values,
            ..Self::default()
        }
    }

    /// Exact record lookup, tombstones included
    pub(crate) fn record(&self, key: &K) -> Option<&V> {
        self.values.get(key)
    }

    fn live(&self, key: &K) -> Option<&V> {
        self.values.get(key).filter(|v| !v.dropped())
    }

    /// The non-localized live record; never picks a localized one
    pub(crate) fn get(&self, name: &str) -> Option<&V> {
        self.live(&K::new(name, None))
    }

    /// Localized record if present, else the non-localized one
    pub(crate) fn get_localized(&self, name: &str, locale: &Locale) -> Option<&V> {
        self.live(&K::new(name, Some(locale.clone())))
            .or_else(|| self.get(name))
    }

    /// All live records of a name, one per locale plus the non-localized one
    pub(crate) fn variants(&self, name: &str) -> Vec<&V> {
        self.values
            .range(K::new(name, None)..)
            .take_while(|(key, _)| key.name() == name)
            .map(|(_, v)| v)
            .filter(|v| !v.dropped())
            .collect()
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &V> {
        self.values.values()
    }

    pub(crate) fn live_records(&self) -> impl Iterator<Item = &V> {
        self.values.values().filter(|v| !v.dropped())
    }

    pub(crate) fn names(&self) -> &BTreeSet<String> {
        self.names.get_or_init(|| {
            self.live_records()
                .map(|v| v.key().name().to_string())
                .collect()
        })
    }

    pub(crate) fn locales(&self) -> &BTreeSet<Locale> {
        self.locales.get_or_init(|| {
            self.live_records()
                .filter_map(|v| v.key().locale().cloned())
                .collect()
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Differ when cardinalities differ or any key is missing, differently valued or
    /// differently dropped on the other side. Both maps are ordered, so a pairwise walk
    /// compares the full key sets in both directions.
    pub(crate) fn differs_from(&self, other: &Self) -> bool {
        self.values.len() != other.values.len()
            || self
                .values
                .iter()
                .zip(other.values.iter())
                .any(|((k1, v1), (k2, v2))| k1 != k2 || v1.differs_from(v2))
    }

    pub(crate) fn into_records(self) -> impl Iterator<Item = V> {
        self.values.into_values()
    }
}
