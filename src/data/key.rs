//! Composite keys identifying values inside entity containers
//!
//! All keys order by their components in declaration order, so containers iterate
//! deterministically regardless of insertion order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Currency, Locale};

/// A key made of a name and an optional locale
pub trait LocalizedKey: Ord + Clone + fmt::Debug {
    fn new(name: impl Into<String>, locale: Option<Locale>) -> Self;
    fn name(&self) -> &str;
    fn locale(&self) -> Option<&Locale>;

    fn is_localized(&self) -> bool {
        self.locale().is_some()
    }
}

macro_rules! localized_key {
    ($(#[$meta:meta])* $key:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $key {
            name: String,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            locale: Option<Locale>,
        }

        impl $key {
            pub fn global(name: impl Into<String>) -> Self {
                <Self as LocalizedKey>::new(name, None)
            }

            pub fn localized(name: impl Into<String>, locale: Locale) -> Self {
                <Self as LocalizedKey>::new(name, Some(locale))
            }
        }

        impl LocalizedKey for $key {
            fn new(name: impl Into<String>, locale: Option<Locale>) -> Self {
                Self {
                    name: name.into(),
                    locale,
                }
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn locale(&self) -> Option<&Locale> {
                self.locale.as_ref()
            }
        }

        impl fmt::Display for $key {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match &self.locale {
                    Some(locale) => write!(f, "{}:{}", self.name, locale),
                    None => f.write_str(&self.name),
                }
            }
        }
    };
}

localized_key! {
    /// Identifies an attribute value; no locale means the value is shared by all locales
    AttributeKey
}

localized_key! {
    /// Identifies an associated data value; no locale means the value is shared by all locales
    AssociatedDataKey
}

/// Identifies one price record of an entity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PriceKey {
    pub price_id: i32,
    pub price_list: String,
    pub currency: Currency,
}

impl PriceKey {
    pub fn new(price_id: i32, price_list: impl Into<String>, currency: Currency) -> Self {
        Self {
            price_id,
            price_list: price_list.into(),
            currency,
        }
    }
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.price_id, self.price_list, self.currency)
    }
}

/// Identifies one relation instance to another entity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceKey {
    pub reference_name: String,
    pub primary_key: i32,
}

impl ReferenceKey {
    pub fn new(reference_name: impl Into<String>, primary_key: i32) -> Self {
        Self {
            reference_name: reference_name.into(),
            primary_key,
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.reference_name, self.primary_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locale(tag: &str) -> Locale {
        Locale::new(tag).unwrap()
    }

    #[test]
    fn test_attribute_key_ordering() {
        let mut keys = vec![
            AttributeKey::localized("name", locale("en")),
            AttributeKey::global("code"),
            AttributeKey::global("name"),
            AttributeKey::localized("name", locale("cs")),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["code", "name", "name:cs", "name:en"]);
    }

    #[test]
    fn test_price_key_ordering() {
        let eur = Currency::new("EUR").unwrap();
        let czk = Currency::new("CZK").unwrap();
        let a = PriceKey::new(1, "basic", eur.clone());
        let b = PriceKey::new(1, "basic", czk);
        let c = PriceKey::new(2, "action", eur);
        assert!(b < a);
        assert!(a < c);
    }

    #[test]
    fn test_reference_key_equality() {
        assert_eq!(ReferenceKey::new("brand", 1), ReferenceKey::new("brand", 1));
        assert!(ReferenceKey::new("brand", 1) < ReferenceKey::new("brand", 2));
        assert!(ReferenceKey::new("brand", 9) < ReferenceKey::new("category", 1));
    }
}
