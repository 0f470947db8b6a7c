//! Prices of an entity and price-for-sale selection

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::key::PriceKey;
use crate::error::{next_version, ObjectKind, Result, SchemaError};
use crate::types::{Currency, DateTimeRange};

/// How prices sharing an inner record id combine into the price for sale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceInnerRecordHandling {
    /// Inner record ids are ignored; the entity has one price for sale
    #[default]
    None,
    /// The cheapest inner record sells (variant products)
    LowestPrice,
    /// Inner records are summed (product sets)
    Sum,
    /// Handling was not fetched
    Unknown,
}

/// One versioned price record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    version: u32,
    key: PriceKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inner_record_id: Option<i32>,
    price_without_tax: Decimal,
    /// Percentage, `21` means 21 %
    tax_rate: Decimal,
    price_with_tax: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validity: Option<DateTimeRange>,
    sellable: bool,
    #[serde(default)]
    dropped: bool,
}

impl Price {
    /// A fresh price at version 1; the inner record id must be positive when present
    pub fn new(
        key: PriceKey,
        inner_record_id: Option<i32>,
        price_without_tax: Decimal,
        tax_rate: Decimal,
        price_with_tax: Decimal,
        validity: Option<DateTimeRange>,
        sellable: bool,
    ) -> Result<Self> {
        if let Some(id) = inner_record_id {
            if id <= 0 {
                return Err(SchemaError::invariant(format!(
                    "price {key} has inner record id {id}; inner record ids must be positive"
                )));
            }
        }
        Ok(Self {
            version: 1,
            key,
            inner_record_id,
            price_without_tax,
            tax_rate,
            price_with_tax,
            validity,
            sellable,
            dropped: false,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn key(&self) -> &PriceKey {
        &self.key
    }

    pub fn inner_record_id(&self) -> Option<i32> {
        self.inner_record_id
    }

    pub fn price_without_tax(&self) -> Decimal {
        self.price_without_tax
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn price_with_tax(&self) -> Decimal {
        self.price_with_tax
    }

    pub fn validity(&self) -> Option<&DateTimeRange> {
        self.validity.as_ref()
    }

    pub fn is_sellable(&self) -> bool {
        self.sellable
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    pub fn valid_at(&self, moment: DateTime<FixedOffset>) -> bool {
        self.validity.as_ref().map_or(true, |v| v.valid_at(moment))
    }

    /// Same content ignoring the version
    pub fn differs_from(&self, other: &Price) -> bool {
        Price {
            version: other.version,
            ..self.clone()
        } != *other
    }

    pub(crate) fn with_version(self, version: u32) -> Self {
        Self { version, ..self }
    }

    pub(crate) fn tombstone(&self) -> Result<Self> {
        Ok(Self {
            version: next_version(ObjectKind::Price, &self.key, self.version)?,
            dropped: true,
            ..self.clone()
        })
    }
}

/// Price selected for sale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceForSale {
    pub currency: Currency,
    /// Price list of the selected price (of the highest priority one for sums)
    pub price_list: String,
    /// `None` for sums across inner records
    pub inner_record_id: Option<i32>,
    pub price_without_tax: Decimal,
    pub tax_rate: Decimal,
    pub price_with_tax: Decimal,
}

impl From<&Price> for PriceForSale {
    fn from(price: &Price) -> Self {
        Self {
            currency: price.key.currency.clone(),
            price_list: price.key.price_list.clone(),
            inner_record_id: price.inner_record_id,
            price_without_tax: price.price_without_tax,
            tax_rate: price.tax_rate,
            price_with_tax: price.price_with_tax,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PricesRepr {
    version: u32,
    #[serde(default)]
    price_inner_record_handling: PriceInnerRecordHandling,
    #[serde(default)]
    prices: Vec<Price>,
}

/// All prices of an entity with the inner record handling strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PricesRepr", into = "PricesRepr")]
pub struct Prices {
    version: u32,
    price_inner_record_handling: PriceInnerRecordHandling,
    prices: BTreeMap<PriceKey, Price>,
}

impl Default for Prices {
    fn default() -> Self {
        Self {
            version: 1,
            price_inner_record_handling: PriceInnerRecordHandling::None,
            prices: BTreeMap::new(),
        }
    }
}

impl Prices {
    pub fn new(
        version: u32,
        price_inner_record_handling: PriceInnerRecordHandling,
        prices: impl IntoIterator<Item = Price>,
    ) -> Result<Self> {
        let mut by_key = BTreeMap::new();
        for price in prices {
            let key = price.key.clone();
            if by_key.insert(key.clone(), price).is_some() {
                return Err(SchemaError::invariant(format!("duplicate price key {key}")));
            }
        }
        Ok(Self {
            version,
            price_inner_record_handling,
            prices: by_key,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn price_inner_record_handling(&self) -> PriceInnerRecordHandling {
        self.price_inner_record_handling
    }

    /// Live price under a key
    pub fn price(&self, key: &PriceKey) -> Option<&Price> {
        self.prices.get(key).filter(|p| !p.dropped)
    }

    pub fn record(&self, key: &PriceKey) -> Option<&Price> {
        self.prices.get(key)
    }

    pub fn prices(&self) -> impl Iterator<Item = &Price> {
        self.prices.values().filter(|p| !p.dropped)
    }

    pub fn records(&self) -> impl Iterator<Item = &Price> {
        self.prices.values()
    }

    pub fn currencies(&self) -> BTreeSet<&Currency> {
        self.prices().map(|p| &p.key.currency).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn differs_from(&self, other: &Prices) -> bool {
        self.price_inner_record_handling != other.price_inner_record_handling
            || self.prices.len() != other.prices.len()
            || self
                .prices
                .iter()
                .zip(other.prices.iter())
                .any(|((k1, p1), (k2, p2))| k1 != k2 || p1.differs_from(p2))
    }

    pub(crate) fn into_parts(self) -> (u32, PriceInnerRecordHandling, BTreeMap<PriceKey, Price>) {
        (self.version, self.price_inner_record_handling, self.prices)
    }

    /// Select the price for sale in `currency` among `price_lists`, ordered from the most
    /// to the least preferred. Only sellable prices valid at `moment` (any validity when
    /// `moment` is `None`) take part.
    pub fn price_for_sale(
        &self,
        currency: &Currency,
        moment: Option<DateTime<FixedOffset>>,
        price_lists: &[&str],
    ) -> Option<PriceForSale> {
        let priority = |price: &Price| price_lists.iter().position(|l| *l == price.key.price_list);
        let candidates = self.prices().filter(|p| {
            p.sellable && p.key.currency == *currency && moment.map_or(true, |m| p.valid_at(m))
        });

        // best price per inner record, by price list priority
        let mut best: BTreeMap<Option<i32>, (usize, &Price)> = BTreeMap::new();
        for price in candidates {
            let Some(rank) = priority(price) else { continue };
            let group = match self.price_inner_record_handling {
                PriceInnerRecordHandling::None | PriceInnerRecordHandling::Unknown => None,
                PriceInnerRecordHandling::LowestPrice | PriceInnerRecordHandling::Sum => price.inner_record_id,
            };
            best.entry(group)
                .and_modify(|current| {
                    if rank < current.0 {
                        *current = (rank, price);
                    }
                })
                .or_insert((rank, price));
        }

        match self.price_inner_record_handling {
            PriceInnerRecordHandling::None | PriceInnerRecordHandling::Unknown => {
                best.values().next().map(|(_, price)| PriceForSale::from(*price))
            }
            PriceInnerRecordHandling::LowestPrice => best
                .values()
                .min_by_key(|(_, price)| price.price_with_tax)
                .map(|(_, price)| PriceForSale::from(*price)),
            PriceInnerRecordHandling::Sum => {
                let (_, first) = best.values().min_by_key(|(rank, _)| *rank)?;
                let price_without_tax: Decimal = best.values().map(|(_, p)| p.price_without_tax).sum();
                let price_with_tax: Decimal = best.values().map(|(_, p)| p.price_with_tax).sum();
                let uniform_rate = best.values().all(|(_, p)| p.tax_rate == first.tax_rate);
                let tax_rate = if uniform_rate || price_without_tax.is_zero() {
                    first.tax_rate
                } else {
                    ((price_with_tax / price_without_tax - Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2)
                };
                Some(PriceForSale {
                    currency: currency.clone(),
                    price_list: first.key.price_list.clone(),
                    inner_record_id: None,
                    price_without_tax,
                    tax_rate,
                    price_with_tax,
                })
            }
        }
    }
}

impl TryFrom<PricesRepr> for Prices {
    type Error = SchemaError;

    fn try_from(repr: PricesRepr) -> Result<Self> {
        Self::new(repr.version, repr.price_inner_record_handling, repr.prices)
    }
}

impl From<Prices> for PricesRepr {
    fn from(prices: Prices) -> Self {
        PricesRepr {
            version: prices.version,
            price_inner_record_handling: prices.price_inner_record_handling,
            prices: prices.prices.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn czk() -> Currency {
        Currency::new("CZK").unwrap()
    }

    fn price(id: i32, list: &str, inner: Option<i32>, with_tax: i64) -> Price {
        let with_tax = Decimal::from(with_tax);
        let without_tax = (with_tax / Decimal::new(121, 2)).round_dp(2);
        Price::new(PriceKey::new(id, list, czk()), inner, without_tax, Decimal::from(21), with_tax, None, true)
            .unwrap()
    }

    #[test]
    fn test_inner_record_id_must_be_positive() {
        let key = PriceKey::new(1, "basic", czk());
        let result = Price::new(key, Some(0), Decimal::ONE, Decimal::ZERO, Decimal::ONE, None, true);
        assert!(result.unwrap_err().is_invariant_violation());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let result = Prices::new(1, PriceInnerRecordHandling::None, [price(1, "basic", None, 100), price(1, "basic", None, 90)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_price_for_sale_respects_priority() {
        let prices = Prices::new(
            1,
            PriceInnerRecordHandling::None,
            [price(1, "basic", None, 100), price(2, "vip", None, 80)],
        )
        .unwrap();
        let sale = prices.price_for_sale(&czk(), None, &["vip", "basic"]).unwrap();
        assert_eq!(sale.price_list, "vip");
        assert_eq!(sale.price_with_tax, Decimal::from(80));

        let sale = prices.price_for_sale(&czk(), None, &["basic"]).unwrap();
        assert_eq!(sale.price_with_tax, Decimal::from(100));
        assert!(prices.price_for_sale(&czk(), None, &["action"]).is_none());
        assert!(prices
            .price_for_sale(&Currency::new("EUR").unwrap(), None, &["basic"])
            .is_none());
    }

    #[test]
    fn test_lowest_price_across_inner_records() {
        let prices = Prices::new(
            1,
            PriceInnerRecordHandling::LowestPrice,
            [
                price(1, "basic", Some(1), 100),
                price(2, "basic", Some(2), 70),
                price(3, "vip", Some(1), 90),
            ],
        )
        .unwrap();
        let sale = prices.price_for_sale(&czk(), None, &["vip", "basic"]).unwrap();
        assert_eq!(sale.inner_record_id, Some(2));
        assert_eq!(sale.price_with_tax, Decimal::from(70));
    }

    #[test]
    fn test_sum_of_inner_records() {
        let prices = Prices::new(
            1,
            PriceInnerRecordHandling::Sum,
            [
                price(1, "basic", Some(1), 100),
                price(2, "basic", Some(2), 50),
                price(3, "vip", Some(1), 90),
            ],
        )
        .unwrap();
        let sale = prices.price_for_sale(&czk(), None, &["vip", "basic"]).unwrap();
        assert_eq!(sale.price_with_tax, Decimal::from(140));
        assert_eq!(sale.price_list, "vip");
        assert_eq!(sale.inner_record_id, None);
        assert_eq!(sale.tax_rate, Decimal::from(21));
    }

    #[test]
    fn test_validity_and_sellable() {
        let moment = DateTime::parse_from_rfc3339("2024-06-01T00:00:00+00:00").unwrap();
        let expired = DateTimeRange::until(DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap());
        let key = PriceKey::new(1, "action", czk());
        let action = Price::new(key, None, Decimal::ONE, Decimal::ZERO, Decimal::ONE, Some(expired), true).unwrap();
        let key = PriceKey::new(2, "reference", czk());
        let reference = Price::new(key, None, Decimal::TEN, Decimal::ZERO, Decimal::TEN, None, false).unwrap();
        let prices = Prices::new(1, PriceInnerRecordHandling::None, [action, reference, price(3, "basic", None, 100)]).unwrap();

        let sale = prices
            .price_for_sale(&czk(), Some(moment), &["action", "reference", "basic"])
            .unwrap();
        assert_eq!(sale.price_list, "basic");
        let sale = prices.price_for_sale(&czk(), None, &["action", "basic"]).unwrap();
        assert_eq!(sale.price_list, "action");
    }

    #[test]
    fn test_differs_from_ignores_versions() {
        let a = Prices::new(1, PriceInnerRecordHandling::None, [price(1, "basic", None, 100)]).unwrap();
        let b = Prices::new(3, PriceInnerRecordHandling::None, [price(1, "basic", None, 100).with_version(5)]).unwrap();
        assert!(!a.differs_from(&b));
        let c = Prices::new(1, PriceInnerRecordHandling::Sum, [price(1, "basic", None, 100)]).unwrap();
        assert!(a.differs_from(&c));
    }
}
