use std::collections::BTreeMap;

use entity_schemas::data::{AttributeKey, AttributeValue, Attributes};
use entity_schemas::{Locale, Value};
use proptest::prelude::*;

fn records(pairs: &BTreeMap<String, i64>) -> Vec<AttributeValue> {
    pairs
        .iter()
        .map(|(name, value)| AttributeValue::new(AttributeKey::global(name.as_str()), *value))
        .collect()
}

proptest! {
    #[test]
    fn test_insertion_order_never_differs(
        pairs in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..12),
        rotation in 0usize..12,
    ) {
        let ordered = records(&pairs);
        let mut rotated = ordered.clone();
        if !rotated.is_empty() {
            let by = rotation % rotated.len();
            rotated.rotate_left(by);
        }
        rotated.reverse();

        let a = Attributes::new(ordered).unwrap();
        let b = Attributes::new(rotated).unwrap();
        prop_assert!(!a.differs_from(&b));
        prop_assert!(!b.differs_from(&a));
    }

    #[test]
    fn test_changed_value_always_differs(
        pairs in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 1..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let a = Attributes::new(records(&pairs)).unwrap();
        let mut changed = pairs.clone();
        let name = pick.get(&pairs.keys().cloned().collect::<Vec<_>>()).clone();
        let value = changed[&name];
        changed.insert(name, value.wrapping_add(1));
        let b = Attributes::new(records(&changed)).unwrap();
        prop_assert!(a.differs_from(&b));
        prop_assert!(b.differs_from(&a));
    }

    #[test]
    fn test_locale_fallback(
        global in prop::option::of(any::<i32>()),
        localized in prop::option::of(any::<i32>()),
        tag in prop::sample::select(vec!["en", "en-US", "cs", "de-AT"]),
    ) {
        let locale = Locale::new(tag).unwrap();
        let mut values = Vec::new();
        if let Some(v) = global {
            values.push(AttributeValue::new(AttributeKey::global("color"), v));
        }
        if let Some(v) = localized {
            values.push(AttributeValue::new(AttributeKey::localized("color", locale.clone()), v));
        }
        let attributes = Attributes::new(values).unwrap();

        let expected = localized.or(global).map(Value::from);
        prop_assert_eq!(attributes.get_localized("color", &locale), expected.as_ref());
        let expected_global = global.map(Value::from);
        prop_assert_eq!(attributes.get("color"), expected_global.as_ref());
    }
}
