// Property tests over the public parse entry point.
use proptest::prelude::*;
use tyco_core::{parse, Value};

fn get<'a>(value: &'a Value, key: &str) -> &'a Value {
    match value {
        Value::Object(map) => &map[key],
        other => panic!("expected object, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn prop_int_round_trip(n in any::<i64>()) {
        let value = parse(&format!("int n: {n}\n")).unwrap();
        prop_assert_eq!(get(&value, "n"), &Value::Int(n));
    }

    #[test]
    fn prop_hex_round_trip(n in 0u32..=0xFFFF_FFFF) {
        let value = parse(&format!("int n: {n:#x}\n")).unwrap();
        prop_assert_eq!(get(&value, "n"), &Value::Int(i64::from(n)));
    }

    #[test]
    fn prop_literal_strings_byte_identical(s in "[a-zA-Z0-9 _.;=#-]{0,40}") {
        let value = parse(&format!("str s: '{s}'\n")).unwrap();
        prop_assert_eq!(get(&value, "s"), &Value::String(s));
    }

    #[test]
    fn prop_global_order_preserved(names in proptest::collection::vec("[a-z][a-z0-9_]{0,8}", 1..8)) {
        let mut unique = names;
        unique.sort();
        unique.dedup();
        let source: String = unique
            .iter()
            .enumerate()
            .map(|(i, name)| format!("int {name}: {i}\n"))
            .collect();
        let value = parse(&source).unwrap();
        match value {
            Value::Object(map) => {
                let keys: Vec<&String> = map.keys().collect();
                prop_assert_eq!(keys, unique.iter().collect::<Vec<_>>());
            }
            other => prop_assert!(false, "expected object, got {:?}", other),
        }
    }

    #[test]
    fn prop_bool_round_trip(b in any::<bool>()) {
        let value = parse(&format!("bool b: {b}\n")).unwrap();
        prop_assert_eq!(get(&value, "b"), &Value::Bool(b));
    }
}
