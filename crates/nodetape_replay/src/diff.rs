//! Output comparison for replay results.

use nodetape_codec::Value;
use serde::{Deserialize, Serialize};

/// How far map comparison descends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffDepth {
    /// Common map fields are compared as whole values
    #[default]
    Shallow,
    /// Differing common fields are diffed again, named with dotted paths
    Recursive,
}

/// Compare an actual output against the expected one
///
/// A kind mismatch yields exactly one entry. For maps, missing and extra
/// keys come first, then one mismatch per differing common field, all in
/// key order. Equal values yield nothing.
#[must_use]
pub fn compare_outputs(actual: &Value, expected: &Value, depth: DiffDepth) -> Vec<String> {
    let mut differences = Vec::new();
    diff_into(actual, expected, None, depth, &mut differences);
    differences
}

fn diff_into(
    actual: &Value,
    expected: &Value,
    path: Option<&str>,
    depth: DiffDepth,
    out: &mut Vec<String>,
) {
    if actual.kind() != expected.kind() {
        out.push(match path {
            None => format!("Type mismatch: {} vs {}", actual.kind(), expected.kind()),
            Some(p) => format!(
                "Type mismatch for '{}': {} vs {}",
                p,
                actual.kind(),
                expected.kind()
            ),
        });
        return;
    }

    match (actual, expected) {
        (Value::Map(a), Value::Map(e)) => {
            for key in e.keys().filter(|k| !a.contains_key(*k)) {
                out.push(format!("Missing key: '{}'", join(path, key)));
            }
            for key in a.keys().filter(|k| !e.contains_key(*k)) {
                out.push(format!("Extra key: '{}'", join(path, key)));
            }
            for (key, a_val) in a {
                let Some(e_val) = e.get(key) else { continue };
                if a_val == e_val {
                    continue;
                }
                let field = join(path, key);
                match depth {
                    DiffDepth::Recursive => diff_into(a_val, e_val, Some(&field), depth, out),
                    DiffDepth::Shallow => out.push(format!(
                        "Value mismatch for '{}': {} vs {}",
                        field, a_val, e_val
                    )),
                }
            }
        }
        _ if actual != expected => out.push(match path {
            None => format!("Value mismatch: {} vs {}", actual, expected),
            Some(p) => format!("Value mismatch for '{}': {} vs {}", p, actual, expected),
        }),
        _ => {}
    }
}

fn join(path: Option<&str>, key: &str) -> String {
    match path {
        None => key.to_string(),
        Some(p) => format!("{}.{}", p, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::map(entries.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    #[test]
    fn test_equal_outputs() {
        let v = map(&[("step", Value::from("next"))]);
        assert!(compare_outputs(&v, &v, DiffDepth::Shallow).is_empty());
    }

    #[test]
    fn test_type_mismatch_is_single_entry() {
        let diffs = compare_outputs(
            &Value::Null,
            &map(&[("a", Value::Int(1)), ("b", Value::Int(2))]),
            DiffDepth::Shallow,
        );
        assert_eq!(diffs, vec!["Type mismatch: null vs map".to_string()]);

        let diffs = compare_outputs(&Value::Int(1), &Value::Float(1.0), DiffDepth::Recursive);
        assert_eq!(diffs, vec!["Type mismatch: int vs float".to_string()]);
    }

    #[test]
    fn test_map_key_and_value_differences() {
        let actual = map(&[
            ("extra", Value::Bool(true)),
            ("status", Value::from("DONE")),
            ("shared", Value::Int(1)),
        ]);
        let expected = map(&[
            ("missing", Value::Null),
            ("status", Value::from("ANALYZING")),
            ("shared", Value::Int(1)),
        ]);
        let diffs = compare_outputs(&actual, &expected, DiffDepth::Shallow);
        assert_eq!(
            diffs,
            vec![
                "Missing key: 'missing'".to_string(),
                "Extra key: 'extra'".to_string(),
                r#"Value mismatch for 'status': "DONE" vs "ANALYZING""#.to_string(),
            ]
        );
    }

    #[test]
    fn test_scalar_mismatch() {
        let diffs = compare_outputs(&Value::Int(2), &Value::Int(3), DiffDepth::Shallow);
        assert_eq!(diffs, vec!["Value mismatch: 2 vs 3".to_string()]);
    }

    #[test]
    fn test_shallow_treats_nested_maps_as_opaque() {
        let actual = map(&[("report", map(&[("pages", Value::Int(3)), ("title", "x".into())]))]);
        let expected = map(&[("report", map(&[("pages", Value::Int(4)), ("title", "x".into())]))]);

        let shallow = compare_outputs(&actual, &expected, DiffDepth::Shallow);
        assert_eq!(shallow.len(), 1);
        assert!(shallow[0].starts_with("Value mismatch for 'report': "));

        let recursive = compare_outputs(&actual, &expected, DiffDepth::Recursive);
        assert_eq!(
            recursive,
            vec!["Value mismatch for 'report.pages': 3 vs 4".to_string()]
        );
    }

    #[test]
    fn test_recursive_nested_keys_and_types() {
        let actual = map(&[("r", map(&[("a", Value::Int(1)), ("x", Value::Int(1))]))]);
        let expected = map(&[("r", map(&[("a", Value::from("1")), ("y", Value::Int(1))]))]);
        let diffs = compare_outputs(&actual, &expected, DiffDepth::Recursive);
        assert_eq!(
            diffs,
            vec![
                "Missing key: 'r.y'".to_string(),
                "Extra key: 'r.x'".to_string(),
                "Type mismatch for 'r.a': int vs text".to_string(),
            ]
        );
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e9f64..1.0e9).prop_map(Value::Float),
            "[a-z]{0,6}".prop_map(Value::Text),
        ];
        leaf.prop_recursive(3, 24, 5, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..5).prop_map(Value::List),
                proptest::collection::btree_map("[a-z]{1,4}", inner, 0..5).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_diff_idempotent(value in arb_value()) {
            prop_assert!(compare_outputs(&value, &value, DiffDepth::Shallow).is_empty());
            prop_assert!(compare_outputs(&value, &value, DiffDepth::Recursive).is_empty());
        }

        #[test]
        fn prop_type_mismatch_single_entry(a in arb_value(), b in arb_value()) {
            prop_assume!(a.kind() != b.kind());
            prop_assert_eq!(compare_outputs(&a, &b, DiffDepth::Shallow).len(), 1);
            prop_assert_eq!(compare_outputs(&a, &b, DiffDepth::Recursive).len(), 1);
        }
    }
}
