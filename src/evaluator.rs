//! Collection evaluator.
//!
//! Stateless functions deciding which fields a node still needs. A node is
//! complete when [`compute_missing`] returns nothing; detail subfield gaps are
//! follow-up candidates only and never block completion.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::graph::FieldMap;
use crate::schema::{CollectionSpec, NodeType, Operator};

/// A field is answered iff its key is present and the value is not null.
///
/// `false`, `0` and empty containers all count as answered.
pub fn is_answered(snapshot: &FieldMap, field: &str) -> bool {
    matches!(snapshot.get(field), Some(v) if !v.is_null())
}

/// Fields still required by `spec` given the current snapshot.
///
/// Order is stable: required fields, then the any-of group, then fields
/// pulled in by conditional rules. Overlapping rules contribute the union of
/// their requirements.
pub fn compute_missing(snapshot: &FieldMap, spec: &CollectionSpec) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();

    for field in &spec.required_fields {
        if !is_answered(snapshot, field) {
            push_unique(&mut missing, field);
        }
    }

    if !spec.require_any_of.is_empty()
        && !spec.require_any_of.iter().any(|f| is_answered(snapshot, f))
    {
        for field in &spec.require_any_of {
            push_unique(&mut missing, field);
        }
    }

    for rule in &spec.conditional_rules {
        let Some(current) = snapshot.get(&rule.if_field).filter(|v| !v.is_null()) else {
            continue;
        };
        if !evaluate_condition(current, rule.operator, &rule.expected) {
            continue;
        }
        for field in &rule.then_require {
            if !is_answered(snapshot, field) {
                push_unique(&mut missing, field);
            }
        }
    }

    missing
}

/// Whether the node has no missing collection fields.
pub fn is_complete(node: &NodeType, snapshot: &FieldMap) -> bool {
    compute_missing(snapshot, &node.spec).is_empty()
}

/// Evaluate `value <operator> expected`.
///
/// Type mismatches evaluate to `false` so a malformed value can never make a
/// rule fire.
pub fn evaluate_condition(value: &Value, operator: Operator, expected: &Value) -> bool {
    match operator {
        Operator::Truthy => is_truthy(value),
        Operator::Eq => comparable(value, expected) && values_equal(value, expected),
        Operator::Ne => comparable(value, expected) && !values_equal(value, expected),
        Operator::Gt => compare(value, expected) == Some(Ordering::Greater),
        Operator::Ge => matches!(
            compare(value, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare(value, expected) == Some(Ordering::Less),
        Operator::Le => matches!(
            compare(value, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::In => contains(expected, value).unwrap_or(false),
        Operator::NotIn => contains(expected, value).map(|c| !c).unwrap_or(false),
    }
}

/// Dotted `field.entryKey.subfield` paths missing from portfolio entries.
pub fn compute_detail_missing(node: &NodeType, snapshot: &FieldMap) -> Vec<String> {
    let mut missing = Vec::new();
    for requirement in &node.spec.detail_subfields {
        let Some(Value::Object(portfolio)) = snapshot.get(&requirement.portfolio_field) else {
            continue;
        };
        for (entry_key, entry) in portfolio {
            for subfield in requirement.subfields.iter().filter(|s| s.applies(entry_key)) {
                let present = entry
                    .as_object()
                    .and_then(|e| e.get(&subfield.name))
                    .is_some_and(|v| !v.is_null());
                if !present {
                    missing.push(format!(
                        "{}.{}.{}",
                        requirement.portfolio_field, entry_key, subfield.name
                    ));
                }
            }
        }
    }
    missing
}

/// Fields to target next for a node: collection gaps first, then detail
/// paths that have not been asked yet.
pub fn targeting_missing(
    node: &NodeType,
    snapshot: &FieldMap,
    asked: Option<&BTreeSet<String>>,
) -> Vec<String> {
    let mut missing = compute_missing(snapshot, &node.spec);
    missing.extend(
        compute_detail_missing(node, snapshot)
            .into_iter()
            .filter(|path| asked.map_or(true, |a| !a.contains(path))),
    );
    missing
}

fn push_unique(missing: &mut Vec<String>, field: &str) {
    if !missing.iter().any(|m| m == field) {
        missing.push(field.to_string());
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn comparable(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Membership of `needle` in `haystack`; `None` when membership is undefined.
fn contains(haystack: &Value, needle: &Value) -> Option<bool> {
    match (haystack, needle) {
        (Value::Array(items), _) => Some(items.iter().any(|item| values_equal(item, needle))),
        (Value::String(h), Value::String(n)) => Some(h.contains(n.as_str())),
        (Value::Object(map), Value::String(key)) => Some(map.contains_key(key)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{builtins, DetailSubfield, FieldDef};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn snapshot(value: Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_required_fields_missing_then_false_completes() {
        let spec = CollectionSpec::required(&["a", "b"]);
        let mut snap = snapshot(json!({"a": 34}));
        assert_eq!(compute_missing(&snap, &spec), vec!["b".to_string()]);

        snap.insert("b".to_string(), json!(false));
        assert!(compute_missing(&snap, &spec).is_empty());
    }

    #[test]
    fn test_null_is_unanswered_but_empty_containers_are_answered() {
        let snap = snapshot(json!({"a": null, "b": {}, "c": [], "d": 0}));
        assert!(!is_answered(&snap, "a"));
        assert!(is_answered(&snap, "b"));
        assert!(is_answered(&snap, "c"));
        assert!(is_answered(&snap, "d"));
        assert!(!is_answered(&snap, "e"));
    }

    #[test]
    fn test_require_any_of_surfaces_whole_group() {
        let spec = CollectionSpec::any_of(&["x", "y"]);
        assert_eq!(
            compute_missing(&FieldMap::new(), &spec),
            vec!["x".to_string(), "y".to_string()]
        );
        let snap = snapshot(json!({"y": 3}));
        assert!(compute_missing(&snap, &spec).is_empty());
    }

    #[test]
    fn test_dependents_conditional_rules() {
        let node = builtins::dependents();
        let snap = snapshot(json!({"number_of_children": 0, "supporting_parents": false}));
        assert!(is_complete(&node, &snap));

        let snap = snapshot(json!({"number_of_children": 2, "supporting_parents": false}));
        assert_eq!(
            compute_missing(&snap, &node.spec),
            vec!["children_ages".to_string(), "child_pathway".to_string()]
        );

        let snap = snapshot(json!({
            "number_of_children": 2,
            "supporting_parents": false,
            "children_ages": [4, 7],
            "child_pathway": "planning_uni"
        }));
        assert_eq!(
            compute_missing(&snap, &node.spec),
            vec!["education_funding_preference".to_string()]
        );
    }

    #[test]
    fn test_malformed_trigger_value_fails_closed() {
        let node = builtins::dependents();
        let snap = snapshot(json!({"number_of_children": "two", "supporting_parents": true}));
        assert!(is_complete(&node, &snap));
    }

    #[test]
    fn test_overlapping_rules_take_union() {
        let spec = CollectionSpec::default()
            .with_rule("kind", Operator::Eq, json!("a"), &["x", "y"])
            .with_rule("kind", Operator::Truthy, json!(null), &["y", "z"]);
        let snap = snapshot(json!({"kind": "a"}));
        assert_eq!(
            compute_missing(&snap, &spec),
            vec!["x".to_string(), "y".to_string(), "z".to_string()]
        );
    }

    #[test]
    fn test_operators() {
        assert!(evaluate_condition(&json!(3), Operator::Gt, &json!(2.5)));
        assert!(evaluate_condition(&json!(3), Operator::Ge, &json!(3.0)));
        assert!(evaluate_condition(&json!(1), Operator::Lt, &json!(2)));
        assert!(evaluate_condition(&json!(2), Operator::Le, &json!(2)));
        assert!(evaluate_condition(&json!(1), Operator::Eq, &json!(1.0)));
        assert!(evaluate_condition(&json!("a"), Operator::Ne, &json!("b")));
        assert!(evaluate_condition(&json!("uni"), Operator::In, &json!(["uni", "tafe"])));
        assert!(evaluate_condition(&json!("work"), Operator::NotIn, &json!(["uni"])));
        assert!(evaluate_condition(&json!("ab"), Operator::In, &json!("cabd")));
        assert!(!evaluate_condition(&json!(""), Operator::Truthy, &Value::Null));
        assert!(evaluate_condition(&json!([0]), Operator::Truthy, &Value::Null));
    }

    #[test]
    fn test_type_mismatches_are_false() {
        assert!(!evaluate_condition(&json!("3"), Operator::Gt, &json!(2)));
        assert!(!evaluate_condition(&json!(1), Operator::Ne, &json!("1")));
        assert!(!evaluate_condition(&json!(1), Operator::Eq, &json!("1")));
        assert!(!evaluate_condition(&json!(1), Operator::In, &json!(5)));
        assert!(!evaluate_condition(&json!(1), Operator::NotIn, &json!(5)));
        assert!(!evaluate_condition(&json!({"a": 1}), Operator::Lt, &json!({"b": 2})));
    }

    #[test]
    fn test_detail_missing_respects_entry_filter() {
        let node = builtins::insurance();
        let snap = snapshot(json!({
            "coverages": {
                "private_health": {
                    "covered_person": "family",
                    "held_through": "personal",
                    "premium_amount": 320,
                    "premium_frequency": "monthly"
                },
                "life": {"covered_person": "self", "coverage_amount": null}
            }
        }));
        assert_eq!(
            compute_detail_missing(&node, &snap),
            vec![
                "coverages.life.held_through".to_string(),
                "coverages.life.coverage_amount".to_string(),
                "coverages.life.premium_amount".to_string(),
                "coverages.life.premium_frequency".to_string(),
                "coverages.private_health.excess_amount".to_string(),
            ]
        );
        assert!(is_complete(&node, &snap));
    }

    #[test]
    fn test_detail_missing_ignores_non_mapping_portfolio() {
        let node = NodeType::new(
            "Loan",
            "",
            vec![FieldDef::portfolio("liabilities", "")],
            CollectionSpec::required(&["liabilities"])
                .with_details("liabilities", vec![DetailSubfield::new("rate", "")]),
        );
        let snap = snapshot(json!({"liabilities": "none"}));
        assert!(compute_detail_missing(&node, &snap).is_empty());

        let snap = snapshot(json!({"liabilities": {"car_loan": 12000}}));
        assert_eq!(
            compute_detail_missing(&node, &snap),
            vec!["liabilities.car_loan.rate".to_string()]
        );
    }

    #[test]
    fn test_targeting_missing_skips_asked_detail_paths() {
        let node = builtins::loan();
        let snap = snapshot(json!({"liabilities": {"home_loan": {
            "outstanding_amount": 400000,
            "monthly_payment": 2500,
            "interest_rate": 6.1,
            "remaining_term_months": 300
        }}}));
        let all = targeting_missing(&node, &snap, None);
        assert_eq!(all, vec!["liabilities.home_loan.repayment_type".to_string()]);

        let asked: BTreeSet<String> = all.into_iter().collect();
        assert!(targeting_missing(&node, &snap, Some(&asked)).is_empty());
    }
}
