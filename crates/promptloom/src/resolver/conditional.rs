//! Rule evaluation for `conditional` slots.

use std::cmp::Ordering;

use crate::model::{ConditionOperator, ConditionalRule};
use crate::value::{SlotValue, SlotValues};

/// Output of the first rule that matches `context`, if any. A rule whose
/// field is absent from the context never matches.
pub fn first_match(rules: &[ConditionalRule], context: &SlotValues) -> Option<SlotValue> {
    rules.iter().find_map(|rule| {
        let actual = context.get(&rule.field)?;
        matches(rule.operator, actual, &rule.value).then(|| rule.output.clone())
    })
}

pub fn matches(op: ConditionOperator, actual: &SlotValue, expected: &SlotValue) -> bool {
    use ConditionOperator::*;
    match op {
        Eq => loosely_equal(actual, expected),
        Ne => !loosely_equal(actual, expected),
        Gt => compare(actual, expected) == Some(Ordering::Greater),
        Lt => compare(actual, expected) == Some(Ordering::Less),
        Gte => matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal)),
        Lte => matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal)),
        In => match expected {
            SlotValue::List(items) => items.iter().any(|item| loosely_equal(actual, item)),
            SlotValue::Text(csv) => {
                let needle = actual.render();
                csv.split(',').any(|item| item.trim() == needle)
            }
            other => loosely_equal(actual, other),
        },
        Contains => match actual {
            SlotValue::List(items) => items.iter().any(|item| loosely_equal(item, expected)),
            SlotValue::Map(map) => map.contains_key(&expected.render()),
            other => other.render().contains(&expected.render()),
        },
        StartsWith => actual.render().starts_with(&expected.render()),
        EndsWith => actual.render().ends_with(&expected.render()),
    }
}

/// Equal as values, as numbers, or as rendered text.
fn loosely_equal(a: &SlotValue, b: &SlotValue) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (SlotValue::Bool(_), _) | (_, SlotValue::Bool(_)) => a.render() == b.render(),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.render() == b.render(),
        },
    }
}

/// Numeric ordering when both sides are numeric, otherwise lexicographic
/// on the rendered text.
fn compare(a: &SlotValue, b: &SlotValue) -> Option<Ordering> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(a.render().cmp(&b.render())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, SlotValue)]) -> SlotValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = vec![
            ConditionalRule::new("score", ConditionOperator::Gte, 90i64, "excellent"),
            ConditionalRule::new("score", ConditionOperator::Gte, 50i64, "pass"),
        ];
        let out = first_match(&rules, &ctx(&[("score", SlotValue::Number(95.0))]));
        assert_eq!(out, Some(SlotValue::text("excellent")));
        let out = first_match(&rules, &ctx(&[("score", SlotValue::text("60"))]));
        assert_eq!(out, Some(SlotValue::text("pass")));
        let out = first_match(&rules, &ctx(&[("score", SlotValue::Number(10.0))]));
        assert_eq!(out, None);
    }

    #[test]
    fn missing_field_never_matches() {
        let rules = vec![ConditionalRule::new("tier", ConditionOperator::Ne, "pro", "x")];
        assert_eq!(first_match(&rules, &SlotValues::new()), None);
    }

    #[test]
    fn string_operators() {
        let v = SlotValue::text("enterprise-plus");
        assert!(matches(ConditionOperator::StartsWith, &v, &SlotValue::text("enter")));
        assert!(matches(ConditionOperator::EndsWith, &v, &SlotValue::text("plus")));
        assert!(matches(ConditionOperator::Contains, &v, &SlotValue::text("prise")));
        assert!(!matches(ConditionOperator::Eq, &v, &SlotValue::text("enterprise")));
    }

    #[test]
    fn membership() {
        let tier = SlotValue::text("pro");
        assert!(matches(ConditionOperator::In, &tier, &SlotValue::from(vec!["free", "pro"])));
        assert!(matches(ConditionOperator::In, &tier, &SlotValue::text("free, pro")));
        let tags = SlotValue::from(vec!["a", "b"]);
        assert!(matches(ConditionOperator::Contains, &tags, &SlotValue::text("b")));
    }

    #[test]
    fn numeric_equality_across_shapes() {
        assert!(matches(
            ConditionOperator::Eq,
            &SlotValue::text("4"),
            &SlotValue::Number(4.0)
        ));
        assert!(matches(
            ConditionOperator::Eq,
            &SlotValue::Bool(true),
            &SlotValue::text("true")
        ));
    }
}
