//! Placeholder substitution and output tidying.

use crate::model::{InjectionStrategy, SlotDefinition};
use crate::value::SlotValues;

/// Slots in injection order: ascending `order` priority, unlisted slots
/// last, declaration order breaking ties.
pub fn injection_order<'a>(
    slots: &'a [SlotDefinition],
    strategy: &InjectionStrategy,
) -> Vec<&'a SlotDefinition> {
    let mut ordered: Vec<(usize, &SlotDefinition)> = slots.iter().enumerate().collect();
    ordered.sort_by_key(|(index, slot)| (strategy.priority_of(&slot.id), *index));
    ordered.into_iter().map(|(_, slot)| slot).collect()
}

/// Replace every literal `{{name}}` of each resolved slot with its rendered
/// value. Slots without a value keep their placeholder.
pub fn substitute(base: &str, ordered: &[&SlotDefinition], values: &SlotValues) -> String {
    let mut text = base.to_string();
    for slot in ordered {
        if let Some(value) = values.get(&slot.id) {
            text = text.replace(&slot.placeholder(), &value.render());
        }
    }
    text
}

/// Trim trailing whitespace on every line and collapse runs of blank lines.
pub fn optimize_output(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim_end) {
        if line.is_empty() && out.last().is_none_or(|prev| prev.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SlotValue;

    #[test]
    fn priority_then_declaration_order() {
        let slots = vec![
            SlotDefinition::user("a"),
            SlotDefinition::user("b"),
            SlotDefinition::user("c"),
        ];
        let strategy = InjectionStrategy::default().with_priority("c", 1);
        let ids: Vec<&str> = injection_order(&slots, &strategy)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn substitution_is_literal() {
        let slots = vec![SlotDefinition::user("x").named("a.b")];
        let ordered: Vec<&SlotDefinition> = slots.iter().collect();
        let values = SlotValues::from([("x".to_string(), SlotValue::text("$1"))]);
        let out = substitute("{{a.b}} and {{aXb}} and {{a.b}}", &ordered, &values);
        assert_eq!(out, "$1 and {{aXb}} and $1");
    }

    #[test]
    fn unresolved_slots_keep_placeholders() {
        let slots = vec![SlotDefinition::user("gone")];
        let ordered: Vec<&SlotDefinition> = slots.iter().collect();
        assert_eq!(substitute("hi {{gone}}", &ordered, &SlotValues::new()), "hi {{gone}}");
    }

    #[test]
    fn optimize_collapses_blank_lines() {
        assert_eq!(optimize_output("\nA  \n\n\n\nB\t\n\n"), "A\n\nB");
    }
}
