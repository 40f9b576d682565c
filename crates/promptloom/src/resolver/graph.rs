//! Slot dependency graph.
//!
//! Slots form a DAG through their `dependencies`. Ordering uses a
//! three-colour depth-first search: a node is white until first visited,
//! grey while its dependencies are being explored, black once emitted.
//! Reaching a grey node again means the stack from that node down to the
//! current one is a cycle, and that path is reported verbatim. The search
//! runs on an explicit stack of `(node, next prerequisite)` frames.

use std::collections::{HashMap, HashSet};

use crate::error::{SlotError, Violations};
use crate::model::SlotDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Topologically order `slots`, dependencies first.
///
/// Returns indices into `slots`. Among slots with no ordering constraint
/// the declaration order is kept, so the result is deterministic.
///
/// Every unknown dependency is reported at once; cycle detection runs only
/// when all dependencies are known.
pub fn topological_order(slots: &[SlotDefinition]) -> Result<Vec<usize>, Violations> {
    let index: HashMap<&str, usize> = slots
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let unknown: Vec<SlotError> = slots
        .iter()
        .flat_map(|slot| {
            slot.dependencies
                .iter()
                .filter(|dep| !index.contains_key(dep.as_str()))
                .map(|dep| SlotError::UnknownDependency {
                    slot: slot.id.clone(),
                    dependency: dep.clone(),
                })
        })
        .collect();
    if !unknown.is_empty() {
        return Err(Violations(unknown));
    }

    let adjacency: Vec<Vec<usize>> = slots
        .iter()
        .map(|slot| {
            prerequisites(slot)
                .filter_map(|dep| index.get(dep).copied())
                .collect()
        })
        .collect();

    let mut colour = vec![Colour::White; slots.len()];
    let mut order = Vec::with_capacity(slots.len());
    // (node, index of the next prerequisite to explore)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..slots.len() {
        if colour[start] != Colour::White {
            continue;
        }
        colour[start] = Colour::Grey;
        stack.push((start, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            let Some(&next) = adjacency[node].get(cursor) else {
                stack.pop();
                colour[node] = Colour::Black;
                order.push(node);
                continue;
            };
            frame.1 += 1;
            match colour[next] {
                Colour::White => {
                    colour[next] = Colour::Grey;
                    stack.push((next, 0));
                }
                Colour::Grey => {
                    let from = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    let mut path: Vec<String> = stack
                        .iter()
                        .skip(from)
                        .map(|&(n, _)| slots[n].id.clone())
                        .collect();
                    path.push(slots[next].id.clone());
                    return Err(Violations(vec![SlotError::CyclicDependency { path }]));
                }
                Colour::Black => {}
            }
        }
    }
    Ok(order)
}

/// Ids a slot must wait for: its declared `dependencies`, plus the fields
/// a conditional slot tests. Ids that name no slot in the request are
/// caller values and impose no ordering.
pub fn prerequisites(slot: &SlotDefinition) -> impl Iterator<Item = &str> {
    let fields = slot
        .conditions
        .iter()
        .map(|rule| rule.field.as_str())
        .filter(move |field| *field != slot.id);
    slot.dependencies.iter().map(String::as_str).chain(fields)
}

/// Slots referenced by `text`, together with everything they transitively
/// depend on. Declaration order is kept.
pub fn referenced_closure<'a>(slots: &'a [SlotDefinition], text: &str) -> Vec<&'a SlotDefinition> {
    let by_id: HashMap<&str, &SlotDefinition> =
        slots.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut keep: HashSet<&str> = HashSet::new();
    let mut pending: Vec<&str> = slots
        .iter()
        .filter(|s| text.contains(&s.placeholder()))
        .map(|s| s.id.as_str())
        .collect();

    while let Some(id) = pending.pop() {
        if !keep.insert(id) {
            continue;
        }
        if let Some(slot) = by_id.get(id) {
            pending.extend(prerequisites(slot));
        }
    }

    slots
        .iter()
        .filter(|s| keep.contains(s.id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConditionOperator, ConditionalRule};

    fn ids(slots: &[SlotDefinition], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| slots[i].id.clone()).collect()
    }

    #[test]
    fn empty_graph() {
        assert!(topological_order(&[]).unwrap().is_empty());
    }

    #[test]
    fn independent_slots_keep_declaration_order() {
        let slots = vec![
            SlotDefinition::user("c"),
            SlotDefinition::user("a"),
            SlotDefinition::user("b"),
        ];
        let order = topological_order(&slots).unwrap();
        assert_eq!(ids(&slots, &order), ["c", "a", "b"]);
    }

    #[test]
    fn dependencies_come_first() {
        let slots = vec![
            SlotDefinition::computed("b", "a * 10").depends_on(["a"]),
            SlotDefinition::computed("a", "2 + 2"),
        ];
        let order = topological_order(&slots).unwrap();
        assert_eq!(ids(&slots, &order), ["a", "b"]);
    }

    #[test]
    fn diamond() {
        let slots = vec![
            SlotDefinition::user("d").depends_on(["b", "c"]),
            SlotDefinition::user("b").depends_on(["a"]),
            SlotDefinition::user("c").depends_on(["a"]),
            SlotDefinition::user("a"),
        ];
        let order = ids(&slots, &topological_order(&slots).unwrap());
        assert_eq!(order.first().map(String::as_str), Some("a"));
        assert_eq!(order.last().map(String::as_str), Some("d"));
    }

    #[test]
    fn cycle_reports_path() {
        let slots = vec![
            SlotDefinition::user("a").depends_on(["b"]),
            SlotDefinition::user("b").depends_on(["c"]),
            SlotDefinition::user("c").depends_on(["a"]),
        ];
        let err = topological_order(&slots).unwrap_err();
        assert_eq!(
            err.0,
            vec![SlotError::CyclicDependency {
                path: vec!["a".into(), "b".into(), "c".into(), "a".into()]
            }]
        );
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let slots = vec![SlotDefinition::user("a").depends_on(["a"])];
        let err = topological_order(&slots).unwrap_err();
        assert_eq!(
            err.0,
            vec![SlotError::CyclicDependency {
                path: vec!["a".into(), "a".into()]
            }]
        );
    }

    #[test]
    fn every_unknown_dependency_is_reported() {
        let slots = vec![
            SlotDefinition::user("a").depends_on(["x"]),
            SlotDefinition::user("b").depends_on(["y", "a"]),
        ];
        let err = topological_order(&slots).unwrap_err();
        assert_eq!(err.len(), 2);
        assert!(err.iter().all(|e| matches!(e, SlotError::UnknownDependency { .. })));
    }

    #[test]
    fn closure_follows_dependencies() {
        let slots = vec![
            SlotDefinition::user("base"),
            SlotDefinition::computed("total", "base * 2").depends_on(["base"]),
            SlotDefinition::user("unused"),
        ];
        let picked: Vec<&str> = referenced_closure(&slots, "Total: {{total}}")
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(picked, ["base", "total"]);
    }

    #[test]
    fn long_chain_is_ordered() {
        let n = 50_000;
        let slots: Vec<SlotDefinition> = (0..n)
            .map(|i| {
                let slot = SlotDefinition::user(format!("s{i}"));
                if i + 1 < n {
                    slot.depends_on([format!("s{}", i + 1)])
                } else {
                    slot
                }
            })
            .collect();
        let order = topological_order(&slots).unwrap();
        assert_eq!(order.len(), n);
        assert_eq!(order[0], n - 1);
        assert_eq!(order[n - 1], 0);
    }

    #[test]
    fn long_cycle_is_reported() {
        let n = 10_000;
        let slots: Vec<SlotDefinition> = (0..n)
            .map(|i| SlotDefinition::user(format!("s{i}")).depends_on([format!("s{}", (i + 1) % n)]))
            .collect();
        let err = topological_order(&slots).unwrap_err();
        let [SlotError::CyclicDependency { path }] = err.0.as_slice() else {
            panic!("expected one cycle, got {err:?}");
        };
        assert_eq!(path.len(), n + 1);
        assert_eq!(path.first(), path.last());
    }

    #[test]
    fn conditional_fields_naming_slots_are_prerequisites() {
        let slots = vec![
            SlotDefinition::conditional(
                "greeting",
                vec![ConditionalRule::new("tier", ConditionOperator::Eq, "pro", "Welcome back")],
            ),
            SlotDefinition::user("tier"),
        ];
        let order = topological_order(&slots).unwrap();
        assert_eq!(ids(&slots, &order), ["tier", "greeting"]);

        let caller_only = vec![SlotDefinition::conditional(
            "greeting",
            vec![ConditionalRule::new("plan", ConditionOperator::Eq, "pro", "hi")],
        )];
        assert!(topological_order(&caller_only).is_ok());
        assert_eq!(prerequisites(&caller_only[0]).collect::<Vec<_>>(), ["plan"]);
    }
}
