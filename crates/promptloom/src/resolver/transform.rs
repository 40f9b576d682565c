//! Slot transformations and validation rules.
//!
//! Both return `Err(reason)` on failure; the resolver attaches the slot id.

use regex::Regex;

use crate::model::{Transformation, ValidationCheck, ValidationRule};
use crate::value::{SlotValue, format_number};

pub fn apply(transformation: &Transformation, value: SlotValue) -> Result<SlotValue, String> {
    match transformation {
        Transformation::Format { template } => {
            Ok(SlotValue::Text(template.replace("{value}", &value.render())))
        }
        Transformation::Uppercase => Ok(map_text(value, |s| s.to_uppercase())),
        Transformation::Lowercase => Ok(map_text(value, |s| s.to_lowercase())),
        Transformation::Trim => Ok(map_text(value, |s| s.trim().to_string())),
        Transformation::Truncate { max_length } => {
            Ok(SlotValue::Text(value.render().chars().take(*max_length).collect()))
        }
        Transformation::Filter { pattern } => {
            let re = compile(pattern)?;
            match value {
                SlotValue::List(items) => Ok(SlotValue::List(
                    items
                        .into_iter()
                        .filter(|item| re.is_match(&item.render()))
                        .collect(),
                )),
                scalar if re.is_match(&scalar.render()) => Ok(scalar),
                scalar => Err(format!(
                    "value '{}' does not match filter /{pattern}/",
                    scalar.render()
                )),
            }
        }
        Transformation::Map { mapping, default } => {
            let key = value.render();
            Ok(mapping
                .get(&key)
                .or(default.as_ref())
                .cloned()
                .unwrap_or(value))
        }
    }
}

/// Text is transformed directly; lists element-wise; other shapes via
/// their rendering.
fn map_text(value: SlotValue, f: impl Fn(&str) -> String + Copy) -> SlotValue {
    match value {
        SlotValue::Text(s) => SlotValue::Text(f(&s)),
        SlotValue::List(items) => {
            SlotValue::List(items.into_iter().map(|item| map_text(item, f)).collect())
        }
        other => SlotValue::Text(f(&other.render())),
    }
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("invalid pattern /{pattern}/: {e}"))
}

/// Length for `minLength` / `maxLength`: item count for collections,
/// characters otherwise.
fn length(value: &SlotValue) -> usize {
    match value {
        SlotValue::List(items) => items.len(),
        SlotValue::Map(map) => map.len(),
        other => other.render().chars().count(),
    }
}

pub fn validate(rule: &ValidationRule, value: &SlotValue) -> Result<(), String> {
    check(&rule.check, value).map_err(|reason| rule.message.clone().unwrap_or(reason))
}

fn check(check: &ValidationCheck, value: &SlotValue) -> Result<(), String> {
    match check {
        ValidationCheck::NotEmpty => {
            if value.is_empty() {
                return Err("value is empty".into());
            }
        }
        ValidationCheck::MinLength { min } => {
            let len = length(value);
            if len < *min {
                return Err(format!("length {len} is below the minimum of {min}"));
            }
        }
        ValidationCheck::MaxLength { max } => {
            let len = length(value);
            if len > *max {
                return Err(format!("length {len} exceeds the maximum of {max}"));
            }
        }
        ValidationCheck::Pattern { pattern } => {
            let re = compile(pattern)?;
            if !re.is_match(&value.render()) {
                return Err(format!("value does not match /{pattern}/"));
            }
        }
        ValidationCheck::Range { min, max } => {
            let Some(n) = value.as_f64() else {
                return Err(format!("expected a number, got {}", value.type_name()));
            };
            if let Some(min) = min.filter(|min| n < *min) {
                return Err(format!("{} is below {}", format_number(n), format_number(min)));
            }
            if let Some(max) = max.filter(|max| n > *max) {
                return Err(format!("{} is above {}", format_number(n), format_number(max)));
            }
        }
        ValidationCheck::OneOf { values } => {
            let rendered = value.render();
            if !values.iter().any(|v| v == value || v.render() == rendered) {
                let allowed: Vec<String> = values.iter().map(SlotValue::render).collect();
                return Err(format!("'{rendered}' is not one of [{}]", allowed.join(", ")));
            }
        }
        ValidationCheck::Kind { expected } => {
            if value.kind() != *expected {
                return Err(format!("expected {expected}, got {}", value.kind()));
            }
        }
    }
    Ok(())
}
