//! Slot values: a closed union over the shapes templates actually need.
//!
//! Values cross three boundaries, each with an explicit coercion:
//! template substitution renders them as text ([`SlotValue::render`]),
//! expressions and numeric comparisons read them as numbers
//! ([`SlotValue::as_f64`]), and JSON exchange maps them to and from
//! `serde_json::Value` ([`SlotValue::from_json`], [`SlotValue::to_json`]).

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Caller-supplied or resolved values keyed by slot id.
pub type SlotValues = BTreeMap<String, SlotValue>;

/// A concrete slot value.
///
/// Serialized untagged, so `"Acme"`, `4`, `true`, `[1, 2]` and
/// `{"k": "v"}` are all valid JSON representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SlotValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<SlotValue>),
    Map(BTreeMap<String, SlotValue>),
}

/// The tag of a [`SlotValue`], used by `kind` validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    Boolean,
    Number,
    Text,
    List,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        })
    }
}

impl SlotValue {
    pub fn text(s: impl Into<String>) -> Self {
        SlotValue::Text(s.into())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            SlotValue::Bool(_) => ValueKind::Boolean,
            SlotValue::Number(_) => ValueKind::Number,
            SlotValue::Text(_) => ValueKind::Text,
            SlotValue::List(_) => ValueKind::List,
            SlotValue::Map(_) => ValueKind::Map,
        }
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SlotValue::Bool(_) => "boolean",
            SlotValue::Number(_) => "number",
            SlotValue::Text(_) => "text",
            SlotValue::List(_) => "list",
            SlotValue::Map(_) => "map",
        }
    }

    /// Whether the value counts as "not provided". Whitespace-only text
    /// and empty collections are empty; `false` and `0` are not.
    pub fn is_empty(&self) -> bool {
        match self {
            SlotValue::Text(s) => s.trim().is_empty(),
            SlotValue::List(items) => items.is_empty(),
            SlotValue::Map(map) => map.is_empty(),
            SlotValue::Bool(_) | SlotValue::Number(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SlotValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view: numbers as-is, text parsed after trimming.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SlotValue::Number(n) => Some(*n),
            SlotValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Render for template substitution.
    ///
    /// Integral numbers print without a fractional part, lists join their
    /// rendered items with `", "`, maps render as compact JSON.
    pub fn render(&self) -> String {
        match self {
            SlotValue::Text(s) => s.clone(),
            SlotValue::Number(n) => format_number(*n),
            SlotValue::Bool(b) => b.to_string(),
            SlotValue::List(items) => items
                .iter()
                .map(SlotValue::render)
                .collect::<Vec<_>>()
                .join(", "),
            SlotValue::Map(_) => self.to_json().to_string(),
        }
    }

    /// Convert from JSON. `null` has no slot representation.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(SlotValue::Bool(b)),
            Value::Number(n) => n.as_f64().map(SlotValue::Number),
            Value::String(s) => Some(SlotValue::Text(s)),
            Value::Array(items) => Some(SlotValue::List(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
            Value::Object(map) => Some(SlotValue::Map(
                map.into_iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            SlotValue::Bool(b) => Value::Bool(*b),
            SlotValue::Number(n) => {
                if is_integral(*n) {
                    Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number)
                }
            }
            SlotValue::Text(s) => Value::String(s.clone()),
            SlotValue::List(items) => Value::Array(items.iter().map(SlotValue::to_json).collect()),
            SlotValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for SlotValue {
    fn from(s: &str) -> Self {
        SlotValue::Text(s.to_string())
    }
}

impl From<String> for SlotValue {
    fn from(s: String) -> Self {
        SlotValue::Text(s)
    }
}

impl From<f64> for SlotValue {
    fn from(n: f64) -> Self {
        SlotValue::Number(n)
    }
}

impl From<i64> for SlotValue {
    fn from(n: i64) -> Self {
        SlotValue::Number(n as f64)
    }
}

impl From<bool> for SlotValue {
    fn from(b: bool) -> Self {
        SlotValue::Bool(b)
    }
}

impl<T: Into<SlotValue>> From<Vec<T>> for SlotValue {
    fn from(items: Vec<T>) -> Self {
        SlotValue::List(items.into_iter().map(Into::into).collect())
    }
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15
}

/// Format a number the way a template author expects: `40`, not `40.0`.
pub fn format_number(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
