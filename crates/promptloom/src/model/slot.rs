//! Slot definitions and everything hanging off them: data sources,
//! transformations, validation rules, caching and error-handling policy.
//!
//! These records are owned by the caller (a template store or editor) and
//! treated as read-only input by the engine.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::value::{SlotValue, ValueKind};

/// How a slot obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SlotKind {
    /// Supplied by the caller at compile time.
    #[default]
    User,
    /// Provided by the environment (time, locale, platform, …).
    System,
    /// Fetched from a remote endpoint.
    Api,
    /// Evaluated from an expression over other slots.
    Computed,
    /// Chosen by the first matching rule over the slot context.
    Conditional,
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SlotKind::User => "user",
            SlotKind::System => "system",
            SlotKind::Api => "api",
            SlotKind::Computed => "computed",
            SlotKind::Conditional => "conditional",
        })
    }
}

/// A named, typed placeholder in a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotDefinition {
    /// Identity used for values, dependencies and ordering.
    pub id: String,
    /// Name used in the template placeholder (`{{name}}`).
    pub name: String,
    #[serde(default)]
    pub kind: SlotKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<SlotValue>,
    /// Ids of slots that must resolve before this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_rules: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<Transformation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching: Option<CachingPolicy>,
    #[serde(default)]
    pub error_handling: ErrorHandling,
    /// Ordered rules for `conditional` slots. First match wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ConditionalRule>,
}

impl SlotDefinition {
    /// A slot of the given kind whose name equals its id.
    pub fn new(id: impl Into<String>, kind: SlotKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            required: false,
            default_value: None,
            dependencies: Vec::new(),
            validation_rules: Vec::new(),
            transformation: None,
            data_source: None,
            caching: None,
            error_handling: ErrorHandling::default(),
            conditions: Vec::new(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(id, SlotKind::User)
    }

    pub fn system(id: impl Into<String>) -> Self {
        Self::new(id, SlotKind::System)
    }

    pub fn api(id: impl Into<String>, source: ApiSource) -> Self {
        Self::new(id, SlotKind::Api).with_data_source(DataSource::Api(source))
    }

    pub fn computed(id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::new(id, SlotKind::Computed).with_data_source(DataSource::Computed {
            expression: Some(expression.into()),
            formula: None,
        })
    }

    pub fn conditional(id: impl Into<String>, conditions: Vec<ConditionalRule>) -> Self {
        Self {
            conditions,
            ..Self::new(id, SlotKind::Conditional)
        }
    }

    /// Override the placeholder name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<SlotValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_data_source(mut self, source: DataSource) -> Self {
        self.data_source = Some(source);
        self
    }

    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformation = Some(transformation);
        self
    }

    pub fn with_validation(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }

    pub fn with_caching(mut self, caching: CachingPolicy) -> Self {
        self.caching = Some(caching);
        self
    }

    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = error_handling;
        self
    }

    /// The literal token this slot occupies in a template.
    pub fn placeholder(&self) -> String {
        format!("{{{{{}}}}}", self.name)
    }
}

// ── Data sources ───────────────────────────────────────────────────

/// Where a non-user slot gets its raw value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataSource {
    Static {
        value: SlotValue,
    },
    Api(ApiSource),
    /// `expression` wins when both are present; `formula` is an alias.
    Computed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expression: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        formula: Option<String>,
    },
    /// A source the engine cannot reach; resolves to its fallback.
    #[serde(rename_all = "camelCase")]
    External {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback_value: Option<SlotValue>,
    },
}

impl DataSource {
    /// Tag name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataSource::Static { .. } => "static",
            DataSource::Api(_) => "api",
            DataSource::Computed { .. } => "computed",
            DataSource::External { .. } => "external",
        }
    }
}

/// HTTP method for API data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A remote endpoint that produces a slot value.
///
/// `endpoint` and text-valued `params` may reference other slots as
/// `{{slot_id}}`; those references are filled from the resolution context
/// before the request is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiSource {
    pub endpoint: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, SlotValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_extraction: Option<ResponseExtraction>,
}

impl ApiSource {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            response_extraction: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<SlotValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Extract the value at a dotted field path (`data.items.0.name`).
    pub fn extract(mut self, path: impl Into<String>) -> Self {
        let extraction = self.response_extraction.get_or_insert_with(Default::default);
        extraction.path = Some(path.into());
        self
    }
}

/// How to turn an API response body into a slot value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseExtraction {
    /// Dotted path into the JSON body; numeric segments index arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Applied to the extracted value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transformation>,
}

// ── Transformations & validation ───────────────────────────────────

/// A pure value-to-value function applied after resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Transformation {
    /// Replace `{value}` in `template` with the rendered value.
    Format { template: String },
    Uppercase,
    Lowercase,
    Trim,
    /// Keep at most `max_length` characters of the rendered value.
    #[serde(rename_all = "camelCase")]
    Truncate { max_length: usize },
    /// Lists keep items whose rendering matches; scalars must match.
    Filter { pattern: String },
    /// Look the rendered value up in `mapping`; unmapped values use
    /// `default` or pass through unchanged.
    Map {
        mapping: BTreeMap<String, SlotValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<SlotValue>,
    },
}

/// A declared constraint on a resolved value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(flatten)]
    pub check: ValidationCheck,
    /// Overrides the generated failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationRule {
    pub fn new(check: ValidationCheck) -> Self {
        Self {
            check,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ValidationCheck {
    NotEmpty,
    /// Minimum rendered length, in characters (items for lists).
    MinLength { min: usize },
    MaxLength { max: usize },
    Pattern { pattern: String },
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    OneOf { values: Vec<SlotValue> },
    Kind { expected: ValueKind },
}

// ── Caching & error handling ───────────────────────────────────────

/// Per-slot value caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CachingPolicy {
    pub enabled: bool,
    pub ttl_seconds: u64,
    /// Cache key; the slot id when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Default for CachingPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300,
            key: None,
        }
    }
}

impl CachingPolicy {
    pub fn ttl(seconds: u64) -> Self {
        Self {
            ttl_seconds: seconds,
            ..Self::default()
        }
    }
}

/// What to do when a slot cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ErrorStrategy {
    /// Use `fallbackValue`, else `defaultValue`.
    #[default]
    Fallback,
    /// Retries are spent by the fetch loop; the final failure falls back
    /// to the default.
    Retry,
    /// Log a warning and use the default.
    Alert,
    /// Leave the slot out of the resolved map.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHandling {
    #[serde(default)]
    pub strategy: ErrorStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_value: Option<SlotValue>,
    /// Overrides the request-wide retry count for this slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl ErrorHandling {
    pub fn new(strategy: ErrorStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn skip() -> Self {
        Self::new(ErrorStrategy::Skip)
    }

    pub fn fallback(value: impl Into<SlotValue>) -> Self {
        Self {
            strategy: ErrorStrategy::Fallback,
            fallback_value: Some(value.into()),
            retry_count: None,
        }
    }

    pub fn with_retries(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }
}

// ── Conditional rules ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Contains,
    StartsWith,
    EndsWith,
}

/// `field <operator> value ⇒ output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalRule {
    /// Slot id (or caller value key) to test.
    pub field: String,
    pub operator: ConditionOperator,
    pub value: SlotValue,
    pub output: SlotValue,
}

impl ConditionalRule {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<SlotValue>,
        output: impl Into<SlotValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            output: output.into(),
        }
    }
}
