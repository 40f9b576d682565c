//! Configuration export documents.
//!
//! A [`ConfigExport`] bundles any of a compile configuration, slot
//! definitions, strategies, compression history and named compression
//! presets under a `metadata` header. Imports are checked against the
//! generated JSON Schema before deserializing so every problem is reported
//! at once, each prefixed with its instance path.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::compiler::CompileConfig;
use crate::compress::history::Sample;
use crate::error::EngineError;
use crate::model::{CompressionStrategy, InjectionStrategy, SlotDefinition};

/// Format version written into every export.
pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    /// RFC 3339 timestamp.
    pub exported_at: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigExport {
    pub metadata: ExportMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<CompileConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<SlotDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_strategy: Option<CompressionStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection_strategy: Option<InjectionStrategy>,
    /// Compression samples keyed by strategy id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<BTreeMap<String, Vec<Sample>>>,
    /// Named compression strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presets: Option<BTreeMap<String, CompressionStrategy>>,
}

impl ConfigExport {
    /// An empty export stamped with the clock's current time.
    pub fn new(clock: &dyn Clock) -> Self {
        Self {
            metadata: ExportMetadata {
                exported_at: clock.now().to_rfc3339(),
                version: EXPORT_VERSION.to_string(),
            },
            config: None,
            slots: None,
            compression_strategy: None,
            injection_strategy: None,
            history: None,
            presets: None,
        }
    }

    pub fn with_config(mut self, config: CompileConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_slots(mut self, slots: Vec<SlotDefinition>) -> Self {
        self.slots = Some(slots);
        self
    }

    pub fn with_compression_strategy(mut self, strategy: CompressionStrategy) -> Self {
        self.compression_strategy = Some(strategy);
        self
    }

    pub fn with_injection_strategy(mut self, strategy: InjectionStrategy) -> Self {
        self.injection_strategy = Some(strategy);
        self
    }

    pub fn with_history(mut self, history: BTreeMap<String, Vec<Sample>>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_preset(mut self, name: impl Into<String>, strategy: CompressionStrategy) -> Self {
        self.presets
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), strategy);
        self
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        validate(&value)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// JSON Schema of [`ConfigExport`].
pub fn json_schema() -> serde_json::Value {
    crate::json_schema_for::<ConfigExport>()
}

/// Check a document against the export schema and the timestamp format.
pub fn validate(document: &serde_json::Value) -> Result<(), EngineError> {
    let schema = json_schema();
    let validator = jsonschema::validator_for(&schema).map_err(|e| EngineError::Import {
        errors: vec![format!("export schema is invalid: {e}")],
    })?;

    let mut errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();

    if let Some(stamp) = document
        .pointer("/metadata/exportedAt")
        .and_then(|v| v.as_str())
        && chrono::DateTime::parse_from_rfc3339(stamp).is_err()
    {
        errors.push(format!("/metadata/exportedAt: '{stamp}' is not an RFC 3339 timestamp"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Import { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{CompressionAlgorithm, InjectionTiming, Template};

    fn sample_export() -> ConfigExport {
        let template = Template::new("greet", "Hi {{name}}")
            .with_slot(SlotDefinition::user("name").with_default("Guest"));
        ConfigExport::new(&ManualClock::default())
            .with_config(CompileConfig::new(template))
            .with_injection_strategy(
                InjectionStrategy::default().with_timing(InjectionTiming::Cached),
            )
            .with_preset(
                "tight",
                CompressionStrategy::new("tight", CompressionAlgorithm::Syntactic).with_ratio(0.4),
            )
            .with_history(BTreeMap::from([(
                "tight".to_string(),
                vec![Sample {
                    original_length: 100,
                    compressed_length: 40,
                    quality: 0.8,
                }],
            )]))
    }

    #[test]
    fn round_trips_losslessly() {
        let export = sample_export();
        let json = export.to_json().unwrap();
        let back = ConfigExport::from_json(&json).unwrap();
        assert_eq!(back, export);
        assert_eq!(back.metadata.exported_at, "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn schema_violations_are_all_reported() {
        let doc = r#"{
            "metadata": {"exportedAt": "yesterday"},
            "compressionStrategy": {"algorithm": "magic"}
        }"#;
        let err = ConfigExport::from_json(doc).unwrap_err();
        let EngineError::Import { errors } = &err else {
            panic!("expected an import error, got {err:?}");
        };
        assert!(errors.len() >= 3, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("exportedAt")));
        assert!(errors.iter().any(|e| e.starts_with("/compressionStrategy/algorithm")));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(
            ConfigExport::from_json("{not json"),
            Err(EngineError::Json(_))
        ));
    }

    #[test]
    fn schema_describes_metadata() {
        let schema = json_schema();
        assert!(schema["required"]
            .as_array()
            .unwrap()
            .contains(&"metadata".into()));
    }
}
