//! Prompt compilation engine.
//!
//! `promptloom` turns a parameterized prompt template, a set of slot values
//! and a pair of strategies into a final, bounded-size prompt plus cost and
//! quality estimates and diagnostics. The core entry point is
//! [`PromptCompiler::compile`](compiler::PromptCompiler::compile):
//!
//! 1. validate the template's slots (every missing required value at once),
//! 2. resolve slot values in dependency order through the
//!    [`SlotResolver`](resolver::SlotResolver),
//! 3. substitute `{{name}}` placeholders in priority order,
//! 4. compress the result with the [`Compressor`](compress::Compressor)
//!    when a compression strategy is given,
//! 5. attach metrics, suggestions and issues, and cache the preview.
//!
//! # Getting started
//!
//! ```ignore
//! use promptloom::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let compiler = PromptCompiler::new(EngineConfig::default())?;
//!
//!     let template = Template::new("greet", "Hi {{name}} from {{company}}")
//!         .with_slot(SlotDefinition::user("name").with_default("Guest"))
//!         .with_slot(SlotDefinition::user("company").required());
//!     let values = SlotValues::from([("company".into(), SlotValue::text("Acme"))]);
//!
//!     let preview = compiler
//!         .compile(
//!             &template,
//!             &values,
//!             &InjectionStrategy::default(),
//!             Some(&CompressionStrategy::default()),
//!             &CompileOptions::default(),
//!         )
//!         .await?;
//!
//!     println!("{}", preview.compiled_prompt);
//!     println!("~{} tokens, ${:.5}", preview.token_count, preview.estimated_cost);
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Describe templates and slots:** [`model`] holds the input records
//!   ([`Template`](model::Template), [`SlotDefinition`](model::SlotDefinition),
//!   [`InjectionStrategy`](model::InjectionStrategy),
//!   [`CompressionStrategy`](model::CompressionStrategy)). Values are
//!   [`SlotValue`](value::SlotValue)s.
//!
//! - **Fetch slot values from HTTP APIs:** implement
//!   [`ApiFetcher`](resolver::fetch::ApiFetcher) or use the reqwest-backed
//!   [`HttpFetcher`](resolver::fetch::HttpFetcher).
//!
//! - **Compress text on its own:** [`Compressor::compress`](compress::Compressor::compress).
//!
//! - **Tune constants:** [`EngineConfig`](config::EngineConfig), loadable from JSON.
//!
//! - **Exchange configurations:** [`ConfigExport`](export::ConfigExport) with
//!   schema-validated import.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`compiler`] | [`PromptCompiler`](compiler::PromptCompiler), metrics, suggestions, issues |
//! | [`resolver`] | Dependency ordering, per-kind resolution, API fetching, retries |
//! | [`compress`] | Preprocessing, syntactic and semantic steps, quality scoring, history |
//! | [`model`] | Templates, slot definitions, strategies |
//! | [`cache`] | TTL cache with lazy expiry |
//! | [`export`] | Export documents and their JSON Schema |

pub mod cache;
pub mod clock;
pub mod compiler;
pub mod compress;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod prelude;
pub mod resolver;
pub mod value;

use schemars::JsonSchema;

// Re-export schemars for downstream crates.
pub use schemars;

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// ```
/// use promptloom::json_schema_for;
/// use promptloom::model::Template;
///
/// let schema = json_schema_for::<Template>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"basePrompt".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}
