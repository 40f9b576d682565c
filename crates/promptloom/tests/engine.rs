use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use promptloom::compiler::diagnostics::IssueKind;
use promptloom::error::SlotError;
use promptloom::prelude::*;
use promptloom::resolver::fetch::{ApiRequest, FetchFuture};

/// Answers every request with the same JSON body.
struct StaticFetcher {
    body: serde_json::Value,
    calls: AtomicUsize,
}

impl StaticFetcher {
    fn new(body: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            body,
            calls: AtomicUsize::new(0),
        })
    }
}

impl ApiFetcher for StaticFetcher {
    fn fetch<'a>(&'a self, _request: &'a ApiRequest) -> FetchFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        })
    }
}

fn compiler_with(fetcher: Arc<dyn ApiFetcher>) -> PromptCompiler {
    let config = EngineConfig::default();
    let resolver = SlotResolver::with_fetcher(&config, fetcher);
    PromptCompiler::with_resolver(config, resolver)
}

fn compiler() -> PromptCompiler {
    compiler_with(StaticFetcher::new(serde_json::Value::Null))
}

fn welcome() -> Template {
    Template::new("welcome", "Hi {{name}}, welcome to {{company}}.")
        .with_slot(SlotDefinition::user("name").with_default("Guest"))
        .with_slot(SlotDefinition::user("company").required())
}

fn values(pairs: &[(&str, &str)]) -> SlotValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), SlotValue::text(*v)))
        .collect()
}

// ── Compile scenarios ──────────────────────────────────────────────

#[tokio::test]
async fn welcome_uses_default_and_caller_value() {
    let preview = compiler()
        .compile(
            &welcome(),
            &values(&[("company", "Acme")]),
            &InjectionStrategy::default(),
            None,
            &CompileOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(preview.compiled_prompt, "Hi Guest, welcome to Acme.");
    assert!(preview.issues.is_empty());
}

#[tokio::test]
async fn strict_mode_names_only_the_missing_required_slot() {
    let err = compiler()
        .compile(
            &welcome(),
            &SlotValues::new(),
            &InjectionStrategy::default(),
            None,
            &CompileOptions::default().strict(),
        )
        .await
        .unwrap_err();
    let violations = err.violations().expect("structural error");
    assert_eq!(violations.missing_slots(), ["company"]);
    assert_eq!(violations.len(), 1);
}

#[tokio::test]
async fn zero_slot_template_is_unchanged() {
    let template = Template::new("plain", "  Nothing to {fill} here.\n\n\n");
    let preview = compiler()
        .compile(
            &template,
            &SlotValues::new(),
            &InjectionStrategy::default(),
            None,
            &CompileOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(preview.compiled_prompt, template.base_prompt);
}

#[tokio::test]
async fn resolved_placeholders_vanish_and_skipped_ones_are_reported() {
    let template = Template::new("mixed", "{{greeting}} Forecast: {{forecast}}")
        .with_slot(SlotDefinition::user("greeting").with_default("Hello."))
        .with_slot(
            SlotDefinition::computed("forecast", "unknown_input * 2")
                .with_error_handling(ErrorHandling::skip()),
        );
    let preview = compiler()
        .compile(
            &template,
            &SlotValues::new(),
            &InjectionStrategy::default(),
            None,
            &CompileOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(preview.compiled_prompt, "Hello. Forecast: {{forecast}}");
    assert!(!preview.compiled_prompt.contains("{{greeting}}"));
    let unresolved: Vec<_> = preview
        .issues
        .iter()
        .filter(|i| i.kind == IssueKind::UnresolvedPlaceholder)
        .collect();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].slot.as_deref(), Some("forecast"));
}

#[tokio::test]
async fn api_slots_are_fetched_and_extracted() {
    let fetcher = StaticFetcher::new(serde_json::json!({"current": {"temp": 21}}));
    let compiler = compiler_with(fetcher.clone());
    let template = Template::new("weather", "It is {{temp}} degrees.").with_slot(SlotDefinition::api(
        "temp",
        ApiSource::get("https://weather.example/now").extract("current.temp"),
    ));
    let preview = compiler
        .compile(
            &template,
            &SlotValues::new(),
            &InjectionStrategy::default(),
            None,
            &CompileOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(preview.compiled_prompt, "It is 21 degrees.");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

// ── Resolution properties ──────────────────────────────────────────

#[tokio::test]
async fn computed_dependencies_resolve_in_order() {
    let resolver = SlotResolver::with_fetcher(&EngineConfig::default(), StaticFetcher::new(serde_json::Value::Null));
    let slots = [
        SlotDefinition::computed("b", "a * 10").depends_on(["a"]),
        SlotDefinition::computed("a", "2 + 2"),
    ];
    let resolved = resolver
        .resolve_slots(
            &slots,
            &SlotValues::new(),
            &InjectionStrategy::default(),
            &ResolveOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(resolved.get("a"), Some(&SlotValue::Number(4.0)));
    assert_eq!(resolved.get("b"), Some(&SlotValue::Number(40.0)));
    assert_eq!(resolved.order, ["a", "b"]);
}

#[tokio::test]
async fn cycles_are_reported_with_their_path() {
    let resolver = SlotResolver::with_fetcher(&EngineConfig::default(), StaticFetcher::new(serde_json::Value::Null));
    let slots = [
        SlotDefinition::computed("a", "b + 1").depends_on(["b"]),
        SlotDefinition::computed("b", "a + 1").depends_on(["a"]),
    ];
    let err = resolver
        .resolve_slots(
            &slots,
            &SlotValues::new(),
            &InjectionStrategy::default(),
            &ResolveOptions::default(),
        )
        .await
        .unwrap_err();
    let violations = err.violations().expect("structural error");
    assert!(violations.iter().any(|v| matches!(
        v,
        SlotError::CyclicDependency { path } if path.first() == path.last() && path.len() == 3
    )));
}

#[tokio::test]
async fn resolution_is_deterministic_without_cache() {
    let resolver = SlotResolver::with_fetcher(&EngineConfig::default(), StaticFetcher::new(serde_json::Value::Null));
    let slots = [
        SlotDefinition::user("city").with_default("Oslo"),
        SlotDefinition::computed("label", "'City: ' + city").depends_on(["city"]),
        SlotDefinition::conditional(
            "tier",
            vec![ConditionalRule::new("city", ConditionOperator::Eq, "Oslo", "nordic")],
        )
        .with_default("other"),
    ];
    let options = ResolveOptions::default().without_cache();
    let strategy = InjectionStrategy::default();
    let first = resolver
        .resolve_slots(&slots, &SlotValues::new(), &strategy, &options)
        .await
        .unwrap();
    let second = resolver
        .resolve_slots(&slots, &SlotValues::new(), &strategy, &options)
        .await
        .unwrap();
    assert_eq!(first.values, second.values);
    assert_eq!(first.get("label"), Some(&SlotValue::text("City: Oslo")));
}

// ── Compression properties ─────────────────────────────────────────

#[test]
fn adaptive_retry_on_dense_sentence_never_lowers_the_ratio() {
    let text = "Rust makes systems programming feel safe";
    assert_eq!(text.chars().count(), 40);
    let strategy = CompressionStrategy::new("dense", CompressionAlgorithm::Hybrid)
        .with_ratio(0.5)
        .with_quality_threshold(0.9)
        .adaptive(0.5);
    let result = Compressor::new()
        .compress(text, &strategy, &CompressOptions::default())
        .unwrap();
    assert!(result.metrics.adaptive_retry);
    assert!(result.metrics.target_ratio > 0.5);
    assert!(result.compression_ratio >= result.metrics.first_pass_ratio);
}

#[test]
fn second_pass_does_not_compress_further() {
    let compressor = Compressor::new();
    let strategy = CompressionStrategy::default().with_ratio(0.5);
    let text = "Basically, you should really just restart the server.";
    let once = compressor
        .compress(text, &strategy, &CompressOptions::default())
        .unwrap();
    let twice = compressor
        .compress(&once.compressed_text, &strategy, &CompressOptions::default())
        .unwrap();
    assert_eq!(twice.compressed_text, once.compressed_text);
    assert_eq!(twice.compression_ratio, 1.0);
}

#[test]
fn measured_ratio_matches_literal_lengths() {
    let text = "I think it is important to note that, in order to succeed, the team \
                should really prioritize testing. Maybe the team should prioritize testing first.";
    let compressor = Compressor::new();
    for algorithm in [
        CompressionAlgorithm::Syntactic,
        CompressionAlgorithm::Semantic,
        CompressionAlgorithm::Hybrid,
    ] {
        for target in [0.3, 0.7, 1.0] {
            let strategy = CompressionStrategy::new("ratio", algorithm).with_ratio(target);
            let r = compressor
                .compress(text, &strategy, &CompressOptions::default())
                .unwrap();
            let expected =
                r.compressed_text.chars().count() as f64 / r.original_text.chars().count() as f64;
            assert_eq!(r.compression_ratio, expected, "{algorithm} at {target}");
            assert_eq!(r.original_text, text);
        }
    }
}

// ── Export round trip ──────────────────────────────────────────────

#[tokio::test]
async fn exported_configuration_compiles_identically() {
    let config = CompileConfig {
        template: welcome().with_slot(
            SlotDefinition::user("tone")
                .with_default("  FRIENDLY ")
                .with_transformation(Transformation::Trim),
        ),
        injection_strategy: InjectionStrategy::default().with_priority("company", 1),
        compression_strategy: Some(
            CompressionStrategy::new("export", CompressionAlgorithm::Syntactic)
                .with_ratio(0.8)
                .with_rule(CompressionRule::replace("short", "welcome to", "at")),
        ),
        options: CompileOptions::default(),
    };
    let export = ConfigExport::new(&SystemClock).with_config(config.clone());
    let imported = ConfigExport::from_json(&export.to_json().unwrap()).unwrap();
    let imported_config = imported.config.expect("config section");
    assert_eq!(imported_config, config);

    let v = values(&[("company", "Acme")]);
    let original = compiler().compile_config(&config, &v).await.unwrap();
    let reimported = compiler().compile_config(&imported_config, &v).await.unwrap();
    assert_eq!(original.compiled_prompt, reimported.compiled_prompt);
    assert_eq!(original.compiled_prompt, "Hi Guest, at Acme.");
}
