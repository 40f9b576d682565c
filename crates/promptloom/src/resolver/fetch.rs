//! Outbound data-source calls for `api` slots.
//!
//! [`ApiFetcher`] is the seam: the resolver only ever talks to a trait
//! object, so tests plug in fakes and hosts can route through their own
//! HTTP stack. [`HttpFetcher`] is the reqwest-backed default.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace};

use crate::model::{ApiSource, HttpMethod};
use crate::value::SlotValues;

pub type FetchResult = Result<serde_json::Value, String>;

/// Boxed future returned by [`ApiFetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = FetchResult> + Send + 'a>>;

/// A fully interpolated request, ready to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRequest {
    pub endpoint: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ApiRequest {
    /// Build a request from `source`, filling `{{slot_id}}` references in
    /// the endpoint, header values and text params from `context`.
    pub fn from_source(source: &ApiSource, context: &SlotValues) -> Self {
        Self {
            endpoint: interpolate(&source.endpoint, context),
            method: source.method,
            headers: source
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), interpolate(v, context)))
                .collect(),
            params: source
                .params
                .iter()
                .map(|(k, v)| {
                    let value = match v.as_str() {
                        Some(text) => serde_json::Value::String(interpolate(text, context)),
                        None => v.to_json(),
                    };
                    (k.clone(), value)
                })
                .collect(),
        }
    }

    /// Params as query pairs; non-text values use their JSON form.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

fn interpolate(text: &str, context: &SlotValues) -> String {
    if !text.contains("{{") {
        return text.to_string();
    }
    context.iter().fold(text.to_string(), |acc, (id, value)| {
        acc.replace(&format!("{{{{{id}}}}}"), &value.render())
    })
}

pub trait ApiFetcher: Send + Sync {
    /// Perform one request. Errors are human-readable strings; HTTP status
    /// failures must contain `HTTP <code>` so they can be classified.
    fn fetch<'a>(&'a self, request: &'a ApiRequest) -> FetchFuture<'a>;
}

/// Walk a dotted path (`data.items.0.name`) into a JSON value. Numeric
/// segments index arrays. An empty path returns the value itself.
pub fn extract_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            serde_json::Value::Object(map) => map.get(segment),
            serde_json::Value::Array(items) => {
                segment.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        })
}

// ── HTTP ───────────────────────────────────────────────────────────

/// reqwest-backed fetcher. GET sends params as a query string; every
/// other method sends them as a JSON body.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("promptloom/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ApiFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, request: &'a ApiRequest) -> FetchFuture<'a> {
        Box::pin(async move {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Put => reqwest::Method::PUT,
                HttpMethod::Patch => reqwest::Method::PATCH,
                HttpMethod::Delete => reqwest::Method::DELETE,
            };
            debug!("[fetch] {:?} {}", request.method, request.endpoint);

            let mut builder = self.client.request(method, &request.endpoint);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            builder = match request.method {
                HttpMethod::Get => builder.query(&request.query_pairs()),
                _ => builder.json(&request.params),
            };

            let start = Instant::now();
            let resp = builder
                .send()
                .await
                .map_err(|e| format!("request failed: {e}"))?;
            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|e| format!("failed to read response: {e}"))?;
            debug!(
                "[fetch] HTTP {} in {}ms ({} bytes)",
                status,
                start.elapsed().as_millis(),
                text.len()
            );

            if !status.is_success() {
                let snippet: String = text.chars().take(200).collect();
                return Err(format!("HTTP {status}: {snippet}"));
            }
            trace!("[fetch] body: {text}");

            // Non-JSON bodies are passed through as text.
            Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SlotValue;
    use serde_json::json;

    #[test]
    fn extract_nested_path() {
        let body = json!({"data": {"items": [{"name": "first"}, {"name": "second"}]}});
        assert_eq!(
            extract_path(&body, "data.items.1.name"),
            Some(&json!("second"))
        );
        assert_eq!(extract_path(&body, "data.missing"), None);
        assert_eq!(extract_path(&body, "data.items.x"), None);
        assert_eq!(extract_path(&body, ""), Some(&body));
    }

    #[test]
    fn request_interpolates_context() {
        let mut context = SlotValues::new();
        context.insert("city".into(), SlotValue::text("Oslo"));
        context.insert("days".into(), SlotValue::Number(3.0));

        let source = ApiSource::get("https://api.test/weather/{{city}}")
            .with_param("units", "metric")
            .with_param("span", "{{days}}d")
            .with_param("limit", 5i64);
        let request = ApiRequest::from_source(&source, &context);

        assert_eq!(request.endpoint, "https://api.test/weather/Oslo");
        assert_eq!(request.params["span"], json!("3d"));
        assert_eq!(request.params["limit"], json!(5));

        let mut pairs = request.query_pairs();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("limit".to_string(), "5".to_string()),
                ("span".to_string(), "3d".to_string()),
                ("units".to_string(), "metric".to_string()),
            ]
        );
    }

    #[test]
    fn http_fetcher_builds() {
        assert!(HttpFetcher::new().is_ok());
    }
}
