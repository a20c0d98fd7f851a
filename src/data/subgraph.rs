//! GraphQL subgraph client.
//!
//! Posts the source's query document to its endpoint with rate limiting and
//! retry, then coerces the returned records into [`RawPoint`]s. Records whose
//! timestamp or value cannot be read are quarantined here and never reach the
//! revenue pipeline.

use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::{IngestionConfig, RateLimitConfig, SourceConfig};
use crate::data::{PageRequest, QueryShape, RawPoint, RevenueFeed, RevenuePage};
use crate::errors::FetchError;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct SubgraphClient {
    http: reqwest::Client,
    limiter: Arc<Limiter>,
    api_key: Option<SecretString>,
    max_retries: u32,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
}

impl SubgraphClient {
    pub fn new(
        ingestion: &IngestionConfig,
        rate_limit: &RateLimitConfig,
        api_key: Option<SecretString>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(ingestion.request_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        if api_key.is_none() {
            warn!("SUBGRAPH_API_KEY not set, querying endpoints without authentication");
        }

        Ok(Self {
            http,
            limiter: create_rate_limiter(rate_limit),
            api_key,
            max_retries: ingestion.max_retries,
            backoff_base_ms: rate_limit.backoff_base_ms,
            backoff_max_ms: rate_limit.backoff_max_ms,
        })
    }

    async fn post_query(&self, endpoint: &str, body: &Value) -> Result<Value, FetchError> {
        let mut request = self.http.post(endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let envelope: GraphQlResponse = resp.json().await?;
        if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::GraphQl(messages.join("; ")));
        }

        envelope
            .data
            .ok_or_else(|| FetchError::Decode("response has neither data nor errors".to_string()))
    }

    // === Retry Logic ===

    async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0u32;

        loop {
            self.limiter.until_ready().await;

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;

                    if !e.is_retryable() || attempt > self.max_retries {
                        return Err(e);
                    }

                    let backoff_ms = std::cmp::min(
                        self.backoff_base_ms.saturating_mul(2u64.saturating_pow(attempt - 1)),
                        self.backoff_max_ms,
                    );

                    warn!(
                        attempt,
                        backoff_ms,
                        error = %e,
                        "Retrying after transient failure"
                    );

                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }
}

#[async_trait]
impl RevenueFeed for SubgraphClient {
    #[instrument(skip(self, source, request), fields(source = %source.id, page_skip = request.skip))]
    async fn fetch_page(&self, source: &SourceConfig, request: &PageRequest) -> Result<RevenuePage> {
        let shape = source.query_shape();
        let body = serde_json::json!({
            "query": shape.document(),
            "variables": shape.variables(request),
        });

        let data = self
            .with_retry(|| self.post_query(&source.endpoint, &body))
            .await
            .with_context(|| format!("Subgraph query failed for source {}", source.id))?;

        let records = data
            .get(&shape.collection)
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Decode(format!("missing `{}` collection", shape.collection)))
            .with_context(|| format!("Unexpected response for source {}", source.id))?;

        let has_more = records.len() >= request.first;
        let (points, quarantined) = coerce_records(records, &shape);

        if quarantined > 0 {
            warn!(
                source = %source.id,
                quarantined,
                accepted = points.len(),
                "Quarantined malformed records"
            );
        }
        debug!(records = records.len(), has_more, "Subgraph page decoded");

        Ok(RevenuePage {
            points,
            received: records.len(),
            has_more,
        })
    }

    fn name(&self) -> &str {
        "subgraph"
    }
}

// === Helper Functions ===

fn create_rate_limiter(config: &RateLimitConfig) -> Arc<Limiter> {
    let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);

    let quota = Quota::per_second(rps).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQlErrorMessage>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

/// Split records into well-formed points and a count of rejects.
fn coerce_records(records: &[Value], shape: &QueryShape) -> (Vec<RawPoint>, usize) {
    let mut points = Vec::with_capacity(records.len());
    let mut quarantined = 0usize;

    for record in records {
        let timestamp = record.get(shape.timestamp_field).and_then(coerce_timestamp);
        let value = record.get(shape.value_field).and_then(coerce_decimal);
        match (timestamp, value) {
            (Some(timestamp), Some(value)) => points.push(RawPoint { timestamp, value }),
            _ => quarantined += 1,
        }
    }

    (points, quarantined)
}

fn coerce_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Subgraph BigDecimal fields arrive as strings, occasionally in scientific
/// notation; some indexers emit plain JSON numbers instead.
fn coerce_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use crate::data::tests::source;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(api_key: Option<&str>) -> SubgraphClient {
        let ingestion = IngestionConfig {
            page_size: 100,
            source_timeout_seconds: 30,
            request_timeout_seconds: 5,
            max_retries: 2,
        };
        let rate_limit = RateLimitConfig {
            requests_per_second: 100,
            burst_size: 100,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
        };
        SubgraphClient::new(&ingestion, &rate_limit, api_key.map(SecretString::from)).unwrap()
    }

    fn dex_source(server: &MockServer) -> SourceConfig {
        let mut src = source("quickswap-polygon", SourceKind::DexDayData);
        src.entity = Some("algebraDayDatas".to_string());
        src.endpoint = format!("{}/subgraph", server.uri());
        src
    }

    fn request(first: usize) -> PageRequest {
        PageRequest {
            skip: 0,
            first,
            window: None,
        }
    }

    #[test]
    fn test_coerce_decimal_forms() {
        assert_eq!(coerce_decimal(&json!("1234.5")), Some(dec!(1234.5)));
        assert_eq!(coerce_decimal(&json!(42)), Some(dec!(42)));
        assert_eq!(coerce_decimal(&json!("1.5e3")), Some(dec!(1500)));
        assert_eq!(coerce_decimal(&json!(0.25)), Some(dec!(0.25)));
        assert_eq!(coerce_decimal(&json!("n/a")), None);
        assert_eq!(coerce_decimal(&json!(null)), None);
    }

    #[test]
    fn test_coerce_timestamp_forms() {
        assert_eq!(coerce_timestamp(&json!(1704067200)), Some(1704067200));
        assert_eq!(coerce_timestamp(&json!("1704067200")), Some(1704067200));
        assert_eq!(coerce_timestamp(&json!(true)), None);
    }

    #[tokio::test]
    async fn test_page_is_decoded_and_malformed_records_quarantined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/subgraph"))
            .and(body_partial_json(json!({"variables": {"first": 3, "skip": 0}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "algebraDayDatas": [
                        {"date": 1704153600, "feesUSD": "2500.75"},
                        {"date": "1704067200", "feesUSD": 1000},
                        {"date": 1703980800, "feesUSD": "garbage"}
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(None)
            .fetch_page(&dex_source(&server), &request(3))
            .await
            .unwrap();

        assert_eq!(
            page.points,
            vec![
                RawPoint::new(1704153600, dec!(2500.75)),
                RawPoint::new(1704067200, dec!(1000)),
            ]
        );
        assert_eq!(page.received, 3);
        assert!(page.has_more, "a full page implies more may follow");
    }

    #[tokio::test]
    async fn test_fully_malformed_page_still_reports_records() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "algebraDayDatas": [
                        {"date": 1704153600, "feesUSD": null},
                        {"date": "soon", "feesUSD": "1"}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let page = client(None)
            .fetch_page(&dex_source(&server), &request(2))
            .await
            .unwrap();
        assert!(page.points.is_empty());
        assert_eq!(page.received, 2);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_short_page_ends_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"algebraDayDatas": [{"date": 1, "feesUSD": "1"}]}
            })))
            .mount(&server)
            .await;

        let page = client(None)
            .fetch_page(&dex_source(&server), &request(100))
            .await
            .unwrap();
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_bearer_auth_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"algebraDayDatas": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(Some("test-key"))
            .fetch_page(&dex_source(&server), &request(100))
            .await
            .unwrap();
        assert!(page.points.is_empty());
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"algebraDayDatas": [{"date": 1, "feesUSD": "5"}]}
            })))
            .mount(&server)
            .await;

        let page = client(None)
            .fetch_page(&dex_source(&server), &request(100))
            .await
            .unwrap();
        assert_eq!(page.points.len(), 1);
    }

    #[tokio::test]
    async fn test_graphql_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"message": "Type `Query` has no field `algebraDayDatas`"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(None)
            .fetch_page(&dex_source(&server), &request(100))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("has no field"));
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("auth error: invalid key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(Some("bad"))
            .fetch_page(&dex_source(&server), &request(100))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("401"));
    }

    #[tokio::test]
    async fn test_retries_give_up_after_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let result = client(None)
            .fetch_page(&dex_source(&server), &request(100))
            .await;
        assert!(result.is_err());
    }
}
