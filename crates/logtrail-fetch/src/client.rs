use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use logtrail_types::{DegradeReason, FetchError, LogRecord, LogsOutcome, QueryParams};

use crate::cache::CacheService;
use crate::config::FetchConfig;
use crate::fallback::fallback_records;

/// Transport seam for the logs endpoint.
///
/// The coordinator only needs a raw response body and a health probe; the
/// HTTP details live behind this trait so tests can script failures.
pub trait Transport: Send + Sync + 'static {
    /// Issue one request with the merged query parameters
    fn fetch(
        &self,
        params: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<Value, FetchError>> + Send;

    /// Cheap health probe of the remote service
    fn probe(&self) -> impl Future<Output = bool> + Send;
}

/// reqwest-backed transport for the logs endpoint
pub struct HttpTransport {
    client: reqwest::Client,
    logs_url: String,
    health_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| FetchError::Network(err.to_string()))?;

        Ok(Self {
            client,
            logs_url: config.logs_url(),
            health_url: config.health_url(),
            timeout: config.timeout,
        })
    }
}

fn classify_request_error(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else if err.is_decode() {
        FetchError::MalformedResponse(err.to_string())
    } else {
        FetchError::Network(err.to_string())
    }
}

impl Transport for HttpTransport {
    fn fetch(
        &self,
        params: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<Value, FetchError>> + Send {
        let request = self.client.get(&self.logs_url).query(params);
        let timeout = self.timeout;

        async move {
            let response = request
                .send()
                .await
                .map_err(|err| classify_request_error(err, timeout))?;

            let status = response.status();
            if status.is_server_error() {
                // The service may recover, worth a retry
                return Err(FetchError::Network(format!("HTTP {status}")));
            }
            if !status.is_success() {
                return Err(FetchError::MalformedResponse(format!("HTTP {status}")));
            }

            response
                .json::<Value>()
                .await
                .map_err(|err| classify_request_error(err, timeout))
        }
    }

    fn probe(&self) -> impl Future<Output = bool> + Send {
        let request = self
            .client
            .head(&self.health_url)
            .timeout(Duration::from_secs(5));

        async move {
            match request.send().await {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<LogsOutcome, FetchError>>>;

struct ClientInner<T> {
    transport: T,
    config: FetchConfig,
    cache: CacheService,

    /// In-flight request ledger: one shared future per cache key. Entries
    /// are removed when the future settles, success or failure, so the
    /// ledger never leaks.
    inflight: Mutex<HashMap<String, SharedFetch>>,

    /// Observed connectivity; gates the fallback short-circuit without
    /// waiting for a timeout
    online: AtomicBool,
}

/// Fetch coordinator for the logs endpoint.
///
/// Resolves queries from the cache when possible, coalesces concurrent
/// identical requests onto one underlying call, retries transient failures
/// with exponential backoff, and degrades to the embedded fallback dataset
/// rather than surfacing an empty screen.
pub struct LogClient<T: Transport> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for LogClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> LogClient<T> {
    pub fn new(transport: T, config: FetchConfig, cache: CacheService) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                cache,
                inflight: Mutex::new(HashMap::new()),
                online: AtomicBool::new(true),
            }),
        }
    }

    /// Retrieve records for a query.
    ///
    /// Fails only when no fallback is possible; otherwise the caller always
    /// receives records, with `Degraded` marking fallback content.
    pub async fn get_logs(&self, params: &QueryParams) -> Result<LogsOutcome, FetchError> {
        let merged = self.inner.merge_params(params);
        let key = cache_key(&self.inner.config.logs_path, &merged);

        if self.inner.config.enable_cache {
            if let Some(records) = self.inner.cache.get(&key) {
                tracing::debug!(%key, "cache hit");
                return Ok(LogsOutcome::Live(records));
            }
        }

        let fut = {
            let mut inflight = self.inner.inflight.lock();
            if let Some(pending) = inflight.get(&key) {
                tracing::debug!(%key, "joining in-flight request");
                pending.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let owned_key = key.clone();
                let fut: SharedFetch = async move {
                    let result = inner.fetch_and_store(&owned_key, &merged).await;
                    // Cache state is already consistent; drop the ledger
                    // entry whatever the outcome was
                    inner.inflight.lock().remove(&owned_key);
                    result
                }
                .boxed()
                .shared();
                inflight.insert(key, fut.clone());
                fut
            }
        };

        fut.await
    }

    /// Invalidate every cached record set, used before an explicit refresh
    /// so stale data cannot resurface
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Warm the cache for a query; failures are logged, never surfaced
    pub async fn prefetch(&self, params: &QueryParams) {
        if let Err(err) = self.get_logs(params).await {
            tracing::warn!(error = %err, "prefetch failed");
        }
    }

    /// Probe the remote service
    pub async fn status(&self) -> bool {
        self.inner.transport.probe().await
    }

    /// Record an observed connectivity transition
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inner.inflight.lock().len()
    }
}

impl<T: Transport> ClientInner<T> {
    /// Merge caller params with the configured defaults, omitting anything
    /// absent or empty. BTreeMap keeps the set order-independent.
    fn merge_params(&self, params: &QueryParams) -> BTreeMap<String, String> {
        let params = params.clone().normalized();
        let mut merged = BTreeMap::new();

        insert_non_empty(&mut merged, "clientCode", &self.config.client_code);
        insert_non_empty(&mut merged, "key", &self.config.api_key);

        let gateway = params
            .gateway
            .as_deref()
            .unwrap_or(&self.config.default_gateway);
        insert_non_empty(&mut merged, "gateway", gateway);

        if let Some(start) = &params.start_date {
            insert_non_empty(&mut merged, "startDate", start);
        }
        if let Some(end) = &params.end_date {
            insert_non_empty(&mut merged, "endDate", end);
        }

        merged
    }

    async fn fetch_and_store(
        &self,
        key: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<LogsOutcome, FetchError> {
        if !self.online.load(Ordering::Relaxed) {
            tracing::warn!("transport offline, serving fallback data");
            return Ok(degraded(DegradeReason::Offline));
        }

        let body = match self.fetch_with_retries(params).await {
            Ok(body) => body,
            Err(err) if err.is_transient() => {
                tracing::warn!(error = %err, "retries exhausted, serving fallback data");
                return Ok(degraded(DegradeReason::RetriesExhausted));
            }
            Err(FetchError::MalformedResponse(detail)) => {
                tracing::warn!(error = %detail, "malformed response, serving fallback data");
                return Ok(degraded(DegradeReason::MalformedResponse));
            }
            Err(err) => return Err(err),
        };

        let Some(items) = body.as_array() else {
            tracing::warn!("response body is not a record array, serving fallback data");
            return Ok(degraded(DegradeReason::MalformedResponse));
        };

        let records: Vec<LogRecord> = items
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::debug!(error = %err, "skipping undecodable record");
                    None
                }
            })
            .collect();

        tracing::debug!(count = records.len(), "fetched live records");
        if self.config.enable_cache {
            self.cache.set(key, records.clone(), self.config.cache_ttl);
        }
        Ok(LogsOutcome::Live(records))
    }

    /// One call plus up to `retries` further attempts for transient
    /// failures, doubling the delay each time. Non-transient failures
    /// return immediately.
    async fn fetch_with_retries(&self, params: &BTreeMap<String, String>) -> Result<Value, FetchError> {
        let mut delay = self.config.retry_base_delay;
        let mut attempt = 0;

        loop {
            match self.transport.fetch(params).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %err, "transient failure, backing off");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn degraded(reason: DegradeReason) -> LogsOutcome {
    LogsOutcome::Degraded {
        records: fallback_records().to_vec(),
        reason,
    }
}

fn insert_non_empty(map: &mut BTreeMap<String, String>, key: &str, value: &str) {
    if !value.trim().is_empty() {
        map.insert(key.to_string(), value.to_string());
    }
}

/// Deterministic cache key from the endpoint and the merged,
/// order-independent param set
fn cache_key(path: &str, params: &BTreeMap<String, String>) -> String {
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    format!("{}?{}", path, query.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Scripted transport: pops one prepared result per call. An exhausted
    /// script answers with an empty record array.
    #[derive(Clone)]
    struct FakeTransport {
        script: Arc<Mutex<VecDeque<Result<Value, FetchError>>>>,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl FakeTransport {
        fn scripted(steps: Vec<Result<Value, FetchError>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(steps.into())),
                calls: Arc::new(AtomicUsize::new(0)),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl Transport for FakeTransport {
        fn fetch(
            &self,
            _params: &BTreeMap<String, String>,
        ) -> impl Future<Output = Result<Value, FetchError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().pop_front();
            let delay = self.delay;

            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                step.unwrap_or_else(|| Ok(Value::Array(Vec::new())))
            }
        }

        fn probe(&self) -> impl Future<Output = bool> + Send {
            async { true }
        }
    }

    fn live_body() -> Value {
        json!([
            {"id": 1, "gateway": "A", "code": 200, "created_at": "2024-03-01T10:00:00Z"},
            {"id": 2, "gateway": "B", "code": 404, "created_at": "2024-03-01T11:00:00Z"}
        ])
    }

    fn test_client(transport: FakeTransport, retries: u32) -> LogClient<FakeTransport> {
        let config = FetchConfig {
            base_url: "http://logs.test".into(),
            client_code: "c-1".into(),
            api_key: "k-1".into(),
            default_gateway: "PUBLIC".into(),
            retries,
            retry_base_delay: Duration::from_millis(1),
            ..Default::default()
        };
        LogClient::new(transport, config, CacheService::new())
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_coalesce() {
        let transport = FakeTransport::scripted(vec![Ok(live_body())])
            .with_delay(Duration::from_millis(50));
        let calls = transport.calls.clone();
        let client = test_client(transport, 2);
        let params = QueryParams::default();

        let (a, b) = tokio::join!(client.get_logs(&params), client.get_logs(&params));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().records().len(), 2);
        assert_eq!(b.unwrap().records().len(), 2);
        assert_eq!(client.inflight_len(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_retry_then_succeed() {
        let transport = FakeTransport::scripted(vec![
            Err(FetchError::Network("reset".into())),
            Err(FetchError::Timeout(Duration::from_secs(30))),
            Ok(live_body()),
        ]);
        let calls = transport.calls.clone();
        let client = test_client(transport, 3);

        let outcome = client.get_logs(&QueryParams::default()).await.unwrap();

        // The live response, not fallback data
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.records().len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade_to_fallback() {
        let transport = FakeTransport::scripted(vec![
            Err(FetchError::Network("reset".into())),
            Err(FetchError::Network("reset".into())),
            Err(FetchError::Network("reset".into())),
        ]);
        let calls = transport.calls.clone();
        let client = test_client(transport, 2);

        let outcome = client.get_logs(&QueryParams::default()).await.unwrap();

        match outcome {
            LogsOutcome::Degraded { records, reason } => {
                assert_eq!(reason, DegradeReason::RetriesExhausted);
                assert_eq!(records.len(), fallback_records().len());
            }
            LogsOutcome::Live(_) => panic!("expected fallback data"),
        }
        // Initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_malformed_body_degrades_without_retry() {
        let transport =
            FakeTransport::scripted(vec![Ok(json!({"status": "maintenance"}))]);
        let calls = transport.calls.clone();
        let client = test_client(transport, 2);

        let outcome = client.get_logs(&QueryParams::default()).await.unwrap();

        assert!(matches!(
            outcome,
            LogsOutcome::Degraded {
                reason: DegradeReason::MalformedResponse,
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_transport_error_degrades_without_retry() {
        let transport = FakeTransport::scripted(vec![
            Err(FetchError::MalformedResponse("HTTP 403 Forbidden".into())),
            Ok(live_body()),
        ]);
        let calls = transport.calls.clone();
        let client = test_client(transport, 2);

        let outcome = client.get_logs(&QueryParams::default()).await.unwrap();

        assert!(outcome.is_degraded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_offline_short_circuits_to_fallback() {
        let transport = FakeTransport::scripted(vec![Ok(live_body())]);
        let calls = transport.calls.clone();
        let client = test_client(transport, 2);

        client.set_online(false);
        let outcome = client.get_logs(&QueryParams::default()).await.unwrap();

        assert!(matches!(
            outcome,
            LogsOutcome::Degraded {
                reason: DegradeReason::Offline,
                ..
            }
        ));
        // The network was never touched
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        client.set_online(true);
        let outcome = client.get_logs(&QueryParams::default()).await.unwrap();
        assert!(!outcome.is_degraded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let transport = FakeTransport::scripted(vec![Ok(live_body()), Ok(live_body())]);
        let calls = transport.calls.clone();
        let client = test_client(transport, 2);
        let params = QueryParams::default();

        client.get_logs(&params).await.unwrap();
        let cached = client.get_logs(&params).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.records().len(), 2);

        // An explicit refresh invalidates and refetches
        client.clear_cache();
        client.get_logs(&params).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled_always_fetches() {
        let transport = FakeTransport::scripted(vec![Ok(live_body()), Ok(live_body())]);
        let calls = transport.calls.clone();
        let config = FetchConfig {
            enable_cache: false,
            retry_base_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let client = LogClient::new(transport, config, CacheService::new());
        let params = QueryParams::default();

        client.get_logs(&params).await.unwrap();
        client.get_logs(&params).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ledger_cleared_after_failure() {
        let transport =
            FakeTransport::scripted(vec![Err(FetchError::Unavailable("gone".into()))]);
        let client = test_client(transport, 0);
        let params = QueryParams::default();

        let err = client.get_logs(&params).await.unwrap_err();
        assert_eq!(err, FetchError::Unavailable("gone".into()));
        assert_eq!(client.inflight_len(), 0);

        // A later identical request starts fresh
        let outcome = client.get_logs(&params).await.unwrap();
        assert!(!outcome.is_degraded());
    }

    #[tokio::test]
    async fn test_undecodable_records_are_skipped() {
        let transport = FakeTransport::scripted(vec![Ok(json!([
            {"id": 1, "created_at": "2024-03-01T10:00:00Z"},
            {"created_at": "missing id"},
            {"id": 3}
        ]))]);
        let client = test_client(transport, 0);

        let outcome = client.get_logs(&QueryParams::default()).await.unwrap();
        let ids: Vec<u64> = outcome.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_merged_params_omit_empty_and_apply_defaults() {
        let transport = FakeTransport::scripted(Vec::new());
        let client = test_client(transport, 0);

        let merged = client.inner.merge_params(&QueryParams {
            start_date: Some("2024-03-01".into()),
            end_date: Some("  ".into()),
            gateway: None,
        });

        assert_eq!(merged.get("clientCode").map(String::as_str), Some("c-1"));
        assert_eq!(merged.get("key").map(String::as_str), Some("k-1"));
        assert_eq!(merged.get("gateway").map(String::as_str), Some("PUBLIC"));
        assert_eq!(merged.get("startDate").map(String::as_str), Some("2024-03-01"));
        assert!(!merged.contains_key("endDate"));
    }

    #[test]
    fn test_cache_key_is_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("gateway".to_string(), "PUBLIC".to_string());
        a.insert("clientCode".to_string(), "c-1".to_string());

        let mut b = BTreeMap::new();
        b.insert("clientCode".to_string(), "c-1".to_string());
        b.insert("gateway".to_string(), "PUBLIC".to_string());

        assert_eq!(cache_key("/v2/logs", &a), cache_key("/v2/logs", &b));
        assert_eq!(
            cache_key("/v2/logs", &a),
            "/v2/logs?clientCode=c-1&gateway=PUBLIC"
        );
    }
}
