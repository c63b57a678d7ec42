//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use core_async::time::{exponential_backoff, sleep, timeout, Instant};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeouts tuned for mobile / cellular conditions.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// TCP + TLS connect timeout
    pub connect_timeout: Duration,
    /// Per-attempt request timeout, unless the request sets its own
    pub request_timeout: Duration,
    /// Upper bound for one `execute` call including retries and waiting for
    /// connectivity to come back
    pub total_timeout: Duration,
    /// Pause between attempts while the network is unreachable
    pub connectivity_poll: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            total_timeout: Duration::from_secs(60),
            connectivity_poll: Duration::from_secs(2),
            user_agent: concat!("ckstream/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - Automatic retry with exponential backoff for 429 / 5xx
/// - Waiting out connection failures until the total budget is spent
/// - TLS via rustls
pub struct ReqwestHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default timeouts
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom timeouts
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(10)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Wrap an already configured reqwest client
    pub fn with_client(client: Client, config: HttpClientConfig) -> Self {
        Self { client, config }
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    async fn into_response(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.without_url().to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Execute request with retry logic
    ///
    /// Status-based failures (429 / 5xx) and timeouts count against
    /// `policy.max_attempts`. Connection failures do not: the client keeps
    /// polling until the network comes back or the total budget runs out.
    /// A retryable status on the last attempt is returned as a response.
    ///
    /// reqwest errors are stripped of their URL before they are logged or
    /// returned, since signed URLs carry credentials in the query string.
    async fn execute_with_retry_internal(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let started = Instant::now();
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < policy.max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts = policy.max_attempts,
                method = ?request.method,
                "Executing HTTP request"
            );

            let mut delay = None;

            match self.build_request(request.clone()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if (status >= 500 || status == 429) && attempt + 1 < policy.max_attempts {
                        warn!(
                            status = status,
                            attempt = attempt + 1,
                            "HTTP request failed with retryable status"
                        );
                        let response = Self::into_response(response).await?;
                        last_error = Some(BridgeError::Http {
                            status,
                            message: String::from_utf8_lossy(&response.body).to_string(),
                        });
                        attempt += 1;
                    } else {
                        // Out of attempts: hand the status back to the caller
                        return Self::into_response(response).await;
                    }
                }
                Err(e) if e.is_connect() => {
                    let e = e.without_url();
                    warn!(error = %e, "Connection failed; waiting for connectivity");
                    last_error = Some(BridgeError::OperationFailed(format!(
                        "Connection failed: {}",
                        e
                    )));
                    delay = Some(self.config.connectivity_poll);
                }
                Err(e) => {
                    let e = e.without_url();
                    warn!(error = %e, attempt = attempt + 1, "HTTP request failed");
                    last_error = Some(if e.is_timeout() {
                        BridgeError::OperationFailed("Request timed out".to_string())
                    } else {
                        BridgeError::OperationFailed(e.to_string())
                    });
                    attempt += 1;
                }
            }

            if attempt >= policy.max_attempts {
                break;
            }

            let delay = delay.unwrap_or_else(|| {
                if policy.use_exponential_backoff {
                    exponential_backoff(policy.base_delay, attempt, policy.max_delay)
                } else {
                    policy.base_delay
                }
            });

            if started.elapsed() + delay >= self.config.total_timeout {
                break;
            }

            debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
            sleep(delay).await;
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let total = self.config.total_timeout;
        timeout(total, self.execute_with_retry_internal(request, policy))
            .await
            .map_err(|_| {
                BridgeError::OperationFailed(format!(
                    "Request exceeded total timeout of {}s",
                    total.as_secs()
                ))
            })?
    }

    async fn is_connected(&self) -> bool {
        self.client
            .head("https://www.apple.com/library/test/success.html")
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `status` with an empty body to every connection, counting them.
    async fn serve_status(status: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), hits)
    }

    fn fast_config() -> HttpClientConfig {
        HttpClientConfig {
            total_timeout: Duration::from_secs(2),
            connectivity_poll: Duration::from_millis(200),
            ..HttpClientConfig::default()
        }
    }

    #[test]
    fn test_default_timeouts() {
        let config = HttpClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.total_timeout, Duration::from_secs(60));
        assert!(config.user_agent.starts_with("ckstream/"));
    }

    #[tokio::test]
    async fn test_http_client_creation() {
        assert!(ReqwestHttpClient::new().is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Post),
            reqwest::Method::POST
        );
    }

    #[test]
    fn test_build_request_applies_headers_and_timeout() {
        let client = ReqwestHttpClient::new().unwrap();
        let request = HttpRequest::get("https://cdn.example/abc.m3u8")
            .header("Accept", "application/vnd.apple.mpegurl")
            .timeout(Duration::from_secs(5));

        let built = client.build_request(request).build().unwrap();

        assert_eq!(built.method(), reqwest::Method::GET);
        assert_eq!(
            built.headers().get("accept").unwrap(),
            "application/vnd.apple.mpegurl"
        );
        assert_eq!(built.timeout(), Some(&Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_connection_error_omits_signed_query() {
        let client = ReqwestHttpClient::with_config(fast_config()).unwrap();

        let err = client
            .execute(HttpRequest::get(
                "http://127.0.0.1:9/v/prog_index.m3u8?sig=SECRETSIG",
            ))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(!message.contains("SECRETSIG"), "{}", message);
        assert!(!message.contains("prog_index"), "{}", message);
    }

    #[tokio::test]
    async fn test_single_attempt_returns_server_error_status() {
        let (base, hits) = serve_status("503 Service Unavailable").await;
        let client = ReqwestHttpClient::with_config(fast_config()).unwrap();

        let response = client
            .execute_with_retry(
                HttpRequest::get(format!("{}/records/query", base)),
                RetryPolicy::no_retry(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_errors_retried_up_to_policy() {
        let (base, hits) = serve_status("503 Service Unavailable").await;
        let client = ReqwestHttpClient::with_config(fast_config()).unwrap();

        let response = client
            .execute(HttpRequest::get(format!("{}/records/query", base)))
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
