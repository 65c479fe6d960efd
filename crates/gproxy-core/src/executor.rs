use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

/// One upstream HTTP call to issue. Headers are assembled by the caller
/// per provider (bearer token, user-agent, optional project/region
/// headers, content-type); the executor only knows how to send them and
/// classify what comes back.
#[derive(Debug, Clone)]
pub struct ExecutorRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub is_stream: bool,
}

/// Either the whole response body, already buffered, or a channel of
/// chunks for a streaming response.
pub enum ResponseBody {
    Bytes(Bytes),
    Stream(tokio::sync::mpsc::Receiver<Result<Bytes, std::io::Error>>),
}

pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

/// Outcome classification. Only `Ok`, `Quota`, and `Auth` are reported
/// to the router as credential-state transitions; `Client` is surfaced
/// to the caller untouched.
pub enum Outcome {
    Ok(UpstreamResponse),
    Retryable(String),
    Quota(String),
    Auth(String),
    Client(u16, String),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub max_retry_interval: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &gproxy_common::GatewayConfig, timeout: Duration) -> Self {
        Self {
            max_retries: config.request_retry,
            max_retry_interval: Duration::from_secs(config.max_retry_interval),
            timeout,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let secs = 2u64.saturating_pow(attempt).min(self.max_retry_interval.as_secs().max(1));
        Duration::from_secs(secs)
    }
}

/// Performs the upstream call with retry/backoff and outcome
/// classification. Streaming bodies are relayed chunk-by-chunk as they
/// arrive rather than buffered, so the client sees upstream chunk order
/// preserved byte-for-byte.
pub struct Executor {
    client: reqwest::Client,
}

impl Executor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn execute(&self, request: ExecutorRequest, policy: &RetryPolicy, cancel: &CancellationToken) -> Outcome {
        let mut attempt = 0;
        loop {
            let outcome = self.try_once(&request, policy, cancel).await;
            match outcome {
                Outcome::Retryable(_) if attempt < policy.max_retries => {
                    attempt += 1;
                    tokio::select! {
                        _ = tokio::time::sleep(policy.backoff(attempt)) => continue,
                        _ = cancel.cancelled() => return Outcome::Retryable("cancelled during backoff".to_string()),
                    }
                }
                other => return other,
            }
        }
    }

    async fn try_once(&self, request: &ExecutorRequest, policy: &RetryPolicy, cancel: &CancellationToken) -> Outcome {
        let mut builder = self.client.request(request.method.clone(), &request.url).timeout(policy.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let send = builder.send();
        let response = tokio::select! {
            result = send => result,
            _ = cancel.cancelled() => return Outcome::Retryable("client disconnected".to_string()),
        };

        let response = match response {
            Ok(response) => response,
            Err(err) => return Outcome::Retryable(err.to_string()),
        };

        let status = response.status().as_u16();
        let headers = headers_to_vec(response.headers());

        match classify_status(status) {
            Classification::Retryable => Outcome::Retryable(format!("upstream status {status}")),
            Classification::Quota => Outcome::Quota(format!("upstream status {status}")),
            Classification::Auth => Outcome::Auth(format!("upstream status {status}")),
            Classification::Client => {
                let body = response.bytes().await.unwrap_or_default();
                Outcome::Client(status, String::from_utf8_lossy(&body).into_owned())
            }
            Classification::Ok if request.is_stream => {
                let (tx, rx) = tokio::sync::mpsc::channel(16);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let mut stream = response.bytes_stream();
                    loop {
                        tokio::select! {
                            next = stream.next() => {
                                let Some(item) = next else { break };
                                let item = item.map_err(std::io::Error::other);
                                if tx.send(item).await.is_err() {
                                    break;
                                }
                            }
                            _ = cancel.cancelled() => break,
                        }
                    }
                });
                Outcome::Ok(UpstreamResponse { status, headers, body: ResponseBody::Stream(rx) })
            }
            Classification::Ok => match response.bytes().await {
                Ok(body) => Outcome::Ok(UpstreamResponse { status, headers, body: ResponseBody::Bytes(body) }),
                Err(err) => Outcome::Retryable(err.to_string()),
            },
        }
    }
}

enum Classification {
    Ok,
    Retryable,
    Quota,
    Auth,
    Client,
}

/// `network error` is folded into `Retryable` by the caller (`try_once`
/// never calls this for transport failures); this only classifies a
/// response that actually arrived.
fn classify_status(status: u16) -> Classification {
    match status {
        200..=299 => Classification::Ok,
        401 | 403 => Classification::Auth,
        429 => Classification::Quota,
        500..=599 => Classification::Retryable,
        400..=499 => Classification::Client,
        _ => Classification::Retryable,
    }
}

fn headers_to_vec(map: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    map.iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_status_band() {
        assert!(matches!(classify_status(200), Classification::Ok));
        assert!(matches!(classify_status(401), Classification::Auth));
        assert!(matches!(classify_status(403), Classification::Auth));
        assert!(matches!(classify_status(429), Classification::Quota));
        assert!(matches!(classify_status(500), Classification::Retryable));
        assert!(matches!(classify_status(503), Classification::Retryable));
        assert!(matches!(classify_status(404), Classification::Client));
    }

    #[test]
    fn backoff_doubles_and_clamps_to_max_interval() {
        let policy = RetryPolicy { max_retries: 5, max_retry_interval: Duration::from_secs(30), timeout: Duration::from_secs(5) };
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(10), Duration::from_secs(30));
    }
}
