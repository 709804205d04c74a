use crate::core::error::UpstreamError;
use rust_decimal::Decimal;
use serde_json::Value;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = "remitrates/1.0";
pub const RETRY_DELAY_MS: u64 = 500;

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Worst-case wall time of a call made through `with_retry`: every attempt
/// runs to the client timeout, with the retry delay in between.
pub fn call_budget(timeout: Duration, retries: usize) -> Duration {
    let attempts = retries as u32 + 1;
    timeout * attempts + Duration::from_millis(RETRY_DELAY_MS) * retries as u32
}

pub fn build_client(timeout: Duration) -> Result<reqwest::Client, UpstreamError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| UpstreamError::Unreachable("http-client".to_string(), e.to_string()))
}

/// Maps a transport error onto the upstream failure taxonomy.
pub fn classify(source: &str, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout(source.to_string())
    } else if err.is_decode() {
        UpstreamError::MalformedResponse(source.to_string(), err.to_string())
    } else {
        UpstreamError::Unreachable(source.to_string(), err.to_string())
    }
}

/// Reads a JSON number, or a string holding one, as a decimal.
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}
