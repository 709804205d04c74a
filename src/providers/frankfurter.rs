use super::util::{RETRY_DELAY_MS, build_client, classify, decimal_from_json, with_retry};
use crate::core::currency::CurrencyPair;
use crate::core::error::UpstreamError;
use crate::core::upstream::ForexApi;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

const NAME: &str = "frankfurter";

/// ECB reference rates served by frankfurter.app.
pub struct FrankfurterProvider {
    base_url: String,
    timeout: Duration,
    retries: usize,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str, timeout: Duration, retries: usize) -> Self {
        FrankfurterProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            retries,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    date: Option<String>,
    rates: HashMap<String, Value>,
}

#[async_trait]
impl ForexApi for FrankfurterProvider {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(name = "FrankfurterFetch", skip(self), fields(pair = %pair))]
    async fn fetch_rate(&self, pair: &CurrencyPair) -> Result<Option<Decimal>, UpstreamError> {
        let url = format!("{}/latest", self.base_url);
        let query = [("from", pair.source.code()), ("to", pair.target.code())];

        let client = build_client(self.timeout)?;
        let response = with_retry(
            || async { client.get(&url).query(&query).send().await?.error_for_status() },
            self.retries,
            RETRY_DELAY_MS,
        )
        .await
        .map_err(|e| classify(NAME, e))?;

        let text = response.text().await.map_err(|e| classify(NAME, e))?;
        let data: LatestResponse = serde_json::from_str(&text).map_err(|e| {
            UpstreamError::MalformedResponse(NAME.to_string(), format!("invalid body: {e}"))
        })?;

        let value = data.rates.get(pair.target.code()).ok_or_else(|| {
            UpstreamError::MalformedResponse(
                NAME.to_string(),
                format!("no {} rate in response", pair.target),
            )
        })?;
        debug!(date = ?data.date, "Received reference rate");
        Ok(decimal_from_json(value))
    }
}
