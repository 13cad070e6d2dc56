// Birdeye API client: candle ranges, point prices, token metadata

use crate::apis::{ApiError, MarketApi, TokenMeta};
use crate::candles::types::{Candle, Chain, Interval};
use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug)]
struct OhlcvResponse {
    success: bool,
    data: Option<OhlcvData>,
}

#[derive(Deserialize, Debug)]
struct OhlcvData {
    items: Vec<OhlcvItem>,
}

#[derive(Deserialize, Debug)]
struct OhlcvItem {
    #[serde(rename = "unixTime")]
    unix_time: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Deserialize, Debug)]
struct HistoricalPriceResponse {
    success: bool,
    data: Option<HistoricalPriceData>,
}

#[derive(Deserialize, Debug)]
struct HistoricalPriceData {
    value: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct TokenMetaResponse {
    success: bool,
    data: Option<TokenMetaData>,
}

#[derive(Deserialize, Debug)]
struct TokenMetaData {
    symbol: Option<String>,
}

pub struct BirdeyeClient {
    client: Client,
    config: ApiConfig,
}

impl BirdeyeClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        chain: Chain,
        asset: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .header("X-API-KEY", &self.config.api_key)
            .header("x-chain", chain.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ApiError::Transport(format!("{}", e))
                } else {
                    ApiError::Transport(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited);
        }

        // The upstream answers 400/404/422 for addresses it does not know
        if status == StatusCode::NOT_FOUND
            || status == StatusCode::BAD_REQUEST
            || status == StatusCode::UNPROCESSABLE_ENTITY
        {
            return Err(ApiError::InvalidAsset(asset.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(format!("{}", e)))
    }
}

#[async_trait]
impl MarketApi for BirdeyeClient {
    async fn candle_range(
        &self,
        asset: &str,
        chain: Chain,
        interval: Interval,
        time_from: i64,
        time_to: i64,
    ) -> Result<Vec<Candle>, ApiError> {
        let url = format!(
            "{}/defi/ohlcv?address={}&type={}&time_from={}&time_to={}",
            self.config.base_url,
            asset,
            interval.api_param(),
            time_from,
            time_to
        );

        let response: OhlcvResponse = self.get_json(&url, chain, asset).await?;

        if !response.success {
            return Err(ApiError::InvalidAsset(asset.to_string()));
        }

        let candles = response
            .data
            .map(|d| {
                d.items
                    .into_iter()
                    .map(|item| Candle::new(item.unix_time, item.o, item.h, item.l, item.c, item.v))
                    .collect()
            })
            .unwrap_or_default();

        Ok(candles)
    }

    async fn price_at(&self, asset: &str, chain: Chain, unix_time: i64) -> Result<Option<f64>, ApiError> {
        let url = format!(
            "{}/defi/historical_price_unix?address={}&unixtime={}",
            self.config.base_url, asset, unix_time
        );

        let response: HistoricalPriceResponse = self.get_json(&url, chain, asset).await?;

        if !response.success {
            return Ok(None);
        }

        Ok(response.data.and_then(|d| d.value).filter(|v| v.is_finite() && *v > 0.0))
    }

    async fn token_metadata(&self, asset: &str, chain: Chain) -> Result<Option<TokenMeta>, ApiError> {
        let url = format!(
            "{}/defi/v3/token/meta-data/single?address={}",
            self.config.base_url, asset
        );

        let response: Result<TokenMetaResponse, ApiError> = self.get_json(&url, chain, asset).await;

        match response {
            Ok(parsed) if parsed.success => Ok(parsed.data.map(|d| TokenMeta {
                chain,
                symbol: d.symbol,
            })),
            Ok(_) => Ok(None),
            // Not knowing the address on this chain is a normal answer here
            Err(ApiError::InvalidAsset(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
