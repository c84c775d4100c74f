//! Birdeye price API (primary, keyed)

use async_trait::async_trait;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;

use super::PriceSource;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct PriceData {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    data: Option<PriceData>,
}

pub struct BirdeyeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BirdeyeClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

fn extract_price(response: PriceResponse, mint: &Pubkey) -> Result<f64> {
    response
        .data
        .and_then(|d| d.value)
        .ok_or_else(|| Error::PriceUnavailable(mint.to_string()))
}

#[async_trait]
impl PriceSource for BirdeyeClient {
    fn name(&self) -> &str {
        "birdeye"
    }

    async fn price_usd(&self, mint: &Pubkey) -> Result<f64> {
        let url = format!(
            "{}/defi/price?include_liquidity=true&address={}",
            self.base_url, mint
        );
        let resp = self
            .client
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .header("accept", "application/json")
            .send()
            .await?
            .error_for_status()?;
        let body: PriceResponse = resp.json().await?;
        extract_price(body, mint)
    }
}
