//! DexScreener API client
//!
//! Used two ways: as the public fallback price source and as the
//! aggregator side of the social-presence check.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::price::PriceSource;

pub const DEXSCREENER_BASE: &str = "https://api.dexscreener.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Website {
    pub label: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Social {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairInfo {
    #[serde(default)]
    pub websites: Vec<Website>,
    #[serde(default)]
    pub socials: Vec<Social>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexPair {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "dexId")]
    pub dex_id: String,
    pub url: Option<String>,
    #[serde(rename = "pairAddress")]
    pub pair_address: String,
    #[serde(rename = "baseToken")]
    pub base_token: BaseToken,
    #[serde(rename = "priceUsd")]
    pub price_usd: Option<String>,
    pub info: Option<PairInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairsResponse {
    pub pairs: Option<Vec<DexPair>>,
}

/// Website / chat / feed presence for a token
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocialLinks {
    pub website: bool,
    pub telegram: bool,
    pub twitter: bool,
}

impl SocialLinks {
    pub fn count(&self) -> usize {
        [self.website, self.telegram, self.twitter]
            .iter()
            .filter(|present| **present)
            .count()
    }
}

impl DexPair {
    pub fn price_usd(&self) -> Option<f64> {
        self.price_usd.as_ref().and_then(|p| p.parse::<f64>().ok())
    }

    pub fn social_links(&self) -> SocialLinks {
        let info = match &self.info {
            Some(info) => info,
            None => return SocialLinks::default(),
        };
        SocialLinks {
            website: !info.websites.is_empty(),
            telegram: info.socials.iter().any(|s| s.kind == "telegram"),
            twitter: info.socials.iter().any(|s| s.kind == "twitter"),
        }
    }
}

pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the first (most liquid) pair listed for a token
    pub async fn get_token_pair(&self, mint: &Pubkey) -> Result<Option<DexPair>> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, mint);
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let data: TokenPairsResponse = resp.json().await?;
        Ok(data.pairs.and_then(|pairs| pairs.into_iter().next()))
    }

    /// Social presence as listed on the aggregator. A token that is not
    /// indexed yet is reported as a retryable miss.
    pub async fn social_links(&self, mint: &Pubkey) -> Result<SocialLinks> {
        match self.get_token_pair(mint).await? {
            Some(pair) => Ok(pair.social_links()),
            None => {
                debug!("DexScreener has no pair for {} yet", mint);
                Err(Error::PriceUnavailable(mint.to_string()))
            }
        }
    }
}

impl Default for DexScreenerClient {
    fn default() -> Self {
        Self::new(DEXSCREENER_BASE, Duration::from_secs(10))
    }
}

#[async_trait]
impl PriceSource for DexScreenerClient {
    fn name(&self) -> &str {
        "dexscreener"
    }

    async fn price_usd(&self, mint: &Pubkey) -> Result<f64> {
        self.get_token_pair(mint)
            .await?
            .and_then(|pair| pair.price_usd())
            .ok_or_else(|| Error::PriceUnavailable(mint.to_string()))
    }
}
