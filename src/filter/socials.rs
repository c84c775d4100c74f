//! Social-presence lookups

use async_trait::async_trait;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;

use crate::dexscreener::{DexScreenerClient, SocialLinks};
use crate::error::Result;

#[async_trait]
pub trait SocialLookup: Send + Sync {
    /// Links listed for the token by the DEX aggregator
    async fn aggregator_links(&self, mint: &Pubkey) -> Result<SocialLinks>;

    /// Links in the `extensions` of the token's off-chain metadata JSON
    async fn metadata_links(&self, uri: &str) -> Result<SocialLinks>;
}

/// Read website / telegram / twitter out of a metadata JSON document
pub fn links_from_metadata_json(doc: &Value) -> SocialLinks {
    let present = |key: &str| {
        doc.get("extensions")
            .and_then(|ext| ext.get(key))
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    };
    SocialLinks {
        website: present("website"),
        telegram: present("telegram"),
        twitter: present("twitter"),
    }
}

pub struct HttpSocialLookup {
    dexscreener: Arc<DexScreenerClient>,
    client: reqwest::Client,
}

impl HttpSocialLookup {
    pub fn new(dexscreener: Arc<DexScreenerClient>, timeout: Duration) -> Self {
        Self {
            dexscreener,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SocialLookup for HttpSocialLookup {
    async fn aggregator_links(&self, mint: &Pubkey) -> Result<SocialLinks> {
        self.dexscreener.social_links(mint).await
    }

    async fn metadata_links(&self, uri: &str) -> Result<SocialLinks> {
        let doc: Value = self
            .client
            .get(uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(links_from_metadata_json(&doc))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::Error;

    /// Fixed answers for both lookups; `None` means the lookup fails
    pub struct FixedSocials {
        pub aggregator: Option<SocialLinks>,
        pub metadata: Option<SocialLinks>,
    }

    #[async_trait]
    impl SocialLookup for FixedSocials {
        async fn aggregator_links(&self, mint: &Pubkey) -> Result<SocialLinks> {
            self.aggregator
                .clone()
                .ok_or_else(|| Error::PriceUnavailable(mint.to_string()))
        }

        async fn metadata_links(&self, uri: &str) -> Result<SocialLinks> {
            self.metadata
                .clone()
                .ok_or_else(|| Error::Http(format!("no document at {}", uri)))
        }
    }
}
