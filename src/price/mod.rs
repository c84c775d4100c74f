//! Fiat valuation of tokens
//!
//! [`ValueOracle`] walks an ordered list of [`PriceSource`]s, retrying each
//! under a fixed-delay policy before falling through to the next.
//! [`SolUsdRate`] holds the process-wide SOL/USD reference rate.

mod birdeye;
mod reference;

pub use birdeye::BirdeyeClient;
pub use reference::{CoinGeckoRate, QuoteValuation, ReferenceRateSource, SolUsdRate};

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::retry::{retry_fixed_opt, FixedRetry};

/// A fiat price API
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    /// USD price of one whole token
    async fn price_usd(&self, mint: &Pubkey) -> Result<f64>;
}

/// Resolves a token's USD value from the first source that answers
pub struct ValueOracle {
    sources: Vec<Arc<dyn PriceSource>>,
    retry: FixedRetry,
}

impl ValueOracle {
    /// `sources` in priority order
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, retry: FixedRetry) -> Self {
        Self { sources, retry }
    }

    /// Current USD value, or `None` if every source failed
    pub async fn price(&self, mint: &Pubkey) -> Option<f64> {
        for source in &self.sources {
            let source: &dyn PriceSource = source.as_ref();
            let what = format!("{} price for {}", source.name(), mint);
            let price = retry_fixed_opt(self.retry.clone(), &what, || async move {
                let value = source.price_usd(mint).await?;
                if value.is_finite() && value > 0.0 {
                    Ok(value)
                } else {
                    Err(Error::PriceUnavailable(format!(
                        "{} returned {} for {}",
                        source.name(),
                        value,
                        mint
                    )))
                }
            })
            .await;

            match price {
                Some(value) => {
                    debug!("{} priced {} at ${}", source.name(), mint, value);
                    return Some(value);
                }
                None => warn!("{} could not price {}, falling back", source.name(), mint),
            }
        }
        None
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedPrice;
    use super::*;
    use std::sync::atomic::Ordering;

    fn oracle(sources: Vec<Arc<dyn PriceSource>>) -> ValueOracle {
        ValueOracle::new(sources, FixedRetry::from_millis(2, 1))
    }

    #[tokio::test]
    async fn test_primary_answers() {
        let primary = Arc::new(ScriptedPrice::fixed("primary", 1.25));
        let secondary = Arc::new(ScriptedPrice::fixed("secondary", 9.0));
        let oracle = oracle(vec![primary, secondary.clone()]);

        assert_eq!(oracle.price(&Pubkey::new_unique()).await, Some(1.25));
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_after_primary_retries() {
        let primary = Arc::new(ScriptedPrice::failing("primary"));
        let secondary = Arc::new(ScriptedPrice::fixed("secondary", 0.5));
        let oracle = oracle(vec![primary.clone(), secondary]);

        assert_eq!(oracle.price(&Pubkey::new_unique()).await, Some(0.5));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_numeric_counts_as_failure() {
        let primary = Arc::new(ScriptedPrice::new("primary", vec![Ok(f64::NAN), Ok(f64::NAN)]));
        let secondary = Arc::new(ScriptedPrice::fixed("secondary", 2.0));
        let oracle = oracle(vec![primary, secondary]);

        assert_eq!(oracle.price(&Pubkey::new_unique()).await, Some(2.0));
    }

    #[tokio::test]
    async fn test_all_sources_fail() {
        let oracle = oracle(vec![
            Arc::new(ScriptedPrice::failing("primary")),
            Arc::new(ScriptedPrice::failing("secondary")),
        ]);
        assert_eq!(oracle.price(&Pubkey::new_unique()).await, None);
    }
}
