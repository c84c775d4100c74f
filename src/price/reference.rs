//! SOL/USD reference rate
//!
//! Fetched once at startup (a non-positive answer is fatal) and re-queried
//! after every confirmed buy. An optional periodic refresh can be turned on
//! with `price.sol_price_refresh_secs`.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::QuoteAsset;
use crate::error::{Error, Result};
use crate::retry::{retry_fixed, FixedRetry};

#[async_trait]
pub trait ReferenceRateSource: Send + Sync {
    async fn sol_usd(&self) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct CoinMarket {
    current_price: Option<f64>,
}

/// CoinGecko markets endpoint
pub struct CoinGeckoRate {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoRate {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn first_price(markets: Vec<CoinMarket>) -> Result<f64> {
    markets
        .into_iter()
        .next()
        .and_then(|m| m.current_price)
        .ok_or_else(|| Error::PriceUnavailable("SOL/USD".to_string()))
}

#[async_trait]
impl ReferenceRateSource for CoinGeckoRate {
    async fn sol_usd(&self) -> Result<f64> {
        let url = format!(
            "{}/api/v3/coins/markets?vs_currency=usd&ids=solana",
            self.base_url
        );
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let markets: Vec<CoinMarket> = resp.json().await?;
        first_price(markets)
    }
}

/// Shared SOL/USD rate, stored as f64 bits so readers never lock
pub struct SolUsdRate {
    bits: AtomicU64,
    source: Arc<dyn ReferenceRateSource>,
    retry: FixedRetry,
}

impl SolUsdRate {
    /// Fetch the startup rate. Errors if it cannot be obtained or is not
    /// positive; the bot must not run without it.
    pub async fn init(source: Arc<dyn ReferenceRateSource>, retry: FixedRetry) -> Result<Arc<Self>> {
        let rate = Self {
            bits: AtomicU64::new(0f64.to_bits()),
            source,
            retry,
        };
        let value = rate.fetch().await?;
        if !(value.is_finite() && value > 0.0) {
            return Err(Error::Config(format!("SOL/USD rate is not positive: {}", value)));
        }
        rate.set(value);
        info!("SOL price: ${:.2}", value);
        Ok(Arc::new(rate))
    }

    /// Fixed rate with no live source behind it
    pub fn fixed(value: f64) -> Arc<Self> {
        struct Fixed(f64);

        #[async_trait]
        impl ReferenceRateSource for Fixed {
            async fn sol_usd(&self) -> Result<f64> {
                Ok(self.0)
            }
        }

        Arc::new(Self {
            bits: AtomicU64::new(value.to_bits()),
            source: Arc::new(Fixed(value)),
            retry: FixedRetry::new(1, Duration::ZERO),
        })
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    async fn fetch(&self) -> Result<f64> {
        let source = self.source.as_ref();
        retry_fixed(self.retry.clone(), "SOL/USD rate", || async move {
            source.sol_usd().await
        })
        .await
    }

    /// Re-query the rate. A failed or non-positive answer keeps the
    /// previous value.
    pub async fn refresh(&self) -> f64 {
        match self.fetch().await {
            Ok(value) if value.is_finite() && value > 0.0 => {
                self.set(value);
                debug!("SOL price refreshed: ${:.2}", value);
                value
            }
            Ok(value) => {
                warn!("Ignoring non-positive SOL price {}", value);
                self.get()
            }
            Err(e) => {
                warn!("SOL price refresh failed, keeping ${:.2}: {}", self.get(), e);
                self.get()
            }
        }
    }

    /// Periodic refresh until cancelled
    pub fn spawn_refresh(self: &Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let rate = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        rate.refresh().await;
                    }
                    _ = cancel.cancelled() => {
                        debug!("SOL price refresh stopped");
                        break;
                    }
                }
            }
        })
    }
}

/// Converts quote-asset amounts to USD
#[derive(Clone)]
pub struct QuoteValuation {
    pub asset: QuoteAsset,
    pub sol_usd: Arc<SolUsdRate>,
}

impl QuoteValuation {
    pub fn new(asset: QuoteAsset, sol_usd: Arc<SolUsdRate>) -> Self {
        Self { asset, sol_usd }
    }

    /// USD value of one whole quote token
    pub fn quote_usd(&self) -> f64 {
        if self.asset.is_sol() {
            self.sol_usd.get()
        } else {
            1.0
        }
    }

    pub fn to_usd(&self, quote_ui_amount: f64) -> f64 {
        quote_ui_amount * self.quote_usd()
    }
}
