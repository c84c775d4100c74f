//! Pool discovery
//!
//! Joins pool and market notifications into [`ReadyPool`]s. Both streams
//! are at-least-once, so pools and markets are deduplicated by account id
//! for the lifetime of the process. Markets are cached by base mint
//! because they may arrive before or after the pool that uses them.

use dashmap::{DashMap, DashSet};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::subscription::{AccountUpdate, FeedEvent};
use crate::chain::ChainClient;
use crate::error::{Error, Result};
use crate::raydium::{LiquidityStateV4, MarketStateV3, PoolKeys};
use crate::retry::{retry_fixed, FixedRetry};

/// A new pool with its market joined, ready for the filter chain
#[derive(Debug, Clone)]
pub struct ReadyPool {
    pub id: Pubkey,
    pub state: LiquidityStateV4,
    pub keys: PoolKeys,
    pub slot: u64,
}

#[derive(Debug, Clone)]
struct CachedMarket {
    id: Pubkey,
    state: MarketStateV3,
}

pub struct PoolDiscoveryFeed {
    chain: Arc<dyn ChainClient>,
    /// Unix seconds; only pools opening after this are emitted
    started_at: u64,
    seen_pools: DashSet<Pubkey>,
    seen_markets: DashSet<Pubkey>,
    markets: DashMap<Pubkey, CachedMarket>,
    market_retry: FixedRetry,
}

impl PoolDiscoveryFeed {
    pub fn new(chain: Arc<dyn ChainClient>, started_at: u64, market_retry: FixedRetry) -> Self {
        Self {
            chain,
            started_at,
            seen_pools: DashSet::new(),
            seen_markets: DashSet::new(),
            markets: DashMap::new(),
            market_retry,
        }
    }

    /// Cache a market notification under its base mint
    pub fn on_market(&self, update: &AccountUpdate) {
        if !self.seen_markets.insert(update.account_id) {
            return;
        }

        match MarketStateV3::try_from_slice(&update.data) {
            Ok(state) => {
                debug!("Market {} for base mint {}", update.account_id, state.base_mint);
                self.markets.insert(
                    state.base_mint,
                    CachedMarket {
                        id: update.account_id,
                        state,
                    },
                );
            }
            Err(e) => {
                // let a later, well-formed notification through
                self.seen_markets.remove(&update.account_id);
                warn!("Skipping market {}: {}", update.account_id, e);
            }
        }
    }

    /// Decide whether a pool notification is a new pool, and join its
    /// market. Returns `None` for historical, duplicate or undecodable pools.
    pub async fn on_pool(&self, update: AccountUpdate) -> Option<ReadyPool> {
        let state = match LiquidityStateV4::try_from_slice(&update.data) {
            Ok(state) => state,
            Err(e) => {
                warn!("Skipping pool {}: {}", update.account_id, e);
                return None;
            }
        };

        if state.pool_open_time <= self.started_at {
            return None;
        }
        if !self.seen_pools.insert(update.account_id) {
            return None;
        }

        let market = match self.market_for(&state).await {
            Ok(market) => market,
            Err(e) => {
                warn!(
                    "No market {} for pool {}: {}",
                    state.market_id, update.account_id, e
                );
                return None;
            }
        };

        match PoolKeys::from_state(update.account_id, &state, &market) {
            Ok(keys) => {
                info!(
                    "New pool {} for {} (opens at {})",
                    update.account_id, state.base_mint, state.pool_open_time
                );
                Some(ReadyPool {
                    id: update.account_id,
                    state,
                    keys,
                    slot: update.slot,
                })
            }
            Err(e) => {
                warn!("Pool {} has unusable market keys: {}", update.account_id, e);
                None
            }
        }
    }

    /// Cached market for the pool's base mint, else a point read of the
    /// pool's market account
    async fn market_for(&self, pool: &LiquidityStateV4) -> Result<MarketStateV3> {
        if let Some(cached) = self.markets.get(&pool.base_mint) {
            if cached.id == pool.market_id {
                return Ok(cached.state.clone());
            }
        }

        let chain = self.chain.as_ref();
        let market_id = &pool.market_id;
        let data = retry_fixed(self.market_retry.clone(), "market account", || async move {
            chain
                .get_account(market_id)
                .await?
                .map(|account| account.data)
                .ok_or_else(|| Error::MarketNotFound(market_id.to_string()))
        })
        .await?;

        let state = MarketStateV3::try_from_slice(&data)?;
        self.markets.insert(
            pool.base_mint,
            CachedMarket {
                id: pool.market_id,
                state: state.clone(),
            },
        );
        Ok(state)
    }

    /// Consume subscription events and forward ready pools. Each pool is
    /// handled in its own task so a slow market fetch holds up nothing else.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<FeedEvent>,
        ready: mpsc::Sender<ReadyPool>,
        cancel: CancellationToken,
    ) {
        info!("Pool discovery started (pools opening after {})", self.started_at);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Some(FeedEvent::Market(update)) => self.on_market(&update),
                Some(FeedEvent::Pool(update)) => {
                    let feed = self.clone();
                    let ready = ready.clone();
                    tokio::spawn(async move {
                        if let Some(pool) = feed.on_pool(update).await {
                            if ready.send(pool).await.is_err() {
                                debug!("Ready-pool receiver dropped");
                            }
                        }
                    });
                }
                None => break,
            }
        }

        info!("Pool discovery stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::MockChain;
    use crate::raydium::layout::fixtures::{market_state, pool_state};
    use crate::raydium::program::{OPENBOOK_PROGRAM, WSOL_MINT};
    use std::time::Duration;

    const STARTED_AT: u64 = 1_700_000_000;

    fn feed(chain: Arc<MockChain>) -> PoolDiscoveryFeed {
        PoolDiscoveryFeed::new(chain, STARTED_AT, FixedRetry::from_millis(2, 1))
    }

    fn pool_update(id: Pubkey, pool: &LiquidityStateV4) -> AccountUpdate {
        AccountUpdate {
            account_id: id,
            data: borsh::to_vec(pool).unwrap(),
            slot: 7,
        }
    }

    fn market_update(market: &MarketStateV3) -> AccountUpdate {
        AccountUpdate {
            account_id: market.own_address,
            data: borsh::to_vec(market).unwrap(),
            slot: 5,
        }
    }

    #[tokio::test]
    async fn test_market_before_pool() {
        let chain = Arc::new(MockChain::new());
        let feed = feed(chain);
        let base = Pubkey::new_unique();
        let pool = pool_state(base, *WSOL_MINT, STARTED_AT + 10);
        let market = market_state(pool.market_id, base, *WSOL_MINT);

        feed.on_market(&market_update(&market));
        let ready = feed.on_pool(pool_update(Pubkey::new_unique(), &pool)).await.unwrap();

        assert_eq!(ready.keys.market_bids, market.bids);
        assert_eq!(ready.keys.market_event_queue, market.event_queue);
        assert_eq!(ready.slot, 7);
    }

    #[tokio::test]
    async fn test_pool_before_market_fetches_market() {
        let chain = Arc::new(MockChain::new());
        let base = Pubkey::new_unique();
        let pool = pool_state(base, *WSOL_MINT, STARTED_AT + 10);
        let market = market_state(pool.market_id, base, *WSOL_MINT);
        chain.set_account(pool.market_id, *OPENBOOK_PROGRAM, borsh::to_vec(&market).unwrap());
        let feed = feed(chain);

        let ready = feed.on_pool(pool_update(Pubkey::new_unique(), &pool)).await.unwrap();

        assert_eq!(ready.keys.market_asks, market.asks);
        // the late market notification is harmless
        feed.on_market(&market_update(&market));
    }

    #[tokio::test]
    async fn test_duplicate_pool_emitted_once() {
        let chain = Arc::new(MockChain::new());
        let feed = feed(chain);
        let base = Pubkey::new_unique();
        let pool = pool_state(base, *WSOL_MINT, STARTED_AT + 10);
        feed.on_market(&market_update(&market_state(pool.market_id, base, *WSOL_MINT)));
        let id = Pubkey::new_unique();

        assert!(feed.on_pool(pool_update(id, &pool)).await.is_some());
        assert!(feed.on_pool(pool_update(id, &pool)).await.is_none());
    }

    #[tokio::test]
    async fn test_pool_opened_before_start_dropped() {
        let chain = Arc::new(MockChain::new());
        let feed = feed(chain);
        let base = Pubkey::new_unique();
        feed.on_market(&market_update(&market_state(Pubkey::new_unique(), base, *WSOL_MINT)));

        let at_start = pool_state(base, *WSOL_MINT, STARTED_AT);
        assert!(feed.on_pool(pool_update(Pubkey::new_unique(), &at_start)).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_market_drops_pool() {
        let chain = Arc::new(MockChain::new());
        let feed = feed(chain);
        let pool = pool_state(Pubkey::new_unique(), *WSOL_MINT, STARTED_AT + 10);

        assert!(feed.on_pool(pool_update(Pubkey::new_unique(), &pool)).await.is_none());
    }

    #[tokio::test]
    async fn test_run_deduplicates_stream() {
        let chain = Arc::new(MockChain::new());
        let feed = Arc::new(feed(chain));
        let base = Pubkey::new_unique();
        let pool = pool_state(base, *WSOL_MINT, STARTED_AT + 10);
        let market = market_state(pool.market_id, base, *WSOL_MINT);
        let id = Pubkey::new_unique();

        let (event_tx, event_rx) = mpsc::channel(16);
        let (ready_tx, mut ready_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let runner = tokio::spawn(feed.clone().run(event_rx, ready_tx, cancel.clone()));

        event_tx.send(FeedEvent::Market(market_update(&market))).await.unwrap();
        event_tx.send(FeedEvent::Pool(pool_update(id, &pool))).await.unwrap();
        event_tx.send(FeedEvent::Pool(pool_update(id, &pool))).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), ready_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.id, id);
        assert!(tokio::time::timeout(Duration::from_millis(100), ready_rx.recv())
            .await
            .is_err());

        cancel.cancel();
        runner.await.unwrap();
    }
}
