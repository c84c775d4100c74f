//! Pipeline wiring: ready pool -> snipe list -> filters -> cap -> buy ->
//! exit monitor

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::filter::{CheckKind, RiskFilterChain};
use crate::notify::{Notifier, TradeNotification};
use crate::position::{ExitMonitor, MonitorOutcome, OrderCounter, PositionStatus, PositionStore, TrackedPosition};
use crate::snipe_list::SnipeList;
use crate::stream::ReadyPool;
use crate::trading::TradeExecutor;

/// What happened to one discovered pool
#[derive(Debug, Clone, PartialEq)]
pub enum PoolOutcome {
    /// Snipe-list mode is on and the mint is not listed
    NotListed,
    AlreadyHeld,
    Filtered(Vec<CheckKind>),
    CapReached,
    DryRun,
    Bought { signature: String },
    BuyFailed(String),
}

pub struct Orchestrator {
    filters: Arc<RiskFilterChain>,
    executor: Arc<TradeExecutor>,
    store: Arc<PositionStore>,
    counter: Arc<OrderCounter>,
    snipe_list: Option<Arc<SnipeList>>,
    /// `None` when auto-sell is off
    monitor: Option<Arc<ExitMonitor>>,
    notifier: Notifier,
    quote_symbol: &'static str,
    dry_run: bool,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        filters: Arc<RiskFilterChain>,
        executor: Arc<TradeExecutor>,
        store: Arc<PositionStore>,
        counter: Arc<OrderCounter>,
        snipe_list: Option<Arc<SnipeList>>,
        monitor: Option<Arc<ExitMonitor>>,
        notifier: Notifier,
        quote_symbol: &'static str,
        dry_run: bool,
    ) -> Self {
        Self {
            filters,
            executor,
            store,
            counter,
            snipe_list,
            monitor,
            notifier,
            quote_symbol,
            dry_run,
        }
    }

    pub async fn handle_pool(&self, pool: ReadyPool) -> PoolOutcome {
        let mint = pool.state.base_mint;

        if let Some(list) = &self.snipe_list {
            if !list.contains(&mint).await {
                debug!("Skipping {}: not on snipe list", mint);
                return PoolOutcome::NotListed;
            }
        }

        if self.store.contains(&mint) {
            debug!("Skipping {}: already held", mint);
            return PoolOutcome::AlreadyHeld;
        }

        let report = self.filters.evaluate(&pool.id, &pool.state).await;
        report.log();
        if report.skip() {
            let failed = report.failed();
            info!("Skipping pool {}: failed {:?}", pool.id, failed);
            return PoolOutcome::Filtered(failed);
        }

        if self.dry_run {
            info!("[DRY RUN] Would buy {} via pool {}", mint, pool.id);
            return PoolOutcome::DryRun;
        }

        if !self.counter.try_reserve() {
            info!(
                "Max open positions reached ({}/{}), skipping {}",
                self.counter.current(),
                self.counter.cap(),
                mint
            );
            return PoolOutcome::CapReached;
        }

        let fill = match self.executor.buy(&pool.keys).await {
            Ok(fill) => fill,
            Err(e) => {
                self.counter.release();
                error!("Failed to buy {}: {}", mint, e);
                return PoolOutcome::BuyFailed(e.to_string());
            }
        };

        let position = TrackedPosition {
            mint,
            token_account: fill.token_account,
            keys: pool.keys.clone(),
            token_amount: fill.token_amount,
            entry_price: fill.price_usd,
            quote_spent: fill.quote_amount,
            entry_time: Utc::now(),
            entry_signature: fill.signature.to_string(),
            status: PositionStatus::Open,
        };
        if !self.store.insert(position) {
            // a concurrent buy through another pool already holds this mint
            warn!("Position in {} already tracked; releasing extra slot", mint);
            self.counter.release();
        } else if let Some(monitor) = &self.monitor {
            let handle = monitor.spawn(mint);
            tokio::spawn(async move {
                match handle.await {
                    Ok(MonitorOutcome::Sold(fill)) => info!("Position in {} closed by {}", mint, fill.signature),
                    Ok(outcome) => debug!("Monitor for {} ended: {:?}", mint, outcome),
                    Err(e) => error!("Monitor for {} crashed: {}", mint, e),
                }
            });
        }

        self.notifier.notify(TradeNotification::from_fill(
            &fill,
            &self.executor.wallet(),
            self.quote_symbol,
            None,
        ));

        PoolOutcome::Bought {
            signature: fill.signature.to_string(),
        }
    }

    /// Evaluate every ready pool in its own task until cancelled
    pub async fn run(self: Arc<Self>, mut ready: mpsc::Receiver<ReadyPool>, cancel: CancellationToken) {
        loop {
            let pool = tokio::select! {
                _ = cancel.cancelled() => break,
                pool = ready.recv() => pool,
            };
            let Some(pool) = pool else {
                break;
            };

            let this = self.clone();
            let id = pool.id;
            let task = tokio::spawn(async move { this.handle_pool(pool).await });
            tokio::spawn(async move {
                match task.await {
                    Ok(outcome) => debug!("Pool {}: {:?}", id, outcome),
                    Err(e) => error!("Evaluation of pool {} crashed: {}", id, e),
                }
            });
        }

        info!("Orchestrator stopped");
    }
}
