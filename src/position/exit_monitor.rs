//! Per-position exit monitoring
//!
//! Each bought position gets one task that polls the pool's quote vault and
//! the token's USD value on a fixed interval, and sells through the
//! [`TradeExecutor`] when a threshold trips:
//!
//! `Initializing -> Watching -> Selling -> Closed`, with a forced
//! liquidation path when the pool's liquidity is pulled.
//!
//! NOTE: exits are best-effort. A rug between two polls gaps straight
//! through the stop-loss.

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::store::{OrderCounter, PositionStatus, PositionStore, TrackedPosition};
use crate::chain::ChainClient;
use crate::config::AutoSellConfig;
use crate::error::Error;
use crate::notify::{Notifier, TradeNotification};
use crate::price::ValueOracle;
use crate::raydium::mint::to_ui_amount;
use crate::trading::{Fill, TradeExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Initializing,
    Watching,
    Selling,
    ForcedLiquidation,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellReason {
    SellNow,
    StopLoss,
    TakeProfit,
    TargetGain,
    ForcedLiquidation,
}

/// What one tick decided
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickDecision {
    /// Nothing to do, or no usable data this tick
    Hold,
    Sell(SellReason),
}

/// Static exit rules, read from `[auto_sell]`
#[derive(Debug, Clone, PartialEq)]
pub struct ExitPolicy {
    pub take_profit: f64,
    pub stop_loss: f64,
    pub dynamic: bool,
    pub dynamic_take_profit: f64,
    pub dynamic_stop_loss: f64,
    /// Multiplier of entry price, when enabled
    pub target_gain: Option<f64>,
    pub sell_now: bool,
    pub min_vault_balance: f64,
}

impl From<&AutoSellConfig> for ExitPolicy {
    fn from(config: &AutoSellConfig) -> Self {
        Self {
            take_profit: config.take_profit,
            stop_loss: config.stop_loss,
            dynamic: config.dynamic,
            dynamic_take_profit: config.dynamic_take_profit,
            dynamic_stop_loss: config.dynamic_stop_loss,
            target_gain: config.target_gain_enabled.then_some(config.target_gain),
            sell_now: config.sell_immediately,
            min_vault_balance: config.min_vault_balance,
        }
    }
}

/// Mutable thresholds of one position. Owned by that position's monitor
/// task only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitThresholds {
    pub entry_price: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    /// High-water mark of observed value
    pub max_reached: f64,
}

impl ExitThresholds {
    pub fn initial(entry_price: f64, policy: &ExitPolicy) -> Self {
        Self {
            entry_price,
            take_profit: entry_price * policy.take_profit,
            stop_loss: entry_price * policy.stop_loss,
            max_reached: f64::NEG_INFINITY,
        }
    }

    /// Fold in a new observation. Returns `true` if the thresholds moved.
    /// Thresholds only ever move up.
    pub fn observe(&mut self, value: f64, policy: &ExitPolicy) -> bool {
        self.max_reached = self.max_reached.max(value);

        if !policy.dynamic || self.max_reached < self.take_profit {
            return false;
        }

        let take_profit = self.take_profit.max(self.max_reached * policy.dynamic_take_profit);
        let stop_loss = self.stop_loss.max(self.max_reached * policy.dynamic_stop_loss);
        let moved = take_profit > self.take_profit || stop_loss > self.stop_loss;
        self.take_profit = take_profit;
        self.stop_loss = stop_loss;
        moved
    }

    pub fn target_price(&self, policy: &ExitPolicy) -> Option<f64> {
        policy.target_gain.map(|gain| self.entry_price * gain)
    }
}

/// Decide one tick from the quote vault balance and the current value
pub fn evaluate_tick(
    thresholds: &mut ExitThresholds,
    policy: &ExitPolicy,
    vault_balance: f64,
    value: Option<f64>,
) -> TickDecision {
    if vault_balance < policy.min_vault_balance {
        return TickDecision::Sell(SellReason::ForcedLiquidation);
    }

    let Some(value) = value.filter(|v| v.is_finite() && *v > 0.0) else {
        return TickDecision::Hold;
    };

    if thresholds.observe(value, policy) {
        info!(
            "Thresholds raised: take profit {:.11}, stop loss {:.11} (max {:.11})",
            thresholds.take_profit, thresholds.stop_loss, thresholds.max_reached
        );
    }

    let reason = if policy.sell_now {
        Some(SellReason::SellNow)
    } else if value <= thresholds.stop_loss {
        Some(SellReason::StopLoss)
    } else if value >= thresholds.take_profit {
        Some(SellReason::TakeProfit)
    } else if thresholds.target_price(policy).is_some_and(|target| value >= target) {
        Some(SellReason::TargetGain)
    } else {
        None
    };

    reason.map(TickDecision::Sell).unwrap_or(TickDecision::Hold)
}

/// How a monitor finished
#[derive(Debug, Clone)]
pub enum MonitorOutcome {
    Sold(Fill),
    /// Nothing left to sell
    Empty,
    /// Sell retries exhausted; position left as `NeedsAttention`
    Abandoned,
    /// Shutdown, or the position vanished from the store
    Stopped,
}

pub struct ExitMonitor {
    chain: Arc<dyn ChainClient>,
    oracle: Arc<ValueOracle>,
    executor: Arc<TradeExecutor>,
    store: Arc<PositionStore>,
    counter: Arc<OrderCounter>,
    notifier: Notifier,
    policy: ExitPolicy,
    poll_interval: Duration,
    sell_delay: Duration,
    max_sell_retries: u32,
    quote_symbol: &'static str,
    cancel: CancellationToken,
}

impl ExitMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Arc<dyn ChainClient>,
        oracle: Arc<ValueOracle>,
        executor: Arc<TradeExecutor>,
        store: Arc<PositionStore>,
        counter: Arc<OrderCounter>,
        notifier: Notifier,
        config: &AutoSellConfig,
        quote_symbol: &'static str,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            chain,
            oracle,
            executor,
            store,
            counter,
            notifier,
            policy: ExitPolicy::from(config),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            sell_delay: Duration::from_millis(config.sell_delay_ms),
            max_sell_retries: config.max_sell_retries.max(1),
            quote_symbol,
            cancel,
        }
    }

    /// Watch `mint` in its own task
    pub fn spawn(self: &Arc<Self>, mint: Pubkey) -> JoinHandle<MonitorOutcome> {
        let monitor = self.clone();
        tokio::spawn(async move { monitor.watch(mint).await })
    }

    pub async fn watch(&self, mint: Pubkey) -> MonitorOutcome {
        let Some(position) = self.store.get(&mint) else {
            warn!("No tracked position for {}", mint);
            return MonitorOutcome::Stopped;
        };

        if self.policy.sell_now && !self.sell_delay.is_zero() {
            info!("Selling {} after {:?} regardless of price", mint, self.sell_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.sell_delay) => {}
                _ = self.cancel.cancelled() => return MonitorOutcome::Stopped,
            }
        }

        let mut state = MonitorState::Initializing;
        let mut thresholds: Option<ExitThresholds> = None;
        let mut failures = 0u32;

        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.cancel.cancelled() => {
                    debug!("Monitor for {} stopped", mint);
                    return MonitorOutcome::Stopped;
                }
            }

            let Some(vault_balance) = self.vault_balance(&position).await else {
                continue;
            };
            let value = if vault_balance < self.policy.min_vault_balance {
                None
            } else {
                self.oracle.price(&mint).await
            };

            if thresholds.is_none() {
                // a fill without a price takes the first observed value as entry
                let entry = position.entry_price.or(value);
                if let Some(entry) = entry {
                    if position.entry_price.is_none() {
                        let _ = self.store.set_entry_price(&mint, entry);
                    }
                    let initial = ExitThresholds::initial(entry, &self.policy);
                    info!(
                        "Initialized {} - entry {:.11} | take profit {:.11} | stop loss {:.11}",
                        mint, entry, initial.take_profit, initial.stop_loss
                    );
                    thresholds = Some(initial);
                    state = MonitorState::Watching;
                }
            }

            let decision = match thresholds.as_mut() {
                Some(t) => evaluate_tick(t, &self.policy, vault_balance, value),
                None if vault_balance < self.policy.min_vault_balance => {
                    TickDecision::Sell(SellReason::ForcedLiquidation)
                }
                None => TickDecision::Hold,
            };

            debug!(
                "{} [{:?}] vault {} value {:?}",
                mint, state, vault_balance, value
            );

            let TickDecision::Sell(reason) = decision else {
                continue;
            };

            state = if reason == SellReason::ForcedLiquidation {
                error!(
                    "Pool liquidity for {} fell below {} {}; selling immediately",
                    mint, self.policy.min_vault_balance, self.quote_symbol
                );
                MonitorState::ForcedLiquidation
            } else {
                info!("{:?} triggered for {} at {:?}", reason, mint, value);
                MonitorState::Selling
            };
            let _ = self.store.set_status(&mint, PositionStatus::Selling);

            match self.sell(&position).await {
                Ok(Some(fill)) => {
                    self.close(&mint, MonitorState::Closed);
                    let entry = thresholds.map(|t| t.entry_price);
                    self.notifier.notify(TradeNotification::from_fill(
                        &fill,
                        &self.executor.wallet(),
                        self.quote_symbol,
                        entry,
                    ));
                    return MonitorOutcome::Sold(fill);
                }
                Ok(None) => {
                    info!("Empty balance for {}, nothing to sell", mint);
                    self.close(&mint, MonitorState::Closed);
                    return MonitorOutcome::Empty;
                }
                Err(e) => {
                    failures += 1;
                    let kind = if e.is_on_chain_failure() {
                        "landed but failed"
                    } else {
                        "not submitted"
                    };
                    error!(
                        "Sell of {} {} ({:?}), retry {}/{}: {}",
                        mint, kind, state, failures, self.max_sell_retries, e
                    );
                    if failures >= self.max_sell_retries {
                        let _ = self.store.set_status(&mint, PositionStatus::NeedsAttention);
                        error!(
                            "Giving up on {}; position needs attention (token account {})",
                            mint, position.token_account
                        );
                        return MonitorOutcome::Abandoned;
                    }
                    let _ = self.store.set_status(&mint, PositionStatus::Open);
                    state = MonitorState::Watching;
                }
            }
        }
    }

    /// Quote vault balance in UI units. A vanished vault reads as zero;
    /// any other error skips the tick.
    async fn vault_balance(&self, position: &TrackedPosition) -> Option<f64> {
        match self
            .chain
            .get_token_account_balance(&position.keys.quote_vault)
            .await
        {
            Ok(balance) => Some(
                balance
                    .ui_amount
                    .unwrap_or_else(|| to_ui_amount(balance.amount, balance.decimals)),
            ),
            Err(Error::AccountNotFound(_)) => Some(0.0),
            Err(e) => {
                debug!("Vault read for {} failed, skipping tick: {}", position.mint, e);
                None
            }
        }
    }

    /// Sell the full live balance. `Ok(None)` when the balance is zero.
    async fn sell(&self, position: &TrackedPosition) -> crate::error::Result<Option<Fill>> {
        let amount = match self
            .chain
            .get_token_account_balance(&position.token_account)
            .await
        {
            Ok(balance) => balance.amount,
            Err(Error::AccountNotFound(_)) => 0,
            Err(e) => {
                debug!("Using recorded amount for {}: {}", position.mint, e);
                position.token_amount
            }
        };

        if amount == 0 {
            return Ok(None);
        }
        self.executor.sell(position, amount).await.map(Some)
    }

    fn close(&self, mint: &Pubkey, state: MonitorState) {
        if self.store.remove(mint).is_some() {
            self.counter.release();
        }
        debug!("Monitor for {} reached {:?}", mint, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::MockChain;
    use crate::chain::Confirmation;
    use crate::config::QuoteAsset;
    use crate::position::store::fixtures::position;
    use crate::price::testing::ScriptedPrice;
    use crate::price::{PriceSource, QuoteValuation, SolUsdRate};
    use crate::raydium::program::WSOL_MINT;
    use crate::retry::FixedRetry;
    use crate::trading::testing::RecordingSwap;
    use crate::trading::TransactionAssembler;
    use solana_sdk::signature::Keypair;
    use std::sync::atomic::Ordering;

    fn static_policy() -> ExitPolicy {
        ExitPolicy {
            take_profit: 2.0,
            stop_loss: 0.5,
            dynamic: false,
            dynamic_take_profit: 1.5,
            dynamic_stop_loss: 0.8,
            target_gain: None,
            sell_now: false,
            min_vault_balance: 1.0,
        }
    }

    #[test]
    fn test_initial_thresholds() {
        let t = ExitThresholds::initial(1.0, &static_policy());
        assert_eq!(t.take_profit, 2.0);
        assert_eq!(t.stop_loss, 0.5);
    }

    #[test]
    fn test_take_profit_sells() {
        let policy = static_policy();
        let mut t = ExitThresholds::initial(1.0, &policy);

        assert_eq!(evaluate_tick(&mut t, &policy, 50.0, Some(1.5)), TickDecision::Hold);
        assert_eq!(
            evaluate_tick(&mut t, &policy, 50.0, Some(2.5)),
            TickDecision::Sell(SellReason::TakeProfit)
        );
    }

    #[test]
    fn test_stop_loss_sells() {
        let policy = static_policy();
        let mut t = ExitThresholds::initial(1.0, &policy);

        assert_eq!(
            evaluate_tick(&mut t, &policy, 50.0, Some(0.5)),
            TickDecision::Sell(SellReason::StopLoss)
        );
    }

    #[test]
    fn test_missing_value_holds() {
        let policy = static_policy();
        let mut t = ExitThresholds::initial(1.0, &policy);

        assert_eq!(evaluate_tick(&mut t, &policy, 50.0, None), TickDecision::Hold);
        assert_eq!(evaluate_tick(&mut t, &policy, 50.0, Some(f64::NAN)), TickDecision::Hold);
        assert_eq!(t.max_reached, f64::NEG_INFINITY);
    }

    #[test]
    fn test_drained_vault_forces_liquidation() {
        let policy = static_policy();
        let mut t = ExitThresholds::initial(1.0, &policy);

        // value is inside the band, the drained vault wins anyway
        assert_eq!(
            evaluate_tick(&mut t, &policy, 0.4, Some(1.2)),
            TickDecision::Sell(SellReason::ForcedLiquidation)
        );
    }

    #[test]
    fn test_sell_now_ignores_price() {
        let policy = ExitPolicy {
            sell_now: true,
            ..static_policy()
        };
        let mut t = ExitThresholds::initial(1.0, &policy);

        assert_eq!(
            evaluate_tick(&mut t, &policy, 50.0, Some(1.0)),
            TickDecision::Sell(SellReason::SellNow)
        );
    }

    #[test]
    fn test_target_gain() {
        let policy = ExitPolicy {
            take_profit: 10.0,
            target_gain: Some(1.3),
            ..static_policy()
        };
        let mut t = ExitThresholds::initial(1.0, &policy);

        assert_eq!(evaluate_tick(&mut t, &policy, 50.0, Some(1.2)), TickDecision::Hold);
        assert_eq!(
            evaluate_tick(&mut t, &policy, 50.0, Some(1.3)),
            TickDecision::Sell(SellReason::TargetGain)
        );
    }

    #[test]
    fn test_dynamic_ratchet_is_monotonic() {
        let policy = ExitPolicy {
            dynamic: true,
            ..static_policy()
        };
        let mut t = ExitThresholds::initial(1.0, &policy);
        let mut last = t;

        for value in [1.2, 2.1, 2.6, 2.4, 3.0, 2.9] {
            let decision = evaluate_tick(&mut t, &policy, 50.0, Some(value));
            assert!(t.max_reached >= last.max_reached);
            assert!(t.take_profit >= last.take_profit);
            assert!(t.stop_loss >= last.stop_loss);
            assert_eq!(decision, TickDecision::Hold, "value {}", value);
            last = t;
        }

        assert_eq!(t.max_reached, 3.0);
        assert!((t.take_profit - 4.5).abs() < 1e-9);
        assert!((t.stop_loss - 2.4).abs() < 1e-9);

        // falling through the trailed stop sells
        assert_eq!(
            evaluate_tick(&mut t, &policy, 50.0, Some(2.3)),
            TickDecision::Sell(SellReason::StopLoss)
        );
    }

    #[test]
    fn test_static_thresholds_never_move() {
        let policy = static_policy();
        let mut t = ExitThresholds::initial(1.0, &policy);

        assert!(!t.observe(5.0, &policy));
        assert_eq!(t.take_profit, 2.0);
        assert_eq!(t.max_reached, 5.0);
    }

    struct Harness {
        chain: Arc<MockChain>,
        store: Arc<PositionStore>,
        counter: Arc<OrderCounter>,
        monitor: Arc<ExitMonitor>,
        held: TrackedPosition,
    }

    fn harness(price: Arc<ScriptedPrice>, config: AutoSellConfig) -> Harness {
        let chain = Arc::new(MockChain::new());
        let store = Arc::new(PositionStore::new());
        let counter = Arc::new(OrderCounter::new(1));
        let valuation = QuoteValuation::new(QuoteAsset::Wsol, SolUsdRate::fixed(100.0));
        let executor = Arc::new(TradeExecutor::new(
            chain.clone(),
            Arc::new(RecordingSwap::default()),
            TransactionAssembler::new(1, 200_000),
            Arc::new(Keypair::new()),
            Pubkey::new_unique(),
            0.01,
            valuation,
        ));
        let sources: Vec<Arc<dyn PriceSource>> = vec![price];
        let oracle = Arc::new(ValueOracle::new(sources, FixedRetry::from_millis(1, 1)));

        let held = position(Pubkey::new_unique(), *WSOL_MINT, Some(1.0));
        chain.set_balance(held.keys.quote_vault, 50_000_000_000, 9);
        chain.set_balance(held.token_account, held.token_amount, 6);
        assert!(counter.try_reserve());
        store.insert(held.clone());

        let monitor = Arc::new(ExitMonitor::new(
            chain.clone(),
            oracle,
            executor,
            store.clone(),
            counter.clone(),
            Notifier::disabled(),
            &config,
            "WSOL",
            CancellationToken::new(),
        ));

        Harness {
            chain,
            store,
            counter,
            monitor,
            held,
        }
    }

    fn fast_config() -> AutoSellConfig {
        AutoSellConfig {
            poll_interval_ms: 5,
            take_profit: 2.0,
            stop_loss: 0.5,
            max_sell_retries: 3,
            ..AutoSellConfig::default()
        }
    }

    #[tokio::test]
    async fn test_monitor_sells_on_take_profit_and_releases() {
        let price = Arc::new(ScriptedPrice::new(
            "scripted",
            vec![Ok(1.1), Ok(1.4), Ok(2.5)],
        ));
        let h = harness(price.clone(), fast_config());

        let outcome = h.monitor.spawn(h.held.mint).await.unwrap();

        assert!(matches!(outcome, MonitorOutcome::Sold(_)));
        assert_eq!(price.calls.load(Ordering::SeqCst), 3);
        assert!(!h.store.contains(&h.held.mint));
        assert_eq!(h.counter.current(), 0);
        assert_eq!(h.chain.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_monitor_forced_liquidation_skips_oracle() {
        let price = Arc::new(ScriptedPrice::fixed("scripted", 1.0));
        let h = harness(price.clone(), fast_config());
        h.chain.balances.remove(&h.held.keys.quote_vault);

        let outcome = h.monitor.watch(h.held.mint).await;

        assert!(matches!(outcome, MonitorOutcome::Sold(_)));
        assert_eq!(price.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_monitor_gives_up_after_retry_ceiling() {
        let price = Arc::new(ScriptedPrice::fixed("scripted", 3.0));
        let h = harness(price, fast_config());
        for _ in 0..3 {
            h.chain
                .push_confirmation(Confirmation::Failed("slippage".to_string()));
        }

        let outcome = h.monitor.watch(h.held.mint).await;

        assert!(matches!(outcome, MonitorOutcome::Abandoned));
        assert_eq!(h.chain.sent_count(), 3);
        let left = h.store.get(&h.held.mint).unwrap();
        assert_eq!(left.status, PositionStatus::NeedsAttention);
        // the slot stays taken while the position is unresolved
        assert_eq!(h.counter.current(), 1);
    }

    #[tokio::test]
    async fn test_monitor_recovers_after_failed_sell() {
        let price = Arc::new(ScriptedPrice::fixed("scripted", 3.0));
        let h = harness(price, fast_config());
        h.chain.send_failures.store(1, Ordering::SeqCst);

        let outcome = h.monitor.watch(h.held.mint).await;

        assert!(matches!(outcome, MonitorOutcome::Sold(_)));
        assert_eq!(h.chain.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_monitor_empty_balance_closes() {
        let price = Arc::new(ScriptedPrice::fixed("scripted", 3.0));
        let h = harness(price, fast_config());
        h.chain.set_balance(h.held.token_account, 0, 6);

        let outcome = h.monitor.watch(h.held.mint).await;

        assert!(matches!(outcome, MonitorOutcome::Empty));
        assert_eq!(h.chain.sent_count(), 0);
        assert_eq!(h.counter.current(), 0);
    }

    #[tokio::test]
    async fn test_monitor_closed_token_account_closes() {
        let price = Arc::new(ScriptedPrice::fixed("scripted", 3.0));
        let h = harness(price, fast_config());
        h.chain.balances.remove(&h.held.token_account);

        let outcome = h.monitor.watch(h.held.mint).await;

        assert!(matches!(outcome, MonitorOutcome::Empty));
        assert_eq!(h.chain.sent_count(), 0);
        assert_eq!(h.counter.current(), 0);
        assert!(!h.store.contains(&h.held.mint));
    }

    #[tokio::test]
    async fn test_monitor_stops_on_cancel() {
        let price = Arc::new(ScriptedPrice::fixed("scripted", 1.0));
        let h = harness(price, fast_config());
        h.monitor.cancel.cancel();

        let outcome = h.monitor.watch(h.held.mint).await;

        assert!(matches!(outcome, MonitorOutcome::Stopped));
        assert!(h.store.contains(&h.held.mint));
    }
}
