//! CLI command implementations

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chain::{ChainClient, RpcChainClient};
use crate::config::{Config, QuoteAsset};
use crate::dexscreener::DexScreenerClient;
use crate::filter::{HttpSocialLookup, RiskFilterChain};
use crate::notify::Notifier;
use crate::orchestrator::Orchestrator;
use crate::position::{ExitMonitor, OrderCounter, PositionStore};
use crate::price::{BirdeyeClient, CoinGeckoRate, PriceSource, QuoteValuation, SolUsdRate, ValueOracle};
use crate::raydium::layout::{LiquidityStateV4, MarketStateV3};
use crate::raydium::swap::{PoolKeys, RaydiumSwapBuilder};
use crate::retry::FixedRetry;
use crate::snipe_list::SnipeList;
use crate::stream::{PoolDiscoveryFeed, ProgramSubscription, SubscriptionClient};
use crate::trading::{TradeExecutor, TransactionAssembler};

fn request_timeout(config: &Config) -> Duration {
    Duration::from_millis(config.price.request_timeout_ms)
}

fn price_retry(config: &Config) -> FixedRetry {
    FixedRetry::from_millis(config.price.retry_attempts, config.price.retry_delay_ms)
}

async fn quote_valuation(config: &Config, quote: QuoteAsset) -> Result<QuoteValuation> {
    let coingecko = Arc::new(CoinGeckoRate::new(&config.price.coingecko_url, request_timeout(config)));
    let sol_usd = SolUsdRate::init(coingecko, price_retry(config))
        .await
        .context("Failed to fetch SOL/USD rate")?;
    Ok(QuoteValuation::new(quote, sol_usd))
}

fn filter_chain(
    config: &Config,
    chain: Arc<dyn ChainClient>,
    dexscreener: Arc<DexScreenerClient>,
    valuation: QuoteValuation,
) -> RiskFilterChain {
    let socials = Arc::new(HttpSocialLookup::new(dexscreener, request_timeout(config)));
    RiskFilterChain::new(chain, socials, valuation, config.filters.clone())
}

/// Start the sniper bot
pub async fn start(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        warn!("Running in DRY-RUN mode - no real trades will be executed");
    }

    let quote = config.trading.quote_asset()?;
    info!("Starting Raydium sniper...");
    info!(
        "Buy amount: {} {}, max open positions: {}",
        config.trading.quote_amount,
        quote.symbol(),
        config.trading.max_open_positions
    );

    let keypair = Arc::new(config.wallet.load_keypair()?);
    let owner = keypair.pubkey();
    info!("Loaded keypair: {}", owner);

    info!("Initializing RPC client...");
    let commitment = config.rpc.commitment_config()?;
    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::from_config(&config.rpc)?);

    let store = Arc::new(PositionStore::new());
    let wallet_accounts = chain
        .get_wallet_token_accounts(&owner)
        .await
        .context("Failed to list wallet token accounts")?;
    store.seed_wallet_accounts(&wallet_accounts);
    let quote_account = wallet_accounts
        .iter()
        .find(|account| account.mint == quote.mint())
        .map(|account| account.address)
        .ok_or_else(|| anyhow!("No {} token account in wallet {}", quote.symbol(), owner))?;
    info!("Quote token account: {}", quote_account);

    let valuation = quote_valuation(config, quote).await?;
    let cancel = CancellationToken::new();

    if quote.is_sol() && config.price.sol_price_refresh_secs > 0 {
        valuation
            .sol_usd
            .spawn_refresh(Duration::from_secs(config.price.sol_price_refresh_secs), cancel.clone());
    }

    let dexscreener = Arc::new(DexScreenerClient::new(&config.price.dexscreener_url, request_timeout(config)));
    let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();
    if config.price.birdeye_api_key.is_empty() {
        warn!("No Birdeye API key; pricing positions from DexScreener only");
    } else {
        sources.push(Arc::new(BirdeyeClient::new(
            &config.price.birdeye_url,
            &config.price.birdeye_api_key,
            request_timeout(config),
        )));
    }
    sources.push(dexscreener.clone());
    let oracle = Arc::new(ValueOracle::new(sources, price_retry(config)));

    let filters = Arc::new(filter_chain(config, chain.clone(), dexscreener, valuation.clone()));
    let executor = Arc::new(TradeExecutor::new(
        chain.clone(),
        Arc::new(RaydiumSwapBuilder::new()),
        TransactionAssembler::from_config(&config.trading),
        keypair.clone(),
        quote_account,
        config.trading.quote_amount,
        valuation,
    ));
    let counter = Arc::new(OrderCounter::new(config.trading.max_open_positions));
    let notifier = Notifier::from_config(&config.notify, request_timeout(config));
    if !notifier.is_enabled() {
        info!("Trade notifications disabled");
    }

    let monitor = if config.auto_sell.enabled {
        Some(Arc::new(ExitMonitor::new(
            chain.clone(),
            oracle,
            executor.clone(),
            store.clone(),
            counter.clone(),
            notifier.clone(),
            &config.auto_sell,
            quote.symbol(),
            cancel.clone(),
        )))
    } else {
        warn!("Auto-sell disabled; positions must be closed manually");
        None
    };

    let snipe_list = if config.snipe_list.enabled {
        let list = Arc::new(SnipeList::load(&config.snipe_list.path).await?);
        info!("Snipe list mode: only buying {} listed mints", list.len().await);
        list.spawn_refresh(Duration::from_millis(config.snipe_list.refresh_interval_ms), cancel.clone());
        Some(list)
    } else {
        None
    };

    let orchestrator = Arc::new(Orchestrator::new(
        filters,
        executor,
        store.clone(),
        counter,
        snipe_list,
        monitor,
        notifier,
        quote.symbol(),
        dry_run,
    ));

    let (event_tx, event_rx) = mpsc::channel(config.subscription.channel_capacity);
    let (ready_tx, ready_rx) = mpsc::channel(config.subscription.channel_capacity);

    let started_at = Utc::now().timestamp().max(0) as u64;
    let discovery = Arc::new(PoolDiscoveryFeed::new(
        chain.clone(),
        started_at,
        FixedRetry::from_millis(config.filters.account_retry_attempts, config.filters.account_retry_delay_ms),
    ));

    info!("Connecting to {} for program subscriptions...", config.rpc.ws_endpoint);
    let subscriptions = SubscriptionClient::new(
        &config.rpc.ws_endpoint,
        commitment,
        Duration::from_millis(config.subscription.reconnect_delay_ms),
    );
    let market_feed = subscriptions.spawn(ProgramSubscription::markets(&quote.mint()), event_tx.clone(), cancel.clone());
    let pool_feed = subscriptions.spawn(ProgramSubscription::pools(&quote.mint()), event_tx, cancel.clone());

    let discovery_task = tokio::spawn(discovery.run(event_rx, ready_tx, cancel.clone()));
    let orchestrator_task = tokio::spawn(orchestrator.run(ready_rx, cancel.clone()));

    info!("Sniper running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    info!("Shutting down...");
    cancel.cancel();

    for (name, task) in [
        ("market subscription", market_feed),
        ("pool subscription", pool_feed),
        ("pool discovery", discovery_task),
        ("orchestrator", orchestrator_task),
    ] {
        if let Err(e) = task.await {
            error!("{} task failed: {}", name, e);
        }
    }

    for position in store.needs_attention() {
        warn!(
            "Position in {} needs manual attention ({} raw tokens in {})",
            position.mint, position.token_amount, position.token_account
        );
    }
    if !store.is_empty() {
        warn!("{} positions still open at shutdown", store.len());
    }

    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check system health
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    let mut all_healthy = true;
    let chain = RpcChainClient::from_config(&config.rpc)?;

    print!("RPC Endpoint... ");
    match check_rpc(&chain).await {
        Ok(latency) => println!("OK ({}ms)", latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("WebSocket Endpoint... ");
    match check_websocket(config).await {
        Ok(_) => println!("OK"),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Wallet... ");
    match check_wallet(config, &chain).await {
        Ok(summary) => println!("OK ({})", summary),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("SOL/USD Rate... ");
    match check_sol_price(config).await {
        Ok(rate) => println!("OK (${:.2})", rate),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    if config.snipe_list.enabled {
        print!("Snipe List... ");
        match SnipeList::load(&config.snipe_list.path).await {
            Ok(list) => println!("OK ({} mints)", list.len().await),
            Err(e) => {
                println!("FAILED: {}", e);
                all_healthy = false;
            }
        }
    } else {
        println!("Snipe List... DISABLED");
    }

    println!();
    if all_healthy {
        println!("All systems healthy!");
    } else {
        println!("Some systems are unhealthy. Check the errors above.");
    }

    Ok(())
}

async fn check_rpc(chain: &RpcChainClient) -> Result<u64> {
    let start = Instant::now();
    chain.get_latest_blockhash().await?;
    Ok(start.elapsed().as_millis() as u64)
}

async fn check_websocket(config: &Config) -> Result<()> {
    let timeout = Duration::from_secs(5);
    match tokio::time::timeout(timeout, PubsubClient::new(&config.rpc.ws_endpoint)).await {
        Ok(Ok(client)) => {
            client.shutdown().await.ok();
            Ok(())
        }
        Ok(Err(e)) => Err(anyhow!("WebSocket connection failed: {}", e)),
        Err(_) => Err(anyhow!("Connection timed out after {}s", timeout.as_secs())),
    }
}

async fn check_wallet(config: &Config, chain: &RpcChainClient) -> Result<String> {
    let quote = config.trading.quote_asset()?;
    let owner = config.wallet.load_keypair()?.pubkey();
    let accounts = chain.get_wallet_token_accounts(&owner).await?;
    let quote_account = accounts
        .iter()
        .find(|account| account.mint == quote.mint())
        .ok_or_else(|| anyhow!("no {} token account", quote.symbol()))?;

    Ok(format!(
        "{}, {} token accounts, {} {} in {}",
        owner,
        accounts.len(),
        crate::raydium::mint::to_ui_amount(quote_account.amount, quote.decimals()),
        quote.symbol(),
        quote_account.address
    ))
}

async fn check_sol_price(config: &Config) -> Result<f64> {
    let valuation = quote_valuation(config, QuoteAsset::Wsol).await?;
    Ok(valuation.sol_usd.get())
}

/// Run the risk filters against one existing pool and print the report
pub async fn inspect(config: &Config, pool: &str) -> Result<()> {
    let pool_id = Pubkey::from_str(pool).map_err(|e| anyhow!("Invalid pool address {}: {}", pool, e))?;
    let quote = config.trading.quote_asset()?;
    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::from_config(&config.rpc)?);

    let account = chain
        .get_account(&pool_id)
        .await?
        .ok_or_else(|| anyhow!("Pool {} not found", pool_id))?;
    let state = LiquidityStateV4::try_from_slice(&account.data)?;
    if state.quote_mint != quote.mint() {
        warn!(
            "Pool {} is quoted in {}, not the configured {}",
            pool_id,
            state.quote_mint,
            quote.symbol()
        );
    }

    let market = chain
        .get_account(&state.market_id)
        .await?
        .ok_or_else(|| anyhow!("Market {} not found", state.market_id))?;
    let market = MarketStateV3::try_from_slice(&market.data)?;
    let keys = PoolKeys::from_state(pool_id, &state, &market)?;

    let valuation = quote_valuation(config, quote).await?;
    let dexscreener = Arc::new(DexScreenerClient::new(&config.price.dexscreener_url, request_timeout(config)));
    let filters = filter_chain(config, chain, dexscreener, valuation);
    let report = filters.evaluate(&pool_id, &state).await;

    println!("\n=== POOL {} ===\n", pool_id);
    println!("{:<20} {}", "Base Mint", keys.base_mint);
    println!("{:<20} {}", "Market", keys.market_id);
    println!("{:<20} {}", "Open Time", state.pool_open_time);
    println!();
    for (label, value) in report.rows() {
        println!("{:<20} {}", label, value);
    }
    println!();
    if report.skip() {
        println!("Verdict: SKIP (failed {:?})", report.failed());
    } else {
        println!("Verdict: BUY");
    }

    Ok(())
}
