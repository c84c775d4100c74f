//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use std::path::Path;
use std::str::FromStr;

use crate::raydium::program::{USDC_MINT, WSOL_MINT};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub auto_sell: AutoSellConfig,
    #[serde(default)]
    pub snipe_list: SnipeListConfig,
    #[serde(default)]
    pub price: PriceConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub subscription: SubscriptionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ws_endpoint")]
    pub ws_endpoint: String,
    /// processed | confirmed | finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How often to poll signature status while confirming
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,
}

impl RpcConfig {
    pub fn commitment_config(&self) -> Result<CommitmentConfig> {
        CommitmentConfig::from_str(&self.commitment)
            .map_err(|_| anyhow::anyhow!("Invalid commitment level: {}", self.commitment))
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            ws_endpoint: default_ws_endpoint(),
            commitment: default_commitment(),
            timeout_ms: default_timeout_ms(),
            confirm_poll_ms: default_confirm_poll_ms(),
        }
    }
}

/// Signing identity. One of `private_key` (base58) or `keypair_path`
/// (Solana CLI JSON byte array) must be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub keypair_path: Option<String>,
}

impl WalletConfig {
    /// Load the signing keypair
    pub fn load_keypair(&self) -> Result<Keypair> {
        if let Some(secret) = self.private_key.as_deref().filter(|s| !s.is_empty()) {
            let bytes = bs58::decode(secret.trim())
                .into_vec()
                .context("private_key is not valid base58")?;
            return Keypair::from_bytes(&bytes)
                .map_err(|e| anyhow::anyhow!("private_key is not a valid keypair: {}", e));
        }

        if let Some(path) = self.keypair_path.as_deref().filter(|s| !s.is_empty()) {
            return solana_sdk::signature::read_keypair_file(path)
                .map_err(|e| anyhow::anyhow!("Failed to read keypair file {}: {}", path, e));
        }

        anyhow::bail!("wallet.private_key or wallet.keypair_path must be set")
    }
}

/// Supported quote assets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteAsset {
    Wsol,
    Usdc,
}

impl QuoteAsset {
    pub fn mint(&self) -> Pubkey {
        match self {
            QuoteAsset::Wsol => *WSOL_MINT,
            QuoteAsset::Usdc => *USDC_MINT,
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            QuoteAsset::Wsol => 9,
            QuoteAsset::Usdc => 6,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            QuoteAsset::Wsol => "WSOL",
            QuoteAsset::Usdc => "USDC",
        }
    }

    /// Whether quote amounts need the SOL/USD rate to become fiat
    pub fn is_sol(&self) -> bool {
        matches!(self, QuoteAsset::Wsol)
    }
}

impl FromStr for QuoteAsset {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WSOL" | "SOL" => Ok(QuoteAsset::Wsol),
            "USDC" => Ok(QuoteAsset::Usdc),
            _ => Err(crate::error::Error::UnsupportedQuoteMint(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// WSOL or USDC
    #[serde(default = "default_quote_mint")]
    pub quote_mint: String,
    /// Amount of quote asset spent per buy, in UI units
    #[serde(default = "default_quote_amount")]
    pub quote_amount: f64,
    /// Maximum simultaneously open positions
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// Priority fee in micro-lamports per compute unit
    #[serde(default = "default_compute_unit_price")]
    pub compute_unit_price: u64,
    #[serde(default = "default_compute_unit_limit")]
    pub compute_unit_limit: u32,
}

impl TradingConfig {
    pub fn quote_asset(&self) -> crate::error::Result<QuoteAsset> {
        self.quote_mint.parse()
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            quote_mint: default_quote_mint(),
            quote_amount: default_quote_amount(),
            max_open_positions: default_max_open_positions(),
            compute_unit_price: default_compute_unit_price(),
            compute_unit_limit: default_compute_unit_limit(),
        }
    }
}

/// Risk filter toggles and thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_true")]
    pub check_liquidity: bool,
    #[serde(default = "default_true")]
    pub check_mutable: bool,
    #[serde(default = "default_true")]
    pub check_freezable: bool,
    #[serde(default = "default_true")]
    pub check_mint_renounced: bool,
    #[serde(default = "default_true")]
    pub check_top_holders: bool,
    #[serde(default = "default_true")]
    pub check_burned: bool,
    #[serde(default)]
    pub check_socials_dex: bool,
    #[serde(default)]
    pub check_socials_metadata: bool,

    /// Liquidity floor in USD
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
    /// Liquidity ceiling in USD
    #[serde(default = "default_max_liquidity_usd")]
    pub max_liquidity_usd: f64,
    /// Attempts to read a funded quote vault
    #[serde(default = "default_liquidity_retry_attempts")]
    pub liquidity_retry_attempts: u32,
    #[serde(default = "default_liquidity_retry_delay_ms")]
    pub liquidity_retry_delay_ms: u64,

    /// Maximum combined share of supply held by the top holders (percent)
    #[serde(default = "default_top_holder_max_pct")]
    pub top_holder_max_pct: f64,
    #[serde(default = "default_top_holder_count")]
    pub top_holder_count: usize,
    /// Settle time before enumerating holders of a fresh mint
    #[serde(default = "default_top_holder_delay_ms")]
    pub top_holder_delay_ms: u64,

    /// Minimum burned share of LP supply (percent)
    #[serde(default = "default_min_burned_pct")]
    pub min_burned_pct: f64,
    #[serde(default = "default_account_retry_attempts")]
    pub account_retry_attempts: u32,
    #[serde(default = "default_account_retry_delay_ms")]
    pub account_retry_delay_ms: u64,

    #[serde(default = "default_min_social_links")]
    pub min_social_links: usize,
    #[serde(default = "default_socials_retry_attempts")]
    pub socials_retry_attempts: u32,
    #[serde(default = "default_socials_retry_delay_ms")]
    pub socials_retry_delay_ms: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            check_liquidity: true,
            check_mutable: true,
            check_freezable: true,
            check_mint_renounced: true,
            check_top_holders: true,
            check_burned: true,
            check_socials_dex: false,
            check_socials_metadata: false,
            min_liquidity_usd: default_min_liquidity_usd(),
            max_liquidity_usd: default_max_liquidity_usd(),
            liquidity_retry_attempts: default_liquidity_retry_attempts(),
            liquidity_retry_delay_ms: default_liquidity_retry_delay_ms(),
            top_holder_max_pct: default_top_holder_max_pct(),
            top_holder_count: default_top_holder_count(),
            top_holder_delay_ms: default_top_holder_delay_ms(),
            min_burned_pct: default_min_burned_pct(),
            account_retry_attempts: default_account_retry_attempts(),
            account_retry_delay_ms: default_account_retry_delay_ms(),
            min_social_links: default_min_social_links(),
            socials_retry_attempts: default_socials_retry_attempts(),
            socials_retry_delay_ms: default_socials_retry_delay_ms(),
        }
    }
}

/// Exit rules. Take-profit and stop-loss values are multipliers of the
/// entry price (2.0 = double, 0.5 = half).
#[derive(Debug, Clone, Deserialize)]
pub struct AutoSellConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_take_profit")]
    pub take_profit: f64,
    #[serde(default = "default_stop_loss")]
    pub stop_loss: f64,

    /// Ratchet thresholds off the high-water mark once take-profit is crossed
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default = "default_dynamic_take_profit")]
    pub dynamic_take_profit: f64,
    #[serde(default = "default_dynamic_stop_loss")]
    pub dynamic_stop_loss: f64,

    #[serde(default)]
    pub target_gain_enabled: bool,
    #[serde(default = "default_target_gain")]
    pub target_gain: f64,

    /// Sell unconditionally on the first tick (after `sell_delay_ms`)
    #[serde(default)]
    pub sell_immediately: bool,
    #[serde(default)]
    pub sell_delay_ms: u64,

    #[serde(default = "default_max_sell_retries")]
    pub max_sell_retries: u32,
    /// Quote vault balance (UI units) under which the pool counts as pulled
    #[serde(default = "default_min_vault_balance")]
    pub min_vault_balance: f64,
}

impl Default for AutoSellConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
            take_profit: default_take_profit(),
            stop_loss: default_stop_loss(),
            dynamic: false,
            dynamic_take_profit: default_dynamic_take_profit(),
            dynamic_stop_loss: default_dynamic_stop_loss(),
            target_gain_enabled: false,
            target_gain: default_target_gain(),
            sell_immediately: false,
            sell_delay_ms: 0,
            max_sell_retries: default_max_sell_retries(),
            min_vault_balance: default_min_vault_balance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnipeListConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_snipe_list_path")]
    pub path: String,
    #[serde(default = "default_snipe_list_refresh_ms")]
    pub refresh_interval_ms: u64,
}

impl Default for SnipeListConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_snipe_list_path(),
            refresh_interval_ms: default_snipe_list_refresh_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    #[serde(default)]
    pub birdeye_api_key: String,
    #[serde(default = "default_birdeye_url")]
    pub birdeye_url: String,
    #[serde(default = "default_dexscreener_url")]
    pub dexscreener_url: String,
    #[serde(default = "default_coingecko_url")]
    pub coingecko_url: String,
    #[serde(default = "default_price_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_price_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 0 keeps the startup SOL/USD rate until the next buy re-queries it
    #[serde(default)]
    pub sol_price_refresh_secs: u64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            birdeye_api_key: String::new(),
            birdeye_url: default_birdeye_url(),
            dexscreener_url: default_dexscreener_url(),
            coingecko_url: default_coingecko_url(),
            retry_attempts: default_price_retry_attempts(),
            retry_delay_ms: default_price_retry_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            sol_price_refresh_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub discord_webhook_url: Option<String>,
    #[serde(default = "default_notify_username")]
    pub username: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            discord_webhook_url: None,
            username: default_notify_username(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_rpc_endpoint() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}
fn default_ws_endpoint() -> String {
    "wss://api.mainnet-beta.solana.com".to_string()
}
fn default_commitment() -> String {
    "confirmed".to_string()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_confirm_poll_ms() -> u64 {
    500
}
fn default_quote_mint() -> String {
    "WSOL".to_string()
}
fn default_quote_amount() -> f64 {
    0.01
}
fn default_max_open_positions() -> usize {
    1
}
fn default_compute_unit_price() -> u64 {
    421_197
}
fn default_compute_unit_limit() -> u32 {
    101_337
}
fn default_min_liquidity_usd() -> f64 {
    1_000.0
}
fn default_max_liquidity_usd() -> f64 {
    100_000.0
}
fn default_liquidity_retry_attempts() -> u32 {
    5
}
fn default_liquidity_retry_delay_ms() -> u64 {
    1_000
}
fn default_top_holder_max_pct() -> f64 {
    30.0
}
fn default_top_holder_count() -> usize {
    10
}
fn default_top_holder_delay_ms() -> u64 {
    5_000
}
fn default_min_burned_pct() -> f64 {
    90.0
}
fn default_account_retry_attempts() -> u32 {
    5
}
fn default_account_retry_delay_ms() -> u64 {
    1_000
}
fn default_min_social_links() -> usize {
    2
}
fn default_socials_retry_attempts() -> u32 {
    10
}
fn default_socials_retry_delay_ms() -> u64 {
    1_000
}
fn default_poll_interval_ms() -> u64 {
    3_000
}
fn default_take_profit() -> f64 {
    2.0
}
fn default_stop_loss() -> f64 {
    0.5
}
fn default_dynamic_take_profit() -> f64 {
    1.5
}
fn default_dynamic_stop_loss() -> f64 {
    0.8
}
fn default_target_gain() -> f64 {
    3.0
}
fn default_max_sell_retries() -> u32 {
    5
}
fn default_min_vault_balance() -> f64 {
    1.0
}
fn default_snipe_list_path() -> String {
    "snipe-list.txt".to_string()
}
fn default_snipe_list_refresh_ms() -> u64 {
    30_000
}
fn default_birdeye_url() -> String {
    "https://public-api.birdeye.so".to_string()
}
fn default_dexscreener_url() -> String {
    "https://api.dexscreener.com".to_string()
}
fn default_coingecko_url() -> String {
    "https://api.coingecko.com".to_string()
}
fn default_price_retry_attempts() -> u32 {
    3
}
fn default_price_retry_delay_ms() -> u64 {
    1_000
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_notify_username() -> String {
    "Trading Bot".to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    2_000
}
fn default_channel_capacity() -> usize {
    1_024
}

impl Config {
    /// Load configuration from file and environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SNIPER__)
            .add_source(
                config::Environment::with_prefix("SNIPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.rpc.commitment_config()?;

        self.trading
            .quote_asset()
            .context("trading.quote_mint is not supported")?;

        if self.trading.quote_amount <= 0.0 {
            anyhow::bail!("trading.quote_amount must be positive");
        }

        if self.trading.max_open_positions == 0 {
            anyhow::bail!("trading.max_open_positions must be at least 1");
        }

        if self.filters.min_liquidity_usd > self.filters.max_liquidity_usd {
            anyhow::bail!(
                "filters.min_liquidity_usd ({}) exceeds max_liquidity_usd ({})",
                self.filters.min_liquidity_usd,
                self.filters.max_liquidity_usd
            );
        }

        if self.filters.top_holder_max_pct <= 0.0 || self.filters.top_holder_max_pct > 100.0 {
            anyhow::bail!("filters.top_holder_max_pct must be in (0, 100]");
        }

        if self.auto_sell.enabled {
            if self.auto_sell.take_profit <= 0.0 {
                anyhow::bail!("auto_sell.take_profit must be positive");
            }
            if self.auto_sell.stop_loss < 0.0 {
                anyhow::bail!("auto_sell.stop_loss cannot be negative");
            }
            if self.auto_sell.poll_interval_ms == 0 {
                anyhow::bail!("auto_sell.poll_interval_ms must be positive");
            }
        }

        if self.snipe_list.enabled && self.snipe_list.refresh_interval_ms == 0 {
            anyhow::bail!("snipe_list.refresh_interval_ms must be positive");
        }

        let has_secret = self
            .wallet
            .private_key
            .as_deref()
            .is_some_and(|s| !s.is_empty())
            || self
                .wallet
                .keypair_path
                .as_deref()
                .is_some_and(|s| !s.is_empty());
        if !has_secret {
            anyhow::bail!("wallet.private_key or wallet.keypair_path must be set");
        }

        Ok(())
    }

    /// Display configuration with secrets masked
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    ws_endpoint: {}
    commitment: {}
  Wallet:
    private_key: {}
    keypair_path: {}
  Trading:
    quote: {} {}
    max_open_positions: {}
    compute_unit_price: {} micro-lamports
    compute_unit_limit: {}
  Filters:
    liquidity: {} (${} - ${})
    mutable: {}
    freezable: {}
    mint_renounced: {}
    top_holders: {} (max {}% across {})
    burned: {} (min {}%)
    socials_dex: {}
    socials_metadata: {} (min {} links)
  Auto-Sell:
    enabled: {}
    take_profit: {}x
    stop_loss: {}x
    dynamic: {} ({}x / {}x of high-water)
    target_gain: {} ({}x)
    sell_immediately: {} (delay {}ms)
    max_sell_retries: {}
  Snipe list:
    enabled: {} ({})
  Price:
    birdeye_api_key: {}
  Notify:
    discord_webhook_url: {}
"#,
            mask_url(&self.rpc.endpoint),
            mask_url(&self.rpc.ws_endpoint),
            self.rpc.commitment,
            mask_secret(self.wallet.private_key.as_deref()),
            self.wallet.keypair_path.as_deref().unwrap_or("(not set)"),
            self.trading.quote_amount,
            self.trading.quote_mint,
            self.trading.max_open_positions,
            self.trading.compute_unit_price,
            self.trading.compute_unit_limit,
            self.filters.check_liquidity,
            self.filters.min_liquidity_usd,
            self.filters.max_liquidity_usd,
            self.filters.check_mutable,
            self.filters.check_freezable,
            self.filters.check_mint_renounced,
            self.filters.check_top_holders,
            self.filters.top_holder_max_pct,
            self.filters.top_holder_count,
            self.filters.check_burned,
            self.filters.min_burned_pct,
            self.filters.check_socials_dex,
            self.filters.check_socials_metadata,
            self.filters.min_social_links,
            self.auto_sell.enabled,
            self.auto_sell.take_profit,
            self.auto_sell.stop_loss,
            self.auto_sell.dynamic,
            self.auto_sell.dynamic_take_profit,
            self.auto_sell.dynamic_stop_loss,
            self.auto_sell.target_gain_enabled,
            self.auto_sell.target_gain,
            self.auto_sell.sell_immediately,
            self.auto_sell.sell_delay_ms,
            self.auto_sell.max_sell_retries,
            self.snipe_list.enabled,
            self.snipe_list.path,
            mask_secret(Some(self.price.birdeye_api_key.as_str())),
            self.notify
                .discord_webhook_url
                .as_deref()
                .map(|_| "***")
                .unwrap_or("(not set)"),
        )
    }
}

/// Mask sensitive parts of URL (API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        Some(s) if s.len() > 8 => format!("{}...***", &s[..4]),
        Some(s) if !s.is_empty() => "***".to_string(),
        _ => "(not set)".to_string(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            wallet: WalletConfig::default(),
            trading: TradingConfig::default(),
            filters: FilterConfig::default(),
            auto_sell: AutoSellConfig::default(),
            snipe_list: SnipeListConfig::default(),
            price: PriceConfig::default(),
            notify: NotifyConfig::default(),
            subscription: SubscriptionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn with_wallet(mut config: Config) -> Config {
        config.wallet.keypair_path = Some("/tmp/id.json".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.trading.compute_unit_price, 421_197);
        assert_eq!(config.trading.compute_unit_limit, 101_337);
        assert_eq!(config.filters.top_holder_count, 10);
        assert_eq!(config.filters.min_social_links, 2);
        assert_eq!(config.auto_sell.poll_interval_ms, 3_000);
        assert_eq!(config.trading.quote_asset().unwrap(), QuoteAsset::Wsol);
    }

    #[test]
    fn test_quote_asset_parse() {
        assert_eq!("usdc".parse::<QuoteAsset>().unwrap(), QuoteAsset::Usdc);
        assert_eq!("WSOL".parse::<QuoteAsset>().unwrap(), QuoteAsset::Wsol);
        assert!(matches!(
            "BONK".parse::<QuoteAsset>(),
            Err(crate::error::Error::UnsupportedQuoteMint(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unsupported_quote() {
        let mut config = with_wallet(Config::default());
        config.trading.quote_mint = "BONK".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_liquidity_range() {
        let mut config = with_wallet(Config::default());
        config.filters.min_liquidity_usd = 10_000.0;
        config.filters.max_liquidity_usd = 5_000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_wallet() {
        assert!(Config::default().validate().is_err());
        assert!(with_wallet(Config::default()).validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[wallet]
keypair_path = "/tmp/id.json"

[trading]
quote_mint = "USDC"
quote_amount = 25.0
max_open_positions = 3

[filters]
check_socials_dex = true
top_holder_max_pct = 40.0

[auto_sell]
take_profit = 3.0
dynamic = true
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.trading.quote_asset().unwrap(), QuoteAsset::Usdc);
        assert_eq!(config.trading.max_open_positions, 3);
        assert!(config.filters.check_socials_dex);
        assert_eq!(config.filters.top_holder_max_pct, 40.0);
        // untouched fields keep their defaults
        assert_eq!(config.filters.top_holder_count, 10);
        assert_eq!(config.auto_sell.take_profit, 3.0);
        assert_eq!(config.auto_sell.stop_loss, 0.5);
        assert!(config.auto_sell.dynamic);
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://rpc.example.com?api-key=secret"),
            "https://rpc.example.com?***"
        );
        assert_eq!(mask_url("https://rpc.example.com"), "https://rpc.example.com");
    }

    #[test]
    fn test_masked_display_hides_secrets() {
        let mut config = with_wallet(Config::default());
        config.wallet.private_key = Some("5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP".to_string());
        config.price.birdeye_api_key = "birdeye-secret-key".to_string();
        config.notify.discord_webhook_url = Some("https://discord.com/api/webhooks/1/abc".into());

        let shown = config.masked_display();
        assert!(!shown.contains("birdeye-secret-key"));
        assert!(!shown.contains("webhooks/1/abc"));
        assert!(!shown.contains("5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP"));
    }
}
