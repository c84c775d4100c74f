//! Risk filter chain
//!
//! Runs every enabled check for a pool concurrently and collects the
//! verdicts into a [`FilterReport`]. Each check resolves missing or
//! ambiguous data to a failing verdict; nothing here returns an error.

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::checks::{
    burn_percentage, burn_verdict, liquidity_verdict, socials_verdict, top_holder_concentration,
    top_holder_verdict, Holder, BURN_UNAVAILABLE,
};
use super::socials::SocialLookup;
use super::types::{CheckKind, FilterReport, FilterVerdict};
use crate::chain::ChainClient;
use crate::config::FilterConfig;
use crate::error::{Error, Result};
use crate::price::QuoteValuation;
use crate::raydium::metadata::{decode_metadata, metadata_address};
use crate::raydium::mint::{decode_mint, decode_token_account, to_ui_amount};
use crate::raydium::program::RAYDIUM_AUTHORITY_V4;
use crate::raydium::LiquidityStateV4;
use crate::retry::{retry_fixed, FixedRetry};

pub struct RiskFilterChain {
    chain: Arc<dyn ChainClient>,
    socials: Arc<dyn SocialLookup>,
    valuation: QuoteValuation,
    config: FilterConfig,
}

impl RiskFilterChain {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        socials: Arc<dyn SocialLookup>,
        valuation: QuoteValuation,
        config: FilterConfig,
    ) -> Self {
        Self {
            chain,
            socials,
            valuation,
            config,
        }
    }

    /// Evaluate every enabled check. The skip decision is read off the
    /// report only after all checks have finished.
    pub async fn evaluate(&self, pool_id: &Pubkey, pool: &LiquidityStateV4) -> FilterReport {
        let mut report = FilterReport::new(*pool_id);

        let (socials_dex, liquidity, (mutable, socials_metadata), (freezable, renounced), holders, (burned, locked)) =
            futures::join!(
                self.check_socials_dex(pool),
                self.check_liquidity(pool),
                self.check_metadata(pool),
                self.check_mint(pool),
                self.check_top_holders(pool),
                self.check_burned(pool),
            );

        report.set(CheckKind::SocialsDex, socials_dex);
        report.set(CheckKind::Liquidity, liquidity);
        report.set(CheckKind::Mutable, mutable);
        report.set(CheckKind::Freezable, freezable);
        report.set(CheckKind::MintRenounced, renounced);
        report.set(CheckKind::TopHolders, holders);
        report.set(CheckKind::Burned, burned);
        report.set(CheckKind::SocialsMetadata, socials_metadata);
        report.locked_percentage = locked;

        report
    }

    fn account_retry(&self) -> FixedRetry {
        FixedRetry::from_millis(
            self.config.account_retry_attempts,
            self.config.account_retry_delay_ms,
        )
    }

    fn socials_retry(&self) -> FixedRetry {
        FixedRetry::from_millis(
            self.config.socials_retry_attempts,
            self.config.socials_retry_delay_ms,
        )
    }

    /// Account data, retrying while the account does not exist yet
    async fn fetch_account_data(&self, address: &Pubkey, what: &str) -> Result<Vec<u8>> {
        let chain = self.chain.as_ref();
        retry_fixed(self.account_retry(), what, || async move {
            chain
                .get_account(address)
                .await?
                .map(|account| account.data)
                .ok_or_else(|| Error::AccountNotFound(address.to_string()))
        })
        .await
    }

    async fn check_socials_dex(&self, pool: &LiquidityStateV4) -> FilterVerdict {
        if !self.config.check_socials_dex {
            return FilterVerdict::disabled();
        }

        let socials = self.socials.as_ref();
        let mint = &pool.base_mint;
        let links = retry_fixed(self.socials_retry(), "aggregator socials", || async move {
            socials.aggregator_links(mint).await
        })
        .await;

        match links {
            Ok(links) => socials_verdict(Some(links.count()), self.config.min_social_links),
            Err(e) => {
                debug!("No aggregator socials for {}: {}", mint, e);
                socials_verdict(None, self.config.min_social_links)
            }
        }
    }

    async fn check_liquidity(&self, pool: &LiquidityStateV4) -> FilterVerdict {
        if !self.config.check_liquidity {
            return FilterVerdict::disabled();
        }

        let chain = self.chain.as_ref();
        let vault = &pool.quote_vault;
        let policy = FixedRetry::from_millis(
            self.config.liquidity_retry_attempts,
            self.config.liquidity_retry_delay_ms,
        );

        // a fresh vault may report no amount until it is funded
        let pooled = retry_fixed(policy, "quote vault balance", || async move {
            chain
                .get_token_account_balance(vault)
                .await?
                .ui_amount
                .ok_or_else(|| Error::AccountNotFound(format!("{} has no balance yet", vault)))
        })
        .await;

        match pooled {
            Ok(pooled) => liquidity_verdict(
                self.valuation.to_usd(pooled),
                self.config.min_liquidity_usd,
                self.config.max_liquidity_usd,
            ),
            Err(e) => {
                warn!("Could not read quote vault {}: {}", vault, e);
                FilterVerdict::fail("Unknown")
            }
        }
    }

    /// Mutability and metadata socials share one metadata read
    async fn check_metadata(&self, pool: &LiquidityStateV4) -> (FilterVerdict, FilterVerdict) {
        let check_mutable = self.config.check_mutable;
        let check_socials = self.config.check_socials_metadata;
        if !check_mutable && !check_socials {
            return (FilterVerdict::disabled(), FilterVerdict::disabled());
        }

        let address = metadata_address(&pool.base_mint);
        let metadata = self
            .fetch_account_data(&address, "token metadata")
            .await
            .and_then(|data| decode_metadata(&data));

        let mutable = match (&metadata, check_mutable) {
            (_, false) => FilterVerdict::disabled(),
            (Ok(meta), true) if meta.is_mutable => FilterVerdict::fail("Yes"),
            (Ok(_), true) => FilterVerdict::pass("No"),
            (Err(e), true) => {
                debug!("No metadata for {}: {}", pool.base_mint, e);
                FilterVerdict::fail("Unknown")
            }
        };

        let socials = match (&metadata, check_socials) {
            (_, false) => FilterVerdict::disabled(),
            (Ok(meta), true) if !meta.uri.is_empty() => {
                let lookup = self.socials.as_ref();
                let uri = meta.uri.as_str();
                let links = retry_fixed(self.socials_retry(), "metadata socials", || async move {
                    lookup.metadata_links(uri).await
                })
                .await
                .ok()
                .map(|links| links.count());
                socials_verdict(links, self.config.min_social_links)
            }
            (_, true) => socials_verdict(None, self.config.min_social_links),
        };

        (mutable, socials)
    }

    /// Freeze authority and mint authority from one mint read
    async fn check_mint(&self, pool: &LiquidityStateV4) -> (FilterVerdict, FilterVerdict) {
        let check_freeze = self.config.check_freezable;
        let check_renounced = self.config.check_mint_renounced;
        if !check_freeze && !check_renounced {
            return (FilterVerdict::disabled(), FilterVerdict::disabled());
        }

        let mint = self
            .fetch_account_data(&pool.base_mint, "base mint")
            .await
            .and_then(|data| decode_mint(&data));

        if let Err(e) = &mint {
            warn!("Could not decode mint {}: {}", pool.base_mint, e);
        }

        let freezable = match (&mint, check_freeze) {
            (_, false) => FilterVerdict::disabled(),
            (Ok(info), true) if info.is_freezable() => FilterVerdict::fail("Yes"),
            (Ok(_), true) => FilterVerdict::pass("No"),
            (Err(_), true) => FilterVerdict::fail("Unknown"),
        };

        let renounced = match (&mint, check_renounced) {
            (_, false) => FilterVerdict::disabled(),
            (Ok(info), true) if info.is_renounced() => FilterVerdict::pass("Yes"),
            (Ok(_), true) => FilterVerdict::fail("No"),
            (Err(_), true) => FilterVerdict::fail("Unknown"),
        };

        (freezable, renounced)
    }

    async fn check_top_holders(&self, pool: &LiquidityStateV4) -> FilterVerdict {
        if !self.config.check_top_holders {
            return FilterVerdict::disabled();
        }

        // holder lists lag a brand-new mint
        if self.config.top_holder_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.top_holder_delay_ms)).await;
        }

        let chain = self.chain.as_ref();
        let mint = &pool.base_mint;
        let fetched = retry_fixed(self.account_retry(), "largest holders", || async move {
            let largest = chain.get_token_largest_accounts(mint).await?;
            let supply = chain.get_token_supply(mint).await?;
            let addresses: Vec<Pubkey> = largest.iter().map(|h| h.address).collect();
            let accounts = chain.get_multiple_accounts(&addresses).await?;
            Ok::<_, Error>((largest, supply, accounts))
        })
        .await;

        let (largest, supply, accounts) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("No holder information for {}: {}", mint, e);
                return top_holder_verdict(None, self.config.top_holder_max_pct);
            }
        };

        let holders: Vec<Holder> = largest
            .iter()
            .zip(accounts.iter())
            .map(|(holder, account)| Holder {
                token_account: holder.address,
                owner: account
                    .as_ref()
                    .and_then(|a| decode_token_account(&a.data).ok())
                    .map(|info| info.owner),
                ui_amount: holder
                    .amount
                    .ui_amount
                    .unwrap_or_else(|| to_ui_amount(holder.amount.amount, holder.amount.decimals)),
            })
            .collect();

        let total_supply = supply
            .ui_amount
            .unwrap_or_else(|| to_ui_amount(supply.amount, supply.decimals));

        let concentration = top_holder_concentration(
            &holders,
            total_supply,
            &RAYDIUM_AUTHORITY_V4,
            &[pool.base_vault],
            self.config.top_holder_count,
        );
        top_holder_verdict(concentration, self.config.top_holder_max_pct)
    }

    async fn check_burned(&self, pool: &LiquidityStateV4) -> (FilterVerdict, Option<String>) {
        if !self.config.check_burned {
            return (FilterVerdict::disabled(), None);
        }

        let burn_pct = match self
            .fetch_account_data(&pool.lp_mint, "LP mint")
            .await
            .and_then(|data| decode_mint(&data))
        {
            Ok(lp) => burn_percentage(pool.lp_reserve, lp.supply, lp.decimals),
            Err(e) => {
                info!("Getting locked liquidity for LP mint {} failed: {}", pool.lp_mint, e);
                BURN_UNAVAILABLE
            }
        };

        let (verdict, shown) = burn_verdict(burn_pct, self.config.min_burned_pct);
        (verdict, Some(shown))
    }
}
