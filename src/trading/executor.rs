//! Buy and sell execution
//!
//! Both sides build a swap through the [`SwapInstructionBuilder`], wrap it
//! with the compute budget, send it and wait for confirmation. The fill
//! price is read back from the pool's vaults after confirmation instead of
//! trusting the requested amounts.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::transaction::{close_account, create_ata_idempotent, derive_ata, TransactionAssembler};
use crate::chain::{ChainClient, Confirmation};
use crate::error::{Error, Result};
use crate::position::TrackedPosition;
use crate::price::QuoteValuation;
use crate::raydium::mint::{to_raw_amount, to_ui_amount};
use crate::raydium::swap::{SwapRequest, SwapInstructionBuilder};
use crate::raydium::PoolKeys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => f.write_str("Buy"),
            Side::Sell => f.write_str("Sell"),
        }
    }
}

/// A confirmed trade
#[derive(Debug, Clone)]
pub struct Fill {
    pub side: Side,
    pub mint: Pubkey,
    pub signature: Signature,
    pub token_account: Pubkey,
    /// Raw tokens bought or sold
    pub token_amount: u64,
    pub token_decimals: u8,
    /// Quote units spent (buy) or estimated received (sell)
    pub quote_amount: f64,
    /// USD per whole token from the post-trade vault ratio
    pub price_usd: Option<f64>,
}

impl Fill {
    pub fn token_ui_amount(&self) -> f64 {
        to_ui_amount(self.token_amount, self.token_decimals)
    }
}

pub struct TradeExecutor {
    chain: Arc<dyn ChainClient>,
    swap: Arc<dyn SwapInstructionBuilder>,
    assembler: TransactionAssembler,
    wallet: Arc<Keypair>,
    /// Wallet's quote-mint token account, swap source on buys
    quote_account: Pubkey,
    /// Raw quote amount spent per buy
    quote_amount: u64,
    valuation: QuoteValuation,
}

impl TradeExecutor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        swap: Arc<dyn SwapInstructionBuilder>,
        assembler: TransactionAssembler,
        wallet: Arc<Keypair>,
        quote_account: Pubkey,
        quote_amount_ui: f64,
        valuation: QuoteValuation,
    ) -> Self {
        let quote_amount = to_raw_amount(quote_amount_ui, valuation.asset.decimals());
        Self {
            chain,
            swap,
            assembler,
            wallet,
            quote_account,
            quote_amount,
            valuation,
        }
    }

    pub fn wallet(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    /// Spend the configured quote amount on `pool`'s base token
    pub async fn buy(&self, pool: &PoolKeys) -> Result<Fill> {
        let owner = self.wallet.pubkey();
        let destination = derive_ata(&owner, &pool.base_mint);

        let swap = self.swap.build_swap(&SwapRequest {
            pool,
            source: self.quote_account,
            destination,
            owner,
            amount_in: self.quote_amount,
            min_amount_out: 0,
        })?;

        let mut instructions = self.assembler.compute_budget();
        instructions.push(create_ata_idempotent(&owner, &pool.base_mint));
        instructions.extend(swap.instructions);

        info!("Sending buy for {} via pool {}", pool.base_mint, pool.id);
        let signature = self.submit(&instructions, &swap.signers).await?;

        if self.valuation.asset.is_sol() {
            self.valuation.sol_usd.refresh().await;
        }
        let price_usd = self.realized_price(pool).await;

        let token_amount = match self.chain.get_token_account_balance(&destination).await {
            Ok(balance) => balance.amount,
            Err(e) => {
                warn!("Could not read bought amount for {}: {}", pool.base_mint, e);
                0
            }
        };

        let fill = Fill {
            side: Side::Buy,
            mint: pool.base_mint,
            signature,
            token_account: destination,
            token_amount,
            token_decimals: pool.base_decimals,
            quote_amount: to_ui_amount(self.quote_amount, self.valuation.asset.decimals()),
            price_usd,
        };
        info!(
            "Confirmed buy {} for {}, price {}",
            fill.signature,
            fill.mint,
            format_price(fill.price_usd)
        );
        Ok(fill)
    }

    /// Sell `amount` raw tokens of `position` and close its token account
    pub async fn sell(&self, position: &TrackedPosition, amount: u64) -> Result<Fill> {
        let owner = self.wallet.pubkey();
        let pool = &position.keys;

        let swap = self.swap.build_swap(&SwapRequest {
            pool,
            source: position.token_account,
            destination: self.quote_account,
            owner,
            amount_in: amount,
            min_amount_out: 0,
        })?;

        let mut instructions = self.assembler.compute_budget();
        instructions.extend(swap.instructions);
        instructions.push(close_account(&position.token_account, &owner)?);

        info!("Sending sell for {} ({} raw)", position.mint, amount);
        let signature = self.submit(&instructions, &swap.signers).await?;
        let price_usd = self.realized_price(pool).await;

        let token_ui = to_ui_amount(amount, pool.base_decimals);
        let quote_usd = self.valuation.quote_usd();
        let quote_amount = match price_usd {
            Some(price) if quote_usd > 0.0 => token_ui * price / quote_usd,
            _ => 0.0,
        };

        let fill = Fill {
            side: Side::Sell,
            mint: position.mint,
            signature,
            token_account: position.token_account,
            token_amount: amount,
            token_decimals: pool.base_decimals,
            quote_amount,
            price_usd,
        };
        info!(
            "Confirmed sell {} for {}, price {}",
            fill.signature,
            fill.mint,
            format_price(fill.price_usd)
        );
        Ok(fill)
    }

    /// Sign, send and confirm. Submission errors and on-chain failures are
    /// both returned to the caller, which owns the retry ceiling.
    async fn submit(
        &self,
        instructions: &[solana_sdk::instruction::Instruction],
        extra_signers: &[Keypair],
    ) -> Result<Signature> {
        let (blockhash, last_valid_block_height) = self.chain.get_latest_blockhash().await?;
        let transaction =
            self.assembler
                .assemble(&self.wallet, instructions, extra_signers, blockhash)?;

        let signature = self.chain.send_transaction(&transaction).await?;
        debug!("Sent {}", signature);

        match self
            .chain
            .confirm_transaction(&signature, last_valid_block_height)
            .await?
        {
            Confirmation::Confirmed => Ok(signature),
            Confirmation::Failed(reason) => Err(Error::TransactionFailed {
                signature: signature.to_string(),
                reason,
            }),
            Confirmation::Expired => Err(Error::TransactionExpired(signature.to_string())),
        }
    }

    /// USD per whole base token: quote vault / base vault × quote USD rate
    async fn realized_price(&self, pool: &PoolKeys) -> Option<f64> {
        let (quote, base) = futures::join!(
            self.chain.get_token_account_balance(&pool.quote_vault),
            self.chain.get_token_account_balance(&pool.base_vault),
        );

        let quote = quote.ok()?;
        let base = base.ok()?;
        let quote_ui = quote
            .ui_amount
            .unwrap_or_else(|| to_ui_amount(quote.amount, quote.decimals));
        let base_ui = base
            .ui_amount
            .unwrap_or_else(|| to_ui_amount(base.amount, base.decimals));
        if !(base_ui > 0.0) {
            return None;
        }

        let price = quote_ui / base_ui * self.valuation.quote_usd();
        (price.is_finite() && price > 0.0).then_some(price)
    }
}

fn format_price(price: Option<f64>) -> String {
    match price {
        Some(price) => format!("${:.11}", price),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::raydium::swap::SwapInstructions;
    use solana_sdk::instruction::Instruction;
    use std::sync::Mutex;

    /// Swap builder that records requests and emits a placeholder
    /// instruction
    #[derive(Default)]
    pub struct RecordingSwap {
        pub requests: Mutex<Vec<(Pubkey, Pubkey, u64)>>,
    }

    pub const SWAP_MARKER_PROGRAM: Pubkey = Pubkey::new_from_array([7u8; 32]);

    impl SwapInstructionBuilder for RecordingSwap {
        fn build_swap(&self, request: &SwapRequest<'_>) -> Result<SwapInstructions> {
            self.requests
                .lock()
                .unwrap()
                .push((request.source, request.destination, request.amount_in));
            Ok(SwapInstructions {
                instructions: vec![Instruction::new_with_bytes(
                    SWAP_MARKER_PROGRAM,
                    &request.amount_in.to_le_bytes(),
                    vec![],
                )],
                signers: vec![],
            })
        }
    }
}
