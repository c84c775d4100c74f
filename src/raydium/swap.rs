//! Swap instruction builder
//!
//! The rest of the bot only hands a [`SwapRequest`] to a
//! [`SwapInstructionBuilder`] and gets back raw instructions plus any extra
//! signers; [`RaydiumSwapBuilder`] is the AMM v4 implementation.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;

use super::layout::{LiquidityStateV4, MarketStateV3};
use super::program::{instruction_tag, RAYDIUM_AMM_V4, RAYDIUM_AUTHORITY_V4};
use crate::error::Result;

/// Every account needed to route a swap through one pool.
/// Resolved once per pool and cached with the position.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolKeys {
    pub id: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub program_id: Pubkey,
    pub authority: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub market_program_id: Pubkey,
    pub market_id: Pubkey,
    pub market_authority: Pubkey,
    pub market_base_vault: Pubkey,
    pub market_quote_vault: Pubkey,
    pub market_bids: Pubkey,
    pub market_asks: Pubkey,
    pub market_event_queue: Pubkey,
}

impl PoolKeys {
    /// Join a pool account with its market account
    pub fn from_state(id: Pubkey, pool: &LiquidityStateV4, market: &MarketStateV3) -> Result<Self> {
        let market_authority = market.vault_signer(&pool.market_id, &pool.market_program_id)?;

        Ok(Self {
            id,
            base_mint: pool.base_mint,
            quote_mint: pool.quote_mint,
            lp_mint: pool.lp_mint,
            base_decimals: pool.base_decimal as u8,
            quote_decimals: pool.quote_decimal as u8,
            program_id: *RAYDIUM_AMM_V4,
            authority: *RAYDIUM_AUTHORITY_V4,
            open_orders: pool.open_orders,
            target_orders: pool.target_orders,
            base_vault: pool.base_vault,
            quote_vault: pool.quote_vault,
            market_program_id: pool.market_program_id,
            market_id: pool.market_id,
            market_authority,
            market_base_vault: market.base_vault,
            market_quote_vault: market.quote_vault,
            market_bids: market.bids,
            market_asks: market.asks,
            market_event_queue: market.event_queue,
        })
    }
}

/// One swap through a pool
#[derive(Debug, Clone)]
pub struct SwapRequest<'a> {
    pub pool: &'a PoolKeys,
    /// Token account the input is debited from
    pub source: Pubkey,
    /// Token account the output is credited to
    pub destination: Pubkey,
    pub owner: Pubkey,
    pub amount_in: u64,
    pub min_amount_out: u64,
}

/// Instructions plus any signers besides the wallet
#[derive(Debug, Default)]
pub struct SwapInstructions {
    pub instructions: Vec<Instruction>,
    pub signers: Vec<Keypair>,
}

/// Builds the DEX-specific part of a swap transaction
pub trait SwapInstructionBuilder: Send + Sync {
    fn build_swap(&self, request: &SwapRequest<'_>) -> Result<SwapInstructions>;
}

/// Raydium AMM v4 `swapBaseIn`
#[derive(Debug, Clone, Default)]
pub struct RaydiumSwapBuilder;

impl RaydiumSwapBuilder {
    pub fn new() -> Self {
        Self
    }

    fn swap_base_in(request: &SwapRequest<'_>) -> Instruction {
        let keys = request.pool;

        let mut data = Vec::with_capacity(17);
        data.push(instruction_tag::SWAP_BASE_IN);
        data.extend_from_slice(&request.amount_in.to_le_bytes());
        data.extend_from_slice(&request.min_amount_out.to_le_bytes());

        // Order matters! Must match the AMM program's account list
        let accounts = vec![
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new(keys.id, false),
            AccountMeta::new_readonly(keys.authority, false),
            AccountMeta::new(keys.open_orders, false),
            AccountMeta::new(keys.target_orders, false),
            AccountMeta::new(keys.base_vault, false),
            AccountMeta::new(keys.quote_vault, false),
            AccountMeta::new_readonly(keys.market_program_id, false),
            AccountMeta::new(keys.market_id, false),
            AccountMeta::new(keys.market_bids, false),
            AccountMeta::new(keys.market_asks, false),
            AccountMeta::new(keys.market_event_queue, false),
            AccountMeta::new(keys.market_base_vault, false),
            AccountMeta::new(keys.market_quote_vault, false),
            AccountMeta::new_readonly(keys.market_authority, false),
            AccountMeta::new(request.source, false),
            AccountMeta::new(request.destination, false),
            AccountMeta::new_readonly(request.owner, true),
        ];

        Instruction {
            program_id: keys.program_id,
            accounts,
            data,
        }
    }
}

impl SwapInstructionBuilder for RaydiumSwapBuilder {
    fn build_swap(&self, request: &SwapRequest<'_>) -> Result<SwapInstructions> {
        Ok(SwapInstructions {
            instructions: vec![Self::swap_base_in(request)],
            signers: Vec::new(),
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn pool_keys(base_mint: Pubkey, quote_mint: Pubkey) -> PoolKeys {
        PoolKeys {
            id: Pubkey::new_unique(),
            base_mint,
            quote_mint,
            lp_mint: Pubkey::new_unique(),
            base_decimals: 6,
            quote_decimals: 9,
            program_id: *RAYDIUM_AMM_V4,
            authority: *RAYDIUM_AUTHORITY_V4,
            open_orders: Pubkey::new_unique(),
            target_orders: Pubkey::new_unique(),
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            market_program_id: *super::super::program::OPENBOOK_PROGRAM,
            market_id: Pubkey::new_unique(),
            market_authority: Pubkey::new_unique(),
            market_base_vault: Pubkey::new_unique(),
            market_quote_vault: Pubkey::new_unique(),
            market_bids: Pubkey::new_unique(),
            market_asks: Pubkey::new_unique(),
            market_event_queue: Pubkey::new_unique(),
        }
    }
}
