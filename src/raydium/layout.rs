//! Raydium AMM v4 and OpenBook market v3 account layouts
//!
//! Neither program uses Anchor, so there is no discriminator: the accounts
//! are flat little-endian structs and borsh reads them field by field.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{Error, Result};

/// Raydium AMM v4 pool state (`LIQUIDITY_STATE_LAYOUT_V4`)
#[derive(Debug, Clone, Default, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct LiquidityStateV4 {
    pub status: u64,
    pub nonce: u64,
    pub max_order: u64,
    pub depth: u64,
    pub base_decimal: u64,
    pub quote_decimal: u64,
    pub state: u64,
    pub reset_flag: u64,
    pub min_size: u64,
    pub vol_max_cut_ratio: u64,
    pub amount_wave_ratio: u64,
    pub base_lot_size: u64,
    pub quote_lot_size: u64,
    pub min_price_multiplier: u64,
    pub max_price_multiplier: u64,
    pub system_decimal_value: u64,
    pub min_separate_numerator: u64,
    pub min_separate_denominator: u64,
    pub trade_fee_numerator: u64,
    pub trade_fee_denominator: u64,
    pub pnl_numerator: u64,
    pub pnl_denominator: u64,
    pub swap_fee_numerator: u64,
    pub swap_fee_denominator: u64,
    pub base_need_take_pnl: u64,
    pub quote_need_take_pnl: u64,
    pub quote_total_pnl: u64,
    pub base_total_pnl: u64,
    /// Unix seconds at which trading opens
    pub pool_open_time: u64,
    pub punish_pc_amount: u64,
    pub punish_coin_amount: u64,
    pub orderbook_to_init_time: u64,
    pub swap_base_in_amount: u128,
    pub swap_quote_out_amount: u128,
    pub swap_base2quote_fee: u64,
    pub swap_quote_in_amount: u128,
    pub swap_base_out_amount: u128,
    pub swap_quote2base_fee: u64,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub open_orders: Pubkey,
    pub market_id: Pubkey,
    pub market_program_id: Pubkey,
    pub target_orders: Pubkey,
    pub withdraw_queue: Pubkey,
    pub lp_vault: Pubkey,
    pub owner: Pubkey,
    /// LP supply recorded at pool initialization (raw units)
    pub lp_reserve: u64,
    pub padding: [u64; 3],
}

impl LiquidityStateV4 {
    pub const LEN: usize = 752;

    pub const STATUS_OFFSET: usize = 0;
    pub const BASE_MINT_OFFSET: usize = 400;
    pub const QUOTE_MINT_OFFSET: usize = 432;
    pub const MARKET_PROGRAM_OFFSET: usize = 560;

    /// Deserialize from raw account data
    pub fn try_from_slice(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(Error::AccountDecode(format!(
                "pool state too short: {} < {}",
                data.len(),
                Self::LEN
            )));
        }
        BorshDeserialize::deserialize(&mut &data[..Self::LEN])
            .map_err(|e| Error::AccountDecode(format!("pool state: {}", e)))
    }

    pub fn is_active(&self) -> bool {
        self.status == super::program::POOL_STATUS_ACTIVE
    }
}

/// OpenBook / Serum v3 market state (`MARKET_STATE_LAYOUT_V3`)
#[derive(Debug, Clone, Default, PartialEq, BorshDeserialize, BorshSerialize)]
pub struct MarketStateV3 {
    _head_padding: [u8; 5],
    pub account_flags: u64,
    pub own_address: Pubkey,
    pub vault_signer_nonce: u64,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub base_deposits_total: u64,
    pub base_fees_accrued: u64,
    pub quote_vault: Pubkey,
    pub quote_deposits_total: u64,
    pub quote_fees_accrued: u64,
    pub quote_dust_threshold: u64,
    pub request_queue: Pubkey,
    pub event_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub base_lot_size: u64,
    pub quote_lot_size: u64,
    pub fee_rate_bps: u64,
    pub referrer_rebates_accrued: u64,
    _tail_padding: [u8; 7],
}

impl MarketStateV3 {
    pub const LEN: usize = 388;

    pub const QUOTE_MINT_OFFSET: usize = 85;

    /// Deserialize from raw account data
    pub fn try_from_slice(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(Error::AccountDecode(format!(
                "market state too short: {} < {}",
                data.len(),
                Self::LEN
            )));
        }
        BorshDeserialize::deserialize(&mut &data[..Self::LEN])
            .map_err(|e| Error::AccountDecode(format!("market state: {}", e)))
    }

    /// Derive the market's vault signer PDA from its nonce
    pub fn vault_signer(&self, market_id: &Pubkey, market_program: &Pubkey) -> Result<Pubkey> {
        Pubkey::create_program_address(
            &[market_id.as_ref(), &self.vault_signer_nonce.to_le_bytes()],
            market_program,
        )
        .map_err(|e| Error::AccountDecode(format!("vault signer for {}: {}", market_id, e)))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn pool_state(base_mint: Pubkey, quote_mint: Pubkey, open_time: u64) -> LiquidityStateV4 {
        LiquidityStateV4 {
            status: super::super::program::POOL_STATUS_ACTIVE,
            base_decimal: 6,
            quote_decimal: 9,
            pool_open_time: open_time,
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            base_mint,
            quote_mint,
            lp_mint: Pubkey::new_unique(),
            open_orders: Pubkey::new_unique(),
            market_id: Pubkey::new_unique(),
            market_program_id: *super::super::program::OPENBOOK_PROGRAM,
            target_orders: Pubkey::new_unique(),
            lp_reserve: 1_000_000_000_000,
            ..Default::default()
        }
    }

    /// Market for `market_id` with a nonce that yields a valid vault signer
    pub fn market_state(market_id: Pubkey, base_mint: Pubkey, quote_mint: Pubkey) -> MarketStateV3 {
        let program = *super::super::program::OPENBOOK_PROGRAM;
        let nonce = (0u64..255)
            .find(|n| {
                Pubkey::create_program_address(&[market_id.as_ref(), &n.to_le_bytes()], &program)
                    .is_ok()
            })
            .unwrap();

        MarketStateV3 {
            own_address: market_id,
            vault_signer_nonce: nonce,
            base_mint,
            quote_mint,
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            event_queue: Pubkey::new_unique(),
            bids: Pubkey::new_unique(),
            asks: Pubkey::new_unique(),
            ..Default::default()
        }
    }
}
