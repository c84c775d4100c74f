//! Program ids and well-known addresses
//!
//! # WARNING: Raydium has shipped new AMM versions before
//! The v4 program below is the one new pools still land on. If pool
//! discovery goes quiet, check these first.

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Raydium liquidity pool v4 program
pub const RAYDIUM_AMM_V4_STR: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

/// OpenBook (Serum v3 fork) market program used by v4 pools
pub const OPENBOOK_PROGRAM_STR: &str = "srmqPvymJeFKQ4zGQed1GFppgkRHL9kaELCbyksJtPX";

/// PDA that owns every v4 pool's vaults and LP custody accounts
pub const RAYDIUM_AUTHORITY_V4_STR: &str = "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1";

/// Metaplex token metadata program
pub const TOKEN_METADATA_PROGRAM_STR: &str = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s";

pub const WSOL_MINT_STR: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT_STR: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

lazy_static::lazy_static! {
    pub static ref RAYDIUM_AMM_V4: Pubkey =
        Pubkey::from_str(RAYDIUM_AMM_V4_STR).expect("Invalid Raydium AMM program ID");
    pub static ref OPENBOOK_PROGRAM: Pubkey =
        Pubkey::from_str(OPENBOOK_PROGRAM_STR).expect("Invalid OpenBook program ID");
    pub static ref RAYDIUM_AUTHORITY_V4: Pubkey =
        Pubkey::from_str(RAYDIUM_AUTHORITY_V4_STR).expect("Invalid Raydium authority");
    pub static ref TOKEN_METADATA_PROGRAM: Pubkey =
        Pubkey::from_str(TOKEN_METADATA_PROGRAM_STR).expect("Invalid metadata program ID");
    pub static ref WSOL_MINT: Pubkey =
        Pubkey::from_str(WSOL_MINT_STR).expect("Invalid WSOL mint");
    pub static ref USDC_MINT: Pubkey =
        Pubkey::from_str(USDC_MINT_STR).expect("Invalid USDC mint");
}

/// AMM v4 instruction tags
pub mod instruction_tag {
    /// swapBaseIn: exact input amount, minimum output
    pub const SWAP_BASE_IN: u8 = 9;
}

/// `status` value of a pool that is initialized and tradable
pub const POOL_STATUS_ACTIVE: u64 = 6;

/// SPL token account size, used to filter wallet token accounts
pub const TOKEN_ACCOUNT_LEN: u64 = 165;
