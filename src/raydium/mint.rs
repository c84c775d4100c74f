//! SPL mint and token account decoding

use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use spl_token::state::{Account as SplTokenAccount, Mint as SplMint};

use crate::error::{Error, Result};

/// The parts of a mint account the risk checks look at
#[derive(Debug, Clone, PartialEq)]
pub struct MintInfo {
    /// `None` once the mint authority has been renounced
    pub mint_authority: Option<Pubkey>,
    /// `None` when holders cannot be frozen
    pub freeze_authority: Option<Pubkey>,
    pub supply: u64,
    pub decimals: u8,
}

impl MintInfo {
    pub fn is_renounced(&self) -> bool {
        self.mint_authority.is_none()
    }

    pub fn is_freezable(&self) -> bool {
        self.freeze_authority.is_some()
    }
}

/// Decode an SPL token mint account
pub fn decode_mint(data: &[u8]) -> Result<MintInfo> {
    if data.len() < SplMint::LEN {
        return Err(Error::AccountDecode(format!(
            "mint account too short: {} bytes",
            data.len()
        )));
    }

    let mint = SplMint::unpack(&data[..SplMint::LEN])
        .map_err(|e| Error::AccountDecode(format!("mint: {}", e)))?;

    Ok(MintInfo {
        mint_authority: mint.mint_authority.into(),
        freeze_authority: mint.freeze_authority.into(),
        supply: mint.supply,
        decimals: mint.decimals,
    })
}

/// Decoded SPL token account
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAccountInfo {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

/// Decode an SPL token account
pub fn decode_token_account(data: &[u8]) -> Result<TokenAccountInfo> {
    if data.len() < SplTokenAccount::LEN {
        return Err(Error::AccountDecode(format!(
            "token account too short: {} bytes",
            data.len()
        )));
    }

    let account = SplTokenAccount::unpack(&data[..SplTokenAccount::LEN])
        .map_err(|e| Error::AccountDecode(format!("token account: {}", e)))?;

    Ok(TokenAccountInfo {
        mint: account.mint,
        owner: account.owner,
        amount: account.amount,
    })
}

/// Convert a raw token amount to UI units
pub fn to_ui_amount(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

/// Convert a UI amount to raw units, rounded to the nearest unit
pub fn to_raw_amount(ui: f64, decimals: u8) -> u64 {
    (ui * 10f64.powi(decimals as i32)).round() as u64
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use solana_sdk::program_option::COption;

    pub fn mint_bytes(
        mint_authority: Option<Pubkey>,
        freeze_authority: Option<Pubkey>,
        supply: u64,
        decimals: u8,
    ) -> Vec<u8> {
        let mint = SplMint {
            mint_authority: mint_authority.map(COption::Some).unwrap_or(COption::None),
            supply,
            decimals,
            is_initialized: true,
            freeze_authority: freeze_authority.map(COption::Some).unwrap_or(COption::None),
        };
        let mut data = vec![0u8; SplMint::LEN];
        SplMint::pack(mint, &mut data).unwrap();
        data
    }

    pub fn token_account_bytes(mint: Pubkey, owner: Pubkey, amount: u64) -> Vec<u8> {
        let account = SplTokenAccount {
            mint,
            owner,
            amount,
            state: spl_token::state::AccountState::Initialized,
            ..Default::default()
        };
        let mut data = vec![0u8; SplTokenAccount::LEN];
        SplTokenAccount::pack(account, &mut data).unwrap();
        data
    }
}
