//! Metaplex token metadata
//!
//! Only the leading fixed part of the account is decoded (through
//! `is_mutable`); the trailing optional fields are ignored.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

use super::program::TOKEN_METADATA_PROGRAM;
use crate::error::{Error, Result};

#[derive(Debug, Clone, BorshDeserialize, BorshSerialize)]
struct Creator {
    address: Pubkey,
    verified: bool,
    share: u8,
}

#[derive(Debug, Clone, BorshDeserialize, BorshSerialize)]
struct MetadataHead {
    key: u8,
    update_authority: Pubkey,
    mint: Pubkey,
    name: String,
    symbol: String,
    uri: String,
    seller_fee_basis_points: u16,
    creators: Option<Vec<Creator>>,
    primary_sale_happened: bool,
    is_mutable: bool,
}

/// Decoded token metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TokenMetadata {
    pub mint: Pubkey,
    pub update_authority: Pubkey,
    pub name: String,
    pub symbol: String,
    /// Off-chain JSON document
    pub uri: String,
    pub is_mutable: bool,
}

/// Metadata PDA for a mint
pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM.as_ref(),
            mint.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM,
    )
    .0
}

/// Decode a metadata account
pub fn decode_metadata(data: &[u8]) -> Result<TokenMetadata> {
    let head: MetadataHead = BorshDeserialize::deserialize(&mut &data[..])
        .map_err(|e| Error::AccountDecode(format!("token metadata: {}", e)))?;

    // strings are zero-padded to fixed width on-chain
    let clean = |s: String| s.trim_end_matches('\0').trim().to_string();

    Ok(TokenMetadata {
        mint: head.mint,
        update_authority: head.update_authority,
        name: clean(head.name),
        symbol: clean(head.symbol),
        uri: clean(head.uri),
        is_mutable: head.is_mutable,
    })
}
