//! Blockchain collaborator
//!
//! Everything the bot asks of a Solana node goes through [`ChainClient`], so
//! filters, the executor and the exit monitor can run against
//! [`testing::MockChain`] in unit tests.

mod rpc;
#[cfg(test)]
pub mod testing;

pub use rpc::RpcChainClient;

use async_trait::async_trait;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use crate::error::Result;

/// Token amount as reported by the node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenAmount {
    pub amount: u64,
    pub decimals: u8,
    /// Absent when the node could not compute it
    pub ui_amount: Option<f64>,
}

impl TokenAmount {
    pub fn new(amount: u64, decimals: u8) -> Self {
        Self {
            amount,
            decimals,
            ui_amount: Some(crate::raydium::mint::to_ui_amount(amount, decimals)),
        }
    }
}

/// Entry from `getTokenLargestAccounts`
#[derive(Debug, Clone, PartialEq)]
pub struct LargestHolder {
    /// Token account (not the wallet that owns it)
    pub address: Pubkey,
    pub amount: TokenAmount,
}

/// SPL token account owned by the wallet
#[derive(Debug, Clone, PartialEq)]
pub struct WalletTokenAccount {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
}

/// Outcome of waiting on a signature
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// Landed without error at the configured commitment
    Confirmed,
    /// Landed, but the program returned an error
    Failed(String),
    /// The blockhash expired before the transaction landed
    Expired,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Point-in-time account read; `None` if the account does not exist
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>>;

    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>>;

    async fn get_token_account_balance(&self, address: &Pubkey) -> Result<TokenAmount>;

    async fn get_token_largest_accounts(&self, mint: &Pubkey) -> Result<Vec<LargestHolder>>;

    async fn get_token_supply(&self, mint: &Pubkey) -> Result<TokenAmount>;

    /// All SPL token accounts owned by `owner`
    async fn get_wallet_token_accounts(&self, owner: &Pubkey) -> Result<Vec<WalletTokenAccount>>;

    /// Latest blockhash and the last block height it is valid for
    async fn get_latest_blockhash(&self) -> Result<(Hash, u64)>;

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature>;

    /// Wait until `signature` lands or `last_valid_block_height` passes
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        last_valid_block_height: u64,
    ) -> Result<Confirmation>;
}
