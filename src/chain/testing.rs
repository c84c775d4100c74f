//! In-memory [`ChainClient`] for unit tests

use async_trait::async_trait;
use dashmap::DashMap;
use solana_sdk::account::Account;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ChainClient, Confirmation, LargestHolder, TokenAmount, WalletTokenAccount};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct MockChain {
    pub accounts: DashMap<Pubkey, Account>,
    pub balances: DashMap<Pubkey, TokenAmount>,
    pub largest: DashMap<Pubkey, Vec<LargestHolder>>,
    pub supplies: DashMap<Pubkey, TokenAmount>,
    pub wallet_accounts: Mutex<Vec<WalletTokenAccount>>,
    pub sent: Mutex<Vec<VersionedTransaction>>,
    /// Scripted confirmation results; `Confirmed` once exhausted
    pub confirmations: Mutex<VecDeque<Confirmation>>,
    /// Number of upcoming sends that fail at submission
    pub send_failures: AtomicUsize,
    /// Every read fails with an RPC error while set
    pub rpc_down: AtomicBool,
    pub balance_calls: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_account(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.accounts.insert(
            address,
            Account {
                lamports: 1_000_000,
                data,
                owner,
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    pub fn set_balance(&self, token_account: Pubkey, amount: u64, decimals: u8) {
        self.balances
            .insert(token_account, TokenAmount::new(amount, decimals));
    }

    pub fn push_confirmation(&self, confirmation: Confirmation) {
        self.confirmations.lock().unwrap().push_back(confirmation);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn check_up(&self) -> Result<()> {
        if self.rpc_down.load(Ordering::SeqCst) {
            Err(Error::Rpc("mock rpc down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        self.check_up()?;
        Ok(self.accounts.get(address).map(|a| a.clone()))
    }

    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>> {
        self.check_up()?;
        Ok(addresses
            .iter()
            .map(|a| self.accounts.get(a).map(|a| a.clone()))
            .collect())
    }

    async fn get_token_account_balance(&self, address: &Pubkey) -> Result<TokenAmount> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;
        self.balances
            .get(address)
            .map(|b| *b)
            .ok_or_else(|| Error::AccountNotFound(address.to_string()))
    }

    async fn get_token_largest_accounts(&self, mint: &Pubkey) -> Result<Vec<LargestHolder>> {
        self.check_up()?;
        self.largest
            .get(mint)
            .map(|h| h.clone())
            .ok_or_else(|| Error::AccountNotFound(mint.to_string()))
    }

    async fn get_token_supply(&self, mint: &Pubkey) -> Result<TokenAmount> {
        self.check_up()?;
        self.supplies
            .get(mint)
            .map(|s| *s)
            .ok_or_else(|| Error::AccountNotFound(mint.to_string()))
    }

    async fn get_wallet_token_accounts(&self, _owner: &Pubkey) -> Result<Vec<WalletTokenAccount>> {
        self.check_up()?;
        Ok(self.wallet_accounts.lock().unwrap().clone())
    }

    async fn get_latest_blockhash(&self) -> Result<(Hash, u64)> {
        self.check_up()?;
        Ok((Hash::new_unique(), 1_000))
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        let pending = self.send_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.send_failures.store(pending - 1, Ordering::SeqCst);
            return Err(Error::TransactionSend("mock send failure".to_string()));
        }
        self.sent.lock().unwrap().push(transaction.clone());
        Ok(transaction.signatures.first().copied().unwrap_or_default())
    }

    async fn confirm_transaction(
        &self,
        _signature: &Signature,
        _last_valid_block_height: u64,
    ) -> Result<Confirmation> {
        Ok(self
            .confirmations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Confirmation::Confirmed))
    }
}
