//! Position registry and the concurrent-position cap
//!
//! Both are shared by every buy handler and exit monitor, so the map is a
//! `DashMap` and the counter an atomic. A monitor only ever writes the
//! entry of its own position.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::chain::WalletTokenAccount;
use crate::error::{Error, Result};
use crate::raydium::PoolKeys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    /// Held and being watched
    Open,
    /// A sell is in flight
    Selling,
    /// Sell retries exhausted; left for manual handling
    NeedsAttention,
}

/// A held token, created the moment its buy confirms
#[derive(Debug, Clone)]
pub struct TrackedPosition {
    pub mint: Pubkey,
    pub token_account: Pubkey,
    pub keys: PoolKeys,
    /// Raw token amount received
    pub token_amount: u64,
    /// USD per whole token at entry; `None` if the fill could not be priced
    pub entry_price: Option<f64>,
    /// Quote units spent
    pub quote_spent: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_signature: String,
    pub status: PositionStatus,
}

#[derive(Default)]
pub struct PositionStore {
    positions: DashMap<Pubkey, TrackedPosition>,
    /// Every known wallet token account by mint, including non-positions
    accounts: DashMap<Pubkey, Pubkey>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the wallet's existing token accounts
    pub fn seed_wallet_accounts(&self, accounts: &[WalletTokenAccount]) {
        for account in accounts {
            self.accounts.insert(account.mint, account.address);
        }
        debug!("Seeded {} wallet token accounts", accounts.len());
    }

    pub fn token_account(&self, mint: &Pubkey) -> Option<Pubkey> {
        self.accounts.get(mint).map(|a| *a)
    }

    /// Insert a new position. Returns `false` if one for the same mint is
    /// already tracked.
    pub fn insert(&self, position: TrackedPosition) -> bool {
        let mint = position.mint;
        let token_account = position.token_account;
        match self.positions.entry(mint) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(position);
                self.accounts.insert(mint, token_account);
                info!("Tracking position in {}", mint);
                true
            }
        }
    }

    pub fn contains(&self, mint: &Pubkey) -> bool {
        self.positions.contains_key(mint)
    }

    pub fn get(&self, mint: &Pubkey) -> Option<TrackedPosition> {
        self.positions.get(mint).map(|p| p.clone())
    }

    pub fn set_status(&self, mint: &Pubkey, status: PositionStatus) -> Result<()> {
        let mut position = self
            .positions
            .get_mut(mint)
            .ok_or_else(|| Error::PositionNotFound(mint.to_string()))?;
        position.status = status;
        Ok(())
    }

    /// Fix the entry price of a position that was bought without one
    pub fn set_entry_price(&self, mint: &Pubkey, price: f64) -> Result<()> {
        let mut position = self
            .positions
            .get_mut(mint)
            .ok_or_else(|| Error::PositionNotFound(mint.to_string()))?;
        position.entry_price = Some(price);
        Ok(())
    }

    pub fn remove(&self, mint: &Pubkey) -> Option<TrackedPosition> {
        let removed = self.positions.remove(mint).map(|(_, p)| p);
        if removed.is_some() {
            self.accounts.remove(mint);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn needs_attention(&self) -> Vec<TrackedPosition> {
        self.positions
            .iter()
            .filter(|p| p.status == PositionStatus::NeedsAttention)
            .map(|p| p.clone())
            .collect()
    }
}

/// Caps simultaneously open positions.
///
/// A slot is reserved before a buy is sent and released when the buy fails
/// or the position is sold, so concurrent buys can never overshoot the cap.
#[derive(Debug)]
pub struct OrderCounter {
    open: AtomicUsize,
    cap: usize,
}

impl OrderCounter {
    pub fn new(cap: usize) -> Self {
        Self {
            open: AtomicUsize::new(0),
            cap,
        }
    }

    /// Take a slot if one is free
    pub fn try_reserve(&self) -> bool {
        self.open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < self.cap).then_some(open + 1)
            })
            .is_ok()
    }

    pub fn release(&self) {
        let _ = self
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| open.checked_sub(1));
    }

    pub fn current(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::raydium::program::WSOL_MINT;
    use std::sync::Arc;

    #[test]
    fn test_insert_is_once_per_mint() {
        let store = PositionStore::new();
        let mint = Pubkey::new_unique();

        assert!(store.insert(fixtures::position(mint, *WSOL_MINT, Some(1.0))));
        assert!(!store.insert(fixtures::position(mint, *WSOL_MINT, Some(2.0))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&mint).unwrap().entry_price, Some(1.0));
    }

    #[test]
    fn test_status_and_remove() {
        let store = PositionStore::new();
        let mint = Pubkey::new_unique();
        let position = fixtures::position(mint, *WSOL_MINT, None);
        let token_account = position.token_account;
        store.insert(position);

        assert_eq!(store.token_account(&mint), Some(token_account));
        store.set_status(&mint, PositionStatus::NeedsAttention).unwrap();
        assert_eq!(store.needs_attention().len(), 1);

        assert!(store.remove(&mint).is_some());
        assert!(store.token_account(&mint).is_none());
        assert!(matches!(
            store.set_status(&mint, PositionStatus::Open),
            Err(Error::PositionNotFound(_))
        ));
    }

    #[test]
    fn test_seed_wallet_accounts() {
        let store = PositionStore::new();
        let mint = Pubkey::new_unique();
        let address = Pubkey::new_unique();
        store.seed_wallet_accounts(&[WalletTokenAccount {
            address,
            mint,
            amount: 5,
        }]);

        assert_eq!(store.token_account(&mint), Some(address));
        assert!(!store.contains(&mint));
    }

    #[test]
    fn test_counter_respects_cap() {
        let counter = OrderCounter::new(2);

        assert!(counter.try_reserve());
        assert!(counter.try_reserve());
        assert!(!counter.try_reserve());
        assert_eq!(counter.current(), counter.cap());

        counter.release();
        assert_eq!(counter.current(), 1);
        assert!(counter.try_reserve());
    }

    #[test]
    fn test_counter_release_never_underflows() {
        let counter = OrderCounter::new(1);
        counter.release();
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_counter_concurrent_reservations() {
        let counter = Arc::new(OrderCounter::new(3));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || counter.try_reserve())
            })
            .collect();

        let reserved = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(reserved, 3);
        assert_eq!(counter.current(), 3);
    }
}
