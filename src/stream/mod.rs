//! Stream module - program-account subscriptions and pool discovery
//!
//! Two subscriptions feed one channel:
//! - Raydium AMM v4 pools paired with the configured quote mint
//! - OpenBook markets quoted in the same mint

pub mod discovery;
pub mod subscription;

pub use discovery::{PoolDiscoveryFeed, ReadyPool};
pub use subscription::{AccountUpdate, FeedEvent, ProgramSubscription, StreamKind, SubscriptionClient};
