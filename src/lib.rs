//! Raydium Sniper Bot Library
//!
//! Watches Raydium AMM v4 for newly opened pools, screens them with on-chain
//! and off-chain risk checks, buys the ones that pass and sells them on
//! take-profit, stop-loss or liquidity removal.

pub mod chain;
pub mod cli;
pub mod config;
pub mod dexscreener;
pub mod error;
pub mod filter;
pub mod notify;
pub mod orchestrator;
pub mod position;
pub mod price;
pub mod raydium;
pub mod retry;
pub mod snipe_list;
pub mod stream;
pub mod trading;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
