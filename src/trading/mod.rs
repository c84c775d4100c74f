//! Trading module - transaction assembly and swap execution

pub mod executor;
pub mod transaction;

pub use executor::{Fill, Side, TradeExecutor};
pub use transaction::TransactionAssembler;

#[cfg(test)]
pub(crate) use executor::testing;
