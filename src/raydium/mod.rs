//! Raydium AMM v4 / OpenBook protocol bindings
//!
//! Account layouts, program ids and the swap-instruction builder.

pub mod layout;
pub mod metadata;
pub mod mint;
pub mod program;
pub mod swap;

pub use layout::{LiquidityStateV4, MarketStateV3};
pub use swap::{PoolKeys, RaydiumSwapBuilder, SwapInstructionBuilder, SwapInstructions};
