//! Position tracking and automated exits

pub mod exit_monitor;
pub mod store;

pub use exit_monitor::{evaluate_tick, ExitMonitor, ExitPolicy, ExitThresholds, MonitorOutcome, SellReason, TickDecision};
pub use store::{OrderCounter, PositionStatus, PositionStore, TrackedPosition};
