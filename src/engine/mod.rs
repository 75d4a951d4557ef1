// 8.0: core engine. owns the global ledger and every position, and runs each
// entry point as earmark -> sync -> mutate inside one atomic transaction.
// deterministic: all time is block numbers handed in by the caller.

mod config;
mod core;
mod debt;
mod earmark;
mod liquidations;
mod results;
mod shared;
mod sync;
mod valuation;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{EngineError, LiquidationResult, RedemptionResult, RepayResult};
pub use shared::SharedEngine;
