// cdp-core: collateralized debt positions with lazy earmark/redemption decay.
// protocol-wide earmarks and redemptions only move global weights. a position
// catches up in O(1) the next time it is touched, no matter how many
// positions exist.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: PositionId, AccountId, BlockNumber, Ratio, Bps
//   2.x  decay/: Q128.128 weights, survival fractions, log2/exp2
//   3.x  ledger.rs: global debt counters and weight accumulators
//   4.x  sync.rs: pure settlement of one position against the ledger
//   5.x  position.rs: position struct, debt reduction, views
//   6.x  lock.rs: collateral lock accounting for mint/burn
//   6.5  liquidation.rs: liquidation sizing, fee reserve
//   7.x  config.rs: ratios, fees, env presets
//   8.x  engine/: core engine: deposits, debt, earmark, redeem, liquidations
//   9.x  external.rs: vault, redemption authority, registry, debt token (+ mocks)
//   11.x events.rs: state transition events for audit

// decay accounting
pub mod decay;
pub mod ledger;
pub mod position;
pub mod sync;
pub mod types;

// debt and risk
pub mod liquidation;
pub mod lock;

// engine and integration
pub mod config;
pub mod engine;
pub mod events;
pub mod external;

// re exports for convenience
pub use config::{ConfigError, Environment, ProtocolConfig, ProtocolParams};
pub use decay::{
    scale_by_weight_delta, survival_from_weight, survival_or_one, weight_increment, Accumulator, Fraction, Weight, U256,
};
pub use engine::*;
pub use events::*;
pub use external::{
    Collaborators, DebtToken, MockAuthority, MockCollaborators, MockDebtToken, MockRegistry, MockVault,
    PositionRegistry, RedemptionAuthority, TokenError, YieldVault,
};
pub use ledger::{GlobalLedger, WeightSnapshot, EPOCH_WEIGHT_SPAN};
pub use liquidation::{calculate_liquidation, FeeReserve, LiquidationQuote};
pub use lock::LockError;
pub use position::{Position, PositionView, ReducedDebt};
pub use sync::{settle, Settlement};
pub use types::*;
