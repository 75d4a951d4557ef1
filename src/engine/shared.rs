//! Thread-safe handle around [`Engine`].
//!
//! Every call takes the one lock for its whole duration, so operations from
//! different threads are serialized and each sees a fully committed state.

use super::core::Engine;
use super::results::{EngineError, LiquidationResult, RedemptionResult, RepayResult};
use crate::position::PositionView;
use crate::types::{AccountId, PositionId};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self { inner: Arc::new(Mutex::new(engine)) }
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with<T>(&self, f: impl FnOnce(&mut Engine) -> T) -> T {
        f(&mut *self.inner.lock())
    }

    pub fn deposit(&self, caller: AccountId, shares: u128, target: Option<PositionId>) -> Result<PositionId, EngineError> {
        self.inner.lock().deposit(caller, shares, target)
    }

    pub fn withdraw(&self, caller: AccountId, id: PositionId, shares: u128) -> Result<u128, EngineError> {
        self.inner.lock().withdraw(caller, id, shares)
    }

    pub fn mint(&self, caller: AccountId, id: PositionId, amount: u128, recipient: AccountId) -> Result<u128, EngineError> {
        self.inner.lock().mint(caller, id, amount, recipient)
    }

    pub fn burn(&self, caller: AccountId, id: PositionId, amount: u128) -> Result<u128, EngineError> {
        self.inner.lock().burn(caller, id, amount)
    }

    pub fn repay(&self, caller: AccountId, id: PositionId, shares: u128) -> Result<RepayResult, EngineError> {
        self.inner.lock().repay(caller, id, shares)
    }

    pub fn earmark(&self) -> Result<u128, EngineError> {
        self.inner.lock().earmark()
    }

    pub fn redeem(&self, caller: AccountId, amount: u128) -> Result<RedemptionResult, EngineError> {
        self.inner.lock().redeem(caller, amount)
    }

    pub fn liquidate(&self, caller: AccountId, id: PositionId) -> Result<LiquidationResult, EngineError> {
        self.inner.lock().liquidate(caller, id)
    }

    pub fn poke(&self, id: PositionId) -> Result<(), EngineError> {
        self.inner.lock().poke(id)
    }

    /// Settled view of a position. Reads only, nothing is committed.
    pub fn quote(&self, id: PositionId) -> Result<PositionView, EngineError> {
        self.inner.lock().get_position_view(id)
    }

    pub fn advance_block(&self, blocks: u64) {
        self.inner.lock().advance_block(blocks);
    }
}
