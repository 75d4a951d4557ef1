// 8.0 engine/core.rs: main engine. holds the ledger, positions, collaborators.
// 8.1 transact() gives every entry point all-or-nothing semantics: state is
// snapshotted up front, external effects and events are queued and only
// released once the operation returns Ok. two calls run inline instead: the
// registry mint that hands out a new id and the debt-token burn whose failure
// must abort. each is the last fallible step of its operation.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::config::ProtocolParams;
use crate::events::{DepositEvent, Event, EventId, EventPayload, PositionOpenedEvent, WithdrawEvent};
use crate::external::{Collaborators, DebtToken, MockCollaborators, PositionRegistry, RedemptionAuthority, YieldVault};
use crate::ledger::GlobalLedger;
use crate::liquidation::FeeReserve;
use crate::position::Position;
use crate::types::{AccountId, BlockNumber, PositionId};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Outbound transfers, applied only when an operation commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Effect {
    Shares { to: AccountId, shares: u128 },
    SharesToAuthority(u128),
    Underlying { to: AccountId, amount: u128 },
    MintDebt { to: AccountId, amount: u128 },
}

// state restored when an operation fails
struct Checkpoint {
    ledger: GlobalLedger,
    positions: Vec<(PositionId, Position)>,
    deposited_shares: u128,
    protocol_fees_collected: u128,
    fee_reserve: FeeReserve,
}

/** 8.1: main engine struct. all state lives here */
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) params: ProtocolParams,
    pub(super) ledger: GlobalLedger,
    pub(super) positions: HashMap<PositionId, Position>,
    pub(super) vault: Box<dyn YieldVault>,
    pub(super) authority: Box<dyn RedemptionAuthority>,
    pub(super) registry: Box<dyn PositionRegistry>,
    pub(super) debt_token: Box<dyn DebtToken>,
    pub(super) fee_reserve: FeeReserve,
    // vault shares held on behalf of all positions
    pub(super) deposited_shares: u128,
    pub(super) protocol_fees_collected: u128,
    pub(super) share_payouts: HashMap<AccountId, u128>,
    pub(super) underlying_payouts: HashMap<AccountId, u128>,
    pub(super) pending_effects: Vec<Effect>,
    pub(super) pending_events: Vec<EventPayload>,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_block: BlockNumber,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("block", &self.current_block)
            .field("ledger", &self.ledger)
            .field("positions", &self.positions.len())
            .field("deposited_shares", &self.deposited_shares)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self, EngineError> {
        let params = config.protocol.resolve()?;
        let genesis = config.genesis_block;
        let mut ledger = GlobalLedger::new(genesis);
        ledger.last_authority_balance = collaborators.authority.collateral_balance();

        info!(
            block = %genesis,
            minimum_collateralization = %params.minimum_collateralization,
            lower_bound = %params.collateralization_lower_bound,
            "engine: initialized"
        );

        Ok(Self {
            config,
            params,
            ledger,
            positions: HashMap::new(),
            vault: collaborators.vault,
            authority: collaborators.authority,
            registry: collaborators.registry,
            debt_token: collaborators.debt_token,
            fee_reserve: FeeReserve::default(),
            deposited_shares: 0,
            protocol_fees_collected: 0,
            share_payouts: HashMap::new(),
            underlying_payouts: HashMap::new(),
            pending_effects: Vec::new(),
            pending_events: Vec::new(),
            events: Vec::new(),
            next_event_id: 1,
            current_block: genesis,
        })
    }

    /// Engine wired to fresh in-memory mocks, plus handles to them.
    pub fn with_mocks(config: EngineConfig) -> Result<(Self, MockCollaborators), EngineError> {
        let mocks = MockCollaborators::new();
        let engine = Self::new(config, mocks.boxed())?;
        Ok((engine, mocks))
    }

    pub fn set_block(&mut self, block: BlockNumber) {
        self.current_block = block;
    }

    pub fn block(&self) -> BlockNumber {
        self.current_block
    }

    pub fn advance_block(&mut self, blocks: u64) {
        self.current_block = BlockNumber(self.current_block.0 + blocks);
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    pub fn ledger(&self) -> &GlobalLedger {
        &self.ledger
    }

    /// Stored state as of the last touch. Use `get_position_view` for the
    /// settled values.
    pub fn get_position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn positions_iter(&self) -> impl Iterator<Item = (&PositionId, &Position)> {
        self.positions.iter()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn deposited_shares(&self) -> u128 {
        self.deposited_shares
    }

    pub fn protocol_fees_collected(&self) -> u128 {
        self.protocol_fees_collected
    }

    pub fn shares_paid_to(&self, account: AccountId) -> u128 {
        self.share_payouts.get(&account).copied().unwrap_or(0)
    }

    pub fn underlying_paid_to(&self, account: AccountId) -> u128 {
        self.underlying_payouts.get(&account).copied().unwrap_or(0)
    }

    pub fn fee_reserve_balance(&self) -> u128 {
        self.fee_reserve.balance
    }

    pub fn fund_fee_reserve(&mut self, amount: u128) {
        self.fee_reserve.deposit(amount);
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // 8.2: collateral in. `None` opens a new position for the caller.
    pub fn deposit(
        &mut self,
        caller: AccountId,
        shares: u128,
        target: Option<PositionId>,
    ) -> Result<PositionId, EngineError> {
        if shares == 0 {
            return Err(EngineError::ZeroAmount);
        }
        if let Some(id) = target {
            self.ensure_exists(id)?;
        }

        let touched: Vec<PositionId> = target.into_iter().collect();
        self.transact(&touched, |engine| {
            let deposited = engine
                .deposited_shares
                .checked_add(shares)
                .ok_or(EngineError::AmountOverflow)?;

            engine.apply_earmark();
            let (id, new_collateral) = match target {
                Some(id) => {
                    engine.sync_position(id)?;
                    let block = engine.current_block;
                    let position = engine.require_mut(id)?;
                    position.collateral += shares;
                    position.updated_at = block;
                    (id, position.collateral)
                }
                None => (engine.open_position(caller, shares), shares),
            };
            engine.deposited_shares = deposited;

            engine.emit_event(EventPayload::Deposit(DepositEvent {
                position_id: id,
                shares,
                new_collateral,
            }));
            debug!(position = %id, shares, new_collateral, "deposit: credited");
            Ok(id)
        })
    }

    // 8.3: collateral out, limited to what the current debt leaves free
    pub fn withdraw(&mut self, caller: AccountId, id: PositionId, shares: u128) -> Result<u128, EngineError> {
        if shares == 0 {
            return Err(EngineError::ZeroAmount);
        }
        self.ensure_owner(caller, id)?;

        self.transact(&[id], |engine| {
            engine.apply_earmark();
            engine.sync_position(id)?;

            let locked = engine.lock_for_debt(engine.require(id)?.debt)?;
            let block = engine.current_block;
            let position = engine.require_mut(id)?;
            let available = position.free_collateral(locked);
            if shares > available {
                return Err(EngineError::Undercollateralized {
                    position: id,
                    requested: shares,
                    available,
                });
            }

            position.collateral -= shares;
            position.updated_at = block;
            let new_collateral = position.collateral;
            engine.deposited_shares = engine.deposited_shares.saturating_sub(shares);
            engine.queue(Effect::Shares { to: caller, shares });

            engine.emit_event(EventPayload::Withdraw(WithdrawEvent {
                position_id: id,
                recipient: caller,
                shares,
                new_collateral,
            }));
            debug!(position = %id, shares, new_collateral, "withdraw: released");
            Ok(new_collateral)
        })
    }

    // registry ids are never handed back, so nothing after this may fail
    fn open_position(&mut self, owner: AccountId, collateral: u128) -> PositionId {
        let id = self.registry.mint(owner);
        let mut position = Position::new(id, self.ledger.snapshot(), self.current_block);
        position.collateral = collateral;
        self.positions.insert(id, position);
        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent { position_id: id, owner }));
        id
    }

    pub(super) fn ensure_exists(&self, id: PositionId) -> Result<(), EngineError> {
        if !id.is_valid() {
            return Err(EngineError::InvalidPositionId(id));
        }
        if !self.positions.contains_key(&id) {
            return Err(EngineError::PositionNotFound(id));
        }
        Ok(())
    }

    pub(super) fn ensure_owner(&self, caller: AccountId, id: PositionId) -> Result<(), EngineError> {
        self.ensure_exists(id)?;
        if self.registry.owner_of(id) != Some(caller) {
            return Err(EngineError::NotOwner { position: id, caller });
        }
        Ok(())
    }

    pub(super) fn require(&self, id: PositionId) -> Result<&Position, EngineError> {
        self.positions.get(&id).ok_or(EngineError::PositionNotFound(id))
    }

    pub(super) fn require_mut(&mut self, id: PositionId) -> Result<&mut Position, EngineError> {
        self.positions.get_mut(&id).ok_or(EngineError::PositionNotFound(id))
    }

    // 8.1: run `op` atomically over the ledger and the `touched` positions
    pub(super) fn transact<T>(
        &mut self,
        touched: &[PositionId],
        op: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let checkpoint = Checkpoint {
            ledger: self.ledger.clone(),
            positions: touched
                .iter()
                .filter_map(|id| self.positions.get(id).map(|p| (*id, p.clone())))
                .collect(),
            deposited_shares: self.deposited_shares,
            protocol_fees_collected: self.protocol_fees_collected,
            fee_reserve: self.fee_reserve.clone(),
        };

        match op(self) {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(err) => {
                self.rollback(checkpoint);
                debug!(error = %err, block = %self.current_block, "engine: rolled back");
                Err(err)
            }
        }
    }

    fn commit(&mut self) {
        for effect in std::mem::take(&mut self.pending_effects) {
            match effect {
                Effect::Shares { to, shares } => {
                    *self.share_payouts.entry(to).or_default() += shares;
                }
                Effect::SharesToAuthority(shares) => self.authority.receive_collateral(shares),
                Effect::Underlying { to, amount } => {
                    *self.underlying_payouts.entry(to).or_default() += amount;
                }
                Effect::MintDebt { to, amount } => self.debt_token.mint(to, amount),
            }
        }
        for payload in std::mem::take(&mut self.pending_events) {
            self.record_event(payload);
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.ledger = checkpoint.ledger;
        for (id, position) in checkpoint.positions {
            self.positions.insert(id, position);
        }
        self.deposited_shares = checkpoint.deposited_shares;
        self.protocol_fees_collected = checkpoint.protocol_fees_collected;
        self.fee_reserve = checkpoint.fee_reserve;
        self.pending_effects.clear();
        self.pending_events.clear();
    }

    pub(super) fn queue(&mut self, effect: Effect) {
        self.pending_effects.push(effect);
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        self.pending_events.push(payload);
    }

    fn record_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_block, payload);
        self.next_event_id += 1;

        debug!(id = event.id.0, block = %event.block, payload = ?event.payload, "engine: event");

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;

    fn engine() -> (Engine, MockCollaborators) {
        Engine::with_mocks(EngineConfig::default()).unwrap()
    }

    #[test]
    fn deposit_opens_sequential_positions() {
        let (mut engine, mocks) = engine();
        let first = engine.deposit(AccountId(1), 1_000, None).unwrap();
        let second = engine.deposit(AccountId(2), 500, None).unwrap();

        assert_eq!(first, PositionId(1));
        assert_eq!(second, PositionId(2));
        assert_eq!(mocks.registry.owner_of(second), Some(AccountId(2)));
        assert_eq!(engine.deposited_shares(), 1_500);
        assert_eq!(engine.events().len(), 4);
    }

    #[test]
    fn deposit_into_existing_position() {
        let (mut engine, _) = engine();
        let id = engine.deposit(AccountId(1), 1_000, None).unwrap();
        engine.deposit(AccountId(9), 250, Some(id)).unwrap();
        assert_eq!(engine.get_position(id).unwrap().collateral, 1_250);
    }

    #[test]
    fn deposit_rejects_bad_input() {
        let (mut engine, _) = engine();
        assert_eq!(engine.deposit(AccountId(1), 0, None), Err(EngineError::ZeroAmount));
        assert_eq!(
            engine.deposit(AccountId(1), 10, Some(PositionId(0))),
            Err(EngineError::InvalidPositionId(PositionId(0)))
        );
        assert_eq!(
            engine.deposit(AccountId(1), 10, Some(PositionId(4))),
            Err(EngineError::PositionNotFound(PositionId(4)))
        );
    }

    #[test]
    fn failed_deposit_leaves_no_position() {
        let (mut engine, _) = engine();
        engine.deposit(AccountId(1), u128::MAX, None).unwrap();
        assert_eq!(engine.deposit(AccountId(2), 1, None), Err(EngineError::AmountOverflow));

        assert_eq!(engine.position_count(), 1);
        assert_eq!(engine.events().len(), 2);
        // no registry id was spent on the failed call
        engine.withdraw(AccountId(1), PositionId(1), 10).unwrap();
        assert_eq!(engine.deposit(AccountId(2), 1, None), Ok(PositionId(2)));
    }

    #[test]
    fn withdraw_requires_owner() {
        let (mut engine, _) = engine();
        let id = engine.deposit(AccountId(1), 1_000, None).unwrap();
        assert_eq!(
            engine.withdraw(AccountId(2), id, 10),
            Err(EngineError::NotOwner { position: id, caller: AccountId(2) })
        );

        assert_eq!(engine.withdraw(AccountId(1), id, 400), Ok(600));
        assert_eq!(engine.shares_paid_to(AccountId(1)), 400);
    }

    #[test]
    fn events_are_bounded() {
        let config = EngineConfig { max_events: 3, ..EngineConfig::default() };
        let (mut engine, _) = Engine::with_mocks(config).unwrap();
        for _ in 0..5 {
            engine.deposit(AccountId(1), 10, None).unwrap();
        }
        assert_eq!(engine.events().len(), 3);
        assert_eq!(engine.recent_events(1)[0].id, EventId(10));
    }
}
