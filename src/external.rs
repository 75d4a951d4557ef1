// 9.0: external collaborators. the engine only sees these traits.
// 9.1 in-memory mocks keep their state behind Arc<Mutex> so a test can hold a
// handle while the engine owns a boxed clone.

use crate::decay::mul_div;
use crate::types::{AccountId, BlockNumber, PositionId, Ratio, FIXED_POINT_SCALAR};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Share-based yield vault valuation.
pub trait YieldVault: Send {
    fn convert_to_assets(&self, shares: u128) -> u128;
    fn convert_to_shares(&self, assets: u128) -> u128;
}

/// The account that drives redemptions and reports redemption demand.
pub trait RedemptionAuthority: Send {
    /// Redemption demand that came due in `start..=end`, in debt units.
    fn query_graph(&self, start: BlockNumber, end: BlockNumber) -> u128;
    /// Vault shares the authority currently holds.
    fn collateral_balance(&self) -> u128;
    fn receive_collateral(&mut self, shares: u128);
}

/// Position identity. Missing ids answer `None`, never an error.
pub trait PositionRegistry: Send {
    fn mint(&mut self, owner: AccountId) -> PositionId;
    fn owner_of(&self, id: PositionId) -> Option<AccountId>;
}

/// Synthetic debt token.
pub trait DebtToken: Send {
    fn mint(&mut self, to: AccountId, amount: u128);
    fn burn(&mut self, from: AccountId, amount: u128) -> Result<(), TokenError>;
    fn balance_of(&self, account: AccountId) -> u128;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("{account} holds {balance}, needs {required}")]
    InsufficientBalance { account: AccountId, balance: u128, required: u128 },
}

/// Everything the engine talks to outside its own state.
pub struct Collaborators {
    pub vault: Box<dyn YieldVault>,
    pub authority: Box<dyn RedemptionAuthority>,
    pub registry: Box<dyn PositionRegistry>,
    pub debt_token: Box<dyn DebtToken>,
}

// 9.1: mocks

/// Handles to a full set of mocks sharing state with the boxed copies.
#[derive(Debug, Clone, Default)]
pub struct MockCollaborators {
    pub vault: MockVault,
    pub authority: MockAuthority,
    pub registry: MockRegistry,
    pub debt_token: MockDebtToken,
}

impl MockCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Collaborators {
        Collaborators {
            vault: Box::new(self.vault.clone()),
            authority: Box::new(self.authority.clone()),
            registry: Box::new(self.registry.clone()),
            debt_token: Box::new(self.debt_token.clone()),
        }
    }
}

/// Vault with a settable share price (assets per share, 1e18 scaled).
#[derive(Debug, Clone)]
pub struct MockVault {
    price: Arc<Mutex<Ratio>>,
}

impl MockVault {
    pub fn new(share_price: Ratio) -> Self {
        Self { price: Arc::new(Mutex::new(share_price)) }
    }

    pub fn set_share_price(&self, share_price: Ratio) {
        *self.price.lock() = share_price;
    }

    pub fn share_price(&self) -> Ratio {
        *self.price.lock()
    }
}

impl Default for MockVault {
    fn default() -> Self {
        Self::new(Ratio::ONE)
    }
}

impl YieldVault for MockVault {
    fn convert_to_assets(&self, shares: u128) -> u128 {
        let price = self.price.lock().scaled();
        mul_div(shares, price, FIXED_POINT_SCALAR).unwrap_or(u128::MAX)
    }

    fn convert_to_shares(&self, assets: u128) -> u128 {
        let price = self.price.lock().scaled();
        // a worthless share has no meaningful conversion
        mul_div(assets, FIXED_POINT_SCALAR, price).unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct AuthorityState {
    // demand per block
    schedule: BTreeMap<BlockNumber, u128>,
    balance: u128,
}

/// Redemption authority with a scripted demand schedule.
#[derive(Debug, Clone, Default)]
pub struct MockAuthority {
    state: Arc<Mutex<AuthorityState>>,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_demand(&self, block: BlockNumber, amount: u128) {
        *self.state.lock().schedule.entry(block).or_default() += amount;
    }

    /// Shares that reach the authority outside the engine.
    pub fn add_cover(&self, shares: u128) {
        self.state.lock().balance += shares;
    }

    /// Shares leaving the authority, e.g. paid to redeemers.
    pub fn withdraw(&self, shares: u128) -> u128 {
        let mut state = self.state.lock();
        let taken = shares.min(state.balance);
        state.balance -= taken;
        taken
    }

    pub fn balance(&self) -> u128 {
        self.state.lock().balance
    }
}

impl RedemptionAuthority for MockAuthority {
    fn query_graph(&self, start: BlockNumber, end: BlockNumber) -> u128 {
        if start > end {
            return 0;
        }
        self.state.lock().schedule.range(start..=end).map(|(_, amount)| *amount).sum()
    }

    fn collateral_balance(&self) -> u128 {
        self.state.lock().balance
    }

    fn receive_collateral(&mut self, shares: u128) {
        self.state.lock().balance += shares;
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    last_id: u64,
    owners: HashMap<PositionId, AccountId>,
}

/// Sequential ids starting at 1.
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transfer(&self, id: PositionId, to: AccountId) -> bool {
        match self.state.lock().owners.get_mut(&id) {
            Some(owner) => {
                *owner = to;
                true
            }
            None => false,
        }
    }
}

impl PositionRegistry for MockRegistry {
    fn mint(&mut self, owner: AccountId) -> PositionId {
        let mut state = self.state.lock();
        state.last_id += 1;
        let id = PositionId(state.last_id);
        state.owners.insert(id, owner);
        id
    }

    fn owner_of(&self, id: PositionId) -> Option<AccountId> {
        self.state.lock().owners.get(&id).copied()
    }
}

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<AccountId, u128>,
    total_supply: u128,
}

#[derive(Debug, Clone, Default)]
pub struct MockDebtToken {
    state: Arc<Mutex<TokenState>>,
}

impl MockDebtToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> u128 {
        self.state.lock().total_supply
    }

    /// Moves tokens between holders, e.g. to set up a third-party burn.
    pub fn transfer(&self, from: AccountId, to: AccountId, amount: u128) -> Result<(), TokenError> {
        let mut state = self.state.lock();
        let balance = state.balances.get(&from).copied().unwrap_or(0);
        if balance < amount {
            return Err(TokenError::InsufficientBalance { account: from, balance, required: amount });
        }
        state.balances.insert(from, balance - amount);
        *state.balances.entry(to).or_default() += amount;
        Ok(())
    }
}

impl DebtToken for MockDebtToken {
    fn mint(&mut self, to: AccountId, amount: u128) {
        let mut state = self.state.lock();
        *state.balances.entry(to).or_default() += amount;
        state.total_supply += amount;
    }

    fn burn(&mut self, from: AccountId, amount: u128) -> Result<(), TokenError> {
        let mut state = self.state.lock();
        let balance = state.balances.get(&from).copied().unwrap_or(0);
        if balance < amount {
            return Err(TokenError::InsufficientBalance { account: from, balance, required: amount });
        }
        state.balances.insert(from, balance - amount);
        state.total_supply -= amount;
        Ok(())
    }

    fn balance_of(&self, account: AccountId) -> u128 {
        self.state.lock().balances.get(&account).copied().unwrap_or(0)
    }
}
