//! CDP Core Simulation.
//!
//! Runs the engine against in-memory collaborators: borrowing, earmark and
//! redemption, lazy settlement across many positions, and a liquidation
//! cascade.

use cdp_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

const UNIT: u128 = FIXED_POINT_SCALAR;

fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("cdp-sim v{}", env!("CARGO_PKG_VERSION"));

    scenario_1_borrowing()?;
    scenario_2_earmark_and_redemption()?;
    scenario_3_lazy_settlement()?;
    scenario_4_liquidation_cascade()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn units(amount: u128) -> Decimal {
    i128::try_from(amount)
        .ok()
        .and_then(|raw| Decimal::try_from_i128_with_scale(raw, 18).ok())
        .map(|value| value.round_dp(4))
        .unwrap_or(Decimal::MAX)
}

fn share_price(value: Decimal) -> Ratio {
    Ratio::from_decimal(value).unwrap_or(Ratio::ONE)
}

/// Deposit, mint, withdraw, burn and repay on one position.
fn scenario_1_borrowing() -> Result<(), EngineError> {
    println!("Scenario 1: Borrowing\n");

    let (mut engine, mocks) = Engine::with_mocks(EngineConfig::default())?;
    let alice = AccountId(1);

    let id = engine.deposit(alice, 10_000 * UNIT, None)?;
    let capacity = engine.max_borrowable(id)?;
    println!("  Alice deposits 10,000 shares into {}, can borrow {}", id, units(capacity));

    engine.mint(alice, id, capacity / 2, alice)?;
    let position = engine.get_position_view(id)?;
    println!("  Minted {}, debt {}", units(capacity / 2), units(position.debt));

    engine.withdraw(alice, id, 2_000 * UNIT)?;
    println!("  Withdrew 2,000 shares, collateral {}", units(engine.get_position_view(id)?.collateral));

    engine.advance_block(1);
    let burned = engine.burn(alice, id, 1_000 * UNIT)?;
    let repaid = engine.repay(alice, id, 500 * UNIT)?;
    println!("  Burned {}, repaid {} for {} shares (fee {})",
        units(burned), units(repaid.debt_credit), units(repaid.shares_paid), units(repaid.fee_shares));

    let position = engine.get_position_view(id)?;
    println!("  Final: collateral {}, debt {}", units(position.collateral), units(position.debt));
    println!("  Debt token supply: {}\n", units(mocks.debt_token.total_supply()));
    Ok(())
}

/// One earmark and one partial redemption, settled lazily.
fn scenario_2_earmark_and_redemption() -> Result<(), EngineError> {
    println!("Scenario 2: Earmark and Redemption\n");

    let (mut engine, mocks) = Engine::with_mocks(EngineConfig::default())?;
    let authority = engine.params().redemption_authority;
    let bob = AccountId(2);

    let id = engine.deposit(bob, 2_000 * UNIT, None)?;
    engine.mint(bob, id, 1_000 * UNIT, bob)?;
    println!("  Bob borrows 1,000 against 2,000 shares");

    mocks.authority.schedule_demand(BlockNumber(1), 100 * UNIT);
    engine.advance_block(1);
    let earmarked = engine.earmark()?;
    println!("  Block 1: {} of demand earmarked", units(earmarked));

    let redemption = engine.redeem(authority, 50 * UNIT)?;
    println!("  Authority redeems {}, {} shares paid out", units(redemption.redeemed), units(redemption.shares_out));

    let stored = engine.get_position(id).map(|p| (p.debt, p.earmarked)).unwrap_or_default();
    let view = engine.get_position_view(id)?;
    println!("  Stored position (untouched): debt {}, earmarked {}", units(stored.0), units(stored.1));
    println!("  Settled view: debt {}, earmarked {}", units(view.debt), units(view.earmarked));

    engine.poke(id)?;
    println!("  After poke, collateral {}\n", units(engine.get_position_view(id)?.collateral));
    Ok(())
}

/// Many positions, many earmark/redeem rounds, no per-position iteration.
fn scenario_3_lazy_settlement() -> Result<(), EngineError> {
    println!("Scenario 3: Lazy Settlement\n");

    let (mut engine, mocks) = Engine::with_mocks(EngineConfig::default())?;
    let authority = engine.params().redemption_authority;

    let num_positions = 500u64;
    let mut ids = Vec::new();
    for i in 0..num_positions {
        let owner = AccountId(100 + i);
        let debt = (500 + u128::from(i % 37) * 25) * UNIT;
        let id = engine.deposit(owner, debt * 2, None)?;
        engine.mint(owner, id, debt, owner)?;
        ids.push(id);
    }
    println!("  {} positions, total debt {}", engine.position_count(), units(engine.ledger().total_debt));

    let rounds = 40u64;
    for round in 1..=rounds {
        let demand = engine.ledger().total_debt / 100;
        mocks.authority.schedule_demand(BlockNumber(round), demand);
        engine.advance_block(1);
        engine.earmark()?;
        let half = engine.ledger().cumulative_earmarked / 2;
        if half > 0 {
            engine.redeem(authority, half)?;
        }
    }

    let ledger = engine.ledger().clone();
    let mut settled_debt = 0u128;
    let mut settled_earmarked = 0u128;
    for id in &ids {
        let view = engine.get_position_view(*id)?;
        settled_debt += view.debt;
        settled_earmarked += view.earmarked;
    }

    println!("  After {} rounds:", rounds);
    println!("  Ledger: debt {}, earmarked {}", units(ledger.total_debt), units(ledger.cumulative_earmarked));
    println!("  Sum of views: debt {}, earmarked {}", units(settled_debt), units(settled_earmarked));
    println!("  Drift: {} wei of debt\n", settled_debt.abs_diff(ledger.total_debt));
    Ok(())
}

/// Share price falls step by step, keepers liquidate in batches.
fn scenario_4_liquidation_cascade() -> Result<(), EngineError> {
    println!("Scenario 4: Liquidation Cascade\n");

    let (mut engine, mocks) = Engine::with_mocks(EngineConfig::default())?;
    engine.fund_fee_reserve(1_000 * UNIT);
    let keeper = AccountId(999);

    let mut borrowers = Vec::new();
    for (owner, debt, label) in [(1u64, 6_000u128, "conservative"), (2, 7_500, "moderate"), (3, 8_500, "aggressive")] {
        let owner = AccountId(owner);
        let id = engine.deposit(owner, 10_000 * UNIT, None)?;
        engine.mint(owner, id, debt * UNIT, owner)?;
        borrowers.push((id, label));
    }
    // a large healthy depositor keeps the system above its global minimum
    engine.deposit(AccountId(4), 50_000 * UNIT, None)?;
    println!("  Three borrowers at 60%, 75% and 85% LTV");

    let ids: Vec<PositionId> = borrowers.iter().map(|(id, _)| *id).collect();
    for price in [dec!(0.95), dec!(0.9), dec!(0.85), dec!(0.75), dec!(0.6)] {
        mocks.vault.set_share_price(share_price(price));
        engine.advance_block(1);
        let results = engine.batch_liquidate(keeper, &ids)?;

        if results.is_empty() {
            println!("  Price {}: no liquidations", price);
        }
        for result in &results {
            let label = borrowers
                .iter()
                .find(|(id, _)| *id == result.position_id)
                .map(|(_, label)| *label)
                .unwrap_or("unknown");
            println!("  Price {}: {} liquidated, burned {}, seized {} shares",
                price, label, units(result.debt_burned), units(result.seized_shares));
        }
    }

    println!("  Keeper earned {} shares, {} underlying", units(engine.shares_paid_to(keeper)), units(engine.underlying_paid_to(keeper)));
    println!("  Fee reserve left: {}", units(engine.fee_reserve_balance()));
    println!("  Global collateralization: {}\n", engine.global_collateralization());
    Ok(())
}
