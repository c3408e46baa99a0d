//! End-to-end vault scenarios over an in-memory ledger.
//!
//! Amounts are in 1e9 base units: 50_000_000 is 0.05 of the base token.

use std::collections::{HashMap, HashSet};

use lst_vault::error::VaultError;
use lst_vault::instruction::{ConfigUpdate, VaultInstruction};
use lst_vault::ledger::{Ledger, SwapRoute};
use lst_vault::math::RATE_PRECISION;
use lst_vault::state::{RateSource, ShortfallPolicy, UnstakeStatus, VaultConfig};
use lst_vault::vault::Vault;
use lst_vault::{processor, selector, shares, swap, unstake};
use solana_program::{entrypoint::ProgramResult, program_error::ProgramError};
use solana_sdk::pubkey::Pubkey;

// ═══════════════════════════════════════════════════════════════
// Mock ledger
// ═══════════════════════════════════════════════════════════════

struct MockLedger {
    now: i64,
    balances: HashMap<(Pubkey, Pubkey), u64>,
    /// wrapped token → protocol rate (missing = rate call reverts)
    rates: HashMap<Pubkey, u64>,
    /// wrapped token → (native token, direction)
    wrappers: HashMap<Pubkey, (Pubkey, RateSource)>,
    /// handler → native token minted 1:1 on stake
    stakers: HashMap<Pubkey, Pubkey>,
    pools: HashMap<Pubkey, Vec<(Pubkey, u64)>>,
    base: Pubkey,
    /// Wrap reports success but mints nothing
    silent_wrap: HashSet<Pubkey>,
    /// A successful wrap makes later reads of that wrapped token fail
    stale_after_wrap: bool,
    unreadable: HashSet<Pubkey>,
    reject_swaps: bool,
    /// Fraction of the reported swap output actually credited
    deliver_bps: u64,
    swaps: usize,
    stakes: usize,
}

impl MockLedger {
    fn new(base: Pubkey) -> Self {
        Self {
            now: 1_700_000_000,
            balances: HashMap::new(),
            rates: HashMap::new(),
            wrappers: HashMap::new(),
            stakers: HashMap::new(),
            pools: HashMap::new(),
            base,
            silent_wrap: HashSet::new(),
            stale_after_wrap: false,
            unreadable: HashSet::new(),
            reject_swaps: false,
            deliver_bps: 10_000,
            swaps: 0,
            stakes: 0,
        }
    }

    fn bal(&self, token: &Pubkey, holder: &Pubkey) -> u64 {
        self.balances.get(&(*token, *holder)).copied().unwrap_or(0)
    }

    fn credit(&mut self, token: &Pubkey, holder: &Pubkey, amount: u64) {
        *self.balances.entry((*token, *holder)).or_insert(0) += amount;
    }

    fn debit(&mut self, token: &Pubkey, holder: &Pubkey, amount: u64) -> ProgramResult {
        let b = self.balances.entry((*token, *holder)).or_insert(0);
        if *b < amount {
            return Err(ProgramError::InsufficientFunds);
        }
        *b -= amount;
        Ok(())
    }

    /// Base value of `amount` of `token`: wrapped through its rate, native 1:1.
    fn base_value(&self, token: &Pubkey, amount: u64) -> u64 {
        match (self.wrappers.get(token), self.rates.get(token)) {
            (Some((_, RateSource::WrappedPerNative)), Some(&rate)) => {
                (amount as u128 * RATE_PRECISION as u128 / rate as u128) as u64
            }
            (Some((_, RateSource::NativePerWrapped)), Some(&rate)) => {
                (amount as u128 * rate as u128 / RATE_PRECISION as u128) as u64
            }
            _ => amount,
        }
    }
}

impl Ledger for MockLedger {
    fn now(&self) -> i64 {
        self.now
    }

    fn balance_of(&self, token: &Pubkey, holder: &Pubkey) -> Result<u64, ProgramError> {
        if self.unreadable.contains(token) {
            return Err(ProgramError::AccountDataTooSmall);
        }
        Ok(self.bal(token, holder))
    }

    fn transfer(&mut self, token: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        self.debit(token, from, amount)?;
        self.credit(token, to, amount);
        Ok(())
    }

    fn exchange_rate(&self, wrapped_token: &Pubkey, _source: RateSource) -> Result<u64, ProgramError> {
        self.rates.get(wrapped_token).copied().ok_or(ProgramError::InvalidAccountData)
    }

    fn stake(&mut self, handler: &Pubkey, holder: &Pubkey, base_amount: u64) -> ProgramResult {
        let native = *self.stakers.get(handler).ok_or(ProgramError::InvalidArgument)?;
        let base = self.base;
        self.debit(&base, holder, base_amount)?;
        self.credit(&native, holder, base_amount);
        self.stakes += 1;
        Ok(())
    }

    fn wrap(&mut self, wrapped_token: &Pubkey, holder: &Pubkey, native_amount: u64) -> ProgramResult {
        let (native, source) = *self.wrappers.get(wrapped_token).ok_or(ProgramError::InvalidArgument)?;
        if self.silent_wrap.contains(wrapped_token) {
            return Ok(());
        }
        let rate = *self.rates.get(wrapped_token).ok_or(ProgramError::InvalidAccountData)? as u128;
        let n = native_amount as u128;
        let minted = match source {
            RateSource::WrappedPerNative => n * rate / RATE_PRECISION as u128,
            RateSource::NativePerWrapped => n * RATE_PRECISION as u128 / rate,
            RateSource::NoWrap => n,
        } as u64;
        self.debit(&native, holder, native_amount)?;
        self.credit(wrapped_token, holder, minted);
        if self.stale_after_wrap {
            self.unreadable.insert(*wrapped_token);
        }
        Ok(())
    }

    fn pool_tokens(&self, pool: &Pubkey) -> Result<Vec<(Pubkey, u64)>, ProgramError> {
        self.pools.get(pool).cloned().ok_or(ProgramError::InvalidAccountData)
    }

    fn batch_swap(&mut self, holder: &Pubkey, route: &SwapRoute) -> Result<u64, ProgramError> {
        if self.reject_swaps {
            return Err(ProgramError::Custom(6_000));
        }
        let first = route.hops.first().ok_or(ProgramError::InvalidArgument)?;
        let last = route.hops.last().ok_or(ProgramError::InvalidArgument)?;
        if self.bal(&first.token_in, holder) < route.max_in {
            return Err(ProgramError::InsufficientFunds);
        }
        let out = self.base_value(&first.token_in, route.max_in);
        if out < route.min_out {
            return Err(ProgramError::Custom(6_001));
        }
        let delivered = out * self.deliver_bps / 10_000;
        self.debit(&first.token_in, holder, route.max_in)?;
        self.credit(&last.token_out, holder, delivered);
        self.swaps += 1;
        Ok(out)
    }

    fn unstake(&mut self, handler: &Pubkey, holder: &Pubkey, amount: u64) -> ProgramResult {
        let native = *self.stakers.get(handler).ok_or(ProgramError::InvalidArgument)?;
        self.debit(&native, holder, amount)
    }

    fn claim_unstake(&mut self, _handler: &Pubkey, holder: &Pubkey, amount: u64) -> ProgramResult {
        let base = self.base;
        self.credit(&base, holder, amount);
        Ok(())
    }

    fn cancel_unstake(&mut self, handler: &Pubkey, holder: &Pubkey, amount: u64) -> ProgramResult {
        let native = *self.stakers.get(handler).ok_or(ProgramError::InvalidArgument)?;
        self.credit(&native, holder, amount);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
// Environment: three protocols (no-wrap, 0.9 W/N, 1.25 N/W)
// ═══════════════════════════════════════════════════════════════

const ONE: u64 = 1_000_000_000;
const DAY: i64 = 24 * 60 * 60;

struct Env {
    vault: Vault,
    ledger: MockLedger,
    admin: Pubkey,
    operator: Pubkey,
    user: Pubkey,
    holder: Pubkey,
    base: Pubkey,
    natives: [Pubkey; 3],
    wrapped: [Pubkey; 3],
}

impl Env {
    fn new(config: VaultConfig) -> Self {
        let base = Pubkey::new_unique();
        let holder = Pubkey::new_unique();
        let intermediate = Pubkey::new_unique();
        let mut ledger = MockLedger::new(base);
        let mut env_vault = Vault::new();

        let admin = Pubkey::new_unique();
        let operator = Pubkey::new_unique();
        let user = Pubkey::new_unique();
        ledger.credit(&base, &user, 10 * ONE);

        let init = VaultInstruction::InitVault {
            operator,
            vault: holder,
            base_token: base,
            config,
        };
        processor::process(&mut env_vault, &mut ledger, &admin, &init.pack()).unwrap();

        let n0 = Pubkey::new_unique();
        let n1 = Pubkey::new_unique();
        let n2 = Pubkey::new_unique();
        let w1 = Pubkey::new_unique();
        let w2 = Pubkey::new_unique();
        let protocols = [
            (RateSource::NoWrap, 500, n0, n0, 0u64),
            (RateSource::WrappedPerNative, 250, n1, w1, 900_000_000),
            (RateSource::NativePerWrapped, 250, n2, w2, 1_250_000_000),
        ];
        for (source, apy, native, wrapped, rate) in protocols {
            let pool_a = Pubkey::new_unique();
            let pool_b = Pubkey::new_unique();
            let handler = Pubkey::new_unique();
            ledger.pools.insert(pool_a, vec![(wrapped, 1_000_000 * ONE), (intermediate, 1_000_000 * ONE)]);
            ledger.pools.insert(pool_b, vec![(intermediate, 1_000_000 * ONE), (base, 1_000_000 * ONE)]);
            ledger.stakers.insert(handler, native);
            if source != RateSource::NoWrap {
                ledger.wrappers.insert(wrapped, (native, source));
                ledger.rates.insert(wrapped, rate);
            }
            let ix = VaultInstruction::RegisterProtocol {
                rate_source: source,
                apy_bps: apy,
                base_asset: native,
                wrapped_token: wrapped,
                intermediate_token: intermediate,
                pool_a,
                pool_b,
                unstake_handler: handler,
            };
            processor::process(&mut env_vault, &mut ledger, &admin, &ix.pack()).unwrap();
        }

        Self {
            vault: env_vault,
            ledger,
            admin,
            operator,
            user,
            holder,
            base,
            natives: [n0, n1, n2],
            wrapped: [n0, w1, w2],
        }
    }

    /// 5% idle reserve: a 1.0 deposit leaves 0.05 idle and stakes 0.475/0.2375/0.2375.
    fn funded(config: VaultConfig) -> Self {
        let mut env = Self::new(VaultConfig { idle_reserve_bps: 500, ..config });
        let user = env.user;
        env.exec(&user, VaultInstruction::Deposit { amount: ONE, recipient: user })
            .unwrap();
        env
    }

    fn exec(&mut self, caller: &Pubkey, ix: VaultInstruction) -> ProgramResult {
        processor::process(&mut self.vault, &mut self.ledger, caller, &ix.pack())
    }

    fn idle(&self) -> u64 {
        self.ledger.bal(&self.base, &self.holder)
    }

    fn native(&self, i: usize) -> u64 {
        self.ledger.bal(&self.natives[i], &self.holder)
    }

    fn wrapped_bal(&self, i: usize) -> u64 {
        self.ledger.bal(&self.wrapped[i], &self.holder)
    }

    fn total_assets(&self) -> u64 {
        shares::total_assets(&self.vault, &self.ledger).unwrap()
    }
}

fn custom(e: VaultError) -> ProgramResult {
    Err(e.into())
}

// ═══════════════════════════════════════════════════════════════
// Deposit & allocation
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_deposit_allocates_by_weight() {
    let env = Env::funded(VaultConfig::default());
    assert_eq!(env.idle(), 50_000_000);
    assert_eq!(env.native(0), 475_000_000);
    assert_eq!(env.native(1), 237_500_000);
    assert_eq!(env.native(2), 237_500_000);
    assert_eq!(env.vault.shares_of(&env.user), ONE);
    assert_eq!(env.vault.state.total_shares, ONE);
    assert_eq!(env.vault.state.total_deposited, ONE);
    assert_eq!(env.total_assets(), ONE);
}

#[test]
fn test_zero_weights_leave_deposit_idle() {
    let mut env = Env::new(VaultConfig::default());
    let operator = env.operator;
    env.exec(&operator, VaultInstruction::SetMultipleApy { apy_bps: vec![0, 0, 0] })
        .unwrap();
    let user = env.user;
    env.exec(&user, VaultInstruction::Deposit { amount: ONE, recipient: user })
        .unwrap();
    assert_eq!(env.idle(), ONE);
    assert_eq!(env.ledger.stakes, 0);
    assert_eq!(env.vault.shares_of(&user), ONE);
}

#[test]
fn test_second_deposit_prices_after_yield() {
    let mut env = Env::funded(VaultConfig::default());
    // 10% yield lands as idle base
    let holder = env.holder;
    let base = env.base;
    env.ledger.credit(&base, &holder, 100_000_000);
    let preview = shares::preview_deposit(&env.vault, &env.ledger, 110_000_000).unwrap();
    assert_eq!(preview, 100_000_000);

    let user = env.user;
    env.exec(&user, VaultInstruction::Deposit { amount: 110_000_000, recipient: user })
        .unwrap();
    assert_eq!(env.vault.shares_of(&user), ONE + 100_000_000);
}

#[test]
fn test_conversions_track_share_price() {
    let mut env = Env::new(VaultConfig::default());
    // Empty vault converts 1:1
    assert_eq!(shares::convert_to_shares(&env.vault, &env.ledger, 5_000).unwrap(), 5_000);
    assert_eq!(shares::convert_to_assets(&env.vault, &env.ledger, 5_000).unwrap(), 5_000);

    let user = env.user;
    env.exec(&user, VaultInstruction::Deposit { amount: ONE, recipient: user })
        .unwrap();
    assert_eq!(env.vault.accounts[&user].owner_pubkey(), user);
    let holder = env.holder;
    let base = env.base;
    env.ledger.credit(&base, &holder, 100_000_000);

    assert_eq!(shares::convert_to_shares(&env.vault, &env.ledger, 110_000_000).unwrap(), 100_000_000);
    assert_eq!(shares::convert_to_assets(&env.vault, &env.ledger, 100_000_000).unwrap(), 110_000_000);
    // Floor on both sides
    assert_eq!(shares::convert_to_assets(&env.vault, &env.ledger, 1).unwrap(), 1);
    assert_eq!(shares::convert_to_shares(&env.vault, &env.ledger, 1).unwrap(), 0);
}

#[test]
fn test_deposit_cap_enforced() {
    let mut env = Env::new(VaultConfig { deposit_cap: ONE / 2, ..VaultConfig::default() });
    let user = env.user;
    assert_eq!(
        env.exec(&user, VaultInstruction::Deposit { amount: ONE, recipient: user }),
        custom(VaultError::DepositCapExceeded)
    );
    assert_eq!(env.ledger.bal(&env.base, &user), 10 * ONE);
}

#[test]
fn test_zero_deposit_rejected() {
    let mut env = Env::new(VaultConfig::default());
    let user = env.user;
    assert_eq!(
        env.exec(&user, VaultInstruction::Deposit { amount: 0, recipient: user }),
        custom(VaultError::ZeroAmount)
    );
}

#[test]
fn test_rebalance_stakes_excess_idle() {
    let mut env = Env::funded(VaultConfig::default());
    let holder = env.holder;
    let base = env.base;
    env.ledger.credit(&base, &holder, 100_000_000);
    // total 1.1, target idle 5% = 0.055, excess 0.095
    let operator = env.operator;
    env.exec(&operator, VaultInstruction::Rebalance).unwrap();
    assert_eq!(env.idle(), 55_000_000);
    assert_eq!(env.native(0), 475_000_000 + 47_500_000);
    assert_eq!(env.total_assets(), 1_100_000_000);
}

// ═══════════════════════════════════════════════════════════════
// Withdrawals
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_withdraw_covered_by_idle_never_liquidates() {
    let mut env = Env::funded(VaultConfig::default());
    let user = env.user;
    let receiver = Pubkey::new_unique();
    let expected_burn = shares::preview_withdraw(&env.vault, &env.ledger, 30_000_000).unwrap();

    env.exec(&user, VaultInstruction::Withdraw { amount: 30_000_000, owner: user, receiver })
        .unwrap();

    assert_eq!(env.ledger.swaps, 0);
    assert_eq!(env.ledger.bal(&env.base, &receiver), 30_000_000);
    assert_eq!(env.idle(), 20_000_000);
    assert_eq!(expected_burn, 30_000_000);
    assert_eq!(env.vault.shares_of(&user), ONE - expected_burn);
    assert_eq!(env.native(1), 237_500_000);
}

#[test]
fn test_withdraw_shortfall_liquidates_lowest_apy() {
    let mut env = Env::funded(VaultConfig::default());
    let user = env.user;
    let receiver = Pubkey::new_unique();
    let expected_burn = shares::preview_withdraw(&env.vault, &env.ledger, 80_000_000).unwrap();

    env.exec(&user, VaultInstruction::Withdraw { amount: 80_000_000, owner: user, receiver })
        .unwrap();

    // Shortfall 0.03 raised from protocol 1 (lowest APY, lowest index):
    // wrapped_for(0.03) = 0.027, +5% = 0.02835 wrapped from 0.0315 native
    assert_eq!(env.ledger.swaps, 1);
    assert_eq!(env.native(1), 237_500_000 - 31_500_000);
    assert_eq!(env.wrapped_bal(1), 0);
    assert_eq!(env.native(2), 237_500_000);
    assert_eq!(env.ledger.bal(&env.base, &receiver), 80_000_000);
    // Liquidation excess stays idle
    assert_eq!(env.idle(), 1_500_000);
    assert_eq!(env.vault.shares_of(&user), ONE - expected_burn);
    assert_eq!(env.vault.state.total_withdrawn, 80_000_000);
    assert_eq!(env.total_assets(), 920_000_000);
}

#[test]
fn test_redeem_pays_floor_value() {
    let mut env = Env::funded(VaultConfig::default());
    let user = env.user;
    let receiver = Pubkey::new_unique();
    env.exec(&user, VaultInstruction::Redeem { shares: 100_000_000, owner: user, receiver })
        .unwrap();
    assert_eq!(env.ledger.bal(&env.base, &receiver), 100_000_000);
    assert_eq!(env.vault.shares_of(&user), 900_000_000);
    assert_eq!(env.idle(), 2_500_000);
}

#[test]
fn test_insufficient_liquidity_burns_nothing() {
    let mut env = Env::funded(VaultConfig::default());
    let user = env.user;
    let receiver = Pubkey::new_unique();
    // Caps: 0.7 × (0.475 + 0.2375 + 0.2375) = 0.665 + 0.05 idle < 0.9
    assert_eq!(
        env.exec(&user, VaultInstruction::Withdraw { amount: 900_000_000, owner: user, receiver }),
        custom(VaultError::InsufficientLiquidity)
    );
    assert_eq!(env.ledger.swaps, 0);
    assert_eq!(env.ledger.bal(&env.base, &receiver), 0);
    assert_eq!(env.vault.shares_of(&user), ONE);
    assert_eq!(env.vault.state.total_shares, ONE);
    assert_eq!(env.vault.state.total_withdrawn, 0);
}

#[test]
fn test_withdraw_more_than_owned_shares() {
    let mut env = Env::funded(VaultConfig::default());
    let user = env.user;
    assert_eq!(
        env.exec(&user, VaultInstruction::Withdraw { amount: 2 * ONE, owner: user, receiver: user }),
        custom(VaultError::InsufficientShares)
    );
}

#[test]
fn test_withdraw_requires_owner() {
    let mut env = Env::funded(VaultConfig::default());
    let user = env.user;
    let thief = Pubkey::new_unique();
    assert_eq!(
        env.exec(&thief, VaultInstruction::Withdraw { amount: 1, owner: user, receiver: thief }),
        custom(VaultError::Unauthorized)
    );
}

#[test]
fn test_withdraw_cooldown() {
    let mut env = Env::funded(VaultConfig { withdraw_cooldown_secs: 100, ..VaultConfig::default() });
    let user = env.user;
    let ix = VaultInstruction::Withdraw { amount: 1_000, owner: user, receiver: user };
    assert_eq!(env.exec(&user, ix.clone()), custom(VaultError::CooldownNotElapsed));
    env.ledger.now += 100;
    env.exec(&user, ix).unwrap();
}

// ═══════════════════════════════════════════════════════════════
// Liquidation failure modes
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_silent_wrap_failure_detected_before_swap() {
    let mut env = Env::funded(VaultConfig::default());
    let w1 = env.wrapped[1];
    env.ledger.silent_wrap.insert(w1);

    assert_eq!(
        swap::liquidate(&env.vault, &mut env.ledger, 1, 30_000_000),
        Err(VaultError::WrapVerificationFailed)
    );
    assert_eq!(env.ledger.swaps, 0);
    assert_eq!(env.native(1), 237_500_000);
    assert_eq!(env.idle(), 50_000_000);
}

#[test]
fn test_silent_wrap_failure_aborts_single_plan() {
    let mut env = Env::funded(VaultConfig::default());
    let w1 = env.wrapped[1];
    env.ledger.silent_wrap.insert(w1);
    let user = env.user;
    assert_eq!(
        env.exec(&user, VaultInstruction::Withdraw { amount: 80_000_000, owner: user, receiver: user }),
        custom(VaultError::WrapVerificationFailed)
    );
    assert_eq!(env.vault.shares_of(&user), ONE);
    assert_eq!(env.ledger.swaps, 0);
}

#[test]
fn test_replan_routes_around_failed_protocol() {
    let mut env = Env::funded(VaultConfig {
        shortfall_policy: ShortfallPolicy::Replan,
        ..VaultConfig::default()
    });
    let w1 = env.wrapped[1];
    env.ledger.silent_wrap.insert(w1);
    let user = env.user;
    let receiver = Pubkey::new_unique();

    env.exec(&user, VaultInstruction::Withdraw { amount: 80_000_000, owner: user, receiver })
        .unwrap();

    // Protocol 2: wrapped_for(0.03) = 0.024, +5% = 0.0252 wrapped from 0.0315 native
    assert_eq!(env.native(1), 237_500_000);
    assert_eq!(env.native(2), 237_500_000 - 31_500_000);
    assert_eq!(env.ledger.swaps, 1);
    assert_eq!(env.ledger.bal(&env.base, &receiver), 80_000_000);
}

#[test]
fn test_withdraw_reports_venue_rejection() {
    let mut env = Env::funded(VaultConfig::default());
    env.ledger.reject_swaps = true;
    let user = env.user;
    let receiver = Pubkey::new_unique();
    assert_eq!(
        env.exec(&user, VaultInstruction::Withdraw { amount: 80_000_000, owner: user, receiver }),
        custom(VaultError::SwapRejected)
    );
    assert_eq!(env.ledger.bal(&env.base, &receiver), 0);
    assert_eq!(env.vault.shares_of(&user), ONE);
}

#[test]
fn test_replan_exhausted_reports_last_failure() {
    let mut env = Env::funded(VaultConfig {
        shortfall_policy: ShortfallPolicy::Replan,
        ..VaultConfig::default()
    });
    env.ledger.reject_swaps = true;
    let user = env.user;
    assert_eq!(
        env.exec(&user, VaultInstruction::Redeem { shares: 80_000_000, owner: user, receiver: user }),
        custom(VaultError::SwapRejected)
    );
    assert_eq!(env.ledger.swaps, 0);
    assert_eq!(env.vault.shares_of(&user), ONE);
}

#[test]
fn test_unreadable_balance_mid_liquidation_is_stale_state() {
    let mut env = Env::funded(VaultConfig::default());
    env.ledger.stale_after_wrap = true;
    assert_eq!(
        swap::liquidate(&env.vault, &mut env.ledger, 1, 30_000_000),
        Err(VaultError::StaleState)
    );
    assert_eq!(env.ledger.swaps, 0);

    let mut env = Env::funded(VaultConfig::default());
    env.ledger.stale_after_wrap = true;
    let user = env.user;
    assert_eq!(
        env.exec(&user, VaultInstruction::Withdraw { amount: 80_000_000, owner: user, receiver: user }),
        custom(VaultError::StaleState)
    );
    assert_eq!(env.vault.shares_of(&user), ONE);
}

#[test]
fn test_unavailable_ratio_is_skipped_not_defaulted() {
    let mut env = Env::funded(VaultConfig::default());
    let w1 = env.wrapped[1];
    env.ledger.rates.remove(&w1);

    let plan = selector::select(&env.vault, &env.ledger, 30_000_000, &[]).unwrap();
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(plan.steps[0].protocol_index, 2);

    let user = env.user;
    env.exec(&user, VaultInstruction::Withdraw { amount: 80_000_000, owner: user, receiver: user })
        .unwrap();
    assert_eq!(env.native(1), 237_500_000);
}

#[test]
fn test_selector_respects_safety_fraction() {
    let env = Env::funded(VaultConfig::default());
    let plan = selector::select(&env.vault, &env.ledger, 400_000_000, &[]).unwrap();
    for step in &plan.steps {
        assert!(step.amount <= step.liquidatable);
    }
    assert_eq!(plan.total(), 400_000_000);
    // 0.16625 + 0.16625 from the 250-bps protocols, rest from protocol 0
    let order: Vec<usize> = plan.steps.iter().map(|s| s.protocol_index).collect();
    assert_eq!(order, vec![1, 2, 0]);
    assert_eq!(plan.steps[0].amount, 166_250_000);
    assert_eq!(plan.steps[2].amount, 400_000_000 - 2 * 166_250_000);

    assert!(selector::select(&env.vault, &env.ledger, 0, &[]).unwrap().is_empty());
}

#[test]
fn test_short_delivery_is_slippage() {
    let mut env = Env::funded(VaultConfig::default());
    env.ledger.deliver_bps = 9_000;
    assert_eq!(
        swap::liquidate(&env.vault, &mut env.ledger, 1, 30_000_000),
        Err(VaultError::SwapSlippageExceeded)
    );
}

#[test]
fn test_venue_revert_is_swap_rejected() {
    let mut env = Env::funded(VaultConfig::default());
    env.ledger.reject_swaps = true;
    assert_eq!(
        swap::liquidate(&env.vault, &mut env.ledger, 0, 30_000_000),
        Err(VaultError::SwapRejected)
    );
}

#[test]
fn test_misconfigured_pool_is_configuration_error() {
    let mut env = Env::funded(VaultConfig::default());
    let pool_a = env.vault.registry.get(1).unwrap().pool_a_pubkey();
    env.ledger.pools.insert(pool_a, vec![(Pubkey::new_unique(), ONE)]);
    assert_eq!(
        swap::liquidate(&env.vault, &mut env.ledger, 1, 30_000_000),
        Err(VaultError::ConfigurationError)
    );
}

#[test]
fn test_no_wrap_protocol_swaps_native_directly() {
    let mut env = Env::funded(VaultConfig::default());
    let received = swap::liquidate(&env.vault, &mut env.ledger, 0, 30_000_000).unwrap();
    // buffered 0.0315 native swapped 1:1
    assert_eq!(received, 31_500_000);
    assert_eq!(env.native(0), 475_000_000 - 31_500_000);
}

// ═══════════════════════════════════════════════════════════════
// Unstake / claim
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_unstake_claim_lifecycle() {
    let mut env = Env::funded(VaultConfig::default());
    let operator = env.operator;
    env.exec(&operator, VaultInstruction::RequestUnstake { protocol_index: 0, amount: 100_000_000 })
        .unwrap();

    assert_eq!(env.native(0), 375_000_000);
    assert_eq!(env.vault.state.total_pending_unstake, 100_000_000);
    // Pending value still counts
    assert_eq!(env.total_assets(), ONE);
    assert_eq!(unstake::status(&env.vault, &env.ledger, 1).unwrap(), UnstakeStatus::Pending);
    assert_eq!(unstake::requests_of(&env.vault, &operator).len(), 1);

    assert_eq!(
        env.exec(&operator, VaultInstruction::Claim { request_id: 1 }),
        custom(VaultError::NotClaimable)
    );

    env.ledger.now += 14 * DAY;
    assert_eq!(unstake::status(&env.vault, &env.ledger, 1).unwrap(), UnstakeStatus::Claimable);
    let stranger = Pubkey::new_unique();
    assert_eq!(
        env.exec(&stranger, VaultInstruction::Claim { request_id: 1 }),
        custom(VaultError::Unauthorized)
    );
    env.exec(&operator, VaultInstruction::Claim { request_id: 1 }).unwrap();

    assert_eq!(env.idle(), 150_000_000);
    assert_eq!(env.vault.state.total_pending_unstake, 0);
    assert!(env.vault.unstakes.is_empty());
    assert_eq!(env.total_assets(), ONE);
    assert_eq!(
        env.exec(&operator, VaultInstruction::Claim { request_id: 1 }),
        custom(VaultError::UnknownRequest)
    );
}

#[test]
fn test_claim_beyond_pending_trips_guard() {
    let mut env = Env::funded(VaultConfig::default());
    let operator = env.operator;
    env.exec(&operator, VaultInstruction::RequestUnstake { protocol_index: 0, amount: 100_000_000 })
        .unwrap();
    env.vault.state.total_pending_unstake = 40_000_000;
    env.ledger.now += 14 * DAY;
    assert_eq!(
        env.exec(&operator, VaultInstruction::Claim { request_id: 1 }),
        custom(VaultError::ArithmeticGuardTripped)
    );
    assert_eq!(env.vault.unstakes.len(), 1);
    assert_eq!(env.vault.state.total_pending_unstake, 40_000_000);
}

#[test]
fn test_cancel_only_while_pending() {
    let mut env = Env::funded(VaultConfig::default());
    let operator = env.operator;
    env.exec(&operator, VaultInstruction::RequestUnstake { protocol_index: 0, amount: 50_000_000 })
        .unwrap();
    env.exec(&operator, VaultInstruction::RequestUnstake { protocol_index: 0, amount: 25_000_000 })
        .unwrap();

    env.exec(&operator, VaultInstruction::CancelUnstake { request_id: 1 }).unwrap();
    assert_eq!(env.native(0), 475_000_000 - 25_000_000);
    assert_eq!(env.vault.state.total_pending_unstake, 25_000_000);

    env.ledger.now += 14 * DAY;
    assert_eq!(
        env.exec(&operator, VaultInstruction::CancelUnstake { request_id: 2 }),
        custom(VaultError::RequestNotPending)
    );
}

#[test]
fn test_unstake_more_than_held() {
    let mut env = Env::funded(VaultConfig::default());
    let operator = env.operator;
    assert_eq!(
        env.exec(&operator, VaultInstruction::RequestUnstake { protocol_index: 0, amount: ONE }),
        custom(VaultError::InsufficientProtocolLiquidity)
    );
    assert_eq!(env.vault.state.next_request_id, 1);
}

// ═══════════════════════════════════════════════════════════════
// Admin / operator surface
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_roles_enforced() {
    let mut env = Env::new(VaultConfig::default());
    let user = env.user;
    assert_eq!(
        env.exec(&user, VaultInstruction::SetApy { index: 0, apy_bps: 1 }),
        custom(VaultError::Unauthorized)
    );
    let operator = env.operator;
    assert_eq!(
        env.exec(&operator, VaultInstruction::SetOperator { operator: user }),
        custom(VaultError::Unauthorized)
    );
    let admin = env.admin;
    env.exec(&admin, VaultInstruction::SetOperator { operator: user }).unwrap();
    env.exec(&user, VaultInstruction::SetApy { index: 0, apy_bps: 1 }).unwrap();
    assert_eq!(env.vault.registry.weights(), vec![1, 250, 250]);
}

#[test]
fn test_second_init_rejected() {
    let mut env = Env::new(VaultConfig::default());
    let user = env.user;
    let ix = VaultInstruction::InitVault {
        operator: user,
        vault: Pubkey::new_unique(),
        base_token: Pubkey::new_unique(),
        config: VaultConfig::default(),
    };
    assert_eq!(env.exec(&user, ix), custom(VaultError::AlreadyInitialized));
}

#[test]
fn test_update_config_validates_and_restores() {
    let mut env = Env::new(VaultConfig::default());
    let admin = env.admin;
    let bad = ConfigUpdate { slippage_bps: Some(10_000), ..ConfigUpdate::default() };
    assert_eq!(
        env.exec(&admin, VaultInstruction::UpdateConfig(bad)),
        custom(VaultError::ConfigurationError)
    );
    assert_eq!(env.vault.state.slippage_bps, 500);

    let good = ConfigUpdate { slippage_bps: Some(100), ..ConfigUpdate::default() };
    env.exec(&admin, VaultInstruction::UpdateConfig(good)).unwrap();
    assert_eq!(env.vault.state.slippage_bps, 100);
}

#[test]
fn test_failed_instruction_restores_engine_state() {
    let mut env = Env::funded(VaultConfig::default());
    let user = env.user;
    let before_shares = env.vault.state.total_shares;
    let before_next_id = env.vault.state.next_request_id;
    let _ = env.exec(&user, VaultInstruction::Withdraw { amount: 900_000_000, owner: user, receiver: user });
    assert_eq!(env.vault.state.total_shares, before_shares);
    assert_eq!(env.vault.state.next_request_id, before_next_id);
    assert_eq!(env.vault.accounts.len(), 1);
}

fn wrapping_entry(native: Pubkey) -> VaultInstruction {
    VaultInstruction::RegisterProtocol {
        rate_source: RateSource::WrappedPerNative,
        apy_bps: 100,
        base_asset: native,
        wrapped_token: Pubkey::new_unique(),
        intermediate_token: Pubkey::new_unique(),
        pool_a: Pubkey::new_unique(),
        pool_b: Pubkey::new_unique(),
        unstake_handler: Pubkey::new_unique(),
    }
}

#[test]
fn test_shared_native_token_rejected() {
    let mut env = Env::funded(VaultConfig::default());
    let admin = env.admin;
    let before = env.total_assets();

    let n0 = env.natives[0];
    assert_eq!(env.exec(&admin, wrapping_entry(n0)), custom(VaultError::ConfigurationError));
    let w2 = env.wrapped[2];
    assert_eq!(env.exec(&admin, wrapping_entry(w2)), custom(VaultError::ConfigurationError));

    assert_eq!(env.vault.registry.len(), 3);
    assert_eq!(env.total_assets(), before);
}

#[test]
fn test_base_token_cannot_be_protocol_token() {
    let mut env = Env::new(VaultConfig::default());
    let admin = env.admin;
    let base = env.base;
    assert_eq!(env.exec(&admin, wrapping_entry(base)), custom(VaultError::ConfigurationError));
    assert_eq!(env.vault.registry.len(), 3);
}

#[test]
fn test_second_no_wrap_protocol_rejected() {
    let mut env = Env::new(VaultConfig::default());
    let admin = env.admin;
    let native = Pubkey::new_unique();
    let ix = VaultInstruction::RegisterProtocol {
        rate_source: RateSource::NoWrap,
        apy_bps: 1,
        base_asset: native,
        wrapped_token: native,
        intermediate_token: Pubkey::new_unique(),
        pool_a: Pubkey::new_unique(),
        pool_b: Pubkey::new_unique(),
        unstake_handler: Pubkey::new_unique(),
    };
    assert_eq!(env.exec(&admin, ix), custom(VaultError::ConfigurationError));
    assert_eq!(env.vault.registry.len(), 3);
}
