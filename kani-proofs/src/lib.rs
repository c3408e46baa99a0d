//! Kani formal verification for lst-vault share and allocation math.
//!
//! ZERO dependencies. Pure Rust. CBMC-friendly.
//!
//! Functions use u32 inputs / u64 intermediates. The production code uses
//! u64/u128, but the arithmetic properties (conservation, rounding
//! direction, bounds) are scale-invariant, and u32 keeps SAT formulas
//! tractable for CBMC.
//!
//! Run all:   cargo kani --lib
//! Run one:   cargo kani --harness proof_first_depositor_exact

// ═══════════════════════════════════════════════════════════════
// Share Math (u32/u64 mirror of lst-vault/src/math.rs)
// ═══════════════════════════════════════════════════════════════

pub const BPS: u64 = 10_000;

/// Shares for a deposit. Empty vault: 1:1. Orphan states: None. Else floor.
pub fn calc_shares_for_deposit(supply: u32, assets: u32, deposit: u32) -> Option<u32> {
    if supply == 0 && assets == 0 {
        Some(deposit)
    } else if supply == 0 || assets == 0 {
        None
    } else {
        let s = (deposit as u64) * (supply as u64) / (assets as u64);
        u32::try_from(s).ok()
    }
}

/// Assets for redeeming shares. floor(shares * assets / supply).
pub fn calc_assets_for_redeem(supply: u32, assets: u32, shares: u32) -> Option<u32> {
    if supply == 0 {
        return None;
    }
    u32::try_from((shares as u64) * (assets as u64) / (supply as u64)).ok()
}

/// Shares burned to withdraw assets. ceil(assets_out * supply / assets).
pub fn calc_shares_for_withdraw(supply: u32, assets: u32, assets_out: u32) -> Option<u32> {
    if supply == 0 || assets == 0 {
        return None;
    }
    let num = (assets_out as u64) * (supply as u64);
    let d = assets as u64;
    u32::try_from(num / d + u64::from(num % d != 0)).ok()
}

/// Two-way weight split with floor rounding. Negative weights count as zero.
pub fn allocate2(amount: u32, w0: i16, w1: i16) -> (u32, u32, u32) {
    let a = w0.max(0) as u64;
    let b = w1.max(0) as u64;
    let total = a + b;
    if total == 0 {
        return (0, 0, amount);
    }
    let p0 = (amount as u64 * a / total) as u32;
    let p1 = (amount as u64 * b / total) as u32;
    (p0, p1, amount - p0 - p1)
}

/// floor(balance * bps / 10_000)
pub fn safety_cap(balance: u32, bps: u16) -> u32 {
    (balance as u64 * bps as u64 / BPS) as u32
}

/// ceil(amount * (10_000 + bps) / 10_000)
pub fn buffered(amount: u32, bps: u16) -> u64 {
    let num = amount as u64 * (BPS + bps as u64);
    num / BPS + u64::from(num % BPS != 0)
}

pub fn shortfall(requested: u32, idle: u32) -> u32 {
    if requested > idle {
        requested - idle
    } else {
        0
    }
}

// ═══════════════════════════════════════════════════════════════
// KANI PROOFS
// ═══════════════════════════════════════════════════════════════

#[cfg(kani)]
mod proofs {
    use super::*;

    // ── 1. Conservation ──

    /// Deposit→redeem roundtrip: can't get back more than deposited.
    #[kani::proof]
    fn proof_deposit_redeem_no_inflation() {
        let supply: u32 = kani::any();
        let assets: u32 = kani::any();
        let deposit: u32 = kani::any();
        kani::assume(supply > 0 && assets > 0 && deposit > 0);

        let shares = match calc_shares_for_deposit(supply, assets, deposit) {
            Some(s) if s > 0 => s,
            _ => return,
        };
        let (ns, na) = match (supply.checked_add(shares), assets.checked_add(deposit)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        let back = calc_assets_for_redeem(ns, na, shares).unwrap();
        assert!(back <= deposit);
    }

    #[kani::proof]
    fn proof_first_depositor_exact() {
        let amount: u32 = kani::any();
        kani::assume(amount > 0);
        let shares = calc_shares_for_deposit(0, 0, amount).unwrap();
        assert_eq!(shares, amount);
        assert_eq!(calc_assets_for_redeem(shares, amount, shares), Some(amount));
    }

    #[kani::proof]
    fn proof_orphan_states_blocked() {
        let x: u32 = kani::any();
        let d: u32 = kani::any();
        kani::assume(x > 0);
        assert!(calc_shares_for_deposit(0, x, d).is_none());
        assert!(calc_shares_for_deposit(x, 0, d).is_none());
    }

    /// Full redeem never pays out more than total assets.
    #[kani::proof]
    fn proof_full_redeem_bounded() {
        let supply: u32 = kani::any();
        let assets: u32 = kani::any();
        kani::assume(supply > 0);
        assert_eq!(calc_assets_for_redeem(supply, assets, supply), Some(assets));
    }

    // ── 2. Withdraw rounding ──

    #[kani::proof]
    fn proof_withdraw_burns_enough() {
        let supply: u32 = kani::any();
        let assets: u32 = kani::any();
        let out: u32 = kani::any();
        kani::assume(supply > 0 && assets > 0 && out > 0 && out <= assets);

        let burned = calc_shares_for_withdraw(supply, assets, out).unwrap();
        assert!(burned <= supply);
        assert!(calc_assets_for_redeem(supply, assets, burned).unwrap() >= out);
    }

    /// Ceil never burns less than the floor conversion would mint.
    #[kani::proof]
    fn proof_withdraw_ceil_ge_deposit_floor() {
        let supply: u32 = kani::any();
        let assets: u32 = kani::any();
        let x: u32 = kani::any();
        kani::assume(supply > 0 && assets > 0 && x <= assets);

        let burn = calc_shares_for_withdraw(supply, assets, x).unwrap();
        let mint = calc_shares_for_deposit(supply, assets, x).unwrap();
        assert!(burn >= mint);
    }

    // ── 3. Allocation ──

    #[kani::proof]
    fn proof_allocation_sum_of_parts() {
        let amount: u32 = kani::any();
        let w0: i16 = kani::any();
        let w1: i16 = kani::any();
        let (p0, p1, rem) = allocate2(amount, w0, w1);
        assert!(p0 as u64 + p1 as u64 <= amount as u64);
        assert_eq!(p0 as u64 + p1 as u64 + rem as u64, amount as u64);
    }

    #[kani::proof]
    fn proof_negative_weight_gets_nothing() {
        let amount: u32 = kani::any();
        let w0: i16 = kani::any();
        let w1: i16 = kani::any();
        kani::assume(w0 <= 0);
        let (p0, _, _) = allocate2(amount, w0, w1);
        assert_eq!(p0, 0);
    }

    #[kani::proof]
    fn proof_remainder_below_count() {
        let amount: u32 = kani::any();
        let w0: i16 = kani::any();
        let w1: i16 = kani::any();
        kani::assume(w0 > 0 && w1 > 0);
        let (_, _, rem) = allocate2(amount, w0, w1);
        assert!(rem < 2);
    }

    // ── 4. Liquidation sizing ──

    #[kani::proof]
    fn proof_safety_cap_bounded() {
        let balance: u32 = kani::any();
        let bps: u16 = kani::any();
        kani::assume(bps <= 10_000);
        assert!(safety_cap(balance, bps) <= balance);
    }

    #[kani::proof]
    fn proof_buffer_monotone() {
        let amount: u32 = kani::any();
        let bps: u16 = kani::any();
        assert!(buffered(amount, bps) >= amount as u64);
    }

    #[kani::proof]
    fn proof_shortfall_exact() {
        let requested: u32 = kani::any();
        let idle: u32 = kani::any();
        let s = shortfall(requested, idle);
        assert!(s <= requested);
        if requested > idle {
            assert_eq!(s as u64 + idle as u64, requested as u64);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Plain tests (cargo test) over the mirrors
// ═══════════════════════════════════════════════════════════════
