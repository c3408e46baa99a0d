//! Pure vault math: share conversion, basis-point scaling, weight allocation.
//!
//! No Solana/Pubkey dependencies. Just arithmetic.
//! The narrow-width mirrors in `kani-proofs/` track these functions.

/// Basis-point denominator (100% = 10_000).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Fixed-point precision of protocol exchange rates (1.0 = 1e9).
pub const RATE_PRECISION: u64 = 1_000_000_000;

/// `floor(a * b / c)` via u128. `None` on zero divisor or u64 overflow.
pub fn mul_div_floor(a: u64, b: u64, c: u64) -> Option<u64> {
    if c == 0 {
        return None;
    }
    let v = (a as u128).checked_mul(b as u128)? / (c as u128);
    u64::try_from(v).ok()
}

/// `ceil(a * b / c)` via u128. `None` on zero divisor or u64 overflow.
pub fn mul_div_ceil(a: u64, b: u64, c: u64) -> Option<u64> {
    if c == 0 {
        return None;
    }
    let num = (a as u128).checked_mul(b as u128)?;
    let c = c as u128;
    let v = num / c + u128::from(num % c != 0);
    u64::try_from(v).ok()
}

/// Calculate shares minted for a deposit.
///
/// # Returns
/// * `Some(shares)` - rounds DOWN (vault-favoring)
/// * `None` - overflow, or a blocked state (see below)
///
/// # Invariant
/// First depositor (supply == 0, assets == 0): 1:1.
/// Supply == 0 with assets > 0 is orphaned value; supply > 0 with zero
/// assets would dilute existing holders. Both are blocked.
pub fn calc_shares_for_deposit(total_shares: u64, total_assets: u64, deposit: u64) -> Option<u64> {
    if total_shares == 0 && total_assets == 0 {
        Some(deposit)
    } else if total_shares == 0 || total_assets == 0 {
        None
    } else {
        mul_div_floor(deposit, total_shares, total_assets)
    }
}

/// Calculate assets paid out for burning `shares`. Rounds DOWN.
///
/// Full burn returns ≤ total_assets (never more).
pub fn calc_assets_for_redeem(total_shares: u64, total_assets: u64, shares: u64) -> Option<u64> {
    if total_shares == 0 {
        return None;
    }
    mul_div_floor(shares, total_assets, total_shares)
}

/// Calculate shares burned to withdraw exactly `assets`. Rounds UP, so the
/// withdrawer never burns fewer shares than the assets are worth.
pub fn calc_shares_for_withdraw(total_shares: u64, total_assets: u64, assets: u64) -> Option<u64> {
    if total_shares == 0 || total_assets == 0 {
        return None;
    }
    mul_div_ceil(assets, total_shares, total_assets)
}

/// `floor(amount * bps / 10_000)`.
pub fn apply_bps(amount: u64, bps: u16) -> Option<u64> {
    mul_div_floor(amount, bps as u64, BPS_DENOMINATOR)
}

/// Estimate grown by a buffer: `ceil(amount * (10_000 + buffer_bps) / 10_000)`.
pub fn buffered(amount: u64, buffer_bps: u16) -> Option<u64> {
    mul_div_ceil(amount, BPS_DENOMINATOR + buffer_bps as u64, BPS_DENOMINATOR)
}

/// Minimum acceptable output: `floor(expected * (10_000 - slippage_bps) / 10_000)`.
/// Slippage at or above 100% yields zero.
pub fn min_out(expected: u64, slippage_bps: u16) -> Option<u64> {
    let keep = BPS_DENOMINATOR.saturating_sub(slippage_bps as u64);
    mul_div_floor(expected, keep, BPS_DENOMINATOR)
}

/// Portion of a balance that may be liquidated in one step.
pub fn safety_cap(balance: u64, safety_fraction_bps: u16) -> Option<u64> {
    apply_bps(balance, safety_fraction_bps)
}

/// `max(0, requested - idle)` with the operand order checked first.
pub fn shortfall(requested: u64, idle: u64) -> u64 {
    if requested > idle {
        requested - idle
    } else {
        0
    }
}

/// Split `amount` across `weights` proportionally (floor per entry).
///
/// Negative weights count as zero. Returns per-entry allocations and the
/// unallocated remainder; `Σ allocations + remainder == amount`.
/// With no positive weight everything is remainder.
pub fn allocate_by_weight(amount: u64, weights: &[i32]) -> Option<(Vec<u64>, u64)> {
    let total_weight: u64 = weights.iter().map(|&w| w.max(0) as u64).sum();
    if total_weight == 0 {
        return Some((vec![0; weights.len()], amount));
    }

    let mut allocations = Vec::with_capacity(weights.len());
    let mut allocated: u64 = 0;
    for &w in weights {
        let part = mul_div_floor(amount, w.max(0) as u64, total_weight)?;
        allocated = allocated.checked_add(part)?;
        allocations.push(part);
    }
    let remainder = amount.checked_sub(allocated)?;
    Some((allocations, remainder))
}

/// Target idle balance: `idle_reserve_bps` of total assets.
pub fn idle_target(total_assets: u64, idle_reserve_bps: u16) -> Option<u64> {
    apply_bps(total_assets, idle_reserve_bps)
}
