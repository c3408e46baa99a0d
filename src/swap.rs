//! Liquidation of one protocol position into base token.
//!
//! native --wrap--> wrapped --pool_a--> intermediate --pool_b--> base
//!
//! The no-wrap protocol enters the path directly with its native token.
//! The result is always the measured base balance delta, never the
//! venue-reported amount.

use solana_program::{msg, pubkey::Pubkey};

use crate::error::VaultError;
use crate::ledger::{Ledger, SwapRoute};
use crate::math;
use crate::oracle::{self, Ratio};
use crate::safe_math::SafeMath;
use crate::state::ProtocolEntry;
use crate::vault::Vault;

fn balance<L: Ledger>(ledger: &L, token: &Pubkey, holder: &Pubkey) -> Result<u64, VaultError> {
    ledger.balance_of(token, holder).map_err(|_| VaultError::StaleState)
}

fn cap(balance: u64, safety_fraction_bps: u16) -> Result<u64, VaultError> {
    math::safety_cap(balance, safety_fraction_bps).ok_or(VaultError::Overflow)
}

/// Wrap native until at least `wrapped_needed` is held, then return how much
/// wrapped to swap.
fn prepare_wrapped<L: Ledger>(
    vault: &Vault,
    ledger: &mut L,
    entry: &ProtocolEntry,
    ratio: &Ratio,
    wrapped_needed: u64,
) -> Result<u64, VaultError> {
    let holder = vault.state.vault_pubkey();
    let wrapped_token = entry.wrapped_token_pubkey();
    let wrapped_before = balance(ledger, &wrapped_token, &holder)?;
    if wrapped_before >= wrapped_needed {
        return Ok(wrapped_needed);
    }

    let to_wrap = wrapped_needed.safe_sub(wrapped_before)?;
    let native = balance(ledger, &entry.base_asset_pubkey(), &holder)?;
    let native_required = ratio.native_to_wrap(to_wrap)?;
    let native_in = native_required.min(cap(native, vault.state.safety_fraction_bps)?);
    if native_in == 0 {
        return Err(VaultError::InsufficientProtocolLiquidity);
    }

    ledger
        .wrap(&wrapped_token, &holder, native_in)
        .map_err(|e| {
            msg!("Wrap of {} reverted: {:?}", native_in, e);
            VaultError::WrapVerificationFailed
        })?;

    let wrapped_after = balance(ledger, &wrapped_token, &holder)?;
    if wrapped_after <= wrapped_before {
        msg!("Wrap of {} reported success, wrapped balance unchanged", native_in);
        return Err(VaultError::WrapVerificationFailed);
    }

    let amount = wrapped_needed.min(wrapped_after);
    if amount == 0 {
        return Err(VaultError::InsufficientProtocolLiquidity);
    }
    Ok(amount)
}

/// Each hop's pool must hold both of its tokens; the last pool must hold at
/// least `min_out` of base.
fn check_route<L: Ledger>(ledger: &L, route: &SwapRoute) -> Result<(), VaultError> {
    if !route.is_chained() {
        return Err(VaultError::ConfigurationError);
    }
    let last = route.hops.len().saturating_sub(1);
    for (i, hop) in route.hops.iter().enumerate() {
        let tokens = ledger.pool_tokens(&hop.pool).map_err(|e| {
            msg!("Pool {} unreadable: {:?}", hop.pool, e);
            VaultError::SwapRejected
        })?;
        let reserve_of = |t: &Pubkey| tokens.iter().find(|(k, _)| k == t).map(|(_, r)| *r);
        if reserve_of(&hop.token_in).is_none() {
            return Err(VaultError::ConfigurationError);
        }
        let out_reserve = reserve_of(&hop.token_out).ok_or(VaultError::ConfigurationError)?;
        if i == last && out_reserve < route.min_out {
            return Err(VaultError::InsufficientProtocolLiquidity);
        }
    }
    Ok(())
}

fn route_for(vault: &Vault, entry: &ProtocolEntry, amount_in: u64, min_out: u64) -> SwapRoute {
    SwapRoute::two_hop(
        entry.wrapped_token_pubkey(),
        entry.intermediate_token_pubkey(),
        vault.state.base_token_pubkey(),
        entry.pool_a_pubkey(),
        entry.pool_b_pubkey(),
        amount_in,
        min_out,
    )
}

/// Liquidate enough of protocol `index` to raise `base_needed` base token.
/// Returns the base actually received.
pub fn liquidate<L: Ledger>(
    vault: &Vault,
    ledger: &mut L,
    index: usize,
    base_needed: u64,
) -> Result<u64, VaultError> {
    if base_needed == 0 {
        return Ok(0);
    }
    let entry = *vault.registry.get(index)?;
    let holder = vault.state.vault_pubkey();
    let buffer = vault.state.buffer_bps;

    let ratio = oracle::quote(ledger, &entry)?;
    let swap_amount = if entry.is_no_wrap() {
        let native = balance(ledger, &entry.base_asset_pubkey(), &holder)?;
        let amount = oracle::buffered(base_needed, buffer)?
            .min(cap(native, vault.state.safety_fraction_bps)?);
        if amount == 0 {
            return Err(VaultError::InsufficientProtocolLiquidity);
        }
        amount
    } else {
        let wrapped_needed = oracle::buffered(ratio.wrapped_for(base_needed)?, buffer)?;
        prepare_wrapped(vault, ledger, &entry, &ratio, wrapped_needed)?
    };

    let expected = ratio.base_for(swap_amount)?;
    let min_out = math::min_out(expected, vault.state.slippage_bps).ok_or(VaultError::Overflow)?;
    let route = route_for(vault, &entry, swap_amount, min_out);
    check_route(ledger, &route)?;

    let base_token = vault.state.base_token_pubkey();
    let base_before = balance(ledger, &base_token, &holder)?;
    let reported = ledger.batch_swap(&holder, &route).map_err(|e| {
        msg!("Swap for protocol {} reverted: {:?}", index, e);
        VaultError::SwapRejected
    })?;
    let base_after = balance(ledger, &base_token, &holder)?;
    if base_after < base_before {
        return Err(VaultError::StaleState);
    }
    let received = base_after - base_before;
    if received < min_out {
        msg!(
            "Swap for protocol {} delivered {} (reported {}), min {}",
            index,
            received,
            reported,
            min_out
        );
        return Err(VaultError::SwapSlippageExceeded);
    }

    msg!("Liquidated protocol {}: {} in, {} base out", index, swap_amount, received);
    Ok(received)
}
