//! Withdrawals: price the request, cover any idle shortfall by liquidating
//! staked positions, then pay out exactly what was asked.
//!
//! Payout is all-or-nothing. If the shortfall cannot be covered no shares
//! are burned and nothing is transferred.

use solana_program::{msg, pubkey::Pubkey};

use crate::error::VaultError;
use crate::ledger::Ledger;
use crate::math;
use crate::safe_math::SafeMath;
use crate::selector;
use crate::shares;
use crate::state::ShortfallPolicy;
use crate::swap;
use crate::vault::Vault;

/// Raise idle base until it covers `requested`. Returns total base received
/// from liquidations (0 when idle already suffices).
///
/// `InsufficientLiquidity` means the positions cannot cover the shortfall at
/// all. When a plan existed but its steps failed, the last step error is
/// returned instead.
pub fn cover_shortfall<L: Ledger>(
    vault: &Vault,
    ledger: &mut L,
    requested: u64,
) -> Result<u64, VaultError> {
    let idle = shares::idle_base(vault, ledger)?;
    let mut remaining = math::shortfall(requested, idle);
    if remaining == 0 {
        return Ok(0);
    }

    let policy = ShortfallPolicy::from_u8(vault.state.shortfall_policy)
        .ok_or(VaultError::ConfigurationError)?;
    let rounds = match policy {
        ShortfallPolicy::AllOrNothing => 1,
        ShortfallPolicy::Replan => 1 + vault.state.max_replan_rounds as usize,
    };

    let mut excluded: Vec<usize> = Vec::new();
    let mut last_failure: Option<VaultError> = None;
    let mut received_total = 0u64;
    for round in 0..rounds {
        let plan = match selector::select(vault, ledger, remaining, &excluded) {
            Ok(plan) => plan,
            // Exclusions shrank the candidate set; report what excluded them
            Err(VaultError::InsufficientLiquidity) if last_failure.is_some() => break,
            Err(e) => return Err(e),
        };
        for step in &plan.steps {
            let ask = step.amount.min(remaining);
            match swap::liquidate(vault, ledger, step.protocol_index, ask) {
                Ok(received) => {
                    received_total = received_total.safe_add(received)?;
                    remaining = math::shortfall(remaining, received);
                }
                Err(e) if e.is_recoverable() => {
                    msg!("Liquidation of protocol {} failed: {:?}", step.protocol_index, e);
                    excluded.push(step.protocol_index);
                    last_failure = Some(e);
                }
                Err(e) => return Err(e),
            }
            if remaining == 0 {
                return Ok(received_total);
            }
        }
        msg!("Shortfall round {} left {} uncovered", round, remaining);
    }
    Err(last_failure.unwrap_or(VaultError::InsufficientLiquidity))
}

fn settle<L: Ledger>(
    vault: &mut Vault,
    ledger: &mut L,
    owner: &Pubkey,
    receiver: &Pubkey,
    assets: u64,
    shares: u64,
) -> Result<(), VaultError> {
    if vault.shares_of(owner) < shares {
        return Err(VaultError::InsufficientShares);
    }
    vault.check_cooldown(owner, ledger.now())?;

    let liquidated = cover_shortfall(vault, ledger, assets)?;
    let idle = shares::idle_base(vault, ledger)?;
    if idle < assets {
        return Err(VaultError::InsufficientLiquidity);
    }

    ledger
        .transfer(&vault.state.base_token_pubkey(), &vault.state.vault_pubkey(), receiver, assets)
        .map_err(|_| VaultError::TransferFailed)?;
    vault.debit_shares(owner, shares)?;
    vault.state.total_withdrawn = vault.state.total_withdrawn.safe_add(assets)?;

    msg!(
        "Withdrew {} base for {} shares (liquidated {})",
        assets,
        shares,
        liquidated
    );
    Ok(())
}

fn check_owner(caller: &Pubkey, owner: &Pubkey) -> Result<(), VaultError> {
    if caller != owner {
        return Err(VaultError::Unauthorized);
    }
    Ok(())
}

/// Withdraw exactly `assets` base to `receiver`. Returns shares burned.
pub fn withdraw<L: Ledger>(
    vault: &mut Vault,
    ledger: &mut L,
    caller: &Pubkey,
    assets: u64,
    owner: &Pubkey,
    receiver: &Pubkey,
) -> Result<u64, VaultError> {
    vault.require_initialized()?;
    check_owner(caller, owner)?;
    if assets == 0 {
        return Err(VaultError::ZeroAmount);
    }
    vault.registry.validate()?;

    let shares = shares::preview_withdraw(vault, ledger, assets)?;
    settle(vault, ledger, owner, receiver, assets, shares)?;
    Ok(shares)
}

/// Burn `shares` and pay their current value to `receiver`. Returns assets paid.
pub fn redeem<L: Ledger>(
    vault: &mut Vault,
    ledger: &mut L,
    caller: &Pubkey,
    shares: u64,
    owner: &Pubkey,
    receiver: &Pubkey,
) -> Result<u64, VaultError> {
    vault.require_initialized()?;
    check_owner(caller, owner)?;
    if shares == 0 {
        return Err(VaultError::ZeroAmount);
    }
    vault.registry.validate()?;

    let assets = shares::preview_redeem(vault, ledger, shares)?;
    if assets == 0 {
        return Err(VaultError::ZeroAmount);
    }
    settle(vault, ledger, owner, receiver, assets, shares)?;
    Ok(assets)
}
