//! Deposit allocation across protocols by APY weight.

use solana_program::{msg, pubkey::Pubkey};

use crate::error::VaultError;
use crate::ledger::Ledger;
use crate::math;
use crate::registry::ProtocolRegistry;
use crate::safe_math::SafeMath;
use crate::shares;
use crate::state::RemainderPolicy;
use crate::vault::Vault;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    /// `(protocol_index, base_amount)`, nonzero amounts only, index order
    pub stakes: Vec<(usize, u64)>,
    /// Left idle
    pub idle: u64,
}

impl AllocationPlan {
    pub fn staked(&self) -> u64 {
        self.stakes.iter().fold(0u64, |acc, (_, a)| acc.saturating_add(*a))
    }
}

/// Split `amount` by weight. Pure; Σ stakes + idle == amount.
pub fn plan_allocation(
    registry: &ProtocolRegistry,
    amount: u64,
    remainder: RemainderPolicy,
) -> Result<AllocationPlan, VaultError> {
    let weights = registry.weights();
    let (mut parts, mut idle) =
        math::allocate_by_weight(amount, &weights).ok_or(VaultError::Overflow)?;

    if remainder == RemainderPolicy::FirstProtocol && idle > 0 {
        if let Some(first) = weights.iter().position(|&w| w > 0) {
            parts[first] = parts[first].safe_add(idle)?;
            idle = 0;
        }
    }

    let stakes = parts
        .into_iter()
        .enumerate()
        .filter(|(_, a)| *a > 0)
        .collect();
    Ok(AllocationPlan { stakes, idle })
}

fn stake_plan<L: Ledger>(
    vault: &Vault,
    ledger: &mut L,
    plan: &AllocationPlan,
) -> Result<u64, VaultError> {
    let holder: Pubkey = vault.state.vault_pubkey();
    let mut staked = 0u64;
    for &(index, amount) in &plan.stakes {
        let entry = vault.registry.get(index)?;
        ledger
            .stake(&entry.unstake_handler_pubkey(), &holder, amount)
            .map_err(|e| {
                msg!("Stake of {} into protocol {} failed: {:?}", amount, index, e);
                VaultError::StakeFailed
            })?;
        staked = staked.safe_add(amount)?;
    }
    Ok(staked)
}

/// Stake `amount` of idle base by weight. Returns the amount staked.
pub fn allocate<L: Ledger>(vault: &Vault, ledger: &mut L, amount: u64) -> Result<u64, VaultError> {
    if amount == 0 || vault.registry.is_empty() {
        return Ok(0);
    }
    let policy = RemainderPolicy::from_u8(vault.state.remainder_policy)
        .ok_or(VaultError::ConfigurationError)?;
    let plan = plan_allocation(&vault.registry, amount, policy)?;
    stake_plan(vault, ledger, &plan)
}

/// Stake idle base above the reserve target. Operator/admin only.
pub fn rebalance<L: Ledger>(vault: &Vault, ledger: &mut L, caller: &Pubkey) -> Result<u64, VaultError> {
    vault.require_operator(caller)?;
    vault.registry.validate()?;

    let total = shares::total_assets(vault, ledger)?;
    let target = math::idle_target(total, vault.state.idle_reserve_bps).ok_or(VaultError::Overflow)?;
    let idle = shares::idle_base(vault, ledger)?;
    let excess = math::shortfall(idle, target);
    let staked = allocate(vault, ledger, excess)?;
    msg!("Rebalanced: idle {}, target {}, staked {}", idle, target, staked);
    Ok(staked)
}
