//! Shortfall planning: which staked positions to liquidate, and how much.
//!
//! Lowest APY goes first. Each protocol contributes at most its safety
//! fraction. A plan either covers the whole shortfall or is not produced.

use solana_program::msg;

use crate::error::VaultError;
use crate::ledger::Ledger;
use crate::math;
use crate::oracle;
use crate::shares;
use crate::vault::Vault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanStep {
    pub protocol_index: usize,
    /// Base-token value to raise from this protocol
    pub amount: u64,
    /// Capped value observed when planning
    pub liquidatable: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortfallPlan {
    pub steps: Vec<PlanStep>,
}

impl ShortfallPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.steps.iter().fold(0u64, |acc, s| acc.saturating_add(s.amount))
    }
}

/// Capped liquidatable value of protocol `index`, or `None` when its ratio
/// cannot be read right now.
pub fn liquidatable<L: Ledger>(
    vault: &Vault,
    ledger: &L,
    index: usize,
) -> Result<Option<u64>, VaultError> {
    let entry = vault.registry.get(index)?;
    if !entry.is_no_wrap() {
        if let Err(VaultError::RatioUnavailable) = oracle::quote(ledger, entry) {
            return Ok(None);
        }
    }
    let value = match shares::protocol_value(ledger, &vault.state.vault_pubkey(), entry) {
        Ok(v) => v,
        Err(VaultError::RatioUnavailable) => return Ok(None),
        Err(e) => return Err(e),
    };
    math::safety_cap(value, vault.state.safety_fraction_bps)
        .map(Some)
        .ok_or(VaultError::Overflow)
}

/// Plan liquidations covering `shortfall`, skipping `excluded` protocols.
pub fn select<L: Ledger>(
    vault: &Vault,
    ledger: &L,
    shortfall: u64,
    excluded: &[usize],
) -> Result<ShortfallPlan, VaultError> {
    let mut plan = ShortfallPlan::default();
    if shortfall == 0 {
        return Ok(plan);
    }

    let mut remaining = shortfall;
    for index in vault.registry.ranked_by_apy() {
        if excluded.contains(&index) {
            continue;
        }
        let cap = match liquidatable(vault, ledger, index)? {
            Some(cap) => cap,
            None => {
                msg!("Skipping protocol {}: ratio unavailable", index);
                continue;
            }
        };
        if cap == 0 {
            continue;
        }
        let take = cap.min(remaining);
        plan.steps.push(PlanStep {
            protocol_index: index,
            amount: take,
            liquidatable: cap,
        });
        remaining -= take;
        if remaining == 0 {
            return Ok(plan);
        }
    }

    msg!("Shortfall {} uncovered by {}", shortfall, remaining);
    Err(VaultError::InsufficientLiquidity)
}
