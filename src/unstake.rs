//! Delayed native unstaking: request, wait out unbonding, claim.
//!
//! Pending value stays in `total_assets` through `total_pending_unstake`
//! until the claim lands as idle base.

use std::collections::BTreeMap;

use solana_program::{msg, pubkey::Pubkey};

use crate::error::VaultError;
use crate::ledger::Ledger;
use crate::safe_math::SafeMath;
use crate::state::{UnstakeRequest, UnstakeStatus};
use crate::vault::Vault;

/// Open requests by id. Terminal requests are removed.
#[derive(Debug, Clone, Default)]
pub struct UnstakeBook {
    requests: BTreeMap<u64, UnstakeRequest>,
}

impl UnstakeBook {
    pub fn get(&self, id: u64) -> Result<&UnstakeRequest, VaultError> {
        self.requests.get(&id).ok_or(VaultError::UnknownRequest)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests_of(&self, requester: &Pubkey) -> Vec<UnstakeRequest> {
        let key = requester.to_bytes();
        self.requests
            .values()
            .filter(|r| r.requester == key)
            .copied()
            .collect()
    }

    fn insert(&mut self, request: UnstakeRequest) {
        self.requests.insert(request.id, request);
    }

    fn remove(&mut self, id: u64) -> Result<UnstakeRequest, VaultError> {
        self.requests.remove(&id).ok_or(VaultError::UnknownRequest)
    }
}

/// Status of request `id` at the ledger's current time.
pub fn status<L: Ledger>(vault: &Vault, ledger: &L, id: u64) -> Result<UnstakeStatus, VaultError> {
    Ok(vault.unstakes.get(id)?.status_at(ledger.now()))
}

pub fn requests_of(vault: &Vault, requester: &Pubkey) -> Vec<UnstakeRequest> {
    vault.unstakes.requests_of(requester)
}

/// Start unbonding `amount` native from protocol `index`. Returns the request id.
pub fn request_unstake<L: Ledger>(
    vault: &mut Vault,
    ledger: &mut L,
    caller: &Pubkey,
    index: usize,
    amount: u64,
) -> Result<u64, VaultError> {
    vault.require_operator(caller)?;
    if amount == 0 {
        return Err(VaultError::ZeroAmount);
    }
    let entry = *vault.registry.get(index)?;
    let holder = vault.state.vault_pubkey();
    let native_token = entry.base_asset_pubkey();

    let before = ledger
        .balance_of(&native_token, &holder)
        .map_err(|_| VaultError::StaleState)?;
    if before < amount {
        return Err(VaultError::InsufficientProtocolLiquidity);
    }

    let now = ledger.now();
    let period = i64::try_from(vault.state.unbonding_period_secs).map_err(|_| VaultError::Overflow)?;
    let claimable_at = now.checked_add(period).ok_or(VaultError::Overflow)?;
    let pending = vault.state.total_pending_unstake.safe_add(amount)?;
    let id = vault.state.next_request_id;
    let next_id = id.safe_add(1)?;

    ledger
        .unstake(&entry.unstake_handler_pubkey(), &holder, amount)
        .map_err(|_| VaultError::UnstakeFailed)?;
    let after = ledger
        .balance_of(&native_token, &holder)
        .map_err(|_| VaultError::StaleState)?;
    if after >= before {
        return Err(VaultError::UnstakeFailed);
    }

    vault.unstakes.insert(UnstakeRequest {
        id,
        requester: caller.to_bytes(),
        protocol_index: index as u32,
        status: UnstakeStatus::Pending as u8,
        _padding: [0; 3],
        native_amount: amount,
        requested_at: now,
        claimable_at,
    });
    vault.state.total_pending_unstake = pending;
    vault.state.next_request_id = next_id;

    msg!("Unstake {} requested: {} native from protocol {}, claimable at {}", id, amount, index, claimable_at);
    Ok(id)
}

/// Claim a matured request. Proceeds land in vault idle. Returns the claimed
/// request with its final status.
pub fn claim<L: Ledger>(
    vault: &mut Vault,
    ledger: &mut L,
    caller: &Pubkey,
    id: u64,
) -> Result<(UnstakeRequest, u64), VaultError> {
    vault.require_initialized()?;
    let request = *vault.unstakes.get(id)?;
    if request.requester_pubkey() != *caller {
        vault.require_operator(caller)?;
    }
    if request.status_at(ledger.now()) != UnstakeStatus::Claimable {
        return Err(VaultError::NotClaimable);
    }

    let entry = *vault.registry.get(request.protocol_index as usize)?;
    let holder = vault.state.vault_pubkey();
    let base_token = vault.state.base_token_pubkey();
    let pending = vault.state.total_pending_unstake.safe_sub(request.native_amount)?;

    let before = ledger
        .balance_of(&base_token, &holder)
        .map_err(|_| VaultError::StaleState)?;
    ledger
        .claim_unstake(&entry.unstake_handler_pubkey(), &holder, request.native_amount)
        .map_err(|_| VaultError::UnstakeFailed)?;
    let after = ledger
        .balance_of(&base_token, &holder)
        .map_err(|_| VaultError::StaleState)?;
    let received = after.safe_sub(before).map_err(|_| VaultError::StaleState)?;

    let mut receipt = vault.unstakes.remove(id)?;
    receipt.status = UnstakeStatus::Claimed as u8;
    vault.state.total_pending_unstake = pending;

    msg!("Unstake {} claimed: {} base", id, received);
    Ok((receipt, received))
}

/// Reverse a still-pending request. The native amount returns to the vault.
pub fn cancel_unstake<L: Ledger>(
    vault: &mut Vault,
    ledger: &mut L,
    caller: &Pubkey,
    id: u64,
) -> Result<UnstakeRequest, VaultError> {
    vault.require_operator(caller)?;
    let request = *vault.unstakes.get(id)?;
    if request.status_at(ledger.now()) != UnstakeStatus::Pending {
        return Err(VaultError::RequestNotPending);
    }

    let entry = *vault.registry.get(request.protocol_index as usize)?;
    let pending = vault.state.total_pending_unstake.safe_sub(request.native_amount)?;
    ledger
        .cancel_unstake(&entry.unstake_handler_pubkey(), &vault.state.vault_pubkey(), request.native_amount)
        .map_err(|_| VaultError::UnstakeFailed)?;

    let mut receipt = vault.unstakes.remove(id)?;
    receipt.status = UnstakeStatus::Cancelled as u8;
    vault.state.total_pending_unstake = pending;

    msg!("Unstake {} cancelled: {} native returned", id, request.native_amount);
    Ok(receipt)
}
