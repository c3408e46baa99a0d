//! Share accounting: total assets, previews, deposits.
//!
//! `total_assets = idle base + Σ protocol value + pending unstakes`.
//! Native LST is valued 1:1 with base; wrapped LST through its current
//! ratio. Additions only, so nothing here can underflow.

use solana_program::{msg, pubkey::Pubkey};

use crate::allocator;
use crate::error::VaultError;
use crate::ledger::Ledger;
use crate::math;
use crate::oracle;
use crate::safe_math::SafeMath;
use crate::state::ProtocolEntry;
use crate::vault::Vault;

/// Native + valued wrapped balance of one protocol held by `holder`.
pub fn protocol_value<L: Ledger>(
    ledger: &L,
    holder: &Pubkey,
    entry: &ProtocolEntry,
) -> Result<u64, VaultError> {
    let native = ledger
        .balance_of(&entry.base_asset_pubkey(), holder)
        .map_err(|_| VaultError::StaleState)?;
    if entry.is_no_wrap() {
        return Ok(native);
    }
    let wrapped = ledger
        .balance_of(&entry.wrapped_token_pubkey(), holder)
        .map_err(|_| VaultError::StaleState)?;
    if wrapped == 0 {
        return Ok(native);
    }
    let ratio = oracle::quote(ledger, entry)?;
    native.safe_add(ratio.base_for(wrapped)?)
}

/// Idle settlement-token balance of the vault.
pub fn idle_base<L: Ledger>(vault: &Vault, ledger: &L) -> Result<u64, VaultError> {
    ledger
        .balance_of(&vault.state.base_token_pubkey(), &vault.state.vault_pubkey())
        .map_err(|_| VaultError::StaleState)
}

pub fn total_assets<L: Ledger>(vault: &Vault, ledger: &L) -> Result<u64, VaultError> {
    let holder = vault.state.vault_pubkey();
    let mut total = idle_base(vault, ledger)?;
    for entry in vault.registry.entries() {
        total = total.safe_add(protocol_value(ledger, &holder, entry)?)?;
    }
    total.safe_add(vault.state.total_pending_unstake)
}

fn deposit_shares(vault: &Vault, total_assets: u64, assets: u64) -> Result<u64, VaultError> {
    let supply = vault.state.total_shares;
    if (supply == 0) != (total_assets == 0) {
        return Err(VaultError::DepositBlocked);
    }
    vault
        .state
        .calc_shares_for_deposit(total_assets, assets)
        .ok_or(VaultError::Overflow)
}

pub fn preview_deposit<L: Ledger>(vault: &Vault, ledger: &L, assets: u64) -> Result<u64, VaultError> {
    let total = total_assets(vault, ledger)?;
    deposit_shares(vault, total, assets)
}

/// Shares burned by `withdraw(assets)` right now (rounds up).
pub fn preview_withdraw<L: Ledger>(vault: &Vault, ledger: &L, assets: u64) -> Result<u64, VaultError> {
    let total = total_assets(vault, ledger)?;
    vault
        .state
        .calc_shares_for_withdraw(total, assets)
        .ok_or(VaultError::InsufficientShares)
}

/// Assets paid by `redeem(shares)` right now (rounds down).
pub fn preview_redeem<L: Ledger>(vault: &Vault, ledger: &L, shares: u64) -> Result<u64, VaultError> {
    let total = total_assets(vault, ledger)?;
    vault
        .state
        .calc_assets_for_redeem(total, shares)
        .ok_or(VaultError::InsufficientShares)
}

/// Shares worth `assets`, rounding down. 1:1 on an empty vault.
pub fn convert_to_shares<L: Ledger>(vault: &Vault, ledger: &L, assets: u64) -> Result<u64, VaultError> {
    let total = total_assets(vault, ledger)?;
    if vault.state.total_shares == 0 || total == 0 {
        return Ok(assets);
    }
    math::mul_div_floor(assets, vault.state.total_shares, total).ok_or(VaultError::Overflow)
}

/// Assets worth `shares`, rounding down. 1:1 on an empty vault.
pub fn convert_to_assets<L: Ledger>(vault: &Vault, ledger: &L, shares: u64) -> Result<u64, VaultError> {
    let total = total_assets(vault, ledger)?;
    if vault.state.total_shares == 0 {
        return Ok(shares);
    }
    math::mul_div_floor(shares, total, vault.state.total_shares).ok_or(VaultError::Overflow)
}

/// Pull `amount` base from `depositor`, mint shares to `recipient`, then stake
/// the non-reserve part across protocols by APY weight.
pub fn deposit<L: Ledger>(
    vault: &mut Vault,
    ledger: &mut L,
    depositor: &Pubkey,
    amount: u64,
    recipient: &Pubkey,
) -> Result<u64, VaultError> {
    vault.require_initialized()?;
    if amount == 0 {
        return Err(VaultError::ZeroAmount);
    }
    vault.registry.validate()?;

    // Price shares before the deposit lands.
    let total = total_assets(vault, ledger)?;
    if vault.state.deposit_cap > 0 && total.safe_add(amount)? > vault.state.deposit_cap {
        return Err(VaultError::DepositCapExceeded);
    }
    let shares = deposit_shares(vault, total, amount)?;
    if shares == 0 {
        return Err(VaultError::ZeroAmount);
    }

    let base = vault.state.base_token_pubkey();
    let holder = vault.state.vault_pubkey();
    ledger
        .transfer(&base, depositor, &holder, amount)
        .map_err(|_| VaultError::TransferFailed)?;

    let reserve = math::apply_bps(amount, vault.state.idle_reserve_bps).ok_or(VaultError::Overflow)?;
    let to_stake = amount.safe_sub(reserve)?;
    let staked = allocator::allocate(vault, ledger, to_stake)?;

    let now = ledger.now();
    vault.credit_shares(recipient, shares, now)?;
    vault.state.total_deposited = vault.state.total_deposited.safe_add(amount)?;

    msg!("Deposited {} base, minted {} shares, staked {}", amount, shares, staked);
    Ok(shares)
}
