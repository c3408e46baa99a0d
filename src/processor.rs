use solana_program::{entrypoint::ProgramResult, msg, pubkey::Pubkey};

use crate::allocator;
use crate::error::VaultError;
use crate::instruction::{ConfigUpdate, VaultInstruction};
use crate::ledger::Ledger;
use crate::shares;
use crate::state::{ProtocolEntry, RateSource, VaultConfig};
use crate::unstake;
use crate::vault::Vault;
use crate::withdraw;

/// Decode and execute one instruction signed by `caller`.
///
/// Engine state is all-or-nothing: on any error the vault is restored to
/// its pre-call snapshot. External ledger effects are the host's to revert.
pub fn process<L: Ledger>(
    vault: &mut Vault,
    ledger: &mut L,
    caller: &Pubkey,
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = VaultInstruction::unpack(instruction_data)?;

    let snapshot = vault.clone();
    let result = dispatch(vault, ledger, caller, instruction);
    if let Err(e) = result {
        msg!("Error: {:?}", e);
        *vault = snapshot;
        return Err(e.into());
    }
    Ok(())
}

fn dispatch<L: Ledger>(
    vault: &mut Vault,
    ledger: &mut L,
    caller: &Pubkey,
    instruction: VaultInstruction,
) -> Result<(), VaultError> {
    match instruction {
        VaultInstruction::InitVault { operator, vault: holder, base_token, config } => {
            process_init_vault(vault, caller, &operator, &holder, &base_token, &config)
        }
        VaultInstruction::RegisterProtocol {
            rate_source,
            apy_bps,
            base_asset,
            wrapped_token,
            intermediate_token,
            pool_a,
            pool_b,
            unstake_handler,
        } => {
            let entry = ProtocolEntry::new(
                rate_source,
                apy_bps,
                &base_asset,
                &wrapped_token,
                &intermediate_token,
                &pool_a,
                &pool_b,
                &unstake_handler,
            );
            process_register_protocol(vault, caller, entry, rate_source)
        }
        VaultInstruction::Deposit { amount, recipient } => {
            shares::deposit(vault, ledger, caller, amount, &recipient).map(|_| ())
        }
        VaultInstruction::Withdraw { amount, owner, receiver } => {
            withdraw::withdraw(vault, ledger, caller, amount, &owner, &receiver).map(|_| ())
        }
        VaultInstruction::Redeem { shares, owner, receiver } => {
            withdraw::redeem(vault, ledger, caller, shares, &owner, &receiver).map(|_| ())
        }
        VaultInstruction::SetApy { index, apy_bps } => {
            process_set_apy(vault, caller, index as usize, apy_bps)
        }
        VaultInstruction::SetMultipleApy { apy_bps } => {
            process_set_multiple_apy(vault, caller, &apy_bps)
        }
        VaultInstruction::Rebalance => allocator::rebalance(vault, ledger, caller).map(|_| ()),
        VaultInstruction::RequestUnstake { protocol_index, amount } => {
            unstake::request_unstake(vault, ledger, caller, protocol_index as usize, amount).map(|_| ())
        }
        VaultInstruction::Claim { request_id } => {
            unstake::claim(vault, ledger, caller, request_id).map(|_| ())
        }
        VaultInstruction::CancelUnstake { request_id } => {
            unstake::cancel_unstake(vault, ledger, caller, request_id).map(|_| ())
        }
        VaultInstruction::UpdateConfig(update) => process_update_config(vault, caller, &update),
        VaultInstruction::SetOperator { operator } => process_set_operator(vault, caller, &operator),
    }
}

// ═══════════════════════════════════════════════════════════════
// Admin
// ═══════════════════════════════════════════════════════════════

fn process_init_vault(
    vault: &mut Vault,
    caller: &Pubkey,
    operator: &Pubkey,
    holder: &Pubkey,
    base_token: &Pubkey,
    config: &VaultConfig,
) -> Result<(), VaultError> {
    vault.initialize(caller, operator, holder, base_token, config)?;
    msg!("Vault initialized: holder {}, base token {}", holder, base_token);
    Ok(())
}

fn process_register_protocol(
    vault: &mut Vault,
    caller: &Pubkey,
    entry: ProtocolEntry,
    rate_source: RateSource,
) -> Result<(), VaultError> {
    vault.require_admin(caller)?;
    if entry.holds_token(&vault.state.base_token_pubkey()) {
        return Err(VaultError::ConfigurationError);
    }
    let index = vault.registry.register(entry)?;
    msg!("Protocol {} registered ({:?})", index, rate_source);
    Ok(())
}

fn process_update_config(
    vault: &mut Vault,
    caller: &Pubkey,
    update: &ConfigUpdate,
) -> Result<(), VaultError> {
    vault.require_admin(caller)?;
    let next = update.apply(&vault.state.config()?);
    vault.state.set_config(&next)?;
    msg!("Vault config updated");
    Ok(())
}

fn process_set_operator(vault: &mut Vault, caller: &Pubkey, operator: &Pubkey) -> Result<(), VaultError> {
    vault.require_admin(caller)?;
    vault.state.operator = operator.to_bytes();
    msg!("Operator set to {}", operator);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// Operator
// ═══════════════════════════════════════════════════════════════

fn process_set_apy(vault: &mut Vault, caller: &Pubkey, index: usize, apy_bps: i32) -> Result<(), VaultError> {
    vault.require_operator(caller)?;
    vault.registry.set_apy(index, apy_bps)?;
    msg!("Protocol {} APY set to {} bps", index, apy_bps);
    Ok(())
}

fn process_set_multiple_apy(vault: &mut Vault, caller: &Pubkey, apy_bps: &[i32]) -> Result<(), VaultError> {
    vault.require_operator(caller)?;
    vault.registry.set_multiple_apy(apy_bps)?;
    msg!("APY weights updated for {} protocols", apy_bps.len());
    Ok(())
}
