use std::collections::BTreeMap;

use bytemuck::Zeroable;
use solana_program::pubkey::Pubkey;

use crate::error::VaultError;
use crate::registry::ProtocolRegistry;
use crate::safe_math::SafeMath;
use crate::state::{ShareAccount, VaultConfig, VaultState};
use crate::unstake::UnstakeBook;

/// Everything the vault persists: header, registry, share ledger, unstake table.
#[derive(Debug, Clone)]
pub struct Vault {
    pub state: VaultState,
    pub registry: ProtocolRegistry,
    pub accounts: BTreeMap<Pubkey, ShareAccount>,
    pub unstakes: UnstakeBook,
}

impl Default for Vault {
    fn default() -> Self {
        Self {
            state: VaultState::zeroed(),
            registry: ProtocolRegistry::new(),
            accounts: BTreeMap::new(),
            unstakes: UnstakeBook::default(),
        }
    }
}

impl Vault {
    /// An uninitialized vault; `initialize` (or the InitVault instruction) sets it up.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(
        &mut self,
        admin: &Pubkey,
        operator: &Pubkey,
        vault: &Pubkey,
        base_token: &Pubkey,
        config: &VaultConfig,
    ) -> Result<(), VaultError> {
        if self.state.is_initialized == 1 {
            return Err(VaultError::AlreadyInitialized);
        }
        if *vault == Pubkey::default() || *base_token == Pubkey::default() {
            return Err(VaultError::ConfigurationError);
        }

        let mut state = VaultState::zeroed();
        state.set_config(config)?;
        state.is_initialized = 1;
        state.admin = admin.to_bytes();
        state.operator = operator.to_bytes();
        state.vault = vault.to_bytes();
        state.base_token = base_token.to_bytes();
        state.next_request_id = 1;
        self.state = state;
        Ok(())
    }

    pub fn require_initialized(&self) -> Result<(), VaultError> {
        if self.state.is_initialized != 1 {
            return Err(VaultError::NotInitialized);
        }
        Ok(())
    }

    pub fn require_admin(&self, caller: &Pubkey) -> Result<(), VaultError> {
        self.require_initialized()?;
        if self.state.admin_pubkey() != *caller {
            return Err(VaultError::Unauthorized);
        }
        Ok(())
    }

    /// Operator-gated actions also accept the admin.
    pub fn require_operator(&self, caller: &Pubkey) -> Result<(), VaultError> {
        self.require_initialized()?;
        if self.state.operator_pubkey() != *caller && self.state.admin_pubkey() != *caller {
            return Err(VaultError::Unauthorized);
        }
        Ok(())
    }

    pub fn shares_of(&self, owner: &Pubkey) -> u64 {
        self.accounts.get(owner).map(|a| a.shares).unwrap_or(0)
    }

    pub(crate) fn credit_shares(&mut self, owner: &Pubkey, shares: u64, now: i64) -> Result<(), VaultError> {
        let total = self.state.total_shares.safe_add(shares)?;
        let account = self
            .accounts
            .entry(*owner)
            .or_insert_with(|| ShareAccount::new(owner));
        account.shares = account.shares.safe_add(shares)?;
        account.last_deposit_ts = now;
        self.state.total_shares = total;
        Ok(())
    }

    pub(crate) fn debit_shares(&mut self, owner: &Pubkey, shares: u64) -> Result<(), VaultError> {
        let held = self.shares_of(owner);
        if held < shares {
            return Err(VaultError::InsufficientShares);
        }
        let total = self.state.total_shares.safe_sub(shares)?;
        if let Some(account) = self.accounts.get_mut(owner) {
            account.shares = held.safe_sub(shares)?;
        }
        self.state.total_shares = total;
        Ok(())
    }

    /// Owner may not withdraw until `withdraw_cooldown_secs` after their last deposit.
    pub(crate) fn check_cooldown(&self, owner: &Pubkey, now: i64) -> Result<(), VaultError> {
        let cooldown = self.state.withdraw_cooldown_secs;
        if cooldown == 0 {
            return Ok(());
        }
        let last = match self.accounts.get(owner) {
            Some(a) => a.last_deposit_ts,
            None => return Ok(()),
        };
        if now < last.saturating_add(cooldown as i64) {
            return Err(VaultError::CooldownNotElapsed);
        }
        Ok(())
    }
}
