use bytemuck::{Pod, Zeroable};
use solana_program::pubkey::Pubkey;

use crate::error::VaultError;
use crate::math::{self, BPS_DENOMINATOR};

/// Default wrap buffer: +5% over the estimated wrapped amount.
pub const DEFAULT_BUFFER_BPS: u16 = 500;
/// Default swap slippage tolerance: 5%.
pub const DEFAULT_SLIPPAGE_BPS: u16 = 500;
/// Default per-protocol liquidation cap: 70% of its balance.
pub const DEFAULT_SAFETY_FRACTION_BPS: u16 = 7_000;
/// Default unbonding period: 14 days.
pub const DEFAULT_UNBONDING_PERIOD_SECS: u64 = 14 * 24 * 60 * 60;
/// Default extra planning rounds under `ShortfallPolicy::Replan`.
pub const DEFAULT_MAX_REPLAN_ROUNDS: u8 = 2;

/// How a protocol converts between its native token and its AMM-tradable wrapped form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RateSource {
    /// Native token trades directly; wrapped_token == base_asset.
    NoWrap = 0,
    /// Protocol quotes wrapped units per native unit ("get wrapped by native").
    WrappedPerNative = 1,
    /// Protocol quotes native units per wrapped unit ("get native by wrapped").
    NativePerWrapped = 2,
}

impl RateSource {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::NoWrap),
            1 => Some(Self::WrappedPerNative),
            2 => Some(Self::NativePerWrapped),
            _ => None,
        }
    }
}

/// What to do with the floor-division remainder of a deposit allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RemainderPolicy {
    Idle = 0,
    FirstProtocol = 1,
}

impl RemainderPolicy {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Idle),
            1 => Some(Self::FirstProtocol),
            _ => None,
        }
    }
}

/// What a withdrawal does when its first liquidation plan falls short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShortfallPolicy {
    /// One plan; if it doesn't cover the shortfall the withdrawal fails.
    AllOrNothing = 0,
    /// Re-plan from fresh balances up to `max_replan_rounds` more times.
    Replan = 1,
}

impl ShortfallPolicy {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::AllOrNothing),
            1 => Some(Self::Replan),
            _ => None,
        }
    }
}

/// Unstake request lifecycle. `Claimable` is never stored; it is derived
/// from `claimable_at` at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnstakeStatus {
    Pending = 0,
    Claimable = 1,
    Claimed = 2,
    Cancelled = 3,
}

/// Vault state, one per vault.
///
/// `vault` is the ledger address holding every token the vault owns: idle
/// base, native LST, wrapped LST. Protocol balances are never stored here;
/// they are read from the ledger on every call.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct VaultState {
    /// Whether the vault is initialized (1 = yes, 0 = no)
    pub is_initialized: u8,

    /// `RemainderPolicy` discriminant
    pub remainder_policy: u8,

    /// `ShortfallPolicy` discriminant
    pub shortfall_policy: u8,

    /// Extra planning rounds allowed under `ShortfallPolicy::Replan`
    pub max_replan_rounds: u8,

    /// Padding for alignment
    pub _padding: [u8; 4],

    /// Registers protocols, updates config, appoints the operator
    pub admin: [u8; 32],

    /// Sets APY weights, rebalances, requests/cancels unstakes
    pub operator: [u8; 32],

    /// Ledger address holding the vault's tokens
    pub vault: [u8; 32],

    /// Settlement base token (deposits in, withdrawals out)
    pub base_token: [u8; 32],

    /// Total shares in circulation
    pub total_shares: u64,

    /// Native amount sent to unstake handlers and not yet claimed
    pub total_pending_unstake: u64,

    /// Lifetime base deposited
    pub total_deposited: u64,

    /// Lifetime base withdrawn
    pub total_withdrawn: u64,

    /// Maximum total assets (0 = uncapped)
    pub deposit_cap: u64,

    /// Seconds after an owner's last deposit before they may withdraw
    pub withdraw_cooldown_secs: u64,

    /// Seconds between an unstake request and its claim
    pub unbonding_period_secs: u64,

    /// Next unstake request id
    pub next_request_id: u64,

    /// Buffer applied to wrapped-amount estimates
    pub buffer_bps: u16,

    /// Swap slippage tolerance
    pub slippage_bps: u16,

    /// Max fraction of a protocol's balance liquidated per step
    pub safety_fraction_bps: u16,

    /// Fraction of assets kept idle on deposit/rebalance
    pub idle_reserve_bps: u16,

    /// Reserved for future use
    pub _reserved: [u8; 64],
}

/// Size of VaultState in bytes
pub const VAULT_STATE_SIZE: usize = core::mem::size_of::<VaultState>();

/// Registry entry, one per supported LST.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct ProtocolEntry {
    /// Whether this entry is initialized
    pub is_initialized: u8,

    /// `RateSource` discriminant
    pub rate_source: u8,

    /// Padding
    pub _padding: [u8; 2],

    /// Ranking weight in basis points (signed, operator-settable)
    pub apy_bps: i32,

    /// Native staking token
    pub base_asset: [u8; 32],

    /// AMM-tradable representation (== base_asset for the no-wrap protocol)
    pub wrapped_token: [u8; 32],

    /// Token between the two swap hops
    pub intermediate_token: [u8; 32],

    /// Pool for hop 1: wrapped → intermediate
    pub pool_a: [u8; 32],

    /// Pool for hop 2: intermediate → base token
    pub pool_b: [u8; 32],

    /// Native staking contract (stake, unstake, claim)
    pub unstake_handler: [u8; 32],

    /// Reserved for future use
    pub _reserved: [u8; 32],
}

/// Size of ProtocolEntry in bytes
pub const PROTOCOL_ENTRY_SIZE: usize = core::mem::size_of::<ProtocolEntry>();

/// Per-owner share record.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct ShareAccount {
    /// Whether this record is initialized
    pub is_initialized: u8,

    /// Padding
    pub _padding: [u8; 7],

    /// Share owner
    pub owner: [u8; 32],

    /// Shares held
    pub shares: u64,

    /// Timestamp of last deposit credited to this owner (cooldown anchor)
    pub last_deposit_ts: i64,

    /// Reserved for future use
    pub _reserved: [u8; 32],
}

/// Size of ShareAccount in bytes
pub const SHARE_ACCOUNT_SIZE: usize = core::mem::size_of::<ShareAccount>();

/// A native unstake awaiting its unbonding period.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct UnstakeRequest {
    /// Opaque request id
    pub id: u64,

    /// Who asked for the unstake
    pub requester: [u8; 32],

    /// Registry index of the protocol being unstaked
    pub protocol_index: u32,

    /// Stored `UnstakeStatus` (Pending, or a terminal state on a receipt)
    pub status: u8,

    /// Padding
    pub _padding: [u8; 3],

    /// Native amount handed to the unstake handler
    pub native_amount: u64,

    /// Request timestamp
    pub requested_at: i64,

    /// requested_at + unbonding period
    pub claimable_at: i64,
}

/// Size of UnstakeRequest in bytes
pub const UNSTAKE_REQUEST_SIZE: usize = core::mem::size_of::<UnstakeRequest>();

/// Tunables carried by `VaultState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultConfig {
    pub buffer_bps: u16,
    pub slippage_bps: u16,
    pub safety_fraction_bps: u16,
    pub idle_reserve_bps: u16,
    pub unbonding_period_secs: u64,
    pub withdraw_cooldown_secs: u64,
    pub deposit_cap: u64,
    pub remainder_policy: RemainderPolicy,
    pub shortfall_policy: ShortfallPolicy,
    pub max_replan_rounds: u8,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            buffer_bps: DEFAULT_BUFFER_BPS,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            safety_fraction_bps: DEFAULT_SAFETY_FRACTION_BPS,
            idle_reserve_bps: 0,
            unbonding_period_secs: DEFAULT_UNBONDING_PERIOD_SECS,
            withdraw_cooldown_secs: 0,
            deposit_cap: 0,
            remainder_policy: RemainderPolicy::Idle,
            shortfall_policy: ShortfallPolicy::AllOrNothing,
            max_replan_rounds: DEFAULT_MAX_REPLAN_ROUNDS,
        }
    }
}

impl VaultConfig {
    pub fn validate(&self) -> Result<(), VaultError> {
        let full = BPS_DENOMINATOR as u16;
        if self.buffer_bps > full
            || self.slippage_bps >= full
            || self.safety_fraction_bps == 0
            || self.safety_fraction_bps > full
            || self.idle_reserve_bps > full
            || self.unbonding_period_secs > i64::MAX as u64
            || self.withdraw_cooldown_secs > i64::MAX as u64
        {
            return Err(VaultError::ConfigurationError);
        }
        Ok(())
    }
}

impl VaultState {
    pub fn admin_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.admin)
    }

    pub fn operator_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.operator)
    }

    pub fn vault_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.vault)
    }

    pub fn base_token_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.base_token)
    }

    pub fn config(&self) -> Result<VaultConfig, VaultError> {
        Ok(VaultConfig {
            buffer_bps: self.buffer_bps,
            slippage_bps: self.slippage_bps,
            safety_fraction_bps: self.safety_fraction_bps,
            idle_reserve_bps: self.idle_reserve_bps,
            unbonding_period_secs: self.unbonding_period_secs,
            withdraw_cooldown_secs: self.withdraw_cooldown_secs,
            deposit_cap: self.deposit_cap,
            remainder_policy: RemainderPolicy::from_u8(self.remainder_policy)
                .ok_or(VaultError::ConfigurationError)?,
            shortfall_policy: ShortfallPolicy::from_u8(self.shortfall_policy)
                .ok_or(VaultError::ConfigurationError)?,
            max_replan_rounds: self.max_replan_rounds,
        })
    }

    /// Validate and store a config block.
    pub fn set_config(&mut self, config: &VaultConfig) -> Result<(), VaultError> {
        config.validate()?;
        self.buffer_bps = config.buffer_bps;
        self.slippage_bps = config.slippage_bps;
        self.safety_fraction_bps = config.safety_fraction_bps;
        self.idle_reserve_bps = config.idle_reserve_bps;
        self.unbonding_period_secs = config.unbonding_period_secs;
        self.withdraw_cooldown_secs = config.withdraw_cooldown_secs;
        self.deposit_cap = config.deposit_cap;
        self.remainder_policy = config.remainder_policy as u8;
        self.shortfall_policy = config.shortfall_policy as u8;
        self.max_replan_rounds = config.max_replan_rounds;
        Ok(())
    }

    /// Shares minted for depositing `assets` against `total_assets`.
    pub fn calc_shares_for_deposit(&self, total_assets: u64, assets: u64) -> Option<u64> {
        math::calc_shares_for_deposit(self.total_shares, total_assets, assets)
    }

    /// Shares burned to withdraw exactly `assets` (rounds up).
    pub fn calc_shares_for_withdraw(&self, total_assets: u64, assets: u64) -> Option<u64> {
        math::calc_shares_for_withdraw(self.total_shares, total_assets, assets)
    }

    /// Assets paid for redeeming `shares` (rounds down).
    pub fn calc_assets_for_redeem(&self, total_assets: u64, shares: u64) -> Option<u64> {
        math::calc_assets_for_redeem(self.total_shares, total_assets, shares)
    }
}

impl ProtocolEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rate_source: RateSource,
        apy_bps: i32,
        base_asset: &Pubkey,
        wrapped_token: &Pubkey,
        intermediate_token: &Pubkey,
        pool_a: &Pubkey,
        pool_b: &Pubkey,
        unstake_handler: &Pubkey,
    ) -> Self {
        let mut entry = Self::zeroed();
        entry.is_initialized = 1;
        entry.rate_source = rate_source as u8;
        entry.apy_bps = apy_bps;
        entry.base_asset = base_asset.to_bytes();
        entry.wrapped_token = wrapped_token.to_bytes();
        entry.intermediate_token = intermediate_token.to_bytes();
        entry.pool_a = pool_a.to_bytes();
        entry.pool_b = pool_b.to_bytes();
        entry.unstake_handler = unstake_handler.to_bytes();
        entry
    }

    pub fn rate_source(&self) -> Result<RateSource, VaultError> {
        RateSource::from_u8(self.rate_source).ok_or(VaultError::ConfigurationError)
    }

    pub fn is_no_wrap(&self) -> bool {
        self.base_asset == self.wrapped_token
    }

    pub fn base_asset_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.base_asset)
    }

    pub fn wrapped_token_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.wrapped_token)
    }

    pub fn intermediate_token_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.intermediate_token)
    }

    pub fn pool_a_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool_a)
    }

    pub fn pool_b_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool_b)
    }

    pub fn unstake_handler_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.unstake_handler)
    }

    /// Whether either of `other`'s tokens is one of ours, in any role.
    pub fn shares_token_with(&self, other: &ProtocolEntry) -> bool {
        let ours = [&self.base_asset, &self.wrapped_token];
        ours.contains(&&other.base_asset) || ours.contains(&&other.wrapped_token)
    }

    /// Holds `token` as its native or wrapped form.
    pub fn holds_token(&self, token: &Pubkey) -> bool {
        let key = token.to_bytes();
        self.base_asset == key || self.wrapped_token == key
    }

    /// Structural checks: tagged rate source agrees with the token pair,
    /// and no address is left unset.
    pub fn validate(&self) -> Result<(), VaultError> {
        let source = self.rate_source()?;
        if (source == RateSource::NoWrap) != self.is_no_wrap() {
            return Err(VaultError::ConfigurationError);
        }
        let unset = [0u8; 32];
        let fields = [
            &self.base_asset,
            &self.wrapped_token,
            &self.intermediate_token,
            &self.pool_a,
            &self.pool_b,
            &self.unstake_handler,
        ];
        if fields.iter().any(|f| **f == unset) {
            return Err(VaultError::ConfigurationError);
        }
        Ok(())
    }
}

impl ShareAccount {
    pub fn new(owner: &Pubkey) -> Self {
        let mut account = Self::zeroed();
        account.is_initialized = 1;
        account.owner = owner.to_bytes();
        account
    }

    pub fn owner_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.owner)
    }
}

impl UnstakeRequest {
    pub fn requester_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.requester)
    }

    /// Status at `now`. Stored Pending reads as Claimable once unbonded.
    pub fn status_at(&self, now: i64) -> UnstakeStatus {
        match self.status {
            2 => UnstakeStatus::Claimed,
            3 => UnstakeStatus::Cancelled,
            _ if now >= self.claimable_at => UnstakeStatus::Claimable,
            _ => UnstakeStatus::Pending,
        }
    }
}
