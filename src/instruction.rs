use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::registry::MAX_PROTOCOLS;
use crate::state::{RateSource, RemainderPolicy, ShortfallPolicy, VaultConfig};

/// Instructions for the LST vault.
///
/// Layout: one tag byte, then little-endian fields in declaration order.
/// `Pubkey` is 32 raw bytes; `Option<T>` is a flag byte followed by `T`
/// (always present, ignored when the flag is 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultInstruction {
    /// Initialize the vault. The caller becomes admin.
    ///
    /// Data: operator(32) + vault(32) + base_token(32) + config(35)
    InitVault {
        operator: Pubkey,
        vault: Pubkey,
        base_token: Pubkey,
        config: VaultConfig,
    },

    /// Append a protocol to the registry (admin).
    RegisterProtocol {
        rate_source: RateSource,
        apy_bps: i32,
        base_asset: Pubkey,
        wrapped_token: Pubkey,
        intermediate_token: Pubkey,
        pool_a: Pubkey,
        pool_b: Pubkey,
        unstake_handler: Pubkey,
    },

    /// Deposit base from the caller, minting shares to `recipient`.
    Deposit { amount: u64, recipient: Pubkey },

    /// Withdraw exactly `amount` base from `owner`'s position (owner only).
    Withdraw { amount: u64, owner: Pubkey, receiver: Pubkey },

    /// Burn `shares` of `owner`'s position (owner only).
    Redeem { shares: u64, owner: Pubkey, receiver: Pubkey },

    /// Operator/admin.
    SetApy { index: u32, apy_bps: i32 },

    /// Operator/admin. Data: count(1) + count × i32.
    SetMultipleApy { apy_bps: Vec<i32> },

    /// Stake idle base above the reserve target (operator/admin).
    Rebalance,

    /// Begin unbonding native LST (operator/admin).
    RequestUnstake { protocol_index: u32, amount: u64 },

    /// Claim a matured unstake (requester or operator/admin).
    Claim { request_id: u64 },

    /// Reverse a pending unstake (operator/admin).
    CancelUnstake { request_id: u64 },

    /// Change tunables (admin). Each field: flag(1) + value.
    UpdateConfig(ConfigUpdate),

    /// Appoint a new operator (admin).
    SetOperator { operator: Pubkey },
}

/// Partial config change carried by `UpdateConfig`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub buffer_bps: Option<u16>,
    pub slippage_bps: Option<u16>,
    pub safety_fraction_bps: Option<u16>,
    pub idle_reserve_bps: Option<u16>,
    pub unbonding_period_secs: Option<u64>,
    pub withdraw_cooldown_secs: Option<u64>,
    pub deposit_cap: Option<u64>,
    pub remainder_policy: Option<RemainderPolicy>,
    pub shortfall_policy: Option<ShortfallPolicy>,
    pub max_replan_rounds: Option<u8>,
}

impl ConfigUpdate {
    pub fn apply(&self, current: &VaultConfig) -> VaultConfig {
        VaultConfig {
            buffer_bps: self.buffer_bps.unwrap_or(current.buffer_bps),
            slippage_bps: self.slippage_bps.unwrap_or(current.slippage_bps),
            safety_fraction_bps: self.safety_fraction_bps.unwrap_or(current.safety_fraction_bps),
            idle_reserve_bps: self.idle_reserve_bps.unwrap_or(current.idle_reserve_bps),
            unbonding_period_secs: self.unbonding_period_secs.unwrap_or(current.unbonding_period_secs),
            withdraw_cooldown_secs: self.withdraw_cooldown_secs.unwrap_or(current.withdraw_cooldown_secs),
            deposit_cap: self.deposit_cap.unwrap_or(current.deposit_cap),
            remainder_policy: self.remainder_policy.unwrap_or(current.remainder_policy),
            shortfall_policy: self.shortfall_policy.unwrap_or(current.shortfall_policy),
            max_replan_rounds: self.max_replan_rounds.unwrap_or(current.max_replan_rounds),
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ProgramError> {
        if self.data.len() < n {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ProgramError> {
        self.take(N)?
            .try_into()
            .map_err(|_| ProgramError::InvalidInstructionData)
    }

    fn u8(&mut self) -> Result<u8, ProgramError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ProgramError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, ProgramError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, ProgramError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, ProgramError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn pubkey(&mut self) -> Result<Pubkey, ProgramError> {
        Ok(Pubkey::new_from_array(self.array()?))
    }

    fn flagged<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, ProgramError>,
    ) -> Result<Option<T>, ProgramError> {
        let has = self.u8()? != 0;
        let v = read(self)?;
        Ok(if has { Some(v) } else { None })
    }
}

fn remainder_policy(v: u8) -> Result<RemainderPolicy, ProgramError> {
    RemainderPolicy::from_u8(v).ok_or(ProgramError::InvalidInstructionData)
}

fn shortfall_policy(v: u8) -> Result<ShortfallPolicy, ProgramError> {
    ShortfallPolicy::from_u8(v).ok_or(ProgramError::InvalidInstructionData)
}

fn read_config(r: &mut Reader) -> Result<VaultConfig, ProgramError> {
    Ok(VaultConfig {
        buffer_bps: r.u16()?,
        slippage_bps: r.u16()?,
        safety_fraction_bps: r.u16()?,
        idle_reserve_bps: r.u16()?,
        unbonding_period_secs: r.u64()?,
        withdraw_cooldown_secs: r.u64()?,
        deposit_cap: r.u64()?,
        remainder_policy: remainder_policy(r.u8()?)?,
        shortfall_policy: shortfall_policy(r.u8()?)?,
        max_replan_rounds: r.u8()?,
    })
}

fn write_config(out: &mut Vec<u8>, c: &VaultConfig) {
    out.extend_from_slice(&c.buffer_bps.to_le_bytes());
    out.extend_from_slice(&c.slippage_bps.to_le_bytes());
    out.extend_from_slice(&c.safety_fraction_bps.to_le_bytes());
    out.extend_from_slice(&c.idle_reserve_bps.to_le_bytes());
    out.extend_from_slice(&c.unbonding_period_secs.to_le_bytes());
    out.extend_from_slice(&c.withdraw_cooldown_secs.to_le_bytes());
    out.extend_from_slice(&c.deposit_cap.to_le_bytes());
    out.push(c.remainder_policy as u8);
    out.push(c.shortfall_policy as u8);
    out.push(c.max_replan_rounds);
}

fn write_flagged<const N: usize>(out: &mut Vec<u8>, v: Option<[u8; N]>) {
    out.push(v.is_some() as u8);
    out.extend_from_slice(&v.unwrap_or([0u8; N]));
}

impl VaultInstruction {
    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = data.split_first().ok_or(ProgramError::InvalidInstructionData)?;
        let mut r = Reader { data: rest };

        match tag {
            0 => Ok(Self::InitVault {
                operator: r.pubkey()?,
                vault: r.pubkey()?,
                base_token: r.pubkey()?,
                config: read_config(&mut r)?,
            }),
            1 => Ok(Self::RegisterProtocol {
                rate_source: RateSource::from_u8(r.u8()?).ok_or(ProgramError::InvalidInstructionData)?,
                apy_bps: r.i32()?,
                base_asset: r.pubkey()?,
                wrapped_token: r.pubkey()?,
                intermediate_token: r.pubkey()?,
                pool_a: r.pubkey()?,
                pool_b: r.pubkey()?,
                unstake_handler: r.pubkey()?,
            }),
            2 => Ok(Self::Deposit {
                amount: r.u64()?,
                recipient: r.pubkey()?,
            }),
            3 => Ok(Self::Withdraw {
                amount: r.u64()?,
                owner: r.pubkey()?,
                receiver: r.pubkey()?,
            }),
            4 => Ok(Self::Redeem {
                shares: r.u64()?,
                owner: r.pubkey()?,
                receiver: r.pubkey()?,
            }),
            5 => Ok(Self::SetApy {
                index: r.u32()?,
                apy_bps: r.i32()?,
            }),
            6 => {
                let count = r.u8()? as usize;
                if count > MAX_PROTOCOLS {
                    return Err(ProgramError::InvalidInstructionData);
                }
                let mut apy_bps = Vec::with_capacity(count);
                for _ in 0..count {
                    apy_bps.push(r.i32()?);
                }
                Ok(Self::SetMultipleApy { apy_bps })
            }
            7 => Ok(Self::Rebalance),
            8 => Ok(Self::RequestUnstake {
                protocol_index: r.u32()?,
                amount: r.u64()?,
            }),
            9 => Ok(Self::Claim { request_id: r.u64()? }),
            10 => Ok(Self::CancelUnstake { request_id: r.u64()? }),
            11 => {
                let update = ConfigUpdate {
                    buffer_bps: r.flagged(Reader::u16)?,
                    slippage_bps: r.flagged(Reader::u16)?,
                    safety_fraction_bps: r.flagged(Reader::u16)?,
                    idle_reserve_bps: r.flagged(Reader::u16)?,
                    unbonding_period_secs: r.flagged(Reader::u64)?,
                    withdraw_cooldown_secs: r.flagged(Reader::u64)?,
                    deposit_cap: r.flagged(Reader::u64)?,
                    remainder_policy: r.flagged(Reader::u8)?.map(remainder_policy).transpose()?,
                    shortfall_policy: r.flagged(Reader::u8)?.map(shortfall_policy).transpose()?,
                    max_replan_rounds: r.flagged(Reader::u8)?,
                };
                Ok(Self::UpdateConfig(update))
            }
            12 => Ok(Self::SetOperator { operator: r.pubkey()? }),
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }

    /// Encode for submission. Inverse of `unpack`.
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::InitVault { operator, vault, base_token, config } => {
                out.push(0);
                out.extend_from_slice(operator.as_ref());
                out.extend_from_slice(vault.as_ref());
                out.extend_from_slice(base_token.as_ref());
                write_config(&mut out, config);
            }
            Self::RegisterProtocol {
                rate_source,
                apy_bps,
                base_asset,
                wrapped_token,
                intermediate_token,
                pool_a,
                pool_b,
                unstake_handler,
            } => {
                out.push(1);
                out.push(*rate_source as u8);
                out.extend_from_slice(&apy_bps.to_le_bytes());
                for key in [base_asset, wrapped_token, intermediate_token, pool_a, pool_b, unstake_handler] {
                    out.extend_from_slice(key.as_ref());
                }
            }
            Self::Deposit { amount, recipient } => {
                out.push(2);
                out.extend_from_slice(&amount.to_le_bytes());
                out.extend_from_slice(recipient.as_ref());
            }
            Self::Withdraw { amount, owner, receiver } => {
                out.push(3);
                out.extend_from_slice(&amount.to_le_bytes());
                out.extend_from_slice(owner.as_ref());
                out.extend_from_slice(receiver.as_ref());
            }
            Self::Redeem { shares, owner, receiver } => {
                out.push(4);
                out.extend_from_slice(&shares.to_le_bytes());
                out.extend_from_slice(owner.as_ref());
                out.extend_from_slice(receiver.as_ref());
            }
            Self::SetApy { index, apy_bps } => {
                out.push(5);
                out.extend_from_slice(&index.to_le_bytes());
                out.extend_from_slice(&apy_bps.to_le_bytes());
            }
            Self::SetMultipleApy { apy_bps } => {
                debug_assert!(apy_bps.len() <= MAX_PROTOCOLS, "more weights than protocols");
                out.push(6);
                out.push(apy_bps.len() as u8);
                for bps in apy_bps {
                    out.extend_from_slice(&bps.to_le_bytes());
                }
            }
            Self::Rebalance => out.push(7),
            Self::RequestUnstake { protocol_index, amount } => {
                out.push(8);
                out.extend_from_slice(&protocol_index.to_le_bytes());
                out.extend_from_slice(&amount.to_le_bytes());
            }
            Self::Claim { request_id } => {
                out.push(9);
                out.extend_from_slice(&request_id.to_le_bytes());
            }
            Self::CancelUnstake { request_id } => {
                out.push(10);
                out.extend_from_slice(&request_id.to_le_bytes());
            }
            Self::UpdateConfig(u) => {
                out.push(11);
                write_flagged(&mut out, u.buffer_bps.map(u16::to_le_bytes));
                write_flagged(&mut out, u.slippage_bps.map(u16::to_le_bytes));
                write_flagged(&mut out, u.safety_fraction_bps.map(u16::to_le_bytes));
                write_flagged(&mut out, u.idle_reserve_bps.map(u16::to_le_bytes));
                write_flagged(&mut out, u.unbonding_period_secs.map(u64::to_le_bytes));
                write_flagged(&mut out, u.withdraw_cooldown_secs.map(u64::to_le_bytes));
                write_flagged(&mut out, u.deposit_cap.map(u64::to_le_bytes));
                write_flagged(&mut out, u.remainder_policy.map(|p| [p as u8]));
                write_flagged(&mut out, u.shortfall_policy.map(|p| [p as u8]));
                write_flagged(&mut out, u.max_replan_rounds.map(|v| [v]));
            }
            Self::SetOperator { operator } => {
                out.push(12);
                out.extend_from_slice(operator.as_ref());
            }
        }
        out
    }
}
