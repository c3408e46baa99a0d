//! Native ↔ wrapped conversion ratios.
//!
//! Rates come from each protocol's own view function, in whichever direction
//! the protocol exposes. There is no default rate: a failed or zero quote is
//! `RatioUnavailable`.

use solana_program::msg;

use crate::error::VaultError;
use crate::ledger::Ledger;
use crate::math::{self, RATE_PRECISION};
use crate::state::{ProtocolEntry, RateSource};

/// A protocol's exchange rate at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    source: RateSource,
    rate: u64,
}

impl Ratio {
    pub const IDENTITY: Ratio = Ratio {
        source: RateSource::NoWrap,
        rate: RATE_PRECISION,
    };

    pub fn new(source: RateSource, rate: u64) -> Result<Self, VaultError> {
        if source == RateSource::NoWrap {
            return Ok(Self::IDENTITY);
        }
        if rate == 0 {
            return Err(VaultError::RatioUnavailable);
        }
        Ok(Self { source, rate })
    }

    pub fn source(&self) -> RateSource {
        self.source
    }

    pub fn rate(&self) -> u64 {
        self.rate
    }

    /// Wrapped units needed to represent `native` (rounds up).
    pub fn wrapped_for(&self, native: u64) -> Result<u64, VaultError> {
        match self.source {
            RateSource::NoWrap => Some(native),
            RateSource::WrappedPerNative => math::mul_div_ceil(native, self.rate, RATE_PRECISION),
            RateSource::NativePerWrapped => math::mul_div_ceil(native, RATE_PRECISION, self.rate),
        }
        .ok_or(VaultError::Overflow)
    }

    /// Native value of `wrapped` units (rounds down).
    pub fn base_for(&self, wrapped: u64) -> Result<u64, VaultError> {
        match self.source {
            RateSource::NoWrap => Some(wrapped),
            RateSource::WrappedPerNative => math::mul_div_floor(wrapped, RATE_PRECISION, self.rate),
            RateSource::NativePerWrapped => math::mul_div_floor(wrapped, self.rate, RATE_PRECISION),
        }
        .ok_or(VaultError::Overflow)
    }

    /// Native units to wrap in order to mint at least `wrapped_target` (rounds up).
    pub fn native_to_wrap(&self, wrapped_target: u64) -> Result<u64, VaultError> {
        match self.source {
            RateSource::NoWrap => Some(wrapped_target),
            RateSource::WrappedPerNative => {
                math::mul_div_ceil(wrapped_target, RATE_PRECISION, self.rate)
            }
            RateSource::NativePerWrapped => {
                math::mul_div_ceil(wrapped_target, self.rate, RATE_PRECISION)
            }
        }
        .ok_or(VaultError::Overflow)
    }
}

/// Read the current ratio for a protocol. No-wrap protocols never hit the ledger.
pub fn quote<L: Ledger>(ledger: &L, entry: &ProtocolEntry) -> Result<Ratio, VaultError> {
    let source = entry.rate_source()?;
    if source == RateSource::NoWrap {
        return Ok(Ratio::IDENTITY);
    }
    let rate = ledger
        .exchange_rate(&entry.wrapped_token_pubkey(), source)
        .map_err(|e| {
            msg!("Rate query failed for {}: {:?}", entry.wrapped_token_pubkey(), e);
            VaultError::RatioUnavailable
        })?;
    Ratio::new(source, rate)
}

/// Grow an estimate by the configured buffer (rounds up).
pub fn buffered(amount: u64, buffer_bps: u16) -> Result<u64, VaultError> {
    math::buffered(amount, buffer_bps).ok_or(VaultError::Overflow)
}
