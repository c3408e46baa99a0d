//! The vault's view of the outside world.
//!
//! Every balance, transfer, rate quote, swap and native staking call goes
//! through `Ledger`. The host (on-chain adapter, simulator, test mock)
//! implements it; the engine never caches anything it returns across calls.
//!
//! Any `Err` is a revert of that external call. Callers map it to the
//! specific `VaultError` kind for the step that failed.

use solana_program::{entrypoint::ProgramResult, program_error::ProgramError, pubkey::Pubkey};

use crate::state::RateSource;

/// How much a hop consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopAmount {
    /// Spend exactly this many `token_in`.
    ExactIn(u64),
    /// Spend everything the previous hop produced.
    AllFromPrevious,
}

/// One leg of a batch swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapHop {
    pub pool: Pubkey,
    pub token_in: Pubkey,
    pub token_out: Pubkey,
    pub amount: HopAmount,
}

/// An ordered multi-hop swap with its input/output limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRoute {
    pub hops: Vec<SwapHop>,
    /// Most of the first hop's `token_in` the venue may take
    pub max_in: u64,
    /// Least of the last hop's `token_out` the venue must deliver
    pub min_out: u64,
}

impl SwapRoute {
    /// wrapped → intermediate (pool_a) → base (pool_b).
    pub fn two_hop(
        wrapped: Pubkey,
        intermediate: Pubkey,
        base: Pubkey,
        pool_a: Pubkey,
        pool_b: Pubkey,
        amount_in: u64,
        min_out: u64,
    ) -> Self {
        Self {
            hops: vec![
                SwapHop {
                    pool: pool_a,
                    token_in: wrapped,
                    token_out: intermediate,
                    amount: HopAmount::ExactIn(amount_in),
                },
                SwapHop {
                    pool: pool_b,
                    token_in: intermediate,
                    token_out: base,
                    amount: HopAmount::AllFromPrevious,
                },
            ],
            max_in: amount_in,
            min_out,
        }
    }

    /// Distinct tokens in path order: the positional `assets` array.
    pub fn assets(&self) -> Vec<Pubkey> {
        let mut assets = Vec::with_capacity(self.hops.len() + 1);
        for hop in &self.hops {
            if !assets.contains(&hop.token_in) {
                assets.push(hop.token_in);
            }
            if !assets.contains(&hop.token_out) {
                assets.push(hop.token_out);
            }
        }
        assets
    }

    /// Positional limits aligned with `assets()`: positive = max the vault
    /// pays in, negative = min the vault receives, zero for pass-through.
    pub fn limits(&self) -> Vec<i128> {
        let assets = self.assets();
        let first = self.hops.first().map(|h| h.token_in);
        let last = self.hops.last().map(|h| h.token_out);
        assets
            .iter()
            .map(|a| {
                if Some(*a) == first {
                    self.max_in as i128
                } else if Some(*a) == last {
                    -(self.min_out as i128)
                } else {
                    0
                }
            })
            .collect()
    }

    /// Hops are chained: each hop's `token_in` is the previous hop's `token_out`.
    pub fn is_chained(&self) -> bool {
        self.hops.windows(2).all(|w| w[0].token_out == w[1].token_in)
    }
}

pub trait Ledger {
    /// Current unix timestamp.
    fn now(&self) -> i64;

    fn balance_of(&self, token: &Pubkey, holder: &Pubkey) -> Result<u64, ProgramError>;

    fn transfer(&mut self, token: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult;

    /// Protocol exchange rate, `RATE_PRECISION` fixed point, in the direction
    /// named by `source`.
    fn exchange_rate(&self, wrapped_token: &Pubkey, source: RateSource) -> Result<u64, ProgramError>;

    /// Stake `base_amount` of the settlement token with a protocol; the
    /// native LST lands in `holder`.
    fn stake(&mut self, handler: &Pubkey, holder: &Pubkey, base_amount: u64) -> ProgramResult;

    /// Wrap `native_amount` of a protocol's native token held by `holder`.
    fn wrap(&mut self, wrapped_token: &Pubkey, holder: &Pubkey, native_amount: u64) -> ProgramResult;

    /// Tokens and reserves of an AMM pool, in the pool's own order.
    fn pool_tokens(&self, pool: &Pubkey) -> Result<Vec<(Pubkey, u64)>, ProgramError>;

    /// Execute a batch swap for `holder`. Returns the venue-reported output.
    fn batch_swap(&mut self, holder: &Pubkey, route: &SwapRoute) -> Result<u64, ProgramError>;

    /// Begin a native unstake; the native amount leaves `holder` now.
    fn unstake(&mut self, handler: &Pubkey, holder: &Pubkey, amount: u64) -> ProgramResult;

    /// Claim a matured unstake; proceeds land in `holder` as base token.
    fn claim_unstake(&mut self, handler: &Pubkey, holder: &Pubkey, amount: u64) -> ProgramResult;

    /// Reverse a pending unstake; the native amount returns to `holder`.
    fn cancel_unstake(&mut self, handler: &Pubkey, holder: &Pubkey, amount: u64) -> ProgramResult;
}
