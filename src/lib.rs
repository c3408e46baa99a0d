//! Multi-LST Yield Vault Engine
//!
//! Pools a base settlement token, stakes it across several liquid-staking
//! protocols weighted by APY, and pays withdrawals on demand. When idle base
//! is short, staked positions are wrapped (if needed) and swapped back to base
//! along each protocol's fixed two-hop pool path.
//!
//! Architecture:
//! - The engine is host-agnostic: every balance, transfer, rate, stake, wrap,
//!   swap and unstake goes through the `ledger::Ledger` trait
//! - Shares follow ERC-4626 rounding: deposits and redeems round down,
//!   withdrawals round shares up
//! - Total assets = idle base + Σ protocol value + pending unstakes
//! - Liquidation takes the lowest-APY positions first, capped per protocol
//!   by a safety fraction
//! - Every subtraction is ordering-checked before it runs
//!
//! Instructions:
//!   0 - InitVault:         Caller becomes admin; sets operator, holder, base token, config
//!   1 - RegisterProtocol:  Admin appends an LST protocol to the registry
//!   2 - Deposit:           Base in, shares out, stake by APY weight
//!   3 - Withdraw:          Exact base out, shares burned (rounds up)
//!   4 - Redeem:            Exact shares burned, base out (rounds down)
//!   5 - SetApy:            Operator sets one protocol's weight
//!   6 - SetMultipleApy:    Operator replaces every weight
//!   7 - Rebalance:         Operator stakes idle base above the reserve target
//!   8 - RequestUnstake:    Operator starts a native unbonding
//!   9 - Claim:             Requester or operator claims a matured unstake
//!  10 - CancelUnstake:     Operator reverses a pending unstake
//!  11 - UpdateConfig:      Admin changes buffer, slippage, safety fraction, policies
//!  12 - SetOperator:       Admin appoints the operator

pub mod allocator;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod math;
pub mod oracle;
pub mod processor;
pub mod registry;
pub mod safe_math;
pub mod selector;
pub mod shares;
pub mod state;
pub mod swap;
pub mod unstake;
pub mod vault;
pub mod withdraw;
