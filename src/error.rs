use solana_program::program_error::ProgramError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum VaultError {
    /// Vault already initialized
    AlreadyInitialized = 0,
    /// Vault not initialized
    NotInitialized = 1,
    /// Caller lacks the required role
    Unauthorized = 2,
    /// Zero amount
    ZeroAmount = 3,
    /// Arithmetic overflow on add/mul/div
    Overflow = 4,
    /// Registry or config is inconsistent (bad weights, unset pool id, no-wrap invariant)
    ConfigurationError = 5,
    /// Staked positions cannot cover the shortfall
    InsufficientLiquidity = 6,
    /// Protocol exchange-rate call failed or returned zero
    RatioUnavailable = 7,
    /// Wrap call succeeded but wrapped balance did not increase
    WrapVerificationFailed = 8,
    /// A single protocol cannot fund the requested liquidation step
    InsufficientProtocolLiquidity = 9,
    /// Swap output below the slippage-derived minimum
    SwapSlippageExceeded = 10,
    /// Swap venue reverted the batch swap
    SwapRejected = 11,
    /// A subtraction would have underflowed; caught before executing
    ArithmeticGuardTripped = 12,
    /// Balance moved between estimation and execution
    StaleState = 13,
    /// Owner does not hold enough shares
    InsufficientShares = 14,
    /// Deposit cap exceeded
    DepositCapExceeded = 15,
    /// Withdraw cooldown not elapsed
    CooldownNotElapsed = 16,
    /// Orphaned value or valueless supply; deposits blocked
    DepositBlocked = 17,
    /// Protocol index out of range
    UnknownProtocol = 18,
    /// Unstake request id not found
    UnknownRequest = 19,
    /// Unbonding period not elapsed
    NotClaimable = 20,
    /// Request already claimable, cannot cancel
    RequestNotPending = 21,
    /// Native stake call failed
    StakeFailed = 22,
    /// Native unstake/claim/cancel call failed or had no effect
    UnstakeFailed = 23,
    /// Ledger transfer failed
    TransferFailed = 24,
}

impl VaultError {
    /// Liquidation-step failures. The withdrawal engine moves on to the next
    /// protocol in the plan instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VaultError::RatioUnavailable
                | VaultError::WrapVerificationFailed
                | VaultError::InsufficientProtocolLiquidity
                | VaultError::SwapSlippageExceeded
                | VaultError::SwapRejected
                | VaultError::StaleState
        )
    }
}

impl From<VaultError> for ProgramError {
    fn from(e: VaultError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
