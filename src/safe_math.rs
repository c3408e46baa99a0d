//! Checked arithmetic that logs the call site and returns a typed error.
//!
//! Subtraction has its own error kind: `ArithmeticGuardTripped` is raised
//! before an underflowing subtraction executes. Add/mul overflow maps to
//! `Overflow`.

use solana_program::msg;

use crate::error::VaultError;

pub trait SafeMath: Sized {
    fn safe_add(self, rhs: Self) -> Result<Self, VaultError>;
    fn safe_sub(self, rhs: Self) -> Result<Self, VaultError>;
    fn safe_mul(self, rhs: Self) -> Result<Self, VaultError>;
}

macro_rules! checked_impl {
    ($t:ty) => {
        impl SafeMath for $t {
            #[track_caller]
            #[inline(always)]
            fn safe_add(self, v: $t) -> Result<$t, VaultError> {
                match self.checked_add(v) {
                    Some(result) => Ok(result),
                    None => {
                        let loc = core::panic::Location::caller();
                        msg!("Overflow: {} + {} at {}:{}", self, v, loc.file(), loc.line());
                        Err(VaultError::Overflow)
                    }
                }
            }

            #[track_caller]
            #[inline(always)]
            fn safe_sub(self, v: $t) -> Result<$t, VaultError> {
                if self < v {
                    let loc = core::panic::Location::caller();
                    msg!("Guard tripped: {} - {} at {}:{}", self, v, loc.file(), loc.line());
                    return Err(VaultError::ArithmeticGuardTripped);
                }
                Ok(self - v)
            }

            #[track_caller]
            #[inline(always)]
            fn safe_mul(self, v: $t) -> Result<$t, VaultError> {
                match self.checked_mul(v) {
                    Some(result) => Ok(result),
                    None => {
                        let loc = core::panic::Location::caller();
                        msg!("Overflow: {} * {} at {}:{}", self, v, loc.file(), loc.line());
                        Err(VaultError::Overflow)
                    }
                }
            }
        }
    };
}

checked_impl!(u64);
checked_impl!(u128);
