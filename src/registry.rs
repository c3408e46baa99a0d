//! Protocol registry: per-LST metadata and APY weights.
//!
//! Entries are appended, never removed. A drained protocol keeps its entry.

use crate::error::VaultError;
use crate::state::{ProtocolEntry, RateSource};

/// Upper bound on registered protocols.
pub const MAX_PROTOCOLS: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    entries: Vec<ProtocolEntry>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ProtocolEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Result<&ProtocolEntry, VaultError> {
        self.entries.get(index).ok_or(VaultError::UnknownProtocol)
    }

    /// Append a protocol. Returns its index.
    ///
    /// Rejects malformed entries, a second no-wrap protocol, and any token
    /// already held by another entry in either role. A token may back at most
    /// one entry or its balance would be valued twice.
    pub fn register(&mut self, entry: ProtocolEntry) -> Result<usize, VaultError> {
        entry.validate()?;
        if self.entries.len() >= MAX_PROTOCOLS {
            return Err(VaultError::ConfigurationError);
        }
        if self.entries.iter().any(|e| e.shares_token_with(&entry)) {
            return Err(VaultError::ConfigurationError);
        }
        if entry.is_no_wrap() && self.entries.iter().any(|e| e.is_no_wrap()) {
            return Err(VaultError::ConfigurationError);
        }
        self.entries.push(entry);
        Ok(self.entries.len() - 1)
    }

    /// Registry-wide invariant: exactly one no-wrap protocol, and every entry
    /// is well formed. An empty registry is valid (nothing is staked).
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let mut no_wrap = 0usize;
        for entry in &self.entries {
            entry.validate()?;
            if entry.rate_source()? == RateSource::NoWrap {
                no_wrap += 1;
            }
        }
        if no_wrap != 1 {
            return Err(VaultError::ConfigurationError);
        }
        Ok(())
    }

    pub fn set_apy(&mut self, index: usize, apy_bps: i32) -> Result<(), VaultError> {
        let entry = self.entries.get_mut(index).ok_or(VaultError::UnknownProtocol)?;
        entry.apy_bps = apy_bps;
        Ok(())
    }

    /// Replace every weight at once. Length must match the registry.
    pub fn set_multiple_apy(&mut self, apy_bps: &[i32]) -> Result<(), VaultError> {
        if apy_bps.len() != self.entries.len() {
            return Err(VaultError::ConfigurationError);
        }
        for (entry, &bps) in self.entries.iter_mut().zip(apy_bps) {
            entry.apy_bps = bps;
        }
        Ok(())
    }

    pub fn weights(&self) -> Vec<i32> {
        self.entries.iter().map(|e| e.apy_bps).collect()
    }

    /// Indices ordered by APY ascending, ties by index. Re-derived on every
    /// call so operator weight changes take effect immediately.
    pub fn ranked_by_apy(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by_key(|&i| (self.entries[i].apy_bps, i));
        order
    }
}
