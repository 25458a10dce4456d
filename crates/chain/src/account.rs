//! Signing accounts.

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use std::fmt;

/// Errors from account construction.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
}

/// An account that can sign transactions.
///
/// Cloning is cheap and shares nothing mutable; the nonce lives in the signer
/// that drives the account, not here.
#[derive(Clone)]
pub struct Account {
    address: Address,
    key: PrivateKeySigner,
}

impl Account {
    /// Generate a fresh random account.
    pub fn random() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    /// Load an account from a hex-encoded private key (with or without `0x`).
    pub fn from_private_key(key: &str) -> Result<Self, AccountError> {
        let signer = key
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|e| AccountError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_signer(signer))
    }

    fn from_signer(key: PrivateKeySigner) -> Self {
        Self {
            address: key.address(),
            key,
        }
    }

    /// The account address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The underlying signing key.
    pub fn key(&self) -> &PrivateKeySigner {
        &self.key
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
