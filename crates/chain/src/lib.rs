//! Chain abstraction for the gasflood load generator.
//!
//! The load engine never talks to a node directly. Everything it needs from the
//! network goes through the [`ChainClient`] trait defined here:
//!
//! - balance and nonce queries
//! - value transfers and contract invocations (signed with a caller-supplied nonce)
//! - contract deployment
//! - receipt observation
//!
//! # Modules
//!
//! - [`account`]: signing accounts (random or from a private key)
//! - [`client`]: the [`ChainClient`] trait
//! - [`error`]: [`ChainError`] and its raw [`ChainErrorCode`]
//! - [`types`]: submission handles, receipts, contract artifacts and calls

pub mod account;
pub mod client;
pub mod error;
pub mod types;

pub use account::{Account, AccountError};
pub use client::ChainClient;
pub use error::{ChainError, ChainErrorCode};
pub use types::{ArtifactError, ContractArtifact, ContractCall, PendingTx, TxReceipt};

pub use alloy_primitives::{Address, Bytes, TxHash, U256};
