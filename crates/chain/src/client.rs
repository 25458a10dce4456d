//! The chain client trait.

use crate::account::Account;
use crate::error::ChainError;
use crate::types::{ContractArtifact, ContractCall, PendingTx, TxReceipt};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;

/// Everything the load engine needs from a network.
///
/// Nonces are always supplied by the caller: clients never track them. A
/// submission either returns a [`PendingTx`] as soon as the node accepted it,
/// or fails with a [`ChainError`] carrying the raw failure.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Native balance of `address`.
    async fn balance(&self, address: Address) -> Result<U256, ChainError>;

    /// Number of transactions sent from `address`, i.e. the next usable nonce.
    async fn transaction_count(&self, address: Address) -> Result<u64, ChainError>;

    /// Send `amount` of the native coin from `from` to `to`.
    async fn transfer(
        &self,
        from: &Account,
        nonce: u64,
        to: Address,
        amount: U256,
    ) -> Result<PendingTx, ChainError>;

    /// Deploy `artifact` from `from` and wait for it to be mined.
    async fn deploy_contract(
        &self,
        from: &Account,
        nonce: u64,
        artifact: &ContractArtifact,
    ) -> Result<Address, ChainError>;

    /// Submit a contract call.
    async fn invoke(
        &self,
        from: &Account,
        nonce: u64,
        call: &ContractCall,
    ) -> Result<PendingTx, ChainError>;

    /// Wait until `tx` is mined and return its receipt.
    ///
    /// A transaction that was mined but reverted is reported as an error.
    async fn wait_for_receipt(&self, tx: &PendingTx) -> Result<TxReceipt, ChainError>;
}
