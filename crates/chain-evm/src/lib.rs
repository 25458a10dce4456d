//! EVM JSON-RPC backend for [`gasflood_chain::ChainClient`].
//!
//! Transactions are priced with `eth_gasPrice`, sized with `eth_estimateGas`,
//! signed locally with the sender's key and submitted through
//! `eth_sendRawTransaction`. Receipts are polled with
//! `eth_getTransactionReceipt`.
//!
//! ```ignore
//! let client = gasflood_chain_evm::EvmClient::connect("http://localhost:8545").await?;
//! let balance = client.balance(address).await?;
//! ```

mod errors;

pub use errors::map_transport_error;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::eth::{TransactionReceipt, TransactionRequest};
use alloy::transports::http::Http;
use async_trait::async_trait;
use gasflood_chain::{
    Account, ChainClient, ChainError, ChainErrorCode, ContractArtifact, ContractCall, PendingTx,
    TxReceipt,
};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

/// HTTP provider without fillers; nonce, gas and chain id are set explicitly.
pub type HttpProvider = RootProvider<Http<Client>>;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Chain client talking to an EVM node over HTTP.
pub struct EvmClient {
    provider: HttpProvider,
    chain_id: u64,
}

impl EvmClient {
    /// Connect to `rpc_url` and fetch the chain id.
    pub async fn connect(rpc_url: &str) -> Result<Self, ChainError> {
        let url: reqwest::Url = rpc_url.parse().map_err(|e| {
            ChainError::new(
                ChainErrorCode::InvalidArgument,
                format!("invalid RPC url {rpc_url}: {e}"),
            )
        })?;
        let provider = ProviderBuilder::new().on_http(url);
        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(map_transport_error)?;

        debug!(chain_id, "Connected to EVM node");

        Ok(Self {
            provider,
            chain_id,
        })
    }

    /// Chain id reported by the node at connect time.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Price, size, sign and submit a transaction.
    async fn send(
        &self,
        from: &Account,
        nonce: u64,
        request: TransactionRequest,
    ) -> Result<PendingTx, ChainError> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(map_transport_error)?;

        let mut request = request
            .with_from(from.address())
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_gas_price(gas_price);

        let gas_limit = self
            .provider
            .estimate_gas(&request)
            .await
            .map_err(map_transport_error)?;
        request.set_gas_limit(gas_limit);

        let wallet = EthereumWallet::from(from.key().clone());
        let envelope = request
            .build(&wallet)
            .await
            .map_err(|e| ChainError::new(ChainErrorCode::Signing, e.to_string()))?;

        let pending = self
            .provider
            .send_raw_transaction(&envelope.encoded_2718())
            .await
            .map_err(map_transport_error)?;

        Ok(PendingTx {
            hash: *pending.tx_hash(),
            from: from.address(),
            nonce,
        })
    }

    async fn poll_receipt(&self, tx: &PendingTx) -> Result<TransactionReceipt, ChainError> {
        let started = Instant::now();
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx.hash)
                .await
                .map_err(map_transport_error)?;

            if let Some(receipt) = receipt {
                return Ok(receipt);
            }

            if started.elapsed() >= RECEIPT_TIMEOUT {
                return Err(ChainError::new(
                    ChainErrorCode::Timeout,
                    format!(
                        "no receipt for {} after {}s",
                        tx.hash,
                        RECEIPT_TIMEOUT.as_secs()
                    ),
                ));
            }

            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

fn convert_receipt(receipt: &TransactionReceipt) -> TxReceipt {
    TxReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number.unwrap_or_default(),
        tx_index: receipt.transaction_index.unwrap_or_default(),
        gas_used: u64::try_from(receipt.gas_used).unwrap_or(u64::MAX),
        effective_gas_price: u128::try_from(receipt.effective_gas_price).unwrap_or(u128::MAX),
        contract_address: receipt.contract_address,
    }
}

#[async_trait]
impl ChainClient for EvmClient {
    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(map_transport_error)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        self.provider
            .get_transaction_count(address)
            .await
            .map_err(map_transport_error)
    }

    async fn transfer(
        &self,
        from: &Account,
        nonce: u64,
        to: Address,
        amount: U256,
    ) -> Result<PendingTx, ChainError> {
        let request = TransactionRequest::default()
            .with_to(to)
            .with_value(amount);
        self.send(from, nonce, request).await
    }

    async fn deploy_contract(
        &self,
        from: &Account,
        nonce: u64,
        artifact: &ContractArtifact,
    ) -> Result<Address, ChainError> {
        let request = TransactionRequest::default().with_deploy_code(artifact.bytecode.clone());
        let pending = self.send(from, nonce, request).await?;
        let receipt = self.wait_for_receipt(&pending).await?;

        receipt.contract_address.ok_or_else(|| {
            ChainError::new(
                ChainErrorCode::CallException,
                format!("deployment {} produced no contract address", pending.hash),
            )
        })
    }

    async fn invoke(
        &self,
        from: &Account,
        nonce: u64,
        call: &ContractCall,
    ) -> Result<PendingTx, ChainError> {
        let request = TransactionRequest::default()
            .with_to(call.contract)
            .with_input(call.calldata());
        self.send(from, nonce, request).await
    }

    async fn wait_for_receipt(&self, tx: &PendingTx) -> Result<TxReceipt, ChainError> {
        let receipt = self.poll_receipt(tx).await?;
        if !receipt.status() {
            return Err(ChainError::new(
                ChainErrorCode::CallException,
                format!(
                    "transaction {} reverted in block {}",
                    tx.hash,
                    receipt.block_number.unwrap_or_default()
                ),
            ));
        }
        Ok(convert_receipt(&receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let err = match EvmClient::connect("not a url").await {
            Ok(_) => panic!("connect should fail for an invalid url"),
            Err(err) => err,
        };
        assert_eq!(err.code, ChainErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn test_connect_unreachable_node_is_network_error() {
        // Port 9 (discard) on localhost is not an RPC endpoint.
        let err = match EvmClient::connect("http://127.0.0.1:9").await {
            Ok(_) => panic!("connect should fail without a node"),
            Err(err) => err,
        };
        assert_eq!(err.code, ChainErrorCode::Network);
    }
}
