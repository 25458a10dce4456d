//! Account bound to a chain client, with a locally cached nonce.

use alloy_primitives::{Address, U256};
use gasflood_chain::{
    Account, ChainClient, ChainError, ContractArtifact, ContractCall, PendingTx,
};
use std::sync::Arc;
use tracing::debug;

/// Sends transactions for one account.
///
/// The nonce is read from the chain on first use and then advanced locally on
/// every accepted submission. After a failure the owner calls [`resync`] so
/// the cache matches the chain again.
///
/// [`resync`]: Signer::resync
pub struct Signer {
    account: Account,
    client: Arc<dyn ChainClient>,
    nonce: Option<u64>,
}

impl Signer {
    pub fn new(account: Account, client: Arc<dyn ChainClient>) -> Self {
        Self {
            account,
            client,
            nonce: None,
        }
    }

    pub fn address(&self) -> Address {
        self.account.address()
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// The nonce the next submission will use, if already loaded.
    pub fn cached_nonce(&self) -> Option<u64> {
        self.nonce
    }

    async fn next_nonce(&mut self) -> Result<u64, ChainError> {
        match self.nonce {
            Some(nonce) => Ok(nonce),
            None => self.resync().await,
        }
    }

    /// Reload the nonce from the chain's transaction count.
    ///
    /// On failure the cache is cleared and the next submission reloads it.
    pub async fn resync(&mut self) -> Result<u64, ChainError> {
        match self.client.transaction_count(self.address()).await {
            Ok(nonce) => {
                debug!(address = %self.address(), nonce, "Nonce synchronized");
                self.nonce = Some(nonce);
                Ok(nonce)
            }
            Err(e) => {
                self.nonce = None;
                Err(e)
            }
        }
    }

    pub async fn transfer(&mut self, to: Address, amount: U256) -> Result<PendingTx, ChainError> {
        let nonce = self.next_nonce().await?;
        let pending = self
            .client
            .transfer(&self.account, nonce, to, amount)
            .await?;
        self.nonce = Some(nonce + 1);
        Ok(pending)
    }

    pub async fn invoke(&mut self, call: &ContractCall) -> Result<PendingTx, ChainError> {
        let nonce = self.next_nonce().await?;
        let pending = self.client.invoke(&self.account, nonce, call).await?;
        self.nonce = Some(nonce + 1);
        Ok(pending)
    }

    /// Deploy `artifact` and wait until it is mined.
    pub async fn deploy(&mut self, artifact: &ContractArtifact) -> Result<Address, ChainError> {
        let nonce = self.next_nonce().await?;
        let contract = self
            .client
            .deploy_contract(&self.account, nonce, artifact)
            .await?;
        self.nonce = Some(nonce + 1);
        Ok(contract)
    }
}
