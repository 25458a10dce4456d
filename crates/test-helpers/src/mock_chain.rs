//! In-memory chain.
//!
//! Every submission is checked against the sender's on-chain nonce and
//! balance. Accepted transactions are "mined" immediately: their receipt is
//! available as soon as the submission returns. Value transfers cost no gas;
//! contract calls cost `gas_used * gas_price`, zero unless configured.

use alloy_primitives::{keccak256, Address, TxHash, U256};
use async_trait::async_trait;
use gasflood_chain::{
    Account, ChainClient, ChainError, ChainErrorCode, ContractArtifact, ContractCall, PendingTx,
    TxReceipt,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

const TRANSFER_GAS: u64 = 21_000;

/// A value transfer accepted by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

#[derive(Default)]
struct State {
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, Result<TxReceipt, ChainError>>,
    transfers: Vec<Transfer>,
    invocations: HashMap<Address, u64>,
    balance_queries: HashMap<Address, u64>,
    deployments: Vec<Address>,
    invoke_failures: HashMap<Address, VecDeque<ChainError>>,
    transfer_failures: VecDeque<ChainError>,
    deploy_failure: Option<ChainError>,
    nonce_query_failure: Option<ChainError>,
    revert_calls: bool,
    block_number: u64,
}

impl State {
    fn nonce(&self, address: &Address) -> u64 {
        self.nonces.get(address).copied().unwrap_or(0)
    }

    fn balance(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or(U256::ZERO)
    }

    fn check_nonce(&self, from: Address, nonce: u64) -> Result<(), ChainError> {
        let expected = self.nonce(&from);
        if nonce == expected {
            return Ok(());
        }
        let reason = if nonce < expected {
            "nonce too low"
        } else {
            "nonce too high"
        };
        let detail = format!("{reason}: next nonce {expected}, tx nonce {nonce}");
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": detail },
        });
        Err(ChainError::server("processing response error", body.to_string()))
    }

    fn charge(&mut self, from: Address, cost: U256) -> Result<(), ChainError> {
        let balance = self.balance(&from);
        if balance < cost {
            return Err(ChainError::insufficient_funds(format!(
                "insufficient funds for gas * price + value: address {from} have {balance} want {cost}"
            )));
        }
        self.balances.insert(from, balance - cost);
        Ok(())
    }

    /// Consume `nonce` and record a receipt for the resulting transaction.
    fn mine(
        &mut self,
        from: Address,
        nonce: u64,
        gas_used: u64,
        gas_price: u128,
        contract_address: Option<Address>,
        reverted: bool,
    ) -> PendingTx {
        self.nonces.insert(from, nonce + 1);
        self.block_number += 1;

        let mut preimage = Vec::with_capacity(28);
        preimage.extend_from_slice(from.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        let hash = keccak256(&preimage);

        let receipt = if reverted {
            Err(ChainError::new(
                ChainErrorCode::CallException,
                format!("transaction {hash} reverted"),
            ))
        } else {
            Ok(TxReceipt {
                tx_hash: hash,
                block_number: self.block_number,
                tx_index: 0,
                gas_used,
                effective_gas_price: gas_price,
                contract_address,
            })
        };
        self.receipts.insert(hash, receipt);

        PendingTx { hash, from, nonce }
    }
}

/// In-memory [`ChainClient`].
pub struct MockChain {
    state: Mutex<State>,
    call_gas_used: u64,
    gas_price: u128,
    call_latency: Option<Duration>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            call_gas_used: 0,
            gas_price: 0,
            call_latency: None,
        }
    }

    /// Charge `gas_used * gas_price` wei for every contract call.
    pub fn with_call_cost(mut self, gas_used: u64, gas_price: u128) -> Self {
        self.call_gas_used = gas_used;
        self.gas_price = gas_price;
        self
    }

    /// Sleep this long inside every contract call before it is accepted.
    pub fn with_call_latency(mut self, latency: Duration) -> Self {
        self.call_latency = Some(latency);
        self
    }

    fn call_cost(&self) -> U256 {
        U256::from(self.call_gas_used) * U256::from(self.gas_price)
    }

    // ── Setup ────────────────────────────────────────────────────────

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().balances.insert(address, balance);
    }

    /// Move the on-chain nonce, e.g. to simulate a transaction sent by
    /// another process.
    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().nonces.insert(address, nonce);
    }

    /// Fail the next contract call from `address` with `error`. Scripted
    /// failures are returned in order and consume no nonce.
    pub fn fail_next_invoke(&self, address: Address, error: ChainError) {
        self.state
            .lock()
            .invoke_failures
            .entry(address)
            .or_default()
            .push_back(error);
    }

    /// Fail the next value transfer, whoever sends it.
    pub fn fail_next_transfer(&self, error: ChainError) {
        self.state.lock().transfer_failures.push_back(error);
    }

    /// Fail every deployment with `error`.
    pub fn fail_deployments(&self, error: ChainError) {
        self.state.lock().deploy_failure = Some(error);
    }

    /// Fail every transaction count query with `error`.
    pub fn fail_nonce_queries(&self, error: ChainError) {
        self.state.lock().nonce_query_failure = Some(error);
    }

    /// Mine contract calls as reverted.
    pub fn revert_calls(&self, revert: bool) {
        self.state.lock().revert_calls = revert;
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn balance_of(&self, address: Address) -> U256 {
        self.state.lock().balance(&address)
    }

    pub fn nonce_of(&self, address: Address) -> u64 {
        self.state.lock().nonce(&address)
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.lock().transfers.clone()
    }

    pub fn transfers_to(&self, address: Address) -> Vec<Transfer> {
        self.state
            .lock()
            .transfers
            .iter()
            .filter(|t| t.to == address)
            .cloned()
            .collect()
    }

    pub fn invocations(&self, address: Address) -> u64 {
        self.state
            .lock()
            .invocations
            .get(&address)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_invocations(&self) -> u64 {
        self.state.lock().invocations.values().sum()
    }

    pub fn balance_queries(&self, address: Address) -> u64 {
        self.state
            .lock()
            .balance_queries
            .get(&address)
            .copied()
            .unwrap_or(0)
    }

    pub fn deployments(&self) -> Vec<Address> {
        self.state.lock().deployments.clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        let mut state = self.state.lock();
        *state.balance_queries.entry(address).or_default() += 1;
        Ok(state.balance(&address))
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        let state = self.state.lock();
        match state.nonce_query_failure.clone() {
            Some(error) => Err(error),
            None => Ok(state.nonce(&address)),
        }
    }

    async fn transfer(
        &self,
        from: &Account,
        nonce: u64,
        to: Address,
        amount: U256,
    ) -> Result<PendingTx, ChainError> {
        let sender = from.address();
        let mut state = self.state.lock();
        if let Some(error) = state.transfer_failures.pop_front() {
            return Err(error);
        }
        state.check_nonce(sender, nonce)?;
        state.charge(sender, amount)?;

        let credited = state.balance(&to) + amount;
        state.balances.insert(to, credited);
        state.transfers.push(Transfer {
            from: sender,
            to,
            amount,
        });
        Ok(state.mine(sender, nonce, TRANSFER_GAS, 0, None, false))
    }

    async fn deploy_contract(
        &self,
        from: &Account,
        nonce: u64,
        artifact: &ContractArtifact,
    ) -> Result<Address, ChainError> {
        if artifact.bytecode.is_empty() {
            return Err(ChainError::new(
                ChainErrorCode::InvalidArgument,
                "empty bytecode",
            ));
        }
        let sender = from.address();
        let mut state = self.state.lock();
        if let Some(error) = state.deploy_failure.clone() {
            return Err(error);
        }
        state.check_nonce(sender, nonce)?;

        let contract = sender.create(nonce);
        state.deployments.push(contract);
        state.mine(sender, nonce, 0, 0, Some(contract), false);
        Ok(contract)
    }

    async fn invoke(
        &self,
        from: &Account,
        nonce: u64,
        call: &ContractCall,
    ) -> Result<PendingTx, ChainError> {
        if let Some(latency) = self.call_latency {
            tokio::time::sleep(latency).await;
        }

        let sender = from.address();
        let cost = self.call_cost();
        let mut state = self.state.lock();
        let scripted = state
            .invoke_failures
            .get_mut(&sender)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }
        if !state.deployments.contains(&call.contract) {
            return Err(ChainError::new(
                ChainErrorCode::CallException,
                format!("no contract at {}", call.contract),
            ));
        }
        state.check_nonce(sender, nonce)?;
        state.charge(sender, cost)?;

        *state.invocations.entry(sender).or_default() += 1;
        let reverted = state.revert_calls;
        Ok(state.mine(
            sender,
            nonce,
            self.call_gas_used,
            self.gas_price,
            None,
            reverted,
        ))
    }

    async fn wait_for_receipt(&self, tx: &PendingTx) -> Result<TxReceipt, ChainError> {
        self.state
            .lock()
            .receipts
            .get(&tx.hash)
            .cloned()
            .unwrap_or_else(|| {
                Err(ChainError::new(
                    ChainErrorCode::Timeout,
                    format!("no receipt for {}", tx.hash),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    fn artifact() -> ContractArtifact {
        ContractArtifact {
            abi: serde_json::Value::Null,
            bytecode: Bytes::from_static(&[0x60, 0x01]),
        }
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_and_nonce() {
        let chain = MockChain::new();
        let sender = Account::random();
        let receiver = Account::random();
        chain.set_balance(sender.address(), U256::from(50));

        let pending = chain
            .transfer(&sender, 0, receiver.address(), U256::from(5))
            .await
            .unwrap();
        assert_eq!(pending.nonce, 0);
        assert_eq!(chain.balance_of(sender.address()), U256::from(45));
        assert_eq!(chain.balance_of(receiver.address()), U256::from(5));
        assert_eq!(chain.nonce_of(sender.address()), 1);

        let receipt = chain.wait_for_receipt(&pending).await.unwrap();
        assert_eq!(receipt.fee(), 0);
    }

    #[tokio::test]
    async fn test_wrong_nonce_is_server_error() {
        let chain = MockChain::new();
        let sender = Account::random();
        chain.set_balance(sender.address(), U256::from(50));
        chain.set_nonce(sender.address(), 3);

        let err = chain
            .transfer(&sender, 2, Address::ZERO, U256::from(1))
            .await
            .unwrap_err();
        assert_eq!(err.code, ChainErrorCode::ServerError);
        assert!(err.body.unwrap().contains("nonce too low"));
        assert_eq!(chain.nonce_of(sender.address()), 3);
    }

    #[tokio::test]
    async fn test_invoke_charges_call_cost() {
        let chain = MockChain::new().with_call_cost(10, 2);
        let owner = Account::random();
        let contract = chain.deploy_contract(&owner, 0, &artifact()).await.unwrap();

        let caller = Account::random();
        chain.set_balance(caller.address(), U256::from(30));
        let call = ContractCall::new(contract, "go", vec![U256::from(1)]);

        let pending = chain.invoke(&caller, 0, &call).await.unwrap();
        assert_eq!(chain.wait_for_receipt(&pending).await.unwrap().fee(), 20);

        let err = chain.invoke(&caller, 1, &call).await.unwrap_err();
        assert_eq!(err.code, ChainErrorCode::InsufficientFunds);
        assert_eq!(chain.invocations(caller.address()), 1);
        assert_eq!(chain.balance_of(caller.address()), U256::from(10));
    }

    #[tokio::test]
    async fn test_scripted_invoke_failure_keeps_nonce() {
        let chain = MockChain::new();
        let owner = Account::random();
        let contract = chain.deploy_contract(&owner, 0, &artifact()).await.unwrap();
        let caller = Account::random();
        chain.fail_next_invoke(
            caller.address(),
            ChainError::new(ChainErrorCode::Network, "connection reset"),
        );
        let call = ContractCall::new(contract, "go", vec![]);

        let err = chain.invoke(&caller, 0, &call).await.unwrap_err();
        assert_eq!(err.code, ChainErrorCode::Network);
        chain.invoke(&caller, 0, &call).await.unwrap();
        assert_eq!(chain.nonce_of(caller.address()), 1);
    }

    #[tokio::test]
    async fn test_reverted_call_receipt() {
        let chain = MockChain::new();
        let owner = Account::random();
        let contract = chain.deploy_contract(&owner, 0, &artifact()).await.unwrap();
        chain.revert_calls(true);

        let pending = chain
            .invoke(&owner, 1, &ContractCall::new(contract, "go", vec![]))
            .await
            .unwrap();
        let err = chain.wait_for_receipt(&pending).await.unwrap_err();
        assert_eq!(err.code, ChainErrorCode::CallException);
    }
}
