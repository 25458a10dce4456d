//! Workload generators: what each worker submits.

use alloy_primitives::{Address, U256};
use gasflood_chain::ContractCall;

/// Produces the next contract call a worker submits.
pub trait WorkloadGenerator: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Build the next call against the shared `contract`.
    fn next_call(&self, contract: Address) -> ContractCall;
}

/// Calls `go(uint256 gasAmount)` on the gas consumer contract.
#[derive(Debug, Clone)]
pub struct GasConsumerWorkload {
    gas_amount: U256,
}

impl GasConsumerWorkload {
    pub const METHOD: &'static str = "go";

    pub fn new(gas_amount: u64) -> Self {
        Self {
            gas_amount: U256::from(gas_amount),
        }
    }
}

impl WorkloadGenerator for GasConsumerWorkload {
    fn name(&self) -> &str {
        "gas-consumer"
    }

    fn next_call(&self, contract: Address) -> ContractCall {
        ContractCall::new(contract, Self::METHOD, vec![self.gas_amount])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_consumer_call() {
        let contract = Address::repeat_byte(0x42);
        let call = GasConsumerWorkload::new(100_000).next_call(contract);

        assert_eq!(call.contract, contract);
        assert_eq!(call.signature(), "go(uint256)");
        assert_eq!(call.args, vec![U256::from(100_000u64)]);
    }
}
