//! Submission handles, receipts, contract artifacts and calls.

use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};
use serde::Deserialize;
use std::path::Path;

/// Handle for a transaction the node accepted but that may not be mined yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTx {
    pub hash: TxHash,
    pub from: Address,
    pub nonce: u64,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub tx_index: u64,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    /// Set for contract creations.
    pub contract_address: Option<Address>,
}

impl TxReceipt {
    /// Fee paid: gas used times effective gas price.
    pub fn fee(&self) -> u128 {
        u128::from(self.gas_used).saturating_mul(self.effective_gas_price)
    }
}

/// Errors from loading a contract artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("artifact has empty bytecode")]
    EmptyBytecode,
}

/// Compiled contract: ABI and creation bytecode.
///
/// Accepts both the flat `{"abi": [...], "bytecode": "0x..."}` layout and the
/// nested `{"bytecode": {"object": "0x..."}}` layout.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub abi: serde_json::Value,
    pub bytecode: Bytes,
}

#[derive(Deserialize)]
struct RawArtifact {
    #[serde(default)]
    abi: serde_json::Value,
    bytecode: RawBytecode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

impl ContractArtifact {
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let raw: RawArtifact = serde_json::from_str(json)?;
        let bytecode = match raw.bytecode {
            RawBytecode::Hex(bytes) => bytes,
            RawBytecode::Object { object } => object,
        };
        if bytecode.is_empty() {
            return Err(ArtifactError::EmptyBytecode);
        }
        Ok(Self {
            abi: raw.abi,
            bytecode,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ArtifactError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }
}

/// A call to a contract method taking only `uint256` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub contract: Address,
    pub method: String,
    pub args: Vec<U256>,
}

impl ContractCall {
    pub fn new(contract: Address, method: impl Into<String>, args: Vec<U256>) -> Self {
        Self {
            contract,
            method: method.into(),
            args,
        }
    }

    /// Solidity signature, e.g. `go(uint256)`.
    pub fn signature(&self) -> String {
        let params = vec!["uint256"; self.args.len()].join(",");
        format!("{}({})", self.method, params)
    }

    /// ABI-encoded calldata: 4-byte selector followed by 32-byte words.
    pub fn calldata(&self) -> Bytes {
        let selector = keccak256(self.signature().as_bytes());
        let mut data = Vec::with_capacity(4 + 32 * self.args.len());
        data.extend_from_slice(&selector[..4]);
        for arg in &self.args {
            data.extend_from_slice(&arg.to_be_bytes::<32>());
        }
        Bytes::from(data)
    }
}
