//! Test helpers for gasflood.
//!
//! [`MockChain`] is an in-memory [`ChainClient`](gasflood_chain::ChainClient)
//! that enforces nonces and balances the way a node does, so the load engine
//! can be exercised end to end without a network. [`RecordingRecorder`]
//! captures every metric the engine emits.
//!
//! # Example
//!
//! ```ignore
//! use gasflood_test_helpers::MockChain;
//!
//! let chain = MockChain::new().with_call_cost(21_000, 1);
//! chain.set_balance(orchestrator.address(), U256::from(50));
//! ```

pub mod mock_chain;
pub mod recorder;

pub use mock_chain::{MockChain, Transfer};
pub use recorder::{MetricEvent, RecordingRecorder};
