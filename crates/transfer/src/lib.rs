//! Payment backend integration - USDC transfer execution
//!
//! This crate is the boundary to the payment collaborator:
//! - **Backend contract** (`backend`) - create-transfer and status-check
//!   operations plus the sandbox HTTP client
//! - **Executor** (`executor`) - deadline-bounded execution with the
//!   ambiguous-outcome timeout policy
//!
//! The one deliberate behavior to know about: when the backend misses the
//! deadline the transfer is NOT failed. Funds may already be committed, so
//! the executor records a provisional `pending_on_chain` receipt and leaves
//! reconciliation to a confirmation poller. Reporting a timeout as a hard
//! failure would invite a retry and a double payment.

pub mod backend;
pub mod executor;

pub use backend::{BackendError, SandboxBackend, TransferBackend, TransferReceipt};
pub use executor::TransferExecutor;
