//! Core deployment types.

mod network;
mod outcome;
mod record;
mod value;

pub use network::NetworkContext;
pub use outcome::{OutcomeStatus, PlannedDeployment, RunOutcome};
pub use record::{DeploymentRecord, PendingDeployment, TransactionReceipt};
pub use value::{format_arguments, hash_arguments, ArgValue};
