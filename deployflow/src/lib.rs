//! # Deployflow
//!
//! Idempotent, tag-selected contract deployment across networks.
//!
//! Deployflow runs a registry of named deployment tasks against one target
//! network at a time:
//!
//! - **Task registry**: tasks with tags, dependencies and per-network
//!   constructor arguments, validated once at startup
//! - **Parameter resolution**: explicit per-network tables with
//!   `${deployer}` and `${address:Task}` placeholders, no silent fallback
//! - **Idempotent execution**: a persisted record per (task, network) means
//!   re-runs skip completed work and interrupted runs resume
//! - **Event-driven observability**: lifecycle events through an
//!   [`events::EventSink`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deployflow::prelude::*;
//!
//! let mut builder = TaskRegistryBuilder::new();
//! builder.register(
//!     Task::new("Auction", NetworkTable::new().with_network("localhost", ["${deployer}"]))
//!         .with_tag("auction"),
//! )?;
//! let registry = Arc::new(builder.build()?);
//!
//! let executor = DeploymentExecutor::new(
//!     ParameterResolver::new(registry.clone()),
//!     store,
//!     chain,
//!     artifacts,
//! );
//! let result = Orchestrator::new(registry, executor, accounts)
//!     .run(&tags, "localhost")
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod chain;
pub mod cli;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::chain::{
        AccountProvider, ArtifactDirectory, ArtifactSource, ChainClient, ConfiguredAccounts,
        ContractArtifact,
    };
    #[cfg(feature = "rpc")]
    pub use crate::chain::JsonRpcChainClient;
    pub use crate::config::DeployConfig;
    pub use crate::core::{
        ArgValue, DeploymentRecord, NetworkContext, OutcomeStatus, RunOutcome,
    };
    pub use crate::errors::{
        BlockedByDependencyFailure, ChainError, CycleDetectedError, DeployflowError,
        DuplicateTaskError, OrphanedDeploymentError, RegistryError, ResolutionError,
        StoreError, TaskError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::{DeploymentExecutor, ExecutorConfig};
    pub use crate::orchestrator::{FailureMode, NetworkProfile, Orchestrator, RunResult};
    pub use crate::registry::{Task, TaskRegistry, TaskRegistryBuilder};
    pub use crate::resolver::{ArgTemplate, FnParameterBuilder, NetworkTable, ParameterResolver};
    pub use crate::store::{ArtifactStore, FileArtifactStore, InMemoryArtifactStore};
}
