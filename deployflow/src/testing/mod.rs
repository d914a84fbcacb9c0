//! Test doubles for deployments.
//!
//! Deterministic stand-ins for the chain, the compiler output and a failing
//! disk, so executor and orchestrator behavior can be exercised without a
//! node.

mod mocks;

pub use mocks::{FlakyStore, RecordingChain, StaticArtifactSource};
