//! Per-invocation network context.

use serde::{Deserialize, Serialize};

/// The environment a run deploys into. Read-only for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContext {
    /// The network identifier.
    pub network: String,
    /// The account deployments are sent from.
    pub deployer: String,
    /// Whether this is a live network with real consensus.
    pub is_live: bool,
    /// Whether to mine deployment transactions immediately.
    pub auto_mine: bool,
}

impl NetworkContext {
    /// Creates a context for a live network with auto-mine off.
    #[must_use]
    pub fn new(network: impl Into<String>, deployer: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            deployer: deployer.into(),
            is_live: true,
            auto_mine: false,
        }
    }

    /// Creates a context for a local development network with auto-mine on.
    #[must_use]
    pub fn local(network: impl Into<String>, deployer: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            deployer: deployer.into(),
            is_live: false,
            auto_mine: true,
        }
    }

    /// Sets whether the network is live.
    #[must_use]
    pub fn with_live(mut self, is_live: bool) -> Self {
        self.is_live = is_live;
        self
    }

    /// Sets the auto-mine flag.
    #[must_use]
    pub fn with_auto_mine(mut self, auto_mine: bool) -> Self {
        self.auto_mine = auto_mine;
        self
    }

    /// Auto-mine only ever applies to non-live networks.
    #[must_use]
    pub fn effective_auto_mine(&self) -> bool {
        self.auto_mine && !self.is_live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_mine_ignored_on_live() {
        let live = NetworkContext::new("sepolia", "0xdeployer").with_auto_mine(true);
        assert!(live.auto_mine);
        assert!(!live.effective_auto_mine());

        let local = NetworkContext::local("localhost", "0xdeployer");
        assert!(local.effective_auto_mine());
    }
}
