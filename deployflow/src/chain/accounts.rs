//! Deployer accounts.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::errors::AccountError;

/// Supplies the account that deploys on a network.
pub trait AccountProvider: Send + Sync + Debug {
    /// Returns the deployer account for `network`.
    fn deployer_account(&self, network: &str) -> Result<String, AccountError>;
}

/// Accounts taken from configuration, one per network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfiguredAccounts {
    accounts: BTreeMap<String, String>,
}

impl ConfiguredAccounts {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deployer for a network.
    #[must_use]
    pub fn with_account(mut self, network: impl Into<String>, account: impl Into<String>) -> Self {
        self.accounts.insert(network.into(), account.into());
        self
    }
}

impl<N: Into<String>, A: Into<String>> FromIterator<(N, A)> for ConfiguredAccounts {
    fn from_iter<T: IntoIterator<Item = (N, A)>>(iter: T) -> Self {
        Self {
            accounts: iter.into_iter().map(|(n, a)| (n.into(), a.into())).collect(),
        }
    }
}

impl AccountProvider for ConfiguredAccounts {
    fn deployer_account(&self, network: &str) -> Result<String, AccountError> {
        self.accounts
            .get(network)
            .cloned()
            .ok_or_else(|| AccountError::Unconfigured(network.to_string()))
    }
}
