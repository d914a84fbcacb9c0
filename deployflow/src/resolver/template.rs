//! Explicit per-network argument tables.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use super::{ParameterBuilder, ResolutionContext};
use crate::core::ArgValue;
use crate::errors::ResolutionError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{\s*(deployer|address:\s*([A-Za-z0-9_.\-]+))\s*\}$")
        .expect("placeholder pattern is valid")
});

/// One constructor argument as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgTemplate {
    /// A literal value.
    Literal(ArgValue),
    /// The deployer account of the current network (`${deployer}`).
    Deployer,
    /// The address a dependency was deployed at (`${address:Task}`).
    AddressOf(String),
}

impl ArgTemplate {
    /// Parses a configured value, recognising placeholders in text values.
    #[must_use]
    pub fn parse(value: ArgValue) -> Self {
        let ArgValue::Text(text) = &value else {
            return Self::Literal(value);
        };

        match PLACEHOLDER.captures(text) {
            Some(caps) => match caps.get(2) {
                Some(task) => Self::AddressOf(task.as_str().to_string()),
                None => Self::Deployer,
            },
            None => Self::Literal(value),
        }
    }

    fn resolve(&self, ctx: &ResolutionContext<'_>) -> Result<ArgValue, ResolutionError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Deployer => Ok(ArgValue::Text(ctx.network.deployer.clone())),
            Self::AddressOf(task) => ctx
                .dependency_address(task)
                .map(|address| ArgValue::Text(address.to_string())),
        }
    }
}

impl From<ArgValue> for ArgTemplate {
    fn from(value: ArgValue) -> Self {
        Self::parse(value)
    }
}

/// A total mapping from network to constructor arguments.
///
/// Networks that are not listed fail with
/// [`ResolutionError::UnmappedNetwork`]. There is no fallback entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkTable {
    entries: BTreeMap<String, Vec<ArgTemplate>>,
}

impl NetworkTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the arguments for a network.
    #[must_use]
    pub fn with_network<I, V>(mut self, network: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ArgValue>,
    {
        self.insert(network, args.into_iter().map(|v| ArgTemplate::parse(v.into())).collect());
        self
    }

    /// Inserts already-parsed templates for a network.
    pub fn insert(&mut self, network: impl Into<String>, templates: Vec<ArgTemplate>) {
        self.entries.insert(network.into(), templates);
    }

    /// Returns true if the network has an entry.
    #[must_use]
    pub fn contains(&self, network: &str) -> bool {
        self.entries.contains_key(network)
    }
}

impl ParameterBuilder for NetworkTable {
    fn build(&self, ctx: &ResolutionContext<'_>) -> Result<Vec<ArgValue>, ResolutionError> {
        let templates = self.entries.get(&ctx.network.network).ok_or_else(|| {
            ResolutionError::UnmappedNetwork {
                task: ctx.task.to_string(),
                network: ctx.network.network.clone(),
            }
        })?;

        templates.iter().map(|t| t.resolve(ctx)).collect()
    }

    fn referenced_tasks(&self) -> Vec<String> {
        let referenced: BTreeSet<&String> = self
            .entries
            .values()
            .flatten()
            .filter_map(|t| match t {
                ArgTemplate::AddressOf(task) => Some(task),
                _ => None,
            })
            .collect();
        referenced.into_iter().cloned().collect()
    }

    fn networks(&self) -> Option<Vec<String>> {
        Some(self.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeploymentRecord, NetworkContext, TransactionReceipt};

    fn ctx_parts(network: &str) -> (NetworkContext, BTreeMap<String, DeploymentRecord>) {
        (NetworkContext::local(network, "0xdeployer"), BTreeMap::new())
    }

    #[test]
    fn test_parse_placeholders() {
        assert_eq!(ArgTemplate::parse("${deployer}".into()), ArgTemplate::Deployer);
        assert_eq!(
            ArgTemplate::parse("${address:Token}".into()),
            ArgTemplate::AddressOf("Token".to_string())
        );
        assert_eq!(
            ArgTemplate::parse("${ address: Token }".into()),
            ArgTemplate::AddressOf("Token".to_string())
        );
        assert_eq!(
            ArgTemplate::parse("0xe84680C37f320c56d9F26E549155D33Bd412e7E3".into()),
            ArgTemplate::Literal("0xe84680C37f320c56d9F26E549155D33Bd412e7E3".into())
        );
        assert_eq!(ArgTemplate::parse(7_i64.into()), ArgTemplate::Literal(7_i64.into()));
        assert_eq!(
            ArgTemplate::parse("prefix ${deployer}".into()),
            ArgTemplate::Literal("prefix ${deployer}".into())
        );
    }

    #[test]
    fn test_table_is_total() {
        let table = NetworkTable::new()
            .with_network("sepolia", ["0xe84680C37f320c56d9F26E549155D33Bd412e7E3"])
            .with_network("localhost", ["0x9455dea772f304f4e1117B9E472611Ec626ad2fD"]);

        for network in table.networks().unwrap() {
            let (net, deps) = ctx_parts(&network);
            let ctx = ResolutionContext::new("Auction", &net, &deps);
            assert!(table.build(&ctx).is_ok(), "network {network} should resolve");
        }

        let (net, deps) = ctx_parts("unknownnet");
        let ctx = ResolutionContext::new("Auction", &net, &deps);
        assert_eq!(
            table.build(&ctx),
            Err(ResolutionError::UnmappedNetwork {
                task: "Auction".to_string(),
                network: "unknownnet".to_string(),
            })
        );
    }

    #[test]
    fn test_deployer_and_dependency_addresses() {
        let table = NetworkTable::new().with_network(
            "local",
            vec![ArgValue::from("${deployer}"), ArgValue::from("${address:Token}"), ArgValue::from(3_i64)],
        );
        assert_eq!(table.referenced_tasks(), vec!["Token".to_string()]);

        let (net, mut deps) = ctx_parts("local");
        let ctx = ResolutionContext::new("Market", &net, &deps);
        assert!(matches!(
            table.build(&ctx),
            Err(ResolutionError::DependencyNotDeployed { .. })
        ));

        let receipt = TransactionReceipt {
            tx_hash: "0x1".to_string(),
            contract_address: "0xtoken".to_string(),
            block_number: None,
        };
        deps.insert(
            "Token".to_string(),
            DeploymentRecord::new("Token", "local", "Token", "0xdeployer", vec![], &receipt),
        );
        let ctx = ResolutionContext::new("Market", &net, &deps);
        assert_eq!(
            table.build(&ctx).unwrap(),
            vec![
                ArgValue::from("0xdeployer"),
                ArgValue::from("0xtoken"),
                ArgValue::from(3_i64)
            ]
        );
    }
}
