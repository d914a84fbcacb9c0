//! Network parameter resolution.
//!
//! Maps a (task, network) pair to the constructor arguments valid for that
//! network. Resolution is explicit and total: a network a task has no entry
//! for is an error, never a default.

mod template;

pub use template::{ArgTemplate, NetworkTable};

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

use crate::core::{format_arguments, ArgValue, DeploymentRecord, NetworkContext};
use crate::errors::ResolutionError;
use crate::registry::TaskRegistry;

/// Everything a parameter builder may look at.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    /// The task being resolved.
    pub task: &'a str,
    /// The target network.
    pub network: &'a NetworkContext,
    /// Records of the task's dependencies on this network.
    pub dependencies: &'a BTreeMap<String, DeploymentRecord>,
}

impl<'a> ResolutionContext<'a> {
    /// Creates a new resolution context.
    #[must_use]
    pub fn new(
        task: &'a str,
        network: &'a NetworkContext,
        dependencies: &'a BTreeMap<String, DeploymentRecord>,
    ) -> Self {
        Self {
            task,
            network,
            dependencies,
        }
    }

    /// Returns the address a dependency was deployed at on this network.
    pub fn dependency_address(&self, dependency: &str) -> Result<&'a str, ResolutionError> {
        self.dependencies
            .get(dependency)
            .map(|record| record.address.as_str())
            .ok_or_else(|| ResolutionError::DependencyNotDeployed {
                task: self.task.to_string(),
                dependency: dependency.to_string(),
                network: self.network.network.clone(),
            })
    }
}

/// Produces the constructor arguments of a task for a network.
///
/// Implementations must be deterministic: the same network and dependency
/// records must always yield the same arguments.
pub trait ParameterBuilder: Send + Sync + Debug {
    /// Builds the argument list.
    fn build(&self, ctx: &ResolutionContext<'_>) -> Result<Vec<ArgValue>, ResolutionError>;

    /// Names of tasks whose addresses the builder reads.
    fn referenced_tasks(&self) -> Vec<String> {
        Vec::new()
    }

    /// Networks the builder has explicit entries for, if it is table driven.
    fn networks(&self) -> Option<Vec<String>> {
        None
    }
}

/// A closure-based parameter builder.
pub struct FnParameterBuilder<F>
where
    F: Fn(&ResolutionContext<'_>) -> Result<Vec<ArgValue>, ResolutionError> + Send + Sync,
{
    func: F,
    referenced: Vec<String>,
}

impl<F> FnParameterBuilder<F>
where
    F: Fn(&ResolutionContext<'_>) -> Result<Vec<ArgValue>, ResolutionError> + Send + Sync,
{
    /// Creates a new closure-based builder.
    pub fn new(func: F) -> Self {
        Self {
            func,
            referenced: Vec::new(),
        }
    }

    /// Declares the tasks whose addresses the closure reads.
    #[must_use]
    pub fn referencing(mut self, tasks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.referenced = tasks.into_iter().map(Into::into).collect();
        self
    }
}

impl<F> Debug for FnParameterBuilder<F>
where
    F: Fn(&ResolutionContext<'_>) -> Result<Vec<ArgValue>, ResolutionError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnParameterBuilder")
            .field("referenced", &self.referenced)
            .finish()
    }
}

impl<F> ParameterBuilder for FnParameterBuilder<F>
where
    F: Fn(&ResolutionContext<'_>) -> Result<Vec<ArgValue>, ResolutionError> + Send + Sync,
{
    fn build(&self, ctx: &ResolutionContext<'_>) -> Result<Vec<ArgValue>, ResolutionError> {
        (self.func)(ctx)
    }

    fn referenced_tasks(&self) -> Vec<String> {
        self.referenced.clone()
    }
}

/// Resolves constructor arguments for registered tasks.
#[derive(Debug, Clone)]
pub struct ParameterResolver {
    registry: Arc<TaskRegistry>,
}

impl ParameterResolver {
    /// Creates a resolver over a registry.
    #[must_use]
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }

    /// Resolves the arguments for `task` on `network`.
    pub fn resolve(
        &self,
        task: &str,
        network: &NetworkContext,
        dependencies: &BTreeMap<String, DeploymentRecord>,
    ) -> Result<Vec<ArgValue>, ResolutionError> {
        let definition = self
            .registry
            .get(task)
            .ok_or_else(|| ResolutionError::UnknownTask(task.to_string()))?;

        let ctx = ResolutionContext::new(task, network, dependencies);
        let args = definition.parameters().build(&ctx)?;

        debug!(
            task = %task,
            network = %network.network,
            args = %format_arguments(&args),
            "Resolved constructor arguments"
        );
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Task, TaskRegistryBuilder};

    fn registry() -> Arc<TaskRegistry> {
        let mut builder = TaskRegistryBuilder::new();
        builder
            .register(Task::new(
                "Auction",
                NetworkTable::new().with_network("local", ["0xAAA"]),
            ))
            .unwrap();
        builder
            .register(Task::new(
                "Computed",
                FnParameterBuilder::new(|ctx| {
                    Ok(vec![
                        ArgValue::from(ctx.network.deployer.clone()),
                        ArgValue::from(!ctx.network.is_live),
                    ])
                }),
            ))
            .unwrap();
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_resolve_table_task() {
        let resolver = ParameterResolver::new(registry());
        let network = NetworkContext::local("local", "0xdeployer");

        let args = resolver.resolve("Auction", &network, &BTreeMap::new()).unwrap();
        assert_eq!(args, vec![ArgValue::from("0xAAA")]);
    }

    #[test]
    fn test_resolve_unmapped_network_fails_loudly() {
        let resolver = ParameterResolver::new(registry());
        let network = NetworkContext::new("unknownnet", "0xdeployer");

        let err = resolver
            .resolve("Auction", &network, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ResolutionError::UnmappedNetwork { .. }));
    }

    #[test]
    fn test_resolve_derived_values() {
        let resolver = ParameterResolver::new(registry());
        let network = NetworkContext::local("anything", "0xdeployer");

        let args = resolver.resolve("Computed", &network, &BTreeMap::new()).unwrap();
        assert_eq!(args, vec![ArgValue::from("0xdeployer"), ArgValue::from(true)]);
    }

    #[test]
    fn test_resolve_unknown_task() {
        let resolver = ParameterResolver::new(registry());
        let network = NetworkContext::local("local", "0xdeployer");

        assert_eq!(
            resolver.resolve("Missing", &network, &BTreeMap::new()),
            Err(ResolutionError::UnknownTask("Missing".to_string()))
        );
    }
}
