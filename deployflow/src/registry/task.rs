//! Deployment task definitions.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::resolver::ParameterBuilder;

/// A named, idempotent unit of deployment work.
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    contract: String,
    tags: BTreeSet<String>,
    dependencies: Vec<String>,
    parameters: Arc<dyn ParameterBuilder>,
}

impl Task {
    /// Creates a task that deploys the contract of the same name.
    pub fn new(name: impl Into<String>, parameters: impl ParameterBuilder + 'static) -> Self {
        Self::with_builder(name, Arc::new(parameters))
    }

    /// Creates a task from a shared parameter builder.
    pub fn with_builder(name: impl Into<String>, parameters: Arc<dyn ParameterBuilder>) -> Self {
        let name = name.into();
        Self {
            contract: name.clone(),
            name,
            tags: BTreeSet::new(),
            dependencies: Vec::new(),
            parameters,
        }
    }

    /// Sets the contract to deploy.
    #[must_use]
    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = contract.into();
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Adds several tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Adds a dependency. Declared order is kept; repeats are ignored.
    #[must_use]
    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    /// Adds several dependencies.
    #[must_use]
    pub fn with_dependencies(self, dependencies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        dependencies
            .into_iter()
            .fold(self, |task, dep| task.with_dependency(dep))
    }

    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the contract name.
    #[must_use]
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns the dependencies in declared order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Returns the parameter builder.
    #[must_use]
    pub fn parameters(&self) -> &dyn ParameterBuilder {
        self.parameters.as_ref()
    }

    /// Returns true if the task carries any of `tags`.
    #[must_use]
    pub fn has_any_tag(&self, tags: &BTreeSet<String>) -> bool {
        !self.tags.is_disjoint(tags)
    }
}
