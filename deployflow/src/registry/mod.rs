//! Task registry.
//!
//! Tasks are registered once through [`TaskRegistryBuilder`]; `build`
//! validates the whole set (missing dependencies, undeclared address
//! references, cycles) and yields an immutable [`TaskRegistry`].

mod graph;
mod task;

pub use task::Task;

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::errors::{DuplicateTaskError, RegistryError, UndeclaredDependencyError};

/// Builder that collects tasks and validates them as a whole.
#[derive(Debug, Default)]
pub struct TaskRegistryBuilder {
    tasks: HashMap<String, Task>,
    order: Vec<String>,
}

impl TaskRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if a task with the same name is
    /// already registered.
    pub fn register(&mut self, task: Task) -> Result<&mut Self, RegistryError> {
        if self.tasks.contains_key(task.name()) {
            return Err(DuplicateTaskError::new(task.name()).into());
        }

        self.order.push(task.name().to_string());
        self.tasks.insert(task.name().to_string(), task);
        Ok(self)
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Validates the tasks and freezes the registry.
    pub fn build(self) -> Result<TaskRegistry, RegistryError> {
        for name in &self.order {
            let Some(task) = self.tasks.get(name) else {
                continue;
            };

            for dep in task.dependencies() {
                if !self.tasks.contains_key(dep) {
                    return Err(RegistryError::missing_dependency(name, dep));
                }
            }

            for referenced in task.parameters().referenced_tasks() {
                if !task.dependencies().contains(&referenced) {
                    return Err(UndeclaredDependencyError::new(name, referenced).into());
                }
            }
        }

        let registry = TaskRegistry {
            tasks: self.tasks,
            order: self.order,
        };

        // Ordering the full set surfaces any cycle before a run can start.
        let all: Vec<&Task> = registry.iter().collect();
        registry.resolve_dependency_order(&all)?;

        Ok(registry)
    }
}

/// Immutable collection of tasks in registration order.
#[derive(Debug)]
pub struct TaskRegistry {
    tasks: HashMap<String, Task>,
    order: Vec<String>,
}

impl TaskRegistry {
    /// Returns a task by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Returns the number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates tasks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|name| self.tasks.get(name))
    }

    /// Selects tasks carrying any of `tags`, in registration order.
    ///
    /// An empty tag set selects every task.
    #[must_use]
    pub fn select_by_tags(&self, tags: &BTreeSet<String>) -> Vec<&Task> {
        self.iter()
            .filter(|task| tags.is_empty() || task.has_any_tag(tags))
            .collect()
    }

    /// Extends `tasks` with their transitive dependencies.
    ///
    /// The result is in registration order.
    #[must_use]
    pub fn with_dependencies<'a>(&'a self, tasks: &[&'a Task]) -> Vec<&'a Task> {
        let mut wanted: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = tasks.iter().map(|t| t.name()).collect();

        while let Some(name) = stack.pop() {
            if !wanted.insert(name) {
                continue;
            }
            if let Some(task) = self.tasks.get(name) {
                stack.extend(task.dependencies().iter().map(String::as_str));
            }
        }

        self.iter().filter(|t| wanted.contains(t.name())).collect()
    }

    /// Orders `tasks` so each task follows its dependencies.
    ///
    /// Independent tasks keep their relative input order. Dependencies that
    /// are not part of `tasks` are not pulled in.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Cycle`] if the dependencies form a cycle.
    pub fn resolve_dependency_order<'a>(
        &'a self,
        tasks: &[&'a Task],
    ) -> Result<Vec<&'a Task>, RegistryError> {
        let names: Vec<&str> = tasks.iter().map(|t| t.name()).collect();
        let deps: HashMap<&str, &[String]> = tasks
            .iter()
            .map(|t| (t.name(), t.dependencies()))
            .collect();

        let ordered = graph::topological_order(&names, &deps)?;

        Ok(ordered
            .into_iter()
            .filter_map(|name| self.tasks.get(name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{FnParameterBuilder, NetworkTable};

    fn task(name: &str) -> Task {
        Task::new(name, NetworkTable::new().with_network("local", Vec::<String>::new()))
    }

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn names(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.name().to_string()).collect()
    }

    #[test]
    fn test_register_and_build() {
        let mut builder = TaskRegistryBuilder::new();
        builder.register(task("A")).unwrap();
        builder.register(task("B").with_dependency("A")).unwrap();
        assert_eq!(builder.len(), 2);

        let registry = builder.build().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("A").is_some());
        assert!(registry.get("C").is_none());
    }

    #[test]
    fn test_duplicate_task_rejected() {
        let mut builder = TaskRegistryBuilder::new();
        builder.register(task("Auction")).unwrap();

        let err = builder.register(task("Auction")).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(ref e) if e.name == "Auction"));
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let mut builder = TaskRegistryBuilder::new();
        builder.register(task("B").with_dependency("A")).unwrap();

        let err = builder.build().unwrap_err();
        assert!(matches!(err, RegistryError::MissingDependency { ref dependency, .. } if dependency == "A"));
    }

    #[test]
    fn test_cycle_rejected_at_build() {
        let mut builder = TaskRegistryBuilder::new();
        builder.register(task("A").with_dependency("B")).unwrap();
        builder.register(task("B").with_dependency("A")).unwrap();

        let err = builder.build().unwrap_err();
        assert!(matches!(err, RegistryError::Cycle(_)));
        assert_eq!(err.error_info().map(|i| i.code.as_str()), Some("REGISTRY-002-CYCLE"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut builder = TaskRegistryBuilder::new();
        builder.register(task("A").with_dependency("A")).unwrap();

        assert!(matches!(builder.build(), Err(RegistryError::Cycle(_))));
    }

    #[test]
    fn test_undeclared_address_reference_rejected() {
        let mut builder = TaskRegistryBuilder::new();
        builder.register(task("Token")).unwrap();
        builder
            .register(Task::new(
                "Market",
                NetworkTable::new().with_network("local", ["${address:Token}"]),
            ))
            .unwrap();

        let err = builder.build().unwrap_err();
        assert!(matches!(err, RegistryError::UndeclaredDependency(_)));
    }

    #[test]
    fn test_closure_references_checked() {
        let mut builder = TaskRegistryBuilder::new();
        builder.register(task("Token")).unwrap();
        builder
            .register(
                Task::new(
                    "Market",
                    FnParameterBuilder::new(|ctx| Ok(vec![ctx.dependency_address("Token")?.into()]))
                        .referencing(["Token"]),
                )
                .with_dependency("Token"),
            )
            .unwrap();

        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_select_by_tags_preserves_registration_order() {
        let mut builder = TaskRegistryBuilder::new();
        builder.register(task("C").with_tag("core")).unwrap();
        builder.register(task("A").with_tag("extra")).unwrap();
        builder.register(task("B").with_tags(["core", "extra"])).unwrap();
        let registry = builder.build().unwrap();

        assert_eq!(names(&registry.select_by_tags(&tags(&["core"]))), vec!["C", "B"]);
        assert_eq!(names(&registry.select_by_tags(&tags(&["extra"]))), vec!["A", "B"]);
        assert_eq!(names(&registry.select_by_tags(&tags(&[]))), vec!["C", "A", "B"]);
        assert!(registry.select_by_tags(&tags(&["none"])).is_empty());
    }

    #[test]
    fn test_with_dependencies_is_transitive() {
        let mut builder = TaskRegistryBuilder::new();
        builder.register(task("Token")).unwrap();
        builder.register(task("Unrelated")).unwrap();
        builder.register(task("Auction").with_dependency("Token")).unwrap();
        builder
            .register(task("Market").with_dependency("Auction").with_tag("market"))
            .unwrap();
        let registry = builder.build().unwrap();

        let selected = registry.select_by_tags(&tags(&["market"]));
        let expanded = registry.with_dependencies(&selected);
        assert_eq!(names(&expanded), vec!["Token", "Auction", "Market"]);
    }

    #[test]
    fn test_dependency_order() {
        let mut builder = TaskRegistryBuilder::new();
        builder.register(task("B").with_dependency("A")).unwrap();
        builder.register(task("C")).unwrap();
        builder.register(task("A")).unwrap();
        let registry = builder.build().unwrap();

        let all: Vec<&Task> = registry.iter().collect();
        let ordered = registry.resolve_dependency_order(&all).unwrap();
        assert_eq!(names(&ordered), vec!["A", "B", "C"]);
    }
}
