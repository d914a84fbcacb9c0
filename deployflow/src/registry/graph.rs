//! Dependency graph walks: cycle detection and topological order.

use std::collections::{HashMap, HashSet};

use crate::errors::CycleDetectedError;

/// Orders `nodes` so every node comes after the dependencies listed in
/// `deps`. Ties keep the order of `nodes`. Edges to nodes missing from
/// `deps` are ignored.
pub(crate) fn topological_order<'a>(
    nodes: &[&'a str],
    deps: &HashMap<&'a str, &'a [String]>,
) -> Result<Vec<&'a str>, CycleDetectedError> {
    let mut walk = Walk {
        deps,
        visited: HashSet::new(),
        path: Vec::new(),
        order: Vec::with_capacity(nodes.len()),
    };

    for node in nodes {
        walk.visit(node)?;
    }

    Ok(walk.order)
}

struct Walk<'m, 'a> {
    deps: &'m HashMap<&'a str, &'a [String]>,
    visited: HashSet<&'a str>,
    path: Vec<&'a str>,
    order: Vec<&'a str>,
}

impl<'a> Walk<'_, 'a> {
    fn visit(&mut self, node: &'a str) -> Result<(), CycleDetectedError> {
        if self.visited.contains(node) {
            return Ok(());
        }

        if let Some(start) = self.path.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = self.path[start..].iter().map(|n| (*n).to_string()).collect();
            cycle.push(node.to_string());
            return Err(CycleDetectedError::new(cycle));
        }

        let edges: &'a [String] = match self.deps.get(node) {
            Some(edges) => edges,
            None => return Ok(()),
        };

        self.path.push(node);
        for dep in edges {
            if self.deps.contains_key(dep.as_str()) {
                self.visit(dep.as_str())?;
            }
        }
        self.path.pop();

        self.visited.insert(node);
        self.order.push(node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let a = strings(&[]);
        let b = strings(&["a"]);
        let c = strings(&["b", "a"]);
        let deps: HashMap<&str, &[String]> =
            [("c", c.as_slice()), ("b", b.as_slice()), ("a", a.as_slice())].into_iter().collect();

        let order = topological_order(&["c", "b", "a"], &deps).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_independent_nodes_keep_input_order() {
        let none = strings(&[]);
        let deps: HashMap<&str, &[String]> =
            [("x", none.as_slice()), ("y", none.as_slice()), ("z", none.as_slice())].into_iter().collect();

        let order = topological_order(&["y", "x", "z"], &deps).unwrap();
        assert_eq!(order, vec!["y", "x", "z"]);
    }

    #[test]
    fn test_cycle_reports_path() {
        let a = strings(&["c"]);
        let b = strings(&["a"]);
        let c = strings(&["b"]);
        let deps: HashMap<&str, &[String]> =
            [("a", a.as_slice()), ("b", b.as_slice()), ("c", c.as_slice())].into_iter().collect();

        let err = topological_order(&["a", "b", "c"], &deps).unwrap_err();
        assert_eq!(err.cycle_path, strings(&["a", "c", "b", "a"]));
    }

    #[test]
    fn test_edges_outside_set_are_ignored() {
        let b = strings(&["outside"]);
        let deps: HashMap<&str, &[String]> = [("b", b.as_slice())].into_iter().collect();

        let order = topological_order(&["b"], &deps).unwrap();
        assert_eq!(order, vec!["b"]);
    }
}
