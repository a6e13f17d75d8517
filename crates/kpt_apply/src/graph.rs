//! Dependency ordering via `config.kubernetes.io/depends-on` annotations.

use kpt_errors::{Error, ErrorKind};
use kpt_krm::{Resource, ResourceIdentity};
use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

/// The dependency graph over a desired resource set: an edge `a -> b` means
/// `a` depends on `b`, so `b` must be applied (and report healthy) first.
pub struct DependencyGraph {
    graph: DiGraph<ResourceIdentity, ()>,
    nodes: std::collections::HashMap<ResourceIdentity, NodeIndex>,
}

impl DependencyGraph {
    pub fn build(resources: &[Resource]) -> Result<Self, Error> {
        let mut graph = DiGraph::new();
        let mut nodes = std::collections::HashMap::new();
        for resource in resources {
            let identity = resource.identity();
            let index = graph.add_node(identity.clone());
            nodes.insert(identity, index);
        }

        for resource in resources {
            let Some(depends_on) = resource.depends_on() else {
                continue;
            };
            let dependency = depends_on?;
            let from = nodes[&resource.identity()];
            let Some(&to) = nodes.get(&dependency) else {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!("{} depends on {dependency}, which is not in the desired set", resource.identity()),
                ));
            };
            graph.add_edge(from, to, ());
        }

        Ok(Self { graph, nodes })
    }

    /// Returns identities in apply order: a dependency before its
    /// dependents. A cycle is reported with every identity on it.
    pub fn apply_order(&self) -> Result<Vec<ResourceIdentity>, Error> {
        match toposort(&self.graph, None) {
            // toposort yields dependents-before-dependencies for our edge
            // direction (edge = "depends on"), so reverse for apply order.
            Ok(mut order) => {
                order.reverse();
                Ok(order.into_iter().map(|idx| self.graph[idx].clone()).collect())
            }
            Err(cycle) => Err(self.cycle_error(cycle.node_id())),
        }
    }

    /// Destroy traverses the graph in reverse: dependents before
    /// dependencies.
    pub fn destroy_order(&self) -> Result<Vec<ResourceIdentity>, Error> {
        let mut order = self.apply_order()?;
        order.reverse();
        Ok(order)
    }

    fn cycle_error(&self, offending: NodeIndex) -> Error {
        let members: Vec<String> = kosaraju_scc(&self.graph)
            .into_iter()
            .find(|scc| scc.contains(&offending) && scc.len() > 1)
            .map(|scc| scc.into_iter().map(|idx| self.graph[idx].to_string()).collect())
            .unwrap_or_else(|| vec![self.graph[offending].to_string()]);
        Error::new(
            ErrorKind::InvalidInput,
            format!("dependency cycle among: {}", members.join(", ")),
        )
    }
}

#[cfg(test)]
mod tests {
    use kpt_krm::document::Document;

    use super::*;

    fn resource(yaml: &str) -> Resource {
        Document::parse_file("a.yaml", yaml).unwrap().remove(0).resource
    }

    #[test]
    fn orders_dependency_before_dependent() {
        let a = resource(
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: a\n  annotations:\n    config.kubernetes.io/depends-on: /Namespace/b\n",
        );
        let b = resource("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: b\n");
        let graph = DependencyGraph::build(&[a, b]).unwrap();
        let order = graph.apply_order().unwrap();
        let position_b = order.iter().position(|i| i.name == "b").unwrap();
        let position_a = order.iter().position(|i| i.name == "a").unwrap();
        assert!(position_b < position_a);
    }

    #[test]
    fn detects_cycle() {
        let a = resource(
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: a\n  annotations:\n    config.kubernetes.io/depends-on: /Namespace/b\n",
        );
        let b = resource(
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: b\n  annotations:\n    config.kubernetes.io/depends-on: /Namespace/a\n",
        );
        let graph = DependencyGraph::build(&[a, b]).unwrap();
        let err = graph.apply_order().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
