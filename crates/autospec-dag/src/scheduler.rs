//! Topological layering (spec.md §4.8), grounded on the Kahn's-algorithm
//! batch extraction in `cortex-agents::task::dag::topological_sort`:
//! repeatedly pull the zero-in-degree frontier as the next layer instead
//! of a single flat order, so independent specs share a layer.
//!
//! The workflow file's own `layers` grouping is taken as declared
//! intent, not executed blindly: this module recomputes the canonical
//! layering from the full `depends_on` graph (catching cycles in the
//! process) and then checks the declared layer index of every feature
//! against it, so a feature that names a same-layer or later-layer
//! dependency is rejected rather than silently reordered.

use std::collections::{HashMap, HashSet};

use crate::error::{DagError, Result};
use crate::workflow::DagFile;

struct Node {
    id: String,
    declared_layer: usize,
    declared_order: usize,
    depends_on: Vec<String>,
}

/// Validate a DAG workflow's structure and produce its canonical,
/// deterministic layered schedule: an ordered `Vec` of layers, each a
/// `Vec` of spec ids in (declared order, then lexicographic) order.
pub fn build_schedule(dag: &DagFile) -> Result<Vec<Vec<String>>> {
    let nodes = flatten(dag)?;
    check_known_dependencies(&nodes)?;

    let layers = kahn_layers(&nodes)?;
    check_declared_layers_match_dependencies(&nodes)?;

    Ok(layers)
}

fn flatten(dag: &DagFile) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    let mut seen = HashSet::new();

    for (declared_layer, layer) in dag.layers.iter().enumerate() {
        for (declared_order, feature) in layer.features.iter().enumerate() {
            if !seen.insert(feature.id.clone()) {
                return Err(DagError::DuplicateFeatureId(feature.id.clone()));
            }
            nodes.push(Node {
                id: feature.id.clone(),
                declared_layer,
                declared_order,
                depends_on: feature.depends_on.clone(),
            });
        }
    }

    Ok(nodes)
}

fn check_known_dependencies(nodes: &[Node]) -> Result<()> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    for node in nodes {
        for dep in &node.depends_on {
            if !known.contains(dep.as_str()) {
                return Err(DagError::UnknownDependency {
                    feature: node.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

fn kahn_layers(nodes: &[Node]) -> Result<Vec<Vec<String>>> {
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in nodes {
        for dep in &node.depends_on {
            *in_degree.get_mut(node.id.as_str()).unwrap() += 1;
            dependents.entry(dep.as_str()).or_default().push(node.id.as_str());
        }
    }

    let mut remaining = in_degree.clone();
    let mut processed: HashSet<&str> = HashSet::new();
    let mut computed: Vec<Vec<String>> = Vec::new();

    loop {
        let mut frontier: Vec<&str> = remaining
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .filter(|id| !processed.contains(id))
            .collect();

        if frontier.is_empty() {
            break;
        }

        frontier.sort_by_key(|id| {
            let node = by_id[id];
            (node.declared_layer, node.declared_order, node.id.clone())
        });

        for &id in &frontier {
            processed.insert(id);
            remaining.remove(id);
            if let Some(deps) = dependents.get(id) {
                for &dependent in deps {
                    if let Some(degree) = remaining.get_mut(dependent) {
                        *degree -= 1;
                    }
                }
            }
        }

        computed.push(frontier.into_iter().map(String::from).collect());
    }

    if processed.len() != nodes.len() {
        let mut cycle: Vec<String> = remaining.keys().map(|s| s.to_string()).collect();
        cycle.sort();
        return Err(DagError::Cycle(cycle));
    }

    Ok(computed)
}

fn check_declared_layers_match_dependencies(nodes: &[Node]) -> Result<()> {
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    for node in nodes {
        for dep in &node.depends_on {
            let dep_node = by_id[dep.as_str()];
            if dep_node.declared_layer >= node.declared_layer {
                return Err(DagError::CrossLayerDependency {
                    feature: node.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::DagFile;
    use std::path::Path;

    fn parse(yaml: &str) -> DagFile {
        DagFile::parse(Path::new("test.yaml"), yaml).unwrap()
    }

    #[test]
    fn independent_features_in_same_declared_layer_stay_together() {
        let dag = parse(
            r#"
dag: { name: test }
layers:
  - features:
      - id: a
      - id: b
"#,
        );
        let schedule = build_schedule(&dag).unwrap();
        assert_eq!(schedule, vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn dependency_chain_produces_one_layer_per_link() {
        let dag = parse(
            r#"
dag: { name: test }
layers:
  - features:
      - id: a
  - features:
      - id: b
        depends_on: [a]
  - features:
      - id: c
        depends_on: [b]
"#,
        );
        let schedule = build_schedule(&dag).unwrap();
        assert_eq!(
            schedule,
            vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]]
        );
    }

    #[test]
    fn cycle_is_rejected() {
        let dag = parse(
            r#"
dag: { name: test }
layers:
  - features:
      - id: a
        depends_on: [b]
      - id: b
        depends_on: [a]
"#,
        );
        let err = build_schedule(&dag).unwrap_err();
        assert!(matches!(err, DagError::Cycle(_)));
    }

    #[test]
    fn same_layer_dependency_is_rejected() {
        let dag = parse(
            r#"
dag: { name: test }
layers:
  - features:
      - id: a
      - id: b
        depends_on: [a]
"#,
        );
        let err = build_schedule(&dag).unwrap_err();
        assert!(matches!(err, DagError::CrossLayerDependency { .. }));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let dag = parse(
            r#"
dag: { name: test }
layers:
  - features:
      - id: a
        depends_on: [ghost]
"#,
        );
        let err = build_schedule(&dag).unwrap_err();
        assert!(matches!(err, DagError::UnknownDependency { .. }));
    }

    #[test]
    fn duplicate_feature_id_is_rejected() {
        let dag = parse(
            r#"
dag: { name: test }
layers:
  - features:
      - id: a
  - features:
      - id: a
"#,
        );
        let err = build_schedule(&dag).unwrap_err();
        assert!(matches!(err, DagError::DuplicateFeatureId(_)));
    }

    #[test]
    fn deterministic_order_is_declared_order_then_lexicographic() {
        let dag = parse(
            r#"
dag: { name: test }
layers:
  - features:
      - id: zeta
      - id: alpha
"#,
        );
        let schedule = build_schedule(&dag).unwrap();
        assert_eq!(schedule[0], vec!["zeta".to_string(), "alpha".to_string()]);
    }
}
