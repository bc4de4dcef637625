//! Dependency ordering between change units.
//!
//! An edge `a -> b` means `b` must be applied after `a`. Edges are derived from what
//! each unit needs to find in the builder and from what it leaves behind:
//!
//! 1. The first combination of a field precedes every later combination of that field.
//! 2. Combination `k - 1` of a field precedes combination `k`.
//! 3. A component change introducing `(class, content hash)` precedes every combination
//!    selecting that hash.
//! 4. Every image or pattern addition precedes the one carrying the latest image id.
//! 5. The first combination of a field precedes every new pattern naming the field.
//! 6. New pattern `k - 1` precedes new pattern `k`.
//! 7. A rename vacating a component name precedes the change that takes the name over.
//! 8. Entries appended to the same existing pattern are ordered by position.
//! 9. An addition stored as `name#seq_no` precedes the rename vacating `name`, so the
//!    name is still taken when it lands.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    changeunit::{ChangeUnit, ChangeUnits, Identity},
    utils::graph::IndexedGraph,
    Error, Result,
};

/// Dependency graph over one set of change units.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: IndexedGraph<Identity>,
}

impl DependencyGraph {
    /// Derives the dependency edges between `units`.
    #[must_use]
    pub fn build(units: &ChangeUnits) -> Self {
        let mut graph = IndexedGraph::new();
        for identity in units.keys() {
            graph.add_node(identity.clone());
        }

        let mut edges = Vec::new();
        combination_edges(units, &mut edges);
        component_edges(units, &mut edges);
        image_edges(units, &mut edges);
        slot_edges(units, &mut edges);

        for (from, to) in edges {
            if from != to {
                graph.add_edge(from.clone(), to.clone());
            }
        }

        tracing::debug!(
            units = graph.node_count(),
            edges = graph.edge_count(),
            "built dependency graph"
        );
        Self { graph }
    }

    /// Units that must be applied right after `identity`.
    #[must_use]
    pub fn dependents(&self, identity: &Identity) -> BTreeSet<&Identity> {
        self.graph.successors(identity)
    }

    /// Units that must be applied right before `identity`.
    #[must_use]
    pub fn dependencies(&self, identity: &Identity) -> BTreeSet<&Identity> {
        self.graph.predecessors(identity)
    }

    /// Every unit `identity` depends on, directly or not.
    #[must_use]
    pub fn transitive_dependencies(&self, identity: &Identity) -> BTreeSet<&Identity> {
        self.graph.ancestors(identity)
    }

    /// Number of dependency edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Each unit with the set of its dependents.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<Identity, BTreeSet<Identity>> {
        self.graph.to_adjacency()
    }

    /// Dependencies-first order, ties broken by identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] naming one cycle if the units depend on each other
    /// cyclically (for example two components swapping names).
    pub fn topological_order(&self) -> Result<Vec<Identity>> {
        if let Some(order) = self.graph.topological_sort() {
            return Ok(order);
        }

        let cycle = self
            .graph
            .find_cycle()
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        Err(Error::GraphError(format!(
            "Dependency cycle between change units: {cycle}"
        )))
    }
}

/// Maps each unit to the set of units that must be applied after it.
///
/// Every unit of `units` is a key, with an empty set when nothing depends on it.
#[must_use]
pub fn export_dependency_graph(units: &ChangeUnits) -> BTreeMap<Identity, BTreeSet<Identity>> {
    DependencyGraph::build(units).to_map()
}

type Edges<'a> = Vec<(&'a Identity, &'a Identity)>;

fn combination_edges<'a>(units: &'a ChangeUnits, edges: &mut Edges<'a>) {
    let mut by_field: BTreeMap<&str, BTreeMap<usize, &Identity>> = BTreeMap::new();
    for unit in units.values() {
        if let ChangeUnit::AddEncodingCombination(combination) = unit {
            by_field
                .entry(combination.field_name())
                .or_default()
                .insert(combination.encoding_index(), combination.identity());
        }
    }

    for (field, indices) in &by_field {
        if let Some(&first) = indices.get(&0) {
            for (_, &follower) in indices.range(1..) {
                edges.push((first, follower));
            }
            for unit in units.values() {
                if let ChangeUnit::NewImageIdToNewPattern(pattern) = unit {
                    if pattern.references(field) {
                        edges.push((first, pattern.identity()));
                    }
                }
            }
        }

        for (&index, &identity) in indices {
            if let Some(&previous) = index.checked_sub(1).and_then(|prev| indices.get(&prev)) {
                edges.push((previous, identity));
            }
        }
    }
}

fn component_edges<'a>(units: &'a ChangeUnits, edges: &mut Edges<'a>) {
    let changes: Vec<_> = units
        .values()
        .filter_map(|unit| match unit {
            ChangeUnit::CompChange(change) => Some(change),
            _ => None,
        })
        .collect();

    for &change in &changes {
        for unit in units.values() {
            if let ChangeUnit::AddEncodingCombination(combination) = unit {
                if combination.selects(change.class(), change.content_hash()) {
                    edges.push((change.identity(), combination.identity()));
                }
            }
        }

        if !change.is_rename() {
            continue;
        }
        let Some(vacated) = change.prev_name() else {
            continue;
        };
        for &other in &changes {
            if other.class() != change.class() {
                continue;
            }
            if other.name() == vacated {
                edges.push((change.identity(), other.identity()));
            }
            if other.seq_no().is_some() && other.requested_name() == vacated {
                edges.push((other.identity(), change.identity()));
            }
        }
    }
}

fn image_edges<'a>(units: &'a ChangeUnits, edges: &mut Edges<'a>) {
    if let Some(last) = units.values().find(|unit| unit.is_last()) {
        for unit in units.values().filter(|unit| unit.is_image_change()) {
            edges.push((unit.identity(), last.identity()));
        }
    }

    let mut patterns: Vec<_> = units
        .values()
        .filter_map(|unit| match unit {
            ChangeUnit::NewImageIdToNewPattern(pattern) => Some(pattern),
            _ => None,
        })
        .collect();
    patterns.sort_by_key(|pattern| pattern.pattern_index());
    for pair in patterns.windows(2) {
        edges.push((pair[0].identity(), pair[1].identity()));
    }
}

fn slot_edges<'a>(units: &'a ChangeUnits, edges: &mut Edges<'a>) {
    let mut slots: BTreeMap<(usize, usize), &Identity> = BTreeMap::new();
    for unit in units.values() {
        if let ChangeUnit::AddEncodingCombination(combination) = unit {
            for &slot in combination.pattern_slots() {
                slots.insert(slot, combination.identity());
            }
        }
    }

    let ordered: Vec<_> = slots.into_iter().collect();
    for pair in ordered.windows(2) {
        let ((pattern_a, _), first) = pair[0];
        let ((pattern_b, _), second) = pair[1];
        if pattern_a == pattern_b {
            edges.push((first, second));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        changeunit::{apply_change_units, extract, CompChange, RenameLinkage},
        database::{ComponentInfo, ComponentStatus},
        test::{load_base, load_scenario_reuse_name},
    };

    #[test]
    fn test_rename_vacates_name_first() {
        let base = load_base();
        let target = load_scenario_reuse_name();
        let linkage = RenameLinkage::new().with("comp_cls_1", "comp_1_2", "comp_1_3");
        let units = extract(&base, &target, &linkage).unwrap();

        let graph = DependencyGraph::build(&units);
        let rename = Identity::CompChange {
            class: "comp_cls_1".into(),
            name: "comp_1_3".into(),
            is_new: false,
        };
        let added = Identity::CompChange {
            class: "comp_cls_1".into(),
            name: "comp_1_2".into(),
            is_new: true,
        };

        assert!(graph.dependents(&rename).contains(&added));
        assert!(graph.dependencies(&added).contains(&rename));

        let order = graph.topological_order().unwrap();
        let position = |identity: &Identity| order.iter().position(|id| id == identity).unwrap();
        assert!(position(&rename) < position(&added));
    }

    #[test]
    fn test_suffixed_addition_lands_before_rename() {
        let base = load_base();
        let info = ComponentInfo::from_values([("value", "3")], ComponentStatus::Supported);
        let renamed = base
            .component("comp_cls_1", "comp_1_2")
            .unwrap()
            .with_status(ComponentStatus::Deprecated);

        let added = CompChange::new_component_with_seq_no("comp_cls_1", "comp_1_2", 3, info);
        let rename = CompChange::update("comp_cls_1", "comp_1_2", "comp_1_3", renamed);
        let units: ChangeUnits = [ChangeUnit::from(added), ChangeUnit::from(rename)]
            .into_iter()
            .map(|unit| (unit.identity().clone(), unit))
            .collect();

        let graph = DependencyGraph::build(&units);
        let order = graph.topological_order().unwrap();
        assert_eq!(order[0].to_string(), "CompChange:comp_cls_1:comp_1_2#3(new)");
        assert_eq!(order[1].to_string(), "CompChange:comp_cls_1:comp_1_3");

        let db = apply_change_units(&base, order.iter().map(|id| &units[id])).unwrap();
        assert!(db.component("comp_cls_1", "comp_1_2#3").is_some());
        assert!(db.component("comp_cls_1", "comp_1_3").is_some());
        assert!(db.component("comp_cls_1", "comp_1_2").is_none());
    }

    #[test]
    fn test_empty_graph() {
        let units = ChangeUnits::new();
        assert!(export_dependency_graph(&units).is_empty());
        assert!(DependencyGraph::build(&units)
            .topological_order()
            .unwrap()
            .is_empty());
    }
}
