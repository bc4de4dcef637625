//! Approval bookkeeping and the auto-merge / review split.

use std::collections::{BTreeMap, BTreeSet};

use strum::{Display, EnumString};

use crate::{
    builder::DatabaseBuilder,
    changeunit::{extract, ChangeUnits, DependencyGraph, Identity, RenameLinkage},
    database::Database,
    Error, Result,
};

/// Externally assigned approval of a change unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// May be merged without review
    AutoApproved,
    /// Needs a human reviewer
    #[default]
    ManualReviewRequired,
}

/// Change set between two databases with per-unit approval.
///
/// The manager extracts the change units once, derives their dependency graph and
/// rejects cyclic graphs up front. Approval statuses can then be assigned and the change
/// split into a database that can be committed immediately and the remainder that needs
/// review.
///
/// # Examples
///
/// ```rust,no_run
/// use hwid_changeset::prelude::*;
/// use std::path::Path;
///
/// let base = Database::from_file(Path::new("old/CHROMEBOOK.yaml"))?;
/// let target = Database::from_file(Path::new("new/CHROMEBOOK.yaml"))?;
/// let mut manager = ChangeUnitManager::new(&base, &target, &RenameLinkage::default())?;
///
/// let approvals = manager
///     .change_units()
///     .iter()
///     .filter(|(_, unit)| matches!(unit, ChangeUnit::CompChange(_)))
///     .map(|(identity, _)| (identity.clone(), ApprovalStatus::AutoApproved))
///     .collect::<Vec<_>>();
/// manager.set_approval_status(approvals);
///
/// let (auto_mergeable, review_required) = manager.split_change()?;
/// assert_eq!(review_required, target);
/// # Ok::<(), hwid_changeset::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ChangeUnitManager {
    base: Database,
    target: Database,
    units: ChangeUnits,
    graph: DependencyGraph,
    order: Vec<Identity>,
    approvals: BTreeMap<Identity, ApprovalStatus>,
}

impl ChangeUnitManager {
    /// Extracts the change units from `base` to `target` and orders them.
    ///
    /// # Errors
    ///
    /// Propagates [`extract`] errors and returns [`Error::GraphError`] if the units
    /// cannot be ordered.
    pub fn new(base: &Database, target: &Database, linkage: &RenameLinkage) -> Result<Self> {
        let units = extract(base, target, linkage)?;
        let graph = DependencyGraph::build(&units);
        let order = graph.topological_order()?;

        Ok(Self {
            base: base.clone(),
            target: target.clone(),
            units,
            graph,
            order,
            approvals: BTreeMap::new(),
        })
    }

    /// The base database
    #[must_use]
    pub fn base(&self) -> &Database {
        &self.base
    }

    /// The target database
    #[must_use]
    pub fn target(&self) -> &Database {
        &self.target
    }

    /// Extracted change units by identity
    #[must_use]
    pub fn change_units(&self) -> &ChangeUnits {
        &self.units
    }

    /// Dependency graph of the change units
    #[must_use]
    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Each unit with the set of units that must be applied after it.
    #[must_use]
    pub fn export_dependency_graph(&self) -> BTreeMap<Identity, BTreeSet<Identity>> {
        self.graph.to_map()
    }

    /// Dependencies-first application order.
    #[must_use]
    pub fn topological_order(&self) -> &[Identity] {
        &self.order
    }

    /// Records approval statuses, merging with earlier calls.
    ///
    /// Identities that are not part of the change set are ignored.
    pub fn set_approval_status<I>(&mut self, statuses: I)
    where
        I: IntoIterator<Item = (Identity, ApprovalStatus)>,
    {
        for (identity, status) in statuses {
            if !self.units.contains_key(&identity) {
                tracing::warn!(unit = %identity, "ignoring approval status of unknown change unit");
                continue;
            }
            self.approvals.insert(identity, status);
        }
    }

    /// Status assigned to `identity`, [`ApprovalStatus::ManualReviewRequired`] if none was.
    #[must_use]
    pub fn approval_status(&self, identity: &Identity) -> ApprovalStatus {
        self.approvals.get(identity).copied().unwrap_or_default()
    }

    /// Status of every unit after propagation.
    ///
    /// A unit is auto-approved iff it was tagged so and everything it depends on,
    /// transitively, was tagged so too.
    #[must_use]
    pub fn effective_approval_status(&self) -> BTreeMap<Identity, ApprovalStatus> {
        let mut effective: BTreeMap<Identity, ApprovalStatus> = BTreeMap::new();
        for identity in &self.order {
            let approved = self.approval_status(identity) == ApprovalStatus::AutoApproved
                && self.graph.dependencies(identity).iter().all(|dependency| {
                    effective.get(*dependency) == Some(&ApprovalStatus::AutoApproved)
                });
            let status = if approved {
                ApprovalStatus::AutoApproved
            } else {
                ApprovalStatus::ManualReviewRequired
            };
            effective.insert(identity.clone(), status);
        }
        effective
    }

    /// Splits the change into `(auto_mergeable_db, review_required_db)`.
    ///
    /// `auto_mergeable_db` is the base with every effectively auto-approved unit
    /// applied; `review_required_db` additionally has the remaining units applied and
    /// always equals the target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApplyChangeUnit`] or [`Error::Malformed`] if a unit cannot be
    /// applied or an intermediate database is invalid, and
    /// [`Error::IncompatibleDatabases`] if the units do not reproduce the target.
    pub fn split_change(&self) -> Result<(Database, Database)> {
        let effective = self.effective_approval_status();
        let is_auto =
            |identity: &Identity| effective.get(identity) == Some(&ApprovalStatus::AutoApproved);

        let mut builder = DatabaseBuilder::new(&self.base);
        let mut auto_count = 0usize;
        for identity in self.order.iter().filter(|identity| is_auto(identity)) {
            if let Some(unit) = self.units.get(identity) {
                unit.patch(&mut builder)?;
                auto_count += 1;
            }
        }
        let auto_mergeable = builder.build()?;

        for identity in self.order.iter().filter(|identity| !is_auto(identity)) {
            if let Some(unit) = self.units.get(identity) {
                unit.patch(&mut builder)?;
            }
        }
        let review_required = builder.build()?;

        if review_required != self.target {
            return Err(Error::IncompatibleDatabases(
                "applying every change unit does not reproduce the target database".to_string(),
            ));
        }

        tracing::debug!(
            auto = auto_count,
            review = self.units.len() - auto_count,
            "split change"
        );
        Ok((auto_mergeable, review_required))
    }
}
