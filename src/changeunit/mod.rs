//! Change units: atomic, independently identifiable edits between two database versions.
//!
//! This module provides the change-set engine:
//! - [`ChangeUnit`] - the closed set of edit kinds, each with a `patch` operation
//! - [`extract`] - computes the change units turning a base database into a target
//! - [`export_dependency_graph`] - which units must be applied after which
//! - [`apply_change_units`] - applies a set of units in dependency order
//! - [`ChangeUnitManager`] - approval bookkeeping and the auto-merge / review split
//!
//! # Change Unit Kinds
//!
//! | Kind | Edit |
//! |------|------|
//! | [`CompChange`] | adds a component, or updates/renames one |
//! | [`AddEncodingCombination`] | one new encoding index of a field (index 0 creates the field) |
//! | [`NewImageIdToExistingPattern`] | a new image id in a base pattern |
//! | [`NewImageIdToNewPattern`] | a new pattern with its image ids and field layout |
//! | [`ReplaceRules`] | the complete new rules section |
//!
//! # Examples
//!
//! ```rust,no_run
//! use hwid_changeset::prelude::*;
//! use std::path::Path;
//!
//! let base = Database::from_file(Path::new("old/CHROMEBOOK.yaml"))?;
//! let target = Database::from_file(Path::new("new/CHROMEBOOK.yaml"))?;
//!
//! let units = extract(&base, &target, &RenameLinkage::default())?;
//! for (identity, unit) in &units {
//!     println!("{identity} ({})", unit.kind());
//! }
//!
//! let rebuilt = apply_change_units(&base, units.values())?;
//! assert_eq!(rebuilt, target);
//! # Ok::<(), hwid_changeset::Error>(())
//! ```

mod add_encoding_combination;
mod comp_change;
mod dependency;
mod extract;
mod identity;
mod manager;
mod new_image_existing;
mod new_image_new;
mod replace_rules;

pub use add_encoding_combination::{AddEncodingCombination, ComponentSelection};
pub use comp_change::CompChange;
pub use dependency::{export_dependency_graph, DependencyGraph};
pub use extract::{extract, RenameLink, RenameLinkage};
pub use identity::Identity;
pub use manager::{ApprovalStatus, ChangeUnitManager};
pub use new_image_existing::NewImageIdToExistingPattern;
pub use new_image_new::NewImageIdToNewPattern;
pub use replace_rules::ReplaceRules;

use std::{collections::BTreeMap, fmt};

use strum::IntoStaticStr;

use crate::{builder::DatabaseBuilder, database::Database, Result};

/// Extracted change set, keyed and ordered by identity.
pub type ChangeUnits = BTreeMap<Identity, ChangeUnit>;

/// One atomic structural edit.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
pub enum ChangeUnit {
    /// Component addition or update
    CompChange(CompChange),
    /// New encoding index
    AddEncodingCombination(AddEncodingCombination),
    /// New image id in an existing pattern
    NewImageIdToExistingPattern(NewImageIdToExistingPattern),
    /// New pattern
    NewImageIdToNewPattern(NewImageIdToNewPattern),
    /// New rules section
    ReplaceRules(ReplaceRules),
}

impl ChangeUnit {
    /// Identity of the unit, computed at construction.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        match self {
            ChangeUnit::CompChange(unit) => unit.identity(),
            ChangeUnit::AddEncodingCombination(unit) => unit.identity(),
            ChangeUnit::NewImageIdToExistingPattern(unit) => unit.identity(),
            ChangeUnit::NewImageIdToNewPattern(unit) => unit.identity(),
            ChangeUnit::ReplaceRules(unit) => unit.identity(),
        }
    }

    /// Name of the variant
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// Returns `true` for the image unit carrying the latest image id.
    #[must_use]
    pub fn is_last(&self) -> bool {
        match self {
            ChangeUnit::NewImageIdToExistingPattern(unit) => unit.is_last(),
            ChangeUnit::NewImageIdToNewPattern(unit) => unit.is_last(),
            _ => false,
        }
    }

    /// Returns `true` for units adding image ids or patterns.
    #[must_use]
    pub fn is_image_change(&self) -> bool {
        matches!(
            self,
            ChangeUnit::NewImageIdToExistingPattern(_) | ChangeUnit::NewImageIdToNewPattern(_)
        )
    }

    /// Applies the unit to `builder`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ApplyChangeUnit`] when a referenced entity is missing,
    /// a target already exists or a structural invariant would break. The builder is
    /// left unchanged in that case.
    pub fn patch(&self, builder: &mut DatabaseBuilder) -> Result<()> {
        tracing::trace!(unit = %self.identity(), "patch");
        match self {
            ChangeUnit::CompChange(unit) => unit.patch(builder),
            ChangeUnit::AddEncodingCombination(unit) => unit.patch(builder),
            ChangeUnit::NewImageIdToExistingPattern(unit) => unit.patch(builder),
            ChangeUnit::NewImageIdToNewPattern(unit) => unit.patch(builder),
            ChangeUnit::ReplaceRules(unit) => unit.patch(builder),
        }
    }
}

impl fmt::Display for ChangeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.identity(), f)
    }
}

impl From<CompChange> for ChangeUnit {
    fn from(unit: CompChange) -> Self {
        ChangeUnit::CompChange(unit)
    }
}

impl From<AddEncodingCombination> for ChangeUnit {
    fn from(unit: AddEncodingCombination) -> Self {
        ChangeUnit::AddEncodingCombination(unit)
    }
}

impl From<NewImageIdToExistingPattern> for ChangeUnit {
    fn from(unit: NewImageIdToExistingPattern) -> Self {
        ChangeUnit::NewImageIdToExistingPattern(unit)
    }
}

impl From<NewImageIdToNewPattern> for ChangeUnit {
    fn from(unit: NewImageIdToNewPattern) -> Self {
        ChangeUnit::NewImageIdToNewPattern(unit)
    }
}

impl From<ReplaceRules> for ChangeUnit {
    fn from(unit: ReplaceRules) -> Self {
        ChangeUnit::ReplaceRules(unit)
    }
}

/// Applies `units` to a fresh builder over `base` in dependency order and builds the result.
///
/// The units are ordered with the same rules [`export_dependency_graph`] uses, so any
/// subset of an extracted change set that is closed under dependencies can be applied.
///
/// # Errors
///
/// Returns [`crate::Error::GraphError`] if the units depend on each other cyclically,
/// [`crate::Error::ApplyChangeUnit`] if a unit does not apply (for example because one of
/// its dependencies is not part of `units`), and [`crate::Error::Malformed`] if the result
/// violates a database invariant.
pub fn apply_change_units<'a, I>(base: &Database, units: I) -> Result<Database>
where
    I: IntoIterator<Item = &'a ChangeUnit>,
{
    let units: ChangeUnits = units
        .into_iter()
        .map(|unit| (unit.identity().clone(), unit.clone()))
        .collect();
    let graph = DependencyGraph::build(&units);
    let order = graph.topological_order()?;

    let mut builder = DatabaseBuilder::new(base);
    for identity in &order {
        if let Some(unit) = units.get(identity) {
            unit.patch(&mut builder)?;
        }
    }
    builder.build()
}
