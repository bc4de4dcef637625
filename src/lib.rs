// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # hwid-changeset
//!
//! Change-set engine for HWID databases: the YAML documents that map hardware
//! components to the compact hardware identifiers of a device project.
//!
//! Given a base and a target version of a database, `hwid-changeset` splits the
//! difference into atomic, independently identifiable change units, orders them by
//! dependency, replays them through a staging builder and splits the change into a part
//! that may be merged automatically and a part that needs review.
//!
//! ## Features
//!
//! - **📄 Canonical documents** - Deterministic YAML dumps with an embedded SHA-1 checksum
//! - **🧩 Change units** - Component, encoding, image and rule edits, each with a stable identity
//! - **🔗 Dependency graph** - Which units must land before which, with cycle detection
//! - **✅ Approval split** - Auto-mergeable and review-required databases from per-unit approvals
//! - **🛡️ Transactional builder** - Failed edits leave the staged database untouched
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hwid_changeset::prelude::*;
//! use std::path::Path;
//!
//! let base = Database::from_file(Path::new("old/CHROMEBOOK.yaml"))?;
//! let target = Database::from_file(Path::new("new/CHROMEBOOK.yaml"))?;
//!
//! let mut manager = ChangeUnitManager::new(&base, &target, &RenameLinkage::default())?;
//! for identity in manager.topological_order() {
//!     println!("{identity}");
//! }
//!
//! let approvals: Vec<_> = manager
//!     .change_units()
//!     .keys()
//!     .map(|identity| (identity.clone(), ApprovalStatus::AutoApproved))
//!     .collect();
//! manager.set_approval_status(approvals);
//!
//! let (auto_mergeable, _review_required) = manager.split_change()?;
//! assert_eq!(auto_mergeable, target);
//! # Ok::<(), hwid_changeset::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result):
//!
//! ```rust,no_run
//! use hwid_changeset::{Database, Error};
//!
//! match Database::from_file(std::path::Path::new("CHROMEBOOK.yaml")) {
//!     Ok(db) => println!("loaded {}", db.project()),
//!     Err(Error::ChecksumMismatch { expected, actual }) => {
//!         println!("stale checksum {expected}, content hashes to {actual}")
//!     }
//!     Err(Error::Malformed { message, .. }) => println!("Malformed database: {}", message),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use hwid_changeset::prelude::*;
///
/// let db = Database::from_file("CHROMEBOOK.yaml".as_ref())?;
/// let units = extract(&db, &db, &RenameLinkage::default())?;
/// assert!(units.is_empty());
/// # Ok::<(), hwid_changeset::Error>(())
/// ```
pub mod prelude;

/// Database model, loading and canonical serialization
///
/// # Key Types
///
/// - [`Database`] - One immutable version of a HWID database
/// - [`database::ComponentInfo`] - Values, status and information of a component
/// - [`database::EncodingPattern`] - Image ids and bit layout of one pattern
/// - [`database::EncodedField`] - Index-ordered component combinations
/// - [`ValidationConfig`] - Which invariants are checked while loading
pub mod database;

/// Staging builder applying structural edits to a database
///
/// See [`builder::DatabaseBuilder`].
pub mod builder;

/// Change units, extraction, dependency ordering and the approval split
///
/// # Main Functions
///
/// - [`changeunit::extract`] - Change units between two databases
/// - [`changeunit::export_dependency_graph`] - Dependents of every unit
/// - [`changeunit::apply_change_units`] - Replays units on a base database
/// - [`changeunit::ChangeUnitManager::split_change`] - Auto-mergeable and review-required databases
pub mod changeunit;

/// Generic helpers
pub mod utils;

/// `hwid-changeset` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `hwid-changeset` Error type
///
/// Every fallible operation reports one of its variants; failed change-unit patches carry
/// an [`ApplyFailure`] category.
pub use error::{ApplyChangeUnitError, ApplyFailure, Error};

/// Main database type
pub use database::{Database, ValidationConfig};

/// Staging builder
pub use builder::DatabaseBuilder;

/// Change units and their manager
pub use changeunit::{
    apply_change_units, export_dependency_graph, extract, ApprovalStatus, ChangeUnit,
    ChangeUnitManager, Identity, RenameLinkage,
};
