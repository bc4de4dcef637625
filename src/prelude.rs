//! # hwid-changeset Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! hwid-changeset library. Import this module to get quick access to everything needed
//! to load databases, extract change units and split a change by approval.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all hwid-changeset operations
pub use crate::Error;

/// Category of a failed change-unit patch
pub use crate::ApplyFailure;

/// The result type used throughout hwid-changeset
pub use crate::Result;

/// Configuration for database validation during loading
pub use crate::ValidationConfig;

// ================================================================================================
// Database Model
// ================================================================================================

/// One immutable database version
pub use crate::database::Database;

/// Components
pub use crate::database::{ComponentInfo, ComponentMap, ComponentStatus, ContentHash};

/// Encoded fields and patterns
pub use crate::database::{
    bits_required, Combination, EncodedField, EncodingPattern, EncodingScheme, PatternField,
};

/// Post-decode rules
pub use crate::database::Rule;

// ================================================================================================
// Builder
// ================================================================================================

/// Staging builder for database edits
pub use crate::builder::DatabaseBuilder;

// ================================================================================================
// Change Units
// ================================================================================================

/// The change unit sum type and its variants
pub use crate::changeunit::{
    AddEncodingCombination, ChangeUnit, ChangeUnits, CompChange, ComponentSelection, Identity,
    NewImageIdToExistingPattern, NewImageIdToNewPattern, ReplaceRules,
};

/// Extraction and rename linkage
pub use crate::changeunit::{extract, RenameLink, RenameLinkage};

/// Dependency ordering and replay
pub use crate::changeunit::{apply_change_units, export_dependency_graph, DependencyGraph};

/// Approval bookkeeping
pub use crate::changeunit::{ApprovalStatus, ChangeUnitManager};
