use strum::Display;
use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! apply_error {
    ($category:ident, $msg:expr) => {
        crate::Error::ApplyChangeUnit(crate::error::ApplyChangeUnitError::new(
            crate::error::ApplyFailure::$category,
            $msg,
        ))
    };

    ($category:ident, $fmt:expr, $($arg:tt)*) => {
        crate::Error::ApplyChangeUnit(crate::error::ApplyChangeUnitError::new(
            crate::error::ApplyFailure::$category,
            format!($fmt, $($arg)*),
        ))
    };
}

/// Classification of a failed builder operation or change-unit patch.
///
/// All three categories surface through the same [`Error::ApplyChangeUnit`] variant;
/// the category only exists so callers (and tests) can tell them apart without
/// parsing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ApplyFailure {
    /// A referenced component, encoded field, pattern or image id does not exist
    /// in the builder's current state. Out-of-order application and bad rename
    /// linkage end up here.
    MissingReferent,
    /// The edit would create an entity (component name, field name, encoding
    /// index, image id) that already exists.
    DuplicateTarget,
    /// The edit would break a structural invariant of the database, for example
    /// a second claim on the latest image id.
    StructuralViolation,
}

/// Failure raised while applying a change unit to a [`crate::builder::DatabaseBuilder`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to apply change unit ({category}): {message}")]
pub struct ApplyChangeUnitError {
    /// What kind of failure this is
    pub category: ApplyFailure,
    /// Human-readable cause
    pub message: String,
}

impl ApplyChangeUnitError {
    /// Creates a new error of the given category.
    pub fn new(category: ApplyFailure, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Document Errors
/// - [`Error::Malformed`] - The database document is invalid or breaks an invariant
/// - [`Error::ChecksumMismatch`] - The embedded checksum does not match the content
/// - [`Error::Yaml`] - The document is not valid YAML
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// ## Change-Set Errors
/// - [`Error::ApplyChangeUnit`] - A builder operation or change-unit patch failed
/// - [`Error::InvalidRenameLinkage`] - The externally supplied rename linkage contradicts itself
/// - [`Error::IncompatibleDatabases`] - The target is not an append-only extension of the base
/// - [`Error::GraphError`] - The dependency graph could not be ordered
///
/// # Examples
///
/// ```rust,no_run
/// use hwid_changeset::{Database, Error};
///
/// match Database::from_file(std::path::Path::new("project.yaml")) {
///     Ok(db) => println!("Loaded {}", db.project()),
///     Err(Error::ChecksumMismatch { expected, actual }) => {
///         eprintln!("checksum {} does not match content ({})", expected, actual);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The database document is damaged, or a database violates one of its invariants.
    ///
    /// The error includes the source location where the problem was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The checksum stored in the document does not match its content.
    #[error("Checksum mismatch - stored {expected}, computed {actual}")]
    ChecksumMismatch {
        /// The checksum found in the document
        expected: String,
        /// The checksum computed from the document content
        actual: String,
    },

    /// A change unit (or the builder operation it called) could not be applied.
    #[error("{0}")]
    ApplyChangeUnit(#[from] ApplyChangeUnitError),

    /// The rename linkage supplied by the caller is internally contradictory.
    #[error("Invalid rename linkage - {0}")]
    InvalidRenameLinkage(String),

    /// The target database cannot be reached from the base database through
    /// additive change units.
    #[error("Incompatible databases - {0}")]
    IncompatibleDatabases(String),

    /// Dependency graph error, usually a cycle between change units.
    #[error("{0}")]
    GraphError(String),

    /// YAML (de)serialization error.
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

impl Error {
    /// Returns the apply-failure category when this is an [`Error::ApplyChangeUnit`].
    #[must_use]
    pub fn apply_failure(&self) -> Option<ApplyFailure> {
        match self {
            Error::ApplyChangeUnit(err) => Some(err.category),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_error_macro() {
        let err = apply_error!(MissingReferent, "no field {}", "cpu_field");
        assert_eq!(err.apply_failure(), Some(ApplyFailure::MissingReferent));
        assert_eq!(
            err.to_string(),
            "Failed to apply change unit (missing-referent): no field cpu_field"
        );
    }

    #[test]
    fn test_malformed_error_macro() {
        let err = malformed_error!("bad index {}", 3);
        assert!(err.apply_failure().is_none());
        assert!(err.to_string().contains("bad index 3"));
    }
}
