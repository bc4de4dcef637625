//! Validation configuration for database loading
//!
//! Parsing already guarantees that encoding indices are contiguous and that every
//! pattern field entry names exactly one field. The checks configured here go beyond
//! that and require cross-section analysis of the loaded document.

/// Configuration for database validation when loading a document
///
/// [`crate::builder::DatabaseBuilder::build`] ignores this configuration and always runs
/// every check; it only governs how forgiving [`crate::Database::load_with_config`] is with
/// hand-edited input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ValidationConfig {
    /// Compare the embedded checksum (if any) against the content
    pub verify_checksum: bool,

    /// Every field named in a pattern must exist in `encoded_fields`
    pub check_pattern_fields: bool,

    /// Every component named in an encoded field must exist under its class
    pub check_component_references: bool,

    /// Image ids must be declared and partition 1:1 into the patterns
    pub check_image_partition: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            check_pattern_fields: true,
            check_component_references: true,
            check_image_partition: true,
        }
    }
}

impl ValidationConfig {
    /// Creates a disabled validation configuration
    ///
    /// Only parsing errors are reported. **Warning**: a database loaded this way may
    /// violate invariants that change-unit extraction relies on.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            verify_checksum: false,
            check_pattern_fields: false,
            check_component_references: false,
            check_image_partition: false,
        }
    }

    /// Creates a minimal validation configuration
    ///
    /// Keeps the structural checks, skips checksum verification. Useful for documents
    /// that were edited by hand and not re-checksummed yet.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            verify_checksum: false,
            check_pattern_fields: true,
            check_component_references: true,
            check_image_partition: true,
        }
    }

    /// Creates a validation configuration with all checks enabled
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Returns `true` if any structural check is enabled.
    #[must_use]
    pub fn checks_structure(&self) -> bool {
        self.check_pattern_fields || self.check_component_references || self.check_image_partition
    }
}
