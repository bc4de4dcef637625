//! HWID database model.
//!
//! A [`Database`] is one immutable version of a HWID database document. It is produced
//! either by loading a document ([`Database::load`], [`Database::from_file`]) or by
//! [`crate::builder::DatabaseBuilder::build`], and is never mutated afterwards.
//!
//! # Sections
//!
//! - `image_id` - image id to build-phase name (`PROTO`, `EVT`, ...)
//! - `pattern` - ordered [`EncodingPattern`]s; every image id belongs to exactly one
//! - `encoded_fields` - named [`EncodedField`]s, each an index-ordered list of [`Combination`]s
//! - `components` - per class, component name to [`ComponentInfo`]
//! - `rules` - opaque post-decode [`Rule`]s
//!
//! # Canonical Form
//!
//! Two databases are equal iff their canonical dumps are byte-identical. The dump is
//! produced by `serde_yaml` from key-ordered maps, so it does not depend on the order in
//! which a builder staged its edits. The embedded `checksum` is the SHA-1 of the dump
//! without the checksum line.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hwid_changeset::Database;
//!
//! let db = Database::from_file(std::path::Path::new("CHROMEBOOK.yaml"))?;
//! println!("{} has {} patterns", db.project(), db.patterns().len());
//! println!("{}", db.dump_canonical()?);
//! # Ok::<(), hwid_changeset::Error>(())
//! ```

mod component;
mod config;
mod encoded;
mod pattern;
mod raw;
mod rule;

pub use component::{ComponentInfo, ComponentStatus, ContentHash};
pub use config::ValidationConfig;
pub use encoded::{Combination, EncodedField};
pub use pattern::{bits_required, EncodingPattern, EncodingScheme, PatternField};
pub use rule::Rule;

use std::{collections::BTreeMap, fmt::Write as _, path::Path};

use sha1::{Digest, Sha1};

use crate::{Error, Result};
use raw::RawDatabase;

/// Components of one class, by name.
pub type ComponentMap = BTreeMap<String, ComponentInfo>;

/// One version of a HWID database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub(crate) project: String,
    pub(crate) image_ids: BTreeMap<u32, String>,
    pub(crate) patterns: Vec<EncodingPattern>,
    pub(crate) encoded_fields: BTreeMap<String, EncodedField>,
    pub(crate) components: BTreeMap<String, ComponentMap>,
    pub(crate) rules: Vec<Rule>,
}

impl Database {
    /// Creates an empty database for `project`.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            image_ids: BTreeMap::new(),
            patterns: Vec::new(),
            encoded_fields: BTreeMap::new(),
            components: BTreeMap::new(),
            rules: Vec::new(),
        }
    }

    /// Parses a database document with the default (strict) validation.
    ///
    /// # Arguments
    ///
    /// * `text` - The YAML document
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] for unparsable input, [`Error::Malformed`] for broken
    /// invariants and [`Error::ChecksumMismatch`] if the embedded checksum is stale.
    pub fn load(text: &str) -> Result<Database> {
        Self::load_with_config(text, &ValidationConfig::default())
    }

    /// Parses a database document with a custom validation configuration.
    ///
    /// # Arguments
    ///
    /// * `text` - The YAML document
    /// * `config` - Which checks to run after parsing
    ///
    /// # Errors
    ///
    /// See [`Database::load`]; disabled checks are not reported.
    pub fn load_with_config(text: &str, config: &ValidationConfig) -> Result<Database> {
        let raw: RawDatabase = serde_yaml::from_str(text)?;
        let (db, checksum) = raw.into_database()?;

        db.validate_with(config)?;

        if config.verify_checksum {
            if let Some(expected) = checksum {
                let actual = db.checksum()?;
                if expected != actual {
                    return Err(Error::ChecksumMismatch { expected, actual });
                }
            }
        }

        tracing::debug!(
            project = %db.project,
            patterns = db.patterns.len(),
            fields = db.encoded_fields.len(),
            "loaded database"
        );
        Ok(db)
    }

    /// Loads a database document from disk with the default validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be read, otherwise see [`Database::load`].
    pub fn from_file(path: &Path) -> Result<Database> {
        Self::from_file_with_config(path, &ValidationConfig::default())
    }

    /// Loads a database document from disk with a custom validation configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be read, otherwise see
    /// [`Database::load_with_config`].
    pub fn from_file_with_config(path: &Path, config: &ValidationConfig) -> Result<Database> {
        let text = std::fs::read_to_string(path)?;
        Self::load_with_config(&text, config)
    }

    /// Canonical document including the leading `checksum`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] if serialization fails.
    pub fn dump_canonical(&self) -> Result<String> {
        let checksum = self.checksum()?;
        Ok(serde_yaml::to_string(&RawDatabase::from_database(
            self,
            Some(checksum),
        ))?)
    }

    /// Canonical document without the `checksum` key, used for comparisons.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] if serialization fails.
    pub fn dump_canonical_without_checksum(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&RawDatabase::from_database(
            self, None,
        ))?)
    }

    /// Lowercase hex SHA-1 of [`Database::dump_canonical_without_checksum`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] if serialization fails.
    pub fn checksum(&self) -> Result<String> {
        let digest = Sha1::digest(self.dump_canonical_without_checksum()?.as_bytes());
        let mut hex = String::with_capacity(40);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Ok(hex)
    }

    /// Runs every invariant check.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] describing the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        self.validate_with(&ValidationConfig::strict())
    }

    /// Runs the invariant checks enabled in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] describing the first violated invariant.
    pub fn validate_with(&self, config: &ValidationConfig) -> Result<()> {
        if config.check_image_partition {
            self.check_image_partition()?;
        }
        if config.check_pattern_fields {
            self.check_pattern_fields()?;
        }
        if config.check_component_references {
            self.check_component_references()?;
        }
        Ok(())
    }

    fn check_image_partition(&self) -> Result<()> {
        let mut owner: BTreeMap<u32, usize> = BTreeMap::new();
        for (index, pattern) in self.patterns.iter().enumerate() {
            for &image_id in &pattern.image_ids {
                if !self.image_ids.contains_key(&image_id) {
                    return Err(malformed_error!(
                        "Pattern {} uses undeclared image id {}",
                        index,
                        image_id
                    ));
                }
                if let Some(previous) = owner.insert(image_id, index) {
                    return Err(malformed_error!(
                        "Image id {} is used by patterns {} and {}",
                        image_id,
                        previous,
                        index
                    ));
                }
            }
        }

        if let Some(orphan) = self.image_ids.keys().find(|id| !owner.contains_key(id)) {
            return Err(malformed_error!(
                "Image id {} does not belong to any pattern",
                orphan
            ));
        }
        Ok(())
    }

    fn check_pattern_fields(&self) -> Result<()> {
        for (index, pattern) in self.patterns.iter().enumerate() {
            if let Some(entry) = pattern
                .fields
                .iter()
                .find(|entry| !self.encoded_fields.contains_key(&entry.name))
            {
                return Err(malformed_error!(
                    "Pattern {} references unknown encoded field {}",
                    index,
                    entry.name
                ));
            }
        }

        if let Some((name, _)) = self
            .encoded_fields
            .iter()
            .find(|(_, field)| field.is_empty())
        {
            return Err(malformed_error!("Encoded field {} has no combination", name));
        }
        Ok(())
    }

    fn check_component_references(&self) -> Result<()> {
        for (field_name, field) in &self.encoded_fields {
            for (index, combination) in field.combinations.iter().enumerate() {
                for (class, names) in combination.iter() {
                    for name in names {
                        if self.component(class, name).is_none() {
                            return Err(malformed_error!(
                                "Encoded field {} index {} references unknown component {}/{}",
                                field_name,
                                index,
                                class,
                                name
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Project (board) name
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Image id to build-phase name
    #[must_use]
    pub fn image_ids(&self) -> &BTreeMap<u32, String> {
        &self.image_ids
    }

    /// Greatest image id, if any image is declared.
    #[must_use]
    pub fn latest_image_id(&self) -> Option<u32> {
        self.image_ids.keys().next_back().copied()
    }

    /// Patterns in document order
    #[must_use]
    pub fn patterns(&self) -> &[EncodingPattern] {
        &self.patterns
    }

    /// Pattern at `index`
    #[must_use]
    pub fn pattern(&self, index: usize) -> Option<&EncodingPattern> {
        self.patterns.get(index)
    }

    /// Index of the pattern that holds `image_id`.
    #[must_use]
    pub fn pattern_of_image(&self, image_id: u32) -> Option<usize> {
        self.patterns
            .iter()
            .position(|pattern| pattern.image_ids.contains(&image_id))
    }

    /// Index of the pattern open for growth: the one holding the latest image id.
    #[must_use]
    pub fn open_pattern_index(&self) -> Option<usize> {
        self.latest_image_id()
            .and_then(|image_id| self.pattern_of_image(image_id))
    }

    /// All encoded fields by name
    #[must_use]
    pub fn encoded_fields(&self) -> &BTreeMap<String, EncodedField> {
        &self.encoded_fields
    }

    /// Encoded field `name`
    #[must_use]
    pub fn encoded_field(&self, name: &str) -> Option<&EncodedField> {
        self.encoded_fields.get(name)
    }

    /// All components, by class then name
    #[must_use]
    pub fn components(&self) -> &BTreeMap<String, ComponentMap> {
        &self.components
    }

    /// Component classes, ascending
    pub fn component_classes(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Components of `class`
    #[must_use]
    pub fn components_of(&self, class: &str) -> Option<&ComponentMap> {
        self.components.get(class)
    }

    /// Component `name` of `class`
    #[must_use]
    pub fn component(&self, class: &str, name: &str) -> Option<&ComponentInfo> {
        self.components.get(class).and_then(|items| items.get(name))
    }

    /// Names of the components of `class` whose content hash is `hash`, ascending.
    #[must_use]
    pub fn components_with_hash(&self, class: &str, hash: ContentHash) -> Vec<&str> {
        self.components
            .get(class)
            .map(|items| {
                items
                    .iter()
                    .filter(|(_, info)| info.content_hash() == hash)
                    .map(|(name, _)| name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Post-decode rules in order
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{load_base, BASE_DB};

    #[test]
    fn test_load_base() {
        let db = load_base();

        assert_eq!(db.project(), "CHROMEBOOK");
        assert_eq!(db.image_ids().len(), 2);
        assert_eq!(db.latest_image_id(), Some(1));
        assert_eq!(db.open_pattern_index(), Some(0));
        assert_eq!(db.pattern_of_image(0), Some(0));
        assert_eq!(db.pattern_of_image(7), None);

        let pattern = db.pattern(0).unwrap();
        assert_eq!(pattern.encoding_scheme(), EncodingScheme::Base8192);
        assert_eq!(pattern.bit_length("comp_cls_1_field"), 2);

        let field = db.encoded_field("comp_cls_1_field").unwrap();
        assert_eq!(field.len(), 2);
        assert_eq!(field.combinations()[1].names("comp_cls_1"), ["comp_1_2"]);

        let storage = db.encoded_field("storage_field").unwrap();
        assert!(storage.combinations()[0].names("storage").is_empty());
        assert!(db.rules().is_empty());
    }

    #[test]
    fn test_dump_is_stable() {
        let db = load_base();
        let dump = db.dump_canonical().unwrap();
        let reloaded = Database::load(&dump).unwrap();

        assert_eq!(reloaded, db);
        assert_eq!(reloaded.dump_canonical().unwrap(), dump);
        assert!(dump.starts_with("checksum: "));
        assert!(!db
            .dump_canonical_without_checksum()
            .unwrap()
            .contains("checksum"));
    }

    #[test]
    fn test_canonical_omits_defaults() {
        let dump = load_base().dump_canonical_without_checksum().unwrap();
        assert!(!dump.contains("status: supported"));
        assert!(!dump.contains("information"));
        assert!(dump.contains("storage: []"));
    }

    #[test]
    fn test_checksum_mismatch() {
        let db = load_base();
        let dump = db.dump_canonical().unwrap();
        let tampered = dump.replacen("PROTO", "PROTO2", 1);

        let err = Database::load(&tampered).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));

        let relaxed = Database::load_with_config(&tampered, &ValidationConfig::minimal()).unwrap();
        assert_eq!(relaxed.image_ids()[&0], "PROTO2");
    }

    #[test]
    fn test_index_gap_is_malformed() {
        let text = BASE_DB.replace(
            "    1:\n      comp_cls_1: comp_1_2",
            "    2:\n      comp_cls_1: comp_1_2",
        );
        assert_ne!(text, BASE_DB);
        let err = Database::load(&text).unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }), "{err}");
    }

    #[test]
    fn test_dangling_component_reference() {
        let text = BASE_DB.replace("comp_cls_1: comp_1_2", "comp_cls_1: comp_1_9");
        let err = Database::load(&text).unwrap_err();
        assert!(err.to_string().contains("comp_1_9"));

        let loaded = Database::load_with_config(&text, &ValidationConfig::disabled()).unwrap();
        assert!(loaded.validate().is_err());
    }

    #[test]
    fn test_unowned_image_id() {
        let text = BASE_DB.replace("  1: EVT\n", "  1: EVT\n  9: DVT\n");
        let err = Database::load(&text).unwrap_err();
        assert!(err.to_string().contains("Image id 9"));
    }

    #[test]
    fn test_components_with_hash() {
        let db = load_base();
        let hash = db.component("comp_cls_1", "comp_1_1").unwrap().content_hash();
        assert_eq!(db.components_with_hash("comp_cls_1", hash), vec!["comp_1_1"]);
        assert!(db.components_with_hash("cpu", hash).is_empty());
    }
}
