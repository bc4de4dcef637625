//! Mutable staging of database edits.
//!
//! [`DatabaseBuilder`] wraps one base [`Database`] and exposes the capability-scoped
//! operations change units are made of. Every operation validates completely before
//! touching the staging copy, so a failing call leaves the builder exactly as it was.
//!
//! # Architecture
//!
//! The builder owns a private working copy of the database plus the bookkeeping that
//! does not live in the document itself:
//! - **Bit allocation**: growing a field appends entries to the listed patterns carrying
//!   exactly the missing bits
//! - **Latest image claim**: at most one operation may claim the latest image id of the
//!   session, keeping a single pattern open for growth
//! - **Referential rewrites**: renaming a component rewrites every encoded-field reference
//!
//! # Usage
//!
//! ```rust,no_run
//! use hwid_changeset::{builder::DatabaseBuilder, Database};
//! use hwid_changeset::database::{ComponentInfo, ComponentStatus};
//!
//! let base = Database::from_file(std::path::Path::new("CHROMEBOOK.yaml"))?;
//! let mut builder = DatabaseBuilder::new(&base);
//! builder.add_component(
//!     "cpu",
//!     "cpu_2",
//!     ComponentInfo::from_values([("model", "x2")], ComponentStatus::Supported),
//! )?;
//! let updated = builder.build()?;
//! # Ok::<(), hwid_changeset::Error>(())
//! ```

use std::collections::BTreeSet;

use crate::{
    database::{
        bits_required, Combination, ComponentInfo, ComponentStatus, ContentHash, Database,
        EncodedField, EncodingPattern, EncodingScheme, PatternField, Rule,
    },
    Result,
};

/// Exclusively owned staging area for edits against one base database.
///
/// Not `Clone`: every edit session has exactly one writer.
#[derive(Debug)]
pub struct DatabaseBuilder {
    /// Working copy the operations mutate
    staging: Database,

    /// Image id claimed as the latest one of this session, if any
    latest_claim: Option<u32>,
}

impl DatabaseBuilder {
    /// Creates a builder staging edits against `base`.
    ///
    /// # Arguments
    ///
    /// * `base` - The database to start from; it is copied, never modified
    #[must_use]
    pub fn new(base: &Database) -> Self {
        Self {
            staging: base.clone(),
            latest_claim: None,
        }
    }

    /// Read-only view of the staged state.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.staging
    }

    /// Image id claimed as latest by this session.
    #[must_use]
    pub fn latest_claim(&self) -> Option<u32> {
        self.latest_claim
    }

    /// Adds a new component.
    ///
    /// # Errors
    ///
    /// Duplicate-target if `name` already exists in `class`.
    pub fn add_component(
        &mut self,
        class: &str,
        name: &str,
        info: ComponentInfo,
    ) -> Result<()> {
        if self.staging.component(class, name).is_some() {
            return Err(apply_error!(
                DuplicateTarget,
                "component {}/{} already exists",
                class,
                name
            ));
        }

        tracing::trace!(class, name, hash = %info.content_hash(), "add component");
        self.staging
            .components
            .entry(class.to_string())
            .or_default()
            .insert(name.to_string(), info);
        Ok(())
    }

    /// Adds a new component, stored as `name#seq_no` while `name` is taken.
    ///
    /// # Returns
    ///
    /// The name the component was stored under.
    ///
    /// # Errors
    ///
    /// Duplicate-target if both `name` and `name#seq_no` exist in `class`.
    pub fn add_component_with_seq_no(
        &mut self,
        class: &str,
        name: &str,
        seq_no: usize,
        info: ComponentInfo,
    ) -> Result<String> {
        let stored = if self.staging.component(class, name).is_some() {
            format!("{name}#{seq_no}")
        } else {
            name.to_string()
        };
        self.add_component(class, &stored, info)?;
        Ok(stored)
    }

    /// Changes the status of an existing component, keeping values and information.
    ///
    /// # Errors
    ///
    /// Missing-referent if the component does not exist.
    pub fn set_component_status(
        &mut self,
        class: &str,
        name: &str,
        status: ComponentStatus,
    ) -> Result<()> {
        let Some(info) = self
            .staging
            .components
            .get_mut(class)
            .and_then(|items| items.get_mut(name))
        else {
            return Err(apply_error!(
                MissingReferent,
                "no matching component name {}/{}",
                class,
                name
            ));
        };

        tracing::trace!(class, name, %status, "set component status");
        *info = info.with_status(status);
        Ok(())
    }

    /// Replaces component `prev_name` by `info` stored under `name`.
    ///
    /// When the names differ the component is renamed and every encoded-field reference
    /// to `prev_name` in `class` is rewritten to `name`.
    ///
    /// # Errors
    ///
    /// Missing-referent if `prev_name` is absent, Duplicate-target if `name` differs from
    /// `prev_name` and is already taken.
    pub fn update_component(
        &mut self,
        class: &str,
        prev_name: &str,
        name: &str,
        info: ComponentInfo,
    ) -> Result<()> {
        if self.staging.component(class, prev_name).is_none() {
            return Err(apply_error!(
                MissingReferent,
                "no matching component name {}/{}",
                class,
                prev_name
            ));
        }
        if prev_name != name && self.staging.component(class, name).is_some() {
            return Err(apply_error!(
                DuplicateTarget,
                "cannot rename {}/{}: {} already exists",
                class,
                prev_name,
                name
            ));
        }

        tracing::trace!(class, prev_name, name, "update component");
        let items = self.staging.components.entry(class.to_string()).or_default();
        items.remove(prev_name);
        items.insert(name.to_string(), info);

        if prev_name != name {
            for field in self.staging.encoded_fields.values_mut() {
                field.rename(class, prev_name, name);
            }
        }
        Ok(())
    }

    /// Finds the current name of the component of `class` whose content hash is `hash`.
    ///
    /// If several components share the hash, the one named `preferred_name` wins.
    ///
    /// # Errors
    ///
    /// Missing-referent if no component matches, or several match and none of them is
    /// named `preferred_name`.
    pub fn resolve_component(
        &self,
        class: &str,
        hash: ContentHash,
        preferred_name: &str,
    ) -> Result<String> {
        let candidates = self.staging.components_with_hash(class, hash);
        if candidates.contains(&preferred_name) {
            return Ok(preferred_name.to_string());
        }

        match candidates.as_slice() {
            [only] => Ok((*only).to_string()),
            [] => Err(apply_error!(
                MissingReferent,
                "no component of {} with content {} ({})",
                class,
                hash,
                preferred_name
            )),
            _ => Err(apply_error!(
                MissingReferent,
                "component {}/{} is ambiguous between {}",
                class,
                preferred_name,
                candidates.join(", ")
            )),
        }
    }

    /// Creates encoded field `field` with `combination` at index 0.
    ///
    /// A single combination needs no bits, so no pattern is touched unless listed in
    /// `attach_to`: each of those gets an explicit zero-width `{field: 0}` entry.
    ///
    /// # Errors
    ///
    /// Duplicate-target if the field exists, Missing-referent if a pattern index or a
    /// selected component does not exist.
    pub fn add_encoded_field(
        &mut self,
        field: &str,
        combination: Combination,
        attach_to: &[usize],
    ) -> Result<()> {
        if self.staging.encoded_fields.contains_key(field) {
            return Err(apply_error!(
                DuplicateTarget,
                "encoded field {} already exists",
                field
            ));
        }
        self.check_combination(field, &combination)?;
        self.check_patterns(attach_to)?;

        tracing::trace!(field, attach_to = ?attach_to, "add encoded field");
        self.staging
            .encoded_fields
            .insert(field.to_string(), EncodedField::new(vec![combination]));
        for &index in attach_to {
            self.add_encoding_pattern_fields(index, &[PatternField::new(field, 0)])?;
        }
        Ok(())
    }

    /// Appends one combination to an existing field and grows the listed patterns.
    ///
    /// Each listed pattern whose capacity for `field` no longer covers every index gets a
    /// single new entry carrying exactly the missing bits. Patterns not listed are left
    /// untouched.
    ///
    /// # Returns
    ///
    /// The encoding index the combination was stored at.
    ///
    /// # Errors
    ///
    /// Missing-referent if the field, a pattern index or a selected component does not
    /// exist.
    pub fn append_encoded_field_index(
        &mut self,
        field: &str,
        combination: Combination,
        pattern_indices: &[usize],
    ) -> Result<usize> {
        if !self.staging.encoded_fields.contains_key(field) {
            return Err(apply_error!(
                MissingReferent,
                "no encoded field named {}",
                field
            ));
        }
        self.check_combination(field, &combination)?;
        self.check_patterns(pattern_indices)?;

        let index = {
            let encoded = self
                .staging
                .encoded_fields
                .entry(field.to_string())
                .or_default();
            encoded.combinations.push(combination);
            encoded.len() - 1
        };

        let required = bits_required(index + 1);
        for &pattern_index in pattern_indices {
            let pattern = &mut self.staging.patterns[pattern_index];
            let missing = required.saturating_sub(pattern.bit_length(field));
            if missing > 0 {
                tracing::trace!(field, pattern_index, missing, "grow pattern");
                pattern.fields.push(PatternField::new(field, missing));
            }
        }

        tracing::trace!(field, index, "append encoded field index");
        Ok(index)
    }

    /// Appends entries to the field list of an existing pattern.
    ///
    /// # Errors
    ///
    /// Missing-referent if the pattern or one of the fields does not exist.
    pub fn add_encoding_pattern_fields(
        &mut self,
        pattern_index: usize,
        fields: &[PatternField],
    ) -> Result<()> {
        self.check_patterns(&[pattern_index])?;
        self.check_fields(fields)?;

        self.staging.patterns[pattern_index]
            .fields
            .extend(fields.iter().cloned());
        Ok(())
    }

    /// Adds a new image id to an existing pattern.
    ///
    /// # Arguments
    ///
    /// * `pattern_index` - Pattern receiving the image
    /// * `image_id` - New image id
    /// * `image_name` - Build-phase name
    /// * `is_latest` - Whether this claims the latest image id of the session
    ///
    /// # Errors
    ///
    /// Missing-referent if the pattern does not exist, Duplicate-target if the image id
    /// is taken, Structural-violation if the latest-image claim would be broken.
    pub fn append_image_id_to_pattern(
        &mut self,
        pattern_index: usize,
        image_id: u32,
        image_name: &str,
        is_latest: bool,
    ) -> Result<()> {
        self.check_patterns(&[pattern_index])?;
        self.check_new_image_ids(&[image_id])?;
        self.check_latest_claim(image_id, is_latest)?;

        tracing::trace!(pattern_index, image_id, image_name, is_latest, "append image id");
        self.staging
            .image_ids
            .insert(image_id, image_name.to_string());
        self.staging.patterns[pattern_index]
            .image_ids
            .insert(image_id);
        if is_latest {
            self.latest_claim = Some(image_id);
        }
        Ok(())
    }

    /// Appends a brand-new pattern holding the given image ids.
    ///
    /// # Arguments
    ///
    /// * `image_descs` - `(image_id, image_name)` pairs for the new pattern, non-empty
    /// * `encoding_scheme` - Encoding scheme of the new pattern
    /// * `fields` - Field list of the new pattern; every field must exist
    /// * `is_latest` - Whether the greatest of these ids claims the latest image id
    ///
    /// # Returns
    ///
    /// The index of the new pattern.
    ///
    /// # Errors
    ///
    /// Duplicate-target if an image id is taken, Missing-referent if a field does not
    /// exist, Structural-violation for an empty image list or a broken latest claim.
    pub fn append_new_pattern(
        &mut self,
        image_descs: &[(u32, String)],
        encoding_scheme: EncodingScheme,
        fields: Vec<PatternField>,
        is_latest: bool,
    ) -> Result<usize> {
        let ids: Vec<u32> = image_descs.iter().map(|(image_id, _)| *image_id).collect();
        let Some(&greatest) = ids.iter().max() else {
            return Err(apply_error!(
                StructuralViolation,
                "a new pattern needs at least one image id"
            ));
        };
        self.check_new_image_ids(&ids)?;
        self.check_fields(&fields)?;
        self.check_latest_claim(greatest, is_latest)?;

        for (image_id, image_name) in image_descs {
            self.staging.image_ids.insert(*image_id, image_name.clone());
        }
        self.staging
            .patterns
            .push(EncodingPattern::new(ids, encoding_scheme, fields));
        if is_latest {
            self.latest_claim = Some(greatest);
        }

        let index = self.staging.patterns.len() - 1;
        tracing::trace!(index, greatest, is_latest, "append new pattern");
        Ok(index)
    }

    /// Replaces the whole rules section.
    pub fn replace_rules(&mut self, rules: Vec<Rule>) {
        tracing::trace!(count = rules.len(), "replace rules");
        self.staging.rules = rules;
    }

    /// Validates the staged state and returns it as an immutable database.
    ///
    /// May be called repeatedly; the builder stays usable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the staged state violates a database
    /// invariant.
    pub fn build(&self) -> Result<Database> {
        self.staging.validate()?;
        Ok(self.staging.clone())
    }

    /// Canonical dump of the staged state, including the checksum.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Yaml`] if serialization fails.
    pub fn dump_canonical(&self) -> Result<String> {
        self.staging.dump_canonical()
    }

    /// Canonical dump of the staged state without the checksum.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Yaml`] if serialization fails.
    pub fn dump_canonical_without_checksum(&self) -> Result<String> {
        self.staging.dump_canonical_without_checksum()
    }

    fn check_combination(&self, field: &str, combination: &Combination) -> Result<()> {
        for (class, names) in combination.iter() {
            if let Some(name) = names
                .iter()
                .find(|name| self.staging.component(class, name).is_none())
            {
                return Err(apply_error!(
                    MissingReferent,
                    "field {} selects unknown component {}/{}",
                    field,
                    class,
                    name
                ));
            }
        }
        Ok(())
    }

    fn check_patterns(&self, pattern_indices: &[usize]) -> Result<()> {
        match pattern_indices
            .iter()
            .find(|&&index| index >= self.staging.patterns.len())
        {
            Some(index) => Err(apply_error!(
                MissingReferent,
                "no pattern with index {} ({} patterns)",
                index,
                self.staging.patterns.len()
            )),
            None => Ok(()),
        }
    }

    fn check_fields(&self, fields: &[PatternField]) -> Result<()> {
        match fields
            .iter()
            .find(|entry| !self.staging.encoded_fields.contains_key(&entry.name))
        {
            Some(entry) => Err(apply_error!(
                MissingReferent,
                "no encoded field named {}",
                entry.name
            )),
            None => Ok(()),
        }
    }

    fn check_new_image_ids(&self, image_ids: &[u32]) -> Result<()> {
        let mut seen = BTreeSet::new();
        for &image_id in image_ids {
            if self.staging.image_ids.contains_key(&image_id) || !seen.insert(image_id) {
                return Err(apply_error!(
                    DuplicateTarget,
                    "image id {} already exists",
                    image_id
                ));
            }
        }
        Ok(())
    }

    fn check_latest_claim(&self, image_id: u32, is_latest: bool) -> Result<()> {
        if is_latest {
            if let Some(claimed) = self.latest_claim {
                return Err(apply_error!(
                    StructuralViolation,
                    "latest image id already claimed by {}",
                    claimed
                ));
            }
            if let Some(current) = self.staging.latest_image_id() {
                if image_id <= current {
                    return Err(apply_error!(
                        StructuralViolation,
                        "image id {} cannot be the latest, {} exists",
                        image_id,
                        current
                    ));
                }
            }
        } else if let Some(claimed) = self.latest_claim {
            if image_id > claimed {
                return Err(apply_error!(
                    StructuralViolation,
                    "image id {} would exceed the latest image id {}",
                    image_id,
                    claimed
                ));
            }
        }
        Ok(())
    }
}
