use crate::{
    builder::DatabaseBuilder,
    changeunit::Identity,
    database::{Combination, ContentHash, EncodedField},
    Result,
};

/// The components one class contributes to a combination.
///
/// Components are referenced by content hash; the names are what the target database
/// calls them and are used to pick between components sharing a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSelection {
    /// Component class
    pub class: String,
    /// Content hashes of the selected components, in order
    pub component_hashes: Vec<ContentHash>,
    /// Names of the selected components in the target database
    pub component_names: Vec<String>,
}

/// One new encoding index of an encoded field.
///
/// The unit with `encoding_index == 0` creates the field ("first"); every later index is
/// a separate unit appended to the existing field.
///
/// A first combination needs no bits. It only writes a zero-width `{field: 0}` entry into
/// the patterns its `pattern_slots` name; otherwise the field enters existing patterns
/// through the growth entries of later indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddEncodingCombination {
    field_name: String,
    encoding_index: usize,
    selections: Vec<ComponentSelection>,
    pattern_indices: Vec<usize>,
    /// `(pattern index, field-list position)` of entries this unit appends
    pattern_slots: Vec<(usize, usize)>,
    identity: Identity,
}

impl AddEncodingCombination {
    /// Creates the unit.
    ///
    /// # Arguments
    ///
    /// * `field_name` - Encoded field
    /// * `encoding_index` - Index the combination must land on
    /// * `selections` - Selected components per class, ascending by class
    /// * `pattern_indices` - Existing patterns encoding the field (first) or to grow
    ///   (later indices)
    /// * `pattern_slots` - Positions of the entries the unit appends in existing patterns;
    ///   for the first combination these are its zero-width attachments
    pub fn new(
        field_name: impl Into<String>,
        encoding_index: usize,
        selections: Vec<ComponentSelection>,
        pattern_indices: Vec<usize>,
        pattern_slots: Vec<(usize, usize)>,
    ) -> Self {
        let field_name = field_name.into();
        let identity = Identity::AddEncodingCombination {
            field_name: field_name.clone(),
            encoding_index,
            selections: selections
                .iter()
                .map(|selection| (selection.class.clone(), selection.component_names.clone()))
                .collect(),
        };
        Self {
            field_name,
            encoding_index,
            selections,
            pattern_indices,
            pattern_slots,
            identity,
        }
    }

    /// Encoded field name
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// `true` if this unit creates the field
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.encoding_index == 0
    }

    /// Index the combination lands on
    #[must_use]
    pub fn encoding_index(&self) -> usize {
        self.encoding_index
    }

    /// Selected components per class
    #[must_use]
    pub fn selections(&self) -> &[ComponentSelection] {
        &self.selections
    }

    /// Existing patterns encoding the field, or grown by this unit
    #[must_use]
    pub fn pattern_indices(&self) -> &[usize] {
        &self.pattern_indices
    }

    /// Field-list slots this unit fills in existing patterns
    #[must_use]
    pub fn pattern_slots(&self) -> &[(usize, usize)] {
        &self.pattern_slots
    }

    /// Returns `true` if the combination selects `hash` from `class`.
    #[must_use]
    pub fn selects(&self, class: &str, hash: ContentHash) -> bool {
        self.selections
            .iter()
            .any(|selection| selection.class == class && selection.component_hashes.contains(&hash))
    }

    /// Identity of this unit
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Applies the change to `builder`.
    ///
    /// # Errors
    ///
    /// Missing-referent if earlier indices (or the field itself) are absent or a selected
    /// component cannot be resolved, Duplicate-target if the index is already taken.
    pub fn patch(&self, builder: &mut DatabaseBuilder) -> Result<()> {
        let current = builder
            .database()
            .encoded_field(&self.field_name)
            .map_or(0, EncodedField::len);

        if self.encoding_index > current {
            return Err(if current == 0 {
                apply_error!(
                    MissingReferent,
                    "no encoded field named {}",
                    self.field_name
                )
            } else {
                apply_error!(
                    MissingReferent,
                    "field {} has {} indices, index {} cannot be appended yet",
                    self.field_name,
                    current,
                    self.encoding_index
                )
            });
        }
        if self.encoding_index < current {
            return Err(if self.is_first() {
                apply_error!(
                    DuplicateTarget,
                    "encoded field {} already exists",
                    self.field_name
                )
            } else {
                apply_error!(
                    DuplicateTarget,
                    "index {} of field {} already exists",
                    self.encoding_index,
                    self.field_name
                )
            });
        }

        let combination = self.resolve(builder)?;
        if self.is_first() {
            let attach_to: Vec<usize> = self
                .pattern_slots
                .iter()
                .map(|&(pattern_index, _)| pattern_index)
                .collect();
            builder.add_encoded_field(&self.field_name, combination, &attach_to)
        } else {
            builder
                .append_encoded_field_index(&self.field_name, combination, &self.pattern_indices)
                .map(|_| ())
        }
    }

    fn resolve(&self, builder: &DatabaseBuilder) -> Result<Combination> {
        let mut combination = Combination::new();
        for selection in &self.selections {
            let names = selection
                .component_hashes
                .iter()
                .zip(&selection.component_names)
                .map(|(hash, name)| builder.resolve_component(&selection.class, *hash, name))
                .collect::<Result<Vec<String>>>()?;
            combination = combination.with(selection.class.clone(), names);
        }
        Ok(combination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::{Database, PatternField},
        error::ApplyFailure,
        test::load_base,
    };

    fn selection(db: &Database, class: &str, names: &[&str]) -> ComponentSelection {
        ComponentSelection {
            class: class.to_string(),
            component_hashes: names
                .iter()
                .map(|name| db.component(class, name).unwrap().content_hash())
                .collect(),
            component_names: names.iter().map(|name| name.to_string()).collect(),
        }
    }

    #[test]
    fn test_follower_before_first_fails() {
        let base = load_base();
        let first = AddEncodingCombination::new(
            "new_field",
            0,
            vec![selection(&base, "comp_cls_1", &["comp_1_1"])],
            vec![0],
            vec![(0, 5)],
        );
        let follower = AddEncodingCombination::new(
            "new_field",
            1,
            vec![selection(&base, "comp_cls_1", &["comp_1_2"])],
            vec![0],
            vec![(0, 6)],
        );

        let mut builder = DatabaseBuilder::new(&base);
        let err = follower.patch(&mut builder).unwrap_err();
        assert_eq!(err.apply_failure(), Some(ApplyFailure::MissingReferent));

        first.patch(&mut builder).unwrap();
        follower.patch(&mut builder).unwrap();
        let err = follower.patch(&mut builder).unwrap_err();
        assert_eq!(err.apply_failure(), Some(ApplyFailure::DuplicateTarget));
        let err = first.patch(&mut builder).unwrap_err();
        assert_eq!(err.apply_failure(), Some(ApplyFailure::DuplicateTarget));

        let db = builder.build().unwrap();
        let field = db.encoded_field("new_field").unwrap();
        assert_eq!(field.len(), 2);
        assert_eq!(db.patterns()[0].bit_length("new_field"), 1);
        assert_eq!(
            &db.patterns()[0].fields()[5..],
            &[
                PatternField::new("new_field", 0),
                PatternField::new("new_field", 1)
            ]
        );
    }

    #[test]
    fn test_first_without_slots_writes_no_entry() {
        let base = load_base();
        let first = AddEncodingCombination::new(
            "new_field",
            0,
            vec![selection(&base, "comp_cls_1", &["comp_1_1"])],
            vec![0],
            Vec::new(),
        );
        let follower = AddEncodingCombination::new(
            "new_field",
            1,
            vec![selection(&base, "comp_cls_1", &["comp_1_2"])],
            vec![0],
            vec![(0, 5)],
        );

        let mut builder = DatabaseBuilder::new(&base);
        first.patch(&mut builder).unwrap();
        assert_eq!(builder.database().patterns(), base.patterns());

        follower.patch(&mut builder).unwrap();
        assert_eq!(
            &builder.database().patterns()[0].fields()[5..],
            &[PatternField::new("new_field", 1)]
        );
    }

    #[test]
    fn test_skipped_index_fails() {
        let base = load_base();
        let unit = AddEncodingCombination::new(
            "comp_cls_1_field",
            3,
            vec![selection(&base, "comp_cls_1", &["comp_1_1"])],
            Vec::new(),
            Vec::new(),
        );

        let mut builder = DatabaseBuilder::new(&base);
        let err = unit.patch(&mut builder).unwrap_err();
        assert_eq!(err.apply_failure(), Some(ApplyFailure::MissingReferent));
        assert!(err.to_string().contains("cannot be appended yet"));
    }

    #[test]
    fn test_multi_class_combination() {
        let base = load_base();
        let unit = AddEncodingCombination::new(
            "comp_cls_23_field",
            2,
            vec![
                selection(&base, "comp_cls_2", &["comp_2_1"]),
                selection(&base, "comp_cls_3", &["comp_3_2"]),
            ],
            Vec::new(),
            Vec::new(),
        );
        assert!(unit.selects(
            "comp_cls_3",
            base.component("comp_cls_3", "comp_3_2").unwrap().content_hash()
        ));

        let mut builder = DatabaseBuilder::new(&base);
        unit.patch(&mut builder).unwrap();
        let db = builder.build().unwrap();
        let combination = &db.encoded_field("comp_cls_23_field").unwrap().combinations()[2];
        assert_eq!(combination.names("comp_cls_2"), ["comp_2_1"]);
        assert_eq!(combination.names("comp_cls_3"), ["comp_3_2"]);
    }
}
