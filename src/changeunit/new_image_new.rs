use crate::{
    builder::DatabaseBuilder,
    changeunit::Identity,
    database::{EncodingScheme, PatternField},
    Result,
};

/// A pattern absent from the base database, together with all its image ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImageIdToNewPattern {
    image_descs: Vec<(u32, String)>,
    bit_mapping: Vec<PatternField>,
    encoding_scheme: EncodingScheme,
    pattern_index: usize,
    is_last: bool,
    identity: Identity,
}

impl NewImageIdToNewPattern {
    /// Creates the unit.
    ///
    /// # Arguments
    ///
    /// * `image_descs` - `(image_id, image_name)` pairs, ascending by id
    /// * `bit_mapping` - Complete field list of the pattern
    /// * `encoding_scheme` - Encoding scheme of the pattern
    /// * `pattern_index` - Position of the pattern in the target database
    /// * `is_last` - Whether the pattern holds the latest image id
    ///
    /// # Errors
    ///
    /// Structural-violation if `image_descs` is empty.
    pub fn new(
        image_descs: Vec<(u32, String)>,
        bit_mapping: Vec<PatternField>,
        encoding_scheme: EncodingScheme,
        pattern_index: usize,
        is_last: bool,
    ) -> Result<Self> {
        let Some((image_id, image_name)) = image_descs.first().cloned() else {
            return Err(apply_error!(
                StructuralViolation,
                "a new pattern needs at least one image id"
            ));
        };

        Ok(Self {
            image_descs,
            bit_mapping,
            encoding_scheme,
            pattern_index,
            is_last,
            identity: Identity::NewImageIdToNewPattern {
                image_id,
                image_name,
                is_last,
            },
        })
    }

    /// `(image_id, image_name)` pairs of the pattern
    #[must_use]
    pub fn image_descs(&self) -> &[(u32, String)] {
        &self.image_descs
    }

    /// Field list of the pattern
    #[must_use]
    pub fn bit_mapping(&self) -> &[PatternField] {
        &self.bit_mapping
    }

    /// Encoding scheme
    #[must_use]
    pub fn encoding_scheme(&self) -> EncodingScheme {
        self.encoding_scheme
    }

    /// Index of the pattern in the target database
    #[must_use]
    pub fn pattern_index(&self) -> usize {
        self.pattern_index
    }

    /// Whether the pattern holds the latest image id
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.is_last
    }

    /// Returns `true` if the field list names `field`.
    #[must_use]
    pub fn references(&self, field: &str) -> bool {
        self.bit_mapping.iter().any(|entry| entry.name == field)
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
    /// Missing-referent if an earlier new pattern or a field is missing, Duplicate-target
    /// if the pattern index or an image id is taken, Structural-violation if the
    /// latest-image claim would be broken.
    pub fn patch(&self, builder: &mut DatabaseBuilder) -> Result<()> {
        let count = builder.database().patterns().len();
        if self.pattern_index > count {
            return Err(apply_error!(
                MissingReferent,
                "pattern {} needs {} patterns before it, found {}",
                self.pattern_index,
                self.pattern_index,
                count
            ));
        }
        if self.pattern_index < count {
            return Err(apply_error!(
                DuplicateTarget,
                "pattern {} already exists",
                self.pattern_index
            ));
        }

        builder
            .append_new_pattern(
                &self.image_descs,
                self.encoding_scheme,
                self.bit_mapping.clone(),
                self.is_last,
            )
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ApplyFailure, test::load_base};

    fn pattern(index: usize, ids: &[(u32, &str)], is_last: bool) -> NewImageIdToNewPattern {
        NewImageIdToNewPattern::new(
            ids.iter().map(|(id, name)| (*id, name.to_string())).collect(),
            vec![
                PatternField::new("mainboard_field", 10),
                PatternField::new("cpu_field", 5),
                PatternField::new("comp_cls_1_field", 2),
            ],
            EncodingScheme::Base8192,
            index,
            is_last,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_images_rejected() {
        let err = NewImageIdToNewPattern::new(
            Vec::new(),
            Vec::new(),
            EncodingScheme::Base8192,
            1,
            false,
        )
        .unwrap_err();
        assert_eq!(err.apply_failure(), Some(ApplyFailure::StructuralViolation));
    }

    #[test]
    fn test_patterns_apply_in_order() {
        let base = load_base();
        let first = pattern(1, &[(3, "DVT")], false);
        let second = pattern(2, &[(4, "PVT"), (5, "MP")], true);
        assert_eq!(second.identity().to_string(), "NewImageIdToNewPattern:PVT(4)(last)");
        assert!(second.references("cpu_field"));

        let mut builder = DatabaseBuilder::new(&base);
        let err = second.patch(&mut builder).unwrap_err();
        assert_eq!(err.apply_failure(), Some(ApplyFailure::MissingReferent));

        first.patch(&mut builder).unwrap();
        second.patch(&mut builder).unwrap();
        let err = first.patch(&mut builder).unwrap_err();
        assert_eq!(err.apply_failure(), Some(ApplyFailure::DuplicateTarget));

        let db = builder.build().unwrap();
        assert_eq!(db.patterns().len(), 3);
        assert_eq!(db.open_pattern_index(), Some(2));
        assert_eq!(db.patterns()[2].bit_length("mainboard_field"), 10);
    }
}
