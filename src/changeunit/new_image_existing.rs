use crate::{builder::DatabaseBuilder, changeunit::Identity, Result};

/// A new image id joining a pattern that already exists in the base database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImageIdToExistingPattern {
    image_id: u32,
    image_name: String,
    pattern_index: usize,
    is_last: bool,
    identity: Identity,
}

impl NewImageIdToExistingPattern {
    /// Creates the unit; `is_last` marks the image as the latest of the change set.
    pub fn new(
        image_id: u32,
        image_name: impl Into<String>,
        pattern_index: usize,
        is_last: bool,
    ) -> Self {
        let image_name = image_name.into();
        let identity = Identity::NewImageIdToExistingPattern {
            image_id,
            image_name: image_name.clone(),
            is_last,
        };
        Self {
            image_id,
            image_name,
            pattern_index,
            is_last,
            identity,
        }
    }

    /// Image id
    #[must_use]
    pub fn image_id(&self) -> u32 {
        self.image_id
    }

    /// Build-phase name
    #[must_use]
    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    /// Pattern receiving the image
    #[must_use]
    pub fn pattern_index(&self) -> usize {
        self.pattern_index
    }

    /// Whether the image is the latest one
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.is_last
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
    /// Missing-referent if the pattern does not exist, Duplicate-target if the image id
    /// is taken, Structural-violation if the latest-image claim would be broken.
    pub fn patch(&self, builder: &mut DatabaseBuilder) -> Result<()> {
        builder.append_image_id_to_pattern(
            self.pattern_index,
            self.image_id,
            &self.image_name,
            self.is_last,
        )
    }
}
