//! Stable identities of change units.

use std::fmt;

/// Structural identity of a change unit.
///
/// Derived from the variant and its distinguishing fields when the unit is constructed.
/// Identities are stable across repeated extraction of the same pair of databases and
/// are what dependency edges and approval statuses are keyed by. The `Ord` impl gives
/// every collection of units a deterministic iteration order.
///
/// `Display` leaves out the index of a follower combination, so two followers selecting
/// the same components print alike while still comparing unequal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identity {
    /// A new or updated component
    CompChange {
        /// Component class
        class: String,
        /// Name in the target database
        name: String,
        /// `true` for an addition, `false` for an update
        is_new: bool,
    },
    /// One new encoding index of a field
    AddEncodingCombination {
        /// Encoded field name
        field_name: String,
        /// Index the combination lands on; 0 creates the field
        encoding_index: usize,
        /// `(class, component names)` pairs, ascending by class
        selections: Vec<(String, Vec<String>)>,
    },
    /// A new image id in a pattern that already exists
    NewImageIdToExistingPattern {
        /// Image id
        image_id: u32,
        /// Build-phase name
        image_name: String,
        /// Whether it claims the latest image id
        is_last: bool,
    },
    /// A new pattern, identified by its first image
    NewImageIdToNewPattern {
        /// First image id of the pattern
        image_id: u32,
        /// Build-phase name of that image
        image_name: String,
        /// Whether the pattern holds the latest image id
        is_last: bool,
    },
    /// Replacement of the rules section
    ReplaceRules,
}

fn last_suffix(is_last: bool) -> &'static str {
    if is_last {
        "(last)"
    } else {
        ""
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::CompChange {
                class,
                name,
                is_new,
            } => {
                write!(f, "CompChange:{class}:{name}")?;
                if *is_new {
                    write!(f, "(new)")?;
                }
                Ok(())
            }
            Identity::AddEncodingCombination {
                field_name,
                encoding_index,
                selections,
            } => {
                write!(f, "AddEncodingCombination:{field_name}")?;
                if *encoding_index == 0 {
                    write!(f, "(first)")?;
                }
                write!(f, "-")?;
                for (position, (class, names)) in selections.iter().enumerate() {
                    if position > 0 {
                        write!(f, ";")?;
                    }
                    write!(f, "{class}:{}", names.join(","))?;
                }
                Ok(())
            }
            Identity::NewImageIdToExistingPattern {
                image_id,
                image_name,
                is_last,
            } => write!(
                f,
                "NewImageIdToExistingPattern:{image_name}({image_id}){}",
                last_suffix(*is_last)
            ),
            Identity::NewImageIdToNewPattern {
                image_id,
                image_name,
                is_last,
            } => write!(
                f,
                "NewImageIdToNewPattern:{image_name}({image_id}){}",
                last_suffix(*is_last)
            ),
            Identity::ReplaceRules => write!(f, "ReplaceRules"),
        }
    }
}
