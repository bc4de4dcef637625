//! Encoding patterns: the bit layout assigned to a set of image ids.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Scheme used to render the encoded bit string as text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EncodingScheme {
    /// 5 bits per character
    Base32,
    /// 13 bits per word pair
    #[default]
    Base8192,
}

/// One entry of a pattern's field list: `bits` more bits for `name`.
///
/// A field may appear several times in the same pattern; its capacity in that
/// pattern is the sum of all its entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternField {
    /// Encoded field name
    pub name: String,
    /// Number of bits this entry contributes
    pub bits: u32,
}

impl PatternField {
    /// Creates a new field entry.
    pub fn new(name: impl Into<String>, bits: u32) -> Self {
        Self {
            name: name.into(),
            bits,
        }
    }
}

/// Number of bits needed to address `count` encoding indices.
///
/// A field with zero or one combination needs no bits at all.
#[must_use]
pub fn bits_required(count: usize) -> u32 {
    if count <= 1 {
        0
    } else {
        usize::BITS - (count - 1).leading_zeros()
    }
}

/// Bit layout shared by a set of image ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingPattern {
    pub(crate) image_ids: BTreeSet<u32>,
    pub(crate) encoding_scheme: EncodingScheme,
    pub(crate) fields: Vec<PatternField>,
}

impl EncodingPattern {
    /// Creates a new pattern.
    pub fn new(
        image_ids: impl IntoIterator<Item = u32>,
        encoding_scheme: EncodingScheme,
        fields: Vec<PatternField>,
    ) -> Self {
        Self {
            image_ids: image_ids.into_iter().collect(),
            encoding_scheme,
            fields,
        }
    }

    /// Image ids using this pattern, ascending
    #[must_use]
    pub fn image_ids(&self) -> &BTreeSet<u32> {
        &self.image_ids
    }

    /// Encoding scheme
    #[must_use]
    pub fn encoding_scheme(&self) -> EncodingScheme {
        self.encoding_scheme
    }

    /// Ordered field list
    #[must_use]
    pub fn fields(&self) -> &[PatternField] {
        &self.fields
    }

    /// Capacity of `field` in this pattern, in bits.
    #[must_use]
    pub fn bit_length(&self, field: &str) -> u32 {
        self.fields
            .iter()
            .filter(|entry| entry.name == field)
            .map(|entry| entry.bits)
            .sum()
    }

    /// Total number of bits of the pattern.
    #[must_use]
    pub fn total_bits(&self) -> u32 {
        self.fields.iter().map(|entry| entry.bits).sum()
    }

    /// Returns `true` if any entry of the field list names `field`.
    #[must_use]
    pub fn references(&self, field: &str) -> bool {
        self.fields.iter().any(|entry| entry.name == field)
    }

    /// Returns `true` if `field` has enough bits to address `count` indices.
    #[must_use]
    pub fn can_encode(&self, field: &str, count: usize) -> bool {
        self.bit_length(field) >= bits_required(count)
    }
}
