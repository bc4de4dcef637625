//! Component records of a HWID database.
//!
//! Each component class (`cpu`, `storage`, `mainboard`, ...) maps component names to a
//! [`ComponentInfo`]. The info carries the probed values, a support status and free-form
//! information, plus a [`ContentHash`] that identifies the component by content rather
//! than by name. Change units reference components through that hash so that a
//! renamed component is still found after the rename has been applied.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Support status of a component.
///
/// Serialized in lowercase (`supported`, `deprecated`, ...). `Supported` is the
/// default and is omitted from the canonical document.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Qualified for production
    #[default]
    Supported,
    /// Still valid but no longer used for new builds
    Deprecated,
    /// Not qualified yet
    Unqualified,
    /// Must not be used
    Unsupported,
    /// Duplicate of another component with the same probed values
    Duplicate,
}

impl ComponentStatus {
    /// Returns `true` for [`ComponentStatus::Supported`].
    #[must_use]
    pub fn is_supported(&self) -> bool {
        *self == ComponentStatus::Supported
    }
}

/// SHA-1 digest identifying a component by its content.
///
/// Two components in the same class with equal values and status share the same hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 20]);

impl ContentHash {
    /// Computes the content hash of a component from its status and values.
    ///
    /// Information is metadata and does not participate in the hash.
    #[must_use]
    pub fn compute(status: ComponentStatus, values: &BTreeMap<String, String>) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(status.as_ref().as_bytes());
        hasher.update([0u8]);
        for (key, value) in values {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }

        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        ContentHash(bytes)
    }

    /// Raw digest bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

/// A single component entry.
///
/// Immutable once constructed; the content hash is computed at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    values: BTreeMap<String, String>,
    status: ComponentStatus,
    information: BTreeMap<String, String>,
    content_hash: ContentHash,
}

impl ComponentInfo {
    /// Creates a new component record.
    ///
    /// # Arguments
    ///
    /// * `values` - Probed property values
    /// * `status` - Support status
    /// * `information` - Free-form metadata (not part of the content hash)
    #[must_use]
    pub fn new(
        values: BTreeMap<String, String>,
        status: ComponentStatus,
        information: BTreeMap<String, String>,
    ) -> Self {
        let content_hash = ContentHash::compute(status, &values);
        Self {
            values,
            status,
            information,
            content_hash,
        }
    }

    /// Convenience constructor from string pairs, without information.
    pub fn from_values<K, V>(
        values: impl IntoIterator<Item = (K, V)>,
        status: ComponentStatus,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(values, status, BTreeMap::new())
    }

    /// Returns a copy of this record with a different status.
    #[must_use]
    pub fn with_status(&self, status: ComponentStatus) -> Self {
        Self::new(self.values.clone(), status, self.information.clone())
    }

    /// Returns a copy of this record with the given information attached.
    #[must_use]
    pub fn with_information(&self, information: BTreeMap<String, String>) -> Self {
        Self::new(self.values.clone(), self.status, information)
    }

    /// Probed property values
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Support status
    #[must_use]
    pub fn status(&self) -> ComponentStatus {
        self.status
    }

    /// Free-form metadata
    #[must_use]
    pub fn information(&self) -> &BTreeMap<String, String> {
        &self.information
    }

    /// Content hash over status and values
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        self.content_hash
    }

    /// Returns `true` if `other` differs from this record in status only.
    #[must_use]
    pub fn differs_only_in_status(&self, other: &ComponentInfo) -> bool {
        self.values == other.values
            && self.information == other.information
            && self.status != other.status
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in ComponentStatus::iter() {
            let text = status.to_string();
            assert_eq!(ComponentStatus::from_str(&text).unwrap(), status);
        }
        assert_eq!(ComponentStatus::default(), ComponentStatus::Supported);
        assert_eq!(ComponentStatus::Deprecated.to_string(), "deprecated");
    }

    #[test]
    fn test_hash_depends_on_values_and_status() {
        let a = ComponentInfo::from_values([("value", "2")], ComponentStatus::Supported);
        let b = ComponentInfo::from_values([("value", "2")], ComponentStatus::Deprecated);
        let c = ComponentInfo::from_values([("value", "3")], ComponentStatus::Supported);

        assert_ne!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
        assert_eq!(b.with_status(ComponentStatus::Supported), a);
    }

    #[test]
    fn test_hash_ignores_information() {
        let plain = ComponentInfo::from_values([("value", "1")], ComponentStatus::Supported);
        let informed = plain.with_information(
            [("comment".to_string(), "from vendor".to_string())]
                .into_iter()
                .collect(),
        );

        assert_eq!(plain.content_hash(), informed.content_hash());
        assert_ne!(plain, informed);
    }

    #[test]
    fn test_hash_separates_keys_and_values() {
        // "ab"/"c" and "a"/"bc" must not collide
        let left = ComponentInfo::from_values([("ab", "c")], ComponentStatus::Supported);
        let right = ComponentInfo::from_values([("a", "bc")], ComponentStatus::Supported);
        assert_ne!(left.content_hash(), right.content_hash());
    }

    #[test]
    fn test_hash_display() {
        let info = ComponentInfo::from_values([("value", "1")], ComponentStatus::Supported);
        let text = info.content_hash().to_string();
        assert_eq!(text.len(), 40);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_differs_only_in_status() {
        let a = ComponentInfo::from_values([("value", "2")], ComponentStatus::Supported);
        assert!(a.differs_only_in_status(&a.with_status(ComponentStatus::Deprecated)));
        assert!(!a.differs_only_in_status(&a));
        let c = ComponentInfo::from_values([("value", "3")], ComponentStatus::Deprecated);
        assert!(!a.differs_only_in_status(&c));
    }
}
