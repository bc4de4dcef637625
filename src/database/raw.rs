//! Serde shapes of the on-disk document.
//!
//! The public model in [`super`] is kept free of serde attributes; these private
//! structs pin the canonical layout (key order, omitted defaults, scalar-vs-list
//! selections) and the conversion back and forth checks what the YAML grammar alone
//! cannot express.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    database::{
        ComponentInfo, ComponentStatus, Combination, Database, EncodedField, EncodingPattern,
        EncodingScheme, PatternField, Rule,
    },
    Result,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawDatabase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub project: String,
    #[serde(default)]
    pub image_id: BTreeMap<u32, String>,
    #[serde(default)]
    pub pattern: Vec<RawPattern>,
    #[serde(default)]
    pub encoded_fields: BTreeMap<String, BTreeMap<u32, BTreeMap<String, RawSelection>>>,
    #[serde(default)]
    pub components: BTreeMap<String, RawComponentClass>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawPattern {
    pub image_ids: Vec<u32>,
    #[serde(default)]
    pub encoding_scheme: EncodingScheme,
    #[serde(default)]
    pub fields: Vec<BTreeMap<String, u32>>,
}

/// `{class: name}` for exactly one name, `{class: [names]}` otherwise.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawSelection {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawComponentClass {
    #[serde(default)]
    pub items: BTreeMap<String, RawComponent>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawComponent {
    #[serde(default, skip_serializing_if = "ComponentStatus::is_supported")]
    pub status: ComponentStatus,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub information: BTreeMap<String, String>,
}

impl RawSelection {
    fn from_names(names: &[String]) -> Self {
        match names {
            [name] => RawSelection::One(name.clone()),
            _ => RawSelection::Many(names.to_vec()),
        }
    }

    fn into_names(self) -> Vec<String> {
        match self {
            RawSelection::One(name) => vec![name],
            RawSelection::Many(names) => names,
        }
    }
}

impl RawDatabase {
    /// Snapshot of `db` in document form.
    pub fn from_database(db: &Database, checksum: Option<String>) -> Self {
        let pattern = db
            .patterns
            .iter()
            .map(|pattern| RawPattern {
                image_ids: pattern.image_ids.iter().copied().collect(),
                encoding_scheme: pattern.encoding_scheme,
                fields: pattern
                    .fields
                    .iter()
                    .map(|entry| BTreeMap::from([(entry.name.clone(), entry.bits)]))
                    .collect(),
            })
            .collect();

        let encoded_fields = db
            .encoded_fields
            .iter()
            .map(|(name, field)| {
                let indices = field
                    .combinations
                    .iter()
                    .enumerate()
                    .map(|(index, combination)| {
                        let selections = combination
                            .iter()
                            .map(|(class, names)| {
                                (class.to_string(), RawSelection::from_names(names))
                            })
                            .collect();
                        (index as u32, selections)
                    })
                    .collect();
                (name.clone(), indices)
            })
            .collect();

        let components = db
            .components
            .iter()
            .map(|(class, items)| {
                let items = items
                    .iter()
                    .map(|(name, info)| {
                        (
                            name.clone(),
                            RawComponent {
                                status: info.status(),
                                values: info.values().clone(),
                                information: info.information().clone(),
                            },
                        )
                    })
                    .collect();
                (class.clone(), RawComponentClass { items })
            })
            .collect();

        RawDatabase {
            checksum,
            project: db.project.clone(),
            image_id: db.image_ids.clone(),
            pattern,
            encoded_fields,
            components,
            rules: db.rules.clone(),
        }
    }

    /// Converts the document into the model, returning the embedded checksum alongside.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if encoding indices are not contiguous from 0,
    /// a pattern field entry does not name exactly one field, or a pattern lists the same
    /// image id twice.
    pub fn into_database(self) -> Result<(Database, Option<String>)> {
        let mut patterns = Vec::with_capacity(self.pattern.len());
        for (index, raw) in self.pattern.into_iter().enumerate() {
            let image_ids: BTreeSet<u32> = raw.image_ids.iter().copied().collect();
            if image_ids.len() != raw.image_ids.len() {
                return Err(malformed_error!(
                    "Pattern {} lists an image id more than once",
                    index
                ));
            }

            let mut fields = Vec::with_capacity(raw.fields.len());
            for entry in raw.fields {
                if entry.len() != 1 {
                    return Err(malformed_error!(
                        "Pattern {} has a field entry with {} keys, expected 1",
                        index,
                        entry.len()
                    ));
                }
                fields.extend(
                    entry
                        .into_iter()
                        .map(|(name, bits)| PatternField::new(name, bits)),
                );
            }

            patterns.push(EncodingPattern {
                image_ids,
                encoding_scheme: raw.encoding_scheme,
                fields,
            });
        }

        let mut encoded_fields = BTreeMap::new();
        for (name, indices) in self.encoded_fields {
            let mut combinations = Vec::with_capacity(indices.len());
            for (expected, (index, selections)) in indices.into_iter().enumerate() {
                if index as usize != expected {
                    return Err(malformed_error!(
                        "Encoded field {} is missing index {} (next index is {})",
                        name,
                        expected,
                        index
                    ));
                }
                combinations.push(
                    selections
                        .into_iter()
                        .map(|(class, selection)| (class, selection.into_names()))
                        .collect::<Combination>(),
                );
            }
            encoded_fields.insert(name, EncodedField::new(combinations));
        }

        let components = self
            .components
            .into_iter()
            .map(|(class, raw_class)| {
                let items = raw_class
                    .items
                    .into_iter()
                    .map(|(name, raw)| {
                        (
                            name,
                            ComponentInfo::new(raw.values, raw.status, raw.information),
                        )
                    })
                    .collect();
                (class, items)
            })
            .collect();

        let db = Database {
            project: self.project,
            image_ids: self.image_id,
            patterns,
            encoded_fields,
            components,
            rules: self.rules,
        };
        Ok((db, self.checksum))
    }
}
