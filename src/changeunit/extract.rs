//! Change-unit extraction.
//!
//! [`extract`] compares a base and a target database section by section and returns the
//! minimal set of [`ChangeUnit`]s that turns one into the other. The target must be an
//! append-only extension of the base: nothing removed, existing encoding indices
//! untouched (modulo renames), existing patterns only grown the way
//! [`crate::builder::DatabaseBuilder`] grows them.
//!
//! Renames cannot be told apart from a removal plus an addition by looking at the two
//! databases alone, so the caller supplies them as a [`RenameLinkage`].

use std::collections::{BTreeMap, VecDeque};

use crate::{
    changeunit::{
        AddEncodingCombination, ChangeUnit, ChangeUnits, CompChange, ComponentSelection,
        NewImageIdToExistingPattern, NewImageIdToNewPattern, ReplaceRules,
    },
    database::{bits_required, Combination, ComponentInfo, Database, EncodedField},
    Error, Result,
};

/// A component renamed between base and target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenameLink {
    /// Component class
    pub class: String,
    /// Name in the base database
    pub prev_name: String,
    /// Name in the target database
    pub name: String,
}

/// Externally supplied association of renamed components with their predecessors.
///
/// # Examples
///
/// ```rust
/// use hwid_changeset::changeunit::RenameLinkage;
///
/// let linkage = RenameLinkage::new().with("comp_cls_1", "comp_1_2", "comp_1_3");
/// assert_eq!(linkage.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameLinkage {
    links: Vec<RenameLink>,
}

impl RenameLinkage {
    /// Creates an empty linkage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a link and returns the linkage.
    #[must_use]
    pub fn with(
        mut self,
        class: impl Into<String>,
        prev_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.add(class, prev_name, name);
        self
    }

    /// Adds a link: `prev_name` in the base is called `name` in the target.
    pub fn add(
        &mut self,
        class: impl Into<String>,
        prev_name: impl Into<String>,
        name: impl Into<String>,
    ) {
        self.links.push(RenameLink {
            class: class.into(),
            prev_name: prev_name.into(),
            name: name.into(),
        });
    }

    /// All links in insertion order
    #[must_use]
    pub fn links(&self) -> &[RenameLink] {
        &self.links
    }

    /// Number of links
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` if no component was renamed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Checks the links against both databases and indexes them.
    fn resolve(&self, base: &Database, target: &Database) -> Result<ResolvedLinkage> {
        let mut resolved = ResolvedLinkage::default();

        for link in &self.links {
            let RenameLink {
                class,
                prev_name,
                name,
            } = link;

            if base.component(class, prev_name).is_none() {
                return Err(Error::InvalidRenameLinkage(format!(
                    "predecessor {class}/{prev_name} does not exist in the base database"
                )));
            }
            if target.component(class, name).is_none() {
                return Err(Error::InvalidRenameLinkage(format!(
                    "successor {class}/{name} does not exist in the target database"
                )));
            }

            if let Some(other) = resolved
                .predecessor
                .insert((class.clone(), name.clone()), prev_name.clone())
            {
                if &other != prev_name {
                    return Err(Error::InvalidRenameLinkage(format!(
                        "component {class}/{name} is linked to both {other} and {prev_name}"
                    )));
                }
            }
            if let Some(other) = resolved
                .successor
                .insert((class.clone(), prev_name.clone()), name.clone())
            {
                if &other != name {
                    return Err(Error::InvalidRenameLinkage(format!(
                        "component {class}/{prev_name} is claimed by both {other} and {name}"
                    )));
                }
            }
        }
        Ok(resolved)
    }
}

impl FromIterator<RenameLink> for RenameLinkage {
    fn from_iter<T: IntoIterator<Item = RenameLink>>(iter: T) -> Self {
        Self {
            links: iter.into_iter().collect(),
        }
    }
}

/// Rename links indexed in both directions.
#[derive(Debug, Default)]
struct ResolvedLinkage {
    /// (class, target name) -> base name
    predecessor: BTreeMap<(String, String), String>,
    /// (class, base name) -> target name
    successor: BTreeMap<(String, String), String>,
}

impl ResolvedLinkage {
    fn predecessor_of(&self, class: &str, name: &str) -> Option<&str> {
        self.predecessor
            .get(&(class.to_string(), name.to_string()))
            .map(String::as_str)
    }

    fn successor_of(&self, class: &str, prev_name: &str) -> Option<&str> {
        self.successor
            .get(&(class.to_string(), prev_name.to_string()))
            .map(String::as_str)
    }

    /// Name the base component `name` carries in the target.
    fn current_name<'a>(&'a self, class: &str, name: &'a str) -> &'a str {
        self.successor_of(class, name).unwrap_or(name)
    }

    fn is_linked_away(&self, class: &str, name: &str) -> bool {
        self.successor_of(class, name)
            .is_some_and(|successor| successor != name)
    }

    fn renamed(&self, combination: &Combination) -> Combination {
        combination
            .iter()
            .map(|(class, names)| {
                let names: Vec<String> = names
                    .iter()
                    .map(|name| self.current_name(class, name).to_string())
                    .collect();
                (class.to_string(), names)
            })
            .collect()
    }
}

/// A new encoding index before its pattern slots are known.
struct Draft<'a> {
    field: &'a str,
    index: usize,
    combination: &'a Combination,
    pattern_indices: Vec<usize>,
}

fn incompatible(message: String) -> Error {
    Error::IncompatibleDatabases(message)
}

fn insert(units: &mut ChangeUnits, unit: impl Into<ChangeUnit>) -> Result<()> {
    let unit = unit.into();
    let identity = unit.identity().clone();
    if units.contains_key(&identity) {
        return Err(incompatible(format!(
            "two change units share the identity {identity}"
        )));
    }
    units.insert(identity, unit);
    Ok(())
}

/// Computes the change units that turn `base` into `target`.
///
/// Neither database is modified. Applying every returned unit to `base` in any order
/// consistent with [`crate::changeunit::export_dependency_graph`] yields a database whose
/// canonical dump equals `target`'s.
///
/// # Arguments
///
/// * `base` - The database the units apply to
/// * `target` - The database the units must produce
/// * `linkage` - Components renamed between the two
///
/// # Errors
///
/// Returns [`Error::InvalidRenameLinkage`] if `linkage` contradicts itself or either
/// database, and [`Error::IncompatibleDatabases`] if `target` is not an append-only
/// extension of `base`.
pub fn extract(base: &Database, target: &Database, linkage: &RenameLinkage) -> Result<ChangeUnits> {
    if base.project() != target.project() {
        return Err(incompatible(format!(
            "project {} cannot become {}",
            base.project(),
            target.project()
        )));
    }

    let links = linkage.resolve(base, target)?;
    let mut units = ChangeUnits::new();

    extract_components(base, target, &links, &mut units)?;
    extract_images(base, target, &mut units)?;
    extract_encoded_fields(base, target, &links, &mut units)?;
    if base.rules() != target.rules() {
        insert(&mut units, ReplaceRules::new(target.rules().to_vec()))?;
    }

    tracing::debug!(
        project = base.project(),
        units = units.len(),
        renames = linkage.len(),
        "extracted change units"
    );
    Ok(units)
}

fn extract_components(
    base: &Database,
    target: &Database,
    links: &ResolvedLinkage,
    units: &mut ChangeUnits,
) -> Result<()> {
    for (class, items) in target.components() {
        for (name, info) in items {
            let prev_name = match links.predecessor_of(class, name) {
                Some(prev_name) => Some(prev_name),
                None if !links.is_linked_away(class, name)
                    && base.component(class, name).is_some() =>
                {
                    Some(name.as_str())
                }
                None => None,
            };

            let Some(prev_name) = prev_name else {
                let unit = match split_seq_no(name) {
                    Some((requested, seq_no)) if base.component(class, requested).is_some() => {
                        CompChange::new_component_with_seq_no(
                            class,
                            requested,
                            seq_no,
                            info.clone(),
                        )
                    }
                    _ => CompChange::new_component(class, name, info.clone()),
                };
                insert(units, unit)?;
                continue;
            };

            let previous = base.component(class, prev_name).ok_or_else(|| {
                incompatible(format!("component {class}/{prev_name} is not in the base"))
            })?;
            if prev_name == name && previous == info {
                continue;
            }
            insert(units, CompChange::update(class, prev_name, name, info.clone()))?;
        }
    }

    for (class, items) in base.components() {
        for name in items.keys() {
            if links.successor_of(class, name).is_none() && target.component(class, name).is_none()
            {
                return Err(incompatible(format!(
                    "component {class}/{name} was removed"
                )));
            }
        }
    }
    Ok(())
}

/// Splits `comp_1_2#3` into `("comp_1_2", 3)`.
fn split_seq_no(name: &str) -> Option<(&str, usize)> {
    let (requested, suffix) = name.rsplit_once('#')?;
    let seq_no: usize = suffix.parse().ok()?;
    (!requested.is_empty() && seq_no.to_string() == suffix).then_some((requested, seq_no))
}

fn extract_images(base: &Database, target: &Database, units: &mut ChangeUnits) -> Result<()> {
    for (image_id, image_name) in base.image_ids() {
        if target.image_ids().get(image_id) != Some(image_name) {
            return Err(incompatible(format!(
                "image id {image_id} ({image_name}) was removed or renamed"
            )));
        }
    }

    if target.patterns().len() < base.patterns().len() {
        return Err(incompatible(format!(
            "target has {} patterns, base has {}",
            target.patterns().len(),
            base.patterns().len()
        )));
    }

    for (index, (old, new)) in base.patterns().iter().zip(target.patterns()).enumerate() {
        if old.encoding_scheme() != new.encoding_scheme() {
            return Err(incompatible(format!(
                "pattern {index} changes its encoding scheme"
            )));
        }
        if !old.image_ids().is_subset(new.image_ids()) {
            return Err(incompatible(format!("pattern {index} loses image ids")));
        }
        if !new.fields().starts_with(old.fields()) {
            return Err(incompatible(format!(
                "pattern {index} rewrites its existing field list"
            )));
        }
    }

    let image_name = |image_id: u32| {
        target
            .image_ids()
            .get(&image_id)
            .cloned()
            .ok_or_else(|| incompatible(format!("image id {image_id} is not declared")))
    };
    let latest_new = target
        .latest_image_id()
        .filter(|image_id| !base.image_ids().contains_key(image_id));

    for (index, (old, new)) in base.patterns().iter().zip(target.patterns()).enumerate() {
        for &image_id in new.image_ids().difference(old.image_ids()) {
            insert(
                units,
                NewImageIdToExistingPattern::new(
                    image_id,
                    image_name(image_id)?,
                    index,
                    latest_new == Some(image_id),
                ),
            )?;
        }
    }

    let last_index = target.patterns().len().saturating_sub(1);
    for (index, pattern) in target
        .patterns()
        .iter()
        .enumerate()
        .skip(base.patterns().len())
    {
        if pattern.image_ids().is_empty() {
            return Err(incompatible(format!("pattern {index} has no image id")));
        }

        let mut image_descs = Vec::with_capacity(pattern.image_ids().len());
        for &image_id in pattern.image_ids() {
            if base.image_ids().contains_key(&image_id) {
                return Err(incompatible(format!(
                    "image id {image_id} moves to new pattern {index}"
                )));
            }
            image_descs.push((image_id, image_name(image_id)?));
        }

        let is_last = latest_new.is_some_and(|image_id| pattern.image_ids().contains(&image_id));
        if is_last && index != last_index {
            return Err(incompatible(format!(
                "latest image id is in pattern {index}, which is not the last pattern"
            )));
        }

        insert(
            units,
            NewImageIdToNewPattern::new(
                image_descs,
                pattern.fields().to_vec(),
                pattern.encoding_scheme(),
                index,
                is_last,
            )?,
        )?;
    }
    Ok(())
}

fn extract_encoded_fields(
    base: &Database,
    target: &Database,
    links: &ResolvedLinkage,
    units: &mut ChangeUnits,
) -> Result<()> {
    for (field_name, old) in base.encoded_fields() {
        let Some(new) = target.encoded_field(field_name) else {
            return Err(incompatible(format!(
                "encoded field {field_name} was removed"
            )));
        };
        if new.len() < old.len() {
            return Err(incompatible(format!(
                "encoded field {field_name} lost indices"
            )));
        }
        for (index, (before, after)) in old
            .combinations()
            .iter()
            .zip(new.combinations())
            .enumerate()
        {
            if links.renamed(before) != *after {
                return Err(incompatible(format!(
                    "index {index} of encoded field {field_name} was rewritten"
                )));
            }
        }
    }

    let base_patterns = base.patterns().len();
    let mut drafts = Vec::new();
    for (field_name, field) in target.encoded_fields() {
        let start = base.encoded_field(field_name).map_or(0, EncodedField::len);
        for (index, combination) in field.combinations().iter().enumerate().skip(start) {
            let pattern_indices = target.patterns()[..base_patterns]
                .iter()
                .enumerate()
                .filter(|(_, pattern)| {
                    if index == 0 {
                        pattern.references(field_name)
                    } else {
                        pattern.can_encode(field_name, index + 1)
                    }
                })
                .map(|(pattern_index, _)| pattern_index)
                .collect();

            drafts.push(Draft {
                field: field_name,
                index,
                combination,
                pattern_indices,
            });
        }
    }

    let slots = assign_pattern_slots(base, target, &drafts)?;
    for (draft, pattern_slots) in drafts.iter().zip(slots) {
        let selections = draft
            .combination
            .iter()
            .map(|(class, names)| -> Result<ComponentSelection> {
                let component_hashes = names
                    .iter()
                    .map(|name| {
                        target
                            .component(class, name)
                            .map(ComponentInfo::content_hash)
                            .ok_or_else(|| {
                                incompatible(format!(
                                    "encoded field {} selects unknown component {class}/{name}",
                                    draft.field
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ComponentSelection {
                    class: class.to_string(),
                    component_hashes,
                    component_names: names.to_vec(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        insert(
            units,
            AddEncodingCombination::new(
                draft.field,
                draft.index,
                selections,
                draft.pattern_indices.clone(),
                pattern_slots,
            ),
        )?;
    }
    Ok(())
}

/// An entry a base pattern is expected to gain.
struct Expected {
    draft: usize,
    bits: u32,
    /// Zero-width attachment of a first combination, which the target may leave out
    optional: bool,
}

/// Takes the expected entry matching `bits` off the front of `queue`, skipping an
/// attachment the target did not write.
fn take_expected(queue: &mut VecDeque<Expected>, bits: u32) -> Option<usize> {
    let front = queue.pop_front()?;
    if front.bits == bits {
        return Some(front.draft);
    }
    if !front.optional {
        return None;
    }
    queue
        .pop_front()
        .filter(|next| next.bits == bits)
        .map(|next| next.draft)
}

/// Matches the entries appended to every base pattern with the units producing them.
///
/// Replays the builder's growth rule: later combinations add exactly the missing bits,
/// in index order. A first combination needs no bits; a `{field: 0}` entry in front of
/// the field's growth entries is its explicit attachment, and it may be absent.
fn assign_pattern_slots(
    base: &Database,
    target: &Database,
    drafts: &[Draft<'_>],
) -> Result<Vec<Vec<(usize, usize)>>> {
    let mut slots = vec![Vec::new(); drafts.len()];
    let patterns = base.patterns().iter().zip(target.patterns()).enumerate();

    for (pattern_index, (old, new)) in patterns {
        let mut expected: BTreeMap<&str, VecDeque<Expected>> = BTreeMap::new();
        let mut capacity: BTreeMap<&str, u32> = BTreeMap::new();

        for (draft_index, draft) in drafts.iter().enumerate() {
            if !draft.pattern_indices.contains(&pattern_index) {
                continue;
            }
            let queue = expected.entry(draft.field).or_default();
            if draft.index == 0 {
                queue.push_back(Expected {
                    draft: draft_index,
                    bits: 0,
                    optional: true,
                });
                continue;
            }

            let current = capacity
                .entry(draft.field)
                .or_insert_with(|| old.bit_length(draft.field));
            let missing = bits_required(draft.index + 1).saturating_sub(*current);
            *current += missing;
            if missing > 0 {
                queue.push_back(Expected {
                    draft: draft_index,
                    bits: missing,
                    optional: false,
                });
            }
        }

        for (position, entry) in new.fields().iter().enumerate().skip(old.fields().len()) {
            let draft_index = expected
                .get_mut(entry.name.as_str())
                .and_then(|queue| take_expected(queue, entry.bits))
                .ok_or_else(|| {
                    incompatible(format!(
                        "pattern {pattern_index} appends {}: {} at position {position}, \
                         which no change unit reproduces",
                        entry.name, entry.bits
                    ))
                })?;
            slots[draft_index].push((pattern_index, position));
        }

        let unfinished = expected
            .iter()
            .find(|(_, queue)| queue.iter().any(|entry| !entry.optional));
        if let Some((field, _)) = unfinished {
            return Err(incompatible(format!(
                "pattern {pattern_index} does not grow encoded field {field} \
                 as its new indices require"
            )));
        }
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        changeunit::apply_change_units,
        test::{load_base, load_scenario_reuse_name, BASE_DB},
    };

    const NEW_FIELD: &str = "  new_field:
    0:
      comp_cls_1: comp_1_1
    1:
      comp_cls_1: comp_1_2
  storage_field:
";

    /// Base plus `new_field {0: comp_1_1, 1: comp_1_2}`, with `entries` appended to pattern 0.
    fn with_new_field(entries: &str) -> Database {
        let text = BASE_DB
            .replace(
                "  - comp_cls_23_field: 2\n",
                &format!("  - comp_cls_23_field: 2\n{entries}"),
            )
            .replace("  storage_field:\n", NEW_FIELD);
        Database::load(&text).unwrap()
    }

    fn new_field_unit(units: &ChangeUnits, index: usize) -> &AddEncodingCombination {
        units
            .values()
            .find_map(|unit| match unit {
                ChangeUnit::AddEncodingCombination(added) if added.encoding_index() == index => {
                    Some(added)
                }
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_identical_databases() {
        let base = load_base();
        let units = extract(&base, &base, &RenameLinkage::new()).unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn test_linkage_predecessor_missing() {
        let base = load_base();
        let target = load_scenario_reuse_name();
        let linkage = RenameLinkage::new().with("comp_cls_1", "comp_1_9", "comp_1_3");

        let err = extract(&base, &target, &linkage).unwrap_err();
        assert!(matches!(err, Error::InvalidRenameLinkage(_)), "{err}");
    }

    #[test]
    fn test_linkage_successor_missing() {
        let base = load_base();
        let target = load_scenario_reuse_name();
        let linkage = RenameLinkage::new().with("comp_cls_1", "comp_1_2", "comp_1_9");

        let err = extract(&base, &target, &linkage).unwrap_err();
        assert!(matches!(err, Error::InvalidRenameLinkage(_)), "{err}");
    }

    #[test]
    fn test_linkage_two_predecessors() {
        let base = load_base();
        let target = load_scenario_reuse_name();
        let linkage = RenameLinkage::new()
            .with("comp_cls_1", "comp_1_2", "comp_1_3")
            .with("comp_cls_1", "comp_1_1", "comp_1_3");

        let err = extract(&base, &target, &linkage).unwrap_err();
        assert!(err.to_string().contains("linked to both"), "{err}");
    }

    #[test]
    fn test_linkage_two_successors() {
        let base = load_base();
        let target = load_scenario_reuse_name();
        let linkage = RenameLinkage::new()
            .with("comp_cls_1", "comp_1_2", "comp_1_3")
            .with("comp_cls_1", "comp_1_2", "comp_1_1");

        let err = extract(&base, &target, &linkage).unwrap_err();
        assert!(err.to_string().contains("claimed by both"), "{err}");
    }

    #[test]
    fn test_removed_component_is_incompatible() {
        let base = load_base();
        let target = load_scenario_reuse_name();

        // comp_1_3 only exists in the renamed database
        let err = extract(&target, &base, &RenameLinkage::new()).unwrap_err();
        assert!(matches!(err, Error::IncompatibleDatabases(_)), "{err}");
        assert!(err.to_string().contains("comp_1_3 was removed"), "{err}");
    }

    #[test]
    fn test_missing_link_rewrites_existing_index() {
        let base = load_base();
        let target = load_scenario_reuse_name();

        let err = extract(&base, &target, &RenameLinkage::new()).unwrap_err();
        assert!(err.to_string().contains("was rewritten"), "{err}");
    }

    #[test]
    fn test_project_mismatch() {
        let base = load_base();
        let mut other = base.clone();
        other.project = "OTHER".to_string();

        let err = extract(&base, &other, &RenameLinkage::new()).unwrap_err();
        assert!(matches!(err, Error::IncompatibleDatabases(_)));
    }

    #[test]
    fn test_growth_entry_attaches_new_field() {
        let base = load_base();
        let target = with_new_field("  - new_field: 1\n");

        let units = extract(&base, &target, &RenameLinkage::new()).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(new_field_unit(&units, 0).pattern_indices(), &[0]);
        assert!(new_field_unit(&units, 0).pattern_slots().is_empty());
        assert_eq!(new_field_unit(&units, 1).pattern_slots(), &[(0, 5)]);

        let rebuilt = apply_change_units(&base, units.values()).unwrap();
        assert_eq!(
            rebuilt.dump_canonical().unwrap(),
            target.dump_canonical().unwrap()
        );
    }

    #[test]
    fn test_explicit_zero_width_attachment() {
        let base = load_base();
        let target = with_new_field("  - new_field: 0\n  - new_field: 1\n");

        let units = extract(&base, &target, &RenameLinkage::new()).unwrap();
        assert_eq!(new_field_unit(&units, 0).pattern_slots(), &[(0, 5)]);
        assert_eq!(new_field_unit(&units, 1).pattern_slots(), &[(0, 6)]);

        let rebuilt = apply_change_units(&base, units.values()).unwrap();
        assert_eq!(
            rebuilt.dump_canonical().unwrap(),
            target.dump_canonical().unwrap()
        );
    }

    #[test]
    fn test_unreproducible_growth() {
        let base = load_base();
        let target = with_new_field("  - new_field: 2\n");

        let err = extract(&base, &target, &RenameLinkage::new()).unwrap_err();
        assert!(err.to_string().contains("no change unit reproduces"), "{err}");
    }

    #[test]
    fn test_split_seq_no() {
        assert_eq!(split_seq_no("comp_1_2#3"), Some(("comp_1_2", 3)));
        assert_eq!(split_seq_no("comp_1_2"), None);
        assert_eq!(split_seq_no("comp#03"), None);
        assert_eq!(split_seq_no("#3"), None);
        assert_eq!(split_seq_no("comp#x"), None);
    }
}
