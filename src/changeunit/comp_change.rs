use std::collections::BTreeMap;

use crate::{
    builder::DatabaseBuilder,
    changeunit::Identity,
    database::{ComponentInfo, ComponentStatus, ContentHash},
    Result,
};

/// Adds a component, or updates (and possibly renames) an existing one.
///
/// An addition may carry a sequence number. It then asks for `name` but settles for
/// `name#seq_no` while `name` is taken, which is how a new component coexists with an
/// older one of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompChange {
    class: String,
    /// Name in the target database
    name: String,
    info: ComponentInfo,
    /// Predecessor name for updates, `None` for additions
    prev_name: Option<String>,
    /// Requested name and sequence number of a disambiguated addition
    seq_no: Option<(String, usize)>,
    identity: Identity,
}

impl CompChange {
    /// A component that did not exist before.
    pub fn new_component(
        class: impl Into<String>,
        name: impl Into<String>,
        info: ComponentInfo,
    ) -> Self {
        Self::build(class.into(), name.into(), info, None, None)
    }

    /// A component that did not exist before and is stored as `name#seq_no` when
    /// `name` is taken.
    pub fn new_component_with_seq_no(
        class: impl Into<String>,
        name: impl Into<String>,
        seq_no: usize,
        info: ComponentInfo,
    ) -> Self {
        let requested = name.into();
        let name = format!("{requested}#{seq_no}");
        Self::build(class.into(), name, info, None, Some((requested, seq_no)))
    }

    /// New content for the component currently named `prev_name`, stored as `name`.
    pub fn update(
        class: impl Into<String>,
        prev_name: impl Into<String>,
        name: impl Into<String>,
        info: ComponentInfo,
    ) -> Self {
        Self::build(class.into(), name.into(), info, Some(prev_name.into()), None)
    }

    fn build(
        class: String,
        name: String,
        info: ComponentInfo,
        prev_name: Option<String>,
        seq_no: Option<(String, usize)>,
    ) -> Self {
        let identity = Identity::CompChange {
            class: class.clone(),
            name: name.clone(),
            is_new: prev_name.is_none(),
        };
        Self {
            class,
            name,
            info,
            prev_name,
            seq_no,
            identity,
        }
    }

    /// Component class
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Name after the change, as the target database spells it
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name a disambiguated addition asks for, without the `#seq_no` suffix.
    #[must_use]
    pub fn requested_name(&self) -> &str {
        self.seq_no
            .as_ref()
            .map_or(self.name.as_str(), |(requested, _)| requested.as_str())
    }

    /// Sequence number of a disambiguated addition
    #[must_use]
    pub fn seq_no(&self) -> Option<usize> {
        self.seq_no.as_ref().map(|&(_, seq_no)| seq_no)
    }

    /// `true` for an addition
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.prev_name.is_none()
    }

    /// Name before the change, for updates
    #[must_use]
    pub fn prev_name(&self) -> Option<&str> {
        self.prev_name.as_deref()
    }

    /// `true` if the update changes the component's name.
    #[must_use]
    pub fn is_rename(&self) -> bool {
        self.prev_name.as_deref().is_some_and(|prev| prev != self.name)
    }

    /// Complete component record after the change
    #[must_use]
    pub fn info(&self) -> &ComponentInfo {
        &self.info
    }

    /// Probed values after the change
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, String> {
        self.info.values()
    }

    /// Status after the change
    #[must_use]
    pub fn status(&self) -> ComponentStatus {
        self.info.status()
    }

    /// Information after the change
    #[must_use]
    pub fn information(&self) -> &BTreeMap<String, String> {
        self.info.information()
    }

    /// Content hash after the change
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        self.info.content_hash()
    }

    /// Identity of this unit
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Applies the change to `builder`.
    ///
    /// An update that keeps the name and only changes the status goes through
    /// [`DatabaseBuilder::set_component_status`]; any other update replaces the record.
    ///
    /// # Errors
    ///
    /// Duplicate-target when adding a name that exists, Missing-referent when the
    /// predecessor of an update is gone.
    pub fn patch(&self, builder: &mut DatabaseBuilder) -> Result<()> {
        let Some(prev_name) = self.prev_name.as_deref() else {
            return match &self.seq_no {
                Some((requested, seq_no)) => {
                    let info = self.info.clone();
                    builder
                        .add_component_with_seq_no(&self.class, requested, *seq_no, info)
                        .map(|_| ())
                }
                None => builder.add_component(&self.class, &self.name, self.info.clone()),
            };
        };

        let status_only = prev_name == self.name
            && builder
                .database()
                .component(&self.class, prev_name)
                .is_some_and(|current| current.differs_only_in_status(&self.info));
        if status_only {
            builder.set_component_status(&self.class, &self.name, self.info.status())
        } else {
            builder.update_component(&self.class, prev_name, &self.name, self.info.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ApplyFailure, test::load_base};

    #[test]
    fn test_identity() {
        let info = ComponentInfo::from_values([("value", "3")], ComponentStatus::Supported);
        let added = CompChange::new_component("comp_cls_1", "new_comp", info.clone());
        let updated = CompChange::update("comp_cls_1", "comp_1_2", "comp_1_3", info);

        assert!(added.is_new());
        assert!(!updated.is_new());
        assert!(updated.is_rename());
        assert_eq!(added.identity().to_string(), "CompChange:comp_cls_1:new_comp(new)");
        assert_eq!(updated.identity().to_string(), "CompChange:comp_cls_1:comp_1_3");
    }

    #[test]
    fn test_patch_status_only() {
        let base = load_base();
        let info = base
            .component("comp_cls_1", "comp_1_1")
            .unwrap()
            .with_status(ComponentStatus::Deprecated);
        let unit = CompChange::update("comp_cls_1", "comp_1_1", "comp_1_1", info.clone());

        let mut builder = DatabaseBuilder::new(&base);
        unit.patch(&mut builder).unwrap();
        assert_eq!(builder.database().component("comp_cls_1", "comp_1_1"), Some(&info));
    }

    #[test]
    fn test_patch_missing_predecessor() {
        let base = load_base();
        let info = ComponentInfo::from_values([("value", "9")], ComponentStatus::Supported);
        let unit = CompChange::update("comp_cls_1", "comp_1_9", "comp_1_3", info);

        let mut builder = DatabaseBuilder::new(&base);
        let err = unit.patch(&mut builder).unwrap_err();
        assert_eq!(err.apply_failure(), Some(ApplyFailure::MissingReferent));
        assert!(err.to_string().contains("no matching component name"));
    }

    #[test]
    fn test_patch_with_seq_no() {
        let base = load_base();
        let info = ComponentInfo::from_values([("value", "3")], ComponentStatus::Supported);
        let unit = CompChange::new_component_with_seq_no("comp_cls_1", "comp_1_2", 3, info);
        assert_eq!(unit.name(), "comp_1_2#3");
        assert_eq!(unit.requested_name(), "comp_1_2");
        assert_eq!(unit.seq_no(), Some(3));
        assert_eq!(
            unit.identity().to_string(),
            "CompChange:comp_cls_1:comp_1_2#3(new)"
        );

        let mut builder = DatabaseBuilder::new(&base);
        unit.patch(&mut builder).unwrap();
        assert!(builder.database().component("comp_cls_1", "comp_1_2#3").is_some());
        assert_eq!(
            builder.database().component("comp_cls_1", "comp_1_2"),
            base.component("comp_cls_1", "comp_1_2")
        );

        let err = unit.patch(&mut builder).unwrap_err();
        assert_eq!(err.apply_failure(), Some(ApplyFailure::DuplicateTarget));
    }

    #[test]
    fn test_patch_duplicate_addition() {
        let base = load_base();
        let info = ComponentInfo::from_values([("value", "3")], ComponentStatus::Supported);
        let unit = CompChange::new_component("comp_cls_1", "comp_1_2", info);

        let mut builder = DatabaseBuilder::new(&base);
        let err = unit.patch(&mut builder).unwrap_err();
        assert_eq!(err.apply_failure(), Some(ApplyFailure::DuplicateTarget));
    }
}
