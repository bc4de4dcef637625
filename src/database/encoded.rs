//! Encoded fields and the component combinations they enumerate.

use std::collections::BTreeMap;

/// Component selection of one encoding index.
///
/// Maps each component class to the ordered names selected for it. A class with a
/// single name is the common case; multi-unit fields list the same class several
/// times, and an empty list means "no component of that class".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Combination {
    selections: BTreeMap<String, Vec<String>>,
}

impl Combination {
    /// Creates an empty combination.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Combination selecting `names` for a single class.
    pub fn single<I, S>(class: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().with(class, names)
    }

    /// Adds (or replaces) the selection for `class`.
    #[must_use]
    pub fn with<I, S>(mut self, class: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selections
            .insert(class.into(), names.into_iter().map(Into::into).collect());
        self
    }

    /// Component classes, ascending
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.selections.keys().map(String::as_str)
    }

    /// Names selected for `class`, empty if the class is not part of the combination.
    #[must_use]
    pub fn names(&self, class: &str) -> &[String] {
        self.selections.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates `(class, names)` pairs, ascending by class.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.selections
            .iter()
            .map(|(class, names)| (class.as_str(), names.as_slice()))
    }

    /// Returns `true` if `name` of `class` is selected at least once.
    #[must_use]
    pub fn references(&self, class: &str, name: &str) -> bool {
        self.names(class).iter().any(|selected| selected == name)
    }

    /// Rewrites every occurrence of `prev` in `class` to `name`.
    pub(crate) fn rename(&mut self, class: &str, prev: &str, name: &str) {
        if let Some(names) = self.selections.get_mut(class) {
            for selected in names.iter_mut().filter(|selected| *selected == prev) {
                *selected = name.to_string();
            }
        }
    }
}

impl<C, N> FromIterator<(C, Vec<N>)> for Combination
where
    C: Into<String>,
    N: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (C, Vec<N>)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Combination::new(), |combination, (class, names)| {
                combination.with(class, names)
            })
    }
}

/// An encoded field: combinations addressed by contiguous encoding indices.
///
/// Indices only ever grow by appending, so the vector position is the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedField {
    pub(crate) combinations: Vec<Combination>,
}

impl EncodedField {
    /// Creates a field from its combinations in index order.
    #[must_use]
    pub fn new(combinations: Vec<Combination>) -> Self {
        Self { combinations }
    }

    /// Combinations in index order
    #[must_use]
    pub fn combinations(&self) -> &[Combination] {
        &self.combinations
    }

    /// Combination at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Combination> {
        self.combinations.get(index)
    }

    /// Number of encoding indices
    #[must_use]
    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    /// Returns `true` if the field has no combination yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    /// Component classes used anywhere in this field.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        let mut classes: Vec<&str> = self
            .combinations
            .iter()
            .flat_map(Combination::classes)
            .collect();
        classes.sort_unstable();
        classes.dedup();
        classes.into_iter()
    }

    pub(crate) fn rename(&mut self, class: &str, prev: &str, name: &str) {
        for combination in &mut self.combinations {
            combination.rename(class, prev, name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combination_accessors() {
        let combination =
            Combination::single("comp_cls_2", ["comp_2_1"]).with("comp_cls_3", ["comp_3_1"]);

        assert_eq!(
            combination.classes().collect::<Vec<_>>(),
            vec!["comp_cls_2", "comp_cls_3"]
        );
        assert_eq!(combination.names("comp_cls_3"), ["comp_3_1".to_string()]);
        assert!(combination.names("cpu").is_empty());
        assert!(combination.references("comp_cls_2", "comp_2_1"));
        assert!(!combination.references("comp_cls_2", "comp_3_1"));
    }

    #[test]
    fn test_rename_rewrites_every_occurrence() {
        let mut field = EncodedField::new(vec![
            Combination::single("comp_cls_1", ["comp_1_1"]),
            Combination::single("comp_cls_1", ["comp_1_2", "comp_1_2"]),
            Combination::single("other", ["comp_1_2"]),
        ]);

        field.rename("comp_cls_1", "comp_1_2", "comp_1_3");

        assert_eq!(field.combinations()[0].names("comp_cls_1"), ["comp_1_1"]);
        assert_eq!(
            field.combinations()[1].names("comp_cls_1"),
            ["comp_1_3", "comp_1_3"]
        );
        assert_eq!(field.combinations()[2].names("other"), ["comp_1_2"]);
    }

    #[test]
    fn test_field_classes_deduplicated() {
        let field = EncodedField::new(vec![
            Combination::single("b", ["x"]).with("a", Vec::<String>::new()),
            Combination::single("b", ["y"]),
        ]);
        assert_eq!(field.classes().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(field.len(), 2);
        assert!(!field.is_empty());
    }
}
