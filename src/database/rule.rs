use serde::{Deserialize, Serialize};

/// A post-decode rule.
///
/// Rules are carried opaquely; `evaluate` is never interpreted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name, unique by convention
    pub name: String,
    /// Expression evaluated by the decoder
    pub evaluate: String,
}

impl Rule {
    /// Creates a new rule.
    pub fn new(name: impl Into<String>, evaluate: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            evaluate: evaluate.into(),
        }
    }
}
