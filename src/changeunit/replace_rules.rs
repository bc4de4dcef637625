use crate::{builder::DatabaseBuilder, changeunit::Identity, database::Rule, Result};

/// Wholesale replacement of the rules section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceRules {
    new_rules: Vec<Rule>,
    identity: Identity,
}

impl ReplaceRules {
    /// Creates the unit carrying the complete new rule list.
    #[must_use]
    pub fn new(new_rules: Vec<Rule>) -> Self {
        Self {
            new_rules,
            identity: Identity::ReplaceRules,
        }
    }

    /// Rules after the change
    #[must_use]
    pub fn new_rules(&self) -> &[Rule] {
        &self.new_rules
    }

    /// Identity of this unit
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Replaces the rules of `builder`; always returns `Ok`.
    pub fn patch(&self, builder: &mut DatabaseBuilder) -> Result<()> {
        builder.replace_rules(self.new_rules.clone());
        Ok(())
    }
}
