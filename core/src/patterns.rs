//! Ordered, data-driven regex rule tables.
//!
//! Every detector in the pipeline is a table of `(name, pattern,
//! classification)` rows compiled once when the layer is built. Rows are
//! evaluated in declaration order.

use regex::Regex;
use tracing::warn;

/// Declarative row of a rule table.
pub type RuleSpec<C> = (&'static str, &'static str, C);

#[derive(Debug, Clone)]
pub struct PatternRule<C> {
    pub name: &'static str,
    pub regex: Regex,
    pub classification: C,
}

#[derive(Debug, Clone)]
pub struct PatternTable<C> {
    rules: Vec<PatternRule<C>>,
}

impl<C: Clone> PatternTable<C> {
    /// Compiles `specs` in order. A row whose pattern fails to compile is
    /// logged and left out of the table.
    pub fn compile(specs: &[RuleSpec<C>]) -> Self {
        let rules = specs
            .iter()
            .filter_map(|(name, pattern, classification)| match Regex::new(pattern) {
                Ok(regex) => Some(PatternRule {
                    name: *name,
                    regex,
                    classification: classification.clone(),
                }),
                Err(err) => {
                    warn!(rule = *name, "skipping rule with invalid pattern: {err}");
                    None
                }
            })
            .collect();
        Self { rules }
    }
}

impl<C> PatternTable<C> {
    /// Every row matching `text`, in table order.
    pub fn matches<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a PatternRule<C>> + 'a {
        self.rules.iter().filter(move |rule| rule.regex.is_match(text))
    }

    pub fn first_match(&self, text: &str) -> Option<&PatternRule<C>> {
        self.rules.iter().find(|rule| rule.regex.is_match(text))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
