//! Row selection by primary key equality.

use colfam_protocol::Value;

/// Conjunction of `column = value` terms, in the order given.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    terms: Vec<(String, Value)>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality term. A later term for the same column replaces the earlier one.
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.terms.iter_mut().find(|(c, _)| *c == column) {
            Some(term) => term.1 = value,
            None => self.terms.push((column, value)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.terms.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn terms(&self) -> &[(String, Value)] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Predicate {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Predicate::new(), |p, (column, value)| p.filter(column, value))
    }
}
