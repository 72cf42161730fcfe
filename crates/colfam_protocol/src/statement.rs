//! A rendered CQL statement with its positional bind values.

use std::fmt;

use crate::value::Value;

/// Query text plus the values bound to its `?` placeholders, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub query: String,
    pub values: Vec<Value>,
}

impl Statement {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            values: Vec::new(),
        }
    }

    pub fn with_values(query: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            query: query.into(),
            values,
        }
    }

    /// Number of `?` placeholders outside string literals.
    pub fn placeholder_count(&self) -> usize {
        let mut in_literal = false;
        let mut count = 0;
        for c in self.query.chars() {
            match c {
                '\'' => in_literal = !in_literal,
                '?' if !in_literal => count += 1,
                _ => {}
            }
        }
        count
    }

    /// Query text with each placeholder replaced by its literal.
    ///
    /// Only for logs and dry runs; execution always binds.
    pub fn inline(&self) -> String {
        let mut out = String::with_capacity(self.query.len());
        let mut values = self.values.iter();
        let mut in_literal = false;
        for c in self.query.chars() {
            match c {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(c);
                }
                '?' if !in_literal => match values.next() {
                    Some(v) => out.push_str(&v.to_string()),
                    None => out.push(c),
                },
                _ => out.push(c),
            }
        }
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query)?;
        if !self.values.is_empty() {
            let rendered: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
            write!(f, " -- [{}]", rendered.join(", "))?;
        }
        Ok(())
    }
}
