//! Helpful error types for CLI commands
//!
//! Each error says what went wrong and suggests a fix.

use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_suggestion(format!("TRY: Check that the path exists: ls -la {}", path.display()))
    }

    pub fn invalid_model(path: &Path, details: &str) -> Self {
        Self::new(format!("Cannot parse model file: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestion("TRY: Each column needs `name` and `type`, e.g. [[columns]] name = \"id\" type = \"uuid\" primary_key = true")
    }

    pub fn invalid_declaration(path: &Path, details: &str) -> Self {
        Self::new(format!("Invalid model in {}", path.display()))
            .with_context(details.to_string())
            .with_suggestion("TRY: Mark at least one column primary_key = true and keep static columns off the key")
            .with_suggestion(format!("TRY: colfam ddl {} --verbose", path.display()))
    }

    pub fn invalid_assignment(raw: &str) -> Self {
        Self::new(format!("Invalid assignment: '{}'", raw))
            .with_context("Assignments are written as column=value")
            .with_suggestion("TRY: --set count=1 --set 'text_map__update={\"k\": \"v\"}'")
    }

    pub fn invalid_server_version(raw: &str) -> Self {
        Self::new(format!("Invalid server version: '{}'", raw))
            .with_suggestion("TRY: --server-version 3.11.4")
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(context) = &self.context {
            write!(f, "\n  {}", context)?;
        }
        for suggestion in &self.suggestions {
            write!(f, "\n  {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for HelpfulError {}
