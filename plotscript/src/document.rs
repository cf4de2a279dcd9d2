//! Script document
//!
//! Holds the source text of one script and its token sequence. Tokens are
//! computed on first use and reused until the text actually changes.

use crate::eval::{evaluate, Evaluation};
use crate::lexer::{tokenize, Token};
use plotscript_core::{LexError, VariableTable};
use plotscript_plugin::FunctionRegistry;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct Document {
    source: String,
    tokens: Option<Result<Arc<[Token]>, LexError>>,
}

impl Document {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            tokens: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replace the text. Returns whether it differed from the old text;
    /// the token cache is kept when it did not.
    pub fn set_source(&mut self, source: impl Into<String>) -> bool {
        let source = source.into();
        if source == self.source {
            return false;
        }
        trace!(bytes = source.len(), "document changed, tokens invalidated");
        self.source = source;
        self.tokens = None;
        true
    }

    /// Cached token sequence of the current text
    pub fn tokens(&mut self) -> Result<Arc<[Token]>, LexError> {
        self.tokens
            .get_or_insert_with(|| tokenize(&self.source).map(Arc::from))
            .clone()
    }

    /// Run the document against `table`.
    ///
    /// A lex error fails the whole run before any statement executes.
    pub fn run<'a>(
        &mut self,
        table: &'a mut VariableTable,
        registry: &'a Arc<FunctionRegistry>,
    ) -> Result<Evaluation<'a>, LexError> {
        let tokens = self.tokens()?;
        Ok(evaluate(tokens, table, registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotscript_core::Value;
    use pretty_assertions::assert_eq;

    fn registry() -> Arc<FunctionRegistry> {
        Arc::new(plotscript_std::standard_registry())
    }

    #[test]
    fn test_tokens_are_cached() {
        let mut doc = Document::new("x = 1\nx + 1");
        let first = doc.tokens().unwrap();
        let second = doc.tokens().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unchanged_text_keeps_cache() {
        let mut doc = Document::new("1 + 2");
        let before = doc.tokens().unwrap();
        assert!(!doc.set_source("1 + 2"));
        let after = doc.tokens().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_edit_invalidates_cache() {
        let mut doc = Document::new("1 + 2");
        let before = doc.tokens().unwrap();
        assert!(doc.set_source("1 + 3"));
        let after = doc.tokens().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(doc.source(), "1 + 3");
    }

    #[test]
    fn test_lex_error_is_cached_and_cleared() {
        let mut doc = Document::new("1 $ 2");
        assert!(doc.tokens().is_err());
        assert!(doc.tokens().is_err());
        doc.set_source("1 + 2");
        assert_eq!(doc.tokens().unwrap().len(), 3);
    }

    #[test]
    fn test_runs_share_table() {
        let registry = registry();
        let mut table = VariableTable::new();
        let mut doc = Document::new("x = 10");
        let results: Vec<_> = doc.run(&mut table, &registry).unwrap().collect();
        assert_eq!(results, vec![Ok(Value::Unit)]);

        doc.set_source("x * 2");
        let results: Vec<_> = doc.run(&mut table, &registry).unwrap().collect();
        assert_eq!(results, vec![Ok(Value::Integer(20))]);
    }

    #[test]
    fn test_lex_error_fails_run() {
        let registry = registry();
        let mut table = VariableTable::new();
        let mut doc = Document::new("x = 1\n@");
        assert!(doc.run(&mut table, &registry).is_err());
        assert!(table.is_empty());
    }
}
