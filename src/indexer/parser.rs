//! Native tree-sitter parser wrapper.
//!
//! # Design decisions
//!
//! - **No stored state.** `CodeParser` carries no fields. Tree-sitter's
//!   `Parser` is `!Send + !Sync`, so a fresh parser is created on every call
//!   and the wrapper can be shared across rayon workers.
//!
//! - **Grammar coverage is narrower than recognition.** [`Language`] knows
//!   many extensions; only the grammars linked below can actually be parsed.
//!   Everything else reports [`RepoGraphError::UnsupportedLanguage`].

use crate::error::{RepoGraphError, Result};
use crate::types::Language;

/// Thin wrapper around native tree-sitter parsing.
pub struct CodeParser;

impl CodeParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse `content` with the grammar for `language`.
    pub fn parse(&self, content: &[u8], language: Language) -> Result<tree_sitter::Tree> {
        let ts_lang = Self::get_ts_language(language)
            .ok_or_else(|| RepoGraphError::UnsupportedLanguage(language.to_string()))?;

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&ts_lang)
            .map_err(|e| RepoGraphError::Parse(format!("language version mismatch: {e}")))?;

        parser.parse(content, None).ok_or_else(|| {
            RepoGraphError::Parse("tree-sitter returned no tree (timeout or cancellation)".into())
        })
    }

    /// The linked grammar for `language`, if any.
    #[must_use]
    pub fn get_ts_language(language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript | Language::Jsx => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Go
            | Language::Java
            | Language::C
            | Language::Cpp
            | Language::CSharp
            | Language::Ruby
            | Language::Kotlin
            | Language::Php
            | Language::Bash
            | Language::Sql
            | Language::Swift
            | Language::Scala => None,
        }
    }

    /// True when `language` has a linked grammar.
    #[must_use]
    pub fn can_parse(language: Language) -> bool {
        Self::get_ts_language(language).is_some()
    }
}

impl Default for CodeParser {
    fn default() -> Self {
        Self::new()
    }
}
