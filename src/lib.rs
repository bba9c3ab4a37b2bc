pub mod config;
pub mod copy_tree;
pub mod coverage;
pub mod document;
pub mod error;
pub mod mutants;
pub mod operators;
pub mod output;
pub mod parser;
pub mod parser_js;
pub mod parser_rust;
pub mod pool;
pub mod runner;
pub mod scope;
pub mod search;
pub mod state;

pub use error::{RepairError, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Python,
    Rust,
    JavaScript,
    TypeScript,
    Tsx,
}

pub fn detect_language(path: &std::path::Path) -> Option<Language> {
    match path.extension()?.to_str()? {
        "py" => Some(Language::Python),
        "rs" => Some(Language::Rust),
        "js" | "mjs" | "cjs" => Some(Language::JavaScript),
        "ts" | "mts" | "cts" => Some(Language::TypeScript),
        "tsx" | "jsx" => Some(Language::Tsx),
        _ => None,
    }
}

impl Language {
    pub fn grammar(self) -> tree_sitter::Language {
        match self {
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    /// Statement, block and binding tables used by indexing, editing and
    /// scope checking.
    pub fn profile(self) -> &'static parser::LanguageProfile {
        match self {
            Language::Python => &parser::PYTHON,
            Language::Rust => &parser_rust::RUST,
            Language::JavaScript => &parser_js::JAVASCRIPT,
            Language::TypeScript | Language::Tsx => &parser_js::TYPESCRIPT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Rust => "rust",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
        }
    }
}
