use crate::error::{ChunkerError, Result};
use crate::source::NodeKind;
use std::path::Path;

/// Source language of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" => Language::Python,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Unknown => "unknown",
        }
    }

    /// Whether a tree-sitter grammar is bundled for this language
    pub fn supports_ast(self) -> bool {
        matches!(
            self,
            Language::Rust | Language::Python | Language::JavaScript | Language::TypeScript
        )
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Language::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            _ => Err(ChunkerError::unsupported_language(self.as_str())),
        }
    }

    /// Map a grammar node kind onto the chunker's coarse categories.
    pub fn classify(self, kind: &str) -> NodeKind {
        match self {
            Language::Rust => match kind {
                "function_item" | "function_signature_item" => NodeKind::FunctionLike,
                "struct_item" | "enum_item" | "union_item" | "trait_item" | "impl_item" => {
                    NodeKind::ClassLike
                }
                "mod_item" | "declaration_list" | "field_declaration_list"
                | "enum_variant_list" => NodeKind::DeclarationBlock,
                _ => NodeKind::Other,
            },
            Language::Python => match kind {
                "function_definition" => NodeKind::FunctionLike,
                "class_definition" => NodeKind::ClassLike,
                "block" => NodeKind::DeclarationBlock,
                _ => NodeKind::Other,
            },
            Language::JavaScript | Language::TypeScript => match kind {
                "function_declaration"
                | "generator_function_declaration"
                | "function_expression"
                | "arrow_function"
                | "method_definition"
                | "method_signature"
                | "abstract_method_signature" => NodeKind::FunctionLike,
                "class_declaration"
                | "abstract_class_declaration"
                | "class"
                | "interface_declaration"
                | "enum_declaration" => NodeKind::ClassLike,
                "class_body" | "interface_body" | "enum_body" | "object_type" => {
                    NodeKind::DeclarationBlock
                }
                _ => NodeKind::Other,
            },
            _ => NodeKind::Other,
        }
    }
}
