// Wraps tree-sitter behind the read-only capability set the Chunker needs:
// child traversal and a node's byte range (spec §4.2, §9 "Polymorphism
// across grammar backends" — C3 is polymorphic over
// `{parse(text) -> tree, tree.children(), node.byte_range()}`).

use std::ops::Range;

use crate::lang::detector::LanguageTag;

pub struct SyntaxTree {
    tree: tree_sitter::Tree,
}

impl SyntaxTree {
    pub fn root(&self) -> SyntaxNode<'_> {
        SyntaxNode(self.tree.root_node())
    }
}

pub struct SyntaxNode<'tree>(tree_sitter::Node<'tree>);

impl<'tree> SyntaxNode<'tree> {
    pub fn byte_range(&self) -> Range<usize> {
        self.0.byte_range()
    }

    pub fn children(&self) -> Vec<SyntaxNode<'tree>> {
        let mut cursor = self.0.walk();
        self.0.children(&mut cursor).map(SyntaxNode).collect()
    }
}

fn grammar_for(lang: LanguageTag) -> Option<tree_sitter::Language> {
    match lang {
        LanguageTag::Python => Some(tree_sitter_python::LANGUAGE.into()),
        LanguageTag::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
        LanguageTag::Java => Some(tree_sitter_java::LANGUAGE.into()),
        LanguageTag::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        LanguageTag::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        LanguageTag::Go => Some(tree_sitter_go::LANGUAGE.into()),
        LanguageTag::Text => None,
    }
}

/// Parse `text` as `lang`. Falls back to the C++ grammar when the
/// requested grammar fails to load (e.g. an ABI mismatch between the
/// `tree-sitter` runtime and a language crate) — this is semantically safe
/// because the Chunker only ever reads byte ranges, never node kinds.
/// Returns `None` only if even the C++ grammar fails to parse, in which
/// case the caller should fall back to line-based chunking.
pub fn parse(text: &str, lang: LanguageTag) -> Option<SyntaxTree> {
    let primary = grammar_for(lang);
    let fallback = tree_sitter_cpp::LANGUAGE.into();

    for language in [primary, Some(fallback)].into_iter().flatten() {
        let mut parser = tree_sitter::Parser::new();
        if parser.set_language(&language).is_err() {
            continue;
        }
        if let Some(tree) = parser.parse(text, None) {
            return Some(SyntaxTree { tree });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_python_and_exposes_children() {
        let tree = parse("def f():\n    return 1\n", LanguageTag::Python).unwrap();
        let root = tree.root();
        assert!(root.byte_range().end > 0);
        assert!(!root.children().is_empty());
    }

    #[test]
    fn empty_text_still_parses() {
        let tree = parse("", LanguageTag::Go).unwrap();
        assert_eq!(tree.root().byte_range(), 0..0);
    }
}
