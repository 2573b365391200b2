mod detector;
mod tree;

pub use detector::{detect, LanguageTag};
pub use tree::{parse, SyntaxNode, SyntaxTree};
