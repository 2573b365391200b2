/// Languages the Chunker can ask a syntax tree for. `Text` forces the
/// line-based fallback chunker (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageTag {
    Python,
    Cpp,
    Java,
    JavaScript,
    TypeScript,
    Go,
    Text,
}

/// Pure function from a file path's suffix to a LanguageTag (spec §4.2).
pub fn detect(path: &str) -> LanguageTag {
    let ext = path.rsplit('.').next().unwrap_or("");
    // rsplit on a path with no '.' returns the whole path; guard against that.
    if !path.contains('.') {
        return LanguageTag::Text;
    }
    match ext {
        "py" => LanguageTag::Python,
        "c" | "cc" | "cpp" | "cxx" | "h" | "hpp" => LanguageTag::Cpp,
        "java" => LanguageTag::Java,
        "js" | "jsx" => LanguageTag::JavaScript,
        "ts" | "tsx" => LanguageTag::TypeScript,
        "go" => LanguageTag::Go,
        _ => LanguageTag::Text,
    }
}
