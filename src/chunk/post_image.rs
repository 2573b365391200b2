// Reconstructs the post-image text of a hunk (EQ+INSERTION content, spec §9
// "the chunker... parses only the post-image content with the language
// grammar") and remembers each parent line's byte range inside it, so the
// Chunker can map an AST node's byte range back to the DiffLines it covers.

use std::ops::Range;

use crate::diff::model::{DiffChunk, LineMode};

pub struct PostImage {
    pub text: String,
    /// Parallel to `parent.lines`: `Some(range)` for EQ/INSERTION lines
    /// (lines that actually appear in the post-image), `None` otherwise.
    pub ranges: Vec<Option<Range<usize>>>,
}

impl PostImage {
    pub fn build(parent: &DiffChunk) -> Self {
        let mut text = String::new();
        let mut ranges = Vec::with_capacity(parent.lines.len());
        for line in &parent.lines {
            match line.mode {
                LineMode::Eq | LineMode::Insertion => {
                    let start = text.len();
                    text.push_str(&line.content);
                    let end = text.len();
                    ranges.push(Some(start..end));
                    text.push('\n');
                }
                LineMode::Deletion | LineMode::NoNewline => ranges.push(None),
            }
        }
        Self { text, ranges }
    }

    /// Parent line indices (not yet in `assigned`) whose post-image byte
    /// range overlaps `node_range`. Lines with no post-image position
    /// (deletions, no-newline markers) never match here; they are picked
    /// up later by gap filling.
    pub fn overlapping(&self, node_range: &Range<usize>, assigned: &[bool]) -> Vec<usize> {
        self.ranges
            .iter()
            .enumerate()
            .filter_map(|(idx, r)| {
                let r = r.as_ref()?;
                if assigned[idx] {
                    return None;
                }
                if r.start < node_range.end && node_range.start < r.end {
                    Some(idx)
                } else {
                    None
                }
            })
            .collect()
    }
}
