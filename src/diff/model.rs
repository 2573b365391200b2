/// How a single line inside a hunk relates to the pre-image and post-image.
///
/// `NoNewline` represents the `\ No newline at end of file` marker and
/// contributes to neither side's line count (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    Eq,
    Insertion,
    Deletion,
    NoNewline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub mode: LineMode,
    pub content: String,
}

/// A single hunk (`@@ ... @@` block) from a unified diff.
#[derive(Debug, Clone)]
pub struct DiffChunk {
    pub old_filepath: String,
    pub new_filepath: String,
    /// 1-based line number in the pre-image, from the hunk header's minus side.
    pub start: usize,
    pub is_new: bool,
    pub is_deleted: bool,
    pub lines: Vec<DiffLine>,
}

impl DiffChunk {
    /// A rename is any chunk whose old and new paths differ and which is
    /// neither a file creation nor a file deletion.
    pub fn is_rename(&self) -> bool {
        self.old_filepath != self.new_filepath && !self.is_new && !self.is_deleted
    }

    /// Count of lines visible to the pre-image: EQ + DELETION.
    pub fn old_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.mode, LineMode::Eq | LineMode::Deletion))
            .count()
    }

    /// Count of lines visible to the post-image: EQ + INSERTION.
    pub fn new_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.mode, LineMode::Eq | LineMode::Insertion))
            .count()
    }

    /// Reconstruct the pre-image slice this hunk covers (EQ + DELETION content,
    /// joined with newlines).
    pub fn pre_image(&self) -> String {
        self.lines
            .iter()
            .filter(|l| matches!(l.mode, LineMode::Eq | LineMode::Deletion))
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Reconstruct the post-image slice this hunk covers (EQ + INSERTION
    /// content, joined with newlines).
    pub fn post_image(&self) -> String {
        self.lines
            .iter()
            .filter(|l| matches!(l.mode, LineMode::Eq | LineMode::Insertion))
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Total serialized byte size of this hunk's header + body, used by the
    /// Chunker's size-bound checks.
    pub fn byte_size(&self) -> usize {
        self.lines
            .iter()
            .map(|l| match l.mode {
                LineMode::NoNewline => l.content.len() + 1,
                _ => l.content.len() + 2, // prefix char + newline
            })
            .sum()
    }
}
