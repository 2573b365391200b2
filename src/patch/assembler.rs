// Materializes per-cluster patch files with correctly offset hunk headers
// (spec §4.7). Stateful across the whole run: a rename observed in one
// sub-hunk is propagated to every later sub-hunk referencing the old path.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::diff::model::{DiffChunk, LineMode};
use crate::errors::DiffmuxError;

pub struct PatchAssembler {
    /// Maps an old path to the path it was last renamed to, so any later
    /// sub-hunk still naming the old path gets rewritten (spec §4.7 "Rename
    /// propagation across patches").
    renames: HashMap<String, String>,
}

impl PatchAssembler {
    pub fn new() -> Self {
        Self { renames: HashMap::new() }
    }

    /// Sort a cluster's sub-hunks by `(new_filepath, start)` before writing
    /// — patches inside one group all come from disjoint regions of the
    /// same files, so this order is what lets each apply cleanly against
    /// the clean pre-image in sequence (spec §4.7 "Line-number
    /// correctness").
    pub fn sort_group(chunks: &mut [DiffChunk]) {
        chunks.sort_by(|a, b| (a.new_filepath.as_str(), a.start).cmp(&(b.new_filepath.as_str(), b.start)));
    }

    /// Serialize one sub-hunk to patch text. Empty string means "skip me"
    /// (spec §4.7: a sub-hunk with `old_count == 0 && new_count == 0` that
    /// isn't a rename produces nothing).
    pub fn assemble(&mut self, chunk: &DiffChunk) -> String {
        let old_count = chunk.old_count();
        let new_count = chunk.new_count();
        let is_rename = chunk.is_rename();

        // Resolve both sides through any rename recorded by an earlier
        // patch: a later sub-hunk naming this hunk's old path no longer has
        // a file there once that earlier rename applies (spec §4.7 "Rename
        // propagation across patches").
        let old_filepath = self.resolve(&chunk.old_filepath);
        let new_filepath = self.resolve(&chunk.new_filepath);

        if is_rename {
            self.renames.insert(chunk.old_filepath.clone(), chunk.new_filepath.clone());
        }

        if !is_rename && old_count == 0 && new_count == 0 {
            return String::new();
        }

        let mut out = String::new();
        if is_rename {
            out.push_str(&format!("diff --git a/{old_filepath} b/{new_filepath}\n"));
            out.push_str(&format!("rename from {old_filepath}\n"));
            out.push_str(&format!("rename to   {new_filepath}\n"));
        }

        if old_count == 0 && new_count == 0 {
            // Pure rename, no content change: no hunk body at all.
            return out;
        }

        let old_header = if chunk.is_new {
            "--- /dev/null".to_string()
        } else {
            format!("--- a/{old_filepath}")
        };
        let new_header = if chunk.is_deleted {
            "+++ /dev/null".to_string()
        } else {
            format!("+++ b/{new_filepath}")
        };
        out.push_str(&old_header);
        out.push('\n');
        out.push_str(&new_header);
        out.push('\n');
        out.push_str(&format!("@@ -{},{} +{},{} @@\n", chunk.start, old_count, chunk.start, new_count));

        for (i, line) in chunk.lines.iter().enumerate() {
            let text = match line.mode {
                LineMode::Eq => format!(" {}", line.content),
                LineMode::Insertion => format!("+{}", line.content),
                LineMode::Deletion => format!("-{}", line.content),
                LineMode::NoNewline => line.content.clone(),
            };
            out.push_str(&text);
            if i + 1 < chunk.lines.len() {
                out.push('\n');
            }
        }
        out
    }

    /// Write one cluster's patch files into `<out_dir>/cluster_<k>/`.
    /// Empty patches are skipped; the surviving patches are numbered
    /// sequentially with no gaps (spec §4.8 step 5).
    pub fn write_cluster(
        &mut self,
        out_dir: &Path,
        cluster_idx: usize,
        chunks: &mut [DiffChunk],
    ) -> Result<Vec<PathBuf>, DiffmuxError> {
        Self::sort_group(chunks);

        let dir = out_dir.join(format!("cluster_{cluster_idx}"));
        std::fs::create_dir_all(&dir).map_err(|source| DiffmuxError::Filesystem {
            path: dir.display().to_string(),
            source,
        })?;

        let mut written = Vec::new();
        let mut i = 0usize;
        for chunk in chunks.iter() {
            let text = self.assemble(chunk);
            if text.is_empty() {
                continue;
            }
            let path = dir.join(format!("patch_{i}.patch"));
            std::fs::write(&path, text).map_err(|source| DiffmuxError::Filesystem {
                path: path.display().to_string(),
                source,
            })?;
            written.push(path);
            i += 1;
        }
        Ok(written)
    }

    fn resolve(&self, path: &str) -> String {
        let mut current = path.to_string();
        let mut seen = HashSet::new();
        while let Some(next) = self.renames.get(&current) {
            if !seen.insert(current.clone()) {
                break;
            }
            current = next.clone();
        }
        current
    }
}

impl Default for PatchAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::model::DiffLine;

    fn eq(s: &str) -> DiffLine {
        DiffLine { mode: LineMode::Eq, content: s.into() }
    }
    fn ins(s: &str) -> DiffLine {
        DiffLine { mode: LineMode::Insertion, content: s.into() }
    }

    #[test]
    fn single_insertion_patch() {
        let chunk = DiffChunk {
            old_filepath: "f.py".into(),
            new_filepath: "f.py".into(),
            start: 1,
            is_new: false,
            is_deleted: false,
            lines: vec![eq("a"), ins("b"), eq("c"), eq("d")],
        };
        let mut asm = PatchAssembler::new();
        let text = asm.assemble(&chunk);
        assert!(text.contains("@@ -1,3 +1,4 @@"));
        assert!(text.contains("+b"));
        assert!(text.starts_with("--- a/f.py"));
    }

    #[test]
    fn new_file_patch_uses_dev_null() {
        let chunk = DiffChunk {
            old_filepath: "new.py".into(),
            new_filepath: "new.py".into(),
            start: 1,
            is_new: true,
            is_deleted: false,
            lines: vec![ins("foo"), ins("bar")],
        };
        let mut asm = PatchAssembler::new();
        let text = asm.assemble(&chunk);
        assert!(text.starts_with("--- /dev/null"));
        assert!(text.contains("@@ -1,0 +1,2 @@"));
    }

    #[test]
    fn rename_propagates_to_later_patch() {
        let rename = DiffChunk {
            old_filepath: "a.py".into(),
            new_filepath: "b.py".into(),
            start: 1,
            is_new: false,
            is_deleted: false,
            lines: vec![],
        };
        let modify = DiffChunk {
            old_filepath: "a.py".into(),
            new_filepath: "a.py".into(),
            start: 1,
            is_new: false,
            is_deleted: false,
            lines: vec![eq("x"), ins("y")],
        };
        let mut asm = PatchAssembler::new();
        let rename_text = asm.assemble(&rename);
        assert!(rename_text.contains("rename from a.py"));
        assert!(rename_text.contains("rename to   b.py"));
        assert!(!rename_text.contains("@@"));

        let modify_text = asm.assemble(&modify);
        assert!(modify_text.contains("--- a/b.py"));
        assert!(modify_text.contains("+++ b/b.py"));
    }

    #[test]
    fn empty_non_rename_hunk_produces_empty_string() {
        let chunk = DiffChunk {
            old_filepath: "f.py".into(),
            new_filepath: "f.py".into(),
            start: 1,
            is_new: false,
            is_deleted: false,
            lines: vec![],
        };
        let mut asm = PatchAssembler::new();
        assert!(asm.assemble(&chunk).is_empty());
    }
}
